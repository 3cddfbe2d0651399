use chrono::Duration;
use crypto_core::jwt;
use uuid::Uuid;

// All cases share one process-wide secret, so they live in one test fn.
#[test]
fn token_lifecycle() {
    jwt::initialize_hmac_secret("test-secret").unwrap();
    // Re-initializing with the same secret is a no-op.
    jwt::initialize_hmac_secret("test-secret").unwrap();
    // A different secret is refused.
    assert!(jwt::initialize_hmac_secret("other-secret").is_err());

    let user_id = Uuid::new_v4();
    let token = jwt::generate_token(user_id, Duration::hours(1)).unwrap();
    let data = jwt::validate_token(&token).unwrap();
    assert_eq!(data.claims.sub, user_id.to_string());

    assert!(jwt::validate_token("not-a-token").is_err());

    let expired = jwt::generate_token(user_id, Duration::hours(-2)).unwrap();
    assert!(jwt::validate_token(&expired).is_err());
}
