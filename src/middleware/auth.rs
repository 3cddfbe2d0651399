use crate::error::AppError;
use crypto_core::jwt as core_jwt;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Claims {
    pub sub: String, // subject - the user_id
    pub exp: i64,    // expiration time (unix timestamp)
}

/// Validate JWT signature and extract claims (HS256 only via crypto-core)
pub fn verify_jwt(token: &str) -> Result<Claims, AppError> {
    match core_jwt::validate_token(token) {
        Ok(token_data) => Ok(Claims {
            sub: token_data.claims.sub,
            exp: token_data.claims.exp,
        }),
        Err(_) => Err(AppError::Unauthorized),
    }
}

/// Validate a token and parse the subject as a user id. Shared by the
/// HTTP middleware and the WebSocket handshake.
pub fn authenticate(token: &str) -> Result<Uuid, AppError> {
    let claims = verify_jwt(token)?;
    Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::BadRequest("Invalid user_id in token".into()))
}

/// Middleware to extract JWT and add user_id to extensions
pub async fn auth_middleware(
    mut req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<axum::response::Response, AppError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;

    let user_id = authenticate(token)?;

    req.extensions_mut().insert(user_id);

    Ok(next.run(req).await)
}
