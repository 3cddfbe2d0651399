pub mod conversation_service;
pub mod encryption;
pub mod message_service;
