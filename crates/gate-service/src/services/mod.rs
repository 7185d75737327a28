pub mod api_key_service;
pub mod login_service;
