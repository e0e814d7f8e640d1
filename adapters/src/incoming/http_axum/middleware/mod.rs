pub mod api_token;
pub mod request_id;
