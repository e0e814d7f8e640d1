pub mod clock;
pub mod events_channel;
pub mod file_json;
pub mod moderation_http;
pub mod redis_deadpool;
