pub mod client;
pub mod directory;
pub mod models;
pub mod moderation;
