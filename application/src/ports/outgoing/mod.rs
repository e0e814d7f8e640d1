pub mod clock;
pub mod events;
pub mod moderation_api;
pub mod platform_directory;
pub mod restriction_persistence;
