pub mod error;
pub mod events;
pub mod platform;
pub mod restriction;
