pub mod event_feed;
pub mod http_axum;
