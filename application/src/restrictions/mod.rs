pub mod executor;
pub mod rejoin_guard;
pub mod scheduler;
pub mod service;
pub mod store;
