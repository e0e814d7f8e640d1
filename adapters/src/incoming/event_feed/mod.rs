pub mod rejoin_listener;
