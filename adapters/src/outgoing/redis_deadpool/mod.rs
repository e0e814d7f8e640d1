pub mod keys;
pub mod restriction_store_redis;
