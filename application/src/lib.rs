#[cfg(any(
    feature = "adapters",
    feature = "axum",
    feature = "deadpool-redis",
    feature = "reqwest"
))]
compile_error!("application must not depend on adapters/framework crates");

pub mod error;
pub mod infrastructure_config;
pub mod ports;
pub mod restrictions;

#[cfg(test)]
pub(crate) mod testing;
