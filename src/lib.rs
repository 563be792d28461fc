pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod metrics;
pub mod model;
pub mod repo;
pub mod service;
pub mod tracing;

#[cfg(test)]
test_r::enable!();

/// Trait to convert a value to a string which is safe to return through a public API.
pub trait SafeDisplay {
    fn to_safe_string(&self) -> String;
}
