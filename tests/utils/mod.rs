pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use setup::{auth_config, TestApp, TestResponse, ACCESS_SECRET, PASSWORD, REFRESH_SECRET};
