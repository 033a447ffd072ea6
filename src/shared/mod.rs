use std::sync::Arc;

use crate::config::AuthConfig;
use crate::user::repository::UserRepository;

pub mod error;
pub mod extract;
pub mod response;

pub use error::AppError;
pub use extract::AppJson;
pub use response::{ApiError, ApiResponse};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub user_repository: Arc<dyn UserRepository + Send + Sync>,
    pub auth_config: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(
        user_repository: Arc<dyn UserRepository + Send + Sync>,
        auth_config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            user_repository,
            auth_config,
        }
    }
}
