// Public API - what other modules can use
pub use handlers::{login_user, logout_user, refresh_access_token};
pub use middleware::{verify_jwt, AuthenticatedUser};
pub use service::SessionService;
pub use types::{AccessClaims, LoginRequest, LoginResponse, RefreshClaims, TokenPair};

// Internal modules
pub mod cookies;
mod handlers;
pub mod middleware;
pub mod service;
pub mod token;
mod types;
