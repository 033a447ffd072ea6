// Public API - what other modules can use
pub use handlers::{
    change_current_password, delete_account, get_current_user, register_user,
    update_account_details,
};
pub use models::{NewUser, PublicUser, UserModel, UserUpdate};
pub use service::UserService;

// Internal modules
mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;
mod types;
