//! User registration and login

pub mod password;
pub mod service;

pub use password::{PasswordError, check_password, hash_password};
pub use service::{AuthError, LoginResponse, RegisterUser, UserAuthService};
