//! Authentication and authorization module

pub mod middleware;
pub mod password;
pub mod token;

pub use middleware::{access_auth_middleware, extract_token, require_permission};
pub use password::{PasswordDigest, PasswordHasher};
pub use token::{Claims, TokenService, DEFAULT_TOKEN_TTL};
