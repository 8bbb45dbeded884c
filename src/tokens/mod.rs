pub mod repo;
pub mod repo_types;
pub mod services;

pub use repo::TokenStore;
pub use repo_types::{IssuedToken, Scope, StoredToken};
pub use services::TokenService;
