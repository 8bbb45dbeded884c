pub mod extractors;
pub mod repo;
pub mod services;

pub use repo::PermissionStore;
pub use services::{require_permission, Permissions, Principal, MOVIES_READ, MOVIES_WRITE};
