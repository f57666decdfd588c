//! Resource kinds
//!
//! Each module holds one typed record and its [`ManagedResource`] impl.
//!
//! [`ManagedResource`]: crate::ManagedResource

mod database;
mod login;
mod role;
mod role_assignment;
mod server_info;
mod user;

pub use database::{COMPATIBILITY_LEVELS, Database};
pub use login::{Login, LoginType};
pub use role::Role;
pub use role_assignment::RoleAssignment;
pub use server_info::{SERVER_INFO_ID, ServerInfo};
pub use user::User;
