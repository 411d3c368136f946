//! Business logic services layer

pub mod access_control;
pub mod credential_store;

pub use access_control::{has_permission, resolve_account, AccessControlService};
pub use credential_store::{CredentialStore, BOOTSTRAP_LOGIN, EMPLOYEE_ROLE, OWNER_ROLE};
