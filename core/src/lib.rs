pub mod access;
pub mod config;
pub mod db;
pub mod doc_activity;
pub mod doc_roles;
pub mod error;
pub mod grant;
pub mod ids;
pub mod locks;
pub mod member_status;
pub mod notifier;
pub mod publish;
pub mod roles;
pub mod seats;
pub mod service;
pub mod visibility;
pub mod workspace_member;

pub use access::AccessEvaluator;
pub use error::{PermissionError, PermissionResult};
pub use grant::GrantManager;
pub use seats::SeatReconciler;
pub use service::PermissionService;

#[cfg(test)]
pub(crate) mod test_support;
