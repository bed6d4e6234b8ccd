//! Domain layer types and invariants.

pub mod acl;
pub mod error;
pub mod nodes;
pub mod sidebar;
pub mod types;
pub mod users;
pub mod validation;
