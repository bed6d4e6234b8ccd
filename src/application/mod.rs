//! Application services: access control, the content tree, sidebar and user directory.

pub mod access;
pub mod chrome;
pub mod error;
pub mod identity;
pub mod repos;
pub mod resolver;
pub mod sidebar;
pub mod tree;
pub mod users;
