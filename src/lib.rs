//! Site Creator: a hierarchical content site with per-page access control, a navigation
//! sidebar and an administration UI.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

pub mod presentation {
    pub mod admin {
        pub mod views;
    }
    pub mod views;
}
