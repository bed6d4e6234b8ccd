//! Cache key definitions.

use crate::domain::types::{AccessKind, NodeId, ProfileId};

/// Whose view of the site a cached value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewerKey {
    Anonymous,
    Profile(ProfileId),
}

impl ViewerKey {
    pub fn of(profile: Option<ProfileId>) -> Self {
        profile.map_or(ViewerKey::Anonymous, ViewerKey::Profile)
    }
}

/// Object cache keys. Every entry is dropped together on a flush.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Root,
    EffectiveAcl(NodeId),
    Access {
        node: NodeId,
        kind: AccessKind,
        viewer: ViewerKey,
    },
    /// Segments of a request path joined with `/`.
    PathPrefix(String),
    AttachedFiles(NodeId),
    Breadcrumbs(NodeId),
    Sidebar(ViewerKey),
    SidebarContains(NodeId),
    ProfileByEmail(String),
}

impl CacheKey {
    /// Short label used in logs and the cache inspection page.
    pub fn family(&self) -> &'static str {
        match self {
            CacheKey::Root => "root",
            CacheKey::EffectiveAcl(_) => "effective_acl",
            CacheKey::Access { .. } => "access",
            CacheKey::PathPrefix(_) => "path_prefix",
            CacheKey::AttachedFiles(_) => "attached_files",
            CacheKey::Breadcrumbs(_) => "breadcrumbs",
            CacheKey::Sidebar(_) => "sidebar",
            CacheKey::SidebarContains(_) => "sidebar_contains",
            CacheKey::ProfileByEmail(_) => "profile_by_email",
        }
    }
}
