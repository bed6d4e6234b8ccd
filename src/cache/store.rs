//! In-process object cache backing ACL, path, sidebar and profile lookups.
//!
//! All entries live in one LRU map so a flush is a single `clear`. Lookups record hit and miss
//! counters through the `metrics` facade, labelled with the key family.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use metrics::counter;
use tracing::debug;

use crate::domain::{
    acl::AccessControlList,
    nodes::{Attachment, Breadcrumb, Page},
    types::{AccessKind, NodeId},
    users::UserProfile,
};

use super::config::CacheConfig;
use super::keys::{CacheKey, ViewerKey};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub const METRIC_CACHE_HIT: &str = "sitecreator_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "sitecreator_cache_miss_total";
pub const METRIC_CACHE_EVICT: &str = "sitecreator_cache_evict_total";
pub const METRIC_CACHE_FLUSH: &str = "sitecreator_cache_flush_total";

#[derive(Debug, Clone)]
enum CachedValue {
    Page(Page),
    Acl(AccessControlList),
    Flag(bool),
    Html(String),
    Attachments(Vec<Attachment>),
    Breadcrumbs(Vec<Breadcrumb>),
    Profile(Option<UserProfile>),
}

/// Counters shown on the cache inspection page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub flushes: u64,
    pub items: usize,
    pub capacity: usize,
}

pub struct ObjectCache {
    entries: RwLock<LruCache<CacheKey, CachedValue>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    flushes: AtomicU64,
}

impl ObjectCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
        }
    }

    pub fn get_root(&self) -> Option<Page> {
        self.lookup(CacheKey::Root, "get_root", page)
    }

    pub fn set_root(&self, page: Page) {
        self.store(CacheKey::Root, CachedValue::Page(page), "set_root");
    }

    pub fn get_effective_acl(&self, node: NodeId) -> Option<AccessControlList> {
        self.lookup(
            CacheKey::EffectiveAcl(node),
            "get_effective_acl",
            |value| match value {
                CachedValue::Acl(acl) => Some(acl.clone()),
                _ => None,
            },
        )
    }

    pub fn set_effective_acl(&self, node: NodeId, acl: AccessControlList) {
        self.store(
            CacheKey::EffectiveAcl(node),
            CachedValue::Acl(acl),
            "set_effective_acl",
        );
    }

    pub fn get_access(&self, node: NodeId, kind: AccessKind, viewer: ViewerKey) -> Option<bool> {
        self.lookup(
            CacheKey::Access { node, kind, viewer },
            "get_access",
            flag,
        )
    }

    pub fn set_access(&self, node: NodeId, kind: AccessKind, viewer: ViewerKey, allowed: bool) {
        self.store(
            CacheKey::Access { node, kind, viewer },
            CachedValue::Flag(allowed),
            "set_access",
        );
    }

    /// Page denoted by a joined path prefix.
    pub fn get_path(&self, prefix: &str) -> Option<Page> {
        self.lookup(
            CacheKey::PathPrefix(prefix.to_string()),
            "get_path",
            page,
        )
    }

    pub fn set_path(&self, prefix: String, target: Page) {
        self.store(
            CacheKey::PathPrefix(prefix),
            CachedValue::Page(target),
            "set_path",
        );
    }

    pub fn get_attached_files(&self, page: NodeId) -> Option<Vec<Attachment>> {
        self.lookup(
            CacheKey::AttachedFiles(page),
            "get_attached_files",
            |value| match value {
                CachedValue::Attachments(files) => Some(files.clone()),
                _ => None,
            },
        )
    }

    pub fn set_attached_files(&self, page: NodeId, files: Vec<Attachment>) {
        self.store(
            CacheKey::AttachedFiles(page),
            CachedValue::Attachments(files),
            "set_attached_files",
        );
    }

    pub fn get_breadcrumbs(&self, page: NodeId) -> Option<Vec<Breadcrumb>> {
        self.lookup(
            CacheKey::Breadcrumbs(page),
            "get_breadcrumbs",
            |value| match value {
                CachedValue::Breadcrumbs(crumbs) => Some(crumbs.clone()),
                _ => None,
            },
        )
    }

    pub fn set_breadcrumbs(&self, page: NodeId, crumbs: Vec<Breadcrumb>) {
        self.store(
            CacheKey::Breadcrumbs(page),
            CachedValue::Breadcrumbs(crumbs),
            "set_breadcrumbs",
        );
    }

    pub fn get_sidebar(&self, viewer: ViewerKey) -> Option<String> {
        self.lookup(CacheKey::Sidebar(viewer), "get_sidebar", |value| match value {
            CachedValue::Html(html) => Some(html.clone()),
            _ => None,
        })
    }

    pub fn set_sidebar(&self, viewer: ViewerKey, html: String) {
        self.store(
            CacheKey::Sidebar(viewer),
            CachedValue::Html(html),
            "set_sidebar",
        );
    }

    pub fn get_sidebar_contains(&self, page: NodeId) -> Option<bool> {
        self.lookup(
            CacheKey::SidebarContains(page),
            "get_sidebar_contains",
            flag,
        )
    }

    pub fn set_sidebar_contains(&self, page: NodeId, contained: bool) {
        self.store(
            CacheKey::SidebarContains(page),
            CachedValue::Flag(contained),
            "set_sidebar_contains",
        );
    }

    /// `Some(None)` records that no profile exists for the email.
    pub fn get_profile(&self, email: &str) -> Option<Option<UserProfile>> {
        self.lookup(
            CacheKey::ProfileByEmail(email.to_string()),
            "get_profile",
            |value| match value {
                CachedValue::Profile(profile) => Some(profile.clone()),
                _ => None,
            },
        )
    }

    pub fn set_profile(&self, email: String, profile: Option<UserProfile>) {
        self.store(
            CacheKey::ProfileByEmail(email),
            CachedValue::Profile(profile),
            "set_profile",
        );
    }

    /// Drops every entry.
    pub fn flush_all(&self, reason: &'static str) {
        let mut entries = rw_write(&self.entries, SOURCE, "flush_all");
        let dropped = entries.len();
        entries.clear();
        drop(entries);

        self.flushes.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_CACHE_FLUSH).increment(1);
        debug!(
            target = "sitecreator::cache",
            reason,
            dropped,
            "object cache flushed"
        );
    }

    pub fn stats(&self) -> CacheStats {
        let entries = rw_read(&self.entries, SOURCE, "stats");
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            items: entries.len(),
            capacity: entries.cap().get(),
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup<T>(
        &self,
        key: CacheKey,
        op: &'static str,
        extract: impl FnOnce(&CachedValue) -> Option<T>,
    ) -> Option<T> {
        let family = key.family();
        let found = rw_write(&self.entries, SOURCE, op)
            .get(&key)
            .and_then(extract);

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            counter!(METRIC_CACHE_HIT, "family" => family).increment(1);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            counter!(METRIC_CACHE_MISS, "family" => family).increment(1);
        }
        found
    }

    fn store(&self, key: CacheKey, value: CachedValue, op: &'static str) {
        let family = key.family();
        let displaced = rw_write(&self.entries, SOURCE, op).push(key.clone(), value);
        if let Some((old_key, _)) = displaced
            && old_key != key
        {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            counter!(METRIC_CACHE_EVICT, "family" => family).increment(1);
        }
    }
}

fn page(value: &CachedValue) -> Option<Page> {
    match value {
        CachedValue::Page(page) => Some(page.clone()),
        _ => None,
    }
}

fn flag(value: &CachedValue) -> Option<bool> {
    match value {
        CachedValue::Flag(flag) => Some(*flag),
        _ => None,
    }
}
