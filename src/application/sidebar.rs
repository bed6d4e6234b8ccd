//! Per-viewer sidebar rendering and sidebar document maintenance.

use std::sync::Arc;

use askama::Template;
use thiserror::Error;
use tracing::info;

use crate::application::access::AccessError;
use crate::application::repos::{RepoError, SidebarRepo};
use crate::application::tree::{TreeError, TreeService};
use crate::cache::{ObjectCache, ViewerKey};
use crate::domain::nodes::Page;
use crate::domain::sidebar::{
    DEFAULT_SIDEBAR, SidebarEntry, SidebarParseError, SidebarSection, append_entry,
    parse_sidebar, references, serialize_sidebar,
};
use crate::domain::users::UserProfile;
use crate::presentation::views::{SidebarLinkView, SidebarSectionView, SidebarTemplate};

#[derive(Debug, Error)]
pub enum SidebarError {
    #[error(transparent)]
    Parse(#[from] SidebarParseError),
    #[error("failed to serialize sidebar: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("failed to render sidebar: {0}")]
    Render(#[from] askama::Error),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct SidebarService {
    repo: Arc<dyn SidebarRepo>,
    tree: TreeService,
    cache: Arc<ObjectCache>,
}

impl SidebarService {
    pub fn new(repo: Arc<dyn SidebarRepo>, tree: TreeService, cache: Arc<ObjectCache>) -> Self {
        Self { repo, tree, cache }
    }

    /// Stored YAML, empty when no sidebar has been saved.
    pub async fn source(&self) -> Result<String, SidebarError> {
        Ok(self.repo.load_sidebar().await?.unwrap_or_default())
    }

    /// HTML for `viewer`. Entries whose page is gone or unreadable are skipped, and a section
    /// without surviving entries is left out.
    pub async fn render(&self, viewer: Option<&UserProfile>) -> Result<String, SidebarError> {
        let key = ViewerKey::of(viewer.map(|profile| profile.id));
        if let Some(html) = self.cache.get_sidebar(key) {
            return Ok(html);
        }

        let Some(text) = self.repo.load_sidebar().await? else {
            return Ok(String::new());
        };

        let mut sections = Vec::new();
        for section in parse_sidebar(&text)? {
            let mut links = Vec::new();
            for entry in &section.pages {
                let Some(page) = self.tree.find_page(entry.node_id()).await? else {
                    continue;
                };
                if !self.tree.access().can_read(&page.meta, viewer).await? {
                    continue;
                }
                let path = self.tree.path(&page.meta).await?;
                links.push(SidebarLinkView {
                    href: format!("/{path}"),
                    title: entry.title.clone(),
                });
            }
            if !links.is_empty() {
                sections.push(SidebarSectionView {
                    heading: section.heading,
                    links,
                });
            }
        }

        let html = if sections.is_empty() {
            String::new()
        } else {
            SidebarTemplate { sections }.render()?
        };
        self.cache.set_sidebar(key, html.clone());
        Ok(html)
    }

    pub async fn contains_page(&self, page: &Page) -> Result<bool, SidebarError> {
        if let Some(contained) = self.cache.get_sidebar_contains(page.id()) {
            return Ok(contained);
        }

        let contained = match self.repo.load_sidebar().await? {
            Some(text) => references(&parse_sidebar(&text)?, page.id()),
            None => false,
        };
        self.cache.set_sidebar_contains(page.id(), contained);
        Ok(contained)
    }

    /// Appends `page` to the last section of the sidebar.
    pub async fn add_page(&self, page: &Page) -> Result<(), SidebarError> {
        let text = self
            .repo
            .load_sidebar()
            .await?
            .unwrap_or_else(|| DEFAULT_SIDEBAR.to_string());
        let mut sections: Vec<SidebarSection> = parse_sidebar(&text)?;
        append_entry(
            &mut sections,
            SidebarEntry {
                id: page.id().get(),
                title: page.title.clone(),
            },
        );

        let yaml = serialize_sidebar(&sections)?;
        self.save(&yaml).await?;
        info!(
            target = "sitecreator::sidebar",
            page = %page.id(),
            sections = sections.len(),
            "page appended to sidebar"
        );
        Ok(())
    }

    /// Persists `text` if it parses; otherwise nothing is written.
    pub async fn save(&self, text: &str) -> Result<(), SidebarError> {
        parse_sidebar(text)?;
        self.repo.save_sidebar(text).await?;
        self.cache.flush_all("sidebar_saved");
        Ok(())
    }
}
