//! Maps request paths onto pages and attachments.
//!
//! Resolution first walks backwards through the cached path prefixes to find the deepest page
//! already known, then walks forwards from there one segment at a time. Only pages are cached;
//! a trailing segment may also name an attachment of the page reached so far.

use std::sync::Arc;

use crate::application::repos::NodesRepo;
use crate::application::tree::{TreeError, TreeService};
use crate::cache::ObjectCache;
use crate::domain::nodes::ContentNode;

#[derive(Clone)]
pub struct UrlResolver {
    tree: TreeService,
    nodes: Arc<dyn NodesRepo>,
    cache: Arc<ObjectCache>,
}

impl UrlResolver {
    pub fn new(tree: TreeService, nodes: Arc<dyn NodesRepo>, cache: Arc<ObjectCache>) -> Self {
        Self { tree, nodes, cache }
    }

    /// Returns `None` when any segment fails to resolve or the site has no root yet.
    pub async fn resolve(&self, path: &str) -> Result<Option<ContentNode>, TreeError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let full_key = segments.join("/");

        let mut split = segments.len();
        let mut current = loop {
            let prefix = segments[..split].join("/");
            if let Some(page) = self.cache.get_path(&prefix) {
                break page;
            }
            if split == 0 {
                match self.tree.root().await? {
                    Some(root) => break root,
                    None => return Ok(None),
                }
            }
            split -= 1;
        };

        let mut remaining = &segments[split..];
        loop {
            match remaining {
                [] => {
                    self.cache.set_path(full_key, current.clone());
                    return Ok(Some(ContentNode::Page(current)));
                }
                [last] => {
                    if let Some(attachment) = self.nodes.find_attachment(current.id(), last).await?
                    {
                        return Ok(Some(ContentNode::Attachment(attachment)));
                    }
                }
                _ => {}
            }

            let Some(child) = self.nodes.find_child_page(current.id(), remaining[0]).await? else {
                return Ok(None);
            };
            current = child;
            remaining = &remaining[1..];
        }
    }
}
