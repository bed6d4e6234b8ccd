//! Content tree navigation and page/attachment mutations.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::access::{AccessError, AccessService};
use crate::application::repos::{
    AclsRepo, CreateAttachmentParams, CreatePageParams, NodesRepo, NodesWriteRepo, RepoError,
    UpdateAttachmentParams, UpdatePageParams,
};
use crate::cache::ObjectCache;
use crate::domain::acl::AclDraft;
use crate::domain::error::DomainError;
use crate::domain::nodes::{
    Attachment, AttachmentPayload, Breadcrumb, ContentNode, NodeMeta, Page,
};
use crate::domain::types::{BlobId, NodeId};
use crate::domain::users::UserProfile;
use crate::domain::validation::{link_file_name, validate_link, validate_page_name};

pub const ROOT_PAGE_NAME: &str = "Home";
pub const ROOT_PAGE_TITLE: &str = "Welcome to App Engine Site Creator";
pub const RECENT_PAGE_LIMIT: u32 = 10;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("{0}")]
    Validation(String),
    #[error("write access denied for node {0}")]
    Forbidden(NodeId),
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<DomainError> for TreeError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { message, .. } => TreeError::Validation(message),
            DomainError::NotFound { entity } => TreeError::NotFound { entity },
            DomainError::Invariant { message } => {
                TreeError::Repo(RepoError::Integrity { message })
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SavePageCommand {
    pub name: String,
    pub title: String,
    pub content: String,
}

/// Whether a save creates a child page or edits an existing one.
#[derive(Debug, Clone, Copy)]
pub enum PageTarget<'a> {
    Create { parent: &'a Page },
    Update { page: &'a Page },
}

#[derive(Debug, Clone)]
pub enum UploadSource {
    File { file_name: String, data: Bytes },
    Link { url: String },
}

#[derive(Debug, Clone)]
pub struct UploadCommand {
    pub source: UploadSource,
    pub hidden: bool,
}

/// One node of the JSON tree consumed by the admin page picker.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub title: String,
    pub path: String,
    pub id: String,
    pub edit_url: String,
    pub child_url: String,
    pub delete_url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeData {
    pub identifier: &'static str,
    pub label: &'static str,
    pub items: Vec<TreeNode>,
}

#[derive(Debug, Clone)]
pub struct SitemapEntry {
    pub page: Page,
    pub path: String,
    pub depth: usize,
}

/// Pages indexed by parent, children ordered by name.
struct PageIndex {
    children: HashMap<NodeId, Vec<Page>>,
}

impl PageIndex {
    fn new(pages: Vec<Page>) -> Self {
        let mut children: HashMap<NodeId, Vec<Page>> = HashMap::new();
        for page in pages {
            if let Some(parent) = page.meta.parent_id {
                children.entry(parent).or_default().push(page);
            }
        }
        for siblings in children.values_mut() {
            siblings.sort_by(|a, b| a.meta.name.cmp(&b.meta.name));
        }
        Self { children }
    }

    fn children_of(&self, id: NodeId) -> &[Page] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct TreeService {
    nodes: Arc<dyn NodesRepo>,
    writer: Arc<dyn NodesWriteRepo>,
    acls: Arc<dyn AclsRepo>,
    access: AccessService,
    cache: Arc<ObjectCache>,
}

impl TreeService {
    pub fn new(
        nodes: Arc<dyn NodesRepo>,
        writer: Arc<dyn NodesWriteRepo>,
        acls: Arc<dyn AclsRepo>,
        access: AccessService,
        cache: Arc<ObjectCache>,
    ) -> Self {
        Self {
            nodes,
            writer,
            acls,
            access,
            cache,
        }
    }

    pub fn access(&self) -> &AccessService {
        &self.access
    }

    pub async fn root(&self) -> Result<Option<Page>, TreeError> {
        if let Some(root) = self.cache.get_root() {
            return Ok(Some(root));
        }
        let root = self.nodes.find_root().await?;
        if let Some(root) = &root {
            self.cache.set_root(root.clone());
        }
        Ok(root)
    }

    pub async fn find_page(&self, id: NodeId) -> Result<Option<Page>, TreeError> {
        Ok(self.nodes.find_page(id).await?)
    }

    pub async fn find_attachment_by_id(
        &self,
        id: NodeId,
    ) -> Result<Option<Attachment>, TreeError> {
        Ok(match self.nodes.find_node(id).await? {
            Some(ContentNode::Attachment(attachment)) => Some(attachment),
            _ => None,
        })
    }

    /// URL path below the site root: empty for the root, otherwise `a/b/`.
    pub async fn path(&self, node: &NodeMeta) -> Result<String, TreeError> {
        let mut segments = Vec::new();
        let mut current = node.clone();

        while let Some(parent_id) = current.parent_id {
            segments.push(current.name.clone());
            current = self
                .nodes
                .find_page(parent_id)
                .await?
                .ok_or(TreeError::NotFound {
                    entity: "parent page",
                })?
                .meta;
        }

        Ok(segments
            .iter()
            .rev()
            .map(|segment| format!("{segment}/"))
            .collect())
    }

    pub async fn get_child(&self, page: &Page, name: &str) -> Result<Option<Page>, TreeError> {
        Ok(self.nodes.find_child_page(page.id(), name).await?)
    }

    pub async fn get_attachment(
        &self,
        page: &Page,
        name: &str,
    ) -> Result<Option<Attachment>, TreeError> {
        Ok(self.nodes.find_attachment(page.id(), name).await?)
    }

    pub async fn attached_files(&self, page: &Page) -> Result<Vec<Attachment>, TreeError> {
        if let Some(files) = self.cache.get_attached_files(page.id()) {
            return Ok(files);
        }
        let files = self.nodes.list_attachments(page.id()).await?;
        self.cache.set_attached_files(page.id(), files.clone());
        Ok(files)
    }

    pub async fn child_pages(&self, page: &Page) -> Result<Vec<Page>, TreeError> {
        Ok(self.nodes.list_child_pages(page.id()).await?)
    }

    /// Ancestors of `page`, root first.
    pub async fn breadcrumbs(&self, page: &Page) -> Result<Vec<Breadcrumb>, TreeError> {
        if let Some(crumbs) = self.cache.get_breadcrumbs(page.id()) {
            return Ok(crumbs);
        }

        let mut ancestors = Vec::new();
        let mut parent_id = page.meta.parent_id;
        while let Some(id) = parent_id {
            let parent = self.nodes.find_page(id).await?.ok_or(TreeError::NotFound {
                entity: "parent page",
            })?;
            parent_id = parent.meta.parent_id;
            ancestors.push(parent);
        }
        ancestors.reverse();

        let mut crumbs = Vec::with_capacity(ancestors.len());
        let mut path = String::new();
        for ancestor in &ancestors {
            if !ancestor.meta.is_root() {
                path.push_str(ancestor.name());
                path.push('/');
            }
            crumbs.push(Breadcrumb {
                path: format!("/{path}"),
                name: ancestor.meta.name.clone(),
            });
        }

        self.cache.set_breadcrumbs(page.id(), crumbs.clone());
        Ok(crumbs)
    }

    async fn ensure_writable(
        &self,
        node: &NodeMeta,
        viewer: Option<&UserProfile>,
    ) -> Result<(), TreeError> {
        if self.access.can_write(node, viewer).await? {
            Ok(())
        } else {
            Err(TreeError::Forbidden(node.id))
        }
    }

    pub async fn save_page(
        &self,
        viewer: Option<&UserProfile>,
        target: PageTarget<'_>,
        command: SavePageCommand,
    ) -> Result<Page, TreeError> {
        let name = command.name.trim().to_string();
        validate_page_name(&name)?;

        let saved = match target {
            PageTarget::Create { parent } => {
                self.ensure_writable(&parent.meta, viewer).await?;
                self.ensure_unique_name(parent.id(), &name, None).await?;
                self.writer
                    .create_page(CreatePageParams {
                        parent_id: Some(parent.id()),
                        acl_id: None,
                        name,
                        title: command.title,
                        content: command.content,
                    })
                    .await
                    .map_err(duplicate_as_validation)?
            }
            PageTarget::Update { page } => {
                self.ensure_writable(&page.meta, viewer).await?;
                if let Some(parent_id) = page.meta.parent_id {
                    self.ensure_unique_name(parent_id, &name, Some(page.id()))
                        .await?;
                }
                self.writer
                    .update_page(UpdatePageParams {
                        id: page.id(),
                        name,
                        title: command.title,
                        content: command.content,
                    })
                    .await
                    .map_err(duplicate_as_validation)?
            }
        };

        self.cache.flush_all("page_saved");
        info!(
            target = "sitecreator::tree",
            page = %saved.id(),
            name = %saved.meta.name,
            "page saved"
        );
        Ok(saved)
    }

    async fn ensure_unique_name(
        &self,
        parent: NodeId,
        name: &str,
        current: Option<NodeId>,
    ) -> Result<(), TreeError> {
        match self.nodes.find_child_page(parent, name).await? {
            Some(existing) if Some(existing.id()) != current => Err(TreeError::Validation(
                format!("A page named \"{name}\" already exists at this level"),
            )),
            _ => Ok(()),
        }
    }

    /// Deletes the page and everything below it. Children go before their parents; a node's
    /// attachments go before the node, and its owned ACL after it.
    pub async fn delete_page(
        &self,
        viewer: Option<&UserProfile>,
        page: &Page,
    ) -> Result<usize, TreeError> {
        self.ensure_writable(&page.meta, viewer).await?;

        let mut order = Vec::new();
        let mut stack = vec![page.clone()];
        while let Some(current) = stack.pop() {
            let mut children = self.nodes.list_child_pages(current.id()).await?;
            children.reverse();
            stack.extend(children);
            order.push(current);
        }

        // A failure part way leaves some nodes gone; the cache must not keep serving them.
        let removed = self.remove_pages(&order).await;
        self.cache.flush_all("page_deleted");
        removed?;
        info!(
            target = "sitecreator::tree",
            page = %page.id(),
            removed_pages = order.len(),
            "page tree deleted"
        );
        Ok(order.len())
    }

    async fn remove_pages(&self, parents_first: &[Page]) -> Result<(), TreeError> {
        for doomed in parents_first.iter().rev() {
            for attachment in self.nodes.list_attachments(doomed.id()).await? {
                self.remove_attachment(&attachment).await?;
            }
            self.writer.delete_node(doomed.id()).await?;
            if let Some(acl_id) = doomed.meta.acl_id {
                self.acls.delete_acl(acl_id).await?;
            }
        }
        Ok(())
    }

    async fn remove_attachment(&self, attachment: &Attachment) -> Result<(), TreeError> {
        self.writer.delete_node(attachment.id()).await?;
        if let Some(blob) = attachment.blob_id() {
            self.writer.delete_blob(blob).await?;
        }
        if let Some(acl_id) = attachment.meta.acl_id {
            self.acls.delete_acl(acl_id).await?;
        }
        Ok(())
    }

    /// Stores an upload or link on `page`, replacing a same-named attachment.
    pub async fn upload_attachment(
        &self,
        viewer: Option<&UserProfile>,
        page: &Page,
        command: UploadCommand,
    ) -> Result<Attachment, TreeError> {
        self.ensure_writable(&page.meta, viewer).await?;

        let name = match &command.source {
            UploadSource::File { file_name, .. } => base_file_name(file_name).to_string(),
            UploadSource::Link { url } => {
                validate_link(url)?;
                link_file_name(url).to_string()
            }
        };
        if name.is_empty() {
            return Err(TreeError::Validation(
                "The attachment needs a file name".to_string(),
            ));
        }

        let existing = self.nodes.find_attachment(page.id(), &name).await?;
        let saved = match existing {
            Some(mut attachment) => {
                let (orphan, fresh) = match command.source {
                    UploadSource::File { data, .. } => {
                        let previous = attachment.blob_id();
                        let blob = self.writer.insert_blob(data).await?;
                        attachment.set_blob(blob);
                        (previous, Some(blob))
                    }
                    UploadSource::Link { url } => {
                        (attachment.set_link(url.trim().to_string()), None)
                    }
                };
                let updated = self
                    .writer
                    .update_attachment(UpdateAttachmentParams {
                        id: attachment.id(),
                        hidden: command.hidden,
                        payload: attachment.payload().clone(),
                    })
                    .await;
                let updated = match updated {
                    Ok(updated) => updated,
                    Err(err) => {
                        if let Some(blob) = fresh {
                            self.discard_blob(blob).await;
                        }
                        return Err(err.into());
                    }
                };
                if let Some(blob) = orphan {
                    self.writer.delete_blob(blob).await?;
                }
                updated
            }
            None => {
                let payload = match command.source {
                    UploadSource::File { data, .. } => {
                        AttachmentPayload::Blob(self.writer.insert_blob(data).await?)
                    }
                    UploadSource::Link { url } => AttachmentPayload::Link(url.trim().to_string()),
                };
                let fresh = match &payload {
                    AttachmentPayload::Blob(blob) => Some(*blob),
                    AttachmentPayload::Link(_) | AttachmentPayload::Empty => None,
                };
                let created = self
                    .writer
                    .create_attachment(CreateAttachmentParams {
                        parent_id: page.id(),
                        name,
                        hidden: command.hidden,
                        payload,
                    })
                    .await;
                match created {
                    Ok(created) => created,
                    Err(err) => {
                        if let Some(blob) = fresh {
                            self.discard_blob(blob).await;
                        }
                        return Err(duplicate_as_validation(err));
                    }
                }
            }
        };

        self.cache.flush_all("attachment_saved");
        Ok(saved)
    }

    /// Drops a blob that no attachment ended up referencing.
    async fn discard_blob(&self, blob: BlobId) {
        if let Err(err) = self.writer.delete_blob(blob).await {
            warn!(
                target = "sitecreator::tree",
                blob = %blob,
                error = %err,
                "failed to discard unreferenced blob"
            );
        }
    }

    pub async fn delete_attachment(
        &self,
        viewer: Option<&UserProfile>,
        attachment: &Attachment,
    ) -> Result<(), TreeError> {
        self.ensure_writable(&attachment.meta, viewer).await?;
        self.remove_attachment(attachment).await?;
        self.cache.flush_all("attachment_deleted");
        Ok(())
    }

    /// JSON tree of readable pages below the root. The root itself is always listed.
    pub async fn tree_data(&self, viewer: Option<&UserProfile>) -> Result<TreeData, TreeError> {
        let Some(root) = self.root().await? else {
            return Err(TreeError::NotFound { entity: "root page" });
        };
        let index = self.readable_index(viewer).await?;

        Ok(TreeData {
            identifier: "id",
            label: "title",
            items: vec![build_tree_node(&index, &root, String::new())],
        })
    }

    /// Readable pages in pre-order, with their depth below the root.
    pub async fn sitemap(
        &self,
        viewer: Option<&UserProfile>,
    ) -> Result<Vec<SitemapEntry>, TreeError> {
        let Some(root) = self.root().await? else {
            return Ok(Vec::new());
        };
        if !self.access.can_read(&root.meta, viewer).await? {
            return Ok(Vec::new());
        }
        let index = self.readable_index(viewer).await?;

        let mut entries = Vec::new();
        collect_sitemap(&index, root, String::new(), 0, &mut entries);
        Ok(entries)
    }

    async fn readable_index(&self, viewer: Option<&UserProfile>) -> Result<PageIndex, TreeError> {
        let mut readable = Vec::new();
        for page in self.nodes.list_pages().await? {
            if self.access.can_read(&page.meta, viewer).await? {
                readable.push(page);
            }
        }
        Ok(PageIndex::new(readable))
    }

    pub async fn recently_modified(&self) -> Result<Vec<Page>, TreeError> {
        Ok(self.nodes.list_recent_pages(RECENT_PAGE_LIMIT).await?)
    }

    /// Creates the root page under a world-readable ACL. Returns the existing root when there
    /// already is one.
    pub async fn initialize_site(&self) -> Result<Page, TreeError> {
        if let Some(root) = self.root().await? {
            return Ok(root);
        }

        let acl = self.acls.create_acl(AclDraft::public_read()).await?;
        let root = self
            .writer
            .create_page(CreatePageParams {
                parent_id: None,
                acl_id: Some(acl.id),
                name: ROOT_PAGE_NAME.to_string(),
                title: ROOT_PAGE_TITLE.to_string(),
                content: String::new(),
            })
            .await?;

        self.cache.flush_all("site_initialized");
        info!(
            target = "sitecreator::tree",
            page = %root.id(),
            acl = %acl.id,
            "site initialized with root page"
        );
        Ok(root)
    }
}

fn duplicate_as_validation(err: RepoError) -> TreeError {
    match err {
        RepoError::Duplicate { .. } => {
            TreeError::Validation("A node with this name already exists at this level".to_string())
        }
        other => TreeError::Repo(other),
    }
}

fn base_file_name(raw: &str) -> &str {
    raw.rsplit(['/', '\\']).next().unwrap_or_default().trim()
}

fn build_tree_node(index: &PageIndex, page: &Page, path: String) -> TreeNode {
    let id = page.id().to_string();
    let children = index
        .children_of(page.id())
        .iter()
        .map(|child| build_tree_node(index, child, format!("{path}{}/", child.meta.name)))
        .collect();

    TreeNode {
        title: page.title.clone(),
        path,
        edit_url: format!("/admin/edit/{id}/"),
        child_url: format!("/admin/new/{id}"),
        delete_url: format!("/admin/deletepage/{id}/"),
        id,
        children,
    }
}

fn collect_sitemap(
    index: &PageIndex,
    page: Page,
    path: String,
    depth: usize,
    out: &mut Vec<SitemapEntry>,
) {
    let children = index.children_of(page.id()).to_vec();
    out.push(SitemapEntry {
        page,
        path: path.clone(),
        depth,
    });
    for child in children {
        let child_path = format!("{path}{}/", child.meta.name);
        collect_sitemap(index, child, child_path, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_file_name_strips_client_directories() {
        assert_eq!(base_file_name("C:\\docs\\report.pdf"), "report.pdf");
        assert_eq!(base_file_name("photos/cat.png"), "cat.png");
        assert_eq!(base_file_name("plain.txt"), "plain.txt");
    }
}
