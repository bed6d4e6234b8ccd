//! Pages and attachments that make up the content tree.

use bytes::Bytes;
use time::OffsetDateTime;

use crate::domain::types::{AclId, BlobId, NodeId, NodeKind};

/// Fields shared by every node in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMeta {
    pub id: NodeId,
    pub name: String,
    pub created_at: OffsetDateTime,
    pub modified_at: OffsetDateTime,
    pub parent_id: Option<NodeId>,
    pub acl_id: Option<AclId>,
}

impl NodeMeta {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn inherits_acl(&self) -> bool {
        self.acl_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub meta: NodeMeta,
    pub title: String,
    pub content: String,
}

impl Page {
    pub fn id(&self) -> NodeId {
        self.meta.id
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }
}

/// Where the bytes of an attachment live. A blob and a link never coexist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentPayload {
    Empty,
    Blob(BlobId),
    Link(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub meta: NodeMeta,
    pub hidden: bool,
    payload: AttachmentPayload,
}

impl Attachment {
    pub fn new(meta: NodeMeta, hidden: bool, payload: AttachmentPayload) -> Self {
        Self {
            meta,
            hidden,
            payload,
        }
    }

    pub fn id(&self) -> NodeId {
        self.meta.id
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn payload(&self) -> &AttachmentPayload {
        &self.payload
    }

    pub fn blob_id(&self) -> Option<BlobId> {
        match self.payload {
            AttachmentPayload::Blob(id) => Some(id),
            _ => None,
        }
    }

    pub fn link(&self) -> Option<&str> {
        match &self.payload {
            AttachmentPayload::Link(url) => Some(url),
            _ => None,
        }
    }

    /// Points the attachment at stored bytes, dropping any link.
    pub fn set_blob(&mut self, blob: BlobId) {
        self.payload = AttachmentPayload::Blob(blob);
    }

    /// Points the attachment at an external URL. Returns the blob that is no longer referenced
    /// so the caller can delete it.
    pub fn set_link(&mut self, url: String) -> Option<BlobId> {
        let orphan = self.blob_id();
        self.payload = AttachmentPayload::Link(url);
        orphan
    }
}

/// Stored bytes of an attachment, loaded only when the file is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentBlob {
    pub id: BlobId,
    pub data: Bytes,
}

/// One ancestor link shown above a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    pub path: String,
    pub name: String,
}

/// A node resolved from the tree, either a page or one of its attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    Page(Page),
    Attachment(Attachment),
}

impl ContentNode {
    pub fn meta(&self) -> &NodeMeta {
        match self {
            ContentNode::Page(page) => &page.meta,
            ContentNode::Attachment(attachment) => &attachment.meta,
        }
    }

    pub fn id(&self) -> NodeId {
        self.meta().id
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            ContentNode::Page(_) => NodeKind::Page,
            ContentNode::Attachment(_) => NodeKind::Attachment,
        }
    }

    pub fn into_page(self) -> Option<Page> {
        match self {
            ContentNode::Page(page) => Some(page),
            ContentNode::Attachment(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> NodeMeta {
        NodeMeta {
            id: NodeId(5),
            name: "report.pdf".into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            modified_at: OffsetDateTime::UNIX_EPOCH,
            parent_id: Some(NodeId(1)),
            acl_id: None,
        }
    }

    #[test]
    fn setting_a_link_releases_the_blob() {
        let mut attachment = Attachment::new(meta(), false, AttachmentPayload::Blob(BlobId(9)));
        let orphan = attachment.set_link("https://example.com/report.pdf".into());
        assert_eq!(orphan, Some(BlobId(9)));
        assert_eq!(attachment.link(), Some("https://example.com/report.pdf"));
        assert_eq!(attachment.blob_id(), None);
    }

    #[test]
    fn setting_a_blob_clears_the_link() {
        let mut attachment = Attachment::new(
            meta(),
            false,
            AttachmentPayload::Link("https://example.com/a".into()),
        );
        attachment.set_blob(BlobId(3));
        assert_eq!(attachment.payload(), &AttachmentPayload::Blob(BlobId(3)));
        assert!(attachment.link().is_none());
    }
}
