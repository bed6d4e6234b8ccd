//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::acl::{AccessControlList, AclDraft};
use crate::domain::nodes::{Attachment, AttachmentBlob, AttachmentPayload, ContentNode, Page};
use crate::domain::types::{AclId, BlobId, GroupId, NodeId, ProfileId};
use crate::domain::users::{UserGroup, UserProfile};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreatePageParams {
    pub parent_id: Option<NodeId>,
    pub acl_id: Option<AclId>,
    pub name: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct UpdatePageParams {
    pub id: NodeId,
    pub name: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct CreateAttachmentParams {
    pub parent_id: NodeId,
    pub name: String,
    pub hidden: bool,
    pub payload: AttachmentPayload,
}

#[derive(Debug, Clone)]
pub struct UpdateAttachmentParams {
    pub id: NodeId,
    pub hidden: bool,
    pub payload: AttachmentPayload,
}

#[async_trait]
pub trait NodesRepo: Send + Sync {
    async fn find_node(&self, id: NodeId) -> Result<Option<ContentNode>, RepoError>;

    async fn find_page(&self, id: NodeId) -> Result<Option<Page>, RepoError>;

    /// The page without a parent.
    async fn find_root(&self) -> Result<Option<Page>, RepoError>;

    async fn find_child_page(&self, parent: NodeId, name: &str)
    -> Result<Option<Page>, RepoError>;

    async fn find_attachment(
        &self,
        parent: NodeId,
        name: &str,
    ) -> Result<Option<Attachment>, RepoError>;

    /// Direct child pages ordered by name.
    async fn list_child_pages(&self, parent: NodeId) -> Result<Vec<Page>, RepoError>;

    /// Attachments of a page ordered by name.
    async fn list_attachments(&self, parent: NodeId) -> Result<Vec<Attachment>, RepoError>;

    async fn list_pages(&self) -> Result<Vec<Page>, RepoError>;

    /// Pages ordered by modification time, newest first.
    async fn list_recent_pages(&self, limit: u32) -> Result<Vec<Page>, RepoError>;

    async fn load_blob(&self, id: BlobId) -> Result<Option<AttachmentBlob>, RepoError>;
}

#[async_trait]
pub trait NodesWriteRepo: Send + Sync {
    async fn create_page(&self, params: CreatePageParams) -> Result<Page, RepoError>;

    async fn update_page(&self, params: UpdatePageParams) -> Result<Page, RepoError>;

    async fn set_node_acl(&self, node: NodeId, acl: Option<AclId>) -> Result<(), RepoError>;

    async fn create_attachment(
        &self,
        params: CreateAttachmentParams,
    ) -> Result<Attachment, RepoError>;

    async fn update_attachment(
        &self,
        params: UpdateAttachmentParams,
    ) -> Result<Attachment, RepoError>;

    async fn delete_node(&self, id: NodeId) -> Result<(), RepoError>;

    async fn insert_blob(&self, data: Bytes) -> Result<BlobId, RepoError>;

    async fn delete_blob(&self, id: BlobId) -> Result<(), RepoError>;
}

#[async_trait]
pub trait AclsRepo: Send + Sync {
    async fn find_acl(&self, id: AclId) -> Result<Option<AccessControlList>, RepoError>;

    async fn create_acl(&self, draft: AclDraft) -> Result<AccessControlList, RepoError>;

    async fn update_acl(&self, acl: &AccessControlList) -> Result<(), RepoError>;

    async fn delete_acl(&self, id: AclId) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ProfilesRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, RepoError>;

    /// Profiles ordered by email.
    async fn list_profiles(&self) -> Result<Vec<UserProfile>, RepoError>;

    async fn list_by_ids(&self, ids: &[ProfileId]) -> Result<Vec<UserProfile>, RepoError>;

    /// Inserts a profile or updates the superuser flag of an existing one.
    async fn upsert_profile(
        &self,
        email: &str,
        is_superuser: bool,
    ) -> Result<UserProfile, RepoError>;

    async fn delete_all_profiles(&self) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait GroupsRepo: Send + Sync {
    /// Groups ordered by name.
    async fn list_groups(&self) -> Result<Vec<UserGroup>, RepoError>;

    async fn find_group(&self, id: GroupId) -> Result<Option<UserGroup>, RepoError>;

    async fn list_groups_with_member(
        &self,
        profile: ProfileId,
    ) -> Result<Vec<UserGroup>, RepoError>;

    async fn create_group(&self, name: &str, description: &str) -> Result<UserGroup, RepoError>;

    /// Persists name, description and members.
    async fn update_group(&self, group: &UserGroup) -> Result<(), RepoError>;

    async fn delete_group(&self, id: GroupId) -> Result<(), RepoError>;
}

#[async_trait]
pub trait SidebarRepo: Send + Sync {
    async fn load_sidebar(&self) -> Result<Option<String>, RepoError>;

    async fn save_sidebar(&self, yaml: &str) -> Result<(), RepoError>;
}
