use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;

use crate::{
    application::repos::{
        CreateAttachmentParams, CreatePageParams, NodesRepo, NodesWriteRepo, RepoError,
        UpdateAttachmentParams, UpdatePageParams,
    },
    domain::{
        nodes::{Attachment, AttachmentBlob, AttachmentPayload, ContentNode, NodeMeta, Page},
        types::{AclId, BlobId, NodeId, NodeKind},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

const NODE_COLUMNS: &str = "id, kind, name, parent_id, acl_id, created_at, modified_at, \
    title, content, hidden, blob_id, link";

#[derive(sqlx::FromRow)]
struct NodeRow {
    id: i64,
    kind: NodeKind,
    name: String,
    parent_id: Option<i64>,
    acl_id: Option<i64>,
    created_at: OffsetDateTime,
    modified_at: OffsetDateTime,
    title: String,
    content: String,
    hidden: bool,
    blob_id: Option<i64>,
    link: Option<String>,
}

impl From<NodeRow> for ContentNode {
    fn from(row: NodeRow) -> Self {
        let meta = NodeMeta {
            id: NodeId(row.id),
            name: row.name,
            created_at: row.created_at,
            modified_at: row.modified_at,
            parent_id: row.parent_id.map(NodeId),
            acl_id: row.acl_id.map(AclId),
        };

        match row.kind {
            NodeKind::Page => ContentNode::Page(Page {
                meta,
                title: row.title,
                content: row.content,
            }),
            NodeKind::Attachment => {
                let payload = match (row.blob_id, row.link) {
                    (Some(blob), _) => AttachmentPayload::Blob(BlobId(blob)),
                    (None, Some(link)) => AttachmentPayload::Link(link),
                    (None, None) => AttachmentPayload::Empty,
                };
                ContentNode::Attachment(Attachment::new(meta, row.hidden, payload))
            }
        }
    }
}

#[derive(sqlx::FromRow)]
struct BlobRow {
    id: i64,
    data: Vec<u8>,
}

fn into_page(row: NodeRow) -> Result<Page, RepoError> {
    match ContentNode::from(row) {
        ContentNode::Page(page) => Ok(page),
        ContentNode::Attachment(attachment) => Err(RepoError::Integrity {
            message: format!("node {} is an attachment, expected a page", attachment.id()),
        }),
    }
}

fn into_attachment(row: NodeRow) -> Result<Attachment, RepoError> {
    match ContentNode::from(row) {
        ContentNode::Attachment(attachment) => Ok(attachment),
        ContentNode::Page(page) => Err(RepoError::Integrity {
            message: format!("node {} is a page, expected an attachment", page.id()),
        }),
    }
}

fn payload_columns(payload: &AttachmentPayload) -> (Option<i64>, Option<&str>) {
    match payload {
        AttachmentPayload::Empty => (None, None),
        AttachmentPayload::Blob(blob) => (Some(blob.get()), None),
        AttachmentPayload::Link(url) => (None, Some(url.as_str())),
    }
}

impl PostgresRepositories {
    async fn fetch_pages(&self, sql: &str, bind: Option<i64>) -> Result<Vec<Page>, RepoError> {
        let mut query = sqlx::query_as::<_, NodeRow>(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter().map(into_page).collect()
    }
}

#[async_trait]
impl NodesRepo for PostgresRepositories {
    async fn find_node(&self, id: NodeId) -> Result<Option<ContentNode>, RepoError> {
        let row = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ContentNode::from))
    }

    async fn find_page(&self, id: NodeId) -> Result<Option<Page>, RepoError> {
        let row = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE id = $1 AND kind = 'page'"
        ))
        .bind(id.get())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(into_page).transpose()
    }

    async fn find_root(&self) -> Result<Option<Page>, RepoError> {
        let row = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE parent_id IS NULL AND kind = 'page'"
        ))
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(into_page).transpose()
    }

    async fn find_child_page(
        &self,
        parent: NodeId,
        name: &str,
    ) -> Result<Option<Page>, RepoError> {
        let row = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes \
             WHERE parent_id = $1 AND name = $2 AND kind = 'page'"
        ))
        .bind(parent.get())
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(into_page).transpose()
    }

    async fn find_attachment(
        &self,
        parent: NodeId,
        name: &str,
    ) -> Result<Option<Attachment>, RepoError> {
        let row = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes \
             WHERE parent_id = $1 AND name = $2 AND kind = 'attachment'"
        ))
        .bind(parent.get())
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(into_attachment).transpose()
    }

    async fn list_child_pages(&self, parent: NodeId) -> Result<Vec<Page>, RepoError> {
        self.fetch_pages(
            &format!(
                "SELECT {NODE_COLUMNS} FROM nodes \
                 WHERE parent_id = $1 AND kind = 'page' ORDER BY name"
            ),
            Some(parent.get()),
        )
        .await
    }

    async fn list_attachments(&self, parent: NodeId) -> Result<Vec<Attachment>, RepoError> {
        let rows = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes \
             WHERE parent_id = $1 AND kind = 'attachment' ORDER BY name"
        ))
        .bind(parent.get())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(into_attachment).collect()
    }

    async fn list_pages(&self) -> Result<Vec<Page>, RepoError> {
        self.fetch_pages(
            &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE kind = 'page' ORDER BY id"),
            None,
        )
        .await
    }

    async fn list_recent_pages(&self, limit: u32) -> Result<Vec<Page>, RepoError> {
        self.fetch_pages(
            &format!(
                "SELECT {NODE_COLUMNS} FROM nodes WHERE kind = 'page' \
                 ORDER BY modified_at DESC, id DESC LIMIT $1"
            ),
            Some(i64::from(limit)),
        )
        .await
    }

    async fn load_blob(&self, id: BlobId) -> Result<Option<AttachmentBlob>, RepoError> {
        let row = sqlx::query_as::<_, BlobRow>(
            "SELECT id, data FROM attachment_blobs WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|row| AttachmentBlob {
            id: BlobId(row.id),
            data: Bytes::from(row.data),
        }))
    }
}

#[async_trait]
impl NodesWriteRepo for PostgresRepositories {
    async fn create_page(&self, params: CreatePageParams) -> Result<Page, RepoError> {
        let CreatePageParams {
            parent_id,
            acl_id,
            name,
            title,
            content,
        } = params;

        let row = sqlx::query_as::<_, NodeRow>(&format!(
            "INSERT INTO nodes (kind, name, parent_id, acl_id, title, content) \
             VALUES ('page', $1, $2, $3, $4, $5) \
             RETURNING {NODE_COLUMNS}"
        ))
        .bind(name)
        .bind(parent_id.map(NodeId::get))
        .bind(acl_id.map(AclId::get))
        .bind(title)
        .bind(content)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        into_page(row)
    }

    async fn update_page(&self, params: UpdatePageParams) -> Result<Page, RepoError> {
        let UpdatePageParams {
            id,
            name,
            title,
            content,
        } = params;

        let row = sqlx::query_as::<_, NodeRow>(&format!(
            "UPDATE nodes SET name = $2, title = $3, content = $4, modified_at = now() \
             WHERE id = $1 AND kind = 'page' \
             RETURNING {NODE_COLUMNS}"
        ))
        .bind(id.get())
        .bind(name)
        .bind(title)
        .bind(content)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        into_page(row)
    }

    async fn set_node_acl(&self, node: NodeId, acl: Option<AclId>) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE nodes SET acl_id = $2 WHERE id = $1")
            .bind(node.get())
            .bind(acl.map(AclId::get))
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn create_attachment(
        &self,
        params: CreateAttachmentParams,
    ) -> Result<Attachment, RepoError> {
        let (blob_id, link) = payload_columns(&params.payload);

        let row = sqlx::query_as::<_, NodeRow>(&format!(
            "INSERT INTO nodes (kind, name, parent_id, hidden, blob_id, link) \
             VALUES ('attachment', $1, $2, $3, $4, $5) \
             RETURNING {NODE_COLUMNS}"
        ))
        .bind(&params.name)
        .bind(params.parent_id.get())
        .bind(params.hidden)
        .bind(blob_id)
        .bind(link)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        into_attachment(row)
    }

    async fn update_attachment(
        &self,
        params: UpdateAttachmentParams,
    ) -> Result<Attachment, RepoError> {
        let (blob_id, link) = payload_columns(&params.payload);

        let row = sqlx::query_as::<_, NodeRow>(&format!(
            "UPDATE nodes SET hidden = $2, blob_id = $3, link = $4, modified_at = now() \
             WHERE id = $1 AND kind = 'attachment' \
             RETURNING {NODE_COLUMNS}"
        ))
        .bind(params.id.get())
        .bind(params.hidden)
        .bind(blob_id)
        .bind(link)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        into_attachment(row)
    }

    async fn delete_node(&self, id: NodeId) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM nodes WHERE id = $1")
            .bind(id.get())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn insert_blob(&self, data: Bytes) -> Result<BlobId, RepoError> {
        let id: i64 =
            sqlx::query_scalar("INSERT INTO attachment_blobs (data) VALUES ($1) RETURNING id")
                .bind(data.as_ref())
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(BlobId(id))
    }

    async fn delete_blob(&self, id: BlobId) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM attachment_blobs WHERE id = $1")
            .bind(id.get())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
