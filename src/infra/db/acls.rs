use async_trait::async_trait;

use crate::{
    application::repos::{AclsRepo, RepoError},
    domain::{
        acl::{AccessControlList, AclDraft},
        types::{AclId, GroupId, ProfileId},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

const ACL_COLUMNS: &str =
    "id, group_write, user_write, global_write, group_read, user_read, global_read";

#[derive(sqlx::FromRow)]
struct AclRow {
    id: i64,
    group_write: Vec<i64>,
    user_write: Vec<i64>,
    global_write: bool,
    group_read: Vec<i64>,
    user_read: Vec<i64>,
    global_read: bool,
}

impl From<AclRow> for AccessControlList {
    fn from(row: AclRow) -> Self {
        Self {
            id: AclId(row.id),
            group_write: row.group_write.into_iter().map(GroupId).collect(),
            user_write: row.user_write.into_iter().map(ProfileId).collect(),
            global_write: row.global_write,
            group_read: row.group_read.into_iter().map(GroupId).collect(),
            user_read: row.user_read.into_iter().map(ProfileId).collect(),
            global_read: row.global_read,
        }
    }
}

fn group_ids(ids: &[GroupId]) -> Vec<i64> {
    ids.iter().map(|id| id.get()).collect()
}

fn profile_ids(ids: &[ProfileId]) -> Vec<i64> {
    ids.iter().map(|id| id.get()).collect()
}

#[async_trait]
impl AclsRepo for PostgresRepositories {
    async fn find_acl(&self, id: AclId) -> Result<Option<AccessControlList>, RepoError> {
        let row = sqlx::query_as::<_, AclRow>(&format!(
            "SELECT {ACL_COLUMNS} FROM acls WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(AccessControlList::from))
    }

    async fn create_acl(&self, draft: AclDraft) -> Result<AccessControlList, RepoError> {
        let row = sqlx::query_as::<_, AclRow>(&format!(
            "INSERT INTO acls \
             (group_write, user_write, global_write, group_read, user_read, global_read) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {ACL_COLUMNS}"
        ))
        .bind(group_ids(&draft.group_write))
        .bind(profile_ids(&draft.user_write))
        .bind(draft.global_write)
        .bind(group_ids(&draft.group_read))
        .bind(profile_ids(&draft.user_read))
        .bind(draft.global_read)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_acl(&self, acl: &AccessControlList) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE acls SET group_write = $2, user_write = $3, global_write = $4, \
             group_read = $5, user_read = $6, global_read = $7 \
             WHERE id = $1",
        )
        .bind(acl.id.get())
        .bind(group_ids(&acl.group_write))
        .bind(profile_ids(&acl.user_write))
        .bind(acl.global_write)
        .bind(group_ids(&acl.group_read))
        .bind(profile_ids(&acl.user_read))
        .bind(acl.global_read)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete_acl(&self, id: AclId) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM acls WHERE id = $1")
            .bind(id.get())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
