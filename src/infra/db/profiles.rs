use async_trait::async_trait;

use crate::{
    application::repos::{GroupsRepo, ProfilesRepo, RepoError},
    domain::{
        types::{GroupId, ProfileId},
        users::{UserGroup, UserProfile},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: i64,
    email: String,
    is_superuser: bool,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: ProfileId(row.id),
            email: row.email,
            is_superuser: row.is_superuser,
        }
    }
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: i64,
    name: String,
    description: String,
    members: Vec<i64>,
}

impl From<GroupRow> for UserGroup {
    fn from(row: GroupRow) -> Self {
        Self {
            id: GroupId(row.id),
            name: row.name,
            description: row.description,
            members: row.members.into_iter().map(ProfileId).collect(),
        }
    }
}

#[async_trait]
impl ProfilesRepo for PostgresRepositories {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, RepoError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, email, is_superuser FROM profiles WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserProfile::from))
    }

    async fn list_profiles(&self) -> Result<Vec<UserProfile>, RepoError> {
        let rows = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, email, is_superuser FROM profiles ORDER BY email",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(UserProfile::from).collect())
    }

    async fn list_by_ids(&self, ids: &[ProfileId]) -> Result<Vec<UserProfile>, RepoError> {
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, email, is_superuser FROM profiles WHERE id = ANY($1) ORDER BY email",
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(UserProfile::from).collect())
    }

    async fn upsert_profile(
        &self,
        email: &str,
        is_superuser: bool,
    ) -> Result<UserProfile, RepoError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "INSERT INTO profiles (email, is_superuser) VALUES ($1, $2) \
             ON CONFLICT (email) DO UPDATE SET is_superuser = EXCLUDED.is_superuser \
             RETURNING id, email, is_superuser",
        )
        .bind(email)
        .bind(is_superuser)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn delete_all_profiles(&self) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM profiles")
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl GroupsRepo for PostgresRepositories {
    async fn list_groups(&self) -> Result<Vec<UserGroup>, RepoError> {
        let rows = sqlx::query_as::<_, GroupRow>(
            "SELECT id, name, description, members FROM user_groups ORDER BY name",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(UserGroup::from).collect())
    }

    async fn find_group(&self, id: GroupId) -> Result<Option<UserGroup>, RepoError> {
        let row = sqlx::query_as::<_, GroupRow>(
            "SELECT id, name, description, members FROM user_groups WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserGroup::from))
    }

    async fn list_groups_with_member(
        &self,
        profile: ProfileId,
    ) -> Result<Vec<UserGroup>, RepoError> {
        let rows = sqlx::query_as::<_, GroupRow>(
            "SELECT id, name, description, members FROM user_groups \
             WHERE $1 = ANY(members) ORDER BY name",
        )
        .bind(profile.get())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(UserGroup::from).collect())
    }

    async fn create_group(&self, name: &str, description: &str) -> Result<UserGroup, RepoError> {
        let row = sqlx::query_as::<_, GroupRow>(
            "INSERT INTO user_groups (name, description) VALUES ($1, $2) \
             RETURNING id, name, description, members",
        )
        .bind(name)
        .bind(description)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_group(&self, group: &UserGroup) -> Result<(), RepoError> {
        let members: Vec<i64> = group.members.iter().map(|id| id.get()).collect();
        let result = sqlx::query(
            "UPDATE user_groups SET name = $2, description = $3, members = $4 WHERE id = $1",
        )
        .bind(group.id.get())
        .bind(&group.name)
        .bind(&group.description)
        .bind(members)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete_group(&self, id: GroupId) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM user_groups WHERE id = $1")
            .bind(id.get())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
