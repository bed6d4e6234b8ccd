use async_trait::async_trait;

use crate::application::repos::{RepoError, SidebarRepo};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl SidebarRepo for PostgresRepositories {
    async fn load_sidebar(&self) -> Result<Option<String>, RepoError> {
        sqlx::query_scalar::<_, String>("SELECT yaml FROM sidebar WHERE id = 1")
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn save_sidebar(&self, yaml: &str) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO sidebar (id, yaml) VALUES (1, $1) \
             ON CONFLICT (id) DO UPDATE SET yaml = EXCLUDED.yaml, updated_at = now()",
        )
        .bind(yaml)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}
