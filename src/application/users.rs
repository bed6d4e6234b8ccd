//! Profiles, groups and group membership, plus the CSV roster used for bulk edits.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{GroupsRepo, ProfilesRepo, RepoError};
use crate::cache::ObjectCache;
use crate::domain::error::DomainError;
use crate::domain::types::GroupId;
use crate::domain::users::{
    RosterRejection, RosterRow, UserGroup, UserProfile, format_roster, parse_roster,
};
use crate::domain::validation::validate_email;

#[derive(Debug, Error)]
pub enum UserDirectoryError {
    #[error("{0}")]
    Validation(String),
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<DomainError> for UserDirectoryError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { message, .. } => Self::Validation(message),
            DomainError::NotFound { entity } => Self::NotFound { entity },
            DomainError::Invariant { message } => Self::Repo(RepoError::Integrity { message }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub imported: usize,
    pub rejected: Vec<RosterRejection>,
}

#[derive(Clone)]
pub struct UserDirectoryService {
    profiles: Arc<dyn ProfilesRepo>,
    groups: Arc<dyn GroupsRepo>,
    cache: Arc<ObjectCache>,
}

impl UserDirectoryService {
    pub fn new(
        profiles: Arc<dyn ProfilesRepo>,
        groups: Arc<dyn GroupsRepo>,
        cache: Arc<ObjectCache>,
    ) -> Self {
        Self {
            profiles,
            groups,
            cache,
        }
    }

    /// Memoized lookup; a missing profile is cached too.
    pub async fn load_profile(&self, email: &str) -> Result<Option<UserProfile>, UserDirectoryError> {
        if let Some(profile) = self.cache.get_profile(email) {
            return Ok(profile);
        }
        let profile = self.profiles.find_by_email(email).await?;
        self.cache.set_profile(email.to_string(), profile.clone());
        Ok(profile)
    }

    /// Returns the profile for a platform administrator, creating a superuser one on first
    /// sight.
    pub async fn ensure_admin_profile(
        &self,
        email: &str,
    ) -> Result<UserProfile, UserDirectoryError> {
        if let Some(profile) = self.load_profile(email).await? {
            return Ok(profile);
        }

        let profile = self.profiles.upsert_profile(email, true).await?;
        self.cache.flush_all("admin_profile_created");
        info!(
            target = "sitecreator::users",
            profile = %profile.id,
            email = %profile.email,
            "created superuser profile for administrator"
        );
        Ok(profile)
    }

    pub async fn update_profile(
        &self,
        email: &str,
        is_superuser: bool,
    ) -> Result<UserProfile, UserDirectoryError> {
        let email = validate_email(email)?;
        let profile = self.profiles.upsert_profile(&email, is_superuser).await?;
        self.cache.flush_all("profile_saved");
        Ok(profile)
    }

    pub async fn list_profiles(&self) -> Result<Vec<UserProfile>, UserDirectoryError> {
        Ok(self.profiles.list_profiles().await?)
    }

    pub async fn profiles_in_group(
        &self,
        group: &UserGroup,
    ) -> Result<Vec<UserProfile>, UserDirectoryError> {
        Ok(self.profiles.list_by_ids(&group.members).await?)
    }

    pub async fn list_groups(&self) -> Result<Vec<UserGroup>, UserDirectoryError> {
        Ok(self.groups.list_groups().await?)
    }

    pub async fn find_group(&self, id: GroupId) -> Result<Option<UserGroup>, UserDirectoryError> {
        Ok(self.groups.find_group(id).await?)
    }

    pub async fn groups_for(
        &self,
        profile: &UserProfile,
    ) -> Result<Vec<UserGroup>, UserDirectoryError> {
        Ok(self.groups.list_groups_with_member(profile.id).await?)
    }

    pub async fn groups_not_in(
        &self,
        profile: &UserProfile,
    ) -> Result<Vec<UserGroup>, UserDirectoryError> {
        let mut groups = self.groups.list_groups().await?;
        groups.retain(|group| !group.has_member(profile.id));
        Ok(groups)
    }

    /// Creates a group when `id` is `None`, otherwise renames and redescribes it.
    pub async fn save_group(
        &self,
        id: Option<GroupId>,
        name: &str,
        description: &str,
    ) -> Result<UserGroup, UserDirectoryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(UserDirectoryError::Validation(
                "This field is required.".to_string(),
            ));
        }

        let clash = self
            .groups
            .list_groups()
            .await?
            .into_iter()
            .any(|group| group.name == name && Some(group.id) != id);
        if clash {
            return Err(UserDirectoryError::Validation(format!(
                "There is already a group named \"{name}\""
            )));
        }

        let saved = match id {
            None => self.groups.create_group(name, description).await?,
            Some(id) => {
                let mut group = self.require_group(id).await?;
                group.name = name.to_string();
                group.description = description.to_string();
                self.groups.update_group(&group).await?;
                group
            }
        };

        self.cache.flush_all("group_saved");
        Ok(saved)
    }

    pub async fn delete_group(&self, id: GroupId) -> Result<(), UserDirectoryError> {
        self.require_group(id).await?;
        self.groups.delete_group(id).await?;
        self.cache.flush_all("group_deleted");
        info!(target = "sitecreator::users", group = %id, "group deleted");
        Ok(())
    }

    pub async fn add_member(
        &self,
        id: GroupId,
        email: &str,
    ) -> Result<UserGroup, UserDirectoryError> {
        let profile = self.require_profile(email).await?;
        let mut group = self.require_group(id).await?;
        if group.add_member(profile.id) {
            self.groups.update_group(&group).await?;
            self.cache.flush_all("group_membership_changed");
        }
        Ok(group)
    }

    pub async fn remove_member(
        &self,
        id: GroupId,
        email: &str,
    ) -> Result<UserGroup, UserDirectoryError> {
        let profile = self.require_profile(email).await?;
        let mut group = self.require_group(id).await?;
        if group.remove_member(profile.id) {
            self.groups.update_group(&group).await?;
            self.cache.flush_all("group_membership_changed");
        }
        Ok(group)
    }

    /// Creates or updates one profile per valid row. With `complete`, every existing profile is
    /// removed first.
    pub async fn import_csv(
        &self,
        text: &str,
        complete: bool,
    ) -> Result<ImportReport, UserDirectoryError> {
        let (rows, mut rejected) = parse_roster(text);

        // A complete import that fails part way has already dropped profiles.
        let applied = self.apply_roster(rows, complete, &mut rejected).await;
        self.cache.flush_all("profiles_imported");
        let imported = applied?;
        rejected.sort_by_key(|rejection| rejection.line);

        info!(
            target = "sitecreator::users",
            imported,
            rejected = rejected.len(),
            complete,
            "user roster imported"
        );
        Ok(ImportReport { imported, rejected })
    }

    async fn apply_roster(
        &self,
        rows: Vec<RosterRow>,
        complete: bool,
        rejected: &mut Vec<RosterRejection>,
    ) -> Result<usize, UserDirectoryError> {
        if complete {
            let removed = self.profiles.delete_all_profiles().await?;
            info!(
                target = "sitecreator::users",
                removed,
                "cleared profiles before complete import"
            );
        }

        let mut imported = 0;
        for row in rows {
            match validate_email(&row.email) {
                Ok(email) => {
                    self.profiles.upsert_profile(&email, row.is_superuser).await?;
                    imported += 1;
                }
                Err(_) => rejected.push(RosterRejection {
                    line: row.line,
                    content: row.email,
                    reason: "invalid e-mail address",
                }),
            }
        }
        Ok(imported)
    }

    pub async fn export_csv(&self) -> Result<String, UserDirectoryError> {
        let profiles = self.profiles.list_profiles().await?;
        Ok(format_roster(&profiles))
    }

    async fn require_group(&self, id: GroupId) -> Result<UserGroup, UserDirectoryError> {
        self.groups
            .find_group(id)
            .await?
            .ok_or(UserDirectoryError::NotFound { entity: "group" })
    }

    async fn require_profile(&self, email: &str) -> Result<UserProfile, UserDirectoryError> {
        self.profiles
            .find_by_email(email)
            .await?
            .ok_or(UserDirectoryError::NotFound { entity: "profile" })
    }
}
