//! Effective-ACL resolution, access decisions and ACL editing.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::application::repos::{
    AclsRepo, GroupsRepo, NodesRepo, NodesWriteRepo, ProfilesRepo, RepoError,
};
use crate::cache::{ObjectCache, ViewerKey};
use crate::domain::acl::{AccessControlList, AclList};
use crate::domain::nodes::{NodeMeta, Page};
use crate::domain::types::{AccessKind, GroupId, NodeId};
use crate::domain::users::{UserGroup, UserProfile};

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("node {node} has no access-control list in its ancestor chain")]
    MissingAcl { node: NodeId },
    #[error("no user profile exists for `{0}`")]
    UnknownProfile(String),
    #[error("group {0} does not exist")]
    UnknownGroup(GroupId),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A grant requested from the ACL editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclGrant {
    Group { list: AclList, id: GroupId },
    Profile { list: AclList, email: String },
}

impl AclGrant {
    fn list(&self) -> AclList {
        match self {
            AclGrant::Group { list, .. } | AclGrant::Profile { list, .. } => *list,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EditAclCommand {
    pub global_write: bool,
    pub global_read: bool,
    pub grants: Vec<AclGrant>,
    pub removals: Vec<(AclList, i64)>,
}

/// Everything the ACL editor shows for one page.
#[derive(Debug, Clone)]
pub struct AclOverview {
    pub acl: AccessControlList,
    pub inherits: bool,
    pub groups_with_write: Vec<UserGroup>,
    pub groups_without_write: Vec<UserGroup>,
    pub groups_with_read: Vec<UserGroup>,
    pub groups_without_read: Vec<UserGroup>,
    pub profiles_with_write: Vec<UserProfile>,
    pub profiles_with_read: Vec<UserProfile>,
}

#[derive(Clone)]
pub struct AccessService {
    nodes: Arc<dyn NodesRepo>,
    writer: Arc<dyn NodesWriteRepo>,
    acls: Arc<dyn AclsRepo>,
    groups: Arc<dyn GroupsRepo>,
    profiles: Arc<dyn ProfilesRepo>,
    cache: Arc<ObjectCache>,
}

impl AccessService {
    pub fn new(
        nodes: Arc<dyn NodesRepo>,
        writer: Arc<dyn NodesWriteRepo>,
        acls: Arc<dyn AclsRepo>,
        groups: Arc<dyn GroupsRepo>,
        profiles: Arc<dyn ProfilesRepo>,
        cache: Arc<ObjectCache>,
    ) -> Self {
        Self {
            nodes,
            writer,
            acls,
            groups,
            profiles,
            cache,
        }
    }

    /// The ACL governing `node`: its own, or the nearest ancestor's.
    pub async fn effective_acl(&self, node: &NodeMeta) -> Result<AccessControlList, AccessError> {
        if let Some(acl) = self.cache.get_effective_acl(node.id) {
            return Ok(acl);
        }

        let owner = self.inherits_acl_from(node).await?;
        let acl_id = owner
            .acl_id
            .ok_or(AccessError::MissingAcl { node: node.id })?;
        let acl = self
            .acls
            .find_acl(acl_id)
            .await?
            .ok_or(AccessError::MissingAcl { node: node.id })?;

        self.cache.set_effective_acl(node.id, acl.clone());
        Ok(acl)
    }

    /// Nearest node, starting at `node` itself, that owns an ACL.
    pub async fn inherits_acl_from(&self, node: &NodeMeta) -> Result<NodeMeta, AccessError> {
        let mut current = node.clone();
        let mut visited = HashSet::new();

        loop {
            if current.acl_id.is_some() {
                return Ok(current);
            }
            if !visited.insert(current.id) {
                warn!(
                    target = "sitecreator::access",
                    node = %node.id,
                    "parent chain revisits a node"
                );
                return Err(AccessError::MissingAcl { node: node.id });
            }

            let Some(parent_id) = current.parent_id else {
                return Err(AccessError::MissingAcl { node: node.id });
            };
            current = match self.nodes.find_node(parent_id).await? {
                Some(parent) => parent.meta().clone(),
                None => return Err(AccessError::MissingAcl { node: node.id }),
            };
        }
    }

    pub async fn can_write(
        &self,
        node: &NodeMeta,
        viewer: Option<&UserProfile>,
    ) -> Result<bool, AccessError> {
        let key = ViewerKey::of(viewer.map(|profile| profile.id));
        if let Some(allowed) = self.cache.get_access(node.id, AccessKind::Write, key) {
            return Ok(allowed);
        }

        let acl = self.effective_acl(node).await?;
        let allowed = self.evaluate(&acl, AccessKind::Write, viewer).await?;
        self.cache
            .set_access(node.id, AccessKind::Write, key, allowed);
        Ok(allowed)
    }

    /// Writers can always read; otherwise the read grants decide.
    pub async fn can_read(
        &self,
        node: &NodeMeta,
        viewer: Option<&UserProfile>,
    ) -> Result<bool, AccessError> {
        let key = ViewerKey::of(viewer.map(|profile| profile.id));
        if let Some(allowed) = self.cache.get_access(node.id, AccessKind::Read, key) {
            return Ok(allowed);
        }

        let allowed = if self.can_write(node, viewer).await? {
            true
        } else {
            let acl = self.effective_acl(node).await?;
            self.evaluate(&acl, AccessKind::Read, viewer).await?
        };
        self.cache.set_access(node.id, AccessKind::Read, key, allowed);
        Ok(allowed)
    }

    async fn evaluate(
        &self,
        acl: &AccessControlList,
        kind: AccessKind,
        viewer: Option<&UserProfile>,
    ) -> Result<bool, AccessError> {
        let grants = acl.grants(kind);
        if grants.admits(viewer, &[]) {
            return Ok(true);
        }

        match viewer {
            Some(profile) if !grants.groups.is_empty() => {
                let memberships = self.groups.list_groups_with_member(profile.id).await?;
                Ok(grants.admits(viewer, &memberships))
            }
            _ => Ok(false),
        }
    }

    /// Applies an editor submission. An inheriting page first receives its own copy of the
    /// inherited ACL so the ancestor's record is left untouched.
    pub async fn edit_acl(
        &self,
        page: &Page,
        command: EditAclCommand,
    ) -> Result<AccessControlList, AccessError> {
        let mut granted = Vec::with_capacity(command.grants.len());
        for grant in &command.grants {
            granted.push((grant.list(), self.resolve_grantee(grant).await?));
        }

        let mut acl = match page.meta.acl_id {
            Some(acl_id) => self
                .acls
                .find_acl(acl_id)
                .await?
                .ok_or(AccessError::MissingAcl { node: page.id() })?,
            None => {
                let inherited = self.effective_acl(&page.meta).await?;
                let copy = self.acls.create_acl(inherited.to_draft()).await?;
                if let Err(err) = self.writer.set_node_acl(page.id(), Some(copy.id)).await {
                    if let Err(cleanup) = self.acls.delete_acl(copy.id).await {
                        warn!(
                            target = "sitecreator::access",
                            acl = %copy.id,
                            error = %cleanup,
                            "failed to discard unattached acl copy"
                        );
                    }
                    return Err(err.into());
                }
                debug!(
                    target = "sitecreator::access",
                    page = %page.id(),
                    from_acl = %inherited.id,
                    to_acl = %copy.id,
                    "cloned inherited acl"
                );
                copy
            }
        };

        acl.global_write = command.global_write;
        acl.global_read = command.global_read;

        for list in AclList::ALL {
            for (_, id) in granted.iter().filter(|(target, _)| *target == list) {
                acl.grant(list, *id);
            }
            for (_, id) in command.removals.iter().filter(|(target, _)| *target == list) {
                acl.revoke(list, *id);
            }
        }

        let saved = self.acls.update_acl(&acl).await;
        self.cache.flush_all("acl_updated");
        saved?;
        Ok(acl)
    }

    async fn resolve_grantee(&self, grant: &AclGrant) -> Result<i64, AccessError> {
        match grant {
            AclGrant::Group { id, .. } => match self.groups.find_group(*id).await? {
                Some(group) => Ok(group.id.get()),
                None => Err(AccessError::UnknownGroup(*id)),
            },
            AclGrant::Profile { email, .. } => match self.profiles.find_by_email(email).await? {
                Some(profile) => Ok(profile.id.get()),
                None => Err(AccessError::UnknownProfile(email.clone())),
            },
        }
    }

    pub async fn acl_overview(&self, page: &Page) -> Result<AclOverview, AccessError> {
        let acl = self.effective_acl(&page.meta).await?;
        let groups = self.groups.list_groups().await?;

        let (groups_with_write, groups_without_write): (Vec<_>, Vec<_>) = groups
            .iter()
            .cloned()
            .partition(|group| acl.group_write.contains(&group.id));
        let (groups_with_read, groups_without_read): (Vec<_>, Vec<_>) = groups
            .into_iter()
            .partition(|group| acl.group_read.contains(&group.id));

        let profiles_with_write = self.profiles.list_by_ids(&acl.user_write).await?;
        let profiles_with_read = self.profiles.list_by_ids(&acl.user_read).await?;

        Ok(AclOverview {
            inherits: page.meta.inherits_acl(),
            acl,
            groups_with_write,
            groups_without_write,
            groups_with_read,
            groups_without_read,
            profiles_with_write,
            profiles_with_read,
        })
    }
}
