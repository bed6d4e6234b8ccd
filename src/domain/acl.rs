//! Access-control lists and their evaluation rules.

use serde::Serialize;

use crate::domain::{
    types::{AccessKind, AclId, GroupId, ProfileId},
    users::{UserGroup, UserProfile},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessControlList {
    pub id: AclId,
    pub group_write: Vec<GroupId>,
    pub user_write: Vec<ProfileId>,
    pub global_write: bool,
    pub group_read: Vec<GroupId>,
    pub user_read: Vec<ProfileId>,
    pub global_read: bool,
}

/// Field values of an ACL that has not been persisted yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclDraft {
    pub group_write: Vec<GroupId>,
    pub user_write: Vec<ProfileId>,
    pub global_write: bool,
    pub group_read: Vec<GroupId>,
    pub user_read: Vec<ProfileId>,
    pub global_read: bool,
}

impl AclDraft {
    pub fn public_read() -> Self {
        Self {
            global_read: true,
            ..Self::default()
        }
    }
}

/// The three grant fields of one access kind.
#[derive(Debug, Clone, Copy)]
pub struct AclGrants<'a> {
    pub global: bool,
    pub users: &'a [ProfileId],
    pub groups: &'a [GroupId],
}

impl AclGrants<'_> {
    /// Evaluates the grants for `viewer`. `groups` must contain every group listed in the grants
    /// that still exists; missing ones are ignored.
    pub fn admits(&self, viewer: Option<&UserProfile>, groups: &[UserGroup]) -> bool {
        if self.global {
            return true;
        }

        let Some(profile) = viewer else {
            return false;
        };

        if profile.is_superuser || self.users.contains(&profile.id) {
            return true;
        }

        groups
            .iter()
            .filter(|group| self.groups.contains(&group.id))
            .any(|group| group.has_member(profile.id))
    }
}

/// Names one of the four membership lists on an ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AclList {
    GroupWrite,
    GroupRead,
    UserWrite,
    UserRead,
}

impl AclList {
    pub const ALL: [AclList; 4] = [
        AclList::GroupWrite,
        AclList::GroupRead,
        AclList::UserWrite,
        AclList::UserRead,
    ];

    pub fn field_name(self) -> &'static str {
        match self {
            AclList::GroupWrite => "group_write",
            AclList::GroupRead => "group_read",
            AclList::UserWrite => "user_write",
            AclList::UserRead => "user_read",
        }
    }

    pub fn holds_users(self) -> bool {
        matches!(self, AclList::UserWrite | AclList::UserRead)
    }
}

impl AccessControlList {
    pub fn grants(&self, kind: AccessKind) -> AclGrants<'_> {
        match kind {
            AccessKind::Write => AclGrants {
                global: self.global_write,
                users: &self.user_write,
                groups: &self.group_write,
            },
            AccessKind::Read => AclGrants {
                global: self.global_read,
                users: &self.user_read,
                groups: &self.group_read,
            },
        }
    }

    /// Copies the grant fields into a new, unsaved ACL.
    pub fn to_draft(&self) -> AclDraft {
        AclDraft {
            group_write: self.group_write.clone(),
            user_write: self.user_write.clone(),
            global_write: self.global_write,
            group_read: self.group_read.clone(),
            user_read: self.user_read.clone(),
            global_read: self.global_read,
        }
    }

    pub fn ids_in(&self, list: AclList) -> Vec<i64> {
        match list {
            AclList::GroupWrite => self.group_write.iter().map(|id| id.get()).collect(),
            AclList::GroupRead => self.group_read.iter().map(|id| id.get()).collect(),
            AclList::UserWrite => self.user_write.iter().map(|id| id.get()).collect(),
            AclList::UserRead => self.user_read.iter().map(|id| id.get()).collect(),
        }
    }

    /// Adds `id` to `list` unless already present.
    pub fn grant(&mut self, list: AclList, id: i64) {
        match list {
            AclList::GroupWrite => push_unique(&mut self.group_write, GroupId(id)),
            AclList::GroupRead => push_unique(&mut self.group_read, GroupId(id)),
            AclList::UserWrite => push_unique(&mut self.user_write, ProfileId(id)),
            AclList::UserRead => push_unique(&mut self.user_read, ProfileId(id)),
        }
    }

    pub fn revoke(&mut self, list: AclList, id: i64) {
        match list {
            AclList::GroupWrite => self.group_write.retain(|g| g.get() != id),
            AclList::GroupRead => self.group_read.retain(|g| g.get() != id),
            AclList::UserWrite => self.user_write.retain(|u| u.get() != id),
            AclList::UserRead => self.user_read.retain(|u| u.get() != id),
        }
    }

    /// Group ids referenced by either access kind.
    pub fn referenced_groups(&self) -> Vec<GroupId> {
        let mut ids = self.group_write.clone();
        for id in &self.group_read {
            push_unique(&mut ids, *id);
        }
        ids
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, value: T) {
    if !items.contains(&value) {
        items.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acl() -> AccessControlList {
        AccessControlList {
            id: AclId(1),
            group_write: Vec::new(),
            user_write: Vec::new(),
            global_write: false,
            group_read: Vec::new(),
            user_read: Vec::new(),
            global_read: false,
        }
    }

    fn profile(id: i64, is_superuser: bool) -> UserProfile {
        UserProfile {
            id: ProfileId(id),
            email: format!("user{id}@example.com"),
            is_superuser,
        }
    }

    fn group(id: i64, members: &[i64]) -> UserGroup {
        UserGroup {
            id: GroupId(id),
            name: format!("group-{id}"),
            description: String::new(),
            members: members.iter().copied().map(ProfileId).collect(),
        }
    }

    #[test]
    fn global_grant_admits_anonymous() {
        let mut record = acl();
        record.global_read = true;
        assert!(record.grants(AccessKind::Read).admits(None, &[]));
        assert!(!record.grants(AccessKind::Write).admits(None, &[]));
    }

    #[test]
    fn superuser_is_admitted_without_listing() {
        let record = acl();
        let admin = profile(1, true);
        assert!(record.grants(AccessKind::Write).admits(Some(&admin), &[]));
    }

    #[test]
    fn listed_user_is_admitted() {
        let mut record = acl();
        record.user_write.push(ProfileId(4));
        assert!(
            record
                .grants(AccessKind::Write)
                .admits(Some(&profile(4, false)), &[])
        );
        assert!(
            !record
                .grants(AccessKind::Write)
                .admits(Some(&profile(5, false)), &[])
        );
    }

    #[test]
    fn group_membership_is_admitted_only_for_listed_groups() {
        let mut record = acl();
        record.group_write.push(GroupId(10));
        let groups = vec![group(10, &[3]), group(11, &[4])];
        let grants = record.grants(AccessKind::Write);
        assert!(grants.admits(Some(&profile(3, false)), &groups));
        assert!(!grants.admits(Some(&profile(4, false)), &groups));
    }

    #[test]
    fn grant_and_revoke_keep_lists_unique() {
        let mut record = acl();
        record.grant(AclList::GroupRead, 2);
        record.grant(AclList::GroupRead, 2);
        record.grant(AclList::UserWrite, 9);
        assert_eq!(record.group_read, vec![GroupId(2)]);
        assert_eq!(record.user_write, vec![ProfileId(9)]);

        record.revoke(AclList::GroupRead, 2);
        assert!(record.group_read.is_empty());
    }

    #[test]
    fn draft_copies_every_field() {
        let mut record = acl();
        record.global_read = true;
        record.user_read.push(ProfileId(3));
        let draft = record.to_draft();
        assert!(draft.global_read);
        assert_eq!(draft.user_read, vec![ProfileId(3)]);
    }
}
