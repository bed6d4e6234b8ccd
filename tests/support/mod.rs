#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use sitecreator::application::{
    access::AccessService,
    chrome::ChromeService,
    repos::{
        AclsRepo, CreateAttachmentParams, CreatePageParams, GroupsRepo, NodesRepo,
        NodesWriteRepo, ProfilesRepo, RepoError, SidebarRepo, UpdateAttachmentParams,
        UpdatePageParams,
    },
    resolver::UrlResolver,
    sidebar::SidebarService,
    tree::TreeService,
    users::UserDirectoryService,
};
use sitecreator::cache::{CacheConfig, ObjectCache};
use sitecreator::config::Settings;
use sitecreator::domain::acl::{AccessControlList, AclDraft};
use sitecreator::domain::nodes::{
    Attachment, AttachmentBlob, AttachmentPayload, ContentNode, NodeMeta, Page,
};
use sitecreator::domain::types::{AclId, BlobId, GroupId, NodeId, ProfileId};
use sitecreator::domain::users::{UserGroup, UserProfile};
use sitecreator::infra::http::{self, AdminState, HttpState, IdentityState};
use time::{Duration, OffsetDateTime};

pub const USER_HEADER: &str = "x-forwarded-email";
pub const ADMIN_HEADER: &str = "x-forwarded-admin";

#[derive(Default)]
struct Store {
    next_id: i64,
    tick: i64,
    nodes: BTreeMap<i64, ContentNode>,
    blobs: HashMap<i64, Bytes>,
    acls: BTreeMap<i64, AccessControlList>,
    profiles: BTreeMap<i64, UserProfile>,
    groups: BTreeMap<i64, UserGroup>,
    sidebar: Option<String>,
    failure: Option<(&'static str, usize)>,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    // Strictly increasing timestamps keep "recently modified" ordering deterministic.
    fn now(&mut self) -> OffsetDateTime {
        self.tick += 1;
        OffsetDateTime::UNIX_EPOCH + Duration::minutes(self.tick)
    }

    /// Errors once `operation` has already succeeded the configured number of times.
    fn trip(&mut self, operation: &'static str) -> Result<(), RepoError> {
        let Some((armed, remaining)) = self.failure else {
            return Ok(());
        };
        if armed != operation {
            return Ok(());
        }
        if remaining == 0 {
            self.failure = None;
            return Err(RepoError::Persistence(format!("{operation} failed")));
        }
        self.failure = Some((armed, remaining - 1));
        Ok(())
    }

    fn pages(&self) -> impl Iterator<Item = &Page> {
        self.nodes.values().filter_map(|node| match node {
            ContentNode::Page(page) => Some(page),
            ContentNode::Attachment(_) => None,
        })
    }

    fn attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.nodes.values().filter_map(|node| match node {
            ContentNode::Attachment(attachment) => Some(attachment),
            ContentNode::Page(_) => None,
        })
    }

    fn sibling_page_exists(&self, parent: Option<NodeId>, name: &str, except: NodeId) -> bool {
        self.pages().any(|page| {
            page.meta.parent_id == parent && page.meta.name == name && page.id() != except
        })
    }
}

/// Repository double holding every table in memory.
#[derive(Default, Clone)]
pub struct MemoryRepo {
    store: Arc<Mutex<Store>>,
}

impl MemoryRepo {
    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().expect("memory store lock")
    }

    /// Makes the call to `operation` after `successes` good ones fail once.
    pub fn fail_after(&self, operation: &'static str, successes: usize) {
        self.store().failure = Some((operation, successes));
    }

    pub fn profile_count(&self) -> usize {
        self.store().profiles.len()
    }

    pub fn acl_count(&self) -> usize {
        self.store().acls.len()
    }

    pub fn blob_count(&self) -> usize {
        self.store().blobs.len()
    }

    pub fn stored_sidebar(&self) -> Option<String> {
        self.store().sidebar.clone()
    }

    pub fn acl(&self, id: AclId) -> Option<AccessControlList> {
        self.store().acls.get(&id.get()).cloned()
    }

    pub fn node(&self, id: NodeId) -> Option<ContentNode> {
        self.store().nodes.get(&id.get()).cloned()
    }
}

fn duplicate() -> RepoError {
    RepoError::Duplicate {
        constraint: "nodes_sibling_name_key".to_string(),
    }
}

#[async_trait]
impl NodesRepo for MemoryRepo {
    async fn find_node(&self, id: NodeId) -> Result<Option<ContentNode>, RepoError> {
        Ok(self.store().nodes.get(&id.get()).cloned())
    }

    async fn find_page(&self, id: NodeId) -> Result<Option<Page>, RepoError> {
        Ok(self.store().pages().find(|page| page.id() == id).cloned())
    }

    async fn find_root(&self) -> Result<Option<Page>, RepoError> {
        Ok(self
            .store()
            .pages()
            .find(|page| page.meta.parent_id.is_none())
            .cloned())
    }

    async fn find_child_page(
        &self,
        parent: NodeId,
        name: &str,
    ) -> Result<Option<Page>, RepoError> {
        Ok(self
            .store()
            .pages()
            .find(|page| page.meta.parent_id == Some(parent) && page.meta.name == name)
            .cloned())
    }

    async fn find_attachment(
        &self,
        parent: NodeId,
        name: &str,
    ) -> Result<Option<Attachment>, RepoError> {
        Ok(self
            .store()
            .attachments()
            .find(|file| file.meta.parent_id == Some(parent) && file.meta.name == name)
            .cloned())
    }

    async fn list_child_pages(&self, parent: NodeId) -> Result<Vec<Page>, RepoError> {
        let mut pages: Vec<Page> = self
            .store()
            .pages()
            .filter(|page| page.meta.parent_id == Some(parent))
            .cloned()
            .collect();
        pages.sort_by(|a, b| a.meta.name.cmp(&b.meta.name));
        Ok(pages)
    }

    async fn list_attachments(&self, parent: NodeId) -> Result<Vec<Attachment>, RepoError> {
        let mut files: Vec<Attachment> = self
            .store()
            .attachments()
            .filter(|file| file.meta.parent_id == Some(parent))
            .cloned()
            .collect();
        files.sort_by(|a, b| a.meta.name.cmp(&b.meta.name));
        Ok(files)
    }

    async fn list_pages(&self) -> Result<Vec<Page>, RepoError> {
        Ok(self.store().pages().cloned().collect())
    }

    async fn list_recent_pages(&self, limit: u32) -> Result<Vec<Page>, RepoError> {
        let mut pages: Vec<Page> = self.store().pages().cloned().collect();
        pages.sort_by(|a, b| b.meta.modified_at.cmp(&a.meta.modified_at));
        pages.truncate(limit as usize);
        Ok(pages)
    }

    async fn load_blob(&self, id: BlobId) -> Result<Option<AttachmentBlob>, RepoError> {
        Ok(self
            .store()
            .blobs
            .get(&id.get())
            .map(|data| AttachmentBlob {
                id,
                data: data.clone(),
            }))
    }
}

#[async_trait]
impl NodesWriteRepo for MemoryRepo {
    async fn create_page(&self, params: CreatePageParams) -> Result<Page, RepoError> {
        let mut store = self.store();
        let id = NodeId(store.next_id());
        if store.sibling_page_exists(params.parent_id, &params.name, id) {
            return Err(duplicate());
        }
        let now = store.now();
        let page = Page {
            meta: NodeMeta {
                id,
                name: params.name,
                created_at: now,
                modified_at: now,
                parent_id: params.parent_id,
                acl_id: params.acl_id,
            },
            title: params.title,
            content: params.content,
        };
        store
            .nodes
            .insert(id.get(), ContentNode::Page(page.clone()));
        Ok(page)
    }

    async fn update_page(&self, params: UpdatePageParams) -> Result<Page, RepoError> {
        let mut store = self.store();
        let Some(ContentNode::Page(existing)) = store.nodes.get(&params.id.get()).cloned() else {
            return Err(RepoError::NotFound);
        };
        if existing.meta.parent_id.is_some()
            && store.sibling_page_exists(existing.meta.parent_id, &params.name, params.id)
        {
            return Err(duplicate());
        }
        let now = store.now();
        let mut page = existing;
        page.meta.name = params.name;
        page.meta.modified_at = now;
        page.title = params.title;
        page.content = params.content;
        store
            .nodes
            .insert(page.id().get(), ContentNode::Page(page.clone()));
        Ok(page)
    }

    async fn set_node_acl(&self, node: NodeId, acl: Option<AclId>) -> Result<(), RepoError> {
        let mut store = self.store();
        store.trip("set_node_acl")?;
        match store.nodes.get_mut(&node.get()) {
            Some(ContentNode::Page(page)) => page.meta.acl_id = acl,
            Some(ContentNode::Attachment(file)) => file.meta.acl_id = acl,
            None => return Err(RepoError::NotFound),
        }
        Ok(())
    }

    async fn create_attachment(
        &self,
        params: CreateAttachmentParams,
    ) -> Result<Attachment, RepoError> {
        let mut store = self.store();
        store.trip("create_attachment")?;
        let taken = store.attachments().any(|file| {
            file.meta.parent_id == Some(params.parent_id) && file.meta.name == params.name
        });
        if taken {
            return Err(duplicate());
        }
        let id = NodeId(store.next_id());
        let now = store.now();
        let attachment = Attachment::new(
            NodeMeta {
                id,
                name: params.name,
                created_at: now,
                modified_at: now,
                parent_id: Some(params.parent_id),
                acl_id: None,
            },
            params.hidden,
            params.payload,
        );
        store
            .nodes
            .insert(id.get(), ContentNode::Attachment(attachment.clone()));
        Ok(attachment)
    }

    async fn update_attachment(
        &self,
        params: UpdateAttachmentParams,
    ) -> Result<Attachment, RepoError> {
        let mut store = self.store();
        store.trip("update_attachment")?;
        let Some(ContentNode::Attachment(existing)) = store.nodes.get(&params.id.get()).cloned()
        else {
            return Err(RepoError::NotFound);
        };
        let mut meta = existing.meta;
        meta.modified_at = store.now();
        let attachment = Attachment::new(meta, params.hidden, params.payload);
        store
            .nodes
            .insert(params.id.get(), ContentNode::Attachment(attachment.clone()));
        Ok(attachment)
    }

    async fn delete_node(&self, id: NodeId) -> Result<(), RepoError> {
        let mut store = self.store();
        store.trip("delete_node")?;
        store.nodes.remove(&id.get());
        Ok(())
    }

    async fn insert_blob(&self, data: Bytes) -> Result<BlobId, RepoError> {
        let mut store = self.store();
        let id = store.next_id();
        store.blobs.insert(id, data);
        Ok(BlobId(id))
    }

    async fn delete_blob(&self, id: BlobId) -> Result<(), RepoError> {
        self.store().blobs.remove(&id.get());
        Ok(())
    }
}

#[async_trait]
impl AclsRepo for MemoryRepo {
    async fn find_acl(&self, id: AclId) -> Result<Option<AccessControlList>, RepoError> {
        Ok(self.store().acls.get(&id.get()).cloned())
    }

    async fn create_acl(&self, draft: AclDraft) -> Result<AccessControlList, RepoError> {
        let mut store = self.store();
        let id = AclId(store.next_id());
        let acl = AccessControlList {
            id,
            group_write: draft.group_write,
            user_write: draft.user_write,
            global_write: draft.global_write,
            group_read: draft.group_read,
            user_read: draft.user_read,
            global_read: draft.global_read,
        };
        store.acls.insert(id.get(), acl.clone());
        Ok(acl)
    }

    async fn update_acl(&self, acl: &AccessControlList) -> Result<(), RepoError> {
        let mut store = self.store();
        if !store.acls.contains_key(&acl.id.get()) {
            return Err(RepoError::NotFound);
        }
        store.acls.insert(acl.id.get(), acl.clone());
        Ok(())
    }

    async fn delete_acl(&self, id: AclId) -> Result<(), RepoError> {
        self.store().acls.remove(&id.get());
        Ok(())
    }
}

#[async_trait]
impl ProfilesRepo for MemoryRepo {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, RepoError> {
        Ok(self
            .store()
            .profiles
            .values()
            .find(|profile| profile.email == email)
            .cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<UserProfile>, RepoError> {
        let mut profiles: Vec<UserProfile> = self.store().profiles.values().cloned().collect();
        profiles.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(profiles)
    }

    async fn list_by_ids(&self, ids: &[ProfileId]) -> Result<Vec<UserProfile>, RepoError> {
        let mut profiles: Vec<UserProfile> = self
            .store()
            .profiles
            .values()
            .filter(|profile| ids.contains(&profile.id))
            .cloned()
            .collect();
        profiles.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(profiles)
    }

    async fn upsert_profile(
        &self,
        email: &str,
        is_superuser: bool,
    ) -> Result<UserProfile, RepoError> {
        let mut store = self.store();
        store.trip("upsert_profile")?;
        if let Some(existing) = store
            .profiles
            .values_mut()
            .find(|profile| profile.email == email)
        {
            existing.is_superuser = is_superuser;
            return Ok(existing.clone());
        }
        let id = ProfileId(store.next_id());
        let profile = UserProfile {
            id,
            email: email.to_string(),
            is_superuser,
        };
        store.profiles.insert(id.get(), profile.clone());
        Ok(profile)
    }

    async fn delete_all_profiles(&self) -> Result<u64, RepoError> {
        let mut store = self.store();
        let removed = store.profiles.len() as u64;
        store.profiles.clear();
        Ok(removed)
    }
}

#[async_trait]
impl GroupsRepo for MemoryRepo {
    async fn list_groups(&self) -> Result<Vec<UserGroup>, RepoError> {
        let mut groups: Vec<UserGroup> = self.store().groups.values().cloned().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn find_group(&self, id: GroupId) -> Result<Option<UserGroup>, RepoError> {
        Ok(self.store().groups.get(&id.get()).cloned())
    }

    async fn list_groups_with_member(
        &self,
        profile: ProfileId,
    ) -> Result<Vec<UserGroup>, RepoError> {
        let mut groups: Vec<UserGroup> = self
            .store()
            .groups
            .values()
            .filter(|group| group.has_member(profile))
            .cloned()
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn create_group(&self, name: &str, description: &str) -> Result<UserGroup, RepoError> {
        let mut store = self.store();
        if store.groups.values().any(|group| group.name == name) {
            return Err(RepoError::Duplicate {
                constraint: "user_groups_name_key".to_string(),
            });
        }
        let id = GroupId(store.next_id());
        let group = UserGroup {
            id,
            name: name.to_string(),
            description: description.to_string(),
            members: Vec::new(),
        };
        store.groups.insert(id.get(), group.clone());
        Ok(group)
    }

    async fn update_group(&self, group: &UserGroup) -> Result<(), RepoError> {
        let mut store = self.store();
        if !store.groups.contains_key(&group.id.get()) {
            return Err(RepoError::NotFound);
        }
        store.groups.insert(group.id.get(), group.clone());
        Ok(())
    }

    async fn delete_group(&self, id: GroupId) -> Result<(), RepoError> {
        self.store().groups.remove(&id.get());
        Ok(())
    }
}

#[async_trait]
impl SidebarRepo for MemoryRepo {
    async fn load_sidebar(&self) -> Result<Option<String>, RepoError> {
        Ok(self.store().sidebar.clone())
    }

    async fn save_sidebar(&self, yaml: &str) -> Result<(), RepoError> {
        self.store().sidebar = Some(yaml.to_string());
        Ok(())
    }
}

/// Every service wired against one [`MemoryRepo`] and one cache, the way `main` wires them.
pub struct Harness {
    pub repo: Arc<MemoryRepo>,
    pub cache: Arc<ObjectCache>,
    pub tree: TreeService,
    pub resolver: UrlResolver,
    pub sidebar: SidebarService,
    pub users: UserDirectoryService,
    pub chrome: ChromeService,
    pub settings: Settings,
}

impl Harness {
    pub fn new() -> Self {
        let settings = Settings::default();
        let repo = Arc::new(MemoryRepo::default());
        let cache = Arc::new(ObjectCache::new(&CacheConfig::default()));

        let access = AccessService::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            repo.clone(),
            repo.clone(),
            cache.clone(),
        );
        let tree = TreeService::new(repo.clone(), repo.clone(), repo.clone(), access, cache.clone());
        let resolver = UrlResolver::new(tree.clone(), repo.clone(), cache.clone());
        let sidebar = SidebarService::new(repo.clone(), tree.clone(), cache.clone());
        let users = UserDirectoryService::new(repo.clone(), repo.clone(), cache.clone());
        let chrome = ChromeService::new(
            settings.site.clone(),
            settings.auth.clone(),
            sidebar.clone(),
        );

        Self {
            repo,
            cache,
            tree,
            resolver,
            sidebar,
            users,
            chrome,
            settings,
        }
    }

    pub fn router(&self) -> Router {
        let http_state = HttpState {
            tree: self.tree.clone(),
            resolver: self.resolver.clone(),
            nodes: self.repo.clone(),
            chrome: self.chrome.clone(),
            files: self.settings.files.clone(),
        };
        let admin_state = AdminState {
            tree: self.tree.clone(),
            sidebar: self.sidebar.clone(),
            users: self.users.clone(),
            chrome: self.chrome.clone(),
            cache: self.cache.clone(),
            upload_limit_bytes: 1024 * 1024,
        };
        let identity_state = IdentityState {
            users: self.users.clone(),
            auth: self.settings.auth.clone(),
        };
        http::build_router(http_state, admin_state, identity_state)
    }

    /// Root page with its own ACL built from `draft`.
    pub async fn root_with(&self, draft: AclDraft) -> Page {
        let acl = self.repo.create_acl(draft).await.expect("create acl");
        self.repo
            .create_page(CreatePageParams {
                parent_id: None,
                acl_id: Some(acl.id),
                name: "Home".to_string(),
                title: "Home".to_string(),
                content: String::new(),
            })
            .await
            .expect("create root")
    }

    pub async fn public_root(&self) -> Page {
        self.root_with(AclDraft::public_read()).await
    }

    /// Child page that inherits its parent's ACL.
    pub async fn page(&self, parent: &Page, name: &str, title: &str) -> Page {
        self.repo
            .create_page(CreatePageParams {
                parent_id: Some(parent.id()),
                acl_id: None,
                name: name.to_string(),
                title: title.to_string(),
                content: format!("<p>{title}</p>"),
            })
            .await
            .expect("create page")
    }

    /// Child page with its own ACL.
    pub async fn page_with_acl(&self, parent: &Page, name: &str, draft: AclDraft) -> Page {
        let acl = self.repo.create_acl(draft).await.expect("create acl");
        self.repo
            .create_page(CreatePageParams {
                parent_id: Some(parent.id()),
                acl_id: Some(acl.id),
                name: name.to_string(),
                title: name.to_string(),
                content: String::new(),
            })
            .await
            .expect("create page")
    }

    pub async fn profile(&self, email: &str, is_superuser: bool) -> UserProfile {
        self.repo
            .upsert_profile(email, is_superuser)
            .await
            .expect("create profile")
    }

    pub async fn group(&self, name: &str, members: &[&UserProfile]) -> UserGroup {
        let mut group = self
            .repo
            .create_group(name, "")
            .await
            .expect("create group");
        group.members = members.iter().map(|profile| profile.id).collect();
        self.repo.update_group(&group).await.expect("update group");
        group
    }

    pub async fn attach(&self, page: &Page, name: &str, payload: AttachmentPayload) -> Attachment {
        self.repo
            .create_attachment(CreateAttachmentParams {
                parent_id: page.id(),
                name: name.to_string(),
                hidden: false,
                payload,
            })
            .await
            .expect("create attachment")
    }

    pub async fn blob(&self, data: &'static [u8]) -> BlobId {
        self.repo
            .insert_blob(Bytes::from_static(data))
            .await
            .expect("insert blob")
    }
}
