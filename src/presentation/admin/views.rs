use askama::Template;

use crate::cache::CacheStats;
use crate::presentation::views::LayoutChrome;

#[derive(Clone)]
pub struct AdminNavigationItemView {
    pub label: &'static str,
    pub href: &'static str,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct AdminLayout<T> {
    pub chrome: LayoutChrome,
    pub asset_version: String,
    pub navigation: Vec<AdminNavigationItemView>,
    pub content: T,
}

impl<T> AdminLayout<T> {
    pub fn new(chrome: LayoutChrome, active: &str, content: T) -> Self {
        Self {
            navigation: navigation(active, chrome.account.is_admin),
            chrome,
            asset_version: asset_version(),
            content,
        }
    }
}

fn asset_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

const SUPERUSER_NAV: [(&str, &str); 3] = [
    ("Dashboard", "/admin/"),
    ("Recently modified", "/admin/recent/"),
    ("Help", "/admin/help/"),
];

const ADMIN_NAV: [(&str, &str); 4] = [
    ("Users", "/admin/users/"),
    ("Groups", "/admin/users/listgroups/"),
    ("Sidebar", "/admin/edit/sidebar/"),
    ("Cache", "/admin/memcache_info/"),
];

fn navigation(active: &str, is_admin: bool) -> Vec<AdminNavigationItemView> {
    let admin: &[(&str, &str)] = if is_admin { &ADMIN_NAV } else { &[] };
    SUPERUSER_NAV
        .iter()
        .chain(admin.iter())
        .map(|(label, href)| AdminNavigationItemView {
            label,
            href,
            is_active: *href == active,
        })
        .collect()
}

pub struct AdminNoticeView {
    pub text: String,
}

impl AdminNoticeView {
    /// Maps the `m` query parameter to the notice shown above a form.
    pub fn from_code(code: Option<&str>) -> Option<Self> {
        let text = match code? {
            "msgChangesSaved" => "Your changes have been saved.",
            "msgPageCreated" => "The page has been created.",
            "msgFileUploaded" => "The file has been attached.",
            _ => return None,
        };
        Some(Self {
            text: text.to_string(),
        })
    }
}

pub struct AdminDashboardView {
    pub title: String,
    pub root_edit_href: Option<String>,
    pub new_page_href: String,
}

#[derive(Template)]
#[template(path = "admin/dashboard.html")]
pub struct AdminDashboardTemplate {
    pub view: AdminLayout<AdminDashboardView>,
}

pub struct AdminHelpView {
    pub title: String,
}

#[derive(Template)]
#[template(path = "admin/help.html")]
pub struct AdminHelpTemplate {
    pub view: AdminLayout<AdminHelpView>,
}

pub struct AdminRecentRowView {
    pub title: String,
    pub view_href: String,
    pub edit_href: String,
    pub modified: String,
}

pub struct AdminRecentView {
    pub title: String,
    pub pages: Vec<AdminRecentRowView>,
}

#[derive(Template)]
#[template(path = "admin/recent.html")]
pub struct AdminRecentTemplate {
    pub view: AdminLayout<AdminRecentView>,
}

pub struct AdminFileRowView {
    pub id: String,
    pub name: String,
    pub href: String,
    pub extension: String,
    pub is_link: bool,
    pub hidden: bool,
    pub delete_action: String,
}

pub struct AdminGroupOptionView {
    pub id: String,
    pub name: String,
}

pub struct AdminGranteeView {
    pub id: String,
    pub label: String,
}

pub struct AdminAclEditorView {
    pub page_id: String,
    pub inherits: bool,
    pub global_write: bool,
    pub global_read: bool,
    pub write_groups: Vec<AdminGranteeView>,
    pub read_groups: Vec<AdminGranteeView>,
    pub write_users: Vec<AdminGranteeView>,
    pub read_users: Vec<AdminGranteeView>,
    pub groups_without_write: Vec<AdminGroupOptionView>,
    pub groups_without_read: Vec<AdminGroupOptionView>,
}

pub struct AdminPageEditorView {
    pub heading: String,
    pub form_action: String,
    pub page_id: Option<String>,
    pub parent_id: Option<String>,
    pub name: String,
    pub title: String,
    pub content: String,
    pub is_root: bool,
    pub error_message: Option<String>,
    pub notice: Option<AdminNoticeView>,
    pub view_href: Option<String>,
    pub new_child_href: Option<String>,
    pub download_href: Option<String>,
    pub delete_action: Option<String>,
    pub sidebar_action: Option<String>,
    pub in_sidebar: bool,
    pub files: Vec<AdminFileRowView>,
    pub acl: Option<AdminAclEditorView>,
}

impl AdminPageEditorView {
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }
}

#[derive(Template)]
#[template(path = "admin/edit_page.html")]
pub struct AdminPageEditorTemplate {
    pub view: AdminLayout<AdminPageEditorView>,
}

pub struct AdminSidebarEditorView {
    pub yaml: String,
    pub error_message: Option<String>,
}

#[derive(Template)]
#[template(path = "admin/edit_sidebar.html")]
pub struct AdminSidebarEditorTemplate {
    pub view: AdminLayout<AdminSidebarEditorView>,
}

pub struct AdminUserRowView {
    pub email: String,
    pub is_superuser: bool,
    pub edit_href: String,
}

pub struct AdminGroupRowView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub member_count: usize,
    pub members_href: String,
    pub edit_href: String,
    pub delete_action: String,
}

pub struct AdminGroupListView {
    pub heading: String,
    pub groups: Vec<AdminGroupRowView>,
    pub all_users_href: String,
    pub new_group_href: String,
}

impl AdminGroupListView {
    pub fn has_groups(&self) -> bool {
        !self.groups.is_empty()
    }
}

#[derive(Template)]
#[template(path = "admin/list_groups.html")]
pub struct AdminGroupListTemplate {
    pub view: AdminLayout<AdminGroupListView>,
}

pub struct AdminUserListView {
    pub heading: String,
    pub users: Vec<AdminUserRowView>,
}

#[derive(Template)]
#[template(path = "admin/view_group.html")]
pub struct AdminUserListTemplate {
    pub view: AdminLayout<AdminUserListView>,
}

pub struct AdminGroupEditorView {
    pub heading: String,
    pub form_action: String,
    pub name: String,
    pub description: String,
    pub error_message: Option<String>,
}

#[derive(Template)]
#[template(path = "admin/edit_group.html")]
pub struct AdminGroupEditorTemplate {
    pub view: AdminLayout<AdminGroupEditorView>,
}

pub struct AdminUserLookupView {
    pub email: String,
    pub error_message: Option<String>,
}

#[derive(Template)]
#[template(path = "admin/find_user.html")]
pub struct AdminUserLookupTemplate {
    pub view: AdminLayout<AdminUserLookupView>,
}

pub struct AdminMembershipView {
    pub group_name: String,
    pub action: String,
}

pub struct AdminUserEditorView {
    pub email: String,
    pub form_action: String,
    pub is_superuser: bool,
    pub memberships: Vec<AdminMembershipView>,
    pub available_groups: Vec<AdminMembershipView>,
}

#[derive(Template)]
#[template(path = "admin/edit_user.html")]
pub struct AdminUserEditorTemplate {
    pub view: AdminLayout<AdminUserEditorView>,
}

pub struct AdminRejectedLineView {
    pub line: usize,
    pub content: String,
    pub reason: &'static str,
}

pub struct AdminBulkUsersView {
    pub users_text: String,
    pub imported: Option<usize>,
    pub rejected: Vec<AdminRejectedLineView>,
}

impl AdminBulkUsersView {
    pub fn has_rejections(&self) -> bool {
        !self.rejected.is_empty()
    }
}

#[derive(Template)]
#[template(path = "admin/bulk_edit_users.html")]
pub struct AdminBulkUsersTemplate {
    pub view: AdminLayout<AdminBulkUsersView>,
}

pub struct AdminCacheInfoView {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub flushes: u64,
    pub items: usize,
    pub capacity: usize,
    pub hit_ratio: String,
    pub flush_action: String,
}

impl From<CacheStats> for AdminCacheInfoView {
    fn from(info: CacheStats) -> Self {
        let lookups = info.hits + info.misses;
        let hit_ratio = if lookups == 0 {
            "n/a".to_string()
        } else {
            format!("{:.1}%", info.hits as f64 * 100.0 / lookups as f64)
        };
        Self {
            hits: info.hits,
            misses: info.misses,
            evictions: info.evictions,
            flushes: info.flushes,
            items: info.items,
            capacity: info.capacity,
            hit_ratio,
            flush_action: "/admin/memcache_info/flush/".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "admin/memcache_info.html")]
pub struct AdminCacheInfoTemplate {
    pub view: AdminLayout<AdminCacheInfoView>,
}
