mod acl;
mod dashboard;
mod files;
mod forms;
mod groups;
mod pages;
mod sidebar;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    application::{
        chrome::ChromeService, identity::Identity, sidebar::SidebarService, tree::TreeService,
        users::UserDirectoryService,
    },
    cache::ObjectCache,
    presentation::admin::views::AdminLayout,
};

use super::identity::{require_admin, require_superuser};

#[derive(Clone)]
pub struct AdminState {
    pub tree: TreeService,
    pub sidebar: SidebarService,
    pub users: UserDirectoryService,
    pub chrome: ChromeService,
    pub cache: Arc<ObjectCache>,
    pub upload_limit_bytes: usize,
}

pub fn build_admin_router(state: AdminState) -> Router {
    let upload_limit = state.upload_limit_bytes;

    let superuser_routes = Router::new()
        .route("/admin/", get(dashboard::admin_index))
        .route("/admin/recent/", get(dashboard::admin_recently_modified))
        .route("/admin/help/", get(dashboard::admin_help))
        .route(
            "/admin/edit/sidebar/",
            get(sidebar::admin_sidebar_edit).post(sidebar::admin_sidebar_save),
        )
        .route(
            "/admin/edit/add_to_sidebar/{id}",
            post(sidebar::admin_add_to_sidebar),
        )
        .route(
            "/admin/edit/user/",
            get(users::admin_user_lookup).post(users::admin_user_lookup_submit),
        )
        .route(
            "/admin/edit/user/{email}",
            get(users::admin_user_edit).post(users::admin_user_update),
        )
        .route("/admin/users/", get(groups::admin_filter_users))
        .route("/admin/users/bygroup/", get(groups::admin_all_users))
        .route("/admin/users/bygroup/{id}", get(groups::admin_group_members))
        .route("/admin/users/listgroups/", get(groups::admin_list_groups))
        .route(
            "/admin/users/newgroup/",
            get(groups::admin_group_new).post(groups::admin_group_create),
        )
        .route(
            "/admin/users/editgroup/{id}",
            get(groups::admin_group_edit).post(groups::admin_group_update),
        )
        .route("/admin/users/deletegroup/{id}", post(groups::admin_group_delete))
        .route(
            "/admin/users/addtogroup/{id}/{email}",
            post(groups::admin_group_add_member),
        )
        .route(
            "/admin/users/removefromgroup/{id}/{email}",
            post(groups::admin_group_remove_member),
        )
        .route(
            "/admin/bulkeditusers/",
            get(users::admin_bulk_users)
                .post(users::admin_bulk_users_submit)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/admin/exportusers/", get(users::admin_export_users))
        .route("/admin/download/{file}", get(pages::admin_page_download))
        .route_layer(middleware::from_fn_with_state(
            state.chrome.clone(),
            require_superuser,
        ));

    let admin_routes = Router::new()
        .route("/admin/memcache_info/", get(dashboard::admin_cache_info))
        .route("/admin/memcache_info/flush/", post(dashboard::admin_cache_flush))
        .route_layer(middleware::from_fn_with_state(
            state.chrome.clone(),
            require_admin,
        ));

    let editor_routes = Router::new()
        .route(
            "/admin/new/",
            get(pages::admin_page_new).post(pages::admin_page_create),
        )
        .route(
            "/admin/new/{parent_id}",
            get(pages::admin_page_new_under).post(pages::admin_page_create_under),
        )
        .route(
            "/admin/edit/{id}/",
            get(pages::admin_page_edit).post(pages::admin_page_update),
        )
        .route("/admin/editacl", post(acl::admin_acl_update))
        .route(
            "/admin/addfile/",
            post(files::admin_file_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/admin/deletefile/{page_id}/{file_id}",
            post(files::admin_file_delete),
        )
        .route("/admin/deletepage/{id}/", post(pages::admin_page_delete));

    superuser_routes
        .merge(admin_routes)
        .merge(editor_routes)
        .with_state(state)
}

/// Wraps `content` in the admin layout for `identity`, or returns the error response.
async fn admin_layout<T>(
    state: &AdminState,
    identity: &Identity,
    path: &str,
    content: T,
) -> Result<AdminLayout<T>, Response> {
    match state.chrome.load(identity, path).await {
        Ok(chrome) => Ok(AdminLayout::new(chrome, path, content)),
        Err(err) => Err(err.into_response()),
    }
}

/// Path segment form of an e-mail address.
fn email_segment(email: &str) -> String {
    url::form_urlencoded::byte_serialize(email.as_bytes()).collect()
}

fn edit_page_href(id: impl std::fmt::Display) -> String {
    format!("/admin/edit/{id}/")
}

fn edit_user_href(email: &str) -> String {
    format!("/admin/edit/user/{}", email_segment(email))
}
