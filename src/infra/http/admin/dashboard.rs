use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use time::{format_description::FormatItem, macros::format_description};
use tracing::info;

use crate::{
    application::identity::Identity,
    infra::http::tree_error_to_http,
    presentation::{
        admin::views::{
            AdminCacheInfoTemplate, AdminCacheInfoView, AdminDashboardTemplate,
            AdminDashboardView, AdminHelpTemplate, AdminHelpView, AdminRecentRowView,
            AdminRecentTemplate, AdminRecentView,
        },
        views::render_template_response,
    },
};

use super::{AdminState, admin_layout, edit_page_href};

const MODIFIED_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute] UTC");

pub(super) async fn admin_index(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    let root = match state.tree.root().await {
        Ok(root) => root,
        Err(err) => {
            return tree_error_to_http("infra::http::admin::admin_index", err).into_response();
        }
    };

    let content = AdminDashboardView {
        title: "Site administration".to_string(),
        root_edit_href: root.map(|page| edit_page_href(page.id())),
        new_page_href: "/admin/new/".to_string(),
    };

    match admin_layout(&state, &identity, "/admin/", content).await {
        Ok(view) => render_template_response(AdminDashboardTemplate { view }, StatusCode::OK),
        Err(response) => response,
    }
}

pub(super) async fn admin_recently_modified(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    const SOURCE: &str = "infra::http::admin::admin_recently_modified";

    let pages = match state.tree.recently_modified().await {
        Ok(pages) => pages,
        Err(err) => return tree_error_to_http(SOURCE, err).into_response(),
    };

    let mut rows = Vec::with_capacity(pages.len());
    for page in pages {
        let path = match state.tree.path(&page.meta).await {
            Ok(path) => path,
            Err(err) => return tree_error_to_http(SOURCE, err).into_response(),
        };
        rows.push(AdminRecentRowView {
            view_href: format!("/{path}"),
            edit_href: edit_page_href(page.id()),
            modified: page
                .meta
                .modified_at
                .format(MODIFIED_FORMAT)
                .unwrap_or_default(),
            title: page.title,
        });
    }

    let content = AdminRecentView {
        title: "Recently modified pages".to_string(),
        pages: rows,
    };

    match admin_layout(&state, &identity, "/admin/recent/", content).await {
        Ok(view) => render_template_response(AdminRecentTemplate { view }, StatusCode::OK),
        Err(response) => response,
    }
}

pub(super) async fn admin_help(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    let content = AdminHelpView {
        title: "Help".to_string(),
    };

    match admin_layout(&state, &identity, "/admin/help/", content).await {
        Ok(view) => render_template_response(AdminHelpTemplate { view }, StatusCode::OK),
        Err(response) => response,
    }
}

pub(super) async fn admin_cache_info(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    let content = AdminCacheInfoView::from(state.cache.stats());

    match admin_layout(&state, &identity, "/admin/memcache_info/", content).await {
        Ok(view) => render_template_response(AdminCacheInfoTemplate { view }, StatusCode::OK),
        Err(response) => response,
    }
}

pub(super) async fn admin_cache_flush(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    state.cache.flush_all("admin_request");
    info!(
        target = "sitecreator::http::admin",
        admin = identity.email.as_deref().unwrap_or(""),
        "object cache flushed on request"
    );
    Redirect::to("/admin/memcache_info/").into_response()
}
