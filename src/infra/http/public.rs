use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, EXPIRES},
    },
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use bytes::Bytes;
use time::{Duration, OffsetDateTime, format_description::FormatItem, macros::format_description};
use tracing::warn;

use crate::{
    application::{
        chrome::ChromeService, identity::Identity, repos::NodesRepo, resolver::UrlResolver,
        tree::TreeService,
    },
    config::FileSettings,
    domain::nodes::{Attachment, AttachmentPayload, ContentNode, Page},
    presentation::views::{
        BreadcrumbView, FileLinkView, LayoutContext, PageTemplate, PageView, SitemapEntryView,
        SitemapTemplate, SitemapView, file_extension, render_template_response,
    },
};

use super::{
    access_error_to_http, forbidden_page, not_found_page, repo_error_to_http, sanitize_filename,
    tree_error_to_http,
};

const HTTP_DATE: &[FormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

#[derive(Clone)]
pub struct HttpState {
    pub tree: TreeService,
    pub resolver: UrlResolver,
    pub nodes: Arc<dyn NodesRepo>,
    pub chrome: ChromeService,
    pub files: FileSettings,
}

pub fn build_public_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(site_root))
        .route("/_treedata/", get(tree_data))
        .route("/sitemap/", get(sitemap))
        .route("/{*path}", get(site_path))
        .with_state(state)
}

async fn site_root(
    State(state): State<HttpState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    serve_path(&state, &identity, String::new()).await
}

async fn site_path(
    State(state): State<HttpState>,
    Extension(identity): Extension<Identity>,
    Path(path): Path<String>,
) -> Response {
    serve_path(&state, &identity, path).await
}

async fn serve_path(state: &HttpState, identity: &Identity, path: String) -> Response {
    const SOURCE: &str = "infra::http::public::serve_path";

    let request_path = format!("/{path}");
    match state.resolver.resolve(&path).await {
        Ok(Some(ContentNode::Page(page))) => serve_page(state, identity, &request_path, page).await,
        Ok(Some(ContentNode::Attachment(attachment))) => {
            serve_attachment(state, identity, &request_path, attachment).await
        }
        Ok(None) => not_found_page(&state.chrome, identity, &request_path, None).await,
        Err(err) => tree_error_to_http(SOURCE, err).into_response(),
    }
}

async fn serve_page(
    state: &HttpState,
    identity: &Identity,
    request_path: &str,
    page: Page,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_page";

    let access = state.tree.access();
    let acl = match access.effective_acl(&page.meta).await {
        Ok(acl) => acl,
        Err(err) => return access_error_to_http(SOURCE, err).into_response(),
    };

    if !acl.global_read && !identity.is_signed_in() {
        return Redirect::to(&state.chrome.login_url(request_path)).into_response();
    }

    let viewer = identity.viewer();
    match access.can_read(&page.meta, viewer).await {
        Ok(true) => {}
        Ok(false) => return forbidden_page(&state.chrome, identity, request_path, None).await,
        Err(err) => return access_error_to_http(SOURCE, err).into_response(),
    }

    let is_editor = match access.can_write(&page.meta, viewer).await {
        Ok(allowed) => allowed,
        Err(err) => return access_error_to_http(SOURCE, err).into_response(),
    };

    let page_path = match state.tree.path(&page.meta).await {
        Ok(path) => path,
        Err(err) => return tree_error_to_http(SOURCE, err).into_response(),
    };

    let files = match state.tree.attached_files(&page).await {
        Ok(files) => files
            .into_iter()
            .filter(|file| !file.hidden)
            .map(|file| FileLinkView {
                href: format!("/{page_path}{}", file.name()),
                extension: file_extension(file.name()),
                name: file.meta.name,
            })
            .collect(),
        Err(err) => return tree_error_to_http(SOURCE, err).into_response(),
    };

    let breadcrumbs = match state.tree.breadcrumbs(&page).await {
        Ok(crumbs) => crumbs
            .into_iter()
            .map(|crumb| BreadcrumbView {
                href: crumb.path,
                label: crumb.name,
            })
            .collect(),
        Err(err) => return tree_error_to_http(SOURCE, err).into_response(),
    };

    let chrome = match state.chrome.load(identity, request_path).await {
        Ok(chrome) => chrome,
        Err(err) => return err.into_response(),
    };

    let content = PageView {
        edit_href: format!("/admin/edit/{}/", page.id()),
        title: page.title,
        content_html: page.content,
        breadcrumbs,
        files,
        is_editor,
    };
    let view = LayoutContext::new(chrome, content);
    render_template_response(PageTemplate { view }, StatusCode::OK)
}

async fn serve_attachment(
    state: &HttpState,
    identity: &Identity,
    request_path: &str,
    attachment: Attachment,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_attachment";

    match state
        .tree
        .access()
        .can_read(&attachment.meta, identity.viewer())
        .await
    {
        Ok(true) => {}
        Ok(false) => return forbidden_page(&state.chrome, identity, request_path, None).await,
        Err(err) => return access_error_to_http(SOURCE, err).into_response(),
    }

    match attachment.payload() {
        AttachmentPayload::Link(url) => Redirect::to(url).into_response(),
        AttachmentPayload::Blob(blob_id) => match state.nodes.load_blob(*blob_id).await {
            Ok(Some(blob)) => build_file_response(&state.files, attachment.name(), blob.data),
            Ok(None) => {
                warn!(
                    target = "sitecreator::http::files",
                    attachment = %attachment.id(),
                    blob = %blob_id,
                    "attachment references a missing blob"
                );
                not_found_page(&state.chrome, identity, request_path, None).await
            }
            Err(err) => repo_error_to_http(SOURCE, err).into_response(),
        },
        AttachmentPayload::Empty => {
            not_found_page(&state.chrome, identity, request_path, None).await
        }
    }
}

fn build_file_response(settings: &FileSettings, name: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(name).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    if let Ok(value) = HeaderValue::from_str(&settings.cache_control) {
        headers.insert(CACHE_CONTROL, value);
    }
    if let Some(value) = expires_header(OffsetDateTime::now_utc(), settings.cache_seconds) {
        headers.insert(EXPIRES, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!(
        "inline; filename=\"{}\"",
        sanitize_filename(name)
    )) {
        headers.insert(CONTENT_DISPOSITION, value);
    }

    response
}

fn expires_header(now: OffsetDateTime, cache_seconds: u64) -> Option<HeaderValue> {
    let seconds = i64::try_from(cache_seconds).ok()?;
    let expires = now.checked_add(Duration::seconds(seconds))?;
    let formatted = expires.format(HTTP_DATE).ok()?;
    HeaderValue::from_str(&formatted).ok()
}

async fn tree_data(
    State(state): State<HttpState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    match state.tree.tree_data(identity.viewer()).await {
        Ok(tree) => Json(tree).into_response(),
        Err(err) => tree_error_to_http("infra::http::public::tree_data", err).into_response(),
    }
}

async fn sitemap(
    State(state): State<HttpState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    let entries = match state.tree.sitemap(identity.viewer()).await {
        Ok(entries) => entries,
        Err(err) => return tree_error_to_http("infra::http::public::sitemap", err).into_response(),
    };

    let chrome = match state.chrome.load(&identity, "/sitemap/").await {
        Ok(chrome) => chrome,
        Err(err) => return err.into_response(),
    };

    let content = SitemapView {
        entries: entries
            .into_iter()
            .map(|entry| SitemapEntryView {
                title: entry.page.title,
                href: format!("/{}", entry.path),
                depth: entry.depth,
            })
            .collect(),
    };
    let view = LayoutContext::new(chrome, content);
    render_template_response(SitemapTemplate { view }, StatusCode::OK)
}
