mod admin;
mod identity;
mod middleware;
mod public;

pub use admin::{AdminState, build_admin_router};
pub use identity::IdentityState;
pub use middleware::RequestContext;
pub use public::{HttpState, build_public_router};

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::access::AccessError;
use crate::application::chrome::ChromeService;
use crate::application::error::HttpError;
use crate::application::identity::Identity;
use crate::application::repos::RepoError;
use crate::application::sidebar::SidebarError;
use crate::application::tree::TreeError;
use crate::application::users::UserDirectoryError;
use crate::presentation::views::{render_forbidden_response, render_not_found_response};

use self::identity::attach_identity;
use self::middleware::{log_responses, set_request_context};

/// Public pages and the admin area on one listener.
pub fn build_router(http: HttpState, admin: AdminState, identity: IdentityState) -> Router {
    build_admin_router(admin)
        .merge(build_public_router(http))
        .layer(axum::middleware::from_fn(log_responses))
        .layer(axum::middleware::from_fn_with_state(
            identity,
            attach_identity,
        ))
        .layer(axum::middleware::from_fn(set_request_context))
}

/// Map a repository error to a consistent HTTP error response for admin/public surfaces.
pub fn repo_error_to_http(source: &'static str, err: RepoError) -> HttpError {
    match err {
        RepoError::Duplicate { constraint } => {
            HttpError::new(source, StatusCode::CONFLICT, "Duplicate record", constraint)
        }
        RepoError::NotFound => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Resource not found",
            "resource not found",
        ),
        RepoError::InvalidInput { message } => {
            HttpError::new(source, StatusCode::BAD_REQUEST, "Invalid input", message)
        }
        RepoError::Integrity { message } => HttpError::new(
            source,
            StatusCode::CONFLICT,
            "Integrity constraint violated",
            message,
        ),
        RepoError::Timeout => HttpError::new(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            "Database timeout",
            "Database timeout",
        ),
        RepoError::Persistence(message) => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Persistence error",
            message,
        ),
    }
}

pub(crate) fn access_error_to_http(source: &'static str, err: AccessError) -> HttpError {
    match err {
        AccessError::Repo(repo) => repo_error_to_http(source, repo),
        AccessError::UnknownProfile(_) | AccessError::UnknownGroup(_) => HttpError::new(
            source,
            StatusCode::BAD_REQUEST,
            "Unknown grantee",
            err.to_string(),
        ),
        AccessError::MissingAcl { .. } => HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Access control data is inconsistent",
            &err,
        ),
    }
}

pub(crate) fn tree_error_to_http(source: &'static str, err: TreeError) -> HttpError {
    match err {
        TreeError::Validation(message) => HttpError::new(
            source,
            StatusCode::BAD_REQUEST,
            "Request could not be processed",
            message,
        ),
        TreeError::Forbidden(node) => HttpError::new(
            source,
            StatusCode::FORBIDDEN,
            "Access denied",
            format!("write access denied for node {node}"),
        ),
        TreeError::NotFound { entity } => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Resource not found",
            format!("{entity} not found"),
        ),
        TreeError::Access(access) => access_error_to_http(source, access),
        TreeError::Repo(repo) => repo_error_to_http(source, repo),
    }
}

pub(crate) fn sidebar_error_to_http(source: &'static str, err: SidebarError) -> HttpError {
    match err {
        SidebarError::Repo(repo) => repo_error_to_http(source, repo),
        SidebarError::Tree(tree) => tree_error_to_http(source, tree),
        SidebarError::Access(access) => access_error_to_http(source, access),
        other => HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Sidebar could not be processed",
            &other,
        ),
    }
}

pub(crate) fn user_directory_error_to_http(
    source: &'static str,
    err: UserDirectoryError,
) -> HttpError {
    match err {
        UserDirectoryError::Validation(message) => HttpError::new(
            source,
            StatusCode::BAD_REQUEST,
            "Request could not be processed",
            message,
        ),
        UserDirectoryError::NotFound { entity } => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Resource not found",
            format!("{entity} not found"),
        ),
        UserDirectoryError::Repo(repo) => repo_error_to_http(source, repo),
    }
}

/// Filename safe to place inside a quoted `Content-Disposition` parameter.
pub(crate) fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// 404 page inside the site layout.
pub(crate) async fn not_found_page(
    chrome: &ChromeService,
    identity: &Identity,
    path: &str,
    detail: Option<String>,
) -> Response {
    match chrome.load(identity, path).await {
        Ok(layout) => render_not_found_response(layout, detail),
        Err(err) => err.into_response(),
    }
}

/// 403 page inside the site layout.
pub(crate) async fn forbidden_page(
    chrome: &ChromeService,
    identity: &Identity,
    path: &str,
    reason: Option<String>,
) -> Response {
    match chrome.load(identity, path).await {
        Ok(layout) => render_forbidden_response(layout, reason),
        Err(err) => err.into_response(),
    }
}
