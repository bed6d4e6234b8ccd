use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::application::{
    chrome::ChromeService, error::HttpError, identity::Identity, users::UserDirectoryService,
};
use crate::config::AuthSettings;

use super::{forbidden_page, user_directory_error_to_http};

const SOURCE: &str = "infra::http::identity::attach_identity";

const SUPERUSER_REQUIRED: &str = "You must be a superuser to view this page.";
const ADMIN_REQUIRED: &str = "You must be an administrator to view this page.";

#[derive(Clone)]
pub struct IdentityState {
    pub users: UserDirectoryService,
    pub auth: AuthSettings,
}

/// Resolves the proxy-asserted user into an [`Identity`] request extension.
pub(super) async fn attach_identity(
    State(state): State<IdentityState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let identity = match resolve_identity(&state, request.headers()).await {
        Ok(identity) => identity,
        Err(err) => return err.into_response(),
    };
    request.extensions_mut().insert(identity);
    next.run(request).await
}

async fn resolve_identity(state: &IdentityState, headers: &HeaderMap) -> Result<Identity, HttpError> {
    let Some(email) = header_text(headers, &state.auth.user_header) else {
        return Ok(Identity::anonymous());
    };
    let is_admin = header_text(headers, &state.auth.admin_header)
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));

    let mut profile = state
        .users
        .load_profile(&email)
        .await
        .map_err(|err| user_directory_error_to_http(SOURCE, err))?;

    if profile.is_none() && is_admin {
        let created = state
            .users
            .ensure_admin_profile(&email)
            .await
            .map_err(|err| user_directory_error_to_http(SOURCE, err))?;
        profile = Some(created);
    }

    Ok(Identity {
        email: Some(email),
        is_admin,
        profile,
    })
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn request_identity(request: &Request<Body>) -> Identity {
    request
        .extensions()
        .get::<Identity>()
        .cloned()
        .unwrap_or_default()
}

pub(super) async fn require_superuser(
    State(chrome): State<ChromeService>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let identity = request_identity(&request);
    if !identity.is_superuser() {
        let path = request.uri().path().to_string();
        return forbidden_page(&chrome, &identity, &path, Some(SUPERUSER_REQUIRED.to_string()))
            .await;
    }
    next.run(request).await
}

pub(super) async fn require_admin(
    State(chrome): State<ChromeService>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let identity = request_identity(&request);
    if !identity.is_admin {
        let path = request.uri().path().to_string();
        return forbidden_page(&chrome, &identity, &path, Some(ADMIN_REQUIRED.to_string())).await;
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn blank_headers_read_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-email", HeaderValue::from_static("  "));
        assert_eq!(header_text(&headers, "x-forwarded-email"), None);

        headers.insert("x-forwarded-email", HeaderValue::from_static(" ann@example.com "));
        assert_eq!(
            header_text(&headers, "x-forwarded-email").as_deref(),
            Some("ann@example.com")
        );
        assert_eq!(header_text(&headers, "x-forwarded-admin"), None);
    }
}
