use axum::http::StatusCode;

use crate::application::error::HttpError;
use crate::application::identity::Identity;
use crate::application::sidebar::{SidebarError, SidebarService};
use crate::config::{AuthSettings, SiteSettings};
use crate::presentation::views::{AccountView, LayoutChrome, SiteView};

const SOURCE: &str = "application::chrome::ChromeService";

#[derive(Clone)]
pub struct ChromeService {
    site: SiteSettings,
    auth: AuthSettings,
    sidebar: SidebarService,
}

impl ChromeService {
    pub fn new(site: SiteSettings, auth: AuthSettings, sidebar: SidebarService) -> Self {
        Self {
            site,
            auth,
            sidebar,
        }
    }

    pub fn sidebar(&self) -> &SidebarService {
        &self.sidebar
    }

    /// Layout data for `identity`. `path` is where sign-in should return to.
    pub async fn load(&self, identity: &Identity, path: &str) -> Result<LayoutChrome, HttpError> {
        let sidebar_html = self
            .sidebar
            .render(identity.viewer())
            .await
            .map_err(sidebar_failure)?;

        Ok(LayoutChrome {
            site: SiteView {
                title: self.site.title.clone(),
                description: self.site.description.clone(),
                analytics_id: self.site.analytics_id.clone(),
                theme: self.site.theme.clone(),
            },
            footer_html: self.site.footer_html.clone(),
            account: AccountView {
                email: identity.email.clone(),
                sign_in_url: login_url(&self.auth.login_url, path),
                sign_out_url: self.auth.logout_url.clone(),
                is_superuser: identity.is_superuser(),
                is_admin: identity.is_admin,
            },
            sidebar_html,
        })
    }

    pub fn login_url(&self, path: &str) -> String {
        login_url(&self.auth.login_url, path)
    }
}

/// Appends `continue=<path>` to the configured login URL.
pub fn login_url(base: &str, path: &str) -> String {
    let continuation: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}continue={continuation}")
}

fn sidebar_failure(err: SidebarError) -> HttpError {
    HttpError::new(
        SOURCE,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to load site chrome",
        format!("sidebar render failed: {err}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_url_carries_encoded_continuation() {
        assert_eq!(
            login_url("/login", "/docs/intro/"),
            "/login?continue=%2Fdocs%2Fintro%2F"
        );
        assert_eq!(
            login_url("https://auth.example.com/start?rd=1", "/"),
            "https://auth.example.com/start?rd=1&continue=%2F"
        );
    }
}
