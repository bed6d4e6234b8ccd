use crate::application::error::{ErrorReport, HttpError};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome, detail: Option<String>) -> Response {
    let content = ErrorPageView::not_found(detail.clone());
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        detail.unwrap_or_else(|| "Resource not found".to_string()),
    )
    .attach(&mut response);
    response
}

pub fn render_forbidden_response(chrome: LayoutChrome, reason: Option<String>) -> Response {
    let content = ErrorPageView::forbidden(reason.clone());
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::FORBIDDEN);
    ErrorReport::from_message(
        "presentation::views::render_forbidden_response",
        StatusCode::FORBIDDEN,
        reason.unwrap_or_else(|| "Access denied".to_string()),
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct SiteView {
    pub title: String,
    pub description: String,
    pub analytics_id: Option<String>,
    pub theme: String,
}

/// Who is looking at the page and where they can sign in or out.
#[derive(Clone)]
pub struct AccountView {
    pub email: Option<String>,
    pub sign_in_url: String,
    pub sign_out_url: String,
    pub is_superuser: bool,
    pub is_admin: bool,
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub site: SiteView,
    pub footer_html: String,
    pub account: AccountView,
    pub sidebar_html: String,
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub site: SiteView,
    pub footer_html: String,
    pub account: AccountView,
    pub sidebar_html: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            site: chrome.site,
            footer_html: chrome.footer_html,
            account: chrome.account,
            sidebar_html: chrome.sidebar_html,
            content,
        }
    }
}

#[derive(Clone)]
pub struct BreadcrumbView {
    pub href: String,
    pub label: String,
}

#[derive(Clone)]
pub struct FileLinkView {
    pub name: String,
    pub href: String,
    pub extension: String,
}

pub struct PageView {
    pub title: String,
    pub content_html: String,
    pub breadcrumbs: Vec<BreadcrumbView>,
    pub files: Vec<FileLinkView>,
    pub is_editor: bool,
    pub edit_href: String,
}

#[derive(Template)]
#[template(path = "page.html")]
pub struct PageTemplate {
    pub view: LayoutContext<PageView>,
}

pub struct SitemapEntryView {
    pub title: String,
    pub href: String,
    pub depth: usize,
}

pub struct SitemapView {
    pub entries: Vec<SitemapEntryView>,
}

#[derive(Template)]
#[template(path = "sitemap.html")]
pub struct SitemapTemplate {
    pub view: LayoutContext<SitemapView>,
}

#[derive(Clone)]
pub struct SidebarLinkView {
    pub href: String,
    pub title: String,
}

#[derive(Clone)]
pub struct SidebarSectionView {
    pub heading: String,
    pub links: Vec<SidebarLinkView>,
}

/// Sidebar markup, rendered once per viewer and cached as a string.
#[derive(Template)]
#[template(path = "partials/sidebar.html")]
pub struct SidebarTemplate {
    pub sections: Vec<SidebarSectionView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found(detail: Option<String>) -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: detail
                .unwrap_or_else(|| "The page you requested does not exist.".to_string()),
            primary_action: Some(ErrorAction::home()),
        }
    }

    pub fn forbidden(reason: Option<String>) -> Self {
        Self {
            title: "Access Denied".to_string(),
            message: reason.unwrap_or_else(|| {
                "You do not have permission to view this page.".to_string()
            }),
            primary_action: Some(ErrorAction::home()),
        }
    }

    pub fn invalid(message: String) -> Self {
        Self {
            title: "Request Could Not Be Processed".to_string(),
            message,
            primary_action: None,
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to home".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

/// File extension used to pick an icon, lowercased. Empty when the name has none.
pub fn file_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}
