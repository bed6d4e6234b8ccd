use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct AdminPageForm {
    #[serde(default)]
    pub(super) name: String,
    #[serde(default)]
    pub(super) title: String,
    #[serde(default, rename = "editorHtml")]
    pub(super) content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct AdminNoticeQuery {
    pub(super) m: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AdminSidebarForm {
    #[serde(default)]
    pub(super) yaml: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct AdminGroupForm {
    #[serde(default)]
    pub(super) name: String,
    #[serde(default)]
    pub(super) description: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct AdminUserLookupForm {
    #[serde(default)]
    pub(super) email: String,
}

/// Unchecked checkboxes are absent from the body.
#[derive(Debug, Deserialize)]
pub(super) struct AdminUserForm {
    pub(super) is_superuser: Option<String>,
}

pub(super) fn blank_to_none(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
