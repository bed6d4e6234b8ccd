//! Input validators for names, links and email addresses.

use url::Url;

use crate::domain::error::DomainError;

pub const PAGE_NAME_MESSAGE: &str =
    "A valid page name can only contain alphanumeric characters, underscores and hyphens";
pub const LINK_MESSAGE: &str = "Enter a valid URL.";
pub const EMAIL_MESSAGE: &str = "Enter a valid e-mail address.";

const LINK_SCHEMES: [&str; 3] = ["http", "https", "ftp"];

pub fn validate_page_name(name: &str) -> Result<(), DomainError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if valid {
        Ok(())
    } else {
        Err(DomainError::invalid("name", PAGE_NAME_MESSAGE))
    }
}

/// Parses an absolute http, https or ftp URL with a host.
pub fn validate_link(raw: &str) -> Result<Url, DomainError> {
    let parsed = Url::parse(raw.trim()).map_err(|_| DomainError::invalid("url", LINK_MESSAGE))?;
    if !LINK_SCHEMES.contains(&parsed.scheme()) || parsed.host_str().is_none() {
        return Err(DomainError::invalid("url", LINK_MESSAGE));
    }
    Ok(parsed)
}

/// Attachment name for a link: the last `/`-separated segment of the URL text.
pub fn link_file_name(raw: &str) -> &str {
    raw.trim().rsplit('/').next().unwrap_or_default()
}

pub fn validate_email(raw: &str) -> Result<String, DomainError> {
    let email = raw.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(DomainError::invalid("email", EMAIL_MESSAGE));
    };

    let local_ok = !local.is_empty()
        && !local.starts_with('.')
        && !local.ends_with('.')
        && local
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~-.".contains(ch));
    let labels: Vec<&str> = domain.split('.').collect();
    let domain_ok = labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
        });

    if local_ok && domain_ok {
        Ok(email.to_string())
    } else {
        Err(DomainError::invalid("email", EMAIL_MESSAGE))
    }
}
