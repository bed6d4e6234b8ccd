//! User profiles, groups, and the CSV roster format used for bulk edits.

use serde::Serialize;

use crate::domain::types::{GroupId, ProfileId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: ProfileId,
    pub email: String,
    pub is_superuser: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserGroup {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub members: Vec<ProfileId>,
}

impl UserGroup {
    pub fn has_member(&self, profile: ProfileId) -> bool {
        self.members.contains(&profile)
    }

    /// Adds `profile` unless it is already a member. Returns whether the roster changed.
    pub fn add_member(&mut self, profile: ProfileId) -> bool {
        if self.has_member(profile) {
            return false;
        }
        self.members.push(profile);
        true
    }

    pub fn remove_member(&mut self, profile: ProfileId) -> bool {
        let before = self.members.len();
        self.members.retain(|member| *member != profile);
        before != self.members.len()
    }
}

/// One parsed line of a user roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    pub line: usize,
    pub email: String,
    pub is_superuser: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRejection {
    pub line: usize,
    pub content: String,
    pub reason: &'static str,
}

/// Parses `email,flag` rows. A flag of `1` marks a superuser. Blank lines are ignored; lines
/// without exactly two fields are rejected.
pub fn parse_roster(text: &str) -> (Vec<RosterRow>, Vec<RosterRejection>) {
    let mut rows = Vec::new();
    let mut rejected = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim_end_matches('\r');
        if trimmed.trim().is_empty() {
            continue;
        }

        let fields = split_csv_line(trimmed);
        match fields.as_slice() {
            [email, flag] => rows.push(RosterRow {
                line,
                email: email.trim_end().to_string(),
                is_superuser: flag.trim_end() == "1",
            }),
            _ => rejected.push(RosterRejection {
                line,
                content: trimmed.to_string(),
                reason: "expected two comma-separated fields",
            }),
        }
    }

    (rows, rejected)
}

pub fn format_roster(profiles: &[UserProfile]) -> String {
    let mut out = String::new();
    for profile in profiles {
        out.push_str(&quote_csv_field(&profile.email));
        out.push(',');
        out.push(if profile.is_superuser { '1' } else { '0' });
        out.push('\n');
    }
    out
}

// Leading spaces after a separator are skipped; double quotes delimit a field and `""` escapes a
// quote inside one.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    current.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                other => current.push(other),
            }
            continue;
        }

        match ch {
            ' ' if at_field_start => {}
            '"' if at_field_start => {
                in_quotes = true;
                at_field_start = false;
            }
            ',' => {
                fields.push(std::mem::take(&mut current));
                at_field_start = true;
            }
            other => {
                current.push(other);
                at_field_start = false;
            }
        }
    }

    fields.push(current);
    fields
}

fn quote_csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_skips_initial_spaces_and_reads_flags() {
        let (rows, rejected) = parse_roster("alice@example.com, 1\nbob@example.com,0\n\n");
        assert!(rejected.is_empty());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].email, "alice@example.com");
        assert!(rows[0].is_superuser);
        assert_eq!(rows[1].email, "bob@example.com");
        assert!(!rows[1].is_superuser);
    }

    #[test]
    fn roster_rejects_rows_with_wrong_arity() {
        let (rows, rejected) = parse_roster("carol@example.com\ndave@example.com,1,extra\n");
        assert!(rows.is_empty());
        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].line, 1);
        assert_eq!(rejected[1].line, 2);
    }

    #[test]
    fn roster_handles_quoted_fields() {
        let (rows, _) = parse_roster("\"erin@example.com\",\"1\"\r\n");
        assert_eq!(rows[0].email, "erin@example.com");
        assert!(rows[0].is_superuser);
    }

    #[test]
    fn format_roster_writes_one_row_per_profile() {
        let profiles = vec![
            UserProfile {
                id: ProfileId(1),
                email: "a@example.com".into(),
                is_superuser: true,
            },
            UserProfile {
                id: ProfileId(2),
                email: "b@example.com".into(),
                is_superuser: false,
            },
        ];
        assert_eq!(
            format_roster(&profiles),
            "a@example.com,1\nb@example.com,0\n"
        );
    }

    #[test]
    fn group_membership_is_idempotent() {
        let mut group = UserGroup {
            id: GroupId(1),
            name: "Editors".into(),
            description: String::new(),
            members: Vec::new(),
        };
        assert!(group.add_member(ProfileId(7)));
        assert!(!group.add_member(ProfileId(7)));
        assert!(group.has_member(ProfileId(7)));
        assert!(group.remove_member(ProfileId(7)));
        assert!(!group.remove_member(ProfileId(7)));
    }
}
