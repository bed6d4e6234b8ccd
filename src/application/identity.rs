use crate::domain::users::UserProfile;

/// Who is making the request, as asserted by the authenticating proxy.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub email: Option<String>,
    pub is_admin: bool,
    pub profile: Option<UserProfile>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn viewer(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.email.is_some()
    }

    pub fn is_superuser(&self) -> bool {
        self.profile
            .as_ref()
            .is_some_and(|profile| profile.is_superuser)
    }
}
