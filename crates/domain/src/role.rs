use std::fmt::{Display, Formatter};

use ecclesia_core::{AppError, AppResult};

use crate::security::Permission;

/// Name of the role that bypasses every permission check.
pub const ADMIN_ROLE_NAME: &str = "admin";

/// Maximum role name length.
pub const ROLE_NAME_MAX_LENGTH: usize = 50;

/// Validated, lowercase role identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoleName(String);

impl RoleName {
    /// Normalises and validates a role name.
    ///
    /// Names are trimmed and lower-cased, must start with a letter and may
    /// only contain `a-z`, `0-9` and `_`.
    pub fn new(value: impl AsRef<str>) -> AppResult<Self> {
        let normalized = value.as_ref().trim().to_lowercase();

        if normalized.is_empty() {
            return Err(AppError::Validation(
                "role name must not be empty".to_owned(),
            ));
        }

        if normalized.len() > ROLE_NAME_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "role name must be at most {ROLE_NAME_MAX_LENGTH} characters"
            )));
        }

        let mut characters = normalized.chars();
        let starts_with_letter = characters
            .next()
            .is_some_and(|character| character.is_ascii_lowercase());
        let rest_is_valid = characters.all(|character| {
            character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
        });

        if !starts_with_letter || !rest_is_valid {
            return Err(AppError::Validation(format!(
                "role name '{normalized}' must match [a-z][a-z0-9_]*"
            )));
        }

        Ok(Self(normalized))
    }

    /// Returns the role name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns whether this is the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.0 == ADMIN_ROLE_NAME
    }
}

impl Display for RoleName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Roles seeded at startup. Their names are immutable and they cannot be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemRole {
    /// Church administrators.
    Admin,
    /// Registered congregation members.
    Member,
    /// Pastoral staff.
    Pastor,
    /// Senior clergy.
    Bishop,
    /// Event volunteers.
    Volunteer,
    /// Ushers.
    Usher,
    /// Worship and media team.
    WorshipTeam,
}

impl SystemRole {
    /// Returns every system role in seed order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::Admin,
            Self::Member,
            Self::Pastor,
            Self::Bishop,
            Self::Volunteer,
            Self::Usher,
            Self::WorshipTeam,
        ]
    }

    /// Returns the stored role name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Admin => ADMIN_ROLE_NAME,
            Self::Member => "member",
            Self::Pastor => "pastor",
            Self::Bishop => "bishop",
            Self::Volunteer => "volunteer",
            Self::Usher => "usher",
            Self::WorshipTeam => "worship_team",
        }
    }

    /// Returns the seeded description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Admin => "Full administrative access",
            Self::Member => "Congregation member",
            Self::Pastor => "Pastoral staff managing ministry content",
            Self::Bishop => "Senior clergy overseeing church operations",
            Self::Volunteer => "Volunteer helping with events",
            Self::Usher => "Usher coordinating services and events",
            Self::WorshipTeam => "Worship and media team",
        }
    }

    /// Returns the permissions the role is seeded with.
    #[must_use]
    pub fn default_permissions(&self) -> Vec<Permission> {
        match self {
            Self::Admin => Permission::all().to_vec(),
            Self::Member => vec![Permission::SubmitFeedback, Permission::CreatePledges],
            Self::Pastor => vec![
                Permission::ManageSermons,
                Permission::ManageEvents,
                Permission::ManageBlogs,
                Permission::ManageFeedback,
                Permission::ManageVolunteers,
                Permission::ViewAnalytics,
            ],
            Self::Bishop => vec![
                Permission::ManageSermons,
                Permission::ManageEvents,
                Permission::ManageUsers,
                Permission::ManageDonations,
                Permission::ManageVolunteers,
                Permission::ViewAnalytics,
                Permission::ViewAuditLogs,
            ],
            Self::Volunteer => vec![Permission::ManageEvents],
            Self::Usher => vec![Permission::ManageEvents, Permission::SubmitFeedback],
            Self::WorshipTeam => vec![Permission::ManageLivestreams, Permission::ManageGallery],
        }
    }

    /// Finds the system role with the given name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|role| role.name() == name)
    }
}
