//! Broad-grant expansion and the admin bypass.
//!
//! A role stores a flat list of permission tokens. Some of those tokens are
//! broad grants that imply a fixed list of granular tokens; the table below
//! is the single place that relationship is defined.

use crate::role::ADMIN_ROLE_NAME;
use crate::security::Permission;

const FEEDBACK_GRANTS: &[Permission] = &[
    Permission::ReadFeedbackSermon,
    Permission::ReadFeedbackService,
    Permission::ReadFeedbackTestimony,
    Permission::ReadFeedbackSuggestion,
    Permission::ReadFeedbackPrayer,
    Permission::ReadFeedbackGeneral,
    Permission::RespondFeedbackSermon,
    Permission::RespondFeedbackService,
    Permission::RespondFeedbackTestimony,
    Permission::RespondFeedbackSuggestion,
    Permission::RespondFeedbackPrayer,
    Permission::RespondFeedbackGeneral,
    Permission::PublishFeedbackTestimony,
    Permission::ArchiveFeedback,
    Permission::DeleteFeedback,
    Permission::ViewFeedbackStats,
    Permission::ExportFeedback,
];

const DONATION_GRANTS: &[Permission] = &[
    Permission::CreateCampaigns,
    Permission::EditCampaigns,
    Permission::DeleteCampaigns,
    Permission::ActivateCampaigns,
    Permission::ViewPledgesAll,
    Permission::EditPledges,
    Permission::CancelPledges,
    Permission::RecordContributions,
    Permission::VerifyPayments,
    Permission::ViewDonationReports,
    Permission::ExportDonationReports,
];

/// Broad grant to granular permissions mapping.
pub const PERMISSION_EXPANSIONS: &[(Permission, &[Permission])] = &[
    (Permission::ManageFeedback, FEEDBACK_GRANTS),
    (Permission::ManageDonations, DONATION_GRANTS),
];

/// Returns the granular permissions implied by a broad grant, if any.
#[must_use]
pub fn granular_permissions_for(grant: Permission) -> &'static [Permission] {
    PERMISSION_EXPANSIONS
        .iter()
        .find(|(broad, _)| *broad == grant)
        .map(|(_, granular)| *granular)
        .unwrap_or(&[])
}

/// Expands stored role permissions into the effective set.
///
/// Single pass: the stored tokens come first, followed by the granular tokens
/// of every broad grant present. Duplicates are kept; callers check
/// membership only.
#[must_use]
pub fn expand_permissions(stored: &[Permission]) -> Vec<Permission> {
    let mut effective = stored.to_vec();
    for (grant, granular) in PERMISSION_EXPANSIONS {
        if stored.contains(grant) {
            effective.extend_from_slice(granular);
        }
    }

    effective
}

/// Effective permission context for one resolved role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePermissions {
    role_name: String,
    permissions: Vec<Permission>,
}

impl EffectivePermissions {
    /// Builds the effective context from a role's name and stored permissions.
    #[must_use]
    pub fn resolve(role_name: impl Into<String>, stored: &[Permission]) -> Self {
        Self {
            role_name: role_name.into(),
            permissions: expand_permissions(stored),
        }
    }

    /// Returns the role name the context was built for.
    #[must_use]
    pub fn role_name(&self) -> &str {
        self.role_name.as_str()
    }

    /// Returns the expanded permission list.
    #[must_use]
    pub fn permissions(&self) -> &[Permission] {
        self.permissions.as_slice()
    }

    /// Returns whether the admin bypass applies.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role_name == ADMIN_ROLE_NAME
    }

    /// Returns whether the effective set holds the permission.
    #[must_use]
    pub fn contains(&self, permission: Permission) -> bool {
        self.is_admin() || self.permissions.contains(&permission)
    }

    /// Returns whether any of the required permissions is satisfied.
    ///
    /// An empty requirement list is only satisfied by the admin bypass.
    #[must_use]
    pub fn allows_any(&self, required: &[Permission]) -> bool {
        self.is_admin()
            || required
                .iter()
                .any(|permission| self.permissions.contains(permission))
    }
}
