use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ecclesia_core::AppError;

/// Permission tokens enforced by the authorization gate.
///
/// Tokens are opaque and compared by exact match. Any hierarchy between them
/// lives in the expansion table, never in the token text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Permission {
    /// Full control over sermons.
    ManageSermons,
    /// Full control over events.
    ManageEvents,
    /// Full control over blog posts.
    ManageBlogs,
    /// Full control over gallery items.
    ManageGallery,
    /// Full control over livestreams.
    ManageLivestreams,
    /// Full control over volunteer applications.
    ManageVolunteers,
    /// Full control over user accounts.
    ManageUsers,
    /// Full control over role documents and assignments.
    ManageRoles,
    /// Broad feedback grant.
    ManageFeedback,
    /// Allows submitting feedback.
    SubmitFeedback,
    /// Allows reading sermon feedback.
    ReadFeedbackSermon,
    /// Allows reading service feedback.
    ReadFeedbackService,
    /// Allows reading testimonies.
    ReadFeedbackTestimony,
    /// Allows reading suggestions.
    ReadFeedbackSuggestion,
    /// Allows reading prayer requests.
    ReadFeedbackPrayer,
    /// Allows reading general feedback.
    ReadFeedbackGeneral,
    /// Allows responding to sermon feedback.
    RespondFeedbackSermon,
    /// Allows responding to service feedback.
    RespondFeedbackService,
    /// Allows responding to testimonies.
    RespondFeedbackTestimony,
    /// Allows responding to suggestions.
    RespondFeedbackSuggestion,
    /// Allows responding to prayer requests.
    RespondFeedbackPrayer,
    /// Allows responding to general feedback.
    RespondFeedbackGeneral,
    /// Allows publishing testimonies.
    PublishFeedbackTestimony,
    /// Allows archiving feedback.
    ArchiveFeedback,
    /// Allows deleting feedback.
    DeleteFeedback,
    /// Allows reading feedback statistics.
    ViewFeedbackStats,
    /// Allows exporting feedback.
    ExportFeedback,
    /// Broad donations grant.
    ManageDonations,
    /// Allows members to pledge.
    CreatePledges,
    /// Allows creating fundraising campaigns.
    CreateCampaigns,
    /// Allows editing campaigns.
    EditCampaigns,
    /// Allows deleting campaigns.
    DeleteCampaigns,
    /// Allows activating and closing campaigns.
    ActivateCampaigns,
    /// Allows reading every member's pledges.
    ViewPledgesAll,
    /// Allows editing pledges.
    EditPledges,
    /// Allows cancelling pledges.
    CancelPledges,
    /// Allows recording offline contributions.
    RecordContributions,
    /// Allows verifying received payments.
    VerifyPayments,
    /// Allows reading donation reports.
    ViewDonationReports,
    /// Allows exporting donation reports.
    ExportDonationReports,
    /// Allows reading dashboard analytics.
    ViewAnalytics,
    /// Allows reading HTTP audit logs.
    ViewAuditLogs,
    /// Allows reading the financial transaction audit trail.
    ViewTransactionLogs,
}

impl Permission {
    /// Returns the stable token for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManageSermons => "manage:sermons",
            Self::ManageEvents => "manage:events",
            Self::ManageBlogs => "manage:blogs",
            Self::ManageGallery => "manage:gallery",
            Self::ManageLivestreams => "manage:livestreams",
            Self::ManageVolunteers => "manage:volunteers",
            Self::ManageUsers => "manage:users",
            Self::ManageRoles => "manage:roles",
            Self::ManageFeedback => "manage:feedback",
            Self::SubmitFeedback => "submit:feedback",
            Self::ReadFeedbackSermon => "read:feedback:sermon",
            Self::ReadFeedbackService => "read:feedback:service",
            Self::ReadFeedbackTestimony => "read:feedback:testimony",
            Self::ReadFeedbackSuggestion => "read:feedback:suggestion",
            Self::ReadFeedbackPrayer => "read:feedback:prayer",
            Self::ReadFeedbackGeneral => "read:feedback:general",
            Self::RespondFeedbackSermon => "respond:feedback:sermon",
            Self::RespondFeedbackService => "respond:feedback:service",
            Self::RespondFeedbackTestimony => "respond:feedback:testimony",
            Self::RespondFeedbackSuggestion => "respond:feedback:suggestion",
            Self::RespondFeedbackPrayer => "respond:feedback:prayer",
            Self::RespondFeedbackGeneral => "respond:feedback:general",
            Self::PublishFeedbackTestimony => "publish:feedback:testimony",
            Self::ArchiveFeedback => "archive:feedback",
            Self::DeleteFeedback => "delete:feedback",
            Self::ViewFeedbackStats => "view:feedback:stats",
            Self::ExportFeedback => "export:feedback",
            Self::ManageDonations => "manage:donations",
            Self::CreatePledges => "create:pledges",
            Self::CreateCampaigns => "create:campaigns",
            Self::EditCampaigns => "edit:campaigns",
            Self::DeleteCampaigns => "delete:campaigns",
            Self::ActivateCampaigns => "activate:campaigns",
            Self::ViewPledgesAll => "view:pledges:all",
            Self::EditPledges => "edit:pledges",
            Self::CancelPledges => "cancel:pledges",
            Self::RecordContributions => "record:contributions",
            Self::VerifyPayments => "verify:payments",
            Self::ViewDonationReports => "view:donation:reports",
            Self::ExportDonationReports => "export:donation:reports",
            Self::ViewAnalytics => "view:analytics",
            Self::ViewAuditLogs => "view:audit_logs",
            Self::ViewTransactionLogs => "view:transaction_logs",
        }
    }

    /// Returns the full permission vocabulary.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Permission] = &[
            Permission::ManageSermons,
            Permission::ManageEvents,
            Permission::ManageBlogs,
            Permission::ManageGallery,
            Permission::ManageLivestreams,
            Permission::ManageVolunteers,
            Permission::ManageUsers,
            Permission::ManageRoles,
            Permission::ManageFeedback,
            Permission::SubmitFeedback,
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
            Permission::ManageDonations,
            Permission::CreatePledges,
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
            Permission::ViewAnalytics,
            Permission::ViewAuditLogs,
            Permission::ViewTransactionLogs,
        ];

        ALL
    }

    /// Parses a transport value into a permission.
    pub fn from_transport(value: &str) -> Result<Self, AppError> {
        Self::from_str(value)
    }

    /// Parses a list of transport values, rejecting the first unknown token.
    pub fn parse_all<S: AsRef<str>>(values: &[S]) -> Result<Vec<Self>, AppError> {
        values
            .iter()
            .map(|value| Self::from_str(value.as_ref()))
            .collect()
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown permission value '{value}'")))
    }
}

impl Display for Permission {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::str::FromStr;

    use super::Permission;

    #[test]
    fn permission_roundtrip_storage_value() {
        for permission in Permission::all() {
            let restored = Permission::from_str(permission.as_str());
            assert_eq!(restored.ok(), Some(*permission));
        }
    }

    #[test]
    fn permission_tokens_are_unique() {
        let tokens: HashSet<&str> = Permission::all()
            .iter()
            .map(Permission::as_str)
            .collect();
        assert_eq!(tokens.len(), Permission::all().len());
    }

    #[test]
    fn unknown_permission_is_rejected() {
        assert!(Permission::from_str("manage:everything").is_err());
        assert!(Permission::from_str("Manage:Sermons").is_err());
    }

    #[test]
    fn parse_all_stops_at_unknown_token() {
        let parsed = Permission::parse_all(&["manage:events", "fly:kites"]);
        assert!(parsed.is_err());

        let parsed = Permission::parse_all(&["manage:events", "view:audit_logs"]);
        assert_eq!(
            parsed.unwrap_or_default(),
            vec![Permission::ManageEvents, Permission::ViewAuditLogs]
        );
    }
}
