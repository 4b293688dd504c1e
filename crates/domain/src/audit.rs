use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ecclesia_core::AppError;

/// Stable actions recorded in the HTTP audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuditAction {
    /// Successful password login.
    AuthLogin,
    /// Rejected password login.
    AuthLoginFailed,
    /// Bearer token revoked by its owner.
    AuthLogout,
    /// Account registration.
    AuthRegister,
    /// Password change by the account owner.
    AuthPasswordChange,
    /// Password reset requested.
    AuthPasswordResetRequest,
    /// Sermon created.
    SermonCreate,
    /// Sermon updated.
    SermonUpdate,
    /// Sermon deleted.
    SermonDelete,
    /// Sermon liked or unliked.
    SermonLike,
    /// Blog post created.
    BlogCreate,
    /// Blog post updated.
    BlogUpdate,
    /// Blog post deleted.
    BlogDelete,
    /// Blog post liked or unliked.
    BlogLike,
    /// Comment added to a blog post.
    BlogComment,
    /// Event created.
    EventCreate,
    /// Event updated.
    EventUpdate,
    /// Event deleted.
    EventDelete,
    /// Registration for an event.
    EventRegister,
    /// Gallery item uploaded.
    GalleryUpload,
    /// Gallery item updated.
    GalleryUpdate,
    /// Gallery item deleted.
    GalleryDelete,
    /// Livestream created.
    LivestreamCreate,
    /// Livestream updated.
    LivestreamUpdate,
    /// Livestream deleted.
    LivestreamDelete,
    /// Volunteer application submitted.
    VolunteerApply,
    /// Volunteer application status changed.
    VolunteerStatusUpdate,
    /// Volunteer application edited.
    VolunteerUpdate,
    /// Volunteer application deleted.
    VolunteerDelete,
    /// Feedback submitted.
    FeedbackSubmit,
    /// Staff response added to feedback.
    FeedbackRespond,
    /// Feedback status changed.
    FeedbackStatusUpdate,
    /// Feedback archived.
    FeedbackArchive,
    /// Feedback deleted.
    FeedbackDelete,
    /// User account created by staff.
    UserCreate,
    /// User profile updated.
    UserUpdate,
    /// User account deleted.
    UserDelete,
    /// User role reference changed.
    UserRoleChange,
    /// Role document created.
    RoleCreate,
    /// Role document updated.
    RoleUpdate,
    /// Role document deleted.
    RoleDelete,
    /// Audit trail exported.
    AuditExport,
    /// Retention sweep executed on demand.
    AuditRetentionSweep,
    /// Request rejected by the authorization gate.
    SystemAccessDenied,
}

impl AuditAction {
    /// Returns the stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthLogin => "auth.login",
            Self::AuthLoginFailed => "auth.login.failed",
            Self::AuthLogout => "auth.logout",
            Self::AuthRegister => "auth.register",
            Self::AuthPasswordChange => "auth.password.change",
            Self::AuthPasswordResetRequest => "auth.password.reset.request",
            Self::SermonCreate => "sermon.create",
            Self::SermonUpdate => "sermon.update",
            Self::SermonDelete => "sermon.delete",
            Self::SermonLike => "sermon.like",
            Self::BlogCreate => "blog.create",
            Self::BlogUpdate => "blog.update",
            Self::BlogDelete => "blog.delete",
            Self::BlogLike => "blog.like",
            Self::BlogComment => "blog.comment",
            Self::EventCreate => "event.create",
            Self::EventUpdate => "event.update",
            Self::EventDelete => "event.delete",
            Self::EventRegister => "event.register",
            Self::GalleryUpload => "gallery.upload",
            Self::GalleryUpdate => "gallery.update",
            Self::GalleryDelete => "gallery.delete",
            Self::LivestreamCreate => "livestream.create",
            Self::LivestreamUpdate => "livestream.update",
            Self::LivestreamDelete => "livestream.delete",
            Self::VolunteerApply => "volunteer.apply",
            Self::VolunteerStatusUpdate => "volunteer.status.update",
            Self::VolunteerUpdate => "volunteer.update",
            Self::VolunteerDelete => "volunteer.delete",
            Self::FeedbackSubmit => "feedback.submit",
            Self::FeedbackRespond => "feedback.respond",
            Self::FeedbackStatusUpdate => "feedback.status.update",
            Self::FeedbackArchive => "feedback.archive",
            Self::FeedbackDelete => "feedback.delete",
            Self::UserCreate => "user.create",
            Self::UserUpdate => "user.update",
            Self::UserDelete => "user.delete",
            Self::UserRoleChange => "user.role.change",
            Self::RoleCreate => "role.create",
            Self::RoleUpdate => "role.update",
            Self::RoleDelete => "role.delete",
            Self::AuditExport => "audit.export",
            Self::AuditRetentionSweep => "audit.retention.sweep",
            Self::SystemAccessDenied => "system.access.denied",
        }
    }

    /// Returns every known action.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[AuditAction] = &[
            AuditAction::AuthLogin,
            AuditAction::AuthLoginFailed,
            AuditAction::AuthLogout,
            AuditAction::AuthRegister,
            AuditAction::AuthPasswordChange,
            AuditAction::AuthPasswordResetRequest,
            AuditAction::SermonCreate,
            AuditAction::SermonUpdate,
            AuditAction::SermonDelete,
            AuditAction::SermonLike,
            AuditAction::BlogCreate,
            AuditAction::BlogUpdate,
            AuditAction::BlogDelete,
            AuditAction::BlogLike,
            AuditAction::BlogComment,
            AuditAction::EventCreate,
            AuditAction::EventUpdate,
            AuditAction::EventDelete,
            AuditAction::EventRegister,
            AuditAction::GalleryUpload,
            AuditAction::GalleryUpdate,
            AuditAction::GalleryDelete,
            AuditAction::LivestreamCreate,
            AuditAction::LivestreamUpdate,
            AuditAction::LivestreamDelete,
            AuditAction::VolunteerApply,
            AuditAction::VolunteerStatusUpdate,
            AuditAction::VolunteerUpdate,
            AuditAction::VolunteerDelete,
            AuditAction::FeedbackSubmit,
            AuditAction::FeedbackRespond,
            AuditAction::FeedbackStatusUpdate,
            AuditAction::FeedbackArchive,
            AuditAction::FeedbackDelete,
            AuditAction::UserCreate,
            AuditAction::UserUpdate,
            AuditAction::UserDelete,
            AuditAction::UserRoleChange,
            AuditAction::RoleCreate,
            AuditAction::RoleUpdate,
            AuditAction::RoleDelete,
            AuditAction::AuditExport,
            AuditAction::AuditRetentionSweep,
            AuditAction::SystemAccessDenied,
        ];

        ALL
    }

    /// Returns whether the retention sweep must keep entries with this action.
    #[must_use]
    pub fn is_protected_from_retention(&self) -> bool {
        PROTECTED_AUDIT_ACTIONS.contains(self)
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown audit action '{value}'")))
    }
}

impl Display for AuditAction {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Actions kept by the retention sweep regardless of age.
pub const PROTECTED_AUDIT_ACTIONS: &[AuditAction] = &[
    AuditAction::RoleCreate,
    AuditAction::RoleUpdate,
    AuditAction::RoleDelete,
    AuditAction::UserRoleChange,
    AuditAction::UserDelete,
    AuditAction::AuditExport,
    AuditAction::AuditRetentionSweep,
];

/// Coarse resource categories for audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    /// Authentication endpoints.
    Auth,
    /// User accounts.
    User,
    /// Role documents.
    Role,
    /// Sermons.
    Sermon,
    /// Blog posts.
    Blog,
    /// Events.
    Event,
    /// Gallery items.
    Gallery,
    /// Livestreams.
    Livestream,
    /// Volunteer applications.
    Volunteer,
    /// Feedback items.
    Feedback,
    /// The audit trail itself.
    Audit,
    /// Requests not tied to a resource.
    System,
}

impl ResourceType {
    /// Returns the stable storage value for this resource type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::User => "user",
            Self::Role => "role",
            Self::Sermon => "sermon",
            Self::Blog => "blog",
            Self::Event => "event",
            Self::Gallery => "gallery",
            Self::Livestream => "livestream",
            Self::Volunteer => "volunteer",
            Self::Feedback => "feedback",
            Self::Audit => "audit",
            Self::System => "system",
        }
    }

    /// Returns every resource type.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::Auth,
            Self::User,
            Self::Role,
            Self::Sermon,
            Self::Blog,
            Self::Event,
            Self::Gallery,
            Self::Livestream,
            Self::Volunteer,
            Self::Feedback,
            Self::Audit,
            Self::System,
        ]
    }
}

impl FromStr for ResourceType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|resource_type| resource_type.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown resource type '{value}'")))
    }
}

impl Display for ResourceType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Steps recorded in the financial transaction audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionAuditAction {
    /// Payment request sent to the provider.
    PaymentInitiated,
    /// Provider callback accepted.
    PaymentCallbackReceived,
    /// Provider callback replayed for an already settled payment.
    PaymentCallbackDuplicate,
    /// Payment settled.
    PaymentCompleted,
    /// Payment rejected or timed out.
    PaymentFailed,
    /// Payment status polled from the provider.
    PaymentStatusChecked,
    /// Pledge created.
    PledgeCreated,
    /// Pledge amount or schedule changed.
    PledgeUpdated,
    /// Pledge cancelled.
    PledgeCancelled,
    /// Contribution recorded against a pledge or campaign.
    ContributionRecorded,
    /// Contribution verified by staff.
    ContributionVerified,
    /// Refund issued.
    RefundIssued,
}

impl TransactionAuditAction {
    /// Returns the stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentInitiated => "payment.initiated",
            Self::PaymentCallbackReceived => "payment.callback.received",
            Self::PaymentCallbackDuplicate => "payment.callback.duplicate",
            Self::PaymentCompleted => "payment.completed",
            Self::PaymentFailed => "payment.failed",
            Self::PaymentStatusChecked => "payment.status.checked",
            Self::PledgeCreated => "pledge.created",
            Self::PledgeUpdated => "pledge.updated",
            Self::PledgeCancelled => "pledge.cancelled",
            Self::ContributionRecorded => "contribution.recorded",
            Self::ContributionVerified => "contribution.verified",
            Self::RefundIssued => "refund.issued",
        }
    }

    /// Returns every transaction action.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::PaymentInitiated,
            Self::PaymentCallbackReceived,
            Self::PaymentCallbackDuplicate,
            Self::PaymentCompleted,
            Self::PaymentFailed,
            Self::PaymentStatusChecked,
            Self::PledgeCreated,
            Self::PledgeUpdated,
            Self::PledgeCancelled,
            Self::ContributionRecorded,
            Self::ContributionVerified,
            Self::RefundIssued,
        ]
    }

    /// Returns whether the retention sweep may delete entries with this action.
    #[must_use]
    pub fn is_retention_eligible(&self) -> bool {
        NON_CRITICAL_TRANSACTION_ACTIONS.contains(self)
    }
}

impl FromStr for TransactionAuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| {
                AppError::Validation(format!("unknown transaction audit action '{value}'"))
            })
    }
}

impl Display for TransactionAuditAction {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Transaction actions the retention sweep is allowed to delete.
pub const NON_CRITICAL_TRANSACTION_ACTIONS: &[TransactionAuditAction] = &[
    TransactionAuditAction::PaymentStatusChecked,
    TransactionAuditAction::PaymentCallbackDuplicate,
];

/// Kind of financial transaction an audit entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    /// One-off payment or donation.
    Payment,
    /// Pledge towards a campaign.
    Pledge,
    /// Contribution settling a pledge.
    Contribution,
    /// Refund of an earlier payment.
    Refund,
}

impl TransactionType {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Pledge => "pledge",
            Self::Contribution => "contribution",
            Self::Refund => "refund",
        }
    }
}

impl FromStr for TransactionType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "payment" => Ok(Self::Payment),
            "pledge" => Ok(Self::Pledge),
            "contribution" => Ok(Self::Contribution),
            "refund" => Ok(Self::Refund),
            _ => Err(AppError::Validation(format!(
                "unknown transaction type '{value}'"
            ))),
        }
    }
}

/// Payment channel used for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentMethod {
    /// M-Pesa STK push.
    Mpesa,
    /// Cash collected at a service.
    Cash,
    /// Bank transfer.
    BankTransfer,
    /// Card payment.
    Card,
}

impl PaymentMethod {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mpesa => "mpesa",
            Self::Cash => "cash",
            Self::BankTransfer => "bank_transfer",
            Self::Card => "card",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "mpesa" => Ok(Self::Mpesa),
            "cash" => Ok(Self::Cash),
            "bank_transfer" => Ok(Self::BankTransfer),
            "card" => Ok(Self::Card),
            _ => Err(AppError::Validation(format!(
                "unknown payment method '{value}'"
            ))),
        }
    }
}
