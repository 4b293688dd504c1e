//! Maps HTTP requests onto audit actions.
//!
//! Classification is a pure function of method, path and (for the final
//! outcome) response status. The rule table is ordered: the first resource
//! segment found in the path decides the resource, and sub-path markers win
//! over the generic method rule.

use crate::audit::{AuditAction, ResourceType};

const WRITE_METHODS: &[&str] = &["POST", "PUT", "PATCH", "DELETE"];
const UPDATE_METHODS: &[&str] = &["PUT", "PATCH"];
const POST_ONLY: &[&str] = &["POST"];
/// Matches every HTTP method.
const ANY_METHOD: &[&str] = &[];

const STATIC_PREFIXES: &[&str] = &["/static", "/assets", "/uploads", "/favicon"];
const STATIC_EXTENSIONS: &[&str] = &[
    ".js", ".css", ".map", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".webp", ".woff",
    ".woff2", ".ttf",
];

/// Action and resource type an HTTP request is recorded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditClassification {
    /// Recorded action.
    pub action: AuditAction,
    /// Recorded resource type.
    pub resource_type: ResourceType,
}

impl AuditClassification {
    /// Creates a classification.
    #[must_use]
    pub const fn new(action: AuditAction, resource_type: ResourceType) -> Self {
        Self {
            action,
            resource_type,
        }
    }

    /// Adjusts the classification once the response status is known.
    ///
    /// Any `403` becomes `system.access.denied` on the same resource, and a
    /// `401` on a login becomes `auth.login.failed`.
    #[must_use]
    pub fn refine_for_status(self, status: u16) -> Self {
        match (self.action, status) {
            (_, 403) => Self::new(AuditAction::SystemAccessDenied, self.resource_type),
            (AuditAction::AuthLogin, 401) => {
                Self::new(AuditAction::AuthLoginFailed, self.resource_type)
            }
            _ => self,
        }
    }
}

struct SubPathRule {
    marker: &'static str,
    methods: &'static [&'static str],
    action: AuditAction,
}

struct ResourceRule {
    segments: &'static [&'static str],
    resource_type: ResourceType,
    sub_paths: &'static [SubPathRule],
    create: Option<AuditAction>,
    update: Option<AuditAction>,
    delete: Option<AuditAction>,
}

const RULES: &[ResourceRule] = &[
    ResourceRule {
        segments: &["sermons"],
        resource_type: ResourceType::Sermon,
        sub_paths: &[SubPathRule {
            marker: "like",
            methods: ANY_METHOD,
            action: AuditAction::SermonLike,
        }],
        create: Some(AuditAction::SermonCreate),
        update: Some(AuditAction::SermonUpdate),
        delete: Some(AuditAction::SermonDelete),
    },
    ResourceRule {
        segments: &["blog", "blogs"],
        resource_type: ResourceType::Blog,
        sub_paths: &[
            SubPathRule {
                marker: "like",
                methods: ANY_METHOD,
                action: AuditAction::BlogLike,
            },
            SubPathRule {
                marker: "comments",
                methods: POST_ONLY,
                action: AuditAction::BlogComment,
            },
        ],
        create: Some(AuditAction::BlogCreate),
        update: Some(AuditAction::BlogUpdate),
        delete: Some(AuditAction::BlogDelete),
    },
    ResourceRule {
        segments: &["events"],
        resource_type: ResourceType::Event,
        sub_paths: &[SubPathRule {
            marker: "register",
            methods: POST_ONLY,
            action: AuditAction::EventRegister,
        }],
        create: Some(AuditAction::EventCreate),
        update: Some(AuditAction::EventUpdate),
        delete: Some(AuditAction::EventDelete),
    },
    ResourceRule {
        segments: &["gallery"],
        resource_type: ResourceType::Gallery,
        sub_paths: &[],
        create: Some(AuditAction::GalleryUpload),
        update: Some(AuditAction::GalleryUpdate),
        delete: Some(AuditAction::GalleryDelete),
    },
    ResourceRule {
        segments: &["livestreams", "livestream"],
        resource_type: ResourceType::Livestream,
        sub_paths: &[],
        create: Some(AuditAction::LivestreamCreate),
        update: Some(AuditAction::LivestreamUpdate),
        delete: Some(AuditAction::LivestreamDelete),
    },
    ResourceRule {
        segments: &["volunteers"],
        resource_type: ResourceType::Volunteer,
        sub_paths: &[SubPathRule {
            marker: "status",
            methods: UPDATE_METHODS,
            action: AuditAction::VolunteerStatusUpdate,
        }],
        create: Some(AuditAction::VolunteerApply),
        update: Some(AuditAction::VolunteerUpdate),
        delete: Some(AuditAction::VolunteerDelete),
    },
    ResourceRule {
        segments: &["feedback"],
        resource_type: ResourceType::Feedback,
        sub_paths: &[
            SubPathRule {
                marker: "respond",
                methods: POST_ONLY,
                action: AuditAction::FeedbackRespond,
            },
            SubPathRule {
                marker: "status",
                methods: UPDATE_METHODS,
                action: AuditAction::FeedbackStatusUpdate,
            },
            SubPathRule {
                marker: "archive",
                methods: WRITE_METHODS,
                action: AuditAction::FeedbackArchive,
            },
        ],
        create: Some(AuditAction::FeedbackSubmit),
        update: None,
        delete: Some(AuditAction::FeedbackDelete),
    },
    ResourceRule {
        segments: &["users"],
        resource_type: ResourceType::User,
        sub_paths: &[SubPathRule {
            marker: "role",
            methods: &["PUT", "PATCH", "DELETE"],
            action: AuditAction::UserRoleChange,
        }],
        create: Some(AuditAction::UserCreate),
        update: Some(AuditAction::UserUpdate),
        delete: Some(AuditAction::UserDelete),
    },
    ResourceRule {
        segments: &["auth"],
        resource_type: ResourceType::Auth,
        sub_paths: &[
            SubPathRule {
                marker: "login",
                methods: POST_ONLY,
                action: AuditAction::AuthLogin,
            },
            SubPathRule {
                marker: "logout",
                methods: POST_ONLY,
                action: AuditAction::AuthLogout,
            },
            SubPathRule {
                marker: "register",
                methods: POST_ONLY,
                action: AuditAction::AuthRegister,
            },
            SubPathRule {
                marker: "forgot-password",
                methods: POST_ONLY,
                action: AuditAction::AuthPasswordResetRequest,
            },
            SubPathRule {
                marker: "change-password",
                methods: WRITE_METHODS,
                action: AuditAction::AuthPasswordChange,
            },
        ],
        create: None,
        update: None,
        delete: None,
    },
    ResourceRule {
        segments: &["roles"],
        resource_type: ResourceType::Role,
        sub_paths: &[],
        create: Some(AuditAction::RoleCreate),
        update: Some(AuditAction::RoleUpdate),
        delete: Some(AuditAction::RoleDelete),
    },
    ResourceRule {
        segments: &["audit-logs"],
        resource_type: ResourceType::Audit,
        sub_paths: &[
            SubPathRule {
                marker: "export",
                methods: &["GET"],
                action: AuditAction::AuditExport,
            },
            SubPathRule {
                marker: "retention",
                methods: &["POST", "DELETE"],
                action: AuditAction::AuditRetentionSweep,
            },
        ],
        create: None,
        update: None,
        delete: None,
    },
];

fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(route, _)| route)
}

/// Returns whether requests to this path are never audited.
#[must_use]
pub fn is_excluded_path(path: &str) -> bool {
    let route = strip_query(path);
    if matches!(route, "" | "/" | "/api" | "/api/") || route.contains("/health") {
        return true;
    }

    if STATIC_PREFIXES
        .iter()
        .any(|prefix| route.starts_with(prefix))
    {
        return true;
    }

    let last_segment = route
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    STATIC_EXTENSIONS
        .iter()
        .any(|extension| last_segment.ends_with(extension))
}

fn method_matches(method: &str, allowed: &[&str]) -> bool {
    allowed.is_empty()
        || allowed
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(method))
}

/// Classifies a request by method and path, before the outcome is known.
///
/// Returns `None` for excluded paths, paths outside the rule table and
/// reads that no sub-path rule covers.
#[must_use]
pub fn classify_request(method: &str, path: &str) -> Option<AuditClassification> {
    if is_excluded_path(path) {
        return None;
    }

    let segments: Vec<&str> = strip_query(path)
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    let (rule, position) = RULES.iter().find_map(|rule| {
        segments
            .iter()
            .position(|segment| rule.segments.contains(segment))
            .map(|position| (rule, position))
    })?;

    let trailing = &segments[position + 1..];
    for sub_path in rule.sub_paths {
        if trailing.contains(&sub_path.marker) && method_matches(method, sub_path.methods) {
            return Some(AuditClassification::new(
                sub_path.action,
                rule.resource_type,
            ));
        }
    }

    let action = if method.eq_ignore_ascii_case("POST") {
        rule.create
    } else if method_matches(method, UPDATE_METHODS) {
        rule.update
    } else if method.eq_ignore_ascii_case("DELETE") {
        rule.delete
    } else {
        None
    };

    action.map(|action| AuditClassification::new(action, rule.resource_type))
}

/// Classifies a completed request.
///
/// A `403` is always recorded as an access denial, even on paths the rule
/// table does not cover; excluded paths are never recorded.
#[must_use]
pub fn classify_outcome(method: &str, path: &str, status: u16) -> Option<AuditClassification> {
    if is_excluded_path(path) {
        return None;
    }

    match classify_request(method, path) {
        Some(classification) => Some(classification.refine_for_status(status)),
        None if status == 403 => Some(AuditClassification::new(
            AuditAction::SystemAccessDenied,
            ResourceType::System,
        )),
        None => None,
    }
}
