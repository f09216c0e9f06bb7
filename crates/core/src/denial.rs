use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Why a permission check did not grant access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReason {
    /// The user holds no effective role assignment at all.
    NoAssignments,
    /// No effective assignment both contains the target and grants the permission.
    InsufficientScopeOrPermission,
}

impl DenialReason {
    /// Returns the stable audit value for this reason.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAssignments => "NO_ASSIGNMENTS",
            Self::InsufficientScopeOrPermission => "INSUFFICIENT_SCOPE_OR_PERMISSION",
        }
    }
}

impl Display for DenialReason {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Audit payload carried by a denied `require` check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDenial {
    /// User that was denied.
    pub user_id: String,
    /// Storage value of the requested permission.
    pub permission: String,
    /// Resource the check was made against, when known.
    pub resource: Option<String>,
    /// Denial reason.
    pub reason: DenialReason,
}

impl Display for PermissionDenial {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "user '{}' is missing permission '{}'",
            self.user_id, self.permission
        )?;
        if let Some(resource) = &self.resource {
            write!(formatter, " on '{resource}'")?;
        }
        write!(formatter, " ({})", self.reason)
    }
}
