//! Scoped role assignments and their effectiveness rule.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rendezvous_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{BusinessContextId, ContextType, Role, UserId};

/// Unique identifier for a role assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleAssignmentId(Uuid);

impl RoleAssignmentId {
    /// Creates a random assignment identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an assignment identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleAssignmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RoleAssignmentId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Granularity at which an assignment applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentScope {
    /// Whole business.
    Business,
    /// One location and its departments.
    Location,
    /// One department.
    Department,
}

impl AssignmentScope {
    /// Returns how narrow the scope is. Narrower scopes win audit priority.
    #[must_use]
    pub fn specificity(&self) -> u8 {
        self.context_type().level()
    }

    /// Returns the context type an assignment of this scope is bound to.
    #[must_use]
    pub fn context_type(&self) -> ContextType {
        match self {
            Self::Business => ContextType::Business,
            Self::Location => ContextType::Location,
            Self::Department => ContextType::Department,
        }
    }

    /// Returns a stable storage value for this scope.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        self.context_type().as_str()
    }
}

impl FromStr for AssignmentScope {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "BUSINESS" => Ok(Self::Business),
            "LOCATION" => Ok(Self::Location),
            "DEPARTMENT" => Ok(Self::Department),
            _ => Err(AppError::Validation(format!(
                "unknown assignment scope '{value}'"
            ))),
        }
    }
}

impl Display for AssignmentScope {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Context ids an assignment is bound to, shaped by its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeBinding {
    /// Bound to a business.
    Business {
        /// Business id.
        business_id: BusinessContextId,
    },
    /// Bound to a location.
    Location {
        /// Business id.
        business_id: BusinessContextId,
        /// Location id.
        location_id: BusinessContextId,
    },
    /// Bound to a department.
    Department {
        /// Business id.
        business_id: BusinessContextId,
        /// Location id.
        location_id: BusinessContextId,
        /// Department id.
        department_id: BusinessContextId,
    },
}

impl ScopeBinding {
    /// Builds a binding from loose columns, rejecting inconsistent combinations.
    pub fn resolve(
        scope: AssignmentScope,
        business_id: BusinessContextId,
        location_id: Option<BusinessContextId>,
        department_id: Option<BusinessContextId>,
    ) -> AppResult<Self> {
        match (scope, location_id, department_id) {
            (AssignmentScope::Business, None, None) => Ok(Self::Business { business_id }),
            (AssignmentScope::Location, Some(location_id), None) => Ok(Self::Location {
                business_id,
                location_id,
            }),
            (AssignmentScope::Department, Some(location_id), Some(department_id)) => {
                Ok(Self::Department {
                    business_id,
                    location_id,
                    department_id,
                })
            }
            (_, None, Some(_)) => Err(AppError::Validation(
                "department_id requires location_id to be set".to_owned(),
            )),
            (AssignmentScope::Business, _, _) => Err(AppError::Validation(
                "BUSINESS scope requires location_id and department_id to be null".to_owned(),
            )),
            (AssignmentScope::Location, _, _) => Err(AppError::Validation(
                "LOCATION scope requires location_id and a null department_id".to_owned(),
            )),
            (AssignmentScope::Department, _, _) => Err(AppError::Validation(
                "DEPARTMENT scope requires both location_id and department_id".to_owned(),
            )),
        }
    }

    /// Returns the scope.
    #[must_use]
    pub fn scope(&self) -> AssignmentScope {
        match self {
            Self::Business { .. } => AssignmentScope::Business,
            Self::Location { .. } => AssignmentScope::Location,
            Self::Department { .. } => AssignmentScope::Department,
        }
    }

    /// Returns the business id.
    #[must_use]
    pub fn business_id(&self) -> BusinessContextId {
        match self {
            Self::Business { business_id }
            | Self::Location { business_id, .. }
            | Self::Department { business_id, .. } => *business_id,
        }
    }

    /// Returns the location id for location and department scopes.
    #[must_use]
    pub fn location_id(&self) -> Option<BusinessContextId> {
        match self {
            Self::Business { .. } => None,
            Self::Location { location_id, .. } | Self::Department { location_id, .. } => {
                Some(*location_id)
            }
        }
    }

    /// Returns the department id for department scopes.
    #[must_use]
    pub fn department_id(&self) -> Option<BusinessContextId> {
        match self {
            Self::Department { department_id, .. } => Some(*department_id),
            _ => None,
        }
    }

    /// Returns the narrowest context the binding names.
    #[must_use]
    pub fn context_id(&self) -> BusinessContextId {
        match self {
            Self::Business { business_id } => *business_id,
            Self::Location { location_id, .. } => *location_id,
            Self::Department { department_id, .. } => *department_id,
        }
    }

    /// Returns whether the binding references `context_id` in any column.
    #[must_use]
    pub fn references(&self, context_id: BusinessContextId) -> bool {
        self.business_id() == context_id
            || self.location_id() == Some(context_id)
            || self.department_id() == Some(context_id)
    }
}

/// Input used to create an assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRoleAssignment {
    /// Assignee.
    pub user_id: UserId,
    /// Granted role.
    pub role: Role,
    /// Validated scope binding.
    pub binding: ScopeBinding,
    /// User creating the assignment.
    pub assigned_by: UserId,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Optional free-form note.
    pub notes: Option<String>,
    /// Free-form JSON metadata.
    pub metadata: Value,
}

/// Revocation details recorded on an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    /// Revocation timestamp.
    pub revoked_at: DateTime<Utc>,
    /// User who revoked.
    pub revoked_by: UserId,
    /// Optional reason.
    pub reason: Option<String>,
}

/// Stored column values used to rehydrate an assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleAssignmentParts {
    /// Assignment id.
    pub id: RoleAssignmentId,
    /// Assignee.
    pub user_id: UserId,
    /// Granted role.
    pub role: Role,
    /// Stored scope.
    pub scope: AssignmentScope,
    /// Business id.
    pub business_id: BusinessContextId,
    /// Location id.
    pub location_id: Option<BusinessContextId>,
    /// Department id.
    pub department_id: Option<BusinessContextId>,
    /// Assignment timestamp.
    pub assigned_at: DateTime<Utc>,
    /// Assigner.
    pub assigned_by: UserId,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Stored activation flag.
    pub is_active: bool,
    /// Revocation details, if revoked.
    pub revocation: Option<Revocation>,
    /// Optional note.
    pub notes: Option<String>,
    /// Free-form metadata.
    pub metadata: Value,
}

/// A user's role within one business-context scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    id: RoleAssignmentId,
    user_id: UserId,
    role: Role,
    binding: ScopeBinding,
    assigned_at: DateTime<Utc>,
    assigned_by: UserId,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
    revocation: Option<Revocation>,
    notes: Option<String>,
    metadata: Value,
}

impl RoleAssignment {
    /// Creates an active assignment starting at `now`.
    pub fn new(input: NewRoleAssignment, now: DateTime<Utc>) -> AppResult<Self> {
        if input.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(AppError::Validation(
                "expires_at must be in the future".to_owned(),
            ));
        }
        if input.role == Role::PlatformAdmin && input.binding.scope() != AssignmentScope::Business
        {
            return Err(AppError::Validation(
                "PLATFORM_ADMIN can only be assigned at BUSINESS scope".to_owned(),
            ));
        }
        if !input.metadata.is_object() && !input.metadata.is_null() {
            return Err(AppError::Validation(
                "assignment metadata must be a JSON object".to_owned(),
            ));
        }

        Ok(Self {
            id: RoleAssignmentId::new(),
            user_id: input.user_id,
            role: input.role,
            binding: input.binding,
            assigned_at: now,
            assigned_by: input.assigned_by,
            expires_at: input.expires_at,
            is_active: true,
            revocation: None,
            notes: input
                .notes
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
            metadata: if input.metadata.is_null() {
                Value::Object(Default::default())
            } else {
                input.metadata
            },
        })
    }

    /// Rehydrates a stored assignment, re-checking scope consistency.
    pub fn restore(parts: RoleAssignmentParts) -> AppResult<Self> {
        let binding = ScopeBinding::resolve(
            parts.scope,
            parts.business_id,
            parts.location_id,
            parts.department_id,
        )?;

        if parts.is_active && parts.revocation.is_some() {
            return Err(AppError::Validation(format!(
                "assignment '{}' is active but carries a revocation",
                parts.id
            )));
        }

        Ok(Self {
            id: parts.id,
            user_id: parts.user_id,
            role: parts.role,
            binding,
            assigned_at: parts.assigned_at,
            assigned_by: parts.assigned_by,
            expires_at: parts.expires_at,
            is_active: parts.is_active,
            revocation: parts.revocation,
            notes: parts.notes,
            metadata: parts.metadata,
        })
    }

    /// Returns the assignment id.
    #[must_use]
    pub fn id(&self) -> RoleAssignmentId {
        self.id
    }

    /// Returns the assignee.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the granted role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the scope binding.
    #[must_use]
    pub fn binding(&self) -> &ScopeBinding {
        &self.binding
    }

    /// Returns the scope.
    #[must_use]
    pub fn scope(&self) -> AssignmentScope {
        self.binding.scope()
    }

    /// Returns the assignment timestamp.
    #[must_use]
    pub fn assigned_at(&self) -> DateTime<Utc> {
        self.assigned_at
    }

    /// Returns the assigner.
    #[must_use]
    pub fn assigned_by(&self) -> UserId {
        self.assigned_by
    }

    /// Returns the expiry, if any.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns the stored activation flag. Not authoritative on its own, see
    /// [`is_assignment_effective`].
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns revocation details, if revoked.
    #[must_use]
    pub fn revocation(&self) -> Option<&Revocation> {
        self.revocation.as_ref()
    }

    /// Returns the note, if any.
    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Returns the metadata object.
    #[must_use]
    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    /// Revokes the assignment. Returns `false` when it was already inactive.
    pub fn revoke(
        &mut self,
        revoked_by: UserId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.is_active {
            return false;
        }

        self.is_active = false;
        self.revocation = Some(Revocation {
            revoked_at: now,
            revoked_by,
            reason: reason
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
        });
        true
    }
}

/// Returns whether an assignment grants anything at `now`.
///
/// The stored flag alone is not authoritative: expiry is evaluated lazily here.
#[must_use]
pub fn is_assignment_effective(assignment: &RoleAssignment, now: DateTime<Utc>) -> bool {
    assignment.is_active
        && assignment
            .expires_at
            .is_none_or(|expires_at| expires_at > now)
}
