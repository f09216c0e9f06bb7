//! Business → Location → Department hierarchy nodes.
//!
//! Every node carries a materialized path (root first, the node itself last)
//! so containment is a membership test instead of a parent-chain walk.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rendezvous_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const PATH_SEPARATOR: char = '/';

/// Unique identifier for a business context node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BusinessContextId(Uuid);

impl BusinessContextId {
    /// Creates a random context identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a context identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses a transport value into a context identifier.
    pub fn parse(value: &str) -> AppResult<Self> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid context id '{value}': {error}")))
    }
}

impl Default for BusinessContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for BusinessContextId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Granularity of a node in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextType {
    /// Root node owning every other node of a tenant.
    Business,
    /// Physical or virtual site of a business.
    Location,
    /// Team or service line inside a location.
    Department,
}

impl ContextType {
    /// Returns the hierarchy level for this type.
    #[must_use]
    pub fn level(&self) -> u8 {
        match self {
            Self::Business => 0,
            Self::Location => 1,
            Self::Department => 2,
        }
    }

    /// Returns the type a parent node must have, `None` for roots.
    #[must_use]
    pub fn expected_parent(&self) -> Option<Self> {
        match self {
            Self::Business => None,
            Self::Location => Some(Self::Business),
            Self::Department => Some(Self::Location),
        }
    }

    /// Returns a stable storage value for this type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Business => "BUSINESS",
            Self::Location => "LOCATION",
            Self::Department => "DEPARTMENT",
        }
    }

    /// Returns all context types ordered root first.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[Self::Business, Self::Location, Self::Department]
    }
}

impl FromStr for ContextType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "BUSINESS" => Ok(Self::Business),
            "LOCATION" => Ok(Self::Location),
            "DEPARTMENT" => Ok(Self::Department),
            _ => Err(AppError::Validation(format!(
                "unknown context type '{value}'"
            ))),
        }
    }
}

impl Display for ContextType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Materialized ancestor chain of a node, root first and the node itself last.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextPath(Vec<BusinessContextId>);

impl ContextPath {
    /// Creates the path of a root node.
    #[must_use]
    pub fn root(id: BusinessContextId) -> Self {
        Self(vec![id])
    }

    /// Returns the path of a direct child of the node owning this path.
    #[must_use]
    pub fn child(&self, id: BusinessContextId) -> Self {
        let mut segments = self.0.clone();
        segments.push(id);
        Self(segments)
    }

    /// Returns whether `id` is on this path, the owning node included.
    #[must_use]
    pub fn contains(&self, id: BusinessContextId) -> bool {
        self.0.contains(&id)
    }

    /// Returns the path segments, root first.
    #[must_use]
    pub fn segments(&self) -> &[BusinessContextId] {
        self.0.as_slice()
    }

    /// Returns the ancestor segments, root first, excluding the owning node.
    #[must_use]
    pub fn ancestors(&self) -> &[BusinessContextId] {
        match self.0.split_last() {
            Some((_, ancestors)) => ancestors,
            None => &[],
        }
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Returns the storage representation, segments joined by `/`.
    #[must_use]
    pub fn to_storage(&self) -> String {
        self.0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(&PATH_SEPARATOR.to_string())
    }

    /// Parses a stored path.
    pub fn parse(value: &str) -> AppResult<Self> {
        let segments = value
            .split(PATH_SEPARATOR)
            .map(BusinessContextId::parse)
            .collect::<AppResult<Vec<_>>>()?;

        if segments.is_empty() || segments.len() > ContextType::all().len() {
            return Err(AppError::Validation(format!(
                "context path '{value}' must have between 1 and {} segments",
                ContextType::all().len()
            )));
        }

        Ok(Self(segments))
    }
}

impl Display for ContextPath {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.to_storage().as_str())
    }
}

/// Input used to provision a new context node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessContextInput {
    /// Node type.
    pub context_type: ContextType,
    /// Display name, unique per business and type.
    pub name: String,
    /// Optional short code, unique per business.
    pub code: Option<String>,
    /// Parent node, required for every type except `Business`.
    pub parent_context_id: Option<BusinessContextId>,
    /// Sort key among siblings.
    pub display_order: i32,
    /// Optional IANA timezone name.
    pub timezone: Option<String>,
}

/// Stored column values used to rehydrate a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessContextParts {
    /// Node id.
    pub id: BusinessContextId,
    /// Node type.
    pub context_type: ContextType,
    /// Root business id.
    pub business_id: BusinessContextId,
    /// Parent node id.
    pub parent_context_id: Option<BusinessContextId>,
    /// Display name.
    pub name: String,
    /// Optional short code.
    pub code: Option<String>,
    /// Stored level.
    pub level: u8,
    /// Materialized path.
    pub path: ContextPath,
    /// Soft activation flag.
    pub is_active: bool,
    /// Sort key among siblings.
    pub display_order: i32,
    /// Optional timezone.
    pub timezone: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Node of the business hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessContext {
    id: BusinessContextId,
    context_type: ContextType,
    business_id: BusinessContextId,
    parent_context_id: Option<BusinessContextId>,
    name: NonEmptyString,
    code: Option<NonEmptyString>,
    level: u8,
    path: ContextPath,
    is_active: bool,
    display_order: i32,
    timezone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BusinessContext {
    /// Creates a node under `parent`, enforcing type, level and parent rules.
    pub fn create(
        input: BusinessContextInput,
        parent: Option<&BusinessContext>,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        let id = BusinessContextId::new();
        let context_type = input.context_type;

        if input.parent_context_id != parent.map(BusinessContext::id) {
            return Err(AppError::Validation(
                "parent context does not match the requested parent id".to_owned(),
            ));
        }

        let (business_id, path) = match (context_type.expected_parent(), parent) {
            (None, None) => (id, ContextPath::root(id)),
            (None, Some(_)) => {
                return Err(AppError::Validation(
                    "a BUSINESS context cannot have a parent".to_owned(),
                ));
            }
            (Some(expected), None) => {
                return Err(AppError::Validation(format!(
                    "a {context_type} context requires a {expected} parent"
                )));
            }
            (Some(expected), Some(parent)) => {
                if parent.context_type != expected {
                    return Err(AppError::Validation(format!(
                        "a {context_type} context requires a {expected} parent, got {}",
                        parent.context_type
                    )));
                }
                if !parent.is_active {
                    return Err(AppError::Validation(format!(
                        "parent context '{}' is inactive",
                        parent.id
                    )));
                }
                (parent.business_id, parent.path.child(id))
            }
        };

        Ok(Self {
            id,
            context_type,
            business_id,
            parent_context_id: parent.map(BusinessContext::id),
            name: NonEmptyString::new(input.name.trim())?,
            code: normalize_code(input.code)?,
            level: context_type.level(),
            path,
            is_active: true,
            display_order: input.display_order,
            timezone: input
                .timezone
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
            created_at: now,
            updated_at: now,
        })
    }

    /// Rehydrates a stored node, re-checking every structural invariant.
    pub fn restore(parts: BusinessContextParts) -> AppResult<Self> {
        let context_type = parts.context_type;

        if parts.level != context_type.level() {
            return Err(AppError::Validation(format!(
                "context '{}' has level {} but type {context_type} requires {}",
                parts.id,
                parts.level,
                context_type.level()
            )));
        }

        if parts.parent_context_id.is_none() != (context_type == ContextType::Business) {
            return Err(AppError::Validation(format!(
                "context '{}' of type {context_type} has an inconsistent parent",
                parts.id
            )));
        }

        let segments = parts.path.segments();
        let path_is_consistent = segments.len() == usize::from(context_type.level()) + 1
            && segments.last() == Some(&parts.id)
            && segments.first() == Some(&parts.business_id)
            && parts.path.ancestors().last().copied() == parts.parent_context_id;
        if !path_is_consistent {
            return Err(AppError::Validation(format!(
                "context '{}' has an inconsistent path '{}'",
                parts.id, parts.path
            )));
        }

        Ok(Self {
            id: parts.id,
            context_type,
            business_id: parts.business_id,
            parent_context_id: parts.parent_context_id,
            name: NonEmptyString::new(parts.name)?,
            code: normalize_code(parts.code)?,
            level: parts.level,
            path: parts.path,
            is_active: parts.is_active,
            display_order: parts.display_order,
            timezone: parts.timezone,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        })
    }

    /// Returns the node id.
    #[must_use]
    pub fn id(&self) -> BusinessContextId {
        self.id
    }

    /// Returns the node type.
    #[must_use]
    pub fn context_type(&self) -> ContextType {
        self.context_type
    }

    /// Returns the root business id.
    #[must_use]
    pub fn business_id(&self) -> BusinessContextId {
        self.business_id
    }

    /// Returns the parent id, `None` for businesses.
    #[must_use]
    pub fn parent_context_id(&self) -> Option<BusinessContextId> {
        self.parent_context_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the short code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_ref().map(NonEmptyString::as_str)
    }

    /// Returns the hierarchy level.
    #[must_use]
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Returns the materialized path.
    #[must_use]
    pub fn path(&self) -> &ContextPath {
        &self.path
    }

    /// Returns whether the node is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the sibling sort key.
    #[must_use]
    pub fn display_order(&self) -> i32 {
        self.display_order
    }

    /// Returns the timezone, if any.
    #[must_use]
    pub fn timezone(&self) -> Option<&str> {
        self.timezone.as_deref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns whether `other` equals this node or descends from it.
    #[must_use]
    pub fn contains(&self, other: &BusinessContext) -> bool {
        other.path.contains(self.id)
    }

    /// Renames the node.
    pub fn rename(&mut self, name: &str, now: DateTime<Utc>) -> AppResult<()> {
        self.name = NonEmptyString::new(name.trim())?;
        self.updated_at = now;
        Ok(())
    }

    /// Moves a department under another location of the same business.
    pub fn move_under(
        &mut self,
        new_parent: &BusinessContext,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if self.context_type != ContextType::Department {
            return Err(AppError::Validation(format!(
                "only DEPARTMENT contexts can be moved, '{}' is {}",
                self.id, self.context_type
            )));
        }
        if new_parent.context_type != ContextType::Location {
            return Err(AppError::Validation(format!(
                "a DEPARTMENT context requires a LOCATION parent, got {}",
                new_parent.context_type
            )));
        }
        if new_parent.business_id != self.business_id {
            return Err(AppError::Validation(
                "a department cannot move to another business".to_owned(),
            ));
        }
        if !new_parent.is_active {
            return Err(AppError::Validation(format!(
                "parent context '{}' is inactive",
                new_parent.id
            )));
        }

        self.parent_context_id = Some(new_parent.id);
        self.path = new_parent.path.child(self.id);
        self.updated_at = now;
        Ok(())
    }

    /// Marks the node inactive. Returns `false` when it already was.
    pub fn deactivate(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.updated_at = now;
        true
    }

    /// Marks the node active again. Returns `false` when it already was.
    pub fn reactivate(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_active {
            return false;
        }
        self.is_active = true;
        self.updated_at = now;
        true
    }
}

fn normalize_code(code: Option<String>) -> AppResult<Option<NonEmptyString>> {
    code.map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(NonEmptyString::new)
        .transpose()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;

    use super::{BusinessContext, BusinessContextInput, ContextPath, ContextType};

    fn input(
        context_type: ContextType,
        name: &str,
        parent: Option<&BusinessContext>,
    ) -> BusinessContextInput {
        BusinessContextInput {
            context_type,
            name: name.to_owned(),
            code: None,
            parent_context_id: parent.map(BusinessContext::id),
            display_order: 0,
            timezone: None,
        }
    }

    fn tree() -> (BusinessContext, BusinessContext, BusinessContext) {
        let now = Utc::now();
        let business =
            BusinessContext::create(input(ContextType::Business, "Salon", None), None, now)
                .unwrap_or_else(|_| unreachable!());
        let location = BusinessContext::create(
            input(ContextType::Location, "Downtown", Some(&business)),
            Some(&business),
            now,
        )
        .unwrap_or_else(|_| unreachable!());
        let department = BusinessContext::create(
            input(ContextType::Department, "Hair", Some(&location)),
            Some(&location),
            now,
        )
        .unwrap_or_else(|_| unreachable!());
        (business, location, department)
    }

    #[test]
    fn department_path_lists_business_then_location_then_itself() {
        let (business, location, department) = tree();

        assert_eq!(
            department.path().segments(),
            &[business.id(), location.id(), department.id()]
        );
        assert_eq!(department.business_id(), business.id());
        assert_eq!(department.path().ancestors(), &[business.id(), location.id()]);
    }

    #[test]
    fn containment_follows_the_path() {
        let (business, location, department) = tree();

        assert!(business.contains(&department));
        assert!(location.contains(&department));
        assert!(department.contains(&department));
        assert!(!department.contains(&location));
    }

    #[test]
    fn department_under_business_is_rejected() {
        let (business, _, _) = tree();
        let result = BusinessContext::create(
            input(ContextType::Department, "Nails", Some(&business)),
            Some(&business),
            Utc::now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn business_with_parent_is_rejected() {
        let (business, _, _) = tree();
        let result = BusinessContext::create(
            input(ContextType::Business, "Other", Some(&business)),
            Some(&business),
            Utc::now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn child_of_inactive_parent_is_rejected() {
        let (_, mut location, _) = tree();
        location.deactivate(Utc::now());
        let result = BusinessContext::create(
            input(ContextType::Department, "Spa", Some(&location)),
            Some(&location),
            Utc::now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn path_storage_value_parses_back() {
        let (_, _, department) = tree();
        let parsed = ContextPath::parse(department.path().to_storage().as_str());
        assert_eq!(parsed.ok().as_ref(), Some(department.path()));
    }

    #[test]
    fn move_under_recomputes_department_path() {
        let now = Utc::now();
        let (business, _, mut department) = tree();
        let uptown = BusinessContext::create(
            input(ContextType::Location, "Uptown", Some(&business)),
            Some(&business),
            now,
        )
        .unwrap_or_else(|_| unreachable!());

        assert!(department.move_under(&uptown, now).is_ok());
        assert_eq!(department.parent_context_id(), Some(uptown.id()));
        assert!(uptown.contains(&department));
    }

    proptest! {
        #[test]
        fn created_level_and_parent_match_type(
            type_index in 0_usize..3,
            name in "[a-zA-Z][a-zA-Z ]{0,20}",
        ) {
            let (business, location, _) = tree();
            let context_type = ContextType::all()[type_index];
            let parent = match context_type {
                ContextType::Business => None,
                ContextType::Location => Some(&business),
                ContextType::Department => Some(&location),
            };

            let created = BusinessContext::create(
                input(context_type, name.as_str(), parent),
                parent,
                Utc::now(),
            );
            prop_assert!(created.is_ok());
            let created = created.unwrap_or_else(|_| unreachable!());
            prop_assert_eq!(created.level(), context_type.level());
            prop_assert_eq!(
                created.parent_context_id().is_none(),
                context_type == ContextType::Business
            );
        }

        #[test]
        fn mismatched_parent_type_is_always_rejected(
            type_index in 0_usize..3,
            parent_index in 0_usize..3,
        ) {
            let (business, location, department) = tree();
            let context_type = ContextType::all()[type_index];
            let parent = [&business, &location, &department][parent_index];
            prop_assume!(context_type.expected_parent() != Some(parent.context_type()));

            let created = BusinessContext::create(
                input(context_type, "Node", Some(parent)),
                Some(parent),
                Utc::now(),
            );
            prop_assert!(created.is_err());
        }
    }
}
