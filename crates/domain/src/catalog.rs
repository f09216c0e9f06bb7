//! Role → permission catalog.
//!
//! The catalog is compiled configuration. It is built once at startup and
//! handed to the evaluator as an immutable value; a catalog that does not
//! cover every [`Role`] is rejected at construction.
//!
//! Self-scoped permissions are never part of a role's grant set. They are
//! reachable only through the evaluator's own-resource path.

use std::collections::{BTreeSet, HashMap};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rendezvous_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::{Permission, Role};

/// Subscription plan of a business. Selects owner-level grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionTier {
    /// Single-location starter plan.
    Free,
    /// Multi-location plan with reports.
    Basic,
    /// Adds analytics and exports.
    Premium,
    /// Adds integrations and multi-business ownership.
    Enterprise,
}

impl SubscriptionTier {
    /// Returns a stable storage value for this tier.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Basic => "BASIC",
            Self::Premium => "PREMIUM",
            Self::Enterprise => "ENTERPRISE",
        }
    }

    /// Parses a configuration value, case-insensitively.
    pub fn parse(value: &str) -> AppResult<Self> {
        Self::from_str(value.trim().to_ascii_uppercase().as_str())
    }
}

impl FromStr for SubscriptionTier {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "FREE" => Ok(Self::Free),
            "BASIC" => Ok(Self::Basic),
            "PREMIUM" => Ok(Self::Premium),
            "ENTERPRISE" => Ok(Self::Enterprise),
            _ => Err(AppError::Validation(format!(
                "unknown subscription tier '{value}'"
            ))),
        }
    }
}

impl Display for SubscriptionTier {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Immutable, total mapping from role to granted permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionCatalog {
    tier: SubscriptionTier,
    grants: [BTreeSet<Permission>; ROLE_COUNT],
}

impl PermissionCatalog {
    /// Builds the standard catalog for a subscription tier.
    #[must_use]
    pub fn standard(tier: SubscriptionTier) -> Self {
        let mut grants: [BTreeSet<Permission>; ROLE_COUNT] = Default::default();
        for role in Role::all() {
            grants[slot(*role)] = standard_grants(*role, tier);
        }

        Self { tier, grants }
    }

    /// Builds a catalog from explicit grants.
    ///
    /// Fails if any role is missing or if a role lists a self-scoped permission.
    pub fn from_grants(
        tier: SubscriptionTier,
        grants: HashMap<Role, BTreeSet<Permission>>,
    ) -> AppResult<Self> {
        let missing: Vec<&str> = Role::all()
            .iter()
            .filter(|role| !grants.contains_key(*role))
            .map(Role::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Validation(format!(
                "permission catalog is missing roles: {}",
                missing.join(", ")
            )));
        }

        let mut table: [BTreeSet<Permission>; ROLE_COUNT] = Default::default();
        for (role, permissions) in grants {
            let self_scoped = permissions
                .iter()
                .find(|permission| permission.is_self_scoped());
            if let Some(permission) = self_scoped {
                return Err(AppError::Validation(format!(
                    "role '{role}' cannot be granted self-scoped permission '{permission}'"
                )));
            }
            table[slot(role)] = permissions;
        }

        Ok(Self {
            tier,
            grants: table,
        })
    }

    /// Returns the tier this catalog was built for.
    #[must_use]
    pub fn tier(&self) -> SubscriptionTier {
        self.tier
    }

    /// Returns the permissions granted to `role`.
    #[must_use]
    pub fn permissions_for(&self, role: Role) -> &BTreeSet<Permission> {
        &self.grants[slot(role)]
    }

    /// Returns whether `role` grants `permission`.
    #[must_use]
    pub fn role_has_permission(&self, role: Role, permission: Permission) -> bool {
        self.permissions_for(role).contains(&permission)
    }

    /// Returns the roles granting `permission`, most senior first.
    #[must_use]
    pub fn roles_with_permission(&self, permission: Permission) -> Vec<Role> {
        Role::all()
            .iter()
            .copied()
            .filter(|role| self.role_has_permission(*role, permission))
            .collect()
    }
}

const ROLE_COUNT: usize = 15;

fn slot(role: Role) -> usize {
    match role {
        Role::PlatformAdmin => 0,
        Role::BusinessOwner => 1,
        Role::BusinessAdmin => 2,
        Role::LocationManager => 3,
        Role::DepartmentHead => 4,
        Role::SeniorPractitioner => 5,
        Role::Practitioner => 6,
        Role::JuniorPractitioner => 7,
        Role::Receptionist => 8,
        Role::Scheduler => 9,
        Role::Assistant => 10,
        Role::CorporateClient => 11,
        Role::VipClient => 12,
        Role::RegularClient => 13,
        Role::GuestClient => 14,
    }
}

fn owner_grants(tier: SubscriptionTier) -> BTreeSet<Permission> {
    let mut grants = BTreeSet::from([
        Permission::ManageBusiness,
        Permission::ManageBilling,
        Permission::ManageRoles,
        Permission::ManageStaff,
        Permission::ViewStaff,
        Permission::ManageStaffAvailability,
        Permission::ManageServices,
        Permission::ViewServices,
        Permission::ManageCalendars,
        Permission::ManageAppointments,
        Permission::BookAppointments,
        Permission::ViewAppointments,
        Permission::CancelAppointments,
        Permission::ManageClients,
        Permission::ViewClients,
    ]);

    if tier >= SubscriptionTier::Basic {
        grants.extend([
            Permission::ManageLocations,
            Permission::ManageDepartments,
            Permission::ViewReports,
        ]);
    }
    if tier >= SubscriptionTier::Premium {
        grants.extend([Permission::ViewAnalytics, Permission::ExportData]);
    }
    if tier >= SubscriptionTier::Enterprise {
        grants.extend([Permission::ManageIntegrations, Permission::CreateBusiness]);
    }

    grants
}

fn standard_grants(role: Role, tier: SubscriptionTier) -> BTreeSet<Permission> {
    match role {
        Role::PlatformAdmin => Permission::all()
            .iter()
            .copied()
            .filter(|permission| !permission.is_self_scoped())
            .collect(),
        Role::BusinessOwner => owner_grants(tier),
        Role::BusinessAdmin => {
            let mut grants = owner_grants(tier);
            grants.remove(&Permission::ManageBilling);
            grants.remove(&Permission::CreateBusiness);
            grants
        }
        Role::LocationManager => BTreeSet::from([
            Permission::ManageDepartments,
            Permission::ManageRoles,
            Permission::ManageStaff,
            Permission::ViewStaff,
            Permission::ManageStaffAvailability,
            Permission::ManageServices,
            Permission::ViewServices,
            Permission::ManageCalendars,
            Permission::ManageAppointments,
            Permission::BookAppointments,
            Permission::ViewAppointments,
            Permission::CancelAppointments,
            Permission::ManageClients,
            Permission::ViewClients,
            Permission::ViewReports,
            Permission::ViewAnalytics,
        ]),
        Role::DepartmentHead => BTreeSet::from([
            Permission::ManageRoles,
            Permission::ManageStaff,
            Permission::ViewStaff,
            Permission::ManageStaffAvailability,
            Permission::ViewServices,
            Permission::ManageCalendars,
            Permission::ManageAppointments,
            Permission::BookAppointments,
            Permission::ViewAppointments,
            Permission::CancelAppointments,
            Permission::ManageClients,
            Permission::ViewClients,
            Permission::ViewReports,
        ]),
        Role::SeniorPractitioner => BTreeSet::from([
            Permission::ViewStaff,
            Permission::ViewServices,
            Permission::ManageAppointments,
            Permission::BookAppointments,
            Permission::ViewAppointments,
            Permission::CancelAppointments,
            Permission::ManageClients,
            Permission::ViewClients,
        ]),
        Role::Practitioner => BTreeSet::from([
            Permission::ViewServices,
            Permission::BookAppointments,
            Permission::ViewAppointments,
            Permission::ViewClients,
        ]),
        Role::JuniorPractitioner | Role::Assistant => BTreeSet::from([
            Permission::ViewServices,
            Permission::ViewAppointments,
            Permission::ViewClients,
        ]),
        Role::Receptionist => BTreeSet::from([
            Permission::ViewStaff,
            Permission::ViewServices,
            Permission::BookAppointments,
            Permission::ViewAppointments,
            Permission::CancelAppointments,
            Permission::ManageClients,
            Permission::ViewClients,
        ]),
        Role::Scheduler => BTreeSet::from([
            Permission::ViewStaff,
            Permission::ManageStaffAvailability,
            Permission::ViewServices,
            Permission::ManageCalendars,
            Permission::ManageAppointments,
            Permission::BookAppointments,
            Permission::ViewAppointments,
            Permission::CancelAppointments,
            Permission::ViewClients,
        ]),
        Role::CorporateClient | Role::VipClient | Role::RegularClient => {
            BTreeSet::from([Permission::ViewServices, Permission::BookAppointments])
        }
        Role::GuestClient => BTreeSet::from([Permission::ViewServices]),
    }
}
