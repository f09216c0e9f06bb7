use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rendezvous_core::AppError;
use serde::{Deserialize, Serialize};

/// Presentation grouping for permissions. Has no effect on evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCategory {
    /// Platform-wide operations.
    Platform,
    /// Business settings and billing.
    Business,
    /// Locations, departments and role administration.
    Organization,
    /// Staff management.
    Staff,
    /// Services, calendars and appointments.
    Scheduling,
    /// Client records.
    Clients,
    /// Reports and analytics.
    Reporting,
    /// Actions on the requester's own resources.
    SelfService,
}

/// Capabilities checked by the permission evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// Allows provisioning new businesses.
    CreateBusiness,
    /// Allows platform administration.
    ManagePlatform,
    /// Allows editing business settings.
    ManageBusiness,
    /// Allows managing subscription and invoices.
    ManageBilling,
    /// Allows third-party integrations setup.
    ManageIntegrations,
    /// Allows exporting business data.
    ExportData,
    /// Allows creating and editing locations.
    ManageLocations,
    /// Allows creating and editing departments.
    ManageDepartments,
    /// Allows assigning and revoking roles.
    ManageRoles,
    /// Allows managing staff members.
    ManageStaff,
    /// Allows reading staff profiles.
    ViewStaff,
    /// Allows editing other staff members' availability.
    ManageStaffAvailability,
    /// Allows editing the service catalog.
    ManageServices,
    /// Allows reading the service catalog.
    ViewServices,
    /// Allows editing calendars.
    ManageCalendars,
    /// Allows editing any appointment.
    ManageAppointments,
    /// Allows booking appointments.
    BookAppointments,
    /// Allows reading appointments.
    ViewAppointments,
    /// Allows cancelling appointments.
    CancelAppointments,
    /// Allows editing client records.
    ManageClients,
    /// Allows reading client records.
    ViewClients,
    /// Allows reading operational reports.
    ViewReports,
    /// Allows reading analytics dashboards.
    ViewAnalytics,
    /// Allows a practitioner to set their own availability.
    SetOwnAvailability,
    /// Allows a staff member to read their own schedule.
    ViewOwnSchedule,
    /// Allows a staff member to manage appointments assigned to them.
    ManageOwnAppointments,
}

impl Permission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateBusiness => "CREATE_BUSINESS",
            Self::ManagePlatform => "MANAGE_PLATFORM",
            Self::ManageBusiness => "MANAGE_BUSINESS",
            Self::ManageBilling => "MANAGE_BILLING",
            Self::ManageIntegrations => "MANAGE_INTEGRATIONS",
            Self::ExportData => "EXPORT_DATA",
            Self::ManageLocations => "MANAGE_LOCATIONS",
            Self::ManageDepartments => "MANAGE_DEPARTMENTS",
            Self::ManageRoles => "MANAGE_ROLES",
            Self::ManageStaff => "MANAGE_STAFF",
            Self::ViewStaff => "VIEW_STAFF",
            Self::ManageStaffAvailability => "MANAGE_STAFF_AVAILABILITY",
            Self::ManageServices => "MANAGE_SERVICES",
            Self::ViewServices => "VIEW_SERVICES",
            Self::ManageCalendars => "MANAGE_CALENDARS",
            Self::ManageAppointments => "MANAGE_APPOINTMENTS",
            Self::BookAppointments => "BOOK_APPOINTMENTS",
            Self::ViewAppointments => "VIEW_APPOINTMENTS",
            Self::CancelAppointments => "CANCEL_APPOINTMENTS",
            Self::ManageClients => "MANAGE_CLIENTS",
            Self::ViewClients => "VIEW_CLIENTS",
            Self::ViewReports => "VIEW_REPORTS",
            Self::ViewAnalytics => "VIEW_ANALYTICS",
            Self::SetOwnAvailability => "SET_OWN_AVAILABILITY",
            Self::ViewOwnSchedule => "VIEW_OWN_SCHEDULE",
            Self::ManageOwnAppointments => "MANAGE_OWN_APPOINTMENTS",
        }
    }

    /// Returns the presentation category.
    #[must_use]
    pub fn category(&self) -> PermissionCategory {
        match self {
            Self::CreateBusiness | Self::ManagePlatform => PermissionCategory::Platform,
            Self::ManageBusiness
            | Self::ManageBilling
            | Self::ManageIntegrations
            | Self::ExportData => PermissionCategory::Business,
            Self::ManageLocations | Self::ManageDepartments | Self::ManageRoles => {
                PermissionCategory::Organization
            }
            Self::ManageStaff | Self::ViewStaff | Self::ManageStaffAvailability => {
                PermissionCategory::Staff
            }
            Self::ManageServices
            | Self::ViewServices
            | Self::ManageCalendars
            | Self::ManageAppointments
            | Self::BookAppointments
            | Self::ViewAppointments
            | Self::CancelAppointments => PermissionCategory::Scheduling,
            Self::ManageClients | Self::ViewClients => PermissionCategory::Clients,
            Self::ViewReports | Self::ViewAnalytics => PermissionCategory::Reporting,
            Self::SetOwnAvailability | Self::ViewOwnSchedule | Self::ManageOwnAppointments => {
                PermissionCategory::SelfService
            }
        }
    }

    /// Returns whether this permission targets the requester's own resources.
    #[must_use]
    pub fn is_self_scoped(&self) -> bool {
        self.category() == PermissionCategory::SelfService
    }

    /// Returns all known permissions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Permission] = &[
            Permission::CreateBusiness,
            Permission::ManagePlatform,
            Permission::ManageBusiness,
            Permission::ManageBilling,
            Permission::ManageIntegrations,
            Permission::ExportData,
            Permission::ManageLocations,
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
            Permission::SetOwnAvailability,
            Permission::ViewOwnSchedule,
            Permission::ManageOwnAppointments,
        ];

        ALL
    }

    /// Parses a transport value into a permission.
    pub fn from_transport(value: &str) -> Result<Self, AppError> {
        Self::from_str(value.trim().to_ascii_uppercase().as_str())
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|permission| permission.as_str() == value)
            .copied()
            .ok_or_else(|| AppError::Validation(format!("unknown permission value '{value}'")))
    }
}

impl Display for Permission {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Stable audit actions emitted by access-control use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a context node is provisioned.
    ContextCreated,
    /// Emitted when a context node is renamed.
    ContextRenamed,
    /// Emitted when a department moves to another location.
    ContextMoved,
    /// Emitted when a context node is deactivated.
    ContextDeactivated,
    /// Emitted when a context node is reactivated.
    ContextReactivated,
    /// Emitted when a role is assigned to a user.
    RoleAssigned,
    /// Emitted when a role assignment is revoked.
    RoleRevoked,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContextCreated => "rbac.context.created",
            Self::ContextRenamed => "rbac.context.renamed",
            Self::ContextMoved => "rbac.context.moved",
            Self::ContextDeactivated => "rbac.context.deactivated",
            Self::ContextReactivated => "rbac.context.reactivated",
            Self::RoleAssigned => "rbac.role.assigned",
            Self::RoleRevoked => "rbac.role.revoked",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{Permission, PermissionCategory};

    #[test]
    fn permission_roundtrip_storage_value() {
        let permission = Permission::ManageStaff;
        let restored = Permission::from_str(permission.as_str());
        assert_eq!(restored.ok(), Some(permission));
    }

    #[test]
    fn transport_values_are_case_insensitive() {
        assert_eq!(
            Permission::from_transport(" set_own_availability ").ok(),
            Some(Permission::SetOwnAvailability)
        );
    }

    #[test]
    fn unknown_permission_is_rejected() {
        let parsed = Permission::from_str("MANAGE_EVERYTHING");
        assert!(parsed.is_err());
    }

    #[test]
    fn only_self_service_permissions_are_self_scoped() {
        let self_scoped: Vec<Permission> = Permission::all()
            .iter()
            .copied()
            .filter(Permission::is_self_scoped)
            .collect();

        assert_eq!(
            self_scoped,
            vec![
                Permission::SetOwnAvailability,
                Permission::ViewOwnSchedule,
                Permission::ManageOwnAppointments,
            ]
        );
        assert_eq!(
            Permission::ManageStaff.category(),
            PermissionCategory::Staff
        );
    }
}
