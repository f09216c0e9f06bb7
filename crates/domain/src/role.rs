use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rendezvous_core::AppError;
use serde::{Deserialize, Serialize};

/// Roles a user can hold inside a business context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Operator of the whole platform.
    PlatformAdmin,
    /// Owner of a business.
    BusinessOwner,
    /// Delegated administrator of a business.
    BusinessAdmin,
    /// Manager of one location.
    LocationManager,
    /// Lead of one department.
    DepartmentHead,
    /// Practitioner with supervision duties.
    SeniorPractitioner,
    /// Practitioner delivering services.
    Practitioner,
    /// Practitioner in training.
    JuniorPractitioner,
    /// Front desk staff.
    Receptionist,
    /// Staff handling calendars and bookings.
    Scheduler,
    /// Support staff assisting practitioners.
    Assistant,
    /// Client booking on behalf of a company.
    CorporateClient,
    /// Client with privileged booking.
    VipClient,
    /// Returning client.
    RegularClient,
    /// Unregistered or first-time client.
    GuestClient,
}

impl Role {
    /// Returns the seniority rank. Higher outranks lower.
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Self::PlatformAdmin => 100,
            Self::BusinessOwner => 90,
            Self::BusinessAdmin => 80,
            Self::LocationManager => 70,
            Self::DepartmentHead => 60,
            Self::SeniorPractitioner => 50,
            Self::Practitioner => 45,
            Self::JuniorPractitioner => 40,
            Self::Receptionist => 35,
            Self::Scheduler => 32,
            Self::Assistant => 30,
            Self::CorporateClient => 20,
            Self::VipClient => 15,
            Self::RegularClient => 10,
            Self::GuestClient => 5,
        }
    }

    /// Returns whether this role strictly outranks `other`.
    #[must_use]
    pub fn is_senior_to(&self, other: Role) -> bool {
        self.rank() > other.rank()
    }

    /// Returns whether this role belongs to a business's staff.
    #[must_use]
    pub fn is_staff(&self) -> bool {
        matches!(
            self,
            Self::BusinessOwner
                | Self::BusinessAdmin
                | Self::LocationManager
                | Self::DepartmentHead
                | Self::SeniorPractitioner
                | Self::Practitioner
                | Self::JuniorPractitioner
                | Self::Receptionist
                | Self::Scheduler
                | Self::Assistant
        )
    }

    /// Returns whether this role is a client role.
    #[must_use]
    pub fn is_client(&self) -> bool {
        matches!(
            self,
            Self::CorporateClient | Self::VipClient | Self::RegularClient | Self::GuestClient
        )
    }

    /// Returns whether permissions of this role depend on the subscription tier.
    #[must_use]
    pub fn is_owner_level(&self) -> bool {
        matches!(self, Self::BusinessOwner | Self::BusinessAdmin)
    }

    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlatformAdmin => "PLATFORM_ADMIN",
            Self::BusinessOwner => "BUSINESS_OWNER",
            Self::BusinessAdmin => "BUSINESS_ADMIN",
            Self::LocationManager => "LOCATION_MANAGER",
            Self::DepartmentHead => "DEPARTMENT_HEAD",
            Self::SeniorPractitioner => "SENIOR_PRACTITIONER",
            Self::Practitioner => "PRACTITIONER",
            Self::JuniorPractitioner => "JUNIOR_PRACTITIONER",
            Self::Receptionist => "RECEPTIONIST",
            Self::Scheduler => "SCHEDULER",
            Self::Assistant => "ASSISTANT",
            Self::CorporateClient => "CORPORATE_CLIENT",
            Self::VipClient => "VIP_CLIENT",
            Self::RegularClient => "REGULAR_CLIENT",
            Self::GuestClient => "GUEST_CLIENT",
        }
    }

    /// Returns all known roles, most senior first.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Role] = &[
            Role::PlatformAdmin,
            Role::BusinessOwner,
            Role::BusinessAdmin,
            Role::LocationManager,
            Role::DepartmentHead,
            Role::SeniorPractitioner,
            Role::Practitioner,
            Role::JuniorPractitioner,
            Role::Receptionist,
            Role::Scheduler,
            Role::Assistant,
            Role::CorporateClient,
            Role::VipClient,
            Role::RegularClient,
            Role::GuestClient,
        ];

        ALL
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|role| role.as_str() == value)
            .copied()
            .ok_or_else(|| AppError::Validation(format!("unknown role value '{value}'")))
    }
}

impl Display for Role {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}
