use crate::domain::result::DomainResult;
use crate::domain::user::{User, UserRole};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tenant that owns locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub contact_email: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Monitored site. Each location is bound to exactly one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub device_id: String,
    pub company_id: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Location resolved together with its owning company and user lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationDetails {
    pub location: Location,
    pub company: Option<Company>,
    /// Users assigned to this location
    pub users: Vec<User>,
    /// Users belonging to the owning company
    pub company_users: Vec<User>,
}

impl LocationDetails {
    /// All users with role LOCATION_CONTACT at this location, active or not
    pub fn location_contacts(&self) -> Vec<&User> {
        self.users
            .iter()
            .filter(|u| u.has_role(UserRole::LocationContact))
            .collect()
    }

    /// The single COMPANY_ADMIN of the owning company, if one exists
    pub fn company_admin(&self) -> Option<&User> {
        self.company_users
            .iter()
            .find(|u| u.has_role(UserRole::CompanyAdmin))
    }
}

/// Read-only lookups against the tenancy directory (companies, locations, users)
/// Infrastructure layer implements this trait
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    /// Resolve the location bound to a device, with nested company and users
    async fn get_location_by_device_id(
        &self,
        device_id: &str,
    ) -> DomainResult<Option<LocationDetails>>;

    /// Get a location by ID
    async fn get_location(&self, location_id: &str) -> DomainResult<Option<Location>>;

    /// List every location across all tenants
    async fn list_locations(&self) -> DomainResult<Vec<Location>>;

    /// List locations owned by a company
    async fn list_locations_by_company(&self, company_id: &str) -> DomainResult<Vec<Location>>;

    /// Resolve the company admin of a company
    async fn get_company_admin(&self, company_id: &str) -> DomainResult<Option<User>>;

    /// Resolve the location contacts of a location
    async fn list_location_contacts(&self, location_id: &str) -> DomainResult<Vec<User>>;
}
