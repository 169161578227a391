use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tenant role of a user. Unknown role strings deserialize to `Unrecognized`
/// and are granted nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Superadmin,
    CompanyAdmin,
    LocationContact,
    #[serde(other)]
    Unrecognized,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UserRole::Superadmin => "superadmin",
            UserRole::CompanyAdmin => "company_admin",
            UserRole::LocationContact => "location_contact",
            UserRole::Unrecognized => "unrecognized",
        };
        f.write_str(s)
    }
}

/// User domain entity, as known to the tenancy directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub company_id: Option<String>,
    pub location_id: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.role == role
    }
}
