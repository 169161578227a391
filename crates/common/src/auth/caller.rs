use crate::domain::{User, UserRole};

/// Authenticated caller as handed over by the API layer after token validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub user_id: String,
    pub role: UserRole,
    pub company_id: Option<String>,
    pub location_id: Option<String>,
}

impl CallerContext {
    pub fn superadmin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: UserRole::Superadmin,
            company_id: None,
            location_id: None,
        }
    }

    pub fn company_admin(user_id: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: UserRole::CompanyAdmin,
            company_id: Some(company_id.into()),
            location_id: None,
        }
    }

    pub fn location_contact(
        user_id: impl Into<String>,
        company_id: impl Into<String>,
        location_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            role: UserRole::LocationContact,
            company_id: Some(company_id.into()),
            location_id: Some(location_id.into()),
        }
    }
}

impl From<&User> for CallerContext {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            role: user.role,
            company_id: user.company_id.clone(),
            location_id: user.location_id.clone(),
        }
    }
}
