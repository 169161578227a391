use async_trait::async_trait;
use common::auth::{AccessScope, AccessScopeResolver, CallerContext};
use common::domain::{DirectoryRepository, DomainError, DomainResult, Location, UserRole};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Resolves access scopes from the tenancy directory.
///
/// - superadmin: every device, plus any explicitly requested one
/// - company admin: devices of the company's locations
/// - location contact: the single device of the assigned location, which must exist
/// - anything else: nothing
pub struct DirectoryAccessScoper {
    directory: Arc<dyn DirectoryRepository>,
}

impl DirectoryAccessScoper {
    pub fn new(directory: Arc<dyn DirectoryRepository>) -> Self {
        Self { directory }
    }

    async fn accessible_locations(&self, caller: &CallerContext) -> DomainResult<Vec<Location>> {
        match caller.role {
            UserRole::Superadmin => self.directory.list_locations().await,
            UserRole::CompanyAdmin => match caller.company_id.as_deref() {
                Some(company_id) => self.directory.list_locations_by_company(company_id).await,
                None => {
                    warn!(user_id = %caller.user_id, "Company admin without company");
                    Ok(Vec::new())
                }
            },
            UserRole::LocationContact => match caller.location_id.as_deref() {
                Some(location_id) => match self.directory.get_location(location_id).await? {
                    Some(location) => Ok(vec![location]),
                    None => {
                        warn!(
                            user_id = %caller.user_id,
                            location_id = %location_id,
                            "Assigned location not found"
                        );
                        Err(DomainError::LocationNotFound(location_id.to_string()))
                    }
                },
                None => {
                    warn!(user_id = %caller.user_id, "Location contact without location");
                    Ok(Vec::new())
                }
            },
            UserRole::Unrecognized => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl AccessScopeResolver for DirectoryAccessScoper {
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id, role = %caller.role))]
    async fn resolve(&self, caller: &CallerContext) -> DomainResult<AccessScope> {
        let device_ids = self
            .accessible_locations(caller)
            .await?
            .into_iter()
            .map(|location| location.device_id);

        let scope = match caller.role {
            UserRole::Superadmin => AccessScope::unrestricted(device_ids),
            _ => AccessScope::new(device_ids),
        };

        debug!(device_count = scope.len(), "Resolved access scope");
        Ok(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::MockDirectoryRepository;
    use mockall::predicate::eq;

    fn location(id: &str, device_id: &str, company_id: &str) -> Location {
        Location {
            id: id.to_string(),
            name: id.to_string(),
            device_id: device_id.to_string(),
            company_id: company_id.to_string(),
            city: String::new(),
            province: String::new(),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_superadmin_sees_all_devices() {
        let mut directory = MockDirectoryRepository::new();
        directory.expect_list_locations().times(1).returning(|| {
            Ok(vec![
                location("l1", "d1", "acme"),
                location("l2", "d2", "globex"),
            ])
        });

        let scoper = DirectoryAccessScoper::new(Arc::new(directory));
        let scope = scoper
            .resolve(&CallerContext::superadmin("root"))
            .await
            .unwrap();

        assert_eq!(scope.len(), 2);
        assert!(scope.require_device("d2").is_ok());
        assert!(scope.require_device("never-provisioned").is_ok());
    }

    #[tokio::test]
    async fn test_company_admin_scoped_to_company() {
        let mut directory = MockDirectoryRepository::new();
        directory
            .expect_list_locations_by_company()
            .with(eq("acme"))
            .times(1)
            .returning(|_| Ok(vec![location("l1", "d1", "acme")]));

        let scoper = DirectoryAccessScoper::new(Arc::new(directory));
        let scope = scoper
            .resolve(&CallerContext::company_admin("u1", "acme"))
            .await
            .unwrap();

        assert!(scope.require_device("d1").is_ok());
        assert!(matches!(
            scope.require_device("d2"),
            Err(DomainError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_location_contact_gets_single_device() {
        let mut directory = MockDirectoryRepository::new();
        directory
            .expect_get_location()
            .with(eq("l1"))
            .times(1)
            .returning(|_| Ok(Some(location("l1", "d1", "acme"))));

        let scoper = DirectoryAccessScoper::new(Arc::new(directory));
        let scope = scoper
            .resolve(&CallerContext::location_contact("u2", "acme", "l1"))
            .await
            .unwrap();

        assert_eq!(scope, AccessScope::new(["d1"]));
    }

    #[tokio::test]
    async fn test_unknown_assigned_location_is_not_found() {
        let mut directory = MockDirectoryRepository::new();
        directory
            .expect_get_location()
            .with(eq("gone"))
            .returning(|_| Ok(None));

        let scoper = DirectoryAccessScoper::new(Arc::new(directory));
        let result = scoper
            .resolve(&CallerContext::location_contact("u2", "acme", "gone"))
            .await;

        assert!(matches!(result, Err(DomainError::LocationNotFound(id)) if id == "gone"));
    }

    #[tokio::test]
    async fn test_unrecognized_role_fails_closed() {
        let directory = MockDirectoryRepository::new();
        let scoper = DirectoryAccessScoper::new(Arc::new(directory));

        let caller = CallerContext {
            user_id: "u3".to_string(),
            role: UserRole::Unrecognized,
            company_id: Some("acme".to_string()),
            location_id: Some("l1".to_string()),
        };
        let scope = scoper.resolve(&caller).await.unwrap();

        assert!(scope.is_empty());
        assert!(!scope.is_unrestricted());
    }

    #[tokio::test]
    async fn test_company_admin_without_company_fails_closed() {
        let scoper = DirectoryAccessScoper::new(Arc::new(MockDirectoryRepository::new()));
        let caller = CallerContext {
            company_id: None,
            ..CallerContext::company_admin("u1", "acme")
        };
        assert!(scoper.resolve(&caller).await.unwrap().is_empty());
    }
}
