use crate::auth::caller::CallerContext;
use crate::domain::{DomainError, DomainResult};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Set of device IDs a caller may query. Computed per request, never persisted.
///
/// An unrestricted scope still lists the known (provisioned) devices for
/// listing queries, but admits any explicitly requested device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessScope {
    device_ids: BTreeSet<String>,
    unrestricted: bool,
}

impl AccessScope {
    pub fn new<I, S>(device_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            device_ids: device_ids.into_iter().map(Into::into).collect(),
            unrestricted: false,
        }
    }

    pub fn unrestricted<I, S>(known_device_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            unrestricted: true,
            ..Self::new(known_device_ids)
        }
    }

    /// Scope that grants nothing
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.unrestricted || self.device_ids.contains(device_id)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.unrestricted
    }

    /// True when no known device is listed
    pub fn is_empty(&self) -> bool {
        self.device_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.device_ids.len()
    }

    pub fn device_ids(&self) -> impl Iterator<Item = &String> {
        self.device_ids.iter()
    }

    /// Reject a device outside the scope with PermissionDenied
    pub fn require_device(&self, device_id: &str) -> DomainResult<()> {
        if self.contains(device_id) {
            Ok(())
        } else {
            Err(DomainError::PermissionDenied(format!(
                "Access denied to device {}",
                device_id
            )))
        }
    }
}

/// Resolves the access scope of a caller
/// Every query path consumes scopes through this trait
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AccessScopeResolver: Send + Sync {
    async fn resolve(&self, caller: &CallerContext) -> DomainResult<AccessScope>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_device_inside_scope() {
        let scope = AccessScope::new(["device-1", "device-2"]);
        assert!(scope.require_device("device-2").is_ok());
        assert_eq!(scope.len(), 2);
    }

    #[test]
    fn test_require_device_outside_scope_is_permission_denied() {
        let scope = AccessScope::new(["device-1"]);
        let result = scope.require_device("device-9");
        assert!(matches!(result, Err(DomainError::PermissionDenied(_))));
    }

    #[test]
    fn test_empty_scope_denies_everything() {
        let scope = AccessScope::empty();
        assert!(scope.is_empty());
        assert!(scope.require_device("device-1").is_err());
    }

    #[test]
    fn test_unrestricted_scope_admits_unlisted_devices() {
        let scope = AccessScope::unrestricted(["device-1"]);
        assert!(scope.is_unrestricted());
        assert!(scope.require_device("unprovisioned").is_ok());
        assert_eq!(scope.device_ids().count(), 1);
    }
}
