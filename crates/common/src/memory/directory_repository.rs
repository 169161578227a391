use crate::domain::{
    Company, DirectoryRepository, DomainResult, Location, LocationDetails, User, UserRole,
};
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Serialized form of the tenancy directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    #[serde(default)]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub users: Vec<User>,
}

impl DirectorySnapshot {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Failed to parse directory snapshot")
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read directory file {}", path.display()))?;
        Self::from_json(&json)
    }
}

/// Directory backed by an in-process snapshot
#[derive(Clone, Default)]
pub struct InMemoryDirectoryRepository {
    snapshot: Arc<RwLock<DirectorySnapshot>>,
}

impl InMemoryDirectoryRepository {
    pub fn new(snapshot: DirectorySnapshot) -> Self {
        info!(
            companies = snapshot.companies.len(),
            locations = snapshot.locations.len(),
            users = snapshot.users.len(),
            "Loaded directory snapshot"
        );
        Self {
            snapshot: Arc::new(RwLock::new(snapshot)),
        }
    }

    /// Swap the whole directory, e.g. after the source file changed
    pub async fn replace(&self, snapshot: DirectorySnapshot) {
        *self.snapshot.write().await = snapshot;
    }
}

fn with_role<'a>(
    users: impl Iterator<Item = &'a User>,
    role: UserRole,
) -> impl Iterator<Item = &'a User> {
    users.filter(move |u| u.has_role(role))
}

#[async_trait]
impl DirectoryRepository for InMemoryDirectoryRepository {
    async fn get_location_by_device_id(
        &self,
        device_id: &str,
    ) -> DomainResult<Option<LocationDetails>> {
        let snapshot = self.snapshot.read().await;

        let Some(location) = snapshot.locations.iter().find(|l| l.device_id == device_id) else {
            debug!(device_id = %device_id, "No location bound to device");
            return Ok(None);
        };

        let company = snapshot
            .companies
            .iter()
            .find(|c| c.id == location.company_id)
            .cloned();
        let users = snapshot
            .users
            .iter()
            .filter(|u| u.location_id.as_deref() == Some(location.id.as_str()))
            .cloned()
            .collect();
        let company_users = snapshot
            .users
            .iter()
            .filter(|u| u.company_id.as_deref() == Some(location.company_id.as_str()))
            .cloned()
            .collect();

        Ok(Some(LocationDetails {
            location: location.clone(),
            company,
            users,
            company_users,
        }))
    }

    async fn get_location(&self, location_id: &str) -> DomainResult<Option<Location>> {
        let snapshot = self.snapshot.read().await;
        Ok(snapshot
            .locations
            .iter()
            .find(|l| l.id == location_id)
            .cloned())
    }

    async fn list_locations(&self) -> DomainResult<Vec<Location>> {
        Ok(self.snapshot.read().await.locations.clone())
    }

    async fn list_locations_by_company(&self, company_id: &str) -> DomainResult<Vec<Location>> {
        let snapshot = self.snapshot.read().await;
        Ok(snapshot
            .locations
            .iter()
            .filter(|l| l.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn get_company_admin(&self, company_id: &str) -> DomainResult<Option<User>> {
        let snapshot = self.snapshot.read().await;
        let admin = with_role(
            snapshot
                .users
                .iter()
                .filter(|u| u.company_id.as_deref() == Some(company_id)),
            UserRole::CompanyAdmin,
        )
        .next()
        .cloned();
        Ok(admin)
    }

    async fn list_location_contacts(&self, location_id: &str) -> DomainResult<Vec<User>> {
        let snapshot = self.snapshot.read().await;
        Ok(with_role(
            snapshot
                .users
                .iter()
                .filter(|u| u.location_id.as_deref() == Some(location_id)),
            UserRole::LocationContact,
        )
        .cloned()
        .collect())
    }
}
