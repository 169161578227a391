use crate::domain::{AlarmQuery, AlarmQueryService, MAX_LIMIT};
use chrono::{DateTime, Duration, Utc};
use common::auth::{AccessScopeResolver, CallerContext};
use common::domain::{ClassifiedAlarm, DirectoryRepository, DomainResult, Location, Severity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

const RECENT_LOCATIONS: usize = 5;
const RECENT_ALARMS: usize = 10;
const ACTIVE_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSummary {
    pub id: String,
    pub name: String,
    pub device_id: String,
    /// "{city}, {province}"
    pub address: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Location> for LocationSummary {
    fn from(location: &Location) -> Self {
        Self {
            id: location.id.clone(),
            name: location.name.clone(),
            device_id: location.device_id.clone(),
            address: format!("{}, {}", location.city, location.province),
            created_at: location.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardOverview {
    pub total_locations: usize,
    pub active_alarms: usize,
    pub recent_locations: Vec<LocationSummary>,
    pub recent_alarms: Vec<ClassifiedAlarm>,
}

pub struct DashboardService {
    scope_resolver: Arc<dyn AccessScopeResolver>,
    directory: Arc<dyn DirectoryRepository>,
    alarm_query_service: Arc<AlarmQueryService>,
}

impl DashboardService {
    pub fn new(
        scope_resolver: Arc<dyn AccessScopeResolver>,
        directory: Arc<dyn DirectoryRepository>,
        alarm_query_service: Arc<AlarmQueryService>,
    ) -> Self {
        Self {
            scope_resolver,
            directory,
            alarm_query_service,
        }
    }

    pub async fn overview(&self, caller: &CallerContext) -> DomainResult<DashboardOverview> {
        self.overview_at(caller, Utc::now()).await
    }

    /// Overview as of `now`. Active alarms are CRITICAL or WARNING readings
    /// recorded within the last 24 hours, counted over the newest 1000.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn overview_at(
        &self,
        caller: &CallerContext,
        now: DateTime<Utc>,
    ) -> DomainResult<DashboardOverview> {
        let scope = self.scope_resolver.resolve(caller).await?;

        let mut locations: Vec<Location> = self
            .directory
            .list_locations()
            .await?
            .into_iter()
            .filter(|location| scope.contains(&location.device_id))
            .collect();
        locations.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let alarms = self
            .alarm_query_service
            .list_alarms(
                AlarmQuery {
                    limit: MAX_LIMIT,
                    ..Default::default()
                },
                caller,
            )
            .await?;

        let since = now - Duration::hours(ACTIVE_WINDOW_HOURS);
        let active_alarms = alarms
            .iter()
            .filter(|alarm| matches!(alarm.severity, Severity::Critical | Severity::Warning))
            .filter(|alarm| alarm.recorded_at > since)
            .count();

        debug!(
            location_count = locations.len(),
            alarm_count = alarms.len(),
            active_alarms,
            "Built dashboard overview"
        );

        Ok(DashboardOverview {
            total_locations: locations.len(),
            active_alarms,
            recent_locations: locations
                .iter()
                .take(RECENT_LOCATIONS)
                .map(LocationSummary::from)
                .collect(),
            recent_alarms: alarms.into_iter().take(RECENT_ALARMS).collect(),
        })
    }
}
