use chrono::{DateTime, Utc};
use common::auth::{AccessScope, AccessScopeResolver, CallerContext};
use common::domain::{
    AlarmStatistics, AlarmType, ClassifiedAlarm, DomainError, DomainResult, ListReadingsInput,
    ReadingRepository, Severity,
};
use common::garde::validate_struct;
use common::AlarmClassifier;
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub const DEFAULT_LIMIT: usize = 100;
pub const CRITICAL_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 1000;

/// Filter for alarm listings. Severity and type are applied after
/// classification, so they narrow the `limit` newest readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AlarmQuery {
    #[garde(skip)]
    #[serde(default)]
    pub device_id: Option<String>,
    #[garde(skip)]
    #[serde(default)]
    pub severity: Option<Severity>,
    #[garde(skip)]
    #[serde(default, rename = "type")]
    pub alarm_type: Option<AlarmType>,
    #[garde(skip)]
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[garde(skip)]
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[garde(range(min = 1, max = 1000))]
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl Default for AlarmQuery {
    fn default() -> Self {
        Self {
            device_id: None,
            severity: None,
            alarm_type: None,
            from: None,
            to: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl AlarmQuery {
    pub fn for_device(device_id: impl Into<String>) -> Self {
        Self {
            device_id: Some(device_id.into()),
            ..Default::default()
        }
    }

    fn check(&self) -> DomainResult<()> {
        validate_struct(self)?;
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(DomainError::ValidationError(format!(
                    "from ({}) is after to ({})",
                    from, to
                )));
            }
        }
        Ok(())
    }

    fn matches(&self, alarm: &ClassifiedAlarm) -> bool {
        self.severity.map_or(true, |s| alarm.severity == s)
            && self.alarm_type.map_or(true, |t| alarm.has_type(t))
    }
}

/// Read side: scoped alarm listings, classified on the fly
pub struct AlarmQueryService {
    reading_repository: Arc<dyn ReadingRepository>,
    scope_resolver: Arc<dyn AccessScopeResolver>,
    classifier: Arc<AlarmClassifier>,
}

impl AlarmQueryService {
    pub fn new(
        reading_repository: Arc<dyn ReadingRepository>,
        scope_resolver: Arc<dyn AccessScopeResolver>,
        classifier: Arc<AlarmClassifier>,
    ) -> Self {
        Self {
            reading_repository,
            scope_resolver,
            classifier,
        }
    }

    /// Newest first. An explicit device outside the caller's scope is
    /// PermissionDenied and an unknown one DeviceNotFound, never an empty list.
    #[instrument(skip(self, query, caller), fields(user_id = %caller.user_id, device_id = ?query.device_id))]
    pub async fn list_alarms(
        &self,
        query: AlarmQuery,
        caller: &CallerContext,
    ) -> DomainResult<Vec<ClassifiedAlarm>> {
        query.check()?;

        let scope = self.scope_resolver.resolve(caller).await?;

        let device_ids = match &query.device_id {
            Some(device_id) => {
                if let Err(e) = scope.require_device(device_id) {
                    warn!(user_id = %caller.user_id, device_id = %device_id, "Device outside access scope");
                    return Err(e);
                }
                self.ensure_device_exists(&scope, device_id).await?;
                vec![device_id.clone()]
            }
            None if scope.is_empty() => {
                debug!("Caller has no accessible devices");
                return Ok(Vec::new());
            }
            None => scope.device_ids().cloned().collect(),
        };

        let readings = self
            .reading_repository
            .list_readings(ListReadingsInput {
                device_ids,
                from: query.from,
                to: query.to,
                limit: query.limit,
            })
            .await?;

        let alarms: Vec<ClassifiedAlarm> = readings
            .iter()
            .map(|reading| self.classifier.classify(reading))
            .filter(|alarm| query.matches(alarm))
            .collect();

        debug!(
            reading_count = readings.len(),
            alarm_count = alarms.len(),
            "Listed alarms"
        );
        Ok(alarms)
    }

    pub async fn find_by_device(
        &self,
        device_id: &str,
        caller: &CallerContext,
    ) -> DomainResult<Vec<ClassifiedAlarm>> {
        self.list_alarms(AlarmQuery::for_device(device_id), caller)
            .await
    }

    pub async fn find_critical(
        &self,
        caller: &CallerContext,
    ) -> DomainResult<Vec<ClassifiedAlarm>> {
        let query = AlarmQuery {
            severity: Some(Severity::Critical),
            limit: CRITICAL_LIMIT,
            ..Default::default()
        };
        self.list_alarms(query, caller).await
    }

    /// Most recent reading of a device, classified for display
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn latest_reading(
        &self,
        device_id: &str,
        caller: &CallerContext,
    ) -> DomainResult<Option<ClassifiedAlarm>> {
        let scope = self.scope_resolver.resolve(caller).await?;
        scope.require_device(device_id)?;

        let reading = self.reading_repository.get_latest_reading(device_id).await?;
        if reading.is_none() && !is_provisioned(&scope, device_id) {
            return Err(DomainError::DeviceNotFound(device_id.to_string()));
        }
        Ok(reading.map(|r| self.classifier.classify(&r)))
    }

    /// A device exists when it is bound to a location or has reported at least once
    async fn ensure_device_exists(&self, scope: &AccessScope, device_id: &str) -> DomainResult<()> {
        if is_provisioned(scope, device_id) {
            return Ok(());
        }
        match self.reading_repository.get_latest_reading(device_id).await? {
            Some(_) => Ok(()),
            None => {
                warn!(device_id = %device_id, "Unknown device requested");
                Err(DomainError::DeviceNotFound(device_id.to_string()))
            }
        }
    }

    /// Counts over the device's most recent alarms (same window as `find_by_device`)
    pub async fn statistics(
        &self,
        device_id: &str,
        caller: &CallerContext,
    ) -> DomainResult<AlarmStatistics> {
        let alarms = self.find_by_device(device_id, caller).await?;
        Ok(AlarmStatistics::from_alarms(&alarms))
    }
}

fn is_provisioned(scope: &AccessScope, device_id: &str) -> bool {
    scope.device_ids().any(|id| id == device_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::auth::MockAccessScopeResolver;
    use common::domain::{Channel, ChannelReading, MockReadingRepository, Reading};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
    }

    fn scope_of(devices: &'static [&'static str]) -> MockAccessScopeResolver {
        let mut resolver = MockAccessScopeResolver::new();
        resolver
            .expect_resolve()
            .returning(move |_| Ok(AccessScope::new(devices.iter().copied())));
        resolver
    }

    fn readings() -> Vec<Reading> {
        vec![
            Reading::new("r3", "d1", at(3))
                .with_channel(Channel::Turbidity, ChannelReading::numeric(250.0)),
            Reading::new("r2", "d1", at(2))
                .with_channel(Channel::Ph, ChannelReading::numeric(9.0)),
            Reading::new("r1", "d1", at(1))
                .with_channel(Channel::Ph, ChannelReading::numeric(7.0)),
        ]
    }

    fn service(
        repo: MockReadingRepository,
        resolver: MockAccessScopeResolver,
    ) -> AlarmQueryService {
        AlarmQueryService::new(
            Arc::new(repo),
            Arc::new(resolver),
            Arc::new(AlarmClassifier::default()),
        )
    }

    fn caller() -> CallerContext {
        CallerContext::location_contact("u1", "acme", "l1")
    }

    #[tokio::test]
    async fn test_list_alarms_classifies_repository_results() {
        let mut repo = MockReadingRepository::new();
        repo.expect_list_readings()
            .withf(|input: &ListReadingsInput| {
                input.device_ids == vec!["d1".to_string()] && input.limit == DEFAULT_LIMIT
            })
            .times(1)
            .returning(|_| Ok(readings()));

        let alarms = service(repo, scope_of(&["d1"]))
            .list_alarms(AlarmQuery::default(), &caller())
            .await
            .unwrap();

        let severities: Vec<Severity> = alarms.iter().map(|a| a.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Critical, Severity::Warning, Severity::Normal]
        );
    }

    #[tokio::test]
    async fn test_out_of_scope_device_is_permission_denied() {
        let mut repo = MockReadingRepository::new();
        repo.expect_list_readings().never();

        let result = service(repo, scope_of(&["d1"]))
            .list_alarms(AlarmQuery::for_device("d2"), &caller())
            .await;

        assert!(matches!(result, Err(DomainError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_explicit_device_with_empty_scope_is_denied() {
        let mut repo = MockReadingRepository::new();
        repo.expect_list_readings().never();

        let result = service(repo, scope_of(&[]))
            .list_alarms(AlarmQuery::for_device("d1"), &caller())
            .await;

        assert!(matches!(result, Err(DomainError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_empty_scope_lists_nothing() {
        let mut repo = MockReadingRepository::new();
        repo.expect_list_readings().never();

        let alarms = service(repo, scope_of(&[]))
            .list_alarms(AlarmQuery::default(), &caller())
            .await
            .unwrap();
        assert!(alarms.is_empty());
    }

    #[tokio::test]
    async fn test_severity_and_type_filters() {
        let mut repo = MockReadingRepository::new();
        repo.expect_list_readings().returning(|_| Ok(readings()));
        let service = service(repo, scope_of(&["d1"]));

        let critical = service.find_critical(&caller()).await.unwrap();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].reading_id, "r3");

        let ph = service
            .list_alarms(
                AlarmQuery {
                    alarm_type: Some(AlarmType::Ph),
                    ..Default::default()
                },
                &caller(),
            )
            .await
            .unwrap();
        assert_eq!(ph.len(), 1);
        assert_eq!(ph[0].reading_id, "r2");
    }

    #[tokio::test]
    async fn test_find_critical_uses_smaller_window() {
        let mut repo = MockReadingRepository::new();
        repo.expect_list_readings()
            .withf(|input: &ListReadingsInput| input.limit == CRITICAL_LIMIT)
            .times(1)
            .returning(|_| Ok(vec![]));

        let alarms = service(repo, scope_of(&["d1"]))
            .find_critical(&caller())
            .await
            .unwrap();
        assert!(alarms.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_limit_and_reversed_range() {
        let service = service(MockReadingRepository::new(), MockAccessScopeResolver::new());

        let zero = AlarmQuery {
            limit: 0,
            ..Default::default()
        };
        assert!(matches!(
            service.list_alarms(zero, &caller()).await,
            Err(DomainError::ValidationError(_))
        ));

        let reversed = AlarmQuery {
            from: Some(at(10)),
            to: Some(at(0)),
            ..Default::default()
        };
        assert!(matches!(
            service.list_alarms(reversed, &caller()).await,
            Err(DomainError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_latest_reading_is_scoped() {
        let mut repo = MockReadingRepository::new();
        repo.expect_get_latest_reading()
            .withf(|device_id: &str| device_id == "d1")
            .times(1)
            .returning(|_| Ok(readings().into_iter().next()));
        let service = service(repo, scope_of(&["d1"]));

        let latest = service.latest_reading("d1", &caller()).await.unwrap().unwrap();
        assert_eq!(latest.reading_id, "r3");

        assert!(matches!(
            service.latest_reading("d9", &caller()).await,
            Err(DomainError::PermissionDenied(_))
        ));
    }

    fn unrestricted_over(devices: &'static [&'static str]) -> MockAccessScopeResolver {
        let mut resolver = MockAccessScopeResolver::new();
        resolver
            .expect_resolve()
            .returning(move |_| Ok(AccessScope::unrestricted(devices.iter().copied())));
        resolver
    }

    fn superadmin() -> CallerContext {
        CallerContext::superadmin("root")
    }

    #[tokio::test]
    async fn test_unknown_device_is_not_found_for_superadmin() {
        let mut repo = MockReadingRepository::new();
        repo.expect_get_latest_reading()
            .withf(|device_id: &str| device_id == "ghost")
            .returning(|_| Ok(None));
        repo.expect_list_readings().never();
        let service = service(repo, unrestricted_over(&["d1"]));

        assert!(matches!(
            service.list_alarms(AlarmQuery::for_device("ghost"), &superadmin()).await,
            Err(DomainError::DeviceNotFound(id)) if id == "ghost"
        ));
        assert!(matches!(
            service.latest_reading("ghost", &superadmin()).await,
            Err(DomainError::DeviceNotFound(id)) if id == "ghost"
        ));
    }

    #[tokio::test]
    async fn test_unprovisioned_device_with_readings_is_listed() {
        let mut repo = MockReadingRepository::new();
        repo.expect_get_latest_reading()
            .returning(|_| Ok(readings().into_iter().next()));
        repo.expect_list_readings()
            .withf(|input: &ListReadingsInput| input.device_ids == vec!["d1".to_string()])
            .times(1)
            .returning(|_| Ok(readings()));

        let alarms = service(repo, unrestricted_over(&[]))
            .find_by_device("d1", &superadmin())
            .await
            .unwrap();
        assert_eq!(alarms.len(), 3);
    }

    #[tokio::test]
    async fn test_provisioned_device_without_readings_is_empty() {
        let mut repo = MockReadingRepository::new();
        repo.expect_get_latest_reading().returning(|_| Ok(None));
        repo.expect_list_readings().returning(|_| Ok(vec![]));
        let service = service(repo, unrestricted_over(&["d1"]));

        assert!(service
            .find_by_device("d1", &superadmin())
            .await
            .unwrap()
            .is_empty());
        assert!(service
            .latest_reading("d1", &superadmin())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_statistics_sum_consistently() {
        let mut repo = MockReadingRepository::new();
        repo.expect_list_readings().returning(|_| Ok(readings()));

        let stats = service(repo, scope_of(&["d1"]))
            .statistics("d1", &caller())
            .await
            .unwrap();

        assert_eq!(stats.total, 3);
        assert_eq!(stats.critical + stats.warning + stats.info + stats.normal, stats.total);
        assert!(stats.by_type.values().all(|n| *n <= stats.total));
        assert_eq!(stats.by_type[&AlarmType::System], 1);
        assert_eq!(stats.latest.unwrap().reading_id, "r3");
    }

    #[test]
    fn test_query_deserializes_with_default_limit() {
        let query: AlarmQuery =
            serde_json::from_str(r#"{ "severity": "warning", "type": "ph" }"#).unwrap();
        assert_eq!(query.limit, DEFAULT_LIMIT);
        assert_eq!(query.alarm_type, Some(AlarmType::Ph));
    }
}
