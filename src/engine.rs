//! Request-level orchestration: fetch once, classify in parallel, project

use crate::aggregate::{
    cumulative_volume, merge_macro_steps, macro_step::micro_steps_from_events, timeliness_series,
    volume_groups, MacroStepSegment, TimelinessPoint, VolumePoint,
};
use crate::classify::{
    AcquisitionClassifier, AcquisitionStatus, Classification, Classifier, DatatakeClassifier,
    DatatakeStatus, DhusClassifier, DhusStatus, HktmClassifier, HktmStatus, ProcessingClassifier,
    ProcessingStatus,
};
use crate::config::{Domain, EngineConfig};
use crate::core::event::EventId;
use crate::core::temporal::TimeWindow;
use crate::error::Result;
use crate::navigator::Navigator;
use crate::project::{project, Record};
use crate::storage::{EventFilter, EventStore, Snapshot, SnapshotRequest};
use futures::future::try_join_all;
use std::sync::Arc;

/// Reporting window and satellite restriction of one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportScope {
    pub window: Option<TimeWindow>,
    pub satellite: Option<String>,
}

impl ReportScope {
    pub fn new(window: Option<TimeWindow>, satellite: Option<String>) -> Self {
        Self { window, satellite }
    }

    fn filter(&self, kinds: &[String]) -> EventFilter {
        let filter = EventFilter::new()
            .kinds(kinds.iter())
            .satellite(self.satellite.clone());
        match self.window {
            Some(window) => filter.window(window),
            None => filter,
        }
    }
}

/// Classification engine over a read-only event store
pub struct CorrelationEngine {
    store: Arc<dyn EventStore>,
    config: Arc<EngineConfig>,
}

impl CorrelationEngine {
    pub fn new(store: Arc<dyn EventStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fetch the working set of one request
    async fn snapshot(
        &self,
        primary_kinds: &[String],
        auxiliary_kinds: &[String],
        max_link_depth: usize,
        scope: &ReportScope,
    ) -> Result<Arc<Snapshot>> {
        let auxiliary = if auxiliary_kinds.is_empty() {
            Vec::new()
        } else {
            vec![scope.filter(auxiliary_kinds)]
        };
        let request = SnapshotRequest {
            primary: scope.filter(primary_kinds),
            auxiliary,
            max_link_depth,
        };
        let snapshot = Snapshot::fetch(self.store.as_ref(), &request).await?;
        Ok(Arc::new(snapshot))
    }

    async fn domain_snapshot(&self, domain: Domain, scope: &ReportScope) -> Result<Arc<Snapshot>> {
        self.snapshot(
            self.config.primary_kinds(domain),
            &self.config.auxiliary_kinds(domain),
            self.config.engine.max_link_depth,
            scope,
        )
        .await
    }

    /// Classify every accepted primary event of a snapshot.
    ///
    /// Work is split into chunks run on the blocking pool; results keep the
    /// snapshot's primary order.
    pub async fn classify_snapshot<C>(
        &self,
        classifier: Arc<C>,
        snapshot: Arc<Snapshot>,
    ) -> Result<Vec<Classification<C::Status>>>
    where
        C: Classifier,
    {
        let ids: Vec<EventId> = snapshot
            .primary_events()
            .filter(|e| classifier.accepts(e))
            .map(|e| e.id)
            .collect();

        let tasks = ids.chunks(self.config.engine.fan_out_chunk.max(1)).map(|chunk| {
            let chunk = chunk.to_vec();
            let classifier = Arc::clone(&classifier);
            let snapshot = Arc::clone(&snapshot);
            tokio::task::spawn_blocking(move || {
                let nav = Navigator::new(&snapshot);
                chunk
                    .iter()
                    .filter_map(|id| snapshot.event(id))
                    .map(|event| classifier.classify(event, &nav))
                    .collect::<Vec<_>>()
            })
        });
        let chunks = try_join_all(tasks).await?;

        let classifications: Vec<_> = chunks.into_iter().flatten().collect();
        tracing::debug!(classified = classifications.len(), "fan-out complete");
        Ok(classifications)
    }

    #[tracing::instrument(skip(self))]
    pub async fn acquisition(&self, scope: &ReportScope) -> Result<Vec<Classification<AcquisitionStatus>>> {
        let snapshot = self.domain_snapshot(Domain::Acquisition, scope).await?;
        let classifier = Arc::new(AcquisitionClassifier::new(self.config.acquisition.clone()));
        self.classify_snapshot(classifier, snapshot).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn processing(&self, scope: &ReportScope) -> Result<Vec<Classification<ProcessingStatus>>> {
        let snapshot = self.domain_snapshot(Domain::Processing, scope).await?;
        let classifier = Arc::new(ProcessingClassifier::new(self.config.processing.clone()));
        self.classify_snapshot(classifier, snapshot).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn datatake(&self, scope: &ReportScope) -> Result<Vec<Classification<DatatakeStatus>>> {
        let snapshot = self.domain_snapshot(Domain::Datatake, scope).await?;
        let classifier = Arc::new(DatatakeClassifier::new(self.config.datatake.clone()));
        self.classify_snapshot(classifier, snapshot).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn dhus(&self, scope: &ReportScope) -> Result<Vec<Classification<DhusStatus>>> {
        let snapshot = self.domain_snapshot(Domain::Dhus, scope).await?;
        let classifier = Arc::new(DhusClassifier::new(self.config.dhus.clone()));
        self.classify_snapshot(classifier, snapshot).await
    }

    /// HKTM playbacks, followed by the orbits without any HKTM playback
    #[tracing::instrument(skip(self))]
    pub async fn hktm(&self, scope: &ReportScope) -> Result<Vec<Classification<HktmStatus>>> {
        let snapshot = self.domain_snapshot(Domain::Hktm, scope).await?;
        let classifier = Arc::new(HktmClassifier::new(self.config.hktm.clone()));
        let mut classifications = self
            .classify_snapshot(Arc::clone(&classifier), Arc::clone(&snapshot))
            .await?;
        classifications.extend(classifier.unplanned_orbits(&Navigator::new(&snapshot)));
        Ok(classifications)
    }

    /// Classify one domain and project the results into flat records
    #[tracing::instrument(skip(self))]
    pub async fn report(&self, domain: Domain, scope: &ReportScope) -> Result<Vec<Record>> {
        let snapshot = self.domain_snapshot(domain, scope).await?;
        let records = match domain {
            Domain::Acquisition => {
                let classifier = Arc::new(AcquisitionClassifier::new(self.config.acquisition.clone()));
                project(&snapshot, &self.classify_snapshot(classifier, Arc::clone(&snapshot)).await?)
            }
            Domain::Processing => {
                let classifier = Arc::new(ProcessingClassifier::new(self.config.processing.clone()));
                project(&snapshot, &self.classify_snapshot(classifier, Arc::clone(&snapshot)).await?)
            }
            Domain::Datatake => {
                let classifier = Arc::new(DatatakeClassifier::new(self.config.datatake.clone()));
                project(&snapshot, &self.classify_snapshot(classifier, Arc::clone(&snapshot)).await?)
            }
            Domain::Dhus => {
                let classifier = Arc::new(DhusClassifier::new(self.config.dhus.clone()));
                let classifications = self
                    .classify_snapshot(Arc::clone(&classifier), Arc::clone(&snapshot))
                    .await?;
                let nav = Navigator::new(&snapshot);
                classifications
                    .iter()
                    .filter_map(|classification| {
                        let event = snapshot.event(&classification.event_id)?;
                        let record = Record::from_classification(event, classification);
                        let footprint: Vec<_> = classifier
                            .tiles(event, &nav)
                            .into_iter()
                            .flat_map(|tile| tile.footprint)
                            .collect();
                        Some(if footprint.is_empty() {
                            record
                        } else {
                            record.with_geometries(footprint)
                        })
                    })
                    .collect()
            }
            Domain::Hktm => {
                let classifier = Arc::new(HktmClassifier::new(self.config.hktm.clone()));
                let mut classifications = self
                    .classify_snapshot(Arc::clone(&classifier), Arc::clone(&snapshot))
                    .await?;
                classifications.extend(classifier.unplanned_orbits(&Navigator::new(&snapshot)));
                project(&snapshot, &classifications)
            }
        };

        tracing::info!(%domain, records = records.len(), "report complete");
        Ok(records)
    }

    /// Mean publication timeliness per datastrip
    #[tracing::instrument(skip(self))]
    pub async fn timeliness(&self, scope: &ReportScope) -> Result<Vec<TimelinessPoint>> {
        let snapshot = self.domain_snapshot(Domain::Dhus, scope).await?;
        let classifier = DhusClassifier::new(self.config.dhus.clone());
        let nav = Navigator::new(&snapshot);
        let inputs = snapshot
            .primary_events()
            .filter(|e| classifier.accepts(e))
            .filter_map(|e| classifier.timeliness_input(e, &nav));
        Ok(timeliness_series(inputs))
    }

    /// Cumulative data volume over the datastrips of the window
    #[tracing::instrument(skip(self))]
    pub async fn volume(&self, scope: &ReportScope) -> Result<Vec<VolumePoint>> {
        let snapshot = self
            .snapshot(&self.config.volume.datastrip_kinds, &[], 0, scope)
            .await?;
        let nav = Navigator::new(&snapshot);
        let groups = volume_groups(&nav, snapshot.primary_events(), &self.config.volume);
        tracing::info!(groups = groups.len(), "volume groups built");
        Ok(cumulative_volume(groups))
    }

    /// Macro-step segments of the products processed in the window
    #[tracing::instrument(skip(self))]
    pub async fn macro_steps(&self, scope: &ReportScope) -> Result<Vec<MacroStepSegment>> {
        let snapshot = self
            .snapshot(&self.config.macro_step.step_kinds, &[], 0, scope)
            .await?;
        let steps = micro_steps_from_events(snapshot.primary_events(), &self.config.macro_step);
        let segments = merge_macro_steps(&self.config.macro_steps, &steps);
        tracing::info!(steps = steps.len(), segments = segments.len(), "macro steps merged");
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Tag;
    use crate::core::event::{Annotation, Event, Link};
    use crate::core::temporal::Timestamp;
    use crate::storage::{InMemoryStore, MockEventStore};

    fn event(kind: &str, start: i64, stop: i64) -> Event {
        Event::new(kind, Timestamp::from_secs(start), Timestamp::from_secs(stop), "S2A").unwrap()
    }

    /// Corrected playback, plan, station and one validity event per channel status
    fn acquisition_store(channel_statuses: &[&str]) -> (InMemoryStore, Event) {
        let mut store = InMemoryStore::new();
        let acquisition = event("PLANNED_PLAYBACK_CORRECTION", 0, 600);
        let planned = Event::builder("PLANNED_PLAYBACK", Timestamp::from_secs(0), Timestamp::from_secs(600), "S2A")
            .attr("playback_type", "NOMINAL")
            .build()
            .unwrap();
        let schedule = Event::builder("STATION_SCHEDULE", Timestamp::from_secs(0), Timestamp::from_secs(600), "S2A")
            .attr("station", "MPS_")
            .build()
            .unwrap();
        store.insert_link(Link::new("PLANNED_PLAYBACK", acquisition.id, planned.id));
        store.insert_link(Link::new("STATION_SCHEDULE", planned.id, schedule.id));
        for status in channel_statuses {
            let validity = Event::builder("PLAYBACK_VALIDITY_3", Timestamp::from_secs(0), Timestamp::from_secs(600), "S2A")
                .attr("status", *status)
                .build()
                .unwrap();
            store.insert_link(Link::new("PLAYBACK_VALIDITY", validity.id, planned.id));
            store.insert_event(validity);
        }
        store.insert_event(acquisition.clone());
        store.insert_event(planned);
        store.insert_event(schedule);
        (store, acquisition)
    }

    fn engine(store: InMemoryStore) -> CorrelationEngine {
        CorrelationEngine::new(Arc::new(store), EngineConfig::default())
    }

    #[tokio::test]
    async fn test_acquisition_end_to_end() {
        let scope = ReportScope::default();

        let (store, acquisition) = acquisition_store(&["COMPLETE"]);
        let received = engine(store).acquisition(&scope).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].event_id, acquisition.id);
        assert_eq!(received[0].status, AcquisitionStatus::Received);
        assert_eq!(received[0].details["station"], "MPS_");

        let (store, _) = acquisition_store(&[]);
        let missing = engine(store).acquisition(&scope).await.unwrap();
        assert_eq!(missing[0].status, AcquisitionStatus::Missing);

        let (store, _) = acquisition_store(&["COMPLETE", "MISSING"]);
        let incomplete = engine(store).acquisition(&scope).await.unwrap();
        assert_eq!(incomplete[0].status, AcquisitionStatus::Incomplete);
    }

    #[tokio::test]
    async fn test_gaps_are_fetched_as_auxiliary_events() {
        let (mut store, _) = acquisition_store(&["COMPLETE"]);
        store.insert_event(event("PLAYBACK_GAP", 100, 120));

        let result = engine(store).acquisition(&ReportScope::default()).await.unwrap();
        assert_eq!(result[0].status, AcquisitionStatus::Received);
        assert!(result[0].has_tag(Tag::Gaps));
    }

    #[tokio::test]
    async fn test_fan_out_preserves_order_across_chunks() {
        let mut store = InMemoryStore::new();
        let mut expected = Vec::new();
        for i in 0..10 {
            let acquisition = event("PLANNED_PLAYBACK_CORRECTION", i * 100, i * 100 + 50);
            expected.push(acquisition.id);
            store.insert_event(acquisition);
        }
        let mut config = EngineConfig::default();
        config.engine.fan_out_chunk = 3;
        let engine = CorrelationEngine::new(Arc::new(store), config);

        let result = engine.acquisition(&ReportScope::default()).await.unwrap();
        let ids: Vec<EventId> = result.iter().map(|c| c.event_id).collect();
        assert_eq!(ids, expected);
        assert!(result.iter().all(|c| c.status == AcquisitionStatus::Missing));
    }

    #[tokio::test]
    async fn test_primary_events_fetched_in_one_bulk_query() {
        let primaries: Vec<Event> = (0..5)
            .map(|i| event("PLANNED_PLAYBACK_CORRECTION", i * 10, i * 10 + 5))
            .collect();
        let returned = primaries.clone();

        let mut store = MockEventStore::new();
        store
            .expect_get_events()
            .withf(|filter: &EventFilter| {
                filter.kinds.as_deref() == Some(&["PLANNED_PLAYBACK_CORRECTION".to_string()][..])
            })
            .times(1)
            .returning(move |_| Ok(returned.clone()));
        store
            .expect_get_events()
            .withf(|filter: &EventFilter| {
                filter.kinds.as_deref() != Some(&["PLANNED_PLAYBACK_CORRECTION".to_string()][..])
            })
            .times(1)
            .returning(|_| Ok(Vec::new()));
        store
            .expect_get_links()
            .times(primaries.len())
            .returning(|_| Ok(Vec::new()));
        store.expect_get_ref_links().never();
        store.expect_get_annotations().never();

        let engine = CorrelationEngine::new(Arc::new(store), EngineConfig::default());
        let result = engine.acquisition(&ReportScope::default()).await.unwrap();
        assert_eq!(result.len(), primaries.len());
    }

    #[tokio::test]
    async fn test_hktm_report_includes_unplanned_orbits() {
        let mut store = InMemoryStore::new();
        let playback = Event::builder("PLANNED_PLAYBACK", Timestamp::from_secs(600), Timestamp::from_secs(1200), "S2A")
            .attr("playback_type", "HKTM")
            .build()
            .unwrap();
        let nominal = Event::builder("PLANNED_PLAYBACK", Timestamp::from_secs(7000), Timestamp::from_secs(7600), "S2A")
            .attr("playback_type", "NOMINAL")
            .build()
            .unwrap();
        store.insert_event(playback);
        store.insert_event(nominal);
        store.insert_event(event("ORBIT_PREDICTION", 0, 6000));
        store.insert_event(event("ORBIT_PREDICTION", 6000, 12000));

        let records = engine(store)
            .report(Domain::Hktm, &ReportScope::default())
            .await
            .unwrap();
        let labels: Vec<&str> = records.iter().map(|r| r.classification.as_str()).collect();
        assert_eq!(labels, vec!["PENDING_ACQUISITION", "PLAYBACK_NOT_PLANNED"]);
        assert_eq!(records[1].kind, "ORBIT_PREDICTION");
    }

    #[tokio::test]
    async fn test_dhus_report_carries_tile_footprints() {
        let datastrip = "S2A_OPER_MSI_L1C_DS_MPS__20180721T104253_S20180721T085229_N02.06";
        let mut store = InMemoryStore::new();
        let completeness = Event::builder(
            "PLANNED_IMAGING_PROCESSING_COMPLETENESS_L1C",
            Timestamp::from_secs(0),
            Timestamp::from_secs(100),
            "S2A",
        )
        .attr("status", "COMPLETE")
        .explicit_ref(datastrip)
        .build()
        .unwrap();
        let imaging = event("PLANNED_CUT_IMAGING", 0, 100);
        store.insert_link(Link::new("PLANNED_IMAGING", completeness.id, imaging.id));
        store.insert_ref_link(crate::core::event::RefLink::new("TILE", datastrip, "TL_1"));
        store.insert_annotation(Annotation::new("TL_1", "CATALOGING_TIME").with("status", "OK"));
        store.insert_annotation(
            Annotation::new("TL_1", "FOOTPRINT").with_geometry("POLYGON ((0 0, 1 0, 1 1, 0 0))"),
        );
        store.insert_event(completeness);
        store.insert_event(imaging);

        let records = engine(store)
            .report(Domain::Dhus, &ReportScope::default())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].classification, "MISSING DISSEMINATION");
        assert_eq!(records[0].geometries.len(), 1);
    }

    #[tokio::test]
    async fn test_volume_and_macro_steps() {
        let mut store = InMemoryStore::new();
        let l1b = "S2A_OPER_MSI_L1B_DS_MPS__20180721T104253_S20180721T085229_N02.06";
        let datastrip = Event::builder("PROCESSING_VALIDITY", Timestamp::from_secs(0), Timestamp::from_secs(100), "S2A")
            .explicit_ref(l1b)
            .build()
            .unwrap();
        store.insert_event(datastrip);
        store.insert_annotation(Annotation::new(l1b, "SIZE").with("aggregated_size", 100.0));
        for (id, start, stop) in [("step_Init_Workflow", 0, 60), ("step_GSE", 30, 120), ("step_Mystery", 0, 1)] {
            store.insert_event(
                Event::builder("STEP_INFO", Timestamp::from_secs(start), Timestamp::from_secs(stop), "S2A")
                    .attr("id", id)
                    .explicit_ref(l1b)
                    .build()
                    .unwrap(),
            );
        }
        let engine = engine(store);

        let volume = engine.volume(&ReportScope::default()).await.unwrap();
        assert_eq!(volume.len(), 1);
        assert_eq!(volume[0].y, 100.0);

        let segments = engine.macro_steps(&ReportScope::default()).await.unwrap();
        assert!(segments.iter().any(|s| s.unknown));
        assert!(segments.iter().any(|s| !s.unknown));
    }

    #[tokio::test]
    async fn test_satellite_scope() {
        let (store, _) = acquisition_store(&["COMPLETE"]);
        let scope = ReportScope::new(None, Some("S2B".to_string()));
        assert!(engine(store).acquisition(&scope).await.unwrap().is_empty());
    }
}
