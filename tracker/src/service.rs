//! Confirmation API
//!
//! The [`Tracker`] is the entry point for everything that changes a freight. Each
//! operation is a read-modify-write against the record store:
//!
//! 1. read the record together with its revision
//! 2. rebuild the shipment and apply the operation to that local copy
//! 3. write the result back, conditioned on the revision that was read
//!
//! If another actor wrote in between, the whole cycle is repeated on the fresh record,
//! so the operation is re-validated against what is actually stored. After
//! [`TrackerConfig::max_commit_attempts`] lost races the operation fails with a
//! (transient) `Conflict`.

use chrono::{DateTime, Utc};
use freight_types::{Actor, FreightId, FreightRecord, Itinerary, Revision, Stop};

use crate::{
    config::TrackerConfig,
    journal::Journal,
    shipment::{Progress, Shipment},
    stops::canonicalize,
    store::{FreightStore, WriteOutcome},
    ErrorKind, Result,
};

/// A shipment together with the revision of the record it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub revision: Revision,
    pub shipment: Shipment,
}

impl Snapshot {
    fn from_record(freight_id: &FreightId, record: FreightRecord) -> Self {
        Snapshot {
            revision: record.revision,
            shipment: Shipment::from_record(freight_id.clone(), &record),
        }
    }
}

pub struct Tracker<S: FreightStore> {
    store: S,
    config: TrackerConfig,
}

impl<S: FreightStore> Tracker<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, TrackerConfig::default())
    }

    pub fn with_config(store: S, config: TrackerConfig) -> Self {
        Tracker { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Registers a newly contracted freight.
    ///
    /// The itinerary is canonicalized once, here; the resulting stop list is stored with
    /// the record and never recomputed.
    pub fn register(
        &self,
        freight_id: &FreightId,
        itinerary: Option<&Itinerary>,
    ) -> Result<Snapshot> {
        let stops = canonicalize(itinerary);
        let record = FreightRecord::new(stops);
        self.store.create(freight_id, &record)?;
        log::info!(
            "registered freight {freight_id} with {} stop(s)",
            record.stops.len()
        );
        Ok(Snapshot::from_record(freight_id, record))
    }

    /// Reads the current state of a freight
    pub fn load(&self, freight_id: &FreightId) -> Result<Snapshot> {
        let record = self
            .store
            .get(freight_id)?
            .ok_or_else(|| ErrorKind::FreightNotFound {
                freight_id: freight_id.clone(),
            })?;
        Ok(Snapshot::from_record(freight_id, record))
    }

    pub fn start_loading(&self, freight_id: &FreightId, actor: &Actor) -> Result<Snapshot> {
        self.commit(freight_id, |shipment, at| shipment.start_loading(actor, at))
    }

    pub fn start_transit(&self, freight_id: &FreightId, actor: &Actor) -> Result<Snapshot> {
        self.commit(freight_id, |shipment, at| shipment.start_transit(actor, at))
    }

    /// The stop the driver should confirm next, if any
    pub fn prompt_next_stop(&self, freight_id: &FreightId) -> Result<Option<Stop>> {
        let snapshot = self.load(freight_id)?;
        if snapshot.shipment.status().is_final() {
            return Ok(None);
        }
        Ok(snapshot.shipment.next_actionable_stop().cloned())
    }

    pub fn confirm_delivered(
        &self,
        freight_id: &FreightId,
        stop: &str,
        actor: &Actor,
    ) -> Result<Snapshot> {
        self.commit(freight_id, |shipment, at| {
            shipment.confirm_delivered(stop, actor, at)
        })
    }

    pub fn confirm_failed(
        &self,
        freight_id: &FreightId,
        stop: &str,
        reason: &str,
        actor: &Actor,
    ) -> Result<Snapshot> {
        self.commit(freight_id, |shipment, at| {
            shipment.confirm_failed(stop, reason, actor, at)
        })
    }

    pub fn history(&self, freight_id: &FreightId) -> Result<Journal> {
        Ok(self.load(freight_id)?.shipment.history().clone())
    }

    pub fn progress(&self, freight_id: &FreightId) -> Result<Progress> {
        Ok(self.load(freight_id)?.shipment.progress())
    }

    /// Optimistic read-modify-write loop
    fn commit<F>(&self, freight_id: &FreightId, op: F) -> Result<Snapshot>
    where
        F: Fn(&mut Shipment, DateTime<Utc>) -> Result<()>,
    {
        let attempts = self.config.commit_attempts();
        for attempt in 1..=attempts {
            let Snapshot {
                revision,
                mut shipment,
            } = self.load(freight_id)?;
            op(&mut shipment, Utc::now())?;

            match self.store.update(freight_id, revision, shipment.to_patch())? {
                WriteOutcome::Committed(new_revision) => {
                    log::debug!(
                        "committed freight {freight_id} at {new_revision} (status={})",
                        shipment.status()
                    );
                    // the write is durable, a failed reload must not report it as lost
                    return match self.load(freight_id) {
                        Ok(snapshot) => Ok(snapshot),
                        Err(e) => {
                            log::warn!(
                                "failed to reload freight {freight_id} after commit: {e}"
                            );
                            Ok(Snapshot {
                                revision: new_revision,
                                shipment,
                            })
                        }
                    };
                }
                WriteOutcome::Conflict { current } => {
                    log::warn!(
                        "freight {freight_id} moved from {revision} to {current} while writing \
                         (attempt {attempt}/{attempts})"
                    );
                }
            }
        }
        Err(ErrorKind::Conflict {
            freight_id: freight_id.clone(),
            attempts,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KvFreightStore, MemoryStore};
    use freight_types::{RouteStop, ShipmentStatus, TechnicalStatus, TrackingPatch, Waypoint};
    use parking_lot::Mutex;
    use rand::Rng;
    use std::sync::Arc;

    const TEST_REPEATS: usize = 16;

    fn driver() -> Actor {
        Actor::new("drv-42", "Marcos")
    }

    fn route(places: &[(&str, &str)]) -> Itinerary {
        Itinerary::Preferred {
            stops: places
                .iter()
                .map(|(city, state)| RouteStop {
                    city: city.to_string(),
                    state: state.to_string(),
                    detail: None,
                })
                .collect(),
        }
    }

    fn cities(n: usize, state: &str) -> Vec<(String, String)> {
        (0..n)
            .map(|i| (format!("Cidade{i}"), state.to_string()))
            .collect()
    }

    fn loaded<S: FreightStore>(tracker: &Tracker<S>, id: &FreightId, places: &[(&str, &str)]) {
        tracker.register(id, Some(&route(places))).unwrap();
        tracker.start_loading(id, &driver()).unwrap();
    }

    #[test]
    fn delivery_scenario() -> anyhow::Result<()> {
        let tracker = Tracker::new(MemoryStore::new());
        let id = FreightId::new("MAPA-1001");
        loaded(&tracker, &id, &[("A", "SP"), ("B", "MG"), ("C", "RJ")]);
        let base = tracker.history(&id)?.len();

        let snap = tracker.start_transit(&id, &driver())?;
        assert_eq!(snap.shipment.history().len(), base + 1);
        assert!(snap.shipment.history().latest().unwrap().message.contains("A/SP"));
        assert_eq!(tracker.prompt_next_stop(&id)?.unwrap().city, "A");

        let snap = tracker.confirm_delivered(&id, "A", &driver())?;
        assert_eq!(snap.shipment.history().len(), base + 3);

        let snap = tracker.confirm_failed(&id, "B/MG", "endereço não localizado", &driver())?;
        assert_eq!(snap.shipment.history().len(), base + 4);
        assert_eq!(tracker.prompt_next_stop(&id)?.unwrap().city, "C");

        let snap = tracker.confirm_delivered(&id, "C", &driver())?;
        assert_eq!(snap.shipment.history().len(), base + 6);
        assert_eq!(snap.shipment.status(), ShipmentStatus::Delivered);
        assert!(tracker.prompt_next_stop(&id)?.is_none());

        // the record carries the legacy encoding
        let record = tracker.store().get(&id)?.expect("record exists");
        assert_eq!(record.delivered, ["A/SP", "C/RJ"]);
        assert_eq!(record.failed, ["endereço não localizado: B/MG"]);
        assert_eq!(record.status, ShipmentStatus::Delivered);
        assert_eq!(record.revision, snap.revision);

        let progress = tracker.progress(&id)?;
        assert_eq!((progress.delivered, progress.failed, progress.pending), (2, 1, 0));
        Ok(())
    }

    #[test]
    fn second_confirmation_changes_nothing() -> anyhow::Result<()> {
        let tracker = Tracker::new(MemoryStore::new());
        let id = FreightId::new("MAPA-1002");
        loaded(&tracker, &id, &[("A", "SP"), ("B", "MG")]);
        tracker.start_transit(&id, &driver())?;
        let first = tracker.confirm_delivered(&id, "A", &driver())?;

        let err = tracker.confirm_delivered(&id, "A", &driver()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::AlreadyDelivered { .. }));
        assert_eq!(tracker.load(&id)?, first);
        Ok(())
    }

    #[test]
    fn finalized_freight_rejects_actions() -> anyhow::Result<()> {
        let tracker = Tracker::new(MemoryStore::new());
        let id = FreightId::new("MAPA-1003");
        loaded(&tracker, &id, &[("A", "SP")]);
        tracker.start_transit(&id, &driver())?;
        tracker.confirm_delivered(&id, "A", &driver())?;
        let finished = tracker.load(&id)?;

        for err in [
            tracker.start_loading(&id, &driver()).unwrap_err(),
            tracker.start_transit(&id, &driver()).unwrap_err(),
            tracker.confirm_delivered(&id, "A", &driver()).unwrap_err(),
            tracker.confirm_failed(&id, "A", "avaria", &driver()).unwrap_err(),
        ] {
            assert!(matches!(err.kind(), ErrorKind::ShipmentAlreadyFinalized { .. }));
            assert!(!err.is_transient());
        }
        assert_eq!(tracker.load(&id)?, finished);
        Ok(())
    }

    #[test]
    fn duplicate_and_unknown_freights() {
        let tracker = Tracker::new(MemoryStore::new());
        let id = FreightId::new("MAPA-1004");
        tracker.register(&id, None).unwrap();
        let err = tracker.register(&id, None).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::FreightExists { .. }));

        let missing = FreightId::new("MAPA-0000");
        let err = tracker.start_loading(&missing, &driver()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::FreightNotFound { .. }));
        assert!(tracker.prompt_next_stop(&missing).is_err());
    }

    #[test]
    fn freight_without_itinerary_stays_in_transit() -> anyhow::Result<()> {
        let tracker = Tracker::new(MemoryStore::new());
        let id = FreightId::new("MAPA-1005");
        let legacy = Itinerary::Legacy {
            waypoints: vec![Waypoint {
                name: "Parada 1:  ".to_string(),
            }],
            destination: None,
        };
        let snap = tracker.register(&id, Some(&legacy))?;
        assert!(snap.shipment.itinerary().is_empty());

        tracker.start_loading(&id, &driver())?;
        let snap = tracker.start_transit(&id, &driver())?;
        assert_eq!(snap.shipment.status(), ShipmentStatus::InTransit);
        assert!(tracker.prompt_next_stop(&id)?.is_none());
        Ok(())
    }

    /// Store wrapper that lets another writer sneak in right before our next write(s)
    struct Interleaving<S> {
        inner: S,
        intrusions: Mutex<Vec<Box<dyn FnOnce(&S) + Send>>>,
    }

    impl<S: FreightStore> Interleaving<S> {
        fn new(inner: S) -> Self {
            Interleaving {
                inner,
                intrusions: Mutex::new(Vec::new()),
            }
        }

        fn before_next_write(&self, f: impl FnOnce(&S) + Send + 'static) {
            self.intrusions.lock().push(Box::new(f));
        }
    }

    impl<S: FreightStore> FreightStore for Interleaving<S> {
        fn get(&self, freight_id: &FreightId) -> Result<Option<FreightRecord>> {
            self.inner.get(freight_id)
        }

        fn create(&self, freight_id: &FreightId, record: &FreightRecord) -> Result<Revision> {
            self.inner.create(freight_id, record)
        }

        fn update(
            &self,
            freight_id: &FreightId,
            expected: Revision,
            patch: TrackingPatch,
        ) -> Result<WriteOutcome> {
            let intrusion = self.intrusions.lock().pop();
            if let Some(intrusion) = intrusion {
                intrusion(&self.inner);
            }
            self.inner.update(freight_id, expected, patch)
        }
    }

    #[test]
    fn loser_of_a_race_reapplies_on_fresh_state() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let tracker = Tracker::new(Interleaving::new(store.clone()));
        let id = FreightId::new("MAPA-1006");
        loaded(&tracker, &id, &[("A", "SP"), ("B", "MG"), ("C", "RJ")]);
        tracker.start_transit(&id, &driver())?;

        // another actor confirms A while we try to fail it
        let other = Tracker::new(store.clone());
        let other_id = id.clone();
        tracker.store().before_next_write(move |_| {
            other
                .confirm_delivered(&other_id, "A", &Actor::new("ops-1", "Central"))
                .unwrap();
        });
        // on the retry A is already delivered
        let err = tracker
            .confirm_failed(&id, "A", "avaria", &driver())
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::AlreadyDelivered { .. }));

        // a concurrent confirmation of A does not prevent confirming B
        let other = Tracker::new(store.clone());
        let other_id = id.clone();
        tracker.store().before_next_write(move |_| {
            other
                .confirm_failed(&other_id, "B", "portão fechado", &Actor::new("ops-1", "Central"))
                .unwrap();
        });
        let snap = tracker.confirm_delivered(&id, "B", &driver())?;
        assert!(snap.shipment.ledger().is_delivered("B"));
        assert!(!snap.shipment.ledger().is_failed("B"));

        // both writers' events are in the history
        let statuses: Vec<_> = snap
            .shipment
            .history()
            .events()
            .iter()
            .map(|e| (e.actor_id.as_str(), e.technical_status))
            .collect();
        assert!(statuses.contains(&("ops-1", TechnicalStatus::DeliveryNotCompleted)));
        assert!(statuses.contains(&("drv-42", TechnicalStatus::InTransit)));
        let messages: Vec<_> = snap
            .shipment
            .history()
            .events()
            .iter()
            .map(|e| e.message.clone())
            .collect();
        assert!(messages.iter().any(|m| m == "Entrega em A/SP foi concluída."));
        assert!(messages.iter().any(|m| m == "Entrega em B/MG foi concluída."));
        Ok(())
    }

    #[test]
    fn exhausted_retries_surface_a_conflict() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let tracker = Tracker::new(Interleaving::new(store.clone()));
        let id = FreightId::new("MAPA-1007");
        loaded(&tracker, &id, &[("A", "SP"), ("B", "MG"), ("C", "RJ")]);
        tracker.start_transit(&id, &driver())?;

        // every attempt loses against an unrelated write
        for _ in 0..tracker.config().commit_attempts() {
            let other = Tracker::new(store.clone());
            let other_id = id.clone();
            tracker.store().before_next_write(move |_| {
                other
                    .confirm_failed(&other_id, "A", "avaria", &Actor::new("ops-1", "Central"))
                    .unwrap();
            });
        }
        let before = store.get(&id)?.expect("record exists").history.len();
        let err = tracker.confirm_failed(&id, "A", "avaria", &driver()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Conflict { attempts: 2, .. }));
        assert!(err.is_transient());

        // only the competing writes landed
        let after = store.get(&id)?.expect("record exists");
        assert_eq!(after.history.len(), before + 2);
        assert!(after
            .history
            .iter()
            .filter(|e| e.technical_status == TechnicalStatus::DeliveryNotCompleted)
            .all(|e| e.actor_id == "ops-1"));
        Ok(())
    }

    #[test]
    fn concurrent_writers_lose_no_events() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let config = TrackerConfig {
            max_commit_attempts: 64,
            ..Default::default()
        };
        let tracker = Arc::new(Tracker::with_config(store, config));
        let id = FreightId::new("MAPA-1008");
        let places = cities(16, "SP");
        let places_ref: Vec<(&str, &str)> = places
            .iter()
            .map(|(c, s)| (c.as_str(), s.as_str()))
            .collect();
        loaded(&tracker, &id, &places_ref);
        tracker.start_transit(&id, &driver())?;

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let tracker = tracker.clone();
                let id = id.clone();
                std::thread::spawn(move || {
                    let actor = Actor::new(format!("drv-{worker}"), "Motorista");
                    let mut confirmed = 0;
                    while let Some(stop) = tracker.prompt_next_stop(&id).unwrap() {
                        match tracker.confirm_delivered(&id, &stop.city, &actor) {
                            Ok(_) => confirmed += 1,
                            // somebody else was faster
                            Err(e)
                                if e.is_transient()
                                    || matches!(
                                        e.kind(),
                                        ErrorKind::AlreadyDelivered { .. }
                                            | ErrorKind::ShipmentAlreadyFinalized { .. }
                                    ) => {}
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                    confirmed
                })
            })
            .collect();
        let confirmed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        let snap = tracker.load(&id)?;
        assert_eq!(confirmed, 16);
        assert_eq!(snap.shipment.status(), ShipmentStatus::Delivered);
        let completions = snap
            .shipment
            .history()
            .events()
            .iter()
            .filter(|e| e.message.ends_with("foi concluída."))
            .count();
        assert_eq!(completions, 16);
        Ok(())
    }

    #[test]
    fn random_resolution_on_lmdb() -> anyhow::Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let config = TrackerConfig {
            lmdb_map_size: 16 << 20,
            ..Default::default()
        };
        let lmdb = config.open_lmdb(tmp_dir.path())?;
        let tracker = Tracker::with_config(KvFreightStore::new(lmdb, &config)?, config);
        let mut rng = rand::rng();

        for i in 0..TEST_REPEATS {
            let id = FreightId::new(format!("MAPA-{i}"));
            let n = rng.random_range(1..6);
            let places = cities(n, "MG");
            let places_ref: Vec<(&str, &str)> = places
                .iter()
                .map(|(c, s)| (c.as_str(), s.as_str()))
                .collect();
            loaded(&tracker, &id, &places_ref);
            tracker.start_transit(&id, &driver())?;

            let mut len = tracker.history(&id)?.len();
            while let Some(stop) = tracker.prompt_next_stop(&id)? {
                let snap = if rng.random_bool(0.3) {
                    tracker.confirm_failed(&id, &stop.label(), "recusado", &driver())?
                } else {
                    tracker.confirm_delivered(&id, &stop.label(), &driver())?
                };
                assert!(snap.shipment.history().len() > len);
                len = snap.shipment.history().len();
            }
            let progress = tracker.progress(&id)?;
            assert_eq!(progress.pending, 0);
            assert_eq!(progress.delivered + progress.failed, n);
            assert_eq!(tracker.load(&id)?.shipment.status(), ShipmentStatus::Delivered);
        }
        Ok(())
    }

    #[test]
    fn city_with_separator_can_be_delivered() -> anyhow::Result<()> {
        let tracker = Tracker::new(MemoryStore::new());
        let id = FreightId::new("MAPA-1009");
        loaded(&tracker, &id, &[("Foo/Bar", "SP")]);
        tracker.start_transit(&id, &driver())?;

        let snap = tracker.confirm_delivered(&id, "Foo/Bar/SP", &driver())?;
        assert_eq!(snap.shipment.status(), ShipmentStatus::Delivered);
        assert!(tracker.prompt_next_stop(&id)?.is_none());
        Ok(())
    }

    /// Store whose first read after a successful write fails
    struct FailingReload<S> {
        inner: S,
        fail_next_get: Mutex<bool>,
    }

    impl<S: FreightStore> FreightStore for FailingReload<S> {
        fn get(&self, freight_id: &FreightId) -> Result<Option<FreightRecord>> {
            if std::mem::take(&mut *self.fail_next_get.lock()) {
                return Err(freight_kv_store::Error::Busy("readers full".to_string()).into());
            }
            self.inner.get(freight_id)
        }

        fn create(&self, freight_id: &FreightId, record: &FreightRecord) -> Result<Revision> {
            self.inner.create(freight_id, record)
        }

        fn update(
            &self,
            freight_id: &FreightId,
            expected: Revision,
            patch: TrackingPatch,
        ) -> Result<WriteOutcome> {
            let outcome = self.inner.update(freight_id, expected, patch)?;
            if let WriteOutcome::Committed(_) = outcome {
                *self.fail_next_get.lock() = true;
            }
            Ok(outcome)
        }
    }

    #[test]
    fn failed_reload_after_commit_reports_success() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let id = FreightId::new("MAPA-1010");
        let setup = Tracker::new(store.clone());
        loaded(&setup, &id, &[("A", "SP"), ("B", "MG")]);
        setup.start_transit(&id, &driver())?;

        let tracker = Tracker::new(FailingReload {
            inner: store.clone(),
            fail_next_get: Mutex::new(false),
        });
        let snap = tracker.confirm_delivered(&id, "A", &driver())?;

        // the returned state is the committed one
        let stored = store.get(&id)?.expect("record exists");
        assert_eq!(stored.delivered, ["A/SP"]);
        assert_eq!(snap.revision, stored.revision);
        assert_eq!(snap.shipment, Shipment::from_record(id.clone(), &stored));

        // nothing left to retry
        let err = tracker.confirm_delivered(&id, "A", &driver()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::AlreadyDelivered { .. }));
        Ok(())
    }
}
