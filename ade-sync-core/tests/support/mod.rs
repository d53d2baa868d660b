//! In-memory doubles for engine tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use ade_sync_core::{
    CanonicalEvent, CoreResult, Destination, DestinationEvent, Source, SyncError, SyncTag,
    TimeWindow,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, day, hour, 0, 0).unwrap()
}

pub fn september() -> TimeWindow {
    TimeWindow::new(at(1, 0), Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap()).unwrap()
}

pub fn event(id: &str, title: &str, day: u32) -> CanonicalEvent {
    CanonicalEvent::new(id, title, at(day, 9), at(day, 10)).unwrap()
}

/// Source returning a fixed snapshot, or a fixed error.
pub struct StaticSource {
    result: CoreResult<Vec<CanonicalEvent>>,
}

impl StaticSource {
    pub fn new(events: Vec<CanonicalEvent>) -> Self {
        StaticSource { result: Ok(events) }
    }

    pub fn failing(err: SyncError) -> Self {
        StaticSource { result: Err(err) }
    }
}

#[async_trait]
impl Source for StaticSource {
    async fn fetch_events(&self, _window: &TimeWindow) -> CoreResult<Vec<CanonicalEvent>> {
        self.result.clone()
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Calendar kept in memory, with scripted failures.
///
/// Failures are keyed `create:<external_id>`, `update:<destination_id>` and
/// `delete:<destination_id>` and consumed one per call.
#[derive(Default)]
pub struct MemoryDestination {
    events: Mutex<Vec<DestinationEvent>>,
    failures: Mutex<HashMap<String, VecDeque<SyncError>>>,
    calls: Mutex<Vec<String>>,
    next_id: AtomicUsize,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an event as if created by a previous run (or by a user, when
    /// `event` carries no tag).
    pub fn seed(&self, destination_id: &str, event: CanonicalEvent) {
        self.events
            .lock()
            .push(DestinationEvent::new(destination_id, event));
    }

    pub fn fail(&self, key: &str, errors: Vec<SyncError>) {
        self.failures.lock().insert(key.to_string(), errors.into());
    }

    pub fn events(&self) -> Vec<DestinationEvent> {
        self.events.lock().clone()
    }

    pub fn find(&self, destination_id: &str) -> Option<DestinationEvent> {
        self.events
            .lock()
            .iter()
            .find(|e| e.destination_id == destination_id)
            .cloned()
    }

    /// Mutating calls received, in order. Listing is not recorded.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, key: String) -> CoreResult<()> {
        self.calls.lock().push(key.clone());
        let scripted = self.failures.lock().get_mut(&key).and_then(VecDeque::pop_front);
        match scripted {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Destination for MemoryDestination {
    async fn list_managed_events(
        &self,
        tag: &SyncTag,
        window: &TimeWindow,
    ) -> CoreResult<Vec<DestinationEvent>> {
        Ok(self
            .events
            .lock()
            .iter()
            .filter(|e| e.event.is_managed_by(tag))
            .filter(|e| window.overlaps(e.event.start_time(), e.event.end_time()))
            .cloned()
            .collect())
    }

    async fn create(&self, event: &CanonicalEvent) -> CoreResult<String> {
        self.record(format!("create:{}", event.external_id()))?;
        let id = format!("m{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.seed(&id, event.clone());
        Ok(id)
    }

    async fn update(&self, destination_id: &str, event: &CanonicalEvent) -> CoreResult<()> {
        self.record(format!("update:{destination_id}"))?;
        let mut events = self.events.lock();
        let stored = events
            .iter_mut()
            .find(|e| e.destination_id == destination_id)
            .ok_or(SyncError::NotFound)?;
        stored.event = event.clone();
        Ok(())
    }

    async fn delete(&self, destination_id: &str) -> CoreResult<()> {
        self.record(format!("delete:{destination_id}"))?;
        let mut events = self.events.lock();
        let before = events.len();
        events.retain(|e| e.destination_id != destination_id);
        if events.len() == before {
            return Err(SyncError::NotFound);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
