//! Test utilities for the lending crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`).
//! Compiled for `cfg(test)` and behind the `test-support` feature.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;

use crate::domain::ports::{LendingEventSink, LendingEventSinkError};
use crate::domain::{
    CategoryId, Error, GroupDraft, GroupId, GroupService, Item, ItemActionService, ItemDraft,
    ItemService, LendingEvent, TrustLevel, UnitOfWork, UserId, UserProfile, VisibilityService,
};
use crate::outbound::memory::{InMemoryLendingStore, InMemoryUserDirectory};

/// Clock frozen at a settable instant.
pub struct FixtureClock(Mutex<DateTime<Utc>>);

impl FixtureClock {
    /// Clock pinned to `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move the clock forward.
    pub fn advance_minutes(&self, minutes: i64) {
        *self.lock() += TimeDelta::minutes(minutes);
    }

    fn lock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for FixtureClock {
    fn default() -> Self {
        Self::new(fixture_timestamp())
    }
}

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock()
    }
}

/// Fixed instant used by fixture clocks.
pub fn fixture_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Sink that records every published event.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<LendingEvent>>,
}

impl RecordingEventSink {
    /// Events published so far.
    pub fn events(&self) -> Vec<LendingEvent> {
        self.lock().clone()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<LendingEvent> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LendingEvent>> {
        match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl LendingEventSink for RecordingEventSink {
    async fn publish(&self, event: &LendingEvent) -> Result<(), LendingEventSinkError> {
        self.lock().push(event.clone());
        Ok(())
    }
}

/// Unit of work over the in-memory adapters.
pub type MemoryUnitOfWork = UnitOfWork<InMemoryLendingStore, RecordingEventSink>;

/// Every lending service wired to shared in-memory adapters.
pub struct LendingHarness {
    /// Shared store.
    pub store: Arc<InMemoryLendingStore>,
    /// Shared directory.
    pub directory: Arc<InMemoryUserDirectory>,
    /// Recorded notifications.
    pub events: Arc<RecordingEventSink>,
    /// Shared clock.
    pub clock: Arc<FixtureClock>,
    /// Borrowing workflow.
    pub actions: ItemActionService<InMemoryLendingStore, RecordingEventSink, InMemoryUserDirectory>,
    /// Item lifecycle.
    pub items: ItemService<InMemoryLendingStore, RecordingEventSink>,
    /// Groups and moderation.
    pub groups: GroupService<InMemoryLendingStore, RecordingEventSink>,
    /// Grant queries.
    pub visibility: VisibilityService<InMemoryLendingStore>,
}

impl Default for LendingHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl LendingHarness {
    /// Fresh harness with empty state.
    pub fn new() -> Self {
        let store = Arc::new(InMemoryLendingStore::new());
        let directory = Arc::new(InMemoryUserDirectory::default());
        let events = Arc::new(RecordingEventSink::default());
        let clock = Arc::new(FixtureClock::default());
        let uow: MemoryUnitOfWork = UnitOfWork::new(Arc::clone(&store), Arc::clone(&events));
        let shared_clock: Arc<dyn Clock> = clock.clone();
        Self {
            actions: ItemActionService::new(
                uow.clone(),
                Arc::clone(&directory),
                Arc::clone(&shared_clock),
            ),
            items: ItemService::new(uow.clone(), Arc::clone(&shared_clock)),
            groups: GroupService::new(uow, shared_clock),
            visibility: VisibilityService::new(Arc::clone(&store)),
            store,
            directory,
            events,
            clock,
        }
    }

    /// Register a user with a display name.
    pub async fn user(&self, name: &str) -> UserId {
        let id = UserId::random();
        match UserProfile::try_new(id, name, None) {
            Ok(profile) => self.directory.upsert(profile).await,
            Err(error) => panic!("invalid fixture profile {name}: {error}"),
        }
        id
    }

    /// Create a catalogue category.
    pub async fn category(&self, name: &str) -> Result<CategoryId, Error> {
        Ok(self.items.create_category(name, None).await?.id)
    }

    /// List an item requiring `trust` to be seen by groups.
    pub async fn item(&self, owner: UserId, name: &str, trust: TrustLevel) -> Result<Item, Error> {
        let category = self.category(&format!("{name} category")).await?;
        let draft = ItemDraft::try_new(name, format!("{name} for lending"), [category])
            .map_err(|e| Error::invalid_request(e.to_string()))?
            .with_trust_level_required(trust);
        self.items.create_item(owner, draft).await
    }

    /// Create an open group moderated by `creator`.
    pub async fn open_group(&self, creator: UserId, name: &str) -> Result<GroupId, Error> {
        let draft = GroupDraft::new(name)
            .map_err(|e| Error::invalid_request(e.to_string()))?
            .with_membership_requires_approval(false);
        Ok(self
            .groups
            .create_group(creator, draft, TrustLevel::High)
            .await?
            .id)
    }
}
