//! In-memory store for tests and local runs. No database required.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use eventsproject_common::types::{
    Event, EventId, Logistics, LogisticsId, Participant, ParticipantId, Role,
};

use crate::traits::{EventStore, LogisticsStore, ParticipantStore};

#[derive(Default)]
struct Tables {
    events: BTreeMap<EventId, Event>,
    participants: BTreeMap<ParticipantId, Participant>,
    logistics: BTreeMap<LogisticsId, Logistics>,
    saved_events: Vec<Event>,
    saved_participants: Vec<Participant>,
    saved_logistics: Vec<Logistics>,
}

impl Tables {
    /// Rebuild an event's relations from the owning sides, like a join would.
    fn hydrate(&self, row: &Event) -> Event {
        let mut event = row.clone();
        let Some(id) = row.id else {
            return event;
        };

        let participants: BTreeSet<ParticipantId> = self
            .participants
            .values()
            .filter(|p| p.is_linked_to(id))
            .filter_map(|p| p.id)
            .collect();
        event.participants = (!participants.is_empty()).then_some(participants);

        let logistics: Vec<Logistics> = self
            .logistics
            .values()
            .filter(|item| item.event_id == Some(id))
            .cloned()
            .collect();
        event.logistics = (!logistics.is_empty()).then_some(logistics);

        event
    }
}

/// One in-memory database implementing all three stores.
///
/// Relations behave like the Postgres schema: a participant save owns the
/// participant/event links and a logistics save owns the logistics/event link.
/// Every trait-level save is recorded for assertions; `seed_*` inserts are not.
pub struct MemoryStore {
    next_event_id: AtomicI32,
    next_participant_id: AtomicI32,
    next_logistics_id: AtomicI32,
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_event_id: AtomicI32::new(1),
            next_participant_id: AtomicI32::new(1),
            next_logistics_id: AtomicI32::new(1),
            tables: Mutex::new(Tables::default()),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn assign_event_id(&self, id: Option<EventId>) -> EventId {
        assign(&self.next_event_id, id)
    }

    fn assign_participant_id(&self, id: Option<ParticipantId>) -> ParticipantId {
        assign(&self.next_participant_id, id)
    }

    fn assign_logistics_id(&self, id: Option<LogisticsId>) -> LogisticsId {
        assign(&self.next_logistics_id, id)
    }

    // --- Seeding (not recorded as saves) ---

    /// Insert an event without recording a save. Embedded logistics items are
    /// inserted and linked to it; embedded participant ids link the event to
    /// those participants if they were seeded first.
    pub fn seed_event(&self, event: Event) -> Event {
        let id = self.assign_event_id(event.id);
        let mut tables = self.tables();

        for mut item in event.logistics.clone().unwrap_or_default() {
            let item_id = self.assign_logistics_id(item.id);
            item.id = Some(item_id);
            item.event_id = Some(id);
            tables.logistics.insert(item_id, item);
        }
        for participant_id in event.participants.iter().flatten() {
            if let Some(participant) = tables.participants.get_mut(participant_id) {
                participant.join_event(id);
            }
        }

        let row = Event {
            id: Some(id),
            participants: None,
            logistics: None,
            ..event
        };
        tables.events.insert(id, row.clone());
        tables.hydrate(&row)
    }

    pub fn seed_participant(&self, participant: Participant) -> Participant {
        let id = self.assign_participant_id(participant.id);
        let participant = Participant {
            id: Some(id),
            ..participant
        };
        self.tables().participants.insert(id, participant.clone());
        participant
    }

    pub fn seed_logistics(&self, logistics: Logistics) -> Logistics {
        let id = self.assign_logistics_id(logistics.id);
        let logistics = Logistics {
            id: Some(id),
            ..logistics
        };
        self.tables().logistics.insert(id, logistics.clone());
        logistics
    }

    // --- Assertions ---

    /// Every event passed to `EventStore::save`, in call order.
    pub fn saved_events(&self) -> Vec<Event> {
        self.tables().saved_events.clone()
    }

    /// Every participant passed to `ParticipantStore::save`, in call order.
    pub fn saved_participants(&self) -> Vec<Participant> {
        self.tables().saved_participants.clone()
    }

    /// Every item passed to `LogisticsStore::save`, in call order.
    pub fn saved_logistics(&self) -> Vec<Logistics> {
        self.tables().saved_logistics.clone()
    }

    /// Current stored state of a participant, bypassing the trait.
    pub fn participant(&self, id: ParticipantId) -> Option<Participant> {
        self.tables().participants.get(&id).cloned()
    }

    /// Current hydrated state of an event, bypassing the trait.
    pub fn event(&self, id: EventId) -> Option<Event> {
        let tables = self.tables();
        tables.events.get(&id).map(|row| tables.hydrate(row))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn assign(counter: &AtomicI32, id: Option<i32>) -> i32 {
    match id {
        Some(id) => {
            counter.fetch_max(id + 1, Ordering::SeqCst);
            id
        }
        None => counter.fetch_add(1, Ordering::SeqCst),
    }
}

// ---------------------------------------------------------------------------
// EventStore
// ---------------------------------------------------------------------------

#[async_trait]
impl EventStore for MemoryStore {
    async fn find_by_id(&self, id: EventId) -> Result<Option<Event>> {
        Ok(self.event(id))
    }

    async fn find_by_description(&self, description: &str) -> Result<Option<Event>> {
        let tables = self.tables();
        Ok(tables
            .events
            .values()
            .find(|row| row.description == description)
            .map(|row| tables.hydrate(row)))
    }

    async fn find_by_start_date_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Event>> {
        let tables = self.tables();
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|row| row.start_date >= start && row.start_date <= end)
            .map(|row| tables.hydrate(row))
            .collect();
        events.sort_by_key(|event| (event.start_date, event.id));
        Ok(events)
    }

    async fn find_by_participant(
        &self,
        last_name: &str,
        first_name: &str,
        role: Role,
    ) -> Result<Vec<Event>> {
        let tables = self.tables();
        let event_ids: BTreeSet<EventId> = tables
            .participants
            .values()
            .filter(|p| p.matches(last_name, first_name, role))
            .flat_map(|p| p.events.iter().flatten().copied())
            .collect();

        Ok(event_ids
            .iter()
            .filter_map(|id| tables.events.get(id))
            .map(|row| tables.hydrate(row))
            .collect())
    }

    async fn save(&self, event: &Event) -> Result<Event> {
        let id = self.assign_event_id(event.id);
        let saved = Event {
            id: Some(id),
            ..event.clone()
        };

        let mut tables = self.tables();
        tables.events.insert(id, saved.clone());
        tables.saved_events.push(saved.clone());
        Ok(saved)
    }
}

// ---------------------------------------------------------------------------
// ParticipantStore
// ---------------------------------------------------------------------------

#[async_trait]
impl ParticipantStore for MemoryStore {
    async fn find_by_id(&self, id: ParticipantId) -> Result<Option<Participant>> {
        Ok(self.participant(id))
    }

    async fn save(&self, participant: &Participant) -> Result<Participant> {
        let id = self.assign_participant_id(participant.id);
        let saved = Participant {
            id: Some(id),
            ..participant.clone()
        };

        let mut tables = self.tables();
        tables.participants.insert(id, saved.clone());
        tables.saved_participants.push(saved.clone());
        Ok(saved)
    }
}

// ---------------------------------------------------------------------------
// LogisticsStore
// ---------------------------------------------------------------------------

#[async_trait]
impl LogisticsStore for MemoryStore {
    async fn find_by_id(&self, id: LogisticsId) -> Result<Option<Logistics>> {
        Ok(self.tables().logistics.get(&id).cloned())
    }

    async fn save(&self, logistics: &Logistics) -> Result<Logistics> {
        let id = self.assign_logistics_id(logistics.id);
        let saved = Logistics {
            id: Some(id),
            ..logistics.clone()
        };

        let mut tables = self.tables();
        tables.logistics.insert(id, saved.clone());
        tables.saved_logistics.push(saved.clone());
        Ok(saved)
    }
}
