// Store abstractions for the event services.
//
// EventStore, ParticipantStore and LogisticsStore are the only way the services
// touch persistence. PgStore implements them over Postgres, MemoryStore over
// in-memory tables for tests.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use eventsproject_common::types::{
    Event, EventId, Logistics, LogisticsId, Participant, ParticipantId, Role,
};

// ---------------------------------------------------------------------------
// EventStore
// ---------------------------------------------------------------------------

/// Loaded events are hydrated: `participants` holds the linked participant ids
/// and `logistics` the items whose `event_id` points at the event. A relation
/// without rows loads as `None`.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn find_by_id(&self, id: EventId) -> Result<Option<Event>>;

    /// Find an event by its description. The first match wins when several share it.
    async fn find_by_description(&self, description: &str) -> Result<Option<Event>>;

    /// Events whose start date lies in `[start, end]`, ordered by start date then id.
    async fn find_by_start_date_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Event>>;

    /// Events linked to a participant with this exact name and role.
    async fn find_by_participant(
        &self,
        last_name: &str,
        first_name: &str,
        role: Role,
    ) -> Result<Vec<Event>>;

    /// Insert (no id) or update (id set) the event's own columns. Relations are
    /// owned by the participant and logistics sides. Returns the event with its id.
    async fn save(&self, event: &Event) -> Result<Event>;
}

// ---------------------------------------------------------------------------
// ParticipantStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ParticipantStore: Send + Sync {
    async fn find_by_id(&self, id: ParticipantId) -> Result<Option<Participant>>;

    /// Persist the participant and its event links. Returns it with its id.
    async fn save(&self, participant: &Participant) -> Result<Participant>;
}

// ---------------------------------------------------------------------------
// LogisticsStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait LogisticsStore: Send + Sync {
    async fn find_by_id(&self, id: LogisticsId) -> Result<Option<Logistics>>;

    /// Persist the item, including its `event_id` link. Returns it with its id.
    async fn save(&self, logistics: &Logistics) -> Result<Logistics>;
}

// ---------------------------------------------------------------------------
// Arc<S> blankets
// ---------------------------------------------------------------------------

#[async_trait]
impl<S: EventStore + ?Sized> EventStore for Arc<S> {
    async fn find_by_id(&self, id: EventId) -> Result<Option<Event>> {
        (**self).find_by_id(id).await
    }

    async fn find_by_description(&self, description: &str) -> Result<Option<Event>> {
        (**self).find_by_description(description).await
    }

    async fn find_by_start_date_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Event>> {
        (**self).find_by_start_date_between(start, end).await
    }

    async fn find_by_participant(
        &self,
        last_name: &str,
        first_name: &str,
        role: Role,
    ) -> Result<Vec<Event>> {
        (**self)
            .find_by_participant(last_name, first_name, role)
            .await
    }

    async fn save(&self, event: &Event) -> Result<Event> {
        (**self).save(event).await
    }
}

#[async_trait]
impl<S: ParticipantStore + ?Sized> ParticipantStore for Arc<S> {
    async fn find_by_id(&self, id: ParticipantId) -> Result<Option<Participant>> {
        (**self).find_by_id(id).await
    }

    async fn save(&self, participant: &Participant) -> Result<Participant> {
        (**self).save(participant).await
    }
}

#[async_trait]
impl<S: LogisticsStore + ?Sized> LogisticsStore for Arc<S> {
    async fn find_by_id(&self, id: LogisticsId) -> Result<Option<Logistics>> {
        (**self).find_by_id(id).await
    }

    async fn save(&self, logistics: &Logistics) -> Result<Logistics> {
        (**self).save(logistics).await
    }
}
