//! EventServices: participant and logistics linking plus cost aggregation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use eventsproject_common::types::{Event, EventId, Logistics, Participant, ParticipantId};
use eventsproject_common::{EventsError, OrganizerIdentity, Result};
use eventsproject_store::{EventStore, LogisticsStore, ParticipantStore};

/// Outcome of [`EventServices::reserved_logistics_in_range`].
#[derive(Debug, Clone, PartialEq)]
pub enum LogisticsInRange {
    /// Reserved items of every event in range, in event order.
    Reserved(Vec<Logistics>),
    /// An event in range has no logistics at all; the whole query yields nothing.
    EventWithoutLogistics { description: String },
}

impl LogisticsInRange {
    /// Collapse to the legacy contract: `None` whenever an event lacked logistics.
    pub fn into_option(self) -> Option<Vec<Logistics>> {
        match self {
            LogisticsInRange::Reserved(items) => Some(items),
            LogisticsInRange::EventWithoutLogistics { .. } => None,
        }
    }
}

/// Counts kept by [`EventServices::run_recompute_loop`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeRuns {
    pub succeeded: usize,
    pub failed: usize,
}

/// Stateless service over the three stores. Cheap to clone.
#[derive(Clone)]
pub struct EventServices {
    events: Arc<dyn EventStore>,
    participants: Arc<dyn ParticipantStore>,
    logistics: Arc<dyn LogisticsStore>,
}

impl EventServices {
    pub fn new(
        events: impl EventStore + 'static,
        participants: impl ParticipantStore + 'static,
        logistics: impl LogisticsStore + 'static,
    ) -> Self {
        Self {
            events: Arc::new(events),
            participants: Arc::new(participants),
            logistics: Arc::new(logistics),
        }
    }

    /// Persist a new or updated participant.
    pub async fn add_participant(&self, participant: &Participant) -> Result<Participant> {
        let saved = self.participants.save(participant).await?;
        info!(participant_id = ?saved.id, "Participant saved");
        Ok(saved)
    }

    /// Link one participant to `event`. The event is saved exactly once.
    pub async fn link_participant(
        &self,
        event: &Event,
        participant_id: ParticipantId,
    ) -> Result<Event> {
        let mut participant = self.resolve_participant(participant_id).await?;

        let saved = self.events.save(event).await?;
        let event_id = saved_event_id(&saved)?;

        participant.join_event(event_id);
        self.participants.save(&participant).await?;

        info!(event_id, participant_id, "Participant linked to event");
        Ok(saved)
    }

    /// Link every participant the event already references, re-resolving each
    /// one from the store. Nothing is written if any participant is missing.
    pub async fn link_participants_of_event(&self, event: &Event) -> Result<Event> {
        let mut resolved = Vec::new();
        for participant_id in event.participants.iter().flatten() {
            resolved.push(self.resolve_participant(*participant_id).await?);
        }

        let saved = self.events.save(event).await?;
        let event_id = saved_event_id(&saved)?;

        for mut participant in resolved {
            participant.join_event(event_id);
            self.participants.save(&participant).await?;
        }

        info!(
            event_id,
            participants = event.participants.as_ref().map_or(0, |p| p.len()),
            "Event participants linked"
        );
        Ok(saved)
    }

    /// Link a logistics item to the event with this description.
    ///
    /// The event is saved only when its logistics set had to be created.
    pub async fn link_logistics(
        &self,
        logistics: &Logistics,
        event_description: &str,
    ) -> Result<Logistics> {
        let mut event = self
            .events
            .find_by_description(event_description)
            .await?
            .ok_or_else(|| EventsError::EventNotFound(event_description.to_string()))?;

        if event.ensure_logistics() {
            debug!(event = event_description, "Initialising logistics set");
            event = self.events.save(&event).await?;
        }
        let event_id = saved_event_id(&event)?;

        let linked = Logistics {
            event_id: Some(event_id),
            ..logistics.clone()
        };
        let saved = self.logistics.save(&linked).await?;
        event.attach_logistics(saved.clone());

        info!(
            event_id,
            logistics_id = ?saved.id,
            items = event.logistics.as_ref().map_or(0, Vec::len),
            "Logistics linked to event"
        );
        Ok(saved)
    }

    /// Reserved logistics of every event starting within `[start, end]`.
    ///
    /// An event in range with no logistics short-circuits the whole query into
    /// [`LogisticsInRange::EventWithoutLogistics`].
    pub async fn reserved_logistics_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<LogisticsInRange> {
        let events = self.events.find_by_start_date_between(start, end).await?;

        let mut reserved = Vec::new();
        for event in &events {
            if event.has_no_logistics() {
                warn!(
                    event = event.description.as_str(),
                    %start,
                    %end,
                    "Event in range has no logistics, dropping result"
                );
                return Ok(LogisticsInRange::EventWithoutLogistics {
                    description: event.description.clone(),
                });
            }
            reserved.extend(event.reserved_logistics().cloned());
        }

        debug!(%start, %end, events = events.len(), reserved = reserved.len(), "Reserved logistics collected");
        Ok(LogisticsInRange::Reserved(reserved))
    }

    /// Recompute `total_cost` for every event linked to `organizer` and save each.
    pub async fn recompute_costs(&self, organizer: &OrganizerIdentity) -> Result<Vec<Event>> {
        let events = self
            .events
            .find_by_participant(&organizer.last_name, &organizer.first_name, organizer.role)
            .await?;

        let mut updated = Vec::with_capacity(events.len());
        for mut event in events {
            event.total_cost = event.reserved_cost();
            let saved = self.events.save(&event).await?;
            info!(
                event = saved.description.as_str(),
                cost = saved.total_cost,
                "Event cost recomputed"
            );
            updated.push(saved);
        }

        Ok(updated)
    }

    /// Run `recompute_costs` every `period` until `shutdown` resolves.
    ///
    /// The first run starts immediately. A failed run is logged and the next
    /// tick runs as usual. Runs that overrun the period delay the schedule
    /// instead of firing back to back. `shutdown` is polled between runs, so
    /// a run in progress always completes.
    pub async fn run_recompute_loop(
        &self,
        organizer: &OrganizerIdentity,
        period: Duration,
        shutdown: impl Future<Output = ()>,
    ) -> RecomputeRuns {
        // interval() panics on a zero period.
        let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut runs = RecomputeRuns::default();
        info!(interval_secs = period.as_secs_f64(), "Cost recomputation scheduler started");

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(succeeded = runs.succeeded, failed = runs.failed, "Cost recomputation scheduler stopped");
                    return runs;
                }
                _ = ticker.tick() => {
                    match self.recompute_costs(organizer).await {
                        Ok(updated) => {
                            runs.succeeded += 1;
                            info!(events = updated.len(), "Cost recomputation finished");
                        }
                        Err(e) => {
                            runs.failed += 1;
                            error!(error = %e, "Cost recomputation failed");
                        }
                    }
                }
            }
        }
    }

    async fn resolve_participant(&self, participant_id: ParticipantId) -> Result<Participant> {
        self.participants
            .find_by_id(participant_id)
            .await?
            .ok_or(EventsError::ParticipantNotFound(participant_id))
    }
}

fn saved_event_id(event: &Event) -> Result<EventId> {
    event.id.ok_or(EventsError::Unsaved("event"))
}
