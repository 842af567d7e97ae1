use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type EventId = i32;
pub type ParticipantId = i32;
pub type LogisticsId = i32;

// --- Enums ---

/// What a participant does at the events they are linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Organisateur,
    Intervenant,
    Visiteur,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Organisateur => "organisateur",
            Role::Intervenant => "intervenant",
            Role::Visiteur => "visiteur",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "organisateur" => Ok(Role::Organisateur),
            "intervenant" => Ok(Role::Intervenant),
            "visiteur" => Ok(Role::Visiteur),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

// --- Participant ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// `None` until the participant store assigns one.
    pub id: Option<ParticipantId>,
    pub last_name: String,
    pub first_name: String,
    pub role: Role,
    /// Events this participant is linked to. Lazily created on first link.
    pub events: Option<BTreeSet<EventId>>,
}

impl Participant {
    pub fn new(last_name: impl Into<String>, first_name: impl Into<String>, role: Role) -> Self {
        Self {
            id: None,
            last_name: last_name.into(),
            first_name: first_name.into(),
            role,
            events: None,
        }
    }

    pub fn with_id(mut self, id: ParticipantId) -> Self {
        self.id = Some(id);
        self
    }

    /// Add an event to this participant's set, allocating the set on first use.
    /// Returns false if the event was already linked.
    pub fn join_event(&mut self, event_id: EventId) -> bool {
        self.events.get_or_insert_with(BTreeSet::new).insert(event_id)
    }

    pub fn is_linked_to(&self, event_id: EventId) -> bool {
        self.events
            .as_ref()
            .is_some_and(|events| events.contains(&event_id))
    }

    pub fn matches(&self, last_name: &str, first_name: &str, role: Role) -> bool {
        self.last_name == last_name && self.first_name == first_name && self.role == role
    }
}

// --- Logistics ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Logistics {
    pub id: Option<LogisticsId>,
    pub description: String,
    pub reserved: bool,
    pub unit_price: f32,
    pub quantity: i32,
    /// The event this item belongs to. Set when the item is linked.
    pub event_id: Option<EventId>,
}

impl Logistics {
    pub fn new(description: impl Into<String>, reserved: bool, unit_price: f32, quantity: i32) -> Self {
        Self {
            id: None,
            description: description.into(),
            reserved,
            unit_price,
            quantity,
            event_id: None,
        }
    }

    pub fn with_id(mut self, id: LogisticsId) -> Self {
        self.id = Some(id);
        self
    }

    /// Contribution to the event cost. Unreserved items cost nothing.
    pub fn cost(&self) -> f32 {
        if self.reserved {
            self.unit_price * self.quantity as f32
        } else {
            0.0
        }
    }
}

// --- Event ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Option<EventId>,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Participants linked to this event. `None` until the first link.
    pub participants: Option<BTreeSet<ParticipantId>>,
    /// Logistics items, unique by id. `None` until the first item is attached.
    pub logistics: Option<Vec<Logistics>>,
    pub total_cost: f32,
}

impl Event {
    pub fn new(description: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: None,
            description: description.into(),
            start_date,
            end_date,
            participants: None,
            logistics: None,
            total_cost: 0.0,
        }
    }

    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_participants(mut self, ids: impl IntoIterator<Item = ParticipantId>) -> Self {
        self.participants = Some(ids.into_iter().collect());
        self
    }

    pub fn with_logistics(mut self, items: Vec<Logistics>) -> Self {
        self.logistics = Some(items);
        self
    }

    /// Allocate the logistics set if it does not exist yet.
    /// Returns true when the set was created by this call.
    pub fn ensure_logistics(&mut self) -> bool {
        if self.logistics.is_some() {
            return false;
        }
        self.logistics = Some(Vec::new());
        true
    }

    /// Insert an item into the logistics set. An item with the same id replaces
    /// the existing entry; items without an id are always appended.
    pub fn attach_logistics(&mut self, item: Logistics) {
        let items = self.logistics.get_or_insert_with(Vec::new);
        match item.id {
            Some(id) => match items.iter_mut().find(|existing| existing.id == Some(id)) {
                Some(existing) => *existing = item,
                None => items.push(item),
            },
            None => items.push(item),
        }
    }

    /// True when the logistics set is absent or has no items.
    pub fn has_no_logistics(&self) -> bool {
        self.logistics.as_ref().map_or(true, Vec::is_empty)
    }

    pub fn reserved_logistics(&self) -> impl Iterator<Item = &Logistics> {
        self.logistics.iter().flatten().filter(|item| item.reserved)
    }

    /// Sum of `unit_price * quantity` over reserved items only.
    pub fn reserved_cost(&self) -> f32 {
        self.reserved_logistics().map(Logistics::cost).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn unreserved_logistics_cost_nothing() {
        let item = Logistics::new("chairs", false, 10.0, 4);
        assert_eq!(item.cost(), 0.0);
    }

    #[test]
    fn reserved_cost_ignores_unreserved_items() {
        let event = Event::new("Tech Day", day(1), day(2)).with_logistics(vec![
            Logistics::new("projector", true, 15.0, 3),
            Logistics::new("tables", false, 100.0, 2),
            Logistics::new("mics", true, 2.5, 2),
        ]);
        assert_eq!(event.reserved_cost(), 50.0);
    }

    #[test]
    fn reserved_cost_of_event_without_logistics_is_zero() {
        let event = Event::new("Tech Day", day(1), day(2));
        assert_eq!(event.reserved_cost(), 0.0);
        assert!(event.has_no_logistics());
    }

    #[test]
    fn attach_logistics_allocates_set_on_first_insert() {
        let mut event = Event::new("Tech Day", day(1), day(2));
        assert!(event.logistics.is_none());

        event.attach_logistics(Logistics::new("projector", true, 15.0, 1).with_id(1));

        assert_eq!(event.logistics.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn attach_logistics_replaces_item_with_same_id() {
        let mut event = Event::new("Tech Day", day(1), day(2));
        event.attach_logistics(Logistics::new("projector", false, 15.0, 1).with_id(1));
        event.attach_logistics(Logistics::new("projector", true, 15.0, 1).with_id(1));
        event.attach_logistics(Logistics::new("screen", true, 5.0, 1).with_id(2));

        let items = event.logistics.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].reserved);
    }

    #[test]
    fn ensure_logistics_reports_creation_once() {
        let mut event = Event::new("Tech Day", day(1), day(2));
        assert!(event.ensure_logistics());
        assert!(!event.ensure_logistics());
        assert!(event.has_no_logistics());
    }

    #[test]
    fn join_event_is_idempotent() {
        let mut participant = Participant::new("Tounsi", "Ahmed", Role::Organisateur);
        assert!(participant.events.is_none());

        assert!(participant.join_event(3));
        assert!(!participant.join_event(3));

        assert!(participant.is_linked_to(3));
        assert_eq!(participant.events.unwrap().len(), 1);
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("ORGANISATEUR".parse::<Role>().unwrap(), Role::Organisateur);
        assert_eq!("visiteur".parse::<Role>().unwrap(), Role::Visiteur);
        assert!("speaker".parse::<Role>().is_err());
    }
}
