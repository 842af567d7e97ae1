use thiserror::Error;

use crate::types::ParticipantId;

#[derive(Error, Debug)]
pub enum EventsError {
    #[error("Participant not found: {0}")]
    ParticipantNotFound(ParticipantId),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    /// A store handed back an entity without an id.
    #[error("Unsaved {0}: no id assigned")]
    Unsaved(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl EventsError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EventsError::ParticipantNotFound(_) | EventsError::EventNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EventsError>;
