//! PgStore: events, participants and logistics backed by Postgres.
//!
//! Expected schema:
//!
//! ```sql
//! events             (id SERIAL PK, description TEXT, start_date DATE, end_date DATE, total_cost REAL)
//! participants       (id SERIAL PK, last_name TEXT, first_name TEXT, role TEXT)
//! participant_events (participant_id INT FK, event_id INT FK, PK (participant_id, event_id))
//! logistics          (id SERIAL PK, description TEXT, reserved BOOLEAN, unit_price REAL,
//!                     quantity INT, event_id INT NULL FK)
//! ```

use std::collections::{BTreeSet, HashMap};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use eventsproject_common::types::{
    Event, EventId, Logistics, LogisticsId, Participant, ParticipantId, Role,
};

use crate::traits::{EventStore, LogisticsStore, ParticipantStore};

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct EventRow {
    id: EventId,
    description: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_cost: f32,
}

#[derive(sqlx::FromRow)]
struct ParticipantRow {
    id: ParticipantId,
    last_name: String,
    first_name: String,
    role: String,
}

#[derive(sqlx::FromRow)]
struct LogisticsRow {
    id: LogisticsId,
    description: String,
    reserved: bool,
    unit_price: f32,
    quantity: i32,
    event_id: Option<EventId>,
}

impl From<LogisticsRow> for Logistics {
    fn from(row: LogisticsRow) -> Self {
        Logistics {
            id: Some(row.id),
            description: row.description,
            reserved: row.reserved,
            unit_price: row.unit_price,
            quantity: row.quantity,
            event_id: row.event_id,
        }
    }
}

const EVENT_COLUMNS: &str = "id, description, start_date, end_date, total_cost";
const LOGISTICS_COLUMNS: &str = "id, description, reserved, unit_price, quantity, event_id";

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Attach participant ids and logistics items to a batch of event rows.
    async fn hydrate(&self, rows: Vec<EventRow>) -> Result<Vec<Event>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<EventId> = rows.iter().map(|row| row.id).collect();

        let links = sqlx::query_as::<_, (EventId, ParticipantId)>(
            r#"
            SELECT event_id, participant_id
            FROM participant_events
            WHERE event_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut participants: HashMap<EventId, BTreeSet<ParticipantId>> = HashMap::new();
        for (event_id, participant_id) in links {
            participants.entry(event_id).or_default().insert(participant_id);
        }

        let items = sqlx::query_as::<_, LogisticsRow>(&format!(
            "SELECT {LOGISTICS_COLUMNS} FROM logistics WHERE event_id = ANY($1) ORDER BY id ASC"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut logistics: HashMap<EventId, Vec<Logistics>> = HashMap::new();
        for item in items {
            if let Some(event_id) = item.event_id {
                logistics.entry(event_id).or_default().push(item.into());
            }
        }

        Ok(rows
            .into_iter()
            .map(|row| Event {
                id: Some(row.id),
                description: row.description,
                start_date: row.start_date,
                end_date: row.end_date,
                participants: participants.remove(&row.id),
                logistics: logistics.remove(&row.id),
                total_cost: row.total_cost,
            })
            .collect())
    }
}

/// Move a table's SERIAL sequence to its highest id. Rows saved with an
/// explicit id bypass the sequence, and the next generated id would collide.
async fn sync_id_sequence(tx: &mut Transaction<'_, Postgres>, table: &'static str) -> Result<()> {
    let sql = format!(
        "SELECT setval(pg_get_serial_sequence('{table}', 'id'), (SELECT MAX(id) FROM {table}))"
    );
    sqlx::query(&sql).execute(&mut **tx).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// EventStore
// ---------------------------------------------------------------------------

#[async_trait]
impl EventStore for PgStore {
    async fn find_by_id(&self, id: EventId) -> Result<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(self.hydrate(row.into_iter().collect()).await?.pop())
    }

    async fn find_by_description(&self, description: &str) -> Result<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE description = $1 ORDER BY id ASC LIMIT 1"
        ))
        .bind(description)
        .fetch_optional(&self.pool)
        .await?;

        Ok(self.hydrate(row.into_iter().collect()).await?.pop())
    }

    async fn find_by_start_date_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM events
            WHERE start_date BETWEEN $1 AND $2
            ORDER BY start_date ASC, id ASC
            "#
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        debug!(%start, %end, count = rows.len(), "Loaded events by start date");
        self.hydrate(rows).await
    }

    async fn find_by_participant(
        &self,
        last_name: &str,
        first_name: &str,
        role: Role,
    ) -> Result<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT DISTINCT e.id, e.description, e.start_date, e.end_date, e.total_cost
            FROM events e
            JOIN participant_events pe ON pe.event_id = e.id
            JOIN participants p ON p.id = pe.participant_id
            WHERE p.last_name = $1 AND p.first_name = $2 AND p.role = $3
            ORDER BY e.id ASC
            "#,
        )
        .bind(last_name)
        .bind(first_name)
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;

        debug!(last_name, first_name, %role, count = rows.len(), "Loaded events by participant");
        self.hydrate(rows).await
    }

    async fn save(&self, event: &Event) -> Result<Event> {
        let mut tx = self.pool.begin().await?;

        let id = match event.id {
            Some(id) => {
                sqlx::query(
                    r#"
                    INSERT INTO events (id, description, start_date, end_date, total_cost)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (id) DO UPDATE SET
                        description = EXCLUDED.description,
                        start_date = EXCLUDED.start_date,
                        end_date = EXCLUDED.end_date,
                        total_cost = EXCLUDED.total_cost
                    "#,
                )
                .bind(id)
                .bind(&event.description)
                .bind(event.start_date)
                .bind(event.end_date)
                .bind(event.total_cost)
                .execute(&mut *tx)
                .await?;
                sync_id_sequence(&mut tx, "events").await?;
                id
            }
            None => {
                let row = sqlx::query_as::<_, (EventId,)>(
                    r#"
                    INSERT INTO events (description, start_date, end_date, total_cost)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id
                    "#,
                )
                .bind(&event.description)
                .bind(event.start_date)
                .bind(event.end_date)
                .bind(event.total_cost)
                .fetch_one(&mut *tx)
                .await?;
                row.0
            }
        };

        tx.commit().await?;

        debug!(event_id = id, description = event.description.as_str(), "Saved event");
        Ok(Event {
            id: Some(id),
            ..event.clone()
        })
    }
}

// ---------------------------------------------------------------------------
// ParticipantStore
// ---------------------------------------------------------------------------

#[async_trait]
impl ParticipantStore for PgStore {
    async fn find_by_id(&self, id: ParticipantId) -> Result<Option<Participant>> {
        let Some(row) = sqlx::query_as::<_, ParticipantRow>(
            "SELECT id, last_name, first_name, role FROM participants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let events: BTreeSet<EventId> = sqlx::query_as::<_, (EventId,)>(
            "SELECT event_id FROM participant_events WHERE participant_id = $1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(event_id,)| event_id)
        .collect();

        let role: Role = row
            .role
            .parse()
            .map_err(|e: String| anyhow!("participant {}: {e}", row.id))?;

        Ok(Some(Participant {
            id: Some(row.id),
            last_name: row.last_name,
            first_name: row.first_name,
            role,
            events: (!events.is_empty()).then_some(events),
        }))
    }

    async fn save(&self, participant: &Participant) -> Result<Participant> {
        let mut tx = self.pool.begin().await?;

        let id = match participant.id {
            Some(id) => {
                sqlx::query(
                    r#"
                    INSERT INTO participants (id, last_name, first_name, role)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (id) DO UPDATE SET
                        last_name = EXCLUDED.last_name,
                        first_name = EXCLUDED.first_name,
                        role = EXCLUDED.role
                    "#,
                )
                .bind(id)
                .bind(&participant.last_name)
                .bind(&participant.first_name)
                .bind(participant.role.as_str())
                .execute(&mut *tx)
                .await?;
                sync_id_sequence(&mut tx, "participants").await?;
                id
            }
            None => {
                let row = sqlx::query_as::<_, (ParticipantId,)>(
                    r#"
                    INSERT INTO participants (last_name, first_name, role)
                    VALUES ($1, $2, $3)
                    RETURNING id
                    "#,
                )
                .bind(&participant.last_name)
                .bind(&participant.first_name)
                .bind(participant.role.as_str())
                .fetch_one(&mut *tx)
                .await?;
                row.0
            }
        };

        sqlx::query("DELETE FROM participant_events WHERE participant_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let event_ids: Vec<EventId> = participant.events.iter().flatten().copied().collect();
        if !event_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO participant_events (participant_id, event_id)
                SELECT $1, UNNEST($2::int4[])
                "#,
            )
            .bind(id)
            .bind(&event_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(participant_id = id, events = event_ids.len(), "Saved participant");
        Ok(Participant {
            id: Some(id),
            ..participant.clone()
        })
    }
}

// ---------------------------------------------------------------------------
// LogisticsStore
// ---------------------------------------------------------------------------

#[async_trait]
impl LogisticsStore for PgStore {
    async fn find_by_id(&self, id: LogisticsId) -> Result<Option<Logistics>> {
        let row = sqlx::query_as::<_, LogisticsRow>(&format!(
            "SELECT {LOGISTICS_COLUMNS} FROM logistics WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Logistics::from))
    }

    async fn save(&self, logistics: &Logistics) -> Result<Logistics> {
        let mut tx = self.pool.begin().await?;

        let id = match logistics.id {
            Some(id) => {
                sqlx::query(
                    r#"
                    INSERT INTO logistics (id, description, reserved, unit_price, quantity, event_id)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (id) DO UPDATE SET
                        description = EXCLUDED.description,
                        reserved = EXCLUDED.reserved,
                        unit_price = EXCLUDED.unit_price,
                        quantity = EXCLUDED.quantity,
                        event_id = EXCLUDED.event_id
                    "#,
                )
                .bind(id)
                .bind(&logistics.description)
                .bind(logistics.reserved)
                .bind(logistics.unit_price)
                .bind(logistics.quantity)
                .bind(logistics.event_id)
                .execute(&mut *tx)
                .await?;
                sync_id_sequence(&mut tx, "logistics").await?;
                id
            }
            None => {
                let row = sqlx::query_as::<_, (LogisticsId,)>(
                    r#"
                    INSERT INTO logistics (description, reserved, unit_price, quantity, event_id)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id
                    "#,
                )
                .bind(&logistics.description)
                .bind(logistics.reserved)
                .bind(logistics.unit_price)
                .bind(logistics.quantity)
                .bind(logistics.event_id)
                .fetch_one(&mut *tx)
                .await?;
                row.0
            }
        };

        tx.commit().await?;

        debug!(logistics_id = id, event_id = ?logistics.event_id, "Saved logistics");
        Ok(Logistics {
            id: Some(id),
            ..logistics.clone()
        })
    }
}
