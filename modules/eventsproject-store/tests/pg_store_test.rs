//! Integration tests for PgStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use chrono::NaiveDate;
use eventsproject_common::types::{Event, Logistics, Participant, Role};
use eventsproject_store::{EventStore, LogisticsStore, ParticipantStore, PgStore};
use sqlx::PgPool;

/// Get a test database pool, or skip if no test DB is available.
async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;

    for statement in [
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id          SERIAL  PRIMARY KEY,
            description TEXT    NOT NULL,
            start_date  DATE    NOT NULL,
            end_date    DATE    NOT NULL,
            total_cost  REAL    NOT NULL DEFAULT 0
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS participants (
            id         SERIAL PRIMARY KEY,
            last_name  TEXT   NOT NULL,
            first_name TEXT   NOT NULL,
            role       TEXT   NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS participant_events (
            participant_id INT NOT NULL REFERENCES participants(id),
            event_id       INT NOT NULL REFERENCES events(id),
            PRIMARY KEY (participant_id, event_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS logistics (
            id          SERIAL  PRIMARY KEY,
            description TEXT    NOT NULL,
            reserved    BOOLEAN NOT NULL,
            unit_price  REAL    NOT NULL,
            quantity    INT     NOT NULL,
            event_id    INT     REFERENCES events(id)
        )
        "#,
    ] {
        sqlx::query(statement).execute(&pool).await.ok()?;
    }

    // Clean slate for each test
    sqlx::query(
        "TRUNCATE participant_events, logistics, participants, events RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .ok()?;

    Some(pool)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// =========================================================================
// Events
// =========================================================================

#[tokio::test]
async fn save_assigns_id_and_round_trips() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgStore::new(pool);

    let saved = EventStore::save(&store, &Event::new("Tech Day", date(2024, 5, 1), date(2024, 5, 2)))
        .await
        .unwrap();
    let id = saved.id.expect("id assigned");

    let loaded = EventStore::find_by_id(&store, id).await.unwrap().unwrap();
    assert_eq!(loaded.description, "Tech Day");
    assert_eq!(loaded.start_date, date(2024, 5, 1));
    assert!(loaded.logistics.is_none());
    assert!(loaded.participants.is_none());
}

#[tokio::test]
async fn save_with_id_updates_cost() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgStore::new(pool);

    let mut event = EventStore::save(&store, &Event::new("Tech Day", date(2024, 5, 1), date(2024, 5, 2)))
        .await
        .unwrap();
    event.total_cost = 45.0;
    EventStore::save(&store, &event).await.unwrap();

    let loaded = store.find_by_description("Tech Day").await.unwrap().unwrap();
    assert_eq!(loaded.id, event.id);
    assert_eq!(loaded.total_cost, 45.0);
}

#[tokio::test]
async fn start_date_range_is_inclusive() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgStore::new(pool);

    for (name, day) in [("before", 1), ("first", 5), ("last", 10), ("after", 11)] {
        EventStore::save(&store, &Event::new(name, date(2024, 5, day), date(2024, 5, day)))
            .await
            .unwrap();
    }

    let events = store
        .find_by_start_date_between(date(2024, 5, 5), date(2024, 5, 10))
        .await
        .unwrap();
    let names: Vec<&str> = events.iter().map(|e| e.description.as_str()).collect();
    assert_eq!(names, vec!["first", "last"]);
}

// =========================================================================
// Explicit ids
// =========================================================================

#[tokio::test]
async fn generated_event_id_follows_explicit_one() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgStore::new(pool);

    EventStore::save(
        &store,
        &Event::new("imported", date(2024, 5, 1), date(2024, 5, 1)).with_id(7),
    )
    .await
    .unwrap();
    let fresh = EventStore::save(&store, &Event::new("fresh", date(2024, 5, 2), date(2024, 5, 2)))
        .await
        .unwrap();

    assert_eq!(fresh.id, Some(8));
    let imported = EventStore::find_by_id(&store, 7).await.unwrap().unwrap();
    assert_eq!(imported.description, "imported");
}

#[tokio::test]
async fn generated_participant_id_follows_explicit_one() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgStore::new(pool);

    ParticipantStore::save(&store, &Participant::new("Tounsi", "Ahmed", Role::Organisateur).with_id(1))
        .await
        .unwrap();
    let fresh = ParticipantStore::save(&store, &Participant::new("Ben Ali", "Sami", Role::Visiteur))
        .await
        .unwrap();

    assert_eq!(fresh.id, Some(2));
    let first = ParticipantStore::find_by_id(&store, 1).await.unwrap().unwrap();
    assert_eq!(first.last_name, "Tounsi");
}

#[tokio::test]
async fn generated_logistics_id_follows_explicit_one() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgStore::new(pool);

    LogisticsStore::save(&store, &Logistics::new("projector", true, 15.0, 1).with_id(3))
        .await
        .unwrap();
    let fresh = LogisticsStore::save(&store, &Logistics::new("chairs", false, 2.0, 40))
        .await
        .unwrap();

    assert_eq!(fresh.id, Some(4));
}

#[tokio::test]
async fn resaving_explicit_id_keeps_sequence_ahead() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgStore::new(pool);

    let first = EventStore::save(&store, &Event::new("first", date(2024, 5, 1), date(2024, 5, 1)))
        .await
        .unwrap();
    let second = EventStore::save(&store, &Event::new("second", date(2024, 5, 2), date(2024, 5, 2)))
        .await
        .unwrap();

    // Updating a lower id must not rewind the sequence.
    EventStore::save(&store, &first).await.unwrap();
    let third = EventStore::save(&store, &Event::new("third", date(2024, 5, 3), date(2024, 5, 3)))
        .await
        .unwrap();

    assert_eq!(third.id, Some(second.id.unwrap() + 1));
}

// =========================================================================
// Relations
// =========================================================================

#[tokio::test]
async fn logistics_link_hydrates_event() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgStore::new(pool);

    let event = EventStore::save(&store, &Event::new("Tech Day", date(2024, 5, 1), date(2024, 5, 2)))
        .await
        .unwrap();
    let mut item = Logistics::new("projector", true, 15.0, 3);
    item.event_id = event.id;
    let item = LogisticsStore::save(&store, &item).await.unwrap();

    let loaded = EventStore::find_by_id(&store, event.id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.logistics, Some(vec![item.clone()]));

    let found = LogisticsStore::find_by_id(&store, item.id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.event_id, event.id);
}

#[tokio::test]
async fn participant_save_owns_event_links() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgStore::new(pool);

    let event = EventStore::save(&store, &Event::new("Tech Day", date(2024, 5, 1), date(2024, 5, 2)))
        .await
        .unwrap();
    let event_id = event.id.unwrap();

    let mut participant = Participant::new("Tounsi", "Ahmed", Role::Organisateur);
    participant.join_event(event_id);
    let participant = ParticipantStore::save(&store, &participant).await.unwrap();
    let participant_id = participant.id.unwrap();

    let loaded = ParticipantStore::find_by_id(&store, participant_id)
        .await
        .unwrap()
        .unwrap();
    assert!(loaded.is_linked_to(event_id));
    assert_eq!(loaded.role, Role::Organisateur);

    let organised = store
        .find_by_participant("Tounsi", "Ahmed", Role::Organisateur)
        .await
        .unwrap();
    assert_eq!(organised.len(), 1);
    assert_eq!(
        organised[0].participants.as_ref().map(|p| p.contains(&participant_id)),
        Some(true)
    );

    let as_visitor = store
        .find_by_participant("Tounsi", "Ahmed", Role::Visiteur)
        .await
        .unwrap();
    assert!(as_visitor.is_empty());
}

#[tokio::test]
async fn resaving_participant_replaces_links() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgStore::new(pool);

    let first = EventStore::save(&store, &Event::new("first", date(2024, 5, 1), date(2024, 5, 1)))
        .await
        .unwrap();
    let second = EventStore::save(&store, &Event::new("second", date(2024, 5, 2), date(2024, 5, 2)))
        .await
        .unwrap();

    let mut participant = Participant::new("Tounsi", "Ahmed", Role::Intervenant);
    participant.join_event(first.id.unwrap());
    let mut participant = ParticipantStore::save(&store, &participant).await.unwrap();

    participant.events = None;
    participant.join_event(second.id.unwrap());
    ParticipantStore::save(&store, &participant).await.unwrap();

    let loaded = ParticipantStore::find_by_id(&store, participant.id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(!loaded.is_linked_to(first.id.unwrap()));
    assert!(loaded.is_linked_to(second.id.unwrap()));
}

#[tokio::test]
async fn missing_rows_are_none() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgStore::new(pool);

    assert!(EventStore::find_by_id(&store, 42).await.unwrap().is_none());
    assert!(ParticipantStore::find_by_id(&store, 42).await.unwrap().is_none());
    assert!(LogisticsStore::find_by_id(&store, 42).await.unwrap().is_none());
    assert!(store.find_by_description("nope").await.unwrap().is_none());
}
