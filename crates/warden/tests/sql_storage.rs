use std::time::Duration;

use warden::account_link::AccountLinkStore;
use warden::shift_ledger::{ShiftEnd, ShiftLedger};
use warden::storage::{sql, SqlAccountLinkStore, SqlShiftLedger};
use warden::types::{ExternalId, GameId};

async fn pool() -> sqlx::SqlitePool {
    let pool = sql::connect("sqlite::memory:").await.unwrap();
    sql::migrate(&pool).await.unwrap();
    pool
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let pool = pool().await;
    sql::migrate(&pool).await.unwrap();
}

#[tokio::test]
async fn upsert_replaces_the_members_link() {
    let store = SqlAccountLinkStore::new(pool().await);
    let member = ExternalId::new("100");

    store.upsert(&member, &GameId::new("7"), "Alice").await.unwrap();
    store.upsert(&member, &GameId::new("8"), "AliceAlt").await.unwrap();

    let account = store.lookup_by_external_id(&member).await.unwrap().unwrap();
    assert_eq!(account.game_id, GameId::new("8"));
    assert_eq!(account.game_display_name, "AliceAlt");
    assert!(store.lookup_by_game_id(&GameId::new("7")).await.unwrap().is_none());
}

#[tokio::test]
async fn latest_link_wins_for_a_shared_game_id() {
    let store = SqlAccountLinkStore::new(pool().await);
    let game_id = GameId::new("7");

    store.upsert(&ExternalId::new("100"), &game_id, "Alice").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    store.upsert(&ExternalId::new("200"), &game_id, "Alice").await.unwrap();

    let account = store.lookup_by_game_id(&game_id).await.unwrap().unwrap();
    assert_eq!(account.external_id, ExternalId::new("200"));
}

#[tokio::test]
async fn unknown_ids_resolve_to_none() {
    let store = SqlAccountLinkStore::new(pool().await);
    assert!(store.lookup_by_game_id(&GameId::new("1")).await.unwrap().is_none());
    assert!(store
        .lookup_by_external_id(&ExternalId::new("1"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn end_shift_closes_the_open_shift() {
    let ledger = SqlShiftLedger::new(pool().await);
    let member = ExternalId::new("100");

    let id = ledger.start_shift(&member).await.unwrap();
    assert_eq!(ledger.end_shift(&member).await.unwrap(), ShiftEnd::Closed { id });

    let shifts = ledger.list_shifts().await.unwrap();
    assert_eq!(shifts.len(), 1);
    assert!(!shifts[0].is_open());
    assert!(shifts[0].end_time.unwrap() >= shifts[0].start_time);
}

#[tokio::test]
async fn end_without_open_shift_records_zero_length_shift() {
    let ledger = SqlShiftLedger::new(pool().await);
    let member = ExternalId::new("100");

    let ShiftEnd::RecordedEmpty { id } = ledger.end_shift(&member).await.unwrap() else {
        panic!("expected a zero-length shift");
    };

    let shifts = ledger.list_shifts().await.unwrap();
    assert_eq!(shifts.len(), 1);
    assert_eq!(shifts[0].id, id);
    assert_eq!(shifts[0].end_time, Some(shifts[0].start_time));
}

#[tokio::test]
async fn shifts_are_listed_newest_first() {
    let ledger = SqlShiftLedger::new(pool().await);

    let first = ledger.start_shift(&ExternalId::new("100")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = ledger.start_shift(&ExternalId::new("200")).await.unwrap();

    let ids: Vec<i64> = ledger
        .list_shifts()
        .await
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec![second, first]);
}

#[tokio::test]
async fn end_shift_only_touches_the_callers_shift() {
    let ledger = SqlShiftLedger::new(pool().await);
    let alice = ExternalId::new("100");
    let bob = ExternalId::new("200");

    ledger.start_shift(&alice).await.unwrap();
    let bobs = ledger.start_shift(&bob).await.unwrap();
    assert_eq!(ledger.end_shift(&bob).await.unwrap(), ShiftEnd::Closed { id: bobs });

    let open: Vec<_> = ledger
        .list_shifts()
        .await
        .unwrap()
        .into_iter()
        .filter(|s| s.is_open())
        .collect();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].external_id, alice);
}

#[tokio::test]
async fn migrate_upgrades_a_database_from_the_legacy_bot() {
    let pool = sql::connect("sqlite::memory:").await.unwrap();
    sqlx::query(
        "CREATE TABLE linked_accounts (
            discord_id TEXT PRIMARY KEY,
            roblox_id TEXT NOT NULL,
            roblox_username TEXT NOT NULL
        )",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TABLE shift_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            discord_id TEXT NOT NULL,
            start_time TIMESTAMP NOT NULL,
            end_time TIMESTAMP
        )",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO linked_accounts VALUES ('100', '7', 'Alice'), ('200', '8', 'Bob')")
        .execute(&pool)
        .await
        .unwrap();

    sql::migrate(&pool).await.unwrap();
    let store = SqlAccountLinkStore::new(pool.clone());

    let account = store.lookup_by_game_id(&GameId::new("7")).await.unwrap().unwrap();
    assert_eq!(account.external_id, ExternalId::new("100"));
    assert_eq!(account.game_display_name, "Alice");

    // A link made after the upgrade outranks a legacy link to the same game id.
    store.upsert(&ExternalId::new("300"), &GameId::new("8"), "Bob").await.unwrap();
    let account = store.lookup_by_game_id(&GameId::new("8")).await.unwrap().unwrap();
    assert_eq!(account.external_id, ExternalId::new("300"));

    let ledger = SqlShiftLedger::new(pool);
    let member = ExternalId::new("100");
    let id = ledger.start_shift(&member).await.unwrap();
    assert_eq!(ledger.end_shift(&member).await.unwrap(), ShiftEnd::Closed { id });
}
