use std::sync::Arc;

use warden::dispatcher::EventDispatcher;
use warden::log_entry::{LogEntry, LogStream};
use warden::testing::{TestHarness, JOIN_CHANNEL, KILL_CHANNEL, LEAVE_CHANNEL};
use warden::watermark::Watermark;

fn dispatcher(harness: &TestHarness) -> EventDispatcher {
    EventDispatcher::new(harness.notifier(), None, harness.metrics.clone())
}

#[tokio::test]
async fn only_entries_past_the_watermark_are_dispatched_in_order() {
    let harness = TestHarness::new();
    let mut dispatcher = dispatcher(&harness);
    dispatcher.set_watermark(LogStream::Kill, Watermark::at(100));

    let batch = vec![
        LogEntry::kill(105, "Eve", "Frank"),
        LogEntry::kill(90, "Alice", "Bob"),
        LogEntry::kill(101, "Carol", "Dave"),
        LogEntry::kill(100, "Gina", "Hank"),
    ];
    let report = dispatcher.dispatch(LogStream::Kill, batch).await;

    assert_eq!(report.dispatched, 2);
    assert_eq!(report.duplicates, 2);
    assert_eq!(dispatcher.watermark(LogStream::Kill), Watermark::at(105));

    let sent = harness.sink.sent_to(KILL_CHANNEL);
    assert_eq!(sent.len(), 2);
    assert!(sent[0].starts_with("**Carol** eliminated **Dave**"));
    assert!(sent[1].starts_with("**Eve** eliminated **Frank**"));
}

#[tokio::test]
async fn redelivered_batches_are_idempotent() {
    let harness = TestHarness::new();
    let mut dispatcher = dispatcher(&harness);

    let batch = vec![
        LogEntry::join(10, "1", "Alice"),
        LogEntry::leave(20, "1", "Alice"),
    ];
    let first = dispatcher.dispatch(LogStream::JoinLeave, batch.clone()).await;
    let second = dispatcher.dispatch(LogStream::JoinLeave, batch).await;

    assert_eq!(first.dispatched, 2);
    assert_eq!(second.dispatched, 0);
    assert_eq!(second.duplicates, 2);
    assert_eq!(harness.sink.sent_to(JOIN_CHANNEL).len(), 1);
    assert_eq!(harness.sink.sent_to(LEAVE_CHANNEL).len(), 1);
}

#[tokio::test]
async fn equal_timestamps_keep_source_order() {
    let harness = TestHarness::new();
    let mut dispatcher = dispatcher(&harness);

    let batch = vec![
        LogEntry::join(60, "4", "Dan"),
        LogEntry::join(50, "2", "Bob"),
        LogEntry::join(50, "3", "Carol"),
    ];
    let report = dispatcher.dispatch(LogStream::JoinLeave, batch).await;

    assert_eq!(report.dispatched, 3);
    let sent = harness.sink.sent_to(JOIN_CHANNEL);
    assert!(sent[0].starts_with("**Bob**"));
    assert!(sent[1].starts_with("**Carol**"));
    assert!(sent[2].starts_with("**Dan**"));

    // A later batch repeating the boundary timestamp is treated as seen.
    let late = dispatcher
        .dispatch(LogStream::JoinLeave, vec![LogEntry::join(60, "5", "Eve")])
        .await;
    assert_eq!(late.dispatched, 0);
}

#[tokio::test]
async fn entries_without_timestamp_are_lost_once_the_stream_has_advanced() {
    let harness = TestHarness::new();
    let mut dispatcher = dispatcher(&harness);
    dispatcher.set_watermark(LogStream::JoinLeave, Watermark::at(100));

    // Missing timestamps decode as 0 and can never pass a nonzero watermark.
    let report = dispatcher
        .dispatch(LogStream::JoinLeave, vec![LogEntry::join(0, "1", "Alice")])
        .await;

    assert_eq!(report.dispatched, 0);
    assert_eq!(report.duplicates, 1);
    assert!(harness.sink.sent().is_empty());
}

#[tokio::test]
async fn streams_have_independent_watermarks() {
    let harness = TestHarness::new();
    let mut dispatcher = dispatcher(&harness);

    dispatcher
        .dispatch(LogStream::JoinLeave, vec![LogEntry::join(500, "1", "Alice")])
        .await;
    let report = dispatcher
        .dispatch(LogStream::Kill, vec![LogEntry::kill(10, "Alice", "Bob")])
        .await;

    assert_eq!(report.dispatched, 1);
    assert_eq!(dispatcher.watermark(LogStream::JoinLeave), Watermark::at(500));
    assert_eq!(dispatcher.watermark(LogStream::Kill), Watermark::at(10));
}

#[tokio::test]
async fn notification_failures_still_advance_the_watermark() {
    let harness = TestHarness::new();
    harness.sink.set_failing(true);
    let mut dispatcher = dispatcher(&harness);

    let report = dispatcher
        .dispatch(LogStream::JoinLeave, vec![LogEntry::leave(7, "1", "Alice")])
        .await;

    assert_eq!(report.dispatched, 1);
    assert_eq!(dispatcher.watermark(LogStream::JoinLeave), Watermark::at(7));
    assert_eq!(harness.metrics.events_dispatched.with_label_values(&["join_leave"]).get(), 1);
}

#[tokio::test]
async fn disabled_categories_are_skipped_silently() {
    let harness = TestHarness::new();
    let routes = warden::notify::ChannelRoutes {
        kill: None,
        ..TestHarness::routes()
    };
    let notifier = warden::notify::Notifier::new(harness.sink.clone(), routes);
    let mut dispatcher = EventDispatcher::new(notifier, None, Arc::clone(&harness.metrics));

    let report = dispatcher
        .dispatch(LogStream::Kill, vec![LogEntry::kill(1, "Alice", "Bob")])
        .await;

    assert_eq!(report.dispatched, 1);
    assert!(harness.sink.sent().is_empty());
}
