use std::time::Duration;

use tokio_util::sync::CancellationToken;
use warden::log_entry::{LogEntry, LogStream};
use warden::dispatcher::EventDispatcher;
use warden::poller::{LogPoller, SessionGate, StreamOutcome};
use warden::testing::{TestHarness, JOIN_CHANNEL, KILL_CHANNEL};
use warden::watermark::Watermark;

const INTERVAL: Duration = Duration::from_secs(30);

fn poller(harness: &TestHarness, gate: SessionGate, cancel: CancellationToken) -> LogPoller {
    let dispatcher = EventDispatcher::new(harness.notifier(), None, harness.metrics.clone());
    LogPoller::new(
        harness.game.clone(),
        dispatcher,
        INTERVAL,
        gate,
        cancel,
        harness.metrics.clone(),
    )
}

#[tokio::test]
async fn kill_fetch_failure_does_not_block_join_leave() {
    let harness = TestHarness::new();
    harness.game.set_join_leave_log(vec![LogEntry::join(10, "1", "Alice")]);
    harness.game.set_kill_log(vec![LogEntry::kill(5, "Alice", "Bob")]);

    let mut poller = poller(&harness, SessionGate::new(), CancellationToken::new());
    let seed = poller.run_cycle().await;
    assert!(matches!(seed.kill, StreamOutcome::Dispatched(_)));
    assert_eq!(poller.dispatcher().watermark(LogStream::Kill), Watermark::at(5));

    harness.game.fail_kill(Some(503));
    harness.game.set_join_leave_log(vec![
        LogEntry::join(10, "1", "Alice"),
        LogEntry::join(11, "2", "Carol"),
    ]);
    harness.game.set_kill_log(vec![
        LogEntry::kill(5, "Alice", "Bob"),
        LogEntry::kill(12, "Carol", "Dave"),
    ]);

    let failed = poller.run_cycle().await;
    assert_eq!(failed.kill, StreamOutcome::Failed);
    match failed.join_leave {
        StreamOutcome::Dispatched(report) => assert_eq!(report.dispatched, 1),
        other => panic!("expected join/leave dispatch, got {other:?}"),
    }
    assert_eq!(poller.dispatcher().watermark(LogStream::Kill), Watermark::at(5));
    assert_eq!(harness.metrics.fetch_failures.with_label_values(&["kill"]).get(), 1);

    harness.game.fail_kill(None);
    let recovered = poller.run_cycle().await;
    match recovered.kill {
        StreamOutcome::Dispatched(report) => {
            assert_eq!(report.dispatched, 1);
            assert_eq!(report.duplicates, 1);
        }
        other => panic!("expected kill dispatch, got {other:?}"),
    }
    assert_eq!(poller.dispatcher().watermark(LogStream::Kill), Watermark::at(12));
    assert_eq!(harness.sink.sent_to(KILL_CHANNEL).len(), 2);
    assert_eq!(harness.sink.sent_to(JOIN_CHANNEL).len(), 2);
    assert_eq!(harness.metrics.poll_cycles.get(), 3);
}

#[tokio::test]
async fn empty_logs_leave_watermarks_unset() {
    let harness = TestHarness::new();
    let mut poller = poller(&harness, SessionGate::new(), CancellationToken::new());

    let report = poller.run_cycle().await;

    assert_eq!(report.join_leave, StreamOutcome::Empty);
    assert_eq!(report.kill, StreamOutcome::Empty);
    assert_eq!(poller.dispatcher().watermark(LogStream::JoinLeave), Watermark::unset());
}

#[tokio::test(start_paused = true)]
async fn polling_waits_for_the_session_gate() {
    let harness = TestHarness::new();
    let gate = SessionGate::new();
    let handle = poller(&harness, gate.clone(), CancellationToken::new()).spawn();

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(harness.game.join_leave_fetches(), 0);
    assert_eq!(harness.game.kill_fetches(), 0);

    gate.open();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(harness.game.join_leave_fetches(), 1);
    assert_eq!(harness.game.kill_fetches(), 1);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(harness.game.join_leave_fetches(), 3);

    assert!(handle.shutdown(Duration::from_secs(5)).await);
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_session_ready_never_polls() {
    let harness = TestHarness::new();
    let handle = poller(&harness, SessionGate::new(), CancellationToken::new()).spawn();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(handle.shutdown(Duration::from_secs(5)).await);
    assert_eq!(harness.game.join_leave_fetches(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_further_cycles() {
    let harness = TestHarness::new();
    let gate = SessionGate::new();
    gate.open();
    let cancel = CancellationToken::new();
    let handle = poller(&harness, gate, cancel.clone()).spawn();

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(harness.game.join_leave_fetches(), 1);

    cancel.cancel();
    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(harness.game.join_leave_fetches(), 1);
    assert!(handle.shutdown(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn gate_opens_once_for_all_clones() {
    let gate = SessionGate::new();
    let other = gate.clone();
    assert!(!other.is_open());
    gate.open();
    assert!(other.is_open());
    other.wait_open().await;
}
