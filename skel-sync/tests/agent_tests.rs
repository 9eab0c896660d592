//! Pull-path behaviour: applier policy, watermark, agent lifecycle.

mod common;

use std::thread;
use std::time::{Duration, Instant};

use common::{ts, FakeRemote};
use skel_core::{Address, Annotation, AnnotationKind, LogContext, SyncWatermark};
use skel_sync::{
    AgentState, ApplyOutcome, LocalApplier, MemoryWorkspace, MutationQueue, SyncAgent, SyncError,
    SyncOutcome, Workspace,
};

fn harness(ws: MemoryWorkspace, remote: FakeRemote) -> (MutationQueue<MemoryWorkspace>, SyncAgent<FakeRemote>) {
    let queue = MutationQueue::spawn(ws, LogContext::disabled()).expect("spawn queue");
    let applier = LocalApplier::new(queue.handle().expect("handle"), LogContext::disabled());
    let agent = SyncAgent::new(remote, applier, LogContext::disabled());
    (queue, agent)
}

fn finish(queue: MutationQueue<MemoryWorkspace>, agent: SyncAgent<FakeRemote>) -> MemoryWorkspace {
    drop(agent);
    queue.shutdown().expect("shutdown")
}

fn report(outcome: SyncOutcome) -> skel_sync::SyncReport {
    match outcome {
        SyncOutcome::Synced(report) => report,
        other => panic!("expected a synced cycle, got {other:?}"),
    }
}

fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

// ---------------------------------------------------------------------------
// 1. Applier policy
// ---------------------------------------------------------------------------

#[test]
fn applying_a_batch_twice_changes_nothing_the_second_time() {
    let queue = MutationQueue::spawn(MemoryWorkspace::new(), LogContext::disabled()).unwrap();
    let applier = LocalApplier::new(queue.handle().unwrap(), LogContext::disabled());
    let batch = vec![
        Annotation::remote(0x10u64, AnnotationKind::Comment, "decrypts strings", ts(1)),
        Annotation::remote(0x20u64, AnnotationKind::Name, "decrypt_strings", ts(2)),
        Annotation::remote(0x20u64, AnnotationKind::Type, "int __cdecl decrypt_strings(char *)", ts(3)),
    ];

    let first: Vec<_> = batch.iter().map(|a| applier.apply(a).unwrap()).collect();
    assert!(first.iter().all(|o| *o == ApplyOutcome::Applied));
    let second: Vec<_> = batch.iter().map(|a| applier.apply(a).unwrap()).collect();
    assert!(second.iter().all(|o| *o == ApplyOutcome::Unchanged));

    drop(applier);
    let ws = queue.shutdown().unwrap();
    assert_eq!(ws.writes(), 3);
    assert_eq!(ws.repeatable_comment(Address(0x10)).as_deref(), Some("decrypts strings"));
    assert_eq!(ws.name(Address(0x20)).as_deref(), Some("decrypt_strings"));
}

#[test]
fn comment_matching_the_plain_slot_is_not_rewritten() {
    let mut ws = MemoryWorkspace::new();
    ws.set_comment(Address(0x10), "already here", false);
    let remote = FakeRemote::online(1);
    remote.seed(AnnotationKind::Comment, 0x10, "already here", ts(1));

    let (queue, mut agent) = harness(ws, remote);
    let r = report(agent.sync_once().unwrap());
    assert_eq!(r.unchanged, 1);
    let ws = finish(queue, agent);
    assert_eq!(ws.writes(), 1);
    assert!(ws.repeatable_comment(Address(0x10)).is_none());
}

#[test]
fn default_names_are_overwritten_without_prompt() {
    let mut ws = MemoryWorkspace::new();
    ws.set_name(Address(0x401000), "sub_401000");
    let remote = FakeRemote::online(1);
    remote.seed(AnnotationKind::Name, 0x401000, "crc32", ts(1));

    let (queue, mut agent) = harness(ws, remote);
    report(agent.sync_once().unwrap());
    let ws = finish(queue, agent);
    assert_eq!(ws.name(Address(0x401000)).as_deref(), Some("crc32"));
    assert!(ws.prompts().is_empty());
}

#[test]
fn analyst_names_need_confirmation() {
    let mut ws = MemoryWorkspace::new();
    ws.set_name(Address(0x401000), "my_crc");
    ws.set_name(Address(0x402000), "my_rc4");
    let mut answers = vec![false, true].into_iter();
    ws.set_confirmer(Box::new(move |_| answers.next().unwrap_or(false)));

    let remote = FakeRemote::online(1);
    remote.seed(AnnotationKind::Name, 0x401000, "crc32", ts(1));
    remote.seed(AnnotationKind::Name, 0x402000, "rc4_init", ts(2));

    let (queue, mut agent) = harness(ws, remote);
    let r = report(agent.sync_once().unwrap());
    assert_eq!((r.declined, r.applied), (1, 1));

    let ws = finish(queue, agent);
    assert_eq!(ws.prompts(), ["Replace my_crc by crc32", "Replace my_rc4 by rc4_init"]);
    assert_eq!(ws.name(Address(0x401000)).as_deref(), Some("my_crc"));
    assert_eq!(ws.name(Address(0x402000)).as_deref(), Some("rc4_init"));
}

#[test]
fn boilerplate_never_reaches_the_workspace() {
    let remote = FakeRemote::online(1);
    remote.seed(AnnotationKind::Comment, 0x10, "int x", ts(1));
    remote.seed(AnnotationKind::Comment, 0x14, "Switch jump", ts(2));
    remote.seed(AnnotationKind::Name, 0x18, "loc_18", ts(3));

    let (queue, mut agent) = harness(MemoryWorkspace::new(), remote);
    let r = report(agent.sync_once().unwrap());
    assert_eq!(r.filtered, 3);
    assert_eq!(agent.watermark(), SyncWatermark::at(ts(3)));

    let ws = finish(queue, agent);
    assert_eq!(ws.writes(), 0);
}

// ---------------------------------------------------------------------------
// 2. Watermark
// ---------------------------------------------------------------------------

#[test]
fn watermark_is_the_max_over_both_streams_regardless_of_order() {
    let remote = FakeRemote::online(1);
    remote.seed(AnnotationKind::Comment, 0x10, "late", ts(9));
    remote.seed(AnnotationKind::Comment, 0x14, "early", ts(2));
    remote.seed(AnnotationKind::Name, 0x18, "mid_name", ts(5));

    let (queue, mut agent) = harness(MemoryWorkspace::new(), remote);
    let before = agent.watermark();
    let r = report(agent.sync_once().unwrap());
    assert!(agent.watermark() >= before);
    assert_eq!(agent.watermark(), SyncWatermark::at(ts(9)));
    assert_eq!(r.watermark, agent.watermark());
    finish(queue, agent);
}

#[test]
fn watermark_never_regresses() {
    let remote = FakeRemote::online(1);
    remote.seed(AnnotationKind::Comment, 0x10, "old news", ts(3));

    let (queue, agent) = harness(MemoryWorkspace::new(), remote);
    let mut agent = agent.with_watermark(SyncWatermark::at(ts(7)));
    let r = report(agent.sync_once().unwrap());
    assert_eq!(r.fetched, 0);
    assert_eq!(agent.watermark(), SyncWatermark::at(ts(7)));
    finish(queue, agent);
}

#[test]
fn boundary_redelivery_is_harmless() {
    let remote = FakeRemote::online(1);
    remote.seed(AnnotationKind::Comment, 0x10, "keep", ts(4));

    let (queue, mut agent) = harness(MemoryWorkspace::new(), remote);
    assert_eq!(report(agent.sync_once().unwrap()).applied, 1);
    // Inclusive server filter hands the boundary record back.
    let again = report(agent.sync_once().unwrap());
    assert_eq!((again.fetched, again.unchanged, again.applied), (1, 1, 0));

    let ws = finish(queue, agent);
    assert_eq!(ws.writes(), 1);
}

#[test]
fn declined_rename_is_asked_once_across_cycles() {
    let mut ws = MemoryWorkspace::new();
    ws.set_name(Address(0x4010a0), "my_parser");
    ws.answer_all(false);
    let remote = FakeRemote::online(1);
    remote.seed(AnnotationKind::Name, 0x4010a0, "ParseHeader", ts(1));

    let (queue, mut agent) = harness(ws, remote);
    let first = report(agent.sync_once().unwrap());
    assert_eq!(first.declined, 1);
    for _ in 0..4 {
        let again = report(agent.sync_once().unwrap());
        assert_eq!((again.fetched, again.declined, again.unchanged), (1, 0, 1));
    }

    let ws = finish(queue, agent);
    assert_eq!(ws.prompts(), ["Replace my_parser by ParseHeader"]);
    assert_eq!(ws.name(Address(0x4010a0)).as_deref(), Some("my_parser"));
}

#[test]
fn new_record_at_the_boundary_timestamp_is_still_applied() {
    let remote = FakeRemote::online(1);
    let server = remote.peer();
    remote.seed(AnnotationKind::Comment, 0x10, "first", ts(4));

    let (queue, mut agent) = harness(MemoryWorkspace::new(), remote);
    assert_eq!(report(agent.sync_once().unwrap()).applied, 1);
    server.seed(AnnotationKind::Comment, 0x20, "same instant", ts(4));
    let again = report(agent.sync_once().unwrap());
    assert_eq!((again.fetched, again.applied, again.unchanged), (2, 1, 1));

    let ws = finish(queue, agent);
    assert_eq!(ws.repeatable_comment(Address(0x20)).as_deref(), Some("same instant"));
}

#[test]
fn latest_of_two_comments_at_one_address_wins() {
    let remote = FakeRemote::online(1);
    // Server order is not timestamp order.
    remote.seed(AnnotationKind::Comment, 0x10, "second thought", ts(8));
    remote.seed(AnnotationKind::Comment, 0x10, "first thought", ts(3));

    let (queue, mut agent) = harness(MemoryWorkspace::new(), remote);
    report(agent.sync_once().unwrap());
    assert_eq!(agent.watermark(), SyncWatermark::at(ts(8)));

    let ws = finish(queue, agent);
    assert_eq!(ws.repeatable_comment(Address(0x10)).as_deref(), Some("second thought"));
}

// ---------------------------------------------------------------------------
// 3. Failure handling
// ---------------------------------------------------------------------------

#[test]
fn offline_session_reports_without_fetching() {
    let remote = FakeRemote::new();
    let (queue, mut agent) = harness(MemoryWorkspace::new(), remote.peer());
    assert_eq!(agent.sync_once().unwrap(), SyncOutcome::Offline);
    assert_eq!(remote.server().fetches, 0);
    finish(queue, agent);
}

#[test]
fn unreachable_server_keeps_the_watermark() {
    let remote = FakeRemote::online(1);
    remote.seed(AnnotationKind::Comment, 0x10, "never seen", ts(5));
    remote.server().unreachable = true;

    let (queue, mut agent) = harness(MemoryWorkspace::new(), remote.clone());
    assert_eq!(agent.sync_once().unwrap(), SyncOutcome::Unreachable);
    assert_eq!(agent.watermark(), SyncWatermark::epoch());

    remote.server().unreachable = false;
    assert!(agent.sync_once().unwrap().is_success());
    assert_eq!(agent.watermark(), SyncWatermark::at(ts(5)));
    finish(queue, agent);
}

#[test]
fn dead_mutation_thread_is_fatal() {
    let remote = FakeRemote::online(1);
    remote.seed(AnnotationKind::Name, 0x10, "parse", ts(1));
    let (queue, mut agent) = harness(MemoryWorkspace::new(), remote);

    let killer = queue.handle().unwrap();
    let _ = killer.execute_sync(|_| -> () { panic!("host went away") });
    assert!(matches!(agent.sync_once(), Err(SyncError::QueueClosed)));
}

// ---------------------------------------------------------------------------
// 4. Worker lifecycle
// ---------------------------------------------------------------------------

#[test]
fn stop_while_waiting_for_signal_exits_without_syncing() {
    let remote = FakeRemote::online(1);
    let (queue, agent) = harness(MemoryWorkspace::new(), remote.clone());

    let handle = agent.spawn(Duration::from_millis(10)).unwrap();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(handle.state(), AgentState::Idle);
    handle.stop();
    let exit = handle.join().unwrap();

    assert_eq!(exit.cycles, 0);
    assert!(exit.error.is_none());
    assert_eq!(remote.server().fetches, 0);
    queue.shutdown().unwrap();
}

#[test]
fn triggered_cycle_runs_once_then_stops_cleanly() {
    let remote = FakeRemote::online(1);
    remote.seed(AnnotationKind::Comment, 0x10, "from a colleague", ts(2));
    let (queue, agent) = harness(MemoryWorkspace::new(), remote.clone());

    let handle = agent.spawn(Duration::from_millis(5)).unwrap();
    assert!(handle.trigger());
    wait_for(|| handle.cycles() == 1);
    let exit = handle.stop_and_join().unwrap();

    assert_eq!(exit.cycles, 1);
    assert_eq!(exit.watermark, SyncWatermark::at(ts(2)));
    assert_eq!(remote.server().fetches, 2);
    let ws = queue.shutdown().unwrap();
    assert_eq!(ws.repeatable_comment(Address(0x10)).as_deref(), Some("from a colleague"));
}

#[test]
fn timer_ticks_coalesce_and_end_after_stop() {
    let (queue, agent) = harness(MemoryWorkspace::new(), FakeRemote::online(1));
    let handle = agent.spawn(Duration::from_secs(3600)).unwrap();

    assert_eq!(handle.timer_tick(), Some(Duration::from_secs(3600)));
    // Pending signal: a second raise is absorbed.
    let ticker = handle.ticker();
    assert_eq!(ticker.tick(), Some(Duration::from_secs(3600)));

    handle.stop();
    assert_eq!(handle.timer_tick(), None);
    assert_eq!(ticker.tick(), None);
    let exit = handle.join().unwrap();
    assert_eq!(exit.cycles, 0);
    queue.shutdown().unwrap();
}

#[test]
fn worker_closes_its_connection_on_exit() {
    let remote = FakeRemote::online(1);
    let (queue, agent) = harness(MemoryWorkspace::new(), remote.clone());
    let handle = agent.spawn(Duration::from_millis(1)).unwrap();
    let exit = handle.stop_and_join().unwrap();
    assert!(exit.error.is_none());
    assert_eq!(remote.server().closes, 1);
    queue.shutdown().unwrap();
}

#[test]
fn fatal_error_ends_the_worker() {
    let remote = FakeRemote::online(1);
    remote.seed(AnnotationKind::Name, 0x10, "parse", ts(1));
    let (queue, agent) = harness(MemoryWorkspace::new(), remote);
    let killer = queue.handle().unwrap();
    let _ = killer.execute_sync(|_| -> () { panic!("host went away") });

    let handle = agent.spawn(Duration::from_millis(1)).unwrap();
    handle.trigger();
    wait_for(|| handle.state() == AgentState::Stopped);
    assert_eq!(handle.timer_tick(), None);
    let exit = handle.join().unwrap();
    assert!(matches!(exit.error, Some(SyncError::QueueClosed)));
}
