//! Randomized operation sequences against the tracker.
//!
//! Every generated operation is only applied when the tracker's own admission
//! predicate allows it, the way a connection driver would call it. After each step the
//! tracker is compared against a plain flag model of the connection and the ownership
//! rules are checked.

use std::sync::Arc;

use connstate::{
    CommandScheduler, ConnPhase, ConnStateTracker, Direction, RequestKind, SiteLogicRequest,
    SiteRace, TransferKind, TransferMonitorId,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Lock(u64, bool),
    BeginFile { fxp: bool, passive: bool, tls: bool },
    BeginList { passive: bool, tls: bool },
    Finish,
    Abort,
    Initialize,
    SetRequest(u64),
    FinishRequest,
    Advance(u64),
    Schedule { delay: u64, persisting: bool },
    Claim,
    ResetIdle,
    Disconnect,
    Check(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1..8u64, any::<bool>()).prop_map(|(m, d)| Op::Lock(m, d)),
        (any::<bool>(), any::<bool>(), any::<bool>())
            .prop_map(|(fxp, passive, tls)| Op::BeginFile { fxp, passive, tls }),
        (any::<bool>(), any::<bool>()).prop_map(|(passive, tls)| Op::BeginList { passive, tls }),
        Just(Op::Finish),
        Just(Op::Abort),
        Just(Op::Initialize),
        (1..100u64).prop_map(Op::SetRequest),
        Just(Op::FinishRequest),
        (0..50u64).prop_map(Op::Advance),
        (0..50u64, any::<bool>())
            .prop_map(|(delay, persisting)| Op::Schedule { delay, persisting }),
        Just(Op::Claim),
        Just(Op::ResetIdle),
        Just(Op::Disconnect),
        (0..3usize).prop_map(Op::Check),
    ]
}

/// The connection as a set of independent flags.
#[derive(Debug, Default)]
struct Model {
    locked: bool,
    active: bool,
    aborted: bool,
    list_active: bool,
    request: bool,
    clock: u64,
    idle: u64,
    file_monitor: Option<u64>,
    list_monitor: Option<u64>,
    fxp: bool,
    last_checked: Option<usize>,
    check_count: u32,
}

fn check_invariants(tracker: &ConnStateTracker, model: &Model) {
    // flags agree with the model
    assert_eq!(tracker.is_transfer_locked(), model.locked);
    assert_eq!(tracker.has_file_transfer(), model.active);
    assert_eq!(tracker.is_list_locked(), model.list_active);
    assert_eq!(tracker.has_request(), model.request);
    assert_eq!(tracker.was_aborted(), model.aborted);
    assert_eq!(tracker.clock(), model.clock);
    assert_eq!(tracker.idle_time(), model.idle);
    assert_eq!(tracker.check_count(), model.check_count);
    // active implies locked
    assert!(!tracker.has_file_transfer() || tracker.is_transfer_locked());
    // a request excludes the transfer lock
    assert!(!tracker.has_request() || !tracker.is_transfer_locked());
    assert!(!tracker.has_request() || !tracker.has_file_transfer());
    // descriptors exist only while their owner does
    let expected_monitor = model
        .list_monitor
        .or(if model.locked { model.file_monitor } else { None })
        .map(TransferMonitorId);
    assert_eq!(tracker.transfer_monitor(), expected_monitor);
    assert_eq!(
        tracker.remote_path().is_some(),
        model.active && !model.list_active
    );
    assert_eq!(
        tracker.is_passive().is_some(),
        model.list_active || model.active
    );
    assert_eq!(tracker.is_fxp(), model.active && !model.list_active && model.fxp);
    if model.list_active {
        assert_eq!(tracker.transfer_kind(), Some(TransferKind::List));
    }
    // derived predicates
    assert_eq!(
        tracker.has_transfer(),
        model.list_active || model.active
    );
    assert_eq!(
        tracker.is_list_or_transfer_locked(),
        model.list_active || model.locked
    );
    assert_eq!(
        tracker.is_locked(),
        model.list_active || model.locked || model.request
    );
    assert_eq!(tracker.is_hard_locked(), model.locked || model.request);
    let expected_phase = match (model.request, model.locked, model.active, model.list_active) {
        (false, false, _, false) => ConnPhase::Idle,
        (false, false, _, true) => ConnPhase::ListActive,
        (false, true, false, false) => ConnPhase::Locked,
        (false, true, false, true) => ConnPhase::LockedListActive,
        (false, true, true, false) => ConnPhase::LockedActive,
        (false, true, true, true) => ConnPhase::LockedActiveListActive,
        (true, _, _, false) => ConnPhase::RequestPending,
        (true, _, _, true) => ConnPhase::RequestPendingListActive,
    };
    assert_eq!(tracker.phase(), expected_phase);
}

fn apply(
    tracker: &mut ConnStateTracker,
    model: &mut Model,
    races: &[Arc<SiteRace>],
    op: &Op,
) {
    match *op {
        Op::Lock(monitor, download) => {
            if tracker.can_lock_for_transfer() {
                let direction = if download {
                    Direction::Download
                } else {
                    Direction::Upload
                };
                tracker.lock_for_transfer(TransferMonitorId(monitor), direction);
                model.locked = true;
                model.file_monitor = Some(monitor);
                model.idle = 0;
            }
        }
        Op::BeginFile { fxp, passive, tls } => {
            if tracker.can_begin_file_transfer() {
                tracker.begin_file_transfer("/inc", "f.txt", fxp, passive, "1.2.3.4", tls);
                model.active = true;
                model.aborted = false;
                model.fxp = fxp;
            }
        }
        Op::BeginList { passive, tls } => {
            if tracker.can_begin_list_transfer() {
                tracker.begin_list_transfer(TransferMonitorId(100), passive, "", tls);
                model.list_active = true;
                model.list_monitor = Some(100);
                model.idle = 0;
            }
        }
        Op::Finish => {
            tracker.finish_transfer();
            if model.list_active {
                model.list_active = false;
                model.list_monitor = None;
            } else {
                model.active = false;
                model.locked = false;
                model.file_monitor = None;
            }
        }
        Op::Abort => {
            tracker.abort_transfer();
            model.aborted = true;
        }
        Op::Initialize => tracker.initialize_transfer(),
        Op::SetRequest(id) => {
            if tracker.can_set_request() {
                tracker.set_request(SiteLogicRequest::new(id, RequestKind::RawCommand, "SITE"));
                model.request = true;
            }
        }
        Op::FinishRequest => {
            tracker.finish_request();
            model.request = false;
        }
        Op::Advance(delta) => {
            tracker.advance(delta);
            model.clock += delta;
            model.idle += delta;
        }
        Op::Schedule { delay, persisting } => {
            tracker.schedule_command("NOOP", delay, None, persisting);
        }
        Op::Claim => {
            if tracker.can_claim() {
                tracker.claim();
                model.idle = 0;
            }
        }
        Op::ResetIdle => {
            tracker.reset_idle();
            model.idle = 0;
        }
        Op::Disconnect => {
            if tracker.can_disconnect() {
                tracker.mark_disconnected();
                model.idle = 0;
            }
        }
        Op::Check(idx) => {
            tracker.check(&races[idx]);
            if model.last_checked == Some(idx) {
                model.check_count += 1;
            } else {
                model.last_checked = Some(idx);
                model.check_count = 1;
            }
        }
    }
}

proptest! {
    #[test]
    fn invariants_hold_for_guarded_sequences(ops in prop::collection::vec(op_strategy(), 0..128)) {
        let races: Vec<Arc<SiteRace>> = (0..3)
            .map(|i| Arc::new(SiteRace::new("TV", format!("Show.S01E0{i}-GRP"))))
            .collect();
        let mut tracker = ConnStateTracker::new();
        let mut model = Model::default();
        check_invariants(&tracker, &model);
        for op in &ops {
            apply(&mut tracker, &mut model, &races, op);
            check_invariants(&tracker, &model);
        }
    }

    #[test]
    fn scheduled_command_fires_exactly_at_due_time(
        start in 0..1000u64,
        delay in 0..1000u64,
        step in 1..50u64,
    ) {
        let mut tracker = ConnStateTracker::new();
        tracker.advance(start);
        tracker.schedule("RETR", delay);
        let due = start + delay;
        while tracker.clock() < due {
            prop_assert!(!tracker.scheduler().is_released());
            tracker.advance(step.min(due - tracker.clock()));
        }
        tracker.advance(0);
        prop_assert!(tracker.scheduler().is_released());
    }

    #[test]
    fn disconnect_keeps_only_persisting(persisting in any::<bool>(), delay in 1..500u64) {
        let mut tracker = ConnStateTracker::new();
        tracker.schedule_command("reconnect", delay, Some(1), persisting);
        tracker.mark_disconnected();
        prop_assert_eq!(tracker.scheduler().is_active(), persisting);
    }
}

#[test]
fn lock_is_allowed_while_listing() {
    // a listing may overlap with reserving the next transfer slot
    let mut tracker = ConnStateTracker::new();
    tracker.begin_passive_list(TransferMonitorId(2), false);
    assert!(tracker.can_lock_for_transfer());
    tracker.lock_for_transfer(TransferMonitorId(1), Direction::Download);
    assert!(tracker.is_list_locked());
    assert!(tracker.is_transfer_locked());
    tracker.finish_transfer();
    assert!(tracker.is_transfer_locked());
    assert!(!tracker.has_file_transfer());
    assert!(!tracker.is_list_locked());
}
