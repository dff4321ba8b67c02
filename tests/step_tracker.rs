//! Step Tracker Integration Tests
//!
//! The completed count must agree with a full recount after every update,
//! whatever the server sends and in whatever order.

use icm_console::domain::{Step, StepChange, StepStatus};
use icm_console::StepTracker;
use proptest::prelude::*;
use proptest::test_runner::Config;

const IDS: [&str; 5] = ["import_siebel_data", "calculating", "publish", "cleanup", ""];

const STATUSES: [Option<StepStatus>; 5] = [
    None,
    Some(StepStatus::Pending),
    Some(StepStatus::InProgress),
    Some(StepStatus::Completed),
    Some(StepStatus::Error),
];

#[derive(Debug, Clone)]
enum Op {
    Update(StepChange),
    Reset,
    Initialize,
}

fn change_strategy() -> impl Strategy<Value = StepChange> {
    (
        prop::sample::select(IDS.to_vec()),
        prop::option::of(Just("Renamed")),
        prop::sample::select(STATUSES.to_vec()),
        prop::option::of(Just("working")),
    )
        .prop_map(|(id, name, status, message)| StepChange {
            step_id: id.to_string(),
            step_name: name.map(str::to_string),
            status,
            message: message.map(str::to_string),
            time: None,
        })
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        18 => change_strategy().prop_map(Op::Update),
        1 => Just(Op::Reset),
        1 => Just(Op::Initialize),
    ]
}

fn apply(tracker: &mut StepTracker, op: Op) {
    match op {
        Op::Update(change) => {
            tracker.update(change);
        }
        Op::Reset => tracker.reset(),
        Op::Initialize => tracker.initialize(vec![
            Step::new("calculating", "Processing Calculations").with_status(StepStatus::Completed),
            Step::new("publish", "Publishing").with_status(StepStatus::Error),
        ]),
    }
}

proptest! {
    #![proptest_config(Config::with_cases(256))]
    #[test]
    fn test_completed_count_matches_recount(
        seeded in any::<bool>(),
        ops in prop::collection::vec(op_strategy(), 0..60)
    ) {
        let mut tracker = if seeded {
            StepTracker::with_template()
        } else {
            StepTracker::new()
        };

        for op in ops {
            apply(&mut tracker, op);
            prop_assert_eq!(tracker.completed_count(), tracker.recount());
        }
    }

    #[test]
    fn test_reset_always_yields_two_pending_steps(
        changes in prop::collection::vec(change_strategy(), 0..25)
    ) {
        let mut tracker = StepTracker::new();
        for change in changes {
            tracker.update(change);
        }

        tracker.reset();

        prop_assert_eq!(tracker.len(), 2);
        prop_assert!(tracker.steps().iter().all(|s| s.status == StepStatus::Pending));
        prop_assert_eq!(tracker.completed_count(), 0);
    }
}

#[test]
fn test_unseeded_pending_update_appends() {
    let mut tracker = StepTracker::new();

    tracker.update(StepChange::new("cleanup", StepStatus::Pending));

    assert_eq!(tracker.len(), 1);
    assert_eq!(tracker.get("cleanup").unwrap().status, StepStatus::Pending);
    assert_eq!(tracker.completed_count(), 0);
}

#[test]
fn test_resending_an_id_merges() {
    let mut tracker = StepTracker::with_template();

    tracker.update(StepChange::new("calculating", StepStatus::InProgress).with_message("10/200"));
    tracker.update(StepChange::new("calculating", StepStatus::Completed));

    assert_eq!(tracker.len(), 2);
    let step = tracker.get("calculating").unwrap();
    assert_eq!(step.status, StepStatus::Completed);
    assert_eq!(step.message, "10/200");
    assert_eq!(step.step_name, "Processing Calculations");
    assert_eq!(tracker.progress_label(), "1 / 2");
}
