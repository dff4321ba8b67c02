//! Toast Manager Integration Tests
//!
//! Live-toast cap, eviction order, idempotent close and two-phase removal.

use std::time::Duration;

use icm_console::core::{Scheduler, TimerFired};
use icm_console::notify::{Lifecycle, ToastId, ToastManager, ToastSpec};
use tokio::sync::mpsc::UnboundedReceiver;

fn manager() -> (ToastManager, UnboundedReceiver<TimerFired>) {
    let (scheduler, rx) = Scheduler::channel();
    (ToastManager::new(scheduler), rx)
}

fn show(toasts: &mut ToastManager, n: usize) -> Vec<ToastId> {
    (0..n)
        .map(|i| toasts.show(ToastSpec::info(format!("toast {i}"), "")))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_never_more_than_five_live() {
    let (mut toasts, _rx) = manager();

    for i in 0..12 {
        toasts.show(ToastSpec::info(format!("toast {i}"), "").sticky());
        assert!(toasts.live_count() <= 5, "after {} shows", i + 1);
    }
    assert_eq!(toasts.live_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_sixth_toast_evicts_exactly_the_oldest_live() {
    let (mut toasts, _rx) = manager();
    let ids = show(&mut toasts, 5);

    let sixth = toasts.show(ToastSpec::warning("sixth", ""));

    assert_eq!(toasts.get(ids[0]).unwrap().lifecycle, Lifecycle::Exiting);
    for id in &ids[1..] {
        assert!(toasts.get(*id).unwrap().is_live());
    }
    assert!(toasts.get(sixth).unwrap().is_live());
    assert_eq!(toasts.live_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_eviction_skips_toasts_already_exiting() {
    let (mut toasts, _rx) = manager();
    let ids = show(&mut toasts, 5);
    toasts.close(ids[0]);

    // Room for one more without evicting anything
    toasts.show(ToastSpec::info("fifth live", ""));
    assert!(toasts.get(ids[1]).unwrap().is_live());

    // The next one evicts ids[1], the oldest still live
    toasts.show(ToastSpec::info("sixth live", ""));
    assert_eq!(toasts.get(ids[1]).unwrap().lifecycle, Lifecycle::Exiting);
    assert!(toasts.get(ids[2]).unwrap().is_live());
}

#[tokio::test(start_paused = true)]
async fn test_close_twice_is_a_noop() {
    let (mut toasts, mut rx) = manager();
    let id = toasts.show(ToastSpec::error("Process Error", "boom").sticky());

    toasts.close(id);
    let after_first = toasts.toasts().to_vec();
    toasts.close(id);
    assert_eq!(toasts.toasts(), after_first.as_slice());

    // Exactly one exit window fires
    let fired = rx.recv().await.unwrap();
    assert!(toasts.on_timer(&fired));
    assert!(toasts.get(id).is_none());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(rx.try_recv().is_err());

    // Closing a removed toast is also a no-op
    toasts.close(id);
    assert!(toasts.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_auto_dismiss_is_two_phase() {
    let (mut toasts, mut rx) = manager();
    let start = tokio::time::Instant::now();
    let id = toasts.show(ToastSpec::success("Process Completed", "").with_duration(Duration::from_millis(10000)));

    let fired = rx.recv().await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_millis(10000));
    toasts.on_timer(&fired);
    assert_eq!(toasts.get(id).unwrap().lifecycle, Lifecycle::Exiting);

    let fired = rx.recv().await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_millis(10300));
    toasts.on_timer(&fired);
    assert!(toasts.get(id).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_clear_all_removes_everything() {
    let (mut toasts, mut rx) = manager();
    show(&mut toasts, 3);
    toasts.show(ToastSpec::processing("Generating", "report"));

    toasts.clear_all();
    assert_eq!(toasts.live_count(), 0);

    while !toasts.is_empty() {
        let fired = rx.recv().await.unwrap();
        toasts.on_timer(&fired);
    }
}
