mod common;
use common::*;

use std::time::{Duration, Instant};

use fronius_bridge::watchdog::{IdleEvent, ReadAction, Watchdog, EMPTY_READ_PAUSE};

const PERIOD: Duration = Duration::from_secs(60);

fn watchdog(fake: bool) -> (Watchdog, Instant) {
    common_setup();
    let start = Instant::now();
    (Watchdog::new(PERIOD, fake, start), start)
}

#[test]
fn nothing_due_before_the_deadline() {
    let (mut dog, start) = watchdog(false);

    assert_eq!(dog.poll(start + PERIOD - Duration::from_millis(1)), None);
    assert_eq!(dog.deadline(), start + PERIOD);
    assert!(dog.is_online());
}

#[test]
fn no_data_is_reported_once_per_silence() {
    let (mut dog, start) = watchdog(false);

    assert_eq!(dog.poll(start + PERIOD), Some(IdleEvent::NoData));
    assert!(!dog.is_online());

    for n in 2..6 {
        assert_eq!(dog.poll(start + PERIOD * n), Some(IdleEvent::StillSilent));
    }
    assert!(!dog.is_online());
}

#[test]
fn data_rearms_the_warning() {
    let (mut dog, start) = watchdog(false);
    assert_eq!(dog.poll(start + PERIOD), Some(IdleEvent::NoData));

    let back = start + PERIOD + Duration::from_secs(5);
    assert_eq!(dog.read(7, back), ReadAction::Process);
    assert!(dog.is_online());
    assert_eq!(dog.deadline(), back + PERIOD);

    assert_eq!(dog.poll(back + PERIOD), Some(IdleEvent::NoData));
    assert_eq!(dog.poll(back + PERIOD * 2), Some(IdleEvent::StillSilent));
}

#[test]
fn steady_data_keeps_pushing_the_deadline() {
    let (mut dog, start) = watchdog(false);

    for n in 1..10 {
        let at = start + Duration::from_secs(30 * n);
        assert_eq!(dog.read(1, at), ReadAction::Process);
        assert_eq!(dog.poll(at), None);
    }
    assert!(dog.is_online());
}

#[test]
fn empty_read_pauses_without_counting_as_data() {
    let (mut dog, start) = watchdog(false);

    let at = start + Duration::from_secs(59);
    assert_eq!(dog.read(0, at), ReadAction::Pause(EMPTY_READ_PAUSE));
    assert_eq!(dog.deadline(), start + PERIOD);

    assert_eq!(dog.poll(start + PERIOD), Some(IdleEvent::NoData));
    assert_eq!(dog.read(0, start + PERIOD), ReadAction::Pause(EMPTY_READ_PAUSE));
    assert!(!dog.is_online());
}

#[test]
fn fake_mode_sends_a_line_every_period() {
    let (mut dog, start) = watchdog(true);

    for n in 1..5 {
        assert_eq!(dog.poll(start + PERIOD * n - Duration::from_secs(1)), None);
        assert_eq!(dog.poll(start + PERIOD * n), Some(IdleEvent::FakeData));
        assert_eq!(dog.deadline(), start + PERIOD * (n + 1));
    }
    assert!(dog.is_online());
}
