mod common;

use std::sync::Arc;
use std::thread;

use common::{Reply, ScriptedSource, ms, quote, wait_until};
use pulse_common::PulseError;
use pulse_feed::source::MockQuoteSource;
use pulse_feed::{ManualClock, Poller, SystemClock};

fn poller(source: &Arc<ScriptedSource>, clock: &ManualClock) -> Poller {
    Poller::new(source.clone(), Arc::new(clock.clone()))
}

#[test]
fn second_tick_replaces_first_quote() {
    let clock = ManualClock::new();
    let source = Arc::new(ScriptedSource::new(vec![
        Reply::ok(quote("TSLA", 200.0, 5.0, 2.56)),
        Reply::ok(quote("TSLA", 205.0, 10.0, 5.13)),
    ]));
    let handle = poller(&source, &clock).start("TSLA", ms(5_000)).unwrap();

    // first fetch does not wait for the interval
    assert!(wait_until(|| handle.snapshot().applied_seq == 1));
    let first = handle.quote().unwrap();
    assert_eq!(first.price, 200.0);
    assert_eq!(first.change_percent, 2.56);
    assert!(!handle.is_loading());

    clock.advance(ms(5_001));
    assert!(wait_until(|| handle.snapshot().applied_seq == 2));
    let second = handle.quote().unwrap();
    assert_eq!(second.price, 205.0);
    assert_eq!(second.change, 10.0);
    assert_eq!(source.calls(), 2);
}

#[test]
fn no_fetch_before_interval_elapses() {
    let clock = ManualClock::new();
    let source = Arc::new(ScriptedSource::new(vec![
        Reply::ok(quote("TSLA", 200.0, 5.0, 2.56)),
        Reply::ok(quote("TSLA", 205.0, 10.0, 5.13)),
    ]));
    let handle = poller(&source, &clock).start("TSLA", ms(5_000)).unwrap();
    assert!(wait_until(|| source.calls() == 1));

    clock.advance(ms(4_999));
    thread::sleep(ms(50));
    assert_eq!(source.calls(), 1);
    assert_eq!(handle.quote().unwrap().price, 200.0);
}

#[test]
fn failed_fetch_keeps_last_good_quote() {
    let clock = ManualClock::new();
    let source = Arc::new(ScriptedSource::new(vec![
        Reply::ok(quote("TSLA", 200.0, 5.0, 2.56)),
        Reply::err("upstream 500"),
    ]));
    let handle = poller(&source, &clock).start("TSLA", ms(1_000)).unwrap();
    assert!(wait_until(|| handle.snapshot().applied_seq == 1));

    clock.advance(ms(1_000));
    assert!(wait_until(|| handle.snapshot().applied_seq == 2));
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.quote.unwrap().price, 200.0);
    assert!(!snapshot.connected);
    assert!(snapshot.last_error.unwrap().contains("upstream 500"));
}

#[test]
fn slow_older_response_does_not_overwrite_newer_one() {
    let clock = ManualClock::new();
    let (slow, release_slow) = Reply::gated();
    let source = Arc::new(ScriptedSource::new(vec![slow, Reply::ok(quote("TSLA", 205.0, 10.0, 5.13))]));
    let handle = poller(&source, &clock).start("TSLA", ms(1_000)).unwrap();
    assert!(wait_until(|| source.calls() == 1));

    clock.advance(ms(1_000));
    assert!(wait_until(|| handle.snapshot().applied_seq == 2));

    release_slow.send(Ok(quote("TSLA", 200.0, 5.0, 2.56))).unwrap();
    thread::sleep(ms(100));
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.applied_seq, 2);
    assert_eq!(snapshot.quote.unwrap().price, 205.0);
}

#[test]
fn results_landing_after_stop_are_ignored() {
    let clock = ManualClock::new();
    let (slow, release_slow) = Reply::gated();
    let source = Arc::new(ScriptedSource::new(vec![slow]));
    let mut handle = poller(&source, &clock).start("TSLA", ms(1_000)).unwrap();
    assert!(wait_until(|| source.calls() == 1));

    handle.stop();
    assert!(!handle.is_active());
    let before = handle.snapshot();

    let _ = release_slow.send(Ok(quote("TSLA", 200.0, 5.0, 2.56)));
    clock.advance(ms(10_000));
    thread::sleep(ms(100));
    assert_eq!(handle.snapshot(), before);
    assert!(before.loading);
    assert!(before.quote.is_none());
    assert_eq!(source.calls(), 1);
}

#[test]
fn stopping_cancels_in_flight_fetch() {
    let clock = ManualClock::new();
    let source = Arc::new(ScriptedSource::new(vec![Reply::UntilCancelled]));
    let handle = poller(&source, &clock).start("TSLA", ms(1_000)).unwrap();
    assert!(wait_until(|| source.calls() == 1));

    drop(handle);
    assert!(wait_until(|| source.cancelled() == 1));
}

#[test]
fn new_symbol_resets_to_loading() {
    let clock = ManualClock::new();
    let source = Arc::new(ScriptedSource::new(vec![
        Reply::ok(quote("TSLA", 200.0, 5.0, 2.56)),
        Reply::ok(quote("AAPL", 190.0, 1.0, 0.53)),
    ]));
    let mut handle = poller(&source, &clock).start("TSLA", ms(1_000)).unwrap();
    assert!(wait_until(|| handle.snapshot().applied_seq == 1));

    handle.reconfigure("aapl", ms(2_000)).unwrap();
    assert_eq!(handle.symbol().as_str(), "AAPL");
    assert_eq!(handle.interval(), ms(2_000));
    assert!(wait_until(|| handle.quote().map(|q| q.symbol == "AAPL").unwrap_or(false)));
    assert_eq!(handle.snapshot().symbol, "AAPL");
}

#[test]
fn interval_change_keeps_displayed_quote() {
    let clock = ManualClock::new();
    let (slow, release_slow) = Reply::gated();
    let source = Arc::new(ScriptedSource::new(vec![Reply::ok(quote("TSLA", 200.0, 5.0, 2.56)), slow]));
    let mut handle = poller(&source, &clock).start("TSLA", ms(1_000)).unwrap();
    assert!(wait_until(|| handle.snapshot().applied_seq == 1));

    handle.reconfigure("TSLA", ms(3_000)).unwrap();
    let snapshot = handle.snapshot();
    assert!(!snapshot.loading);
    assert_eq!(snapshot.quote.unwrap().price, 200.0);

    release_slow.send(Ok(quote("TSLA", 202.0, 7.0, 3.59))).unwrap();
    assert!(wait_until(|| handle.quote().map(|q| q.price == 202.0).unwrap_or(false)));
}

#[test]
fn invalid_parameters_are_rejected() {
    let clock = ManualClock::new();
    let source = Arc::new(ScriptedSource::new(Vec::new()));
    let poller = poller(&source, &clock);
    assert!(matches!(poller.start("TSLA", ms(0)), Err(PulseError::InvalidInterval)));
    assert!(poller.start("not a symbol", ms(10)).is_err());

    let mut handle = poller.start("TSLA", ms(10)).unwrap();
    assert!(matches!(handle.reconfigure("TSLA", ms(0)), Err(PulseError::InvalidInterval)));
    // a rejected reconfigure leaves the running poller alone
    assert!(handle.is_active());
}

#[test]
fn polls_mock_source_on_wall_clock() {
    let poller = Poller::new(Arc::new(MockQuoteSource::new()), Arc::new(SystemClock));
    let handle = poller.start("NVDA", ms(20)).unwrap();
    assert!(wait_until(|| handle.snapshot().applied_seq >= 3));
    let snapshot = handle.snapshot();
    assert!(snapshot.connected);
    assert!(snapshot.quote.unwrap().is_consistent());
}
