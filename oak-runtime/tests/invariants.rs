//! The handful of universally-quantified invariants from the run loop's
//! contract that don't fit naturally into `scenarios.rs`: proxy reuse,
//! terminal-initial-state handling, and re-arming-vs-cancel under a delayed
//! timer effect.

use oak_core::test_support::VecSubject;
use oak_core::{Clock, Effect, OakError, Proxy, Transducer, UpdateResult};
use oak_runtime::run;
use std::sync::Arc;
use std::time::Duration;

struct NoopTransducer;

impl Transducer for NoopTransducer {
    type State = ();
    type Event = ();
    type Output = ();
    type Env = ();

    fn update(&self, _state: &mut (), _event: ()) -> UpdateResult<(), (), ()> {
        UpdateResult::output(())
    }

    fn is_terminal(&self, _state: &()) -> bool {
        false
    }
}

#[tokio::test]
async fn reusing_a_bound_proxy_fails_and_never_starts_a_second_run() {
    let proxy = Proxy::<()>::buffered_default();

    // Simulate a run already in flight: `bind` is the first thing `run`
    // does, synchronously, before awaiting anything, so binding it directly
    // here is equivalent to (and deterministic unlike racing) a concurrent
    // first call to `run`.
    let _consumer = proxy.bind().unwrap();

    let second = run(NoopTransducer, (), proxy.clone(), (), VecSubject::<()>::new()).await;
    assert!(matches!(second, Err(OakError::ProxyAlreadyInUse)));
}

struct AlreadyTerminal;

impl Transducer for AlreadyTerminal {
    type State = i32;
    type Event = ();
    type Output = i32;
    type Env = ();

    fn update(&self, state: &mut i32, _event: ()) -> UpdateResult<(), (), i32> {
        UpdateResult::output(*state)
    }

    fn is_terminal(&self, _state: &i32) -> bool {
        true
    }

    fn initial_output(&self, state: &i32) -> Option<i32> {
        Some(*state)
    }
}

#[tokio::test]
async fn terminal_initial_state_with_initial_output_returns_it_without_consuming_events() {
    let proxy = Proxy::<()>::buffered_default();
    let result = run(AlreadyTerminal, 42, proxy, (), VecSubject::<i32>::new())
        .await
        .unwrap();
    assert_eq!(result, 42);
}

struct AlreadyTerminalNoOutput;

impl Transducer for AlreadyTerminalNoOutput {
    type State = ();
    type Event = ();
    type Output = ();
    type Env = ();

    fn update(&self, _state: &mut (), _event: ()) -> UpdateResult<(), (), ()> {
        UpdateResult::output(())
    }

    fn is_terminal(&self, _state: &()) -> bool {
        true
    }
}

#[tokio::test]
async fn terminal_initial_state_without_initial_output_is_no_output_produced() {
    let proxy = Proxy::<()>::buffered_default();
    let result = run(
        AlreadyTerminalNoOutput,
        (),
        proxy,
        (),
        VecSubject::<()>::new(),
    )
    .await;
    assert!(matches!(result, Err(OakError::NoOutputProduced)));
}

#[derive(Debug, Clone, Copy)]
enum ArmEvent {
    Arm,
}

/// A transducer that arms a delayed event under id `"timer"` and never
/// reacts to it (the test cancels the task before the delay elapses).
struct Armer {
    clock: Arc<dyn Clock>,
}

impl Transducer for Armer {
    type State = ();
    type Event = ArmEvent;
    type Output = ();
    type Env = ();

    fn update(&self, _state: &mut (), _event: ArmEvent) -> UpdateResult<ArmEvent, (), ()> {
        UpdateResult::with_effect(
            (),
            Effect::event_after_with_id(
                "timer",
                ArmEvent::Arm,
                Duration::from_secs(3600),
                None,
                self.clock.clone(),
            ),
        )
    }

    fn is_terminal(&self, _state: &()) -> bool {
        false
    }
}

#[tokio::test]
async fn cancelling_a_delayed_event_before_its_deadline_produces_no_event() {
    let clock: Arc<dyn Clock> = Arc::new(oak_core::SystemClock);
    let proxy = Proxy::<ArmEvent>::buffered_default();
    let input = proxy.input();
    let subject = Arc::new(VecSubject::<()>::new());

    let handle = tokio::spawn(run(
        Armer {
            clock: clock.clone(),
        },
        (),
        proxy.clone(),
        (),
        subject.clone(),
    ));

    input.send(ArmEvent::Arm).await.unwrap();
    tokio::task::yield_now().await;

    proxy.cancel();
    let result = handle.await.unwrap();
    assert!(matches!(result, Err(error) if error.is_cancellation()));
    // Exactly one send (from the initial `Arm` event's own cycle); the
    // delayed re-arm never fires because the whole run is cancelled first.
    assert_eq!(subject.snapshot().len(), 1);
}
