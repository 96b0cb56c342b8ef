//! A self re-arming timer, exercised under paused virtual time so the
//! test advances the clock deterministically instead of sleeping for real.

use oak_core::test_support::VecSubject;
use oak_core::{Clock, Effect, Proxy, SystemClock, Transducer, UpdateResult};
use oak_runtime::run;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerEvent {
    Start,
    Tick,
    Stop,
}

struct EchoTimerState {
    ticks: u32,
    stopped: bool,
}

/// Arms a "t"-tagged timer on `Start`, re-arms it on every `Tick`, and
/// cancels it on `Stop` (transitioning terminal at the same time).
struct EchoTimer {
    clock: Arc<dyn Clock>,
}

impl Transducer for EchoTimer {
    type State = EchoTimerState;
    type Event = TimerEvent;
    type Output = u32;
    type Env = ();

    fn update(
        &self,
        state: &mut EchoTimerState,
        event: TimerEvent,
    ) -> UpdateResult<TimerEvent, (), u32> {
        match event {
            TimerEvent::Start => UpdateResult::with_effect(state.ticks, self.arm()),
            TimerEvent::Tick => {
                state.ticks += 1;
                UpdateResult::with_effect(state.ticks, self.arm())
            }
            TimerEvent::Stop => {
                state.stopped = true;
                UpdateResult::with_effect(state.ticks, Effect::cancel_task("t"))
            }
        }
    }

    fn is_terminal(&self, state: &EchoTimerState) -> bool {
        state.stopped
    }
}

impl EchoTimer {
    fn arm(&self) -> Effect<TimerEvent, ()> {
        Effect::event_after_with_id(
            "t",
            TimerEvent::Tick,
            Duration::from_millis(10),
            None,
            self.clock.clone(),
        )
    }
}

#[tokio::test(start_paused = true)]
async fn timer_rearms_on_each_tick_and_stops_cleanly() {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let proxy = Proxy::buffered_default();
    let input = proxy.input();
    let subject = Arc::new(VecSubject::new());

    let handle = tokio::spawn(run(
        EchoTimer { clock },
        EchoTimerState {
            ticks: 0,
            stopped: false,
        },
        proxy,
        (),
        subject.clone(),
    ));

    input.send(TimerEvent::Start).await.unwrap();

    // Advance one period at a time so each re-arm has a chance to register
    // before the next jump, rather than relying on a single large jump to
    // cascade through every intermediate deadline on its own.
    for _ in 0..4 {
        tokio::time::advance(Duration::from_millis(10)).await;
        tokio::task::yield_now().await;
    }

    let ticks_before_stop = *subject.snapshot().last().unwrap();
    assert!(
        ticks_before_stop >= 3,
        "expected at least 3 ticks after 40ms, saw {ticks_before_stop}"
    );

    input.send(TimerEvent::Stop).await.unwrap();

    let result = handle.await.unwrap().unwrap();
    assert_eq!(result, ticks_before_stop);
}
