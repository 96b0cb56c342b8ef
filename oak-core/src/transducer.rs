//! The `Transducer` contract — the pure core every run wraps.
//!
//! `update` is a plain function from `(&mut State, Event)` to an output plus
//! an optional effect. It never performs I/O and never suspends; all
//! suspension lives in the `Effect` the run loop goes on to execute. This
//! split is what lets `oak-runtime::run` reason about terminal states,
//! cancellation, and backpressure without knowing anything about a
//! particular transducer's domain.

use crate::effect::Effect;

/// What one call to [`Transducer::update`] produces: the output for this
/// cycle, and optionally an effect for the run loop to execute afterward.
pub struct UpdateResult<Event, Env, Output> {
    /// The output to deliver to the run's `Subject` this cycle.
    pub output: Output,
    /// An effect to execute once this cycle's output has been handled.
    pub effect: Option<Effect<Event, Env>>,
}

impl<Event, Env, Output> UpdateResult<Event, Env, Output> {
    /// An output with no accompanying effect.
    pub fn output(output: Output) -> Self {
        Self {
            output,
            effect: None,
        }
    }

    /// An output paired with an effect.
    pub fn with_effect(output: Output, effect: Effect<Event, Env>) -> Self {
        Self {
            output,
            effect: Some(effect),
        }
    }
}

/// The pure core of a run: a state machine with effectful escape hatches.
///
/// Once [`Transducer::is_terminal`] returns `true` for the current state,
/// the run loop executes at most one more effect (if `update` returned
/// one), discards any events that effect emits, and stops drawing further
/// events from the proxy.
pub trait Transducer: Send + Sync {
    /// The transducer's own state type.
    type State: Send + 'static;
    /// The event type consumed from the bound proxy.
    type Event: Send + 'static;
    /// The value produced each cycle and delivered to the run's `Subject`.
    ///
    /// `Clone` is required because the run loop both sends each cycle's
    /// output to the `Subject` and retains it to return from `run` once
    /// the stream ends or the state goes terminal — whichever output was
    /// most recently produced is both delivered and returned.
    type Output: Send + Clone + 'static;
    /// The shared environment threaded through every effect closure.
    type Env: Send + Sync + 'static;

    /// Advance `state` by one `event`, producing this cycle's output and
    /// optionally an effect.
    fn update(
        &self,
        state: &mut Self::State,
        event: Self::Event,
    ) -> UpdateResult<Self::Event, Self::Env, Self::Output>;

    /// Whether `state` is terminal. Checked after every `update` call.
    fn is_terminal(&self, state: &Self::State) -> bool;

    /// An output to deliver before the first event is consumed, if any.
    /// Most transducers have nothing meaningful to emit before their first
    /// event and can rely on the default.
    fn initial_output(&self, _state: &Self::State) -> Option<Self::Output> {
        None
    }
}

/// A plain, total update function with no effects: `(&mut State, Event) ->
/// Output`.
///
/// Exists so trivial transducers (most unit tests, and plenty of real
/// ones — a pure counter, a parser with no side effects) don't have to
/// write out an `UpdateResult` and an unused `Env` by hand. Wrap one in
/// [`PureTransducer`] to get a full [`Transducer`] impl.
pub type PureUpdate<State, Event, Output> = fn(&mut State, Event) -> Output;

/// Adapts a [`PureUpdate`] function into a [`Transducer`] whose `Env` is
/// `()` and which never produces an effect.
pub struct PureTransducer<State, Event, Output> {
    update: PureUpdate<State, Event, Output>,
    is_terminal: fn(&State) -> bool,
}

impl<State, Event, Output> PureTransducer<State, Event, Output> {
    /// Wrap a pure update function and terminal-state predicate.
    pub fn new(update: PureUpdate<State, Event, Output>, is_terminal: fn(&State) -> bool) -> Self {
        Self {
            update,
            is_terminal,
        }
    }
}

impl<State, Event, Output> Transducer for PureTransducer<State, Event, Output>
where
    State: Send + 'static,
    Event: Send + 'static,
    Output: Send + Clone + 'static,
{
    type State = State;
    type Event = Event;
    type Output = Output;
    type Env = ();

    fn update(
        &self,
        state: &mut Self::State,
        event: Self::Event,
    ) -> UpdateResult<Self::Event, Self::Env, Self::Output> {
        UpdateResult::output((self.update)(state, event))
    }

    fn is_terminal(&self, state: &Self::State) -> bool {
        (self.is_terminal)(state)
    }
}
