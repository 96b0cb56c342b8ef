//! # oak-core — the effect algebra and run contract for extended
//! finite-state transducers
//!
//! This crate defines the small set of traits and types every Oak run is
//! built from: the pure [`Transducer`] contract, the [`Effect`] algebra it
//! may return, the [`Proxy`] that feeds it events, the [`Context`] that
//! tracks the managed tasks its effects spawn, and the three narrow seams
//! (`Clock`, `Storage`, `Subject`) the run loop in `oak-runtime` reaches
//! through for time, state, and output.
//!
//! ## The Pieces
//!
//! | Piece | Type | What it does |
//! |-------|------|---------------|
//! | Update contract | [`Transducer`] | Pure `(State, Event) -> (Output, Effect?)` |
//! | Effect algebra | [`Effect`] | What a cycle asks the run loop to do afterward |
//! | Event ingress | [`Proxy`] | Buffered or suspending event delivery |
//! | Task registry | [`Context`] | Tracks/cancels managed `Operation` tasks |
//! | State cell | [`Storage`] | Owned, shared, or watched state storage |
//! | Delay source | [`Clock`] | Injectable sleep, real or test-controlled |
//! | Output sink | [`Subject`] | One-way, suspending output delivery |
//!
//! ## Design Principle
//!
//! `update` never performs I/O and never suspends. Every place a run
//! touches the outside world — spawning work, sleeping, emitting output —
//! is named by an [`Effect`] variant and executed by `oak-runtime::run`,
//! not by the transducer itself. This is what makes a transducer testable
//! with nothing more than a plain function call.
//!
//! ## Error Handling
//!
//! All fallible operations across this crate and `oak-runtime` return
//! [`OakError`], a single `#[non_exhaustive]` enum rather than one error
//! type per module — there is exactly one protocol boundary here (the run
//! loop), so one error taxonomy is enough.

#![deny(missing_docs)]

pub mod clock;
pub mod context;
pub mod effect;
pub mod error;
pub mod id;
pub mod proxy;
pub mod storage;
pub mod subject;
pub mod transducer;

#[cfg(feature = "test-support")]
pub mod test_support;

pub use clock::{Clock, SystemClock};
pub use context::Context;
pub use effect::{Effect, EffectArgs, EffectExec, EffectFn, EffectFuture, OakTaskPriority};
pub use error::OakError;
pub use id::{ProxyId, TaskId, TaskUid};
pub use proxy::{Input, Proxy, DEFAULT_BUFFER_CAPACITY};
pub use storage::{LocalCell, SharedCell, Storage, WatchedCell};
pub use subject::{ChannelSubject, NoopSubject, Subject};
pub use transducer::{PureTransducer, PureUpdate, Transducer, UpdateResult};
