//! # oak — a runtime for extended finite-state transducers
//!
//! Oak runs a client-defined transducer — a pure
//! `(state, event) -> (output, effect?)` update function over closed
//! `State`/`Event` alphabets — to a terminal state, mediating every event a
//! producer sends it, invoking the effects `update` returns, routing their
//! emitted events back into the machine, publishing outputs to a
//! [`Subject`], and guaranteeing orderly teardown on cancellation or error.
//!
//! This crate is a thin facade: [`oak_core`] defines the [`Transducer`]
//! contract, the [`Effect`] algebra, and the [`Proxy`]/[`Context`]
//! concurrency primitives; [`oak_runtime`] (behind the default `runtime`
//! feature) supplies [`run`]/[`run_with_storage`] and the [`ActorHandle`]
//! lifecycle wrapper. Import [`prelude`] for the pieces most transducers
//! need.
//!
//! ```no_run
//! use oak::prelude::*;
//!
//! struct Counter;
//!
//! impl Transducer for Counter {
//!     type State = i32;
//!     type Event = i32;
//!     type Output = i32;
//!     type Env = ();
//!
//!     fn update(&self, state: &mut i32, event: i32) -> UpdateResult<i32, (), i32> {
//!         *state += event;
//!         UpdateResult::output(*state)
//!     }
//!
//!     fn is_terminal(&self, state: &i32) -> bool {
//!         *state >= 3
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), OakError> {
//! let proxy = Proxy::buffered_default();
//! let input = proxy.input();
//! let handle = tokio::spawn(run(Counter, 0, proxy, (), NoopSubject::new()));
//! input.send(1).await?;
//! input.send(2).await?;
//! let total = handle.await.unwrap()?;
//! assert_eq!(total, 3);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub use oak_core;
#[cfg(feature = "runtime")]
pub use oak_runtime;

pub use oak_core::{
    ChannelSubject, Clock, Context, Effect, EffectArgs, EffectExec, EffectFn, EffectFuture,
    Input, NoopSubject, OakError, OakTaskPriority, Proxy, ProxyId, PureTransducer, PureUpdate,
    Storage, Subject, SystemClock, TaskId, TaskUid, Transducer, UpdateResult,
    DEFAULT_BUFFER_CAPACITY,
};
pub use oak_core::{LocalCell, SharedCell, WatchedCell};

#[cfg(feature = "runtime")]
pub use oak_runtime::{run, run_with_storage, ActorHandle, TransducerEffect};

#[cfg(feature = "test-support")]
pub use oak_core::test_support;

/// Happy-path imports for composing and running an Oak transducer.
///
/// ```
/// use oak::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Effect, Input, NoopSubject, OakError, Proxy, Storage, Subject, SystemClock, Transducer,
        UpdateResult,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{run, run_with_storage, ActorHandle};

    #[cfg(feature = "test-support")]
    pub use oak_core::test_support::{TestClock, VecSubject};
}
