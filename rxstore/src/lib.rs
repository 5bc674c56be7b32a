//! A reactive state store whose reducers may answer synchronously or asynchronously.
//!
//! A reducer maps `(previous state, action)` to a [`ReducerResult`]: a plain value, a future, a
//! stream, a [`Coroutine`] or a thunk driven through an [`Emitter`]. Every answer is normalized
//! into a [`StateStream`]; the [`ActionSequencer`] folds those streams, one action after the
//! other, into the single state feed of a [`Store`].
//!
//! ```no_run
//! use rxstore::{create_store, Action, Reducer};
//!
//! #[derive(Debug, Clone)]
//! enum Counter {
//!     Add(i64),
//!     Reset,
//! }
//!
//! impl Action for Counter {
//!     fn action_type(&self) -> &str {
//!         match self {
//!             Counter::Add(_) => "ADD",
//!             Counter::Reset => "RESET",
//!         }
//!     }
//! }
//!
//! # async fn example() -> Result<(), rxstore::StoreError> {
//! let store = create_store(
//!     Reducer::new(|state: i64, action: &Counter| match action {
//!         Counter::Add(value) => state + value,
//!         Counter::Reset => 0,
//!     }),
//!     0,
//! );
//! store.dispatch(Counter::Add(2));
//! assert_eq!(store.await_state().await?, 2);
//! # Ok(())
//! # }
//! ```
mod combinators;
mod config;
mod coroutine;
pub mod macros;
mod normalize;
mod record;
mod recovery;
mod reducer_result;
mod selectors;
mod sequencer;
mod state_stream;
mod state_store;
mod store_combinators;
mod store_error;
mod stream_ext;

pub use combinators::*;
pub use config::*;
pub use coroutine::*;
pub use normalize::*;
pub use record::*;
pub use recovery::*;
pub use reducer_result::*;
pub use selectors::*;
pub use sequencer::*;
pub use state_stream::*;
pub use state_store::*;
pub use store_combinators::*;
pub use store_error::*;
pub use stream_ext::*;

#[cfg(test)]
mod unit_tests;

/// A value a store can hold. Equality decides which repeated states are dropped.
pub trait State: Clone + PartialEq + Send + Sync + 'static {}

/// A message describing an intended state transition.
pub trait Action: Clone + std::fmt::Debug + Send + Sync + 'static {
    /// The tag of this action, used for diagnostics.
    fn action_type(&self) -> &str;
}

macro_rules! impl_state {
    ($($ty:ty),* $(,)?) => {
        $(impl State for $ty {})*
    };
}

impl_state!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    String
);

impl<T: State> State for Option<T> {}

impl<T: State> State for Vec<T> {}

impl<T: State> State for std::sync::Arc<T> {}
