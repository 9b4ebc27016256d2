//! # statelink store
//!
//! The state-container boundary used by both sides of a link.
//!
//! The replication subsystem only needs three things from a host container:
//! `get_state`, `dispatch` and `subscribe`. [`StateContainer`] names that
//! capability and [`Store`] is a reducer-driven, in-memory implementation of it.
//!
//! ```
//! use statelink_store::{Action, StateContainer, Store};
//! use serde_json::{json, Value};
//!
//! let store = Store::new(
//!     |state: &Value, action: &Action| match action.kind.as_str() {
//!         "increment" => Some(json!({"count": state["count"].as_i64().unwrap_or(0) + 1})),
//!         _ => None,
//!     },
//!     json!({"count": 0}),
//! );
//!
//! store.dispatch(Action::new("increment"));
//! assert_eq!(*store.get_state(), json!({"count": 1}));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod action;
mod store;

pub use action::Action;
pub use store::{Listener, Reducer, StateContainer, Store, SubscriptionId};
