//! # statelink primary
//!
//! Primary side of a statelink link.
//!
//! This crate provides:
//! - The primary store enhancer (dispatch, diff, broadcast)
//! - The registry of open replica links
//! - Handling of full-sync requests and forwarded actions
//!
//! # Architecture
//!
//! The primary owns the authoritative state. After every dispatch it computes
//! the edits between the previously published tree and the new one and sends
//! them to every link as one `PATCH_STATE` message. A replica that asks for a
//! full sync gets a `SYNC_GLOBAL` snapshot on its own link only, and actions a
//! replica forwards as `DISPATCH_ACTION` are dispatched here like local ones.
//!
//! ```
//! use statelink_primary::{MockLink, PrimaryConfig, PrimaryStore};
//! use statelink_store::{Action, StateContainer, Store};
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! let primary = PrimaryStore::new(
//!     Store::new(
//!         |_: &Value, action: &Action| (action.kind == "reset").then(|| json!({"count": 0})),
//!         json!({"count": 5}),
//!     ),
//!     PrimaryConfig::default(),
//! );
//! let link = Arc::new(MockLink::new(1, "statelink"));
//! primary.connect(link.clone()).unwrap();
//!
//! primary.dispatch(Action::new("reset"));
//! assert_eq!(link.sent().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod fanout;
mod link;
mod store;

pub use config::{PrimaryConfig, DEFAULT_CHANNEL};
pub use error::{PrimaryError, PrimaryResult};
pub use fanout::{Fanout, FanoutStats};
pub use link::{LinkId, MockLink, PrimaryLink};
pub use store::PrimaryStore;
