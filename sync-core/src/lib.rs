//! # sync-core
//!
//! Pure logic for treesync (no I/O, instant tests).
//!
//! This crate implements the ordering scheme, name transform, change buffer
//! and session state machine without any network or disk I/O, enabling fast
//! unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The directory, transactions and the coordinator live in `sync-client`,
//! which feeds events into these types and interprets the actions they produce.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod naming;
pub mod ordinal;
pub mod state;

pub use buffer::{ChangeReorderBuffer, TreeLookup};
pub use naming::{from_server_name, to_server_name, DEFAULT_NAME_FOR_NEW_NODES};
pub use ordinal::{Ordinal, OrdinalError};
pub use state::{Action, Event, Phase, SessionState, SyncerSnapshot};
