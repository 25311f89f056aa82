//! # sync-types
//!
//! Shared types for the treesync engine.
//!
//! This crate provides the foundational types used across all treesync crates:
//! - [`Id`], [`MetaHandle`] - Entry identity (stable and process-local)
//! - [`WriterTag`] - Who produced a write transaction
//! - [`ChangeRecord`] - Ordered change-list entries delivered to observers
//! - [`AuthError`] - Authentication problems surfaced to observers
//! - [`SyncError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod auth;
mod change;
mod error;
mod ids;

pub use auth::{AuthError, AuthErrorState, CaptchaChallenge};
pub use change::{ChangeAction, ChangeRecord};
pub use error::SyncError;
pub use ids::{Id, MetaHandle, WriterTag};
