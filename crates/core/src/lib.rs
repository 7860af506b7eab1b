//! Map Reviews Core - Shared domain types.
//!
//! This crate provides the types exchanged with the reviews backend and
//! shared by every Map Reviews component:
//! - `client` - Session, HTTP gateway, collection synchronizers and search
//! - `cli` - Command-line front end over the client
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! Wire formats (snake_case JSON, Mongo-style `_id`) are handled here with
//! serde attributes so the client never deals with raw field names.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, ratings, entities and the error taxonomy

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
