//! # Unconference Poll Common Library
//!
//! Shared code for the unconference poll services including:
//! - Session catalog and vote model (categories, tallies, selections)
//! - Event types (PollEvent enum) and the EventBus
//! - Configuration loading and root folder resolution
//! - On-device key-value storage backed by SQLite
//! - Client identity generation

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod identity;
pub mod votes;

pub use catalog::{Catalog, Category, SessionId};
pub use error::{Error, Result};
pub use identity::ClientIdentity;
pub use votes::{Projection, ResultRow, Tally, UserSelection};
