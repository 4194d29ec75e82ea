//! On-device storage backed by SQLite

pub mod init;
pub mod local_storage;

pub use init::*;
pub use local_storage::*;
