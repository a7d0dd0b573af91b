pub mod auction;
pub mod clock;
pub mod config;
pub mod coordination;
pub mod error;
pub mod handlers;
pub mod storage;

pub use error::{StorageError, StorageResult};
