//! ChatVault - Terminal AI chat client with tiered conversation storage
//!
//! This library provides the core functionality for ChatVault: the tiered
//! conversation store, the image codec, the usage-driven evictor, and the
//! remote backend abstraction.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `storage`: the two persistence tiers (rusqlite metadata, sled blobs),
//!   the image codec, the orchestrating manager, and the evictor
//! - `providers`: remote chat backend abstraction and HTTP implementation
//! - `commands`: chat, history, and storage command handlers
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use chatvault::{Config, StorageManager};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let handles = chatvault::storage::open(&config.storage)?;
//!     let messages = handles.manager.load_messages("some-conversation")?;
//!     println!("{} messages", messages.len());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod providers;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use error::{ChatVaultError, Result};
pub use providers::{Provider, RemoteProvider};
pub use storage::{ChatMessage, Evictor, ImageCodec, Sender, StorageManager};
