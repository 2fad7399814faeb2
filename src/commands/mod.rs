//! Command handlers for the ChatVault CLI
//!
//! Each submodule owns one top-level subcommand. Handlers open the storage
//! tiers at entry and inject them explicitly into whatever they drive.

pub mod chat;
pub mod history;
pub mod storage;
