//! Command-line interface definition for ChatVault
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for chat, conversation history, and storage
//! maintenance.

use clap::{Parser, Subcommand};

/// ChatVault - Terminal AI chat client with tiered conversation storage
///
/// Chat with a remote AI backend while conversations are persisted
/// locally across a fast metadata tier and a blob tier, with automatic
/// LRU eviction of image payloads when disk usage crosses a threshold.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatvault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the storage data directory
    #[arg(long, env = "CHATVAULT_DATA_DIR")]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for ChatVault
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Resume a stored conversation by ID (defaults to the last active one)
        #[arg(short, long)]
        resume: Option<String>,

        /// Override the model selector from config
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Manage stored conversation history
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Inspect and maintain the storage tiers
    Storage {
        /// Storage subcommand
        #[command(subcommand)]
        command: StorageCommand,
    },
}

/// Conversation history subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List stored conversations
    List,

    /// Delete a conversation and all of its image blobs
    Delete {
        /// Conversation ID
        id: String,
    },

    /// Delete every stored conversation and image
    Clear,
}

/// Storage maintenance subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum StorageCommand {
    /// Show storage statistics for both tiers
    Stats,

    /// Run an eviction pass now, regardless of the timer
    Cleanup,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            storage_path: None,
            command: Commands::Chat {
                resume: None,
                model: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(cli.storage_path.is_none());

        if let Commands::Chat { resume, model } = cli.command {
            assert!(resume.is_none());
            assert!(model.is_none());
        } else {
            panic!("Expected default command to be Chat");
        }
    }

    #[test]
    fn test_parse_chat_with_resume() {
        let cli = Cli::parse_from(["chatvault", "chat", "--resume", "01ARZ3"]);
        if let Commands::Chat { resume, .. } = cli.command {
            assert_eq!(resume.as_deref(), Some("01ARZ3"));
        } else {
            panic!("Expected Chat command");
        }
    }

    #[test]
    fn test_parse_history_delete() {
        let cli = Cli::parse_from(["chatvault", "history", "delete", "abc123"]);
        match cli.command {
            Commands::History {
                command: HistoryCommand::Delete { id },
            } => assert_eq!(id, "abc123"),
            _ => panic!("Expected History Delete command"),
        }
    }

    #[test]
    fn test_parse_storage_cleanup() {
        let cli = Cli::parse_from(["chatvault", "storage", "cleanup"]);
        assert!(matches!(
            cli.command,
            Commands::Storage {
                command: StorageCommand::Cleanup
            }
        ));
    }

    #[test]
    fn test_parse_storage_path_flag() {
        let cli = Cli::parse_from(["chatvault", "--storage-path", "/tmp/cv", "storage", "stats"]);
        assert_eq!(cli.storage_path.as_deref(), Some("/tmp/cv"));
    }
}
