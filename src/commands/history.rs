//! Conversation history commands

use crate::cli::HistoryCommand;
use crate::config::Config;
use crate::error::Result;
use crate::storage;
use colored::Colorize;
use prettytable::{format, Table};

/// Handle history commands
pub fn handle_history(config: &Config, command: HistoryCommand) -> Result<()> {
    let handles = storage::open(&config.storage)?;
    let manager = handles.manager;

    match command {
        HistoryCommand::List => {
            let conversations = manager.list_conversations()?;

            if conversations.is_empty() {
                println!("{}", "No conversation history found.".yellow());
                return Ok(());
            }

            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

            table.add_row(prettytable::row![
                "ID".bold(),
                "Messages".bold(),
                "Images".bold(),
                "Last Updated".bold()
            ]);

            for conversation in conversations {
                let id_short = short_id(&conversation.id);
                let image_refs: usize = conversation
                    .messages
                    .iter()
                    .map(|m| m.image_ids.len())
                    .sum();
                let updated = conversation.updated_at.format("%Y-%m-%d %H:%M").to_string();

                table.add_row(prettytable::row![
                    id_short.cyan(),
                    conversation.messages.len(),
                    image_refs,
                    updated
                ]);
            }

            println!("\nConversation History:");
            table.printstd();
            println!();
            println!(
                "Use {} to resume a conversation.",
                "chatvault chat --resume <ID>".cyan()
            );
            println!();
        }
        HistoryCommand::Delete { id } => {
            manager.delete_conversation(&id)?;
            println!("{}", format!("Deleted conversation {}", id).green());
        }
        HistoryCommand::Clear => {
            manager.clear_all()?;
            println!("{}", "All conversations and images deleted.".green());
        }
    }

    Ok(())
}

/// Shorten an id for table display
///
/// Ids are opaque strings and may come from the backend or user input, so
/// truncation counts characters, never bytes.
fn short_id(id: &str) -> String {
    if id.chars().count() > 12 {
        let truncated: String = id.chars().take(12).collect();
        format!("{}...", truncated)
    } else {
        id.to_string()
    }
}
