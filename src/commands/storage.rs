//! Storage maintenance commands

use crate::cli::StorageCommand;
use crate::config::Config;
use crate::error::Result;
use crate::storage::{self, DiskUsageEstimator, EvictionPolicy, Evictor, UsageEstimator};
use colored::Colorize;
use prettytable::{format, Table};

fn format_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// Handle storage commands
pub fn handle_storage(config: &Config, command: StorageCommand) -> Result<()> {
    let handles = storage::open(&config.storage)?;
    let estimator = DiskUsageEstimator::new(handles.blob.clone(), &handles.metadata_db_path);

    match command {
        StorageCommand::Stats => {
            let stats = handles.manager.storage_stats()?;

            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
            table.add_row(prettytable::row!["Conversations", stats.conversation_count]);
            table.add_row(prettytable::row!["Images", stats.image_count]);
            table.add_row(prettytable::row![
                "Image payload",
                format_mb(stats.total_image_size_bytes)
            ]);

            match estimator.estimate() {
                Some(estimate) => {
                    table.add_row(prettytable::row!["On disk", format_mb(estimate.used)]);
                }
                None => {
                    table.add_row(prettytable::row!["On disk", "unavailable"]);
                }
            }
            table.add_row(prettytable::row![
                "High-water mark",
                format_mb(config.storage.high_water_mark_bytes)
            ]);
            table.add_row(prettytable::row![
                "Low-water mark",
                format_mb(config.storage.low_water_mark_bytes)
            ]);

            println!("\nStorage:");
            table.printstd();
            println!();
        }
        StorageCommand::Cleanup => {
            let evictor = Evictor::new(
                handles.blob.clone(),
                Box::new(estimator),
                EvictionPolicy::from(&config.storage),
            );

            let report = evictor.auto_cleanup()?;
            if report.blobs_deleted == 0 {
                println!("{}", "Nothing to evict; storage usage is healthy.".green());
            } else {
                println!(
                    "{}",
                    format!(
                        "Evicted {} images from {} conversations, freed {}. Text kept.",
                        report.blobs_deleted,
                        report.conversations_swept,
                        format_mb(report.bytes_freed)
                    )
                    .green()
                );
            }
        }
    }

    Ok(())
}
