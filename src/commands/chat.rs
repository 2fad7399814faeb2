//! Interactive chat command
//!
//! Wires the remote backend to the storage layer at the defined save
//! points: after each user input, after each completed (or failed)
//! generation, and on conversation switch. The usage monitor runs in the
//! background for the whole session.
//!
//! Ctrl-C during generation aborts the in-flight request, notifies the
//! backend out-of-band, and keeps whatever content was already persisted.

use crate::config::Config;
use crate::error::Result;
use crate::providers::{GenerateRequest, Provider, RemoteProvider};
use crate::storage::{
    self, evictor, types, ChatMessage, DiskUsageEstimator, EvictionPolicy, Evictor, Sender,
    StorageManager,
};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Friendly message shown when the backend cannot be reached
const REMOTE_FAILURE_TEXT: &str = "Connection lost. Please check the backend and try again.";

/// Run the interactive chat session
pub async fn run_chat(
    config: Config,
    resume: Option<String>,
    model_override: Option<String>,
) -> Result<()> {
    let handles = storage::open(&config.storage)?;
    let manager = Arc::new(handles.manager);

    let estimator = DiskUsageEstimator::new(handles.blob.clone(), &handles.metadata_db_path);
    let evictor = Arc::new(Evictor::new(
        handles.blob.clone(),
        Box::new(estimator),
        EvictionPolicy::from(&config.storage),
    ));
    let monitor_cancel = CancellationToken::new();
    let monitor = evictor::spawn_monitor(
        evictor,
        config.storage.cleanup_interval(),
        monitor_cancel.clone(),
    );

    let mut provider_config = config.provider.clone();
    if let Some(model) = model_override {
        provider_config.model = model;
    }
    let provider = RemoteProvider::new(provider_config)?;

    let mut session = Session::resolve(&manager, &provider, resume).await?;
    session.print_history();

    println!(
        "{}",
        "Type a message, /new, /open <id>, /delete, or /quit.".dimmed()
    );

    let mut rl = DefaultEditor::new()
        .map_err(|e| crate::error::ChatVaultError::Config(format!("Readline init failed: {}", e)))?;

    loop {
        match rl.readline(&"you> ".bold().to_string()) {
            Ok(line) => {
                let input = line.trim().to_string();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&input);

                match input.as_str() {
                    "/quit" | "/exit" => break,
                    "/new" => {
                        session = Session::create(&manager, &provider).await?;
                        println!("{}", format!("New conversation {}", session.id).dimmed());
                    }
                    "/delete" => {
                        let old_id = session.id.clone();
                        if let Err(e) = manager.delete_conversation(&old_id) {
                            tracing::warn!("Local delete failed: {}", e);
                            println!("{}", "Could not delete from local storage.".yellow());
                        }
                        if let Err(e) = provider.delete_conversation(&old_id).await {
                            tracing::warn!("Remote delete failed: {}", e);
                        }
                        println!("{}", format!("Deleted conversation {}", old_id).dimmed());
                        session = Session::create(&manager, &provider).await?;
                    }
                    _ if input.starts_with("/open ") => {
                        let id = input.trim_start_matches("/open ").trim().to_string();
                        session = Session::resolve(&manager, &provider, Some(id)).await?;
                        session.print_history();
                    }
                    _ => {
                        session.send(&manager, &provider, &input).await?;
                    }
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                tracing::error!("Readline error: {}", e);
                break;
            }
        }
    }

    monitor_cancel.cancel();
    let _ = monitor.await;

    println!("{}", "Bye.".dimmed());
    Ok(())
}

/// One open conversation in the chat loop
struct Session {
    id: String,
    messages: Vec<ChatMessage>,
    model: Option<String>,
}

impl Session {
    /// Open a conversation: the requested one, else the last active one,
    /// else a fresh one
    ///
    /// Load is local-first; the backend is asked only when neither tier
    /// has the conversation.
    async fn resolve(
        manager: &Arc<StorageManager>,
        provider: &RemoteProvider,
        requested: Option<String>,
    ) -> Result<Self> {
        let id = requested.or_else(|| manager.last_conversation());

        let id = match id {
            Some(id) => id,
            None => return Session::create(manager, provider).await,
        };

        let mut messages = manager.load_messages(&id)?;
        if messages.is_empty() {
            match provider.fetch_conversation(&id).await {
                Ok(Some(remote)) => {
                    messages = remote
                        .messages
                        .into_iter()
                        .map(|m| m.into_message())
                        .collect();
                    if !messages.is_empty() {
                        persist_messages(manager, &id, &messages);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Remote conversation fetch failed: {}", e);
                }
            }
        }

        manager.set_last_conversation(&id);
        Ok(Self {
            id,
            messages,
            model: Some(provider.model().to_string()),
        })
    }

    /// Start a fresh conversation, preferring a backend-assigned id
    async fn create(manager: &Arc<StorageManager>, provider: &RemoteProvider) -> Result<Self> {
        let id = match provider.create_conversation("New chat").await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Remote conversation create failed, using local id: {}", e);
                types::new_conversation_id()
            }
        };

        manager.set_last_conversation(&id);
        Ok(Self {
            id,
            messages: Vec::new(),
            model: Some(provider.model().to_string()),
        })
    }

    /// Send one prompt: append + save, generate (cancellable), append the
    /// outcome + save
    async fn send(
        &mut self,
        manager: &Arc<StorageManager>,
        provider: &RemoteProvider,
        prompt: &str,
    ) -> Result<()> {
        self.messages.push(ChatMessage::user(prompt));
        persist_messages(manager, &self.id, &self.messages);

        let request = GenerateRequest {
            prompt: prompt.to_string(),
            conversation_id: Some(self.id.clone()),
            model: self.model.clone(),
        };

        let cancel = CancellationToken::new();
        let watcher_cancel = cancel.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                watcher_cancel.cancel();
            }
        });

        println!("{}", "thinking...".dimmed());
        let outcome = provider.generate(&request, &cancel).await;
        watcher.abort();

        match outcome {
            Ok(response) => {
                // The local id stays authoritative; a differing echo is
                // informational only.
                if let Some(echoed) = &response.conversation_id {
                    if echoed != &self.id {
                        tracing::debug!(
                            local = %self.id,
                            remote = %echoed,
                            "Backend echoed a different conversation id"
                        );
                    }
                }
                let message = response.into_message();
                print_message(&message);
                self.messages.push(message);
                persist_messages(manager, &self.id, &self.messages);
            }
            Err(_) if cancel.is_cancelled() => {
                // Partial content already flushed to storage stays intact.
                if let Err(e) = provider.stop().await {
                    tracing::warn!("Stop notification failed: {}", e);
                }
                println!("{}", "Generation stopped.".yellow());
            }
            Err(e) => {
                tracing::warn!("Generation failed: {}", e);
                let fallback = ChatMessage::bot(REMOTE_FAILURE_TEXT);
                print_message(&fallback);
                self.messages.push(fallback);
                persist_messages(manager, &self.id, &self.messages);
            }
        }

        Ok(())
    }

    /// Print the loaded history
    fn print_history(&self) {
        if self.messages.is_empty() {
            return;
        }
        println!(
            "{}",
            format!("Conversation {} ({} messages)", self.id, self.messages.len()).dimmed()
        );
        for message in &self.messages {
            print_message(message);
        }
    }
}

/// Persist the session's messages, degrading to in-memory state on failure
///
/// A storage tier going unavailable must never end the session: the error
/// is logged, the user gets one console line, and the loop keeps running
/// on the messages it already holds.
fn persist_messages(
    manager: &StorageManager,
    conversation_id: &str,
    messages: &[ChatMessage],
) -> bool {
    match manager.save_messages(conversation_id, messages) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                conversation_id = %conversation_id,
                "Conversation save failed, keeping session in memory: {}",
                e
            );
            println!(
                "{}",
                "Could not write to local storage; this conversation is kept in memory only."
                    .yellow()
            );
            false
        }
    }
}

fn print_message(message: &ChatMessage) {
    let label = match message.sender {
        Sender::User => "you> ".bold().to_string(),
        Sender::Bot => "bot> ".cyan().bold().to_string(),
    };
    println!("{}{}", label, message.text.trim_end());
    if !message.images.is_empty() {
        println!("{}", format!("  [{} image(s)]", message.images.len()).dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BlobStore, MetadataStore};
    use tempfile::tempdir;

    fn create_test_manager() -> (Arc<StorageManager>, Arc<BlobStore>, tempfile::TempDir) {
        let dir = tempdir().expect("failed to create tempdir");
        let blob = Arc::new(BlobStore::open(dir.path().join("blobs")).expect("blob open failed"));
        let metadata =
            MetadataStore::open(dir.path().join("metadata.db")).expect("metadata open failed");
        (
            Arc::new(StorageManager::new(blob.clone(), metadata)),
            blob,
            dir,
        )
    }

    #[test]
    fn test_persist_messages_round_trips() {
        let (manager, _blob, _dir) = create_test_manager();
        let messages = vec![ChatMessage::user("hello")];

        assert!(persist_messages(&manager, "c1", &messages));
        assert_eq!(manager.load_messages("c1").expect("load failed").len(), 1);
    }

    #[test]
    fn test_persist_messages_contains_storage_failure() {
        let (manager, blob, _dir) = create_test_manager();
        // An unreadable stored record makes the conversation write fail
        blob.insert_raw_conversation("c1", b"not json");

        let messages = vec![ChatMessage::user("hello"), ChatMessage::bot("hi")];

        // The failure is reported, never propagated; the caller keeps its
        // in-memory messages
        assert!(!persist_messages(&manager, "c1", &messages));
        assert_eq!(messages.len(), 2);
    }
}
