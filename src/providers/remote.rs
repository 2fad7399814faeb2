//! HTTP implementation of the remote chat backend

use crate::config::ProviderConfig;
use crate::error::{ChatVaultError, Result};
use crate::providers::base::{
    GenerateRequest, GenerateResponse, Provider, RemoteConversation,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// HTTP provider speaking the backend's JSON API
///
/// Endpoints: `POST /generate`, `POST /stop`, and `/conversations` CRUD.
pub struct RemoteProvider {
    client: Client,
    config: ProviderConfig,
}

impl RemoteProvider {
    /// Create a provider from configuration
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    ///
    /// # Examples
    ///
    /// ```
    /// use chatvault::config::ProviderConfig;
    /// use chatvault::providers::RemoteProvider;
    ///
    /// let provider = RemoteProvider::new(ProviderConfig::default());
    /// assert!(provider.is_ok());
    /// ```
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("chatvault/0.2.0")
            .build()
            .map_err(|e| {
                ChatVaultError::Provider(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!(
            "Initialized remote provider: api_base={}, model={}",
            config.api_base,
            config.model
        );

        Ok(Self { client, config })
    }

    /// The configured model selector
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl Provider for RemoteProvider {
    async fn generate(
        &self,
        request: &GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerateResponse> {
        let call = self
            .request(self.client.post(self.endpoint("generate")))
            .json(request)
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Generation request aborted by caller");
                return Err(ChatVaultError::Provider("generation cancelled".to_string()).into());
            }
            result = call => result.map_err(|e| {
                ChatVaultError::Provider(format!("Generation request failed: {}", e))
            })?,
        };

        if !response.status().is_success() {
            return Err(ChatVaultError::Provider(format!(
                "Backend returned {} for generate",
                response.status()
            ))
            .into());
        }

        let generated: GenerateResponse = response.json().await.map_err(|e| {
            ChatVaultError::Provider(format!("Malformed generation response: {}", e))
        })?;

        Ok(generated)
    }

    async fn stop(&self) -> Result<()> {
        // Best-effort: failure to reach the stop endpoint is logged, never
        // surfaced (the local abort already happened).
        match self
            .request(self.client.post(self.endpoint("stop")))
            .send()
            .await
        {
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Stop notification failed: {}", e);
            }
        }
        Ok(())
    }

    async fn create_conversation(&self, title: &str) -> Result<String> {
        #[derive(serde::Serialize)]
        struct CreateRequest<'a> {
            title: &'a str,
        }

        #[derive(serde::Deserialize)]
        struct CreateResponse {
            id: String,
        }

        let response = self
            .request(self.client.post(self.endpoint("conversations")))
            .json(&CreateRequest { title })
            .send()
            .await
            .map_err(|e| {
                ChatVaultError::Provider(format!("Conversation create failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(ChatVaultError::Provider(format!(
                "Backend returned {} for conversation create",
                response.status()
            ))
            .into());
        }

        let created: CreateResponse = response.json().await.map_err(|e| {
            ChatVaultError::Provider(format!("Malformed create response: {}", e))
        })?;

        Ok(created.id)
    }

    async fn fetch_conversation(&self, id: &str) -> Result<Option<RemoteConversation>> {
        let response = self
            .request(
                self.client
                    .get(self.endpoint(&format!("conversations/{}", id))),
            )
            .send()
            .await
            .map_err(|e| ChatVaultError::Provider(format!("Conversation fetch failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(ChatVaultError::Provider(format!(
                "Backend returned {} for conversation fetch",
                response.status()
            ))
            .into());
        }

        let conversation: RemoteConversation = response.json().await.map_err(|e| {
            ChatVaultError::Provider(format!("Malformed conversation response: {}", e))
        })?;

        Ok(Some(conversation))
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        let response = self
            .request(
                self.client
                    .delete(self.endpoint(&format!("conversations/{}", id))),
            )
            .send()
            .await
            .map_err(|e| {
                ChatVaultError::Provider(format!("Conversation delete failed: {}", e))
            })?;

        // Deleting an already-absent conversation is fine.
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(ChatVaultError::Provider(format!(
                "Backend returned {} for conversation delete",
                response.status()
            ))
            .into());
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> RemoteProvider {
        let config = ProviderConfig {
            api_base: server.uri(),
            model: "test-model".to_string(),
            timeout_seconds: 5,
            auth_token: None,
        };
        RemoteProvider::new(config).expect("provider init failed")
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(body_json(json!({
                "prompt": "hello",
                "conversation_id": "c1",
                "model": "test-model"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "text": "hi there",
                "conversation_id": "c1"
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = GenerateRequest {
            prompt: "hello".to_string(),
            conversation_id: Some("c1".to_string()),
            model: Some("test-model".to_string()),
        };

        let response = provider
            .generate(&request, &CancellationToken::new())
            .await
            .expect("generate failed");

        assert_eq!(response.text, "hi there");
        assert_eq!(response.conversation_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_generate_server_error_surfaces_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = GenerateRequest {
            prompt: "hello".to_string(),
            conversation_id: None,
            model: None,
        };

        let result = provider.generate(&request, &CancellationToken::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_generate_cancellation_aborts_promptly() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"text": "slow"}))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = GenerateRequest {
            prompt: "hello".to_string(),
            conversation_id: None,
            model: None,
        };

        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_clone.cancel();
        });

        let start = std::time::Instant::now();
        let result = provider.generate(&request, &cancel).await;
        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_fetch_conversation_not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let result = provider
            .fetch_conversation("missing")
            .await
            .expect("fetch failed");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_fetch_conversation_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations/c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "c1",
                "messages": [
                    {"sender": "user", "text": "hi"},
                    {"sender": "bot", "text": "hello"}
                ]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let conversation = provider
            .fetch_conversation("c1")
            .await
            .expect("fetch failed")
            .expect("conversation missing");

        assert_eq!(conversation.id, "c1");
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[0].sender, "user");
    }

    #[tokio::test]
    async fn test_create_conversation_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "fresh"})))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let id = provider
            .create_conversation("New chat")
            .await
            .expect("create failed");
        assert_eq!(id, "fresh");
    }

    #[tokio::test]
    async fn test_delete_conversation_tolerates_absent() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/conversations/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        provider
            .delete_conversation("gone")
            .await
            .expect("delete should tolerate 404");
    }

    #[tokio::test]
    async fn test_stop_swallows_connection_errors() {
        let config = ProviderConfig {
            api_base: "http://127.0.0.1:1".to_string(),
            model: "m".to_string(),
            timeout_seconds: 1,
            auth_token: None,
        };
        let provider = RemoteProvider::new(config).expect("provider init failed");
        provider.stop().await.expect("stop must not error");
    }
}
