//! Cliente del modelo de visión multimodal (Ollama).
//!
//! Una sola petición por análisis: sin reintentos ni streaming. El único límite
//! de tiempo es el timeout configurado en el cliente HTTP.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AppConfig;
use crate::error::AnalysisError;

/// Modelo que recibe imagen + prompt y devuelve texto libre.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn complete(&self, image: &[u8], prompt: &str) -> Result<String, AnalysisError>;

    /// Comprueba si el servicio responde. Nunca falla: devuelve `false`.
    async fn health_check(&self) -> bool;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct OllamaVisionClient {
    base_url: String,
    model: String,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    images: Vec<String>, // base64
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaVisionClient {
    /// Construye el cliente a partir de la configuración.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(cfg.vision_timeout).build()?;
        Ok(Self {
            base_url: cfg.ollama_base_url.clone(),
            model: cfg.vision_model.clone(),
            client,
        })
    }

    fn build_request<'a>(&'a self, image: &[u8], prompt: &'a str) -> ChatRequest<'a> {
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(image);
        ChatRequest {
            model: &self.model,
            stream: false,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
                images: vec![image_b64],
            }],
        }
    }
}

#[async_trait]
impl VisionModel for OllamaVisionClient {
    async fn complete(&self, image: &[u8], prompt: &str) -> Result<String, AnalysisError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!("POST {url} (modelo {}, {} bytes de imagen)", self.model, image.len());

        let response = self
            .client
            .post(&url)
            .json(&self.build_request(image, prompt))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Transport(format!(
                "Ollama devolvió {status}: {body}"
            )));
        }

        let chat: ChatResponse = response.json().await?;
        Ok(chat.message.content)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> OllamaVisionClient {
        let cfg = AppConfig::from_lookup(|key| match key {
            "OLLAMA_BASE_URL" => Some("http://vision-host:11434/".to_string()),
            "OLLAMA_VISION_MODEL" => Some("llava:13b".to_string()),
            _ => None,
        })
        .unwrap();
        OllamaVisionClient::from_config(&cfg).unwrap()
    }

    #[test]
    fn takes_endpoint_and_model_from_config() {
        let client = test_client();
        assert_eq!(client.base_url, "http://vision-host:11434");
        assert_eq!(client.model_name(), "llava:13b");
    }

    #[test]
    fn chat_request_carries_prompt_and_base64_image() {
        let client = test_client();
        let request = client.build_request(b"abc", "describe");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llava:13b");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "describe");
        assert_eq!(json["messages"][0]["images"][0], "YWJj");
    }

    #[test]
    fn chat_response_tolerates_extra_fields() {
        let body = r#"{"model":"llava","created_at":"2024-01-01T00:00:00Z","message":{"role":"assistant","content":"{\"is_agricultural\": true}"},"done":true}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.message.content, r#"{"is_agricultural": true}"#);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let cfg = AppConfig::from_lookup(|key| match key {
            "OLLAMA_BASE_URL" => Some("http://127.0.0.1:1".to_string()),
            "VISION_TIMEOUT_SECS" => Some("2".to_string()),
            _ => None,
        })
        .unwrap();
        let client = OllamaVisionClient::from_config(&cfg).unwrap();
        let err = client.complete(b"img", "prompt").await.unwrap_err();
        assert!(matches!(err, AnalysisError::Transport(_)));
        assert!(!client.health_check().await);
    }
}
