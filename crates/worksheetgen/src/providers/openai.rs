//! OpenAI-compatible HTTP clients for the content and image services.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::prompt::{line_art_prompt, parse_spec_reply, worksheet_prompt};
use super::{ContentProvider, ImageProvider};
use crate::config::{ContentConfig, ImageConfig};
use crate::error::ProviderError;
use crate::model::{WorksheetRequest, WorksheetSpec};
use crate::sanitize::{redact_url_query, truncate_error_body, truncate_for_log};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn create_http_client(timeout_secs: u64) -> Result<Client, ProviderError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(ProviderError::Request)
}

fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Maps a non-success response to a provider error; 429 means quota.
async fn error_for_status(response: Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    let body = truncate_error_body(&body);
    if status == 429 {
        ProviderError::Quota(body)
    } else {
        ProviderError::Status { status, body }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Content provider backed by `POST {base}/chat/completions`.
pub struct OpenAiContentProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: SecretString,
    temperature: f32,
    max_elements: usize,
}

impl OpenAiContentProvider {
    pub fn new(config: &ContentConfig, api_key: SecretString) -> Result<Self, ProviderError> {
        Ok(Self {
            client: create_http_client(config.timeout_secs)?,
            base_url: trim_base_url(&config.api_base_url),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_elements: config.max_elements,
        })
    }

    /// Resolves the API key from the configured sources.
    pub fn from_config(config: &ContentConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key_source()
            .resolve()
            .map_err(|e| ProviderError::NotConfigured(format!("content API key: {}", e)))?;
        Self::new(config, api_key)
    }
}

#[async_trait]
impl ContentProvider for OpenAiContentProvider {
    async fn generate_spec(
        &self,
        request: &WorksheetRequest,
    ) -> Result<WorksheetSpec, ProviderError> {
        let prompt = worksheet_prompt(request, self.max_elements);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You design printable educational worksheets and answer with JSON only.",
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.temperature,
        };

        log::debug!(
            "Requesting worksheet spec from {} (model {}, topic '{}')",
            self.base_url,
            self.model,
            truncate_for_log(&request.topic)
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("invalid completion response: {}", e)))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::Parse("completion contained no content".to_string()))?;

        parse_spec_reply(&content, self.max_elements)
    }
}

#[derive(Serialize)]
struct ImageGenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    style: &'a str,
    response_format: &'a str,
}

#[derive(Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Image provider backed by `POST {base}/images/generations`.
///
/// Accepts either inline base64 data or a URL that is downloaded.
pub struct OpenAiImageProvider {
    client: Client,
    base_url: String,
    model: String,
    size: String,
    style: String,
    api_key: SecretString,
}

impl OpenAiImageProvider {
    pub fn new(config: &ImageConfig, api_key: SecretString) -> Result<Self, ProviderError> {
        Ok(Self {
            client: create_http_client(config.timeout_secs)?,
            base_url: trim_base_url(&config.api_base_url),
            model: config.model.clone(),
            size: config.size.clone(),
            style: config.style.clone(),
            api_key,
        })
    }

    pub fn from_config(config: &ImageConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key_source()
            .resolve()
            .map_err(|e| ProviderError::NotConfigured(format!("image API key: {}", e)))?;
        Self::new(config, api_key)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        log::debug!("Downloading generated image from {}", redact_url_query(url));
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    async fn generate_image(&self, description: &str) -> Result<Vec<u8>, ProviderError> {
        let prompt = line_art_prompt(description);
        let body = ImageGenerationRequest {
            model: &self.model,
            prompt: &prompt,
            n: 1,
            size: &self.size,
            style: &self.style,
            response_format: "b64_json",
        };

        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let generated: ImageGenerationResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("invalid image response: {}", e)))?;

        let image = generated
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("image response contained no data".to_string()))?;

        let bytes = match (image.b64_json, image.url) {
            (Some(encoded), _) => base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| ProviderError::Parse(format!("invalid base64 image: {}", e)))?,
            (None, Some(url)) => self.download(&url).await?,
            (None, None) => {
                return Err(ProviderError::Parse(
                    "image response had neither b64_json nor url".to_string(),
                ))
            }
        };

        if bytes.is_empty() {
            return Err(ProviderError::Parse("generated image is empty".to_string()));
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_base_url() {
        assert_eq!(
            trim_base_url("https://api.openai.com/v1/"),
            "https://api.openai.com/v1"
        );
    }

    #[test]
    fn test_chat_request_shape() {
        let body = ChatCompletionRequest {
            model: "gpt-4.1",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.5,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4.1");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_completion_response_without_content() {
        let parsed: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#)
                .unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[test]
    fn test_image_response_accepts_url_or_b64() {
        let parsed: ImageGenerationResponse =
            serde_json::from_str(r#"{"created": 1, "data": [{"url": "https://img/x.png"}]}"#)
                .unwrap();
        assert_eq!(parsed.data[0].url.as_deref(), Some("https://img/x.png"));
        assert!(parsed.data[0].b64_json.is_none());
    }

    #[test]
    fn test_from_config_without_key_is_not_configured() {
        let config = ContentConfig {
            api_key_env_var: None,
            ..Default::default()
        };
        let err = OpenAiContentProvider::from_config(&config).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn test_image_provider_with_direct_key() {
        let config = ImageConfig {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        assert!(OpenAiImageProvider::from_config(&config).is_ok());
    }
}
