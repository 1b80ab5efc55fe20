//! OpenRouter chat-completion client implementing `DescriptionGenerator`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use syft_deploy_core::contract::{DescriptionGenerator, DescriptionRequest, RemoteError};

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const REFERER: &str = "https://github.com/syft-space-deploy";
const TITLE: &str = "Dataset Description Generator";
const TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

impl<'a> From<&'a DescriptionRequest> for ChatRequest<'a> {
    fn from(req: &'a DescriptionRequest) -> Self {
        ChatRequest {
            model: &req.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &req.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &req.user_prompt,
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

fn first_content(body: &str) -> Result<String, RemoteError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| RemoteError::Decode(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| RemoteError::Decode("response has no choices".to_string()))
}

pub struct OpenRouterClient {
    http: Client,
    api_key: String,
    url: String,
}

impl OpenRouterClient {
    pub fn new(api_key: &str) -> Result<Self, RemoteError> {
        Self::with_url(api_key, OPENROUTER_URL)
    }

    pub fn with_url(api_key: &str, url: &str) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(TIMEOUT)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(OpenRouterClient {
            http,
            api_key: api_key.to_string(),
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl DescriptionGenerator for OpenRouterClient {
    async fn generate(&self, request: &DescriptionRequest) -> Result<String, RemoteError> {
        tracing::info!(model = %request.model, "Requesting description");
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE)
            .json(&ChatRequest::from(request))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "OpenRouter request failed");
                RemoteError::Transport(e.to_string())
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        if status != 200 {
            tracing::error!(status, "OpenRouter returned an error");
            return Err(RemoteError::status(status, &body));
        }
        first_content(&body)
    }
}
