use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const TEMPERATURE: f32 = 0.3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response body: {0}")]
    Malformed(String),
}

/// Outcome of one chat-completion call.
///
/// `Empty` means the service answered but produced nothing usable; `Failed`
/// means the call itself did not succeed and may be worth retrying.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Text(String),
    Empty,
    Failed(GatewayError),
}

impl Completion {
    /// The produced text, or `""` for both `Empty` and `Failed`.
    pub fn text(&self) -> &str {
        match self {
            Completion::Text(text) => text,
            _ => "",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Completion::Failed(_))
    }
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Completion;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
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

/// OpenAI-compatible `/chat/completions` client.
pub struct ChatCompletionsGateway {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsGateway {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn from_config(config: &crate::config::Config) -> anyhow::Result<Self> {
        Self::new(
            &config.llm_api_base_url,
            config.llm_api_key()?,
            &config.llm_model,
        )
    }

    async fn try_complete(&self, prompt: &str, max_tokens: u32) -> Result<Option<String>, GatewayError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()))
    }
}

#[async_trait]
impl ChatGateway for ChatCompletionsGateway {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Completion {
        match self.try_complete(prompt, max_tokens).await {
            Ok(Some(text)) => {
                debug!(chars = text.chars().count(), "completion received");
                Completion::Text(text)
            }
            Ok(None) => {
                warn!("completion service returned no content");
                Completion::Empty
            }
            Err(e) => {
                warn!(error = %e, "completion request failed");
                Completion::Failed(e)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned completions in order and counts calls. Once the
    /// script runs out every call yields `Empty`.
    pub struct ScriptedGateway {
        script: Mutex<VecDeque<Completion>>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGateway {
        pub fn new(script: Vec<Completion>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn texts(texts: &[&str]) -> Self {
            Self::new(
                texts
                    .iter()
                    .map(|t| Completion::Text(t.to_string()))
                    .collect(),
            )
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatGateway for ScriptedGateway {
        async fn complete(&self, prompt: &str, _max_tokens: u32) -> Completion {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Completion::Empty)
        }
    }
}
