//! Chat Completions client used when `llm_provider` is `openai`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::SummaryWriter;
use crate::error::{Error, Result};

const API_BASE_URL: &str = "https://api.openai.com";
const COMPLETIONS_PATH: &str = "/v1/chat/completions";
const SYSTEM_PROMPT: &str = "You are a senior performance-marketing analyst writing daily briefs for agency clients. Be specific, quantitative and brief.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenAiWriter {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_retries: u32,
}

impl OpenAiWriter {
    pub fn new(api_key: String, model: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            model: model.to_string(),
            base_url: API_BASE_URL.to_string(),
            max_retries: 1,
        })
    }

    /// Point the client at a different API origin (proxies, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl SummaryWriter for OpenAiWriter {
    fn describe(&self) -> String {
        format!("openai/{}", self.model)
    }

    async fn write_summary(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.4,
        };
        let url = format!("{}{COMPLETIONS_PATH}", self.base_url.trim_end_matches('/'));

        let mut attempt = 0;
        loop {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::Llm(format!("OpenAI request failed: {e}")))?;

            let status = response.status();
            if status.is_success() {
                let body: ChatResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::Llm(format!("invalid OpenAI response: {e}")))?;
                return body
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| Error::Llm("OpenAI returned no content".into()));
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient(status) && attempt < self.max_retries {
                log::warn!("OpenAI returned {status}, retrying: {body}");
                attempt += 1;
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
            return Err(Error::Llm(format!("OpenAI returned {status}: {body}")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": text}, "finish_reason": "stop"}
            ]
        })
    }

    #[tokio::test]
    async fn write_summary_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COMPLETIONS_PATH))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("  Brief.  ")))
            .mount(&server)
            .await;

        let writer = OpenAiWriter::new("sk-test".into(), "gpt-4o-mini")
            .unwrap()
            .with_base_url(server.uri());
        assert_eq!(writer.write_summary("hello").await.unwrap(), "Brief.");
    }

    #[tokio::test]
    async fn write_summary_retries_once_on_429() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COMPLETIONS_PATH))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(COMPLETIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("After retry")))
            .mount(&server)
            .await;

        let writer = OpenAiWriter::new("sk-test".into(), "gpt-4o-mini")
            .unwrap()
            .with_base_url(server.uri());
        assert_eq!(writer.write_summary("hello").await.unwrap(), "After retry");
    }

    #[tokio::test]
    async fn write_summary_fails_on_bad_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COMPLETIONS_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad model"))
            .expect(1)
            .mount(&server)
            .await;

        let writer = OpenAiWriter::new("sk-test".into(), "nope")
            .unwrap()
            .with_base_url(server.uri());
        let err = writer.write_summary("hello").await.unwrap_err();
        assert!(matches!(err, Error::Llm(ref m) if m.contains("400")));
    }
}
