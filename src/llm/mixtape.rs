//! Claude models through `mixtape-core`, for the `anthropic` and `bedrock`
//! providers.

use async_trait::async_trait;

use super::SummaryWriter;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct MixtapeWriter {
    provider: String,
    model: String,
}

impl MixtapeWriter {
    pub fn new(provider: &str, model: &str) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
        }
    }
}

fn is_haiku(model: &str) -> bool {
    matches!(model, "claude-haiku-4-5" | "haiku")
}

async fn build_agent(provider: &str, model: &str) -> Result<mixtape_core::Agent> {
    let llm_error = |e: &dyn std::fmt::Display| Error::Llm(format!("{provider} agent: {e}"));
    // Model types differ per arm, so each combination builds separately.
    match (provider, is_haiku(model)) {
        ("bedrock", true) => mixtape_core::Agent::builder()
            .bedrock(mixtape_core::ClaudeHaiku4_5)
            .build()
            .await
            .map_err(|e| llm_error(&e)),
        ("bedrock", false) => mixtape_core::Agent::builder()
            .bedrock(mixtape_core::ClaudeSonnet4_5)
            .build()
            .await
            .map_err(|e| llm_error(&e)),
        ("anthropic", true) => mixtape_core::Agent::builder()
            .anthropic_from_env(mixtape_core::ClaudeHaiku4_5)
            .build()
            .await
            .map_err(|e| llm_error(&e)),
        ("anthropic", false) => mixtape_core::Agent::builder()
            .anthropic_from_env(mixtape_core::ClaudeSonnet4_5)
            .build()
            .await
            .map_err(|e| llm_error(&e)),
        (other, _) => Err(Error::Config(format!("unknown llm_provider: {other}"))),
    }
}

#[async_trait]
impl SummaryWriter for MixtapeWriter {
    fn describe(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }

    async fn write_summary(&self, prompt: &str) -> Result<String> {
        let provider = self.provider.clone();
        let model = self.model.clone();
        let prompt = prompt.to_string();
        let handle = tokio::runtime::Handle::current();

        // The agent is driven on a blocking thread so callers' futures stay Send.
        tokio::task::spawn_blocking(move || {
            handle.block_on(async move {
                let agent = build_agent(&provider, &model).await?;
                let response = agent
                    .run(&prompt)
                    .await
                    .map_err(|e| Error::Llm(e.to_string()))?;
                Ok::<String, Error>(response.text().trim().to_string())
            })
        })
        .await
        .map_err(|e| Error::Llm(format!("LLM task failed: {e}")))?
    }
}
