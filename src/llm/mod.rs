pub mod mixtape;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::storage::repository;
use crate::storage::Database;

pub use mixtape::MixtapeWriter;
pub use openai::OpenAiWriter;

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-5";

/// A text-completion backend used to write the report's executive summary.
#[async_trait]
pub trait SummaryWriter: Send + Sync {
    /// Provider and model, for logs.
    fn describe(&self) -> String;

    async fn write_summary(&self, prompt: &str) -> Result<String>;
}

/// Create the summary writer configured in `app_config`.
///
/// `llm_provider` selects `openai`, `anthropic`, `bedrock` or `none`. When it
/// is unset, OpenAI is used if `OPENAI_API_KEY` is present and the report is
/// written without an LLM otherwise.
pub async fn create_writer(db: &Database, config: &Config) -> Result<Option<Arc<dyn SummaryWriter>>> {
    let (provider, model) = db
        .reader()
        .call(|conn| {
            let provider = repository::get_config(conn, "llm_provider")?;
            let model = repository::get_config(conn, "llm_model")?;
            Ok::<(Option<String>, Option<String>), rusqlite::Error>((provider, model))
        })
        .await?;

    let provider = match provider {
        Some(p) => p.to_lowercase(),
        None if config.openai_api_key.is_some() => "openai".to_string(),
        None => return Ok(None),
    };

    build_writer(&provider, model.as_deref(), config)
}

fn build_writer(
    provider: &str,
    model: Option<&str>,
    config: &Config,
) -> Result<Option<Arc<dyn SummaryWriter>>> {
    match provider {
        "none" | "off" => Ok(None),
        "openai" => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                Error::Config("llm_provider is openai but OPENAI_API_KEY is not set".into())
            })?;
            let writer = OpenAiWriter::new(api_key, model.unwrap_or(DEFAULT_OPENAI_MODEL))?;
            Ok(Some(Arc::new(writer)))
        }
        "anthropic" | "bedrock" => Ok(Some(Arc::new(MixtapeWriter::new(
            provider,
            model.unwrap_or(DEFAULT_CLAUDE_MODEL),
        )))),
        other => Err(Error::Config(format!("unknown llm_provider: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_provider_without_key() {
        let db = Database::open_memory().await.unwrap();
        let writer = create_writer(&db, &Config::default()).await.unwrap();
        assert!(writer.is_none());
    }

    #[tokio::test]
    async fn test_defaults_to_openai_with_key() {
        let db = Database::open_memory().await.unwrap();
        let config = Config {
            openai_api_key: Some("sk-test".into()),
            ..Config::default()
        };
        let writer = create_writer(&db, &config).await.unwrap().unwrap();
        assert_eq!(writer.describe(), "openai/gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_provider_from_app_config() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                repository::set_config(conn, "llm_provider", "Anthropic")?;
                repository::set_config(conn, "llm_model", "claude-haiku-4-5")
            })
            .await
            .unwrap();
        let writer = create_writer(&db, &Config::default()).await.unwrap().unwrap();
        assert_eq!(writer.describe(), "anthropic/claude-haiku-4-5");
    }

    #[test]
    fn test_explicit_none_and_unknown() {
        let config = Config::default();
        assert!(build_writer("none", None, &config).unwrap().is_none());
        assert!(matches!(
            build_writer("openai", None, &config),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            build_writer("palm", None, &config),
            Err(Error::Config(_))
        ));
    }
}
