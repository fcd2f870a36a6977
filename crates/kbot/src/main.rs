use std::sync::Arc;

use kbot_anthropic::{AnthropicClient, AnthropicConfig};

use kbot_core::{
    config::{BotMode, Config},
    knowledge::{FileKnowledgeStore, KnowledgeCache},
    model::client::{AnswerGenerator, DisabledGenerator},
    state::BotState,
};

#[tokio::main]
async fn main() -> Result<(), kbot_core::Error> {
    kbot_core::logging::init("kbot")?;

    let cfg = match Config::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!("{e}");
            return Err(e);
        }
    };

    let state = Arc::new(BotState::new(cfg.daily_limit, cfg.seed_admin));
    let knowledge = Arc::new(KnowledgeCache::new(Arc::new(FileKnowledgeStore::new(
        cfg.knowledge_paths.clone(),
    ))));

    let generator: Arc<dyn AnswerGenerator> = match cfg.mode {
        BotMode::Answer => {
            // Warm the cache so the first question does not pay for the read.
            match knowledge.current().await {
                Ok(doc) => tracing::info!(bytes = doc.text.len(), "knowledge base preloaded"),
                Err(e) => tracing::warn!("knowledge base not available yet: {e}"),
            }
            Arc::new(AnthropicClient::new(AnthropicConfig::from_config(&cfg)?)?)
        }
        BotMode::Echo => Arc::new(DisabledGenerator),
    };

    kbot_telegram::router::run_polling(cfg, state, knowledge, generator)
        .await
        .map_err(|e| kbot_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
