use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub telegram_token: String,
    pub openai_api_key: Option<String>,
    pub openai_api_base: String,
    pub openai_model: String,
    pub database_url: String,
    /// Number of recent transcript rows fed back to the model.
    pub history_limit: usize,
    pub llm_timeout_secs: u64,
}

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        let telegram_token = non_empty_var("TELEGRAM_BOT_TOKEN")
            .or_else(|| non_empty_var("TELE_BOT_TOKEN"))
            .ok_or_else(|| {
                anyhow::anyhow!("TELEGRAM_BOT_TOKEN or TELE_BOT_TOKEN must be set")
            })?;

        Ok(Config {
            telegram_token,
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|key| !key.is_empty()),
            openai_api_base: env::var("OPENAI_API_BASE")
                .ok()
                .filter(|base| !base.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            openai_model: env::var("OPENAI_MODEL")
                .ok()
                .filter(|model| !model.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "telecust.db".to_string()),
            history_limit: env::var("CONVERSATION_HISTORY_LIMIT")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|limit| *limit > 0)
                .unwrap_or(DEFAULT_HISTORY_LIMIT),
            llm_timeout_secs: env::var("LLM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("telegram_token", &"[REDACTED]")
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("openai_api_base", &self.openai_api_base)
            .field("openai_model", &self.openai_model)
            .field("database_url", &self.database_url)
            .field("history_limit", &self.history_limit)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .finish()
    }
}
