use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use crate::{
    domain::{ChatId, UserId},
    errors::Error,
    Result,
};

pub const DEFAULT_DAILY_LIMIT: u32 = 10;
pub const DEFAULT_GENERATOR_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CLAUDE_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_KNOWLEDGE_PATH: &str = "knowledge-base/all.txt";
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-opus-20240229";
pub const DEFAULT_CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// What the router does with a Question.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotMode {
    /// Forward to the answer generator with the knowledge document.
    Answer,
    /// Reply with the text suffixed by ` - claude`; no generation, no quota.
    Echo,
}

impl BotMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "answer" | "llm" => Some(Self::Answer),
            "echo" => Some(Self::Echo),
            _ => None,
        }
    }
}

/// Typed bot configuration, read from the environment (and an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Credentials
    pub telegram_bot_token: String,
    pub claude_api_key: Option<String>,

    // Routing
    pub target_chats: Vec<ChatId>,
    pub seed_admin: UserId,
    pub daily_limit: u32,
    pub mode: BotMode,
    pub implicit_group_prompts: bool,

    // Knowledge base
    pub knowledge_paths: Vec<PathBuf>,

    // Answer generator
    pub generator_timeout: Duration,
    pub claude_model: String,
    pub claude_max_tokens: u32,
    pub claude_temperature: f32,
    pub claude_api_url: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |keys: &[&str]| -> Option<String> {
            keys.iter()
                .find_map(|k| lookup(*k))
                .and_then(non_empty)
                .map(|s| s.trim().to_string())
        };

        let mode = match get(&["BOT_MODE"]) {
            Some(raw) => BotMode::parse(&raw)
                .ok_or_else(|| Error::Config(format!("unknown BOT_MODE: {raw}")))?,
            None => BotMode::Answer,
        };

        let telegram_bot_token = get(&["TELEGRAM_TOKEN", "TELEGRAM_BOT_TOKEN"]).ok_or_else(|| {
            Error::Config("TELEGRAM_TOKEN environment variable is required".to_string())
        })?;

        let claude_api_key = get(&["CLAUDE_KEY", "ANTHROPIC_API_KEY"]);
        if mode == BotMode::Answer && claude_api_key.is_none() {
            return Err(Error::Config(
                "CLAUDE_KEY environment variable is required in answer mode".to_string(),
            ));
        }

        let target_chats = parse_csv_i64(get(&["TARGET_CHAT_ID", "GROUP_ID"]), "TARGET_CHAT_ID")?
            .into_iter()
            .map(ChatId)
            .collect::<Vec<_>>();
        if target_chats.is_empty() {
            return Err(Error::Config(
                "TARGET_CHAT_ID environment variable is required".to_string(),
            ));
        }

        let seed_admin = get(&["SEED_ADMIN_ID"])
            .ok_or_else(|| {
                Error::Config("SEED_ADMIN_ID environment variable is required".to_string())
            })
            .and_then(|raw| {
                raw.parse::<i64>()
                    .map(UserId)
                    .map_err(|_| Error::Config(format!("SEED_ADMIN_ID is not a user id: {raw}")))
            })?;

        let daily_limit = parse_number(get(&["DAILY_LIMIT"]), "DAILY_LIMIT", DEFAULT_DAILY_LIMIT)?;
        if daily_limit == 0 {
            return Err(Error::Config(
                "DAILY_LIMIT must be a positive integer: 0".to_string(),
            ));
        }

        let implicit_group_prompts = match get(&["IMPLICIT_GROUP_PROMPTS"]) {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                Error::Config(format!("IMPLICIT_GROUP_PROMPTS is not a boolean: {raw}"))
            })?,
            None => true,
        };

        let knowledge_paths = parse_csv_paths(get(&["KNOWLEDGE_BASE_PATH"]))
            .unwrap_or_else(|| vec![PathBuf::from(DEFAULT_KNOWLEDGE_PATH)]);

        let timeout_secs = parse_number(
            get(&["GENERATOR_TIMEOUT_SECS"]),
            "GENERATOR_TIMEOUT_SECS",
            DEFAULT_GENERATOR_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(Error::Config(
                "GENERATOR_TIMEOUT_SECS must be a positive integer: 0".to_string(),
            ));
        }
        let generator_timeout = Duration::from_secs(timeout_secs);

        let claude_model =
            get(&["CLAUDE_MODEL"]).unwrap_or_else(|| DEFAULT_CLAUDE_MODEL.to_string());
        let claude_max_tokens = parse_number(
            get(&["CLAUDE_MAX_TOKENS"]),
            "CLAUDE_MAX_TOKENS",
            DEFAULT_CLAUDE_MAX_TOKENS,
        )?;
        let claude_temperature: f32 =
            parse_number(get(&["CLAUDE_TEMPERATURE"]), "CLAUDE_TEMPERATURE", 0.0)?;
        if !(0.0..=1.0).contains(&claude_temperature) {
            return Err(Error::Config(format!(
                "CLAUDE_TEMPERATURE must be between 0 and 1: {claude_temperature}"
            )));
        }
        let claude_api_url =
            get(&["CLAUDE_API_URL"]).unwrap_or_else(|| DEFAULT_CLAUDE_API_URL.to_string());

        Ok(Self {
            telegram_bot_token,
            claude_api_key,
            target_chats,
            seed_admin,
            daily_limit,
            mode,
            implicit_group_prompts,
            knowledge_paths,
            generator_timeout,
            claude_model,
            claude_max_tokens,
            claude_temperature,
            claude_api_url,
        })
    }

    /// Same as [`Config::from_lookup`] over a fixed map.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|k| vars.get(k).cloned())
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }
        out.push((key.to_string(), val));
    }
    out
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse an optional numeric setting; unset means `default`, garbage is an error.
fn parse_number<T: FromStr>(v: Option<String>, key: &str, default: T) -> Result<T> {
    match v {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{key} is not a valid number: {raw}"))),
        None => Ok(default),
    }
}

fn parse_csv_i64(v: Option<String>, key: &str) -> Result<Vec<i64>> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("{key} contains a non-numeric id: {s}")))
        })
        .collect()
}

fn parse_csv_paths(v: Option<String>) -> Option<Vec<PathBuf>> {
    let v = v?;
    let out = v
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect::<Vec<_>>();
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
