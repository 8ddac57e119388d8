use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use crate::{
    errors::Error, history::DEFAULT_HISTORY_LIMIT, model::types::DEFAULT_MODEL, Result,
};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_WHATSAPP_BRIDGE_URL: &str = "ws://127.0.0.1:7123";
pub const DEFAULT_WHATSAPP_ACCOUNT_ID: &str = "default";

/// Which messenger the service answers on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectorKind {
    WhatsApp,
    Telegram,
}

impl ConnectorKind {
    fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "whatsapp" | "wa" => Ok(Self::WhatsApp),
            "telegram" | "tg" => Ok(Self::Telegram),
            other => Err(Error::Config(format!(
                "CONNECTOR must be `whatsapp` or `telegram`, got `{other}`"
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    pub bridge_url: String,
    pub account_id: String,
    pub auth_dir: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: String,
}

/// Typed configuration for the service.
#[derive(Clone, Debug)]
pub struct Config {
    // Completion API
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub completion_timeout: Option<Duration>,

    // Messenger
    pub connector: ConnectorKind,
    pub whatsapp: WhatsAppConfig,
    pub telegram: Option<TelegramConfig>,

    // History
    pub history_limit: usize,
}

impl Config {
    /// Load from `.env` (if present) and the process environment.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        // A missing key is fatal here rather than on the first request.
        let openai_api_key = get("OPENAI_API_KEY").ok_or_else(|| {
            Error::Config("OPENAI_API_KEY environment variable is required".to_string())
        })?;
        let openai_model = get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let openai_base_url = get("OPENAI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let completion_timeout = parse_u64(&get, "COMPLETION_TIMEOUT_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let connector = match get("CONNECTOR") {
            Some(v) => ConnectorKind::parse(&v)?,
            None => ConnectorKind::WhatsApp,
        };

        let whatsapp = WhatsAppConfig {
            bridge_url: get("WHATSAPP_BRIDGE_URL")
                .unwrap_or_else(|| DEFAULT_WHATSAPP_BRIDGE_URL.to_string()),
            account_id: get("WHATSAPP_ACCOUNT_ID")
                .unwrap_or_else(|| DEFAULT_WHATSAPP_ACCOUNT_ID.to_string()),
            auth_dir: get("WHATSAPP_AUTH_DIR").map(PathBuf::from),
        };

        let telegram = get("TELEGRAM_BOT_TOKEN").map(|bot_token| TelegramConfig { bot_token });
        if connector == ConnectorKind::Telegram && telegram.is_none() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required for CONNECTOR=telegram"
                    .to_string(),
            ));
        }

        let history_limit = parse_u64(&get, "HISTORY_LIMIT")?
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_HISTORY_LIMIT);

        Ok(Self {
            openai_api_key,
            openai_model,
            openai_base_url,
            completion_timeout,
            connector,
            whatsapp,
            telegram,
            history_limit,
        })
    }
}

fn parse_u64(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    get(key)
        .map(|v| {
            v.trim()
                .parse::<u64>()
                .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got `{v}`")))
        })
        .transpose()
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

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
