//! Process configuration from the environment

use std::path::PathBuf;

/// Model used when `GEMINI_MODEL` is unset
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const DEFAULT_PORT: u16 = 8000;

/// Configuration shared by the server and the terminal client
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Gemini credential. Absence is reported per request, not at startup.
    pub gemini_api_key: Option<String>,
    pub model: Option<String>,
    /// Base URL override for the model API (proxies, tests)
    pub gateway: Option<String>,
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
    /// When set, the terminal client talks to this server instead of the model
    pub server_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            model: non_empty_var("GEMINI_MODEL"),
            gateway: non_empty_var("LLM_GATEWAY"),
            port: std::env::var("WHYTREE_PORT")
                .ok()
                .and_then(|p| p.parse().ok()),
            db_path: non_empty_var("WHYTREE_DB_PATH").map(PathBuf::from),
            server_url: non_empty_var("WHYTREE_SERVER_URL"),
        }
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(format!("{home}/.whytree/whytree.db"))
        })
    }
}

/// Blank values count as unset so `GEMINI_API_KEY=` behaves like a missing key
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
