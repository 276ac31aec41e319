use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LABS_BASE: &str = "https://labs.google";
pub const DEFAULT_SANDBOX_BASE: &str = "https://aisandbox-pa.googleapis.com";
pub const DEFAULT_CREDENTIALS_FILE: &str = "googel.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Where the remote endpoints live and how long a call may block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub labs_base: String,
    pub sandbox_base: String,
    /// `None` lets a call block until the server answers.
    pub timeout: Option<Duration>,
    pub credentials_path: PathBuf,
    pub events_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            labs_base: DEFAULT_LABS_BASE.to_string(),
            sandbox_base: DEFAULT_SANDBOX_BASE.to_string(),
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            events_path: None,
        }
    }
}

impl ServiceConfig {
    /// Reads `FXLAB_LABS_BASE`, `FXLAB_SANDBOX_BASE`, `FXLAB_TIMEOUT_SECS`,
    /// `FXLAB_CREDENTIALS` and `FXLAB_EVENTS`.
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let timeout = match lookup("FXLAB_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => {
                    log::warn!("FXLAB_TIMEOUT_SECS '{raw}' is not a number; using {DEFAULT_TIMEOUT_SECS}s");
                    defaults.timeout
                }
            },
            None => defaults.timeout,
        };
        Self {
            labs_base: lookup("FXLAB_LABS_BASE")
                .map(|value| normalize_base(&value))
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.labs_base),
            sandbox_base: lookup("FXLAB_SANDBOX_BASE")
                .map(|value| normalize_base(&value))
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.sandbox_base),
            timeout,
            credentials_path: lookup("FXLAB_CREDENTIALS")
                .map(PathBuf::from)
                .unwrap_or(defaults.credentials_path),
            events_path: lookup("FXLAB_EVENTS").map(PathBuf::from),
        }
    }

    pub fn with_labs_base(mut self, base: &str) -> Self {
        self.labs_base = normalize_base(base);
        self
    }

    pub fn with_sandbox_base(mut self, base: &str) -> Self {
        self.sandbox_base = normalize_base(base);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = path.into();
        self
    }

    pub fn with_events_path(mut self, path: Option<PathBuf>) -> Self {
        self.events_path = path;
        self
    }

    pub fn caption_endpoint(&self) -> String {
        format!("{}/fx/api/trpc/backbone.generateCaption", self.labs_base)
    }

    pub fn storyboard_endpoint(&self) -> String {
        format!("{}/fx/api/trpc/backbone.generateStoryBoardPrompt", self.labs_base)
    }

    pub fn generation_endpoint(&self) -> String {
        format!("{}/v1:runImageFx", self.sandbox_base)
    }
}

fn normalize_base(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
