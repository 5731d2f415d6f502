use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::protocol::SamplingOptions;

/// Chat gateway in front of a local Ollama runtime.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
    /// Listen address (e.g. ":8000" or "127.0.0.1:8000")
    #[arg(long, default_value = ":8000", env = "ADDR")]
    pub addr: String,

    /// Log format: "text" or "json"
    #[arg(long, default_value = "text", env = "LOG_FORMAT")]
    pub log_format: String,

    /// Log filter directive, e.g. "info" or "chat_gateway=debug"
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Backend host
    #[arg(long, default_value = "localhost", env = "BACKEND_HOST")]
    pub backend_host: String,

    /// Backend port
    #[arg(long, default_value_t = 11434, env = "BACKEND_PORT")]
    pub backend_port: u16,

    /// Full backend base URL; overrides host and port when set
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Model identifier sent with every chat request
    #[arg(long, default_value = "qwen2.5:7b", env = "MODEL")]
    pub model: String,

    /// Upper bound for one backend chat call, in seconds
    #[arg(long, default_value_t = 60, env = "REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: u64,

    /// Upper bound for one health probe, in seconds
    #[arg(long, default_value_t = 5, env = "PROBE_TIMEOUT_SECS")]
    pub probe_timeout_secs: u64,

    /// Seconds between background health probes (0 to disable)
    #[arg(long, default_value_t = 30, env = "PROBE_INTERVAL_SECS")]
    pub probe_interval_secs: u64,

    /// Comma-separated allowed CORS origins; "*" allows any origin
    #[arg(long, default_value = "*", env = "CORS_ORIGINS")]
    pub cors_origins: String,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.7, env = "TEMPERATURE")]
    pub temperature: f64,

    /// Nucleus sampling threshold
    #[arg(long, default_value_t = 0.9, env = "TOP_P")]
    pub top_p: f64,

    /// Maximum tokens to generate; backend default when unset
    #[arg(long, env = "NUM_PREDICT")]
    pub num_predict: Option<i32>,
}

/// Startup configuration errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("probe timeout ({probe}s) must be shorter than request timeout ({request}s)")]
    ProbeNotShorter { probe: u64, request: u64 },

    #[error("LOG_FORMAT must be \"text\" or \"json\", got {0:?}")]
    LogFormat(String),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("REQUEST_TIMEOUT_SECS"));
        }
        if self.probe_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("PROBE_TIMEOUT_SECS"));
        }
        if self.probe_timeout_secs >= self.request_timeout_secs {
            return Err(ConfigError::ProbeNotShorter {
                probe: self.probe_timeout_secs,
                request: self.request_timeout_secs,
            });
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(ConfigError::LogFormat(self.log_format.clone()));
        }
        Ok(())
    }

    /// Backend base URL, from `BACKEND_URL` or built from host and port.
    pub fn backend_base_url(&self) -> String {
        match &self.backend_url {
            Some(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => format!("http://{}:{}", self.backend_host, self.backend_port),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// `None` when background probing is disabled.
    pub fn probe_interval(&self) -> Option<Duration> {
        (self.probe_interval_secs > 0).then(|| Duration::from_secs(self.probe_interval_secs))
    }

    pub fn sampling_options(&self) -> SamplingOptions {
        SamplingOptions {
            temperature: self.temperature,
            top_p: self.top_p,
            num_predict: self.num_predict,
        }
    }

    pub fn cors_origin_list(&self) -> Vec<String> {
        parse_origin_list(&self.cors_origins)
    }
}

/// Parse comma-separated origin list, trimming whitespace and filtering empties.
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Convert Go-style ":8000" to "0.0.0.0:8000".
pub fn normalize_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}
