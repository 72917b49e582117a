// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the backend REST API.
    pub backend_url: String,
    /// Host to bind the HTTP server to.
    pub host: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Upper bound on every backend call.
    pub backend_timeout: Duration,
    /// Directory containing pre-built frontend assets.
    /// When set, unmatched paths are served from it.
    pub static_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `BACKEND_URL` - backend API base URL (default: `http://localhost:8000`)
    /// - `HOST` - bind host (default: `0.0.0.0`)
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `BACKEND_TIMEOUT_SECS` - backend call timeout in seconds (default: 10)
    /// - `STATIC_DIR` - path to frontend assets for static file serving
    ///
    /// CLI flags:
    /// - `--backend-url <URL>` - override the backend URL
    /// - `--port <PORT>` - override the port
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    /// Resolve settings from `args` and an environment lookup.
    /// A CLI flag takes precedence over the env var, which takes precedence over the default.
    pub fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        let backend_url = Self::parse_cli_value(args, "--backend-url")
            .or_else(|| env("BACKEND_URL"))
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let host = env("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = Self::parse_cli_value(args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| env("PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(3000);

        let timeout_secs = env("BACKEND_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(10);

        let static_dir = env("STATIC_DIR").map(PathBuf::from);

        Config {
            backend_url,
            host,
            port,
            backend_timeout: Duration::from_secs(timeout_secs),
            static_dir,
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}
