//! Configuration parsing and validation for the relay
//!
//! Every option can be given on the command line or through the environment, so a `.env` file
//! next to the binary is enough to point the relay at a backend.
use anyhow::anyhow;
use clap::Parser;
use paper_relay::RelaySettings;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The port on which the relay will listen.
    #[arg(short = 'p', long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Base URL of the search and review backend.
    #[arg(
        long,
        env = "BACKEND_BASE_URL",
        alias = "flask-base-url",
        default_value = "http://localhost:5000"
    )]
    pub backend_url: Url,

    /// The HTML document served at `/`.
    #[arg(long, env = "UI_PATH", default_value = "views/ui.html")]
    pub ui_path: PathBuf,

    /// Timeout (in seconds) for forwarded search calls.
    #[arg(long, env = "SEARCH_TIMEOUT_SECS", default_value_t = 45)]
    pub search_timeout_secs: u64,

    /// Timeout (in seconds) for forwarded review generation calls. Extraction and generation
    /// are slow, so this is much longer than the search timeout.
    #[arg(long, env = "REVIEW_TIMEOUT_SECS", default_value_t = 180)]
    pub review_timeout_secs: u64,

    /// Largest PDF accepted on `/generate-review`, in bytes.
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 50 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// The port on which the metrics server will listen.
    #[arg(long, env = "METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// Whether to enable the metrics endpoint.
    #[arg(
        short = 'm',
        long,
        env = "METRICS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub metrics: bool,

    /// The prefix to use for metrics.
    #[arg(long, env = "METRICS_PREFIX", default_value = "relay")]
    pub metrics_prefix: String,

    /// Maximum number of idle connections kept open to the backend.
    #[arg(long, env = "POOL_MAX_IDLE_PER_HOST", default_value_t = 100)]
    pub pool_max_idle_per_host: usize,

    /// How long (in seconds) to keep idle backend connections alive.
    #[arg(long, env = "POOL_IDLE_TIMEOUT_SECS", default_value_t = 90)]
    pub pool_idle_timeout_secs: u64,
}

impl Config {
    pub fn validate(self) -> Result<Self, anyhow::Error> {
        if !matches!(self.backend_url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "Backend URL '{}' must use http or https",
                self.backend_url
            ));
        }
        if self.backend_url.cannot_be_a_base() {
            return Err(anyhow!("Backend URL '{}' is not a base URL", self.backend_url));
        }
        if self.search_timeout_secs == 0 || self.review_timeout_secs == 0 {
            return Err(anyhow!("Timeouts must be at least one second"));
        }
        if self.max_upload_bytes == 0 {
            return Err(anyhow!("Upload ceiling must be greater than zero"));
        }
        if !self.ui_path.exists() {
            tracing::warn!(
                "UI file '{}' does not exist, GET / will answer 404",
                self.ui_path.display()
            );
        }
        Ok(self)
    }

    pub fn settings(&self) -> RelaySettings {
        RelaySettings::builder()
            .backend_url(self.backend_url.clone())
            .ui_path(self.ui_path.clone())
            .search_timeout(Duration::from_secs(self.search_timeout_secs))
            .review_timeout(Duration::from_secs(self.review_timeout_secs))
            .max_upload_bytes(self.max_upload_bytes)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["paper-relay"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_the_deployed_relay() {
        let config = parse(&["--backend-url", "http://localhost:5000"]);
        assert_eq!(config.search_timeout_secs, 45);
        assert_eq!(config.review_timeout_secs, 180);
        assert_eq!(config.max_upload_bytes, 52_428_800);

        let settings = config.validate().unwrap().settings();
        assert_eq!(settings.search_timeout, Duration::from_secs(45));
        assert_eq!(settings.review_timeout, Duration::from_secs(180));
        assert_eq!(settings.backend_url.as_str(), "http://localhost:5000/");
    }

    #[test]
    fn metrics_can_be_switched_off() {
        let config = parse(&["--backend-url", "http://localhost:5000"]);
        assert!(config.metrics);

        let config = parse(&["--backend-url", "http://localhost:5000", "--metrics", "false"]);
        assert!(!config.metrics);

        let config = parse(&["--backend-url", "http://localhost:5000", "-m", "true"]);
        assert!(config.metrics);
    }

    #[test]
    fn rejects_non_http_backend() {
        let config = parse(&["--backend-url", "ftp://files.example.com"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_timeouts() {
        let config = parse(&[
            "--backend-url",
            "http://localhost:5000",
            "--search-timeout-secs",
            "0",
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unparseable_backend_url() {
        let argv = ["paper-relay", "--backend-url", "not a url"];
        assert!(Config::try_parse_from(argv).is_err());
    }
}
