use crate::api::DEFAULT_BASE_URL;
use crate::error::{AppError, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "compliance-analyzer",
    version,
    about = "Ask grounded questions about your compliance documents"
)]
pub struct Cli {
    /// Base URL of the compliance backend
    #[arg(long, env = "COMPLIANCE_API_URL", default_value = DEFAULT_BASE_URL)]
    pub api_url: String,

    /// Directory holding the settings database
    #[arg(long, env = "COMPLIANCE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// API key; stored for later sessions when given
    #[arg(long, env = "COMPLIANCE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub data_dir: PathBuf,
    pub api_key: Option<String>,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let data_dir = match cli.data_dir {
            Some(dir) => dir,
            None => dirs::data_dir()
                .ok_or_else(|| AppError::Config("no platform data directory".into()))?
                .join("compliance-analyzer"),
        };
        if cli.api_url.trim().is_empty() {
            return Err(AppError::Config("api url must not be empty".into()));
        }
        Ok(Self {
            api_url: cli.api_url,
            data_dir,
            api_key: cli.api_key.filter(|k| !k.trim().is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_arguments() {
        let cli = Cli::try_parse_from([
            "compliance-analyzer",
            "--api-url",
            "https://policy.example.com/api/v1",
            "--data-dir",
            "/tmp/ca",
            "--api-key",
            "secret",
        ])
        .unwrap();
        let config = AppConfig::from_cli(cli).unwrap();
        assert_eq!(config.api_url, "https://policy.example.com/api/v1");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/ca"));
        assert_eq!(config.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let cli = Cli {
            api_url: DEFAULT_BASE_URL.into(),
            data_dir: Some("/tmp/ca".into()),
            api_key: Some("  ".into()),
        };
        assert_eq!(AppConfig::from_cli(cli).unwrap().api_key, None);
    }

    #[test]
    fn test_empty_api_url_rejected() {
        let cli = Cli {
            api_url: " ".into(),
            data_dir: Some("/tmp/ca".into()),
            api_key: None,
        };
        assert!(matches!(AppConfig::from_cli(cli), Err(AppError::Config(_))));
    }
}
