use crate::error::{AuditError, Result};
use std::path::PathBuf;

pub const TOKEN_ENV: &str = "GITHUB_ACCESS_TOKEN";
pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Everything a run needs, resolved once in `main` and handed to each stage.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub organization: String,
    pub token: String,
    pub api_url: String,
    pub page_size: u32,
    pub output_dir: PathBuf,
    pub json: bool,
}

impl AuditConfig {
    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(report_file_name(&self.organization))
    }
}

pub fn report_file_name(organization: &str) -> String {
    format!("{organization}_github_contributor_permissions_report.csv")
}

pub fn token_from_env() -> Result<String> {
    resolve_token(std::env::var(TOKEN_ENV).ok())
}

fn resolve_token(value: Option<String>) -> Result<String> {
    match value.map(|t| t.trim().to_string()) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AuditError::Config(format!(
            "The environment variable {TOKEN_ENV} must be set before running."
        ))),
    }
}
