//! CLI command implementations

use anyhow::{anyhow, bail, Context, Result};
use consult_config::{ConfigLoader, ConsultConfig};
use consult_http::{
    AuthApi, ClientSession, ClientSessionBuilder, FileTokenStore, FileUpload, Notifier, ProgressCallback,
    RequestOptions, Severity,
};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Session file used when the configuration names none
const DEFAULT_TOKEN_FILE: &str = ".consult/session.json";

/// Shows notifications on stderr so stdout stays pure JSON
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        eprintln!("[{}] {}", severity, message);
    }
}

pub fn load_config(path: Option<&PathBuf>) -> Result<ConsultConfig> {
    ConfigLoader::new()
        .load(path)
        .with_context(|| match path {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Failed to load configuration from environment".to_string(),
        })
}

fn token_file(config: &ConsultConfig) -> PathBuf {
    config
        .auth
        .token_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE))
}

fn open_session(config: &ConsultConfig) -> Result<ClientSession> {
    let path = token_file(config);
    let store = FileTokenStore::open(&path)
        .with_context(|| format!("Failed to open session file {}", path.display()))?;
    debug!("Using session file {}", path.display());

    ClientSessionBuilder::from_config(config)
        .token_store(Arc::new(store))
        .notifier(Arc::new(ConsoleNotifier))
        .build()
        .context("Failed to build client session")
}

fn print_json(value: &JsonValue) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_query(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .ok_or_else(|| anyhow!("Query parameter '{}' is not NAME=VALUE", pair))
        })
        .collect()
}

pub async fn get_command(config: &ConsultConfig, path: &str, query: &[String], no_cache: bool) -> Result<()> {
    let session = open_session(config)?;
    let mut options = RequestOptions::new();
    for (name, value) in parse_query(query)? {
        options = options.query(name, value);
    }
    if no_cache {
        options = options.no_cache();
    }

    let body: JsonValue = session
        .get(path, options)
        .await
        .with_context(|| format!("GET {} failed", path))?;
    print_json(&body)
}

pub async fn post_command(config: &ConsultConfig, path: &str, data: Option<&String>) -> Result<()> {
    let body: JsonValue = match data {
        Some(data) => serde_json::from_str(data).context("--data is not valid JSON")?,
        None => JsonValue::Null,
    };

    let session = open_session(config)?;
    let response: JsonValue = session
        .post(path, &body, RequestOptions::new())
        .await
        .with_context(|| format!("POST {} failed", path))?;
    print_json(&response)
}

pub async fn login_command(config: &ConsultConfig, email: &str, password: &str) -> Result<()> {
    let auth = AuthApi::new(open_session(config)?);
    let response = auth.login(email, password).await.context("Login failed")?;

    info!("Session stored in {}", token_file(config).display());
    println!(
        "Signed in as {} ({})",
        response.email,
        response.user_type.as_deref().unwrap_or("unknown role")
    );
    Ok(())
}

pub async fn logout_command(config: &ConsultConfig) -> Result<()> {
    let auth = AuthApi::new(open_session(config)?);
    auth.logout().await;
    println!("Signed out");
    Ok(())
}

pub async fn upload_command(config: &ConsultConfig, to: &str, file: &Path) -> Result<()> {
    let upload = FileUpload::from_path(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let progress: ProgressCallback = Arc::new(|percent: u8| eprint!("\rUploading... {:>3}%", percent));

    let session = open_session(config)?;
    let response: JsonValue = session
        .upload_file(to, upload, Some(progress), RequestOptions::new())
        .await
        .with_context(|| format!("Upload to {} failed", to))?;
    eprintln!();
    print_json(&response)
}

pub async fn download_command(config: &ConsultConfig, path: &str, output: &Path) -> Result<()> {
    let session = open_session(config)?;
    let bytes = session
        .download(path, RequestOptions::new())
        .await
        .with_context(|| format!("Download of {} failed", path))?;

    tokio::fs::write(output, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote {} bytes to {}", bytes.len(), output.display());
    Ok(())
}

pub fn config_sample_command() -> Result<()> {
    print!("{}", ConsultConfig::generate_sample());
    Ok(())
}

pub fn config_show_command(config: &ConsultConfig, format: &str) -> Result<()> {
    match format {
        "yaml" => print!("{}", serde_yaml::to_string(config)?),
        "json" => println!("{}", serde_json::to_string_pretty(config)?),
        other => bail!("Unknown format '{}'; use yaml or json", other),
    }
    Ok(())
}

pub fn config_validate_command(config_file: &Path) -> Result<()> {
    let config = ConfigLoader::new()
        .from_file(config_file)
        .with_context(|| format!("{} is not a valid configuration", config_file.display()))?;
    println!(
        "{} is valid (base URL {})",
        config_file.display(),
        config.http.base_url
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_pairs() {
        let pairs = parse_query(&["page=2".to_string(), "q=a=b".to_string()]).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("page".to_string(), "2".to_string()),
                ("q".to_string(), "a=b".to_string())
            ]
        );
        assert!(parse_query(&["broken".to_string()]).is_err());
    }

    #[test]
    fn test_token_file_falls_back_to_default() {
        let mut config = ConsultConfig::default();
        assert_eq!(token_file(&config), PathBuf::from(DEFAULT_TOKEN_FILE));

        config.auth.token_file = Some(PathBuf::from("/tmp/consult.json"));
        assert_eq!(token_file(&config), PathBuf::from("/tmp/consult.json"));
    }

    #[tokio::test]
    async fn test_session_uses_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ConsultConfig::default();
        config.auth.token_file = Some(dir.path().join("session.json"));

        let session = open_session(&config).unwrap();
        assert!(session.token_store().get().is_none());
        assert_eq!(session.config().base_url, config.http.base_url);
    }
}
