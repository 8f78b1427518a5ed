use crate::cli::{Cli, OutputFormat};
use crate::inference::InferenceEngine;
use crate::merge::MergeOrder;
use crate::pipeline::EmptyInputPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub local: LocalConfig,
    pub network: NetworkConfig,
    pub output: OutputConfig,
    pub pipeline: PipelineConfig,
    pub inference: InferenceConfig,
}

/// WebDAV source configuration
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL that relative folders are resolved against
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Folders to harvest, in order
    pub folders: Vec<String>,
    /// Content types accepted as XML
    pub content_types: Vec<String>,
}

/// Already-local documents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct LocalConfig {
    pub documents: Vec<PathBuf>,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,
    /// HTTP connect timeout in seconds
    pub connect_timeout_seconds: u64,
    /// Number of retry attempts for transient failures
    pub retry_attempts: u32,
    /// Retry delay in milliseconds
    pub retry_delay_ms: u64,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// Where the generated schema is written
    pub schema_path: Option<PathBuf>,
    /// Report format
    pub format: OutputFormatConfig,
    /// Verbose output
    pub verbose: bool,
    /// Quiet mode (errors only)
    pub quiet: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub merge_order: MergeOrder,
    pub on_empty: EmptyInputPolicy,
    /// Parent of the per-run staging directory; system temp dir when unset
    pub staging_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct InferenceConfig {
    pub engine: InferenceEngine,
    /// Program run by the command engine
    pub program: Option<String>,
    /// Arguments placed before the document list
    pub args: Vec<String>,
}

/// Output format configuration (serializable version of CLI OutputFormat)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatConfig {
    #[default]
    Human,
    Json,
}

impl From<OutputFormat> for OutputFormatConfig {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputFormatConfig::Human,
            OutputFormat::Json => OutputFormatConfig::Json,
        }
    }
}

impl From<OutputFormatConfig> for OutputFormat {
    fn from(format: OutputFormatConfig) -> Self {
        match format {
            OutputFormatConfig::Human => OutputFormat::Human,
            OutputFormatConfig::Json => OutputFormat::Json,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: None,
            username: None,
            password: None,
            folders: vec![],
            content_types: vec![crate::filter::XML_CONTENT_TYPE.to_string()],
        }
    }
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("folders", &self.folders)
            .field("content_types", &self.content_types)
            .finish()
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            retry_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", name, value)))
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        let mut config = Config::default();

        if let Some(config_path) = &cli.config {
            let file_config = Self::load_from_file(config_path).await?;
            config = Self::merge_configs(config, file_config);
        } else if let Some(found_config) = Self::find_config_file().await? {
            config = Self::merge_configs(config, found_config);
        }

        config = Self::apply_environment_overrides(config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub async fn find_config_file() -> Result<Option<Config>> {
        let config_names = [
            "xml-to-xsd.toml",
            "xml-to-xsd.json",
            ".xml-to-xsd.toml",
            ".xml-to-xsd.json",
        ];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("xml-to-xsd");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        // Remote settings
        if let Some(host) = env.get("XML_TO_XSD_HOST") {
            config.remote.host = Some(host);
        }
        if let Some(username) = env.get("XML_TO_XSD_USERNAME") {
            config.remote.username = Some(username);
        }
        if let Some(password) = env.get("XML_TO_XSD_PASSWORD") {
            config.remote.password = Some(password);
        }
        if let Some(folders) = env.get("XML_TO_XSD_FOLDERS") {
            config.remote.folders = split_list(&folders).collect();
        }
        if let Some(content_types) = env.get("XML_TO_XSD_CONTENT_TYPES") {
            config.remote.content_types = split_list(&content_types).collect();
        }

        // Local settings
        if let Some(documents) = env.get("XML_TO_XSD_LOCAL_DOCUMENTS") {
            config.local.documents = split_list(&documents).map(PathBuf::from).collect();
        }

        // Network settings
        if let Some(timeout) = env.get("XML_TO_XSD_TIMEOUT") {
            config.network.timeout_seconds = parse_env("XML_TO_XSD_TIMEOUT", &timeout)?;
        }
        if let Some(timeout) = env.get("XML_TO_XSD_CONNECT_TIMEOUT") {
            config.network.connect_timeout_seconds =
                parse_env("XML_TO_XSD_CONNECT_TIMEOUT", &timeout)?;
        }
        if let Some(retry_attempts) = env.get("XML_TO_XSD_RETRY_ATTEMPTS") {
            config.network.retry_attempts =
                parse_env("XML_TO_XSD_RETRY_ATTEMPTS", &retry_attempts)?;
        }
        if let Some(retry_delay) = env.get("XML_TO_XSD_RETRY_DELAY_MS") {
            config.network.retry_delay_ms = parse_env("XML_TO_XSD_RETRY_DELAY_MS", &retry_delay)?;
        }

        // Output settings
        if let Some(output) = env.get("XML_TO_XSD_OUTPUT") {
            config.output.schema_path = Some(PathBuf::from(output));
        }
        if let Some(verbose) = env.get("XML_TO_XSD_VERBOSE") {
            config.output.verbose = parse_env("XML_TO_XSD_VERBOSE", &verbose)?;
        }
        if let Some(quiet) = env.get("XML_TO_XSD_QUIET") {
            config.output.quiet = parse_env("XML_TO_XSD_QUIET", &quiet)?;
        }
        if let Some(format) = env.get("XML_TO_XSD_FORMAT") {
            config.output.format = match format.to_lowercase().as_str() {
                "human" => OutputFormatConfig::Human,
                "json" => OutputFormatConfig::Json,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid XML_TO_XSD_FORMAT value: {}",
                        format
                    )));
                }
            };
        }

        // Pipeline settings
        if let Some(order) = env.get("XML_TO_XSD_MERGE_ORDER") {
            config.pipeline.merge_order = match order.to_lowercase().as_str() {
                "remote-first" => MergeOrder::RemoteFirst,
                "local-first" => MergeOrder::LocalFirst,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid XML_TO_XSD_MERGE_ORDER value: {}",
                        order
                    )));
                }
            };
        }
        if let Some(policy) = env.get("XML_TO_XSD_ON_EMPTY") {
            config.pipeline.on_empty = match policy.to_lowercase().as_str() {
                "warn" => EmptyInputPolicy::Warn,
                "silent" => EmptyInputPolicy::Silent,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid XML_TO_XSD_ON_EMPTY value: {}",
                        policy
                    )));
                }
            };
        }
        if let Some(staging_dir) = env.get("XML_TO_XSD_STAGING_DIR") {
            config.pipeline.staging_dir = Some(PathBuf::from(staging_dir));
        }

        // Inference settings
        if let Some(engine) = env.get("XML_TO_XSD_ENGINE") {
            config.inference.engine = match engine.to_lowercase().as_str() {
                "native" => InferenceEngine::Native,
                "command" => InferenceEngine::Command,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid XML_TO_XSD_ENGINE value: {}",
                        engine
                    )));
                }
            };
        }
        if let Some(program) = env.get("XML_TO_XSD_INFERENCE_PROGRAM") {
            config.inference.program = Some(program);
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        // Remote settings
        if cli.host.is_some() {
            config.remote.host = cli.host.clone();
        }
        if cli.username.is_some() {
            config.remote.username = cli.username.clone();
        }
        if cli.password.is_some() {
            config.remote.password = cli.password.clone();
        }
        if !cli.folders.is_empty() {
            config.remote.folders = cli.folders.clone();
        }
        if !cli.content_types.is_empty() {
            config.remote.content_types = cli.content_types.clone();
        }

        // Local settings
        if !cli.local_documents.is_empty() {
            config.local.documents = cli.local_documents.clone();
        }

        // Network settings
        if let Some(timeout) = cli.timeout {
            config.network.timeout_seconds = timeout;
        }
        if let Some(timeout) = cli.connect_timeout {
            config.network.connect_timeout_seconds = timeout;
        }
        if let Some(retry_attempts) = cli.retry_attempts {
            config.network.retry_attempts = retry_attempts;
        }

        // Output settings
        if cli.output.is_some() {
            config.output.schema_path = cli.output.clone();
        }
        if let Some(format) = cli.format {
            config.output.format = format.into();
        }
        if cli.verbose {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }

        // Pipeline settings
        if cli.local_first {
            config.pipeline.merge_order = MergeOrder::LocalFirst;
        }
        if cli.silent_empty {
            config.pipeline.on_empty = EmptyInputPolicy::Silent;
        }
        if cli.staging_dir.is_some() {
            config.pipeline.staging_dir = cli.staging_dir.clone();
        }

        // Inference settings
        if let Some(engine) = cli.engine {
            config.inference.engine = engine.into();
        }
        if cli.inference_program.is_some() {
            config.inference.program = cli.inference_program.clone();
        }
        if !cli.inference_args.is_empty() {
            config.inference.args = cli.inference_args.clone();
        }

        config
    }

    /// Merge two configurations (second takes precedence for set values)
    pub fn merge_configs(mut base: Config, override_config: Config) -> Config {
        // Remote settings
        if override_config.remote.host.is_some() {
            base.remote.host = override_config.remote.host;
        }
        if override_config.remote.username.is_some() {
            base.remote.username = override_config.remote.username;
        }
        if override_config.remote.password.is_some() {
            base.remote.password = override_config.remote.password;
        }
        if !override_config.remote.folders.is_empty() {
            base.remote.folders = override_config.remote.folders;
        }
        if !override_config.remote.content_types.is_empty() {
            base.remote.content_types = override_config.remote.content_types;
        }

        // Local settings
        if !override_config.local.documents.is_empty() {
            base.local.documents = override_config.local.documents;
        }

        // Network settings
        base.network = override_config.network;

        // Output settings
        if override_config.output.schema_path.is_some() {
            base.output.schema_path = override_config.output.schema_path;
        }
        base.output.format = override_config.output.format;
        base.output.verbose = override_config.output.verbose;
        base.output.quiet = override_config.output.quiet;

        // Pipeline settings
        base.pipeline.merge_order = override_config.pipeline.merge_order;
        base.pipeline.on_empty = override_config.pipeline.on_empty;
        if override_config.pipeline.staging_dir.is_some() {
            base.pipeline.staging_dir = override_config.pipeline.staging_dir;
        }

        // Inference settings
        base.inference.engine = override_config.inference.engine;
        if override_config.inference.program.is_some() {
            base.inference.program = override_config.inference.program;
        }
        if !override_config.inference.args.is_empty() {
            base.inference.args = override_config.inference.args;
        }

        base
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.output.schema_path.is_none() {
            return Err(ConfigError::Validation(
                "An output schema path is required".to_string(),
            ));
        }

        if config.remote.folders.is_empty() && config.local.documents.is_empty() {
            return Err(ConfigError::Validation(
                "At least one remote folder or local document must be specified".to_string(),
            ));
        }

        // Validate remote settings
        if let Some(host) = &config.remote.host {
            let url = Url::parse(host)
                .map_err(|e| ConfigError::Validation(format!("Invalid host {}: {}", host, e)))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::Validation(format!(
                    "Host must be an http or https URL: {}",
                    host
                )));
            }
        }

        for folder in &config.remote.folders {
            if folder.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "Remote folder must not be empty".to_string(),
                ));
            }
            if !is_absolute_url(folder) && config.remote.host.is_none() {
                return Err(ConfigError::Validation(format!(
                    "Remote folder {} is relative but no host is configured",
                    folder
                )));
            }
        }

        if config.remote.username.is_some() != config.remote.password.is_some() {
            return Err(ConfigError::Validation(
                "Username and password must be given together".to_string(),
            ));
        }

        // Validate network settings
        if config.network.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if config.network.connect_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Connect timeout must be greater than 0".to_string(),
            ));
        }

        if config.network.retry_attempts > 10 {
            return Err(ConfigError::Validation(
                "Retry attempts cannot exceed 10".to_string(),
            ));
        }

        // Validate output settings
        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        // Validate inference settings
        if config.inference.engine == InferenceEngine::Command
            && config
                .inference
                .program
                .as_deref()
                .is_none_or(|p| p.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "The command inference engine requires a program".to_string(),
            ));
        }

        Ok(())
    }
}

/// Whether a folder entry is a full `http(s)://` URL
pub fn is_absolute_url(folder: &str) -> bool {
    Url::parse(folder)
        .map(|url| url.scheme() == "http" || url.scheme() == "https")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Mock environment variable provider for testing
    #[derive(Default)]
    struct MockEnvProvider {
        vars: HashMap<String, String>,
    }

    impl MockEnvProvider {
        fn new() -> Self {
            Self {
                vars: HashMap::new(),
            }
        }

        fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
            self.vars.insert(key.into(), value.into());
        }
    }

    impl EnvProvider for MockEnvProvider {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }
    }

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.remote.host = Some("https://dav.example.com".to_string());
        config.remote.folders = vec!["/in/orders".to_string()];
        config.output.schema_path = Some(PathBuf::from("schema.xsd"));
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.remote.host, None);
        assert!(config.remote.folders.is_empty());
        assert_eq!(config.remote.content_types, vec!["application/xml"]);
        assert!(config.local.documents.is_empty());

        assert_eq!(config.network.timeout_seconds, 30);
        assert_eq!(config.network.connect_timeout_seconds, 10);
        assert_eq!(config.network.retry_attempts, 3);
        assert_eq!(config.network.retry_delay_ms, 1000);

        assert_eq!(config.output.schema_path, None);
        assert_eq!(config.output.format, OutputFormatConfig::Human);
        assert!(!config.output.verbose);
        assert!(!config.output.quiet);

        assert_eq!(config.pipeline.merge_order, MergeOrder::RemoteFirst);
        assert_eq!(config.pipeline.on_empty, EmptyInputPolicy::Warn);
        assert_eq!(config.inference.engine, InferenceEngine::Native);
    }

    #[tokio::test]
    async fn test_load_toml_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let toml_content = r#"
[remote]
host = "https://dav.example.com/webdav/"
username = "harvester"
password = "secret"
folders = ["/in/orders", "https://other.example.com/dav/invoices/"]
content_types = ["application/xml", "text/xml"]

[local]
documents = ["samples/extra.xml"]

[network]
timeout_seconds = 60
connect_timeout_seconds = 5
retry_attempts = 5
retry_delay_ms = 2000

[output]
schema_path = "out/schema.xsd"
format = "json"
verbose = true

[pipeline]
merge_order = "local-first"
on_empty = "silent"
staging_dir = "/var/tmp/xml-to-xsd"

[inference]
engine = "command"
program = "trang"
args = ["-I", "xml"]
"#;

        fs::write(&config_path, toml_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).await.unwrap();

        assert_eq!(
            config.remote.host.as_deref(),
            Some("https://dav.example.com/webdav/")
        );
        assert_eq!(config.remote.username.as_deref(), Some("harvester"));
        assert_eq!(config.remote.folders.len(), 2);
        assert_eq!(config.remote.content_types, vec!["application/xml", "text/xml"]);
        assert_eq!(
            config.local.documents,
            vec![PathBuf::from("samples/extra.xml")]
        );

        assert_eq!(config.network.timeout_seconds, 60);
        assert_eq!(config.network.connect_timeout_seconds, 5);
        assert_eq!(config.network.retry_attempts, 5);
        assert_eq!(config.network.retry_delay_ms, 2000);

        assert_eq!(
            config.output.schema_path,
            Some(PathBuf::from("out/schema.xsd"))
        );
        assert_eq!(config.output.format, OutputFormatConfig::Json);
        assert!(config.output.verbose);
        assert!(!config.output.quiet);

        assert_eq!(config.pipeline.merge_order, MergeOrder::LocalFirst);
        assert_eq!(config.pipeline.on_empty, EmptyInputPolicy::Silent);
        assert_eq!(
            config.pipeline.staging_dir,
            Some(PathBuf::from("/var/tmp/xml-to-xsd"))
        );

        assert_eq!(config.inference.engine, InferenceEngine::Command);
        assert_eq!(config.inference.program.as_deref(), Some("trang"));
        assert_eq!(config.inference.args, vec!["-I", "xml"]);
    }

    #[tokio::test]
    async fn test_load_partial_toml_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        fs::write(
            &config_path,
            "[output]\nschema_path = \"schema.xsd\"\n\n[local]\ndocuments = [\"a.xml\"]\n",
        )
        .unwrap();

        let config = ConfigManager::load_from_file(&config_path).await.unwrap();

        assert_eq!(config.output.schema_path, Some(PathBuf::from("schema.xsd")));
        assert_eq!(config.network, NetworkConfig::default());
        assert_eq!(config.remote.content_types, vec!["application/xml"]);
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_load_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json_content = r#"{
  "remote": {
    "host": "http://localhost:8080/dav/",
    "folders": ["incoming"]
  },
  "network": {
    "timeout_seconds": 45,
    "retry_attempts": 2
  },
  "output": {
    "schema_path": "schema.xsd",
    "quiet": true
  }
}"#;

        fs::write(&config_path, json_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).await.unwrap();

        assert_eq!(
            config.remote.host.as_deref(),
            Some("http://localhost:8080/dav/")
        );
        assert_eq!(config.remote.folders, vec!["incoming"]);
        assert_eq!(config.network.timeout_seconds, 45);
        assert_eq!(config.network.retry_attempts, 2);
        assert_eq!(config.network.connect_timeout_seconds, 10);
        assert!(config.output.quiet);
    }

    #[tokio::test]
    async fn test_unsupported_file_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        fs::write(&config_path, "invalid: yaml").unwrap();

        let result = ConfigManager::load_from_file(&config_path).await;
        assert!(result.is_err());

        match result.unwrap_err() {
            ConfigError::UnsupportedFormat(ext) => assert_eq!(ext, "yaml"),
            _ => panic!("Expected UnsupportedFormat error"),
        }
    }

    #[tokio::test]
    async fn test_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        fs::write(&config_path, "invalid toml [[[").unwrap();

        let result = ConfigManager::load_from_file(&config_path).await;
        assert!(matches!(result.unwrap_err(), ConfigError::TomlParsing(_)));
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        fs::write(&config_path, "{ invalid json }").unwrap();

        let result = ConfigManager::load_from_file(&config_path).await;
        assert!(matches!(result.unwrap_err(), ConfigError::JsonParsing(_)));
    }

    #[test]
    fn test_environment_overrides() {
        let mut mock_env = MockEnvProvider::new();
        mock_env.set("XML_TO_XSD_HOST", "https://env.example.com");
        mock_env.set("XML_TO_XSD_USERNAME", "env-user");
        mock_env.set("XML_TO_XSD_PASSWORD", "env-pass");
        mock_env.set("XML_TO_XSD_FOLDERS", "/a, /b,,");
        mock_env.set("XML_TO_XSD_LOCAL_DOCUMENTS", "one.xml,two.xml");
        mock_env.set("XML_TO_XSD_TIMEOUT", "120");
        mock_env.set("XML_TO_XSD_VERBOSE", "true");
        mock_env.set("XML_TO_XSD_FORMAT", "JSON");
        mock_env.set("XML_TO_XSD_MERGE_ORDER", "local-first");
        mock_env.set("XML_TO_XSD_ON_EMPTY", "silent");
        mock_env.set("XML_TO_XSD_ENGINE", "command");
        mock_env.set("XML_TO_XSD_INFERENCE_PROGRAM", "trang");

        let config =
            ConfigManager::apply_environment_overrides_with(&mock_env, Config::default()).unwrap();

        assert_eq!(config.remote.host.as_deref(), Some("https://env.example.com"));
        assert_eq!(config.remote.username.as_deref(), Some("env-user"));
        assert_eq!(config.remote.password.as_deref(), Some("env-pass"));
        assert_eq!(config.remote.folders, vec!["/a", "/b"]);
        assert_eq!(
            config.local.documents,
            vec![PathBuf::from("one.xml"), PathBuf::from("two.xml")]
        );
        assert_eq!(config.network.timeout_seconds, 120);
        assert!(config.output.verbose);
        assert_eq!(config.output.format, OutputFormatConfig::Json);
        assert_eq!(config.pipeline.merge_order, MergeOrder::LocalFirst);
        assert_eq!(config.pipeline.on_empty, EmptyInputPolicy::Silent);
        assert_eq!(config.inference.engine, InferenceEngine::Command);
        assert_eq!(config.inference.program.as_deref(), Some("trang"));
    }

    #[test]
    fn test_invalid_environment_values() {
        for (key, value) in [
            ("XML_TO_XSD_TIMEOUT", "soon"),
            ("XML_TO_XSD_FORMAT", "yaml"),
            ("XML_TO_XSD_MERGE_ORDER", "sideways"),
            ("XML_TO_XSD_ENGINE", "magic"),
        ] {
            let mut mock_env = MockEnvProvider::new();
            mock_env.set(key, value);

            let result =
                ConfigManager::apply_environment_overrides_with(&mock_env, Config::default());
            assert!(
                matches!(result, Err(ConfigError::Environment(_))),
                "{} should be rejected",
                key
            );
        }
    }

    #[test]
    fn test_merge_with_cli() {
        use clap::Parser;

        let cli = Cli::try_parse_from([
            "xml-to-xsd",
            "--host",
            "https://cli.example.com",
            "-f",
            "/x",
            "-o",
            "cli.xsd",
            "--timeout",
            "90",
            "--format",
            "json",
            "--local-first",
            "--silent-empty",
            "--verbose",
        ])
        .unwrap();

        let mut base = valid_config();
        base.network.retry_attempts = 7;
        let config = ConfigManager::merge_with_cli(base, &cli);

        assert_eq!(config.remote.host.as_deref(), Some("https://cli.example.com"));
        assert_eq!(config.remote.folders, vec!["/x"]);
        assert_eq!(config.output.schema_path, Some(PathBuf::from("cli.xsd")));
        assert_eq!(config.network.timeout_seconds, 90);
        assert_eq!(config.output.format, OutputFormatConfig::Json);
        assert_eq!(config.pipeline.merge_order, MergeOrder::LocalFirst);
        assert_eq!(config.pipeline.on_empty, EmptyInputPolicy::Silent);
        assert!(config.output.verbose);
        // Flags not given leave the configured value alone
        assert_eq!(config.network.retry_attempts, 7);
    }

    #[test]
    fn test_quiet_flag_overrides_configured_verbose() {
        let mut base = valid_config();
        base.output.verbose = true;
        let cli = Cli {
            quiet: true,
            ..Cli::default()
        };

        let config = ConfigManager::merge_with_cli(base, &cli);
        assert!(config.output.quiet);
        assert!(!config.output.verbose);
    }

    #[test]
    fn test_merge_configs() {
        let mut base = Config::default();
        base.remote.host = Some("https://base.example.com".to_string());
        base.remote.folders = vec!["/base".to_string()];

        let mut override_config = Config::default();
        override_config.remote.folders = vec!["/override".to_string()];
        override_config.network.timeout_seconds = 60;

        let merged = ConfigManager::merge_configs(base, override_config);

        assert_eq!(merged.remote.folders, vec!["/override"]); // Override wins
        assert_eq!(merged.network.timeout_seconds, 60); // Override wins
        // Unset keeps base
        assert_eq!(
            merged.remote.host.as_deref(),
            Some("https://base.example.com")
        );
    }

    #[test]
    fn test_config_validation() {
        let config = valid_config();
        assert!(ConfigManager::validate_config(&config).is_ok());

        // Missing output path
        let mut invalid = config.clone();
        invalid.output.schema_path = None;
        assert!(ConfigManager::validate_config(&invalid).is_err());

        // Nothing to harvest
        let mut invalid = config.clone();
        invalid.remote.folders.clear();
        assert!(ConfigManager::validate_config(&invalid).is_err());

        // Relative folder without host
        let mut invalid = config.clone();
        invalid.remote.host = None;
        assert!(ConfigManager::validate_config(&invalid).is_err());

        // Absolute folder needs no host
        let mut valid = config.clone();
        valid.remote.host = None;
        valid.remote.folders = vec!["https://dav.example.com/in/".to_string()];
        assert!(ConfigManager::validate_config(&valid).is_ok());

        // Non-http host
        let mut invalid = config.clone();
        invalid.remote.host = Some("ftp://files.example.com".to_string());
        assert!(ConfigManager::validate_config(&invalid).is_err());

        // Username without password
        let mut invalid = config.clone();
        invalid.remote.username = Some("user".to_string());
        assert!(ConfigManager::validate_config(&invalid).is_err());

        // Invalid timeout
        let mut invalid = config.clone();
        invalid.network.timeout_seconds = 0;
        assert!(ConfigManager::validate_config(&invalid).is_err());

        // Too many retries
        let mut invalid = config.clone();
        invalid.network.retry_attempts = 11;
        assert!(ConfigManager::validate_config(&invalid).is_err());

        // Invalid verbose + quiet
        let mut invalid = config.clone();
        invalid.output.verbose = true;
        invalid.output.quiet = true;
        assert!(ConfigManager::validate_config(&invalid).is_err());

        // Command engine without a program
        let mut invalid = config.clone();
        invalid.inference.engine = InferenceEngine::Command;
        assert!(ConfigManager::validate_config(&invalid).is_err());
        invalid.inference.program = Some("trang".to_string());
        assert!(ConfigManager::validate_config(&invalid).is_ok());
    }

    #[test]
    fn test_local_only_config_is_valid() {
        let mut config = Config::default();
        config.local.documents = vec![PathBuf::from("a.xml")];
        config.output.schema_path = Some(PathBuf::from("schema.xsd"));
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[test]
    fn test_password_is_redacted_in_debug() {
        let mut config = valid_config();
        config.remote.username = Some("user".to_string());
        config.remote.password = Some("hunter2".to_string());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_is_absolute_url() {
        assert!(is_absolute_url("https://dav.example.com/in/"));
        assert!(is_absolute_url("HTTPS://dav.example.com/in/"));
        assert!(!is_absolute_url("/in/orders"));
        assert!(!is_absolute_url("ftp://dav.example.com/in/"));
    }

    #[test]
    fn test_output_format_conversion() {
        assert_eq!(
            OutputFormatConfig::from(OutputFormat::Human),
            OutputFormatConfig::Human
        );
        assert_eq!(
            OutputFormatConfig::from(OutputFormat::Json),
            OutputFormatConfig::Json
        );
        assert_eq!(
            OutputFormat::from(OutputFormatConfig::Json),
            OutputFormat::Json
        );
    }

    #[tokio::test]
    async fn test_load_config_integration() {
        use clap::Parser;

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        let toml_content = r#"
[remote]
host = "https://dav.example.com"
folders = ["/in"]

[network]
timeout_seconds = 45
retry_attempts = 2

[output]
schema_path = "file.xsd"
"#;
        fs::write(&config_path, toml_content).unwrap();

        let cli = Cli::try_parse_from([
            "xml-to-xsd",
            "--config",
            config_path.to_str().unwrap(),
            "--retry-attempts",
            "5",
            "-o",
            "cli.xsd",
        ])
        .unwrap();
        let config = ConfigManager::load_config(&cli).await.unwrap();

        // CLI overrides the file
        assert_eq!(config.network.retry_attempts, 5);
        assert_eq!(config.output.schema_path, Some(PathBuf::from("cli.xsd")));
        // File values survive where the CLI is silent
        assert_eq!(config.network.timeout_seconds, 45);
        assert_eq!(config.remote.folders, vec!["/in"]);
    }
}
