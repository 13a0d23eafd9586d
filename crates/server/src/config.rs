//! Shell configuration
//!
//! Settings come from command-line flags and, optionally, a config file given
//! with `--config`. The file is TOML unless its extension is `.json`; keys are
//! the flag names (`importer-addr`, `session-id`, ...). Flags win over the file.
//!
//! ```toml
//! importer-addr = "127.0.0.1:8287"
//! session-id = "123e4567-e89b-12d3-a456-426614174000"
//! batch-size = 1024
//! key-num = 100000
//! addr = "127.0.0.1:8289"
//! ```

use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Arg, ArgMatches, Command};
use lightning_client::{ClientOptions, DEFAULT_BATCH_SIZE};
use lightning_core::SessionId;
use serde::{Deserialize, Serialize};

use crate::workload::Workload;

/// Default listen address of the status endpoint
pub const DEFAULT_STATUS_ADDR: &str = "127.0.0.1:8289";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `--help` or `--version` was requested; carries the rendered text
    #[error("{0}")]
    Help(String),

    /// Flags could not be parsed
    #[error("parse cmd flags err: {0}")]
    Flags(String),

    /// Config file unreadable or malformed
    #[error("failed to load config file '{path}': {reason}")]
    File { path: String, reason: String },

    /// Missing or invalid setting
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<lightning_core::Error> for ConfigError {
    fn from(e: lightning_core::Error) -> Self {
        match e {
            lightning_core::Error::Config { reason } => ConfigError::Invalid(reason),
            other => ConfigError::Invalid(other.to_string()),
        }
    }
}

/// Build the flag parser
pub fn build_cli() -> Command {
    Command::new("lightning")
        .about("Bulk key-value ingestion client for import engines")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("TOML or JSON config file path"),
        )
        .arg(
            Arg::new("importer-addr")
                .long("importer-addr")
                .value_name("ADDR")
                .help("Import engine address (required)"),
        )
        .arg(
            Arg::new("session-id")
                .long("session-id")
                .value_name("UUID")
                .help("Session id in UUID form (required)"),
        )
        .arg(
            Arg::new("key")
                .long("key")
                .help("Key of a single put to ingest"),
        )
        .arg(
            Arg::new("value")
                .long("value")
                .help("Value of the single put (requires --key)"),
        )
        .arg(
            Arg::new("key-num")
                .long("key-num")
                .value_name("N")
                .value_parser(clap::value_parser!(u64))
                .help("Number of random key-value pairs to generate (default: 0)"),
        )
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .value_name("N")
                .value_parser(clap::value_parser!(usize))
                .help("Mutations per write batch (default: 1024)"),
        )
        .arg(
            Arg::new("addr")
                .long("addr")
                .value_name("ADDR")
                .help("Status HTTP listen address (default: 127.0.0.1:8289)"),
        )
}

/// Raw settings as they appear in a config file or on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RawConfig {
    #[serde(alias = "importer_addr")]
    pub importer_addr: Option<String>,
    #[serde(alias = "session_id")]
    pub session_id: Option<String>,
    pub key: Option<String>,
    pub value: Option<String>,
    #[serde(alias = "key_num")]
    pub key_num: Option<u64>,
    #[serde(alias = "batch_size")]
    pub batch_size: Option<usize>,
    pub addr: Option<String>,
}

impl RawConfig {
    /// Read and parse a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file_err = |reason: String| ConfigError::File {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| file_err(e.to_string()))?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            serde_json::from_str(&content).map_err(|e| file_err(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| file_err(e.to_string()))
        }
    }

    /// Settings given as flags
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let string = |id: &str| matches.get_one::<String>(id).cloned();
        RawConfig {
            importer_addr: string("importer-addr"),
            session_id: string("session-id"),
            key: string("key"),
            value: string("value"),
            key_num: matches.get_one::<u64>("key-num").copied(),
            batch_size: matches.get_one::<usize>("batch-size").copied(),
            addr: string("addr"),
        }
    }

    /// Overlay `overrides` on top of `self`; set fields in `overrides` win
    pub fn merge(self, overrides: RawConfig) -> RawConfig {
        RawConfig {
            importer_addr: overrides.importer_addr.or(self.importer_addr),
            session_id: overrides.session_id.or(self.session_id),
            key: overrides.key.or(self.key),
            value: overrides.value.or(self.value),
            key_num: overrides.key_num.or(self.key_num),
            batch_size: overrides.batch_size.or(self.batch_size),
            addr: overrides.addr.or(self.addr),
        }
    }
}

/// Validated shell configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Import engine address
    pub importer_addr: String,
    /// Session (and engine) identifier
    pub session_id: SessionId,
    /// Key of the single put, if any
    pub key: Option<String>,
    /// Value of the single put
    pub value: Option<String>,
    /// Number of generated random puts
    pub key_num: u64,
    /// Mutations per write batch
    pub batch_size: usize,
    /// Status endpoint listen address
    pub addr: SocketAddr,
    /// Config file the settings were read from
    pub config_file: Option<PathBuf>,
}

impl ShellConfig {
    /// Parse process arguments (including the program name)
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = build_cli().try_get_matches_from(args).map_err(|e| {
            use clap::error::ErrorKind;
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    ConfigError::Help(e.render().to_string())
                }
                _ => ConfigError::Flags(e.to_string()),
            }
        })?;

        let flags = RawConfig::from_matches(&matches);
        let config_file = matches.get_one::<String>("config").map(PathBuf::from);
        let raw = match &config_file {
            Some(path) => RawConfig::from_file(path)?.merge(flags),
            None => flags,
        };
        Self::resolve(raw, config_file)
    }

    /// Validate raw settings
    pub fn resolve(raw: RawConfig, config_file: Option<PathBuf>) -> Result<Self, ConfigError> {
        let importer_addr = non_empty(raw.importer_addr)
            .ok_or_else(|| ConfigError::Invalid("importer-addr is required".to_string()))?;
        let session_id = non_empty(raw.session_id)
            .ok_or_else(|| ConfigError::Invalid("session-id is required".to_string()))?;
        let session_id = SessionId::parse(&session_id)?;

        let key = non_empty(raw.key);
        let value = raw.value;
        if key.is_none() && value.as_deref().map_or(false, |v| !v.is_empty()) {
            return Err(ConfigError::Invalid("value given without key".to_string()));
        }

        let batch_size = raw.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batch-size must be at least 1".to_string(),
            ));
        }

        let addr = raw
            .addr
            .unwrap_or_else(|| DEFAULT_STATUS_ADDR.to_string());
        let addr = addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid(format!("invalid addr '{}': {}", addr, e)))?;

        Ok(ShellConfig {
            importer_addr,
            session_id,
            key,
            value,
            key_num: raw.key_num.unwrap_or(0),
            batch_size,
            addr,
            config_file,
        })
    }

    /// Client options derived from this configuration
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::default().with_batch_size(self.batch_size)
    }

    /// Mutations this configuration asks to ingest
    pub fn workload(&self) -> Workload {
        let single = self
            .key
            .as_ref()
            .map(|k| (k.clone(), self.value.clone().unwrap_or_default()));
        Workload::new(single, self.key_num)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
