//! Startup configuration.
//!
//! Every setting is a command-line flag backed by an `XMLRELAY_*`
//! environment variable. [`RelayConfig::validate`] performs the fail-fast
//! checks; nothing is read lazily once the worker starts.

use crate::relay::{
    adapters::spool::{SpoolChannel, SpoolError, SpoolRoot},
    schema::{Schema, SchemaError},
    services::ErrorPolicy,
};
use crate::telemetry::LogFormat;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Namespace the bundled record schema targets.
pub const DEFAULT_SCHEMA_NAMESPACE: &str = "http://example.com/record";
/// Namespace valid documents are moved into.
pub const DEFAULT_TARGET_NAMESPACE: &str = "http://example.com/new-namespace";
/// Schema location relative to the executable's directory.
pub const DEFAULT_SCHEMA_FILE: &str = "schemas/record.xsd";

const SPOOL_SCHEME: &str = "spool://";

/// Errors that make startup fail.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A required setting is absent or blank.
    #[error("missing required setting {setting}")]
    Missing {
        /// Environment variable naming the setting.
        setting: &'static str,
    },

    /// The connection string names an unsupported transport.
    #[error("unsupported connection '{0}'; expected spool://<directory>")]
    InvalidConnection(String),

    /// A setting has a value the relay cannot use.
    #[error("invalid value for {setting}: {reason}")]
    Invalid {
        /// Environment variable naming the setting.
        setting: &'static str,
        /// Why the value was refused.
        reason: String,
    },

    /// The schema file could not be loaded.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The spool could not be opened.
    #[error(transparent)]
    Spool(#[from] SpoolError),
}

/// Raw settings as given on the command line or in the environment.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "xmlrelay", version, about = "Validate, re-namespace and relay XML messages")]
pub struct RelayConfig {
    /// Transport connection: spool://<directory> or a bare directory.
    #[arg(long, env = "XMLRELAY_CONNECTION")]
    pub connection: Option<String>,

    /// Channel messages are read from.
    #[arg(long, env = "XMLRELAY_INPUT_QUEUE")]
    pub input_queue: Option<String>,

    /// Channel transformed documents are published to.
    #[arg(long, env = "XMLRELAY_OUTPUT_QUEUE")]
    pub output_queue: Option<String>,

    /// Channel for error records. Setting it selects fail-open mode.
    #[arg(long, env = "XMLRELAY_ERROR_QUEUE")]
    pub error_queue: Option<String>,

    /// XSD file. Defaults to schemas/record.xsd next to the executable.
    #[arg(long, env = "XMLRELAY_SCHEMA_PATH")]
    pub schema_path: Option<Utf8PathBuf>,

    /// Namespace the schema file must target.
    #[arg(long, env = "XMLRELAY_SCHEMA_NAMESPACE")]
    pub schema_namespace: Option<String>,

    /// Namespace every element is moved into.
    #[arg(long, env = "XMLRELAY_TARGET_NAMESPACE")]
    pub target_namespace: Option<String>,

    /// Upper bound on concurrently processed messages.
    #[arg(long, env = "XMLRELAY_MAX_IN_FLIGHT", default_value_t = 16)]
    pub max_in_flight: usize,

    /// Poll the input channel at this interval. Without it the input is
    /// drained once.
    #[arg(long, env = "XMLRELAY_POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Log output format.
    #[arg(long, env = "XMLRELAY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Checked configuration the relay runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedConfig {
    /// Spool root directory.
    pub spool_root: Utf8PathBuf,
    /// Input channel name.
    pub input_queue: String,
    /// Output channel name.
    pub output_queue: String,
    /// Error channel name; `Some` means fail-open.
    pub error_queue: Option<String>,
    /// XSD file.
    pub schema_path: Utf8PathBuf,
    /// Namespace the schema must target.
    pub schema_namespace: String,
    /// Namespace documents are moved into.
    pub target_namespace: String,
    /// Concurrency bound, at least one.
    pub max_in_flight: usize,
    /// Polling interval; `None` drains once.
    pub poll_interval: Option<Duration>,
}

impl RelayConfig {
    /// Checks every setting and resolves defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Missing`] for the first required
    /// setting that is absent or blank, and [`ConfigurationError::Invalid`]
    /// or [`ConfigurationError::InvalidConnection`] for unusable values.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigurationError> {
        let connection = required(self.connection.as_deref(), "XMLRELAY_CONNECTION")?;
        let spool_root = parse_connection(&connection)?;
        let input_queue = required(self.input_queue.as_deref(), "XMLRELAY_INPUT_QUEUE")?;
        let output_queue = required(self.output_queue.as_deref(), "XMLRELAY_OUTPUT_QUEUE")?;
        let error_queue = present(self.error_queue.as_deref());
        if input_queue == output_queue || error_queue.as_ref() == Some(&input_queue) {
            return Err(ConfigurationError::Invalid {
                setting: "XMLRELAY_INPUT_QUEUE",
                reason: format!("'{input_queue}' must differ from the output and error queues"),
            });
        }

        if self.max_in_flight == 0 {
            return Err(ConfigurationError::Invalid {
                setting: "XMLRELAY_MAX_IN_FLIGHT",
                reason: "must be at least 1".to_owned(),
            });
        }
        let poll_interval = match self.poll_interval_ms {
            Some(0) => {
                return Err(ConfigurationError::Invalid {
                    setting: "XMLRELAY_POLL_INTERVAL_MS",
                    reason: "must be at least 1".to_owned(),
                });
            }
            Some(millis) => Some(Duration::from_millis(millis)),
            None => None,
        };

        let schema_path = match self.schema_path.as_deref() {
            Some(path) if !path.as_str().trim().is_empty() => path.to_owned(),
            _ => default_schema_path()?,
        };

        Ok(ValidatedConfig {
            spool_root,
            input_queue,
            output_queue,
            error_queue,
            schema_path,
            schema_namespace: present(self.schema_namespace.as_deref())
                .unwrap_or_else(|| DEFAULT_SCHEMA_NAMESPACE.to_owned()),
            target_namespace: present(self.target_namespace.as_deref())
                .unwrap_or_else(|| DEFAULT_TARGET_NAMESPACE.to_owned()),
            max_in_flight: self.max_in_flight,
            poll_interval,
        })
    }
}

impl ValidatedConfig {
    /// Returns `true` when an error channel is configured.
    #[must_use]
    pub const fn is_fail_open(&self) -> bool {
        self.error_queue.is_some()
    }

    /// Loads the schema and checks its target namespace.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Schema`] when the file is missing,
    /// unreadable, unsupported or bound to another namespace.
    pub fn load_schema(&self) -> Result<Schema, ConfigurationError> {
        Ok(Schema::load(&self.schema_path, &self.schema_namespace)?)
    }

    /// Opens the spool root, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Spool`] when the directory cannot be
    /// created or opened.
    pub fn open_spool(&self) -> Result<SpoolRoot, ConfigurationError> {
        Ok(SpoolRoot::open(&self.spool_root)?)
    }

    /// Builds the failure policy: fail-open with an error channel,
    /// fail-closed without one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Spool`] when the error channel cannot
    /// be opened.
    pub fn error_policy(
        &self,
        spool: &SpoolRoot,
    ) -> Result<ErrorPolicy<SpoolChannel>, ConfigurationError> {
        match self.error_queue.as_deref() {
            Some(name) => Ok(ErrorPolicy::RouteToErrorChannel(Arc::new(
                spool.channel(name)?,
            ))),
            None => Ok(ErrorPolicy::Propagate),
        }
    }
}

fn present(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_owned)
}

fn required(value: Option<&str>, setting: &'static str) -> Result<String, ConfigurationError> {
    present(value).ok_or(ConfigurationError::Missing { setting })
}

fn parse_connection(connection: &str) -> Result<Utf8PathBuf, ConfigurationError> {
    if let Some(path) = connection.strip_prefix(SPOOL_SCHEME) {
        if path.is_empty() {
            return Err(ConfigurationError::InvalidConnection(connection.to_owned()));
        }
        return Ok(Utf8PathBuf::from(path));
    }
    if connection.contains("://") {
        return Err(ConfigurationError::InvalidConnection(connection.to_owned()));
    }
    Ok(Utf8PathBuf::from(connection))
}

fn default_schema_path() -> Result<Utf8PathBuf, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::Invalid {
        setting: "XMLRELAY_SCHEMA_PATH",
        reason,
    };
    let exe = std::env::current_exe().map_err(|err| invalid(err.to_string()))?;
    let exe_path = Utf8PathBuf::from_path_buf(exe)
        .map_err(|_| invalid("executable path is not valid UTF-8".to_owned()))?;
    let dir = exe_path.parent().unwrap_or_else(|| Utf8Path::new("."));
    Ok(dir.join(DEFAULT_SCHEMA_FILE))
}
