use crate::{error::Result, relations::RelationTable};
use ::config::builder::DefaultState;
use ::config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable prefix, e.g. `AUTH_REBAC__USE_STREAMED_LIST_OBJECTS=true`
pub const ENV_PREFIX: &str = "AUTH_REBAC";

/// Authorization engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// List through the backend's streaming primitive instead of the bulk call
    #[serde(default)]
    pub use_streamed_list_objects: bool,

    /// Issue folder and direct listings of generic resources concurrently
    #[serde(default = "default_true")]
    pub concurrent_generic_listing: bool,

    /// Deadline applied to every check/list request
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    /// Cache namespace -> store resolutions
    #[serde(default = "default_true")]
    pub cache_store_resolution: bool,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Relation tables; the standard tables are used when absent
    #[serde(default)]
    pub relations: Option<RelationTable>,
}

/// Log output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Structured JSON output instead of human-readable lines
    #[serde(default)]
    pub json: bool,

    /// Extra `EnvFilter` directives, e.g. `auth_rebac::engine=trace`
    #[serde(default)]
    pub directives: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_streamed_list_objects: false,
            concurrent_generic_listing: true,
            request_timeout_ms: None,
            cache_store_resolution: true,
            logging: LoggingConfig::default(),
            relations: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directives: None,
        }
    }
}

impl EngineConfig {
    /// Load from an optional config file, overridden by `AUTH_REBAC__*` variables
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
        Self::build(builder)
    }

    /// Parse configuration from a string in the given format
    pub fn parse(contents: &str, format: FileFormat) -> Result<Self> {
        Self::build(Config::builder().add_source(File::from_str(contents, format)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.relation_table()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Validated relation tables for the engine
    pub fn relation_table(&self) -> Result<RelationTable> {
        let table = self.relations.clone().unwrap_or_else(RelationTable::standard);
        table.validate()?;
        Ok(table)
    }
}
