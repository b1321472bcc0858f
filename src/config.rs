// document-toolkit/src/config.rs

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub job: JobConfig,
    pub output: OutputConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub request_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub dir: String,
}

/// Layout knobs shared by the invoice and stock renderers.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    pub currency_symbol: String,
    /// Continue item rows on a new page instead of drawing past the bottom edge.
    pub paginate_overflow: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            currency_symbol: "$".to_string(),
            paginate_overflow: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            // Start with default values
            .set_default("service.name", "document-toolkit")?
            .set_default("service.log_level", "info")?
            .set_default("job.request_path", "request.json")?
            .set_default("output.dir", "./out")?
            .set_default("render.currency_symbol", "$")?
            .set_default("render.paginate_overflow", true)?
            // Load from config file if it exists
            .add_source(File::with_name("config").required(false))
            // Override with environment variables (e.g., SERVICE__OUTPUT__DIR)
            .add_source(Environment::with_prefix("SERVICE").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
