use config::{Config, File, FileFormat};
pub use config::ConfigError;
use log::{debug, info};
use serde::Deserialize;

use crate::grid::{GridConfig, GridError, GridResult, InstrumentPrecision};

/// Main configuration struct
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
    /// One entry per traded instrument
    #[serde(default)]
    pub instruments: Vec<InstrumentSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentSettings {
    /// Instrument symbol (e.g. "BTC", "ETH-PERP")
    pub symbol: String,
    /// Exchange increments for the instrument
    #[serde(default)]
    pub precision: InstrumentPrecision,
    /// Grid geometry, regime, policy, funding and diff parameters
    pub grid: GridConfig,
}

impl Settings {
    /// Load settings from a configuration file
    ///
    /// A `.env` file is loaded first when present, then the file source is
    /// read and overlaid with `APP_`-prefixed environment variables
    /// (e.g. `APP_LOG__LEVEL=debug`).
    pub fn new(config_path: &str) -> GridResult<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from: {}", path.display()),
            Err(_) => debug!("No .env file found, using system environment variables"),
        }

        let s = Config::builder()
            .add_source(File::with_name(config_path))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let settings: Self = s.try_deserialize()?;
        settings.validate()?;
        info!(
            "Loaded {} instruments from {}",
            settings.instruments.len(),
            config_path
        );
        Ok(settings)
    }

    /// Parse settings from an in-memory TOML document
    pub fn from_toml_str(contents: &str) -> GridResult<Self> {
        let s = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?;

        let settings: Self = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate every instrument and reject duplicate symbols
    pub fn validate(&self) -> GridResult<()> {
        let mut seen = std::collections::HashSet::new();
        for instrument in &self.instruments {
            if instrument.symbol.trim().is_empty() {
                return Err(GridError::InvalidConfig("instrument symbol is empty".into()));
            }
            if !seen.insert(instrument.symbol.as_str()) {
                return Err(GridError::InvalidConfig(format!(
                    "duplicate instrument: {}",
                    instrument.symbol
                )));
            }
            instrument.precision.validate()?;
            instrument.grid.validate().map_err(|e| match e {
                GridError::InvalidConfig(msg) => {
                    GridError::InvalidConfig(format!("{}: {}", instrument.symbol, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Initialize `env_logger`, defaulting `RUST_LOG` to the configured level
    pub fn init_logging(&self) {
        if std::env::var("RUST_LOG").is_err() {
            std::env::set_var("RUST_LOG", &self.log.level);
        }
        env_logger::try_init().ok();
    }

    pub fn instrument(&self, symbol: &str) -> Option<&InstrumentSettings> {
        self.instruments.iter().find(|i| i.symbol == symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::PolicyKind;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
        [log]
        level = "debug"

        [[instruments]]
        symbol = "BTC"

        [instruments.precision]
        tick_size = "0.5"
        step_size = "0.001"
        min_notional = "10"

        [instruments.grid]
        step_bps = "25"
        levels_long = 5
        levels_short = 4
        base_qty = "0.01"
        qty_scale = "1.2"

        [instruments.grid.policy]
        name = "core-and-scalp"
        core_levels = 2

        [[instruments]]
        symbol = "ETH"

        [instruments.grid]
        step_bps = "40"
        levels_long = 3
        levels_short = 3
        base_qty = "0.1"
    "#;

    #[test]
    fn test_from_toml_str() {
        let settings = Settings::from_toml_str(SAMPLE).unwrap();
        assert_eq!(settings.log.level, "debug");
        assert_eq!(settings.instruments.len(), 2);

        let btc = settings.instrument("BTC").unwrap();
        assert_eq!(btc.precision.tick_size, dec!(0.5));
        assert_eq!(btc.grid.step_bps, dec!(25));
        assert_eq!(btc.grid.qty_scale, dec!(1.2));
        assert_eq!(btc.grid.policy.name, PolicyKind::CoreAndScalp);
        assert_eq!(btc.grid.policy.core_levels, 2);

        let eth = settings.instrument("ETH").unwrap();
        assert_eq!(eth.precision, InstrumentPrecision::default());
        assert_eq!(eth.grid.qty_scale, dec!(1));
        assert_eq!(eth.grid.regime.slow_window, 50);
    }

    #[test]
    fn test_defaults_when_empty() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings.log.level, "info");
        assert!(settings.instruments.is_empty());
    }

    #[test]
    fn test_duplicate_symbol_rejected() {
        let doc = r#"
            [[instruments]]
            symbol = "SOL"
            [instruments.grid]
            step_bps = "10"
            levels_long = 2
            levels_short = 2
            base_qty = "1"

            [[instruments]]
            symbol = "SOL"
            [instruments.grid]
            step_bps = "20"
            levels_long = 2
            levels_short = 2
            base_qty = "1"
        "#;
        assert_eq!(
            Settings::from_toml_str(doc).err(),
            Some(GridError::InvalidConfig("duplicate instrument: SOL".into()))
        );
    }

    #[test]
    fn test_invalid_grid_names_symbol() {
        let doc = r#"
            [[instruments]]
            symbol = "DOGE"
            [instruments.grid]
            step_bps = "10"
            levels_long = 2
            levels_short = 2
            base_qty = "1"
            qty_scale = "0.8"
        "#;
        match Settings::from_toml_str(doc) {
            Err(GridError::InvalidConfig(msg)) => assert!(msg.starts_with("DOGE:")),
            other => panic!("expected invalid config, got {:?}", other),
        }
    }
}
