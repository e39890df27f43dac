//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use common::{Money, Rate};
use domain::{CommerceSettings, StockPolicy};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` (default `0.0.0.0`), `PORT` (default `3000`)
/// - `RUST_LOG` (default `info`), `LOG_FORMAT` (`pretty` or `json`)
/// - `DATABASE_URL`: Postgres connection; unset runs on the in-memory store
/// - `TAX_RATE_BPS`, `FREE_SHIPPING_THRESHOLD`, `FLAT_SHIPPING_FEE` (minor units)
/// - `MAX_LINE_QUANTITY`, `LOW_STOCK_THRESHOLD`, `ESTIMATED_DELIVERY_DAYS`
/// - `STOCK_POLICY` (`manual`, `reserve_on_create`, `reserve_on_ship`)
/// - `ADMIN_EMAIL`, `WRITE_RETRIES`, `LOW_STOCK_SWEEP_SECS`
///
/// Values that fail to parse fall back to the default with a warning.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub commerce: CommerceSettings,
    pub low_stock_sweep: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let commerce = defaults.commerce.clone();
        let vars = Vars { lookup };

        Self {
            host: vars.string("HOST").unwrap_or(defaults.host),
            port: vars.parse("PORT", defaults.port),
            log_level: vars.string("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: vars.parse("LOG_FORMAT", defaults.log_format),
            database_url: vars.string("DATABASE_URL"),
            commerce: CommerceSettings {
                tax_rate: Rate::from_bps(vars.parse("TAX_RATE_BPS", commerce.tax_rate.bps())),
                free_shipping_threshold: Money::from_minor(vars.parse(
                    "FREE_SHIPPING_THRESHOLD",
                    commerce.free_shipping_threshold.minor(),
                )),
                flat_shipping_fee: Money::from_minor(
                    vars.parse("FLAT_SHIPPING_FEE", commerce.flat_shipping_fee.minor()),
                ),
                max_line_quantity: vars
                    .parse("MAX_LINE_QUANTITY", commerce.max_line_quantity)
                    .max(1),
                low_stock_threshold: vars.parse("LOW_STOCK_THRESHOLD", commerce.low_stock_threshold),
                estimated_delivery_days: vars
                    .parse("ESTIMATED_DELIVERY_DAYS", commerce.estimated_delivery_days),
                stock_policy: vars.parse::<StockPolicy>("STOCK_POLICY", commerce.stock_policy),
                admin_email: vars.string("ADMIN_EMAIL").unwrap_or(commerce.admin_email),
                write_retries: vars.parse("WRITE_RETRIES", commerce.write_retries).max(1),
            },
            low_stock_sweep: Duration::from_secs(
                vars.parse("LOW_STOCK_SWEEP_SECS", defaults.low_stock_sweep.as_secs())
                    .max(1),
            ),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            commerce: CommerceSettings::default(),
            low_stock_sweep: Duration::from_secs(24 * 60 * 60),
        }
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr + std::fmt::Debug,
    {
        let Some(raw) = self.string(key) else {
            return default;
        };
        match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, ?default, "unparseable config value, using default");
                default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
        assert_eq!(config.commerce.tax_rate, Rate::from_bps(1800));
        assert_eq!(config.commerce.free_shipping_threshold, Money::from_minor(99_900));
        assert_eq!(config.commerce.flat_shipping_fee, Money::from_minor(4_000));
        assert_eq!(config.commerce.stock_policy, StockPolicy::Manual);
        assert_eq!(config.low_stock_sweep, Duration::from_secs(86_400));
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_reads_overrides() {
        let config = config_from(&[
            ("PORT", "8081"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("TAX_RATE_BPS", "500"),
            ("STOCK_POLICY", "reserve_on_ship"),
            ("ADMIN_EMAIL", "ops@example.com"),
            ("LOW_STOCK_SWEEP_SECS", "60"),
        ]);
        assert_eq!(config.port, 8081);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/shop"));
        assert_eq!(config.commerce.tax_rate, Rate::from_bps(500));
        assert_eq!(config.commerce.stock_policy, StockPolicy::ReserveOnShip);
        assert_eq!(config.commerce.admin_email, "ops@example.com");
        assert_eq!(config.low_stock_sweep, Duration::from_secs(60));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = config_from(&[
            ("PORT", "eighty"),
            ("STOCK_POLICY", "sometimes"),
            ("MAX_LINE_QUANTITY", "-3"),
            ("DATABASE_URL", "  "),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.commerce.stock_policy, StockPolicy::Manual);
        assert_eq!(config.commerce.max_line_quantity, 10);
        assert!(config.database_url.is_none());
    }
}
