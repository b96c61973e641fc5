//! Configuration for accessors and the clients behind them.
//!
//! Two independent surfaces live here:
//!
//! - [`AccessorSettings`]: name, filter toggle and filter sizing for one
//!   accessor. This is the only place filter sizing is configured.
//! - [`ClientConfig`]: connection settings for a named key-value client,
//!   usually loaded from a TOML file as a [`ClientConfigList`] and then
//!   resolved against environment overrides into a [`ResolvedClientConfig`].

use crate::error::{Error, Result};
use crate::filter::BloomFilter;
use figment::providers::{Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix of every environment override, e.g. `CACHE_REDIS_DEFAULT_ADDR`.
pub const ENV_PREFIX: &str = "CACHE_REDIS";

/// Default client address.
pub const DEFAULT_ADDR: &str = "127.0.0.1:6379";

/// Default dial timeout in seconds.
pub const DEFAULT_DIAL_TIMEOUT_SECS: u64 = 5;

/// Default read timeout in seconds. The write timeout defaults to the read timeout.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 3;

/// Bloom filter sizing parameters.
///
/// The filter holds `k * n * m` bits and uses `k` hash functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Number of hash functions.
    /// Default: 20
    pub k: usize,

    /// Expected number of keys.
    /// Default: 1000
    pub n: usize,

    /// Array size multiplier relative to `k * n`.
    /// Default: 5
    pub m: usize,
}

impl FilterParams {
    /// Creates filter parameters.
    pub const fn new(k: usize, n: usize, m: usize) -> Self {
        Self { k, n, m }
    }
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            k: 20,
            n: 1000,
            m: 5,
        }
    }
}

/// Settings for one gated accessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessorSettings {
    /// Accessor name, used for diagnostics and environment overrides.
    /// Default: "default"
    pub name: String,

    /// Consult a bloom filter before read-path store calls.
    /// Default: false
    pub use_filter: bool,

    /// Bloom filter sizing.
    pub filter: FilterParams,
}

impl Default for AccessorSettings {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            use_filter: false,
            filter: FilterParams::default(),
        }
    }
}

impl AccessorSettings {
    /// Creates settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the accessor name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enables or disables the bloom filter.
    pub fn use_filter(mut self, value: bool) -> Self {
        self.use_filter = value;
        self
    }

    /// Sets the bloom filter sizing.
    pub fn filter_params(mut self, params: FilterParams) -> Self {
        self.filter = params;
        self
    }

    /// Validates the settings and returns an error if any are invalid.
    ///
    /// Filter sizing is only checked when the filter is enabled.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::invalid_argument("accessor name must not be empty"));
        }
        if self.use_filter {
            BloomFilter::num_bits_for(&self.filter)?;
        }
        Ok(())
    }
}

/// Connection settings for a named client as written in a config file.
///
/// Zero and empty values mean "unset"; they fall through to environment
/// overrides and built-in defaults during [`ClientConfig::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Client name, matched against the accessor name.
    pub name: String,
    /// `host:port` of the server.
    pub addr: String,
    /// Password, empty for none.
    pub password: String,
    /// Logical database index.
    pub db: i64,
    /// Retries after a failed connection-level call.
    pub max_retries: u32,
    /// Dial timeout in seconds.
    pub dial_timeout: u64,
    /// Read timeout in seconds.
    pub read_timeout: u64,
    /// Write timeout in seconds.
    pub write_timeout: u64,
}

/// Fully resolved connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedClientConfig {
    /// Client name.
    pub name: String,
    /// `host:port` of the server.
    pub addr: String,
    /// Password, `None` for no authentication.
    pub password: Option<String>,
    /// Logical database index.
    pub db: i64,
    /// Retries after a failed connection-level call.
    pub max_retries: u32,
    /// Dial timeout.
    pub dial_timeout: Duration,
    /// Read timeout.
    pub read_timeout: Duration,
    /// Write timeout.
    pub write_timeout: Duration,
}

impl ClientConfig {
    /// Creates an empty config for `name`; every field resolves to its default.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Resolves against the process environment.
    pub fn resolve(&self) -> Result<ResolvedClientConfig> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolves against an arbitrary variable lookup.
    ///
    /// Precedence per field: environment override, then this config's value,
    /// then the built-in default. Empty strings and zero numbers are unset.
    pub fn resolve_with<F>(&self, env: F) -> Result<ResolvedClientConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |field: &str| {
            env(&env_key(&self.name, field)).filter(|value| !value.trim().is_empty())
        };
        let string = |field: &str, file: &str| {
            lookup(field).or_else(|| (!file.is_empty()).then(|| file.to_string()))
        };

        let addr = string("ADDR", &self.addr).unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let password = string("PASSWORD", &self.password);
        let db = pick(parse_env(lookup("DB"), "DB")?, self.db).unwrap_or(0);
        let max_retries =
            pick(parse_env(lookup("MAX_RETRIES"), "MAX_RETRIES")?, self.max_retries).unwrap_or(0);
        let dial_timeout = pick(
            parse_env(lookup("DIAL_TIMEOUT"), "DIAL_TIMEOUT")?,
            self.dial_timeout,
        )
        .unwrap_or(DEFAULT_DIAL_TIMEOUT_SECS);
        let read_timeout = pick(
            parse_env(lookup("READ_TIMEOUT"), "READ_TIMEOUT")?,
            self.read_timeout,
        )
        .unwrap_or(DEFAULT_READ_TIMEOUT_SECS);
        let write_timeout =
            pick(parse_env(lookup("WRITE_TIMEOUT"), "WRITE_TIMEOUT")?, self.write_timeout)
                .unwrap_or(read_timeout);

        Ok(ResolvedClientConfig {
            name: self.name.clone(),
            addr,
            password,
            db,
            max_retries,
            dial_timeout: Duration::from_secs(dial_timeout),
            read_timeout: Duration::from_secs(read_timeout),
            write_timeout: Duration::from_secs(write_timeout),
        })
    }
}

/// Environment variable name for a client field: `CACHE_REDIS_<NAME>_<FIELD>`.
pub fn env_key(name: &str, field: &str) -> String {
    format!("{}_{}_{}", ENV_PREFIX, name.to_uppercase(), field)
}

fn parse_env<T: std::str::FromStr>(value: Option<String>, field: &str) -> Result<Option<T>> {
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| Error::config(format!("{} is not a valid number: {:?}", field, raw)))
        })
        .transpose()
}

/// First non-zero of (env, file).
fn pick<T: Default + PartialEq + Copy>(env: Option<T>, file: T) -> Option<T> {
    let zero = T::default();
    env.filter(|v| *v != zero).or_else(|| (file != zero).then_some(file))
}

/// A list of named client configs loaded from a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientConfigList {
    /// The configured clients, in file order.
    #[serde(default, alias = "redis_clients")]
    pub cache_clients: Vec<ClientConfig>,
}

impl ClientConfigList {
    /// Builds a list from already-constructed configs.
    pub fn new(cache_clients: Vec<ClientConfig>) -> Result<Self> {
        let list = Self { cache_clients };
        list.ensure_not_empty()?;
        Ok(list)
    }

    /// Loads `[[cache_clients]]` tables from a TOML file.
    ///
    /// `[[redis_clients]]` is accepted as an alternate table name.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let list: Self = Figment::new().merge(Toml::file(path.as_ref())).extract()?;
        list.ensure_not_empty()?;
        Ok(list)
    }

    /// Loads `[[cache_clients]]` tables from a TOML string.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let list: Self = Figment::new().merge(Toml::string(toml)).extract()?;
        list.ensure_not_empty()?;
        Ok(list)
    }

    /// Looks up a config by name.
    pub fn by_name(&self, name: &str) -> Option<&ClientConfig> {
        config_by_name(&self.cache_clients, name)
    }

    /// Resolves the config for `name` against the process environment.
    ///
    /// A name missing from the list resolves from environment and defaults alone.
    pub fn resolve(&self, name: &str) -> Result<ResolvedClientConfig> {
        match self.by_name(name) {
            Some(config) => config.resolve(),
            None => ClientConfig::named(name).resolve(),
        }
    }

    fn ensure_not_empty(&self) -> Result<()> {
        if self.cache_clients.is_empty() {
            return Err(Error::config("client config list is empty"));
        }
        Ok(())
    }
}

/// Finds the first config named `name`.
pub fn config_by_name<'a>(list: &'a [ClientConfig], name: &str) -> Option<&'a ClientConfig> {
    list.iter().find(|config| config.name == name)
}
