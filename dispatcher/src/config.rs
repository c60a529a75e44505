use config::{Config, Environment, File, Source};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How registration treats methods with a trailing variadic parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariadicPolicy {
    /// Capture variadic methods and check their trailing values on every call
    #[default]
    Accept,
    /// Fail registration of any service exposing a variadic method
    Reject,
}

/// How far `validate` goes when converting loosely-typed input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionMode {
    /// Numeric and boolean parameters also accept their string spelling (`"3"`, `"true"`)
    #[default]
    Lenient,
    /// Only structurally matching input converts
    Strict,
}

/// Dispatcher configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub variadic: VariadicPolicy,
    pub coercion: CoercionMode,
}

impl DispatcherConfig {
    /// Load from an optional `dispatcher.toml` in the working directory,
    /// then `DISPATCHER_*` environment variables
    pub fn load() -> Result<Self> {
        let config = Self::defaults()?
            .add_source(File::with_name("dispatcher").required(false))
            .add_source(Environment::with_prefix("DISPATCHER"))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load from an explicit source layered over the defaults
    pub fn from_source<S>(source: S) -> Result<Self>
    where
        S: Source + Send + Sync + 'static,
    {
        let config = Self::defaults()?.add_source(source).build()?;
        Ok(config.try_deserialize()?)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(Config::builder()
            .set_default("variadic", "accept")?
            .set_default("coercion", "lenient")?)
    }
}
