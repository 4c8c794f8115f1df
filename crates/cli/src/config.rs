//! Configuration management for the CLI
//!
//! Defaults come from `~/.config/kubectl-waste/config.json`, overridden by
//! `WASTE_*` environment variables, overridden in turn by command-line flags.

use crate::output::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use waste_lib::{NamespaceScope, SelectionConfig, SortOrder, DEFAULT_UTILIZATION_THRESHOLD};

/// Persisted CLI defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Utilization threshold in percent
    pub threshold: Option<f64>,
    /// Namespace scanned when none is given on the command line
    pub default_namespace: Option<String>,
    /// Default output format
    pub default_format: Option<OutputFormat>,
    /// Default ranking of reported pods
    pub order: Option<SortOrder>,
}

impl Config {
    /// Load configuration from the default file and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path` (if it exists) and the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut builder = config::Config::builder();
        if path.exists() {
            builder = builder.add_source(
                config::File::from(path).format(config::FileFormat::Json),
            );
        }

        builder
            .add_source(config::Environment::with_prefix("WASTE"))
            .build()
            .and_then(|c| c.try_deserialize())
            .with_context(|| format!("Failed to load configuration from {}", path.display()))
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("kubectl-waste").join("config.json"))
    }
}

/// Options given on the command line, each overriding its [`Config`] field
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub namespace: Option<String>,
    pub all_namespaces: bool,
    pub threshold: Option<f64>,
    pub order: Option<SortOrder>,
    pub format: Option<OutputFormat>,
    pub no_containers: bool,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Namespaces to scan, `None` for the kubeconfig context's namespace
    pub scope: Option<NamespaceScope>,
    pub selection: SelectionConfig,
    pub format: OutputFormat,
    pub show_containers: bool,
}

impl Settings {
    /// Merge command-line overrides onto the loaded configuration
    ///
    /// Fails on an empty namespace or an invalid threshold, before any
    /// cluster access happens.
    pub fn resolve(overrides: Overrides, config: &Config) -> Result<Self> {
        let scope = if overrides.all_namespaces {
            Some(NamespaceScope::All)
        } else {
            match overrides.namespace.or_else(|| config.default_namespace.clone()) {
                Some(ns) if ns.trim().is_empty() => {
                    anyhow::bail!("a non-empty namespace must be provided")
                }
                Some(ns) => Some(NamespaceScope::Namespace(ns)),
                None => None,
            }
        };

        let threshold = overrides
            .threshold
            .or(config.threshold)
            .unwrap_or(DEFAULT_UTILIZATION_THRESHOLD);
        let order = overrides.order.or(config.order).unwrap_or_default();
        let selection = SelectionConfig::new(threshold)?.with_order(order);

        Ok(Self {
            scope,
            selection,
            format: overrides
                .format
                .or(config.default_format)
                .unwrap_or_default(),
            show_containers: !overrides.no_containers,
        })
    }

    /// Scope to scan once the context's namespace is known
    pub fn scope_in(&self, context_namespace: &str) -> NamespaceScope {
        self.scope
            .clone()
            .unwrap_or_else(|| NamespaceScope::Namespace(context_namespace.to_string()))
    }
}
