//! Engine configuration
//!
//! ```yaml
//! rewrite:
//!   max_passes: 500
//! store:
//!   unordered_types: [nt:folder]
//! rules:
//!   - rules/dialogs.yaml
//! column_controls:
//!   - layout: 2;cq-colctrl-lt0
//!     column_widths: ["default=[6,6]"]
//! ```
//!
//! Rule files hold one folder record whose children are rule definitions.
//! Relative rule paths are resolved against the configuration file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use remodel_rules::{
    ColumnControlConfig, ColumnControlRule, DefinitionRuleProvider, Rule, RuleProvider, RuleSet,
    StaticRuleProvider,
};
use remodel_tree::NodeRecord;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::rewriter::{RewriteConfig, TreeRewriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
}

fn format_of(path: &Path) -> Result<Format, ConfigError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => Ok(Format::Yaml),
        Some("json") => Ok(Format::Json),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::io(path, source))
}

/// Read a node record from a YAML or JSON file
///
/// # Errors
/// Returns error if the file cannot be read, has an unknown extension or is
/// not a valid record
pub fn load_record(path: impl AsRef<Path>) -> Result<NodeRecord, ConfigError> {
    let path = path.as_ref();
    let format = format_of(path)?;
    let text = read(path)?;
    let parsed = match format {
        Format::Yaml => NodeRecord::from_yaml(&text),
        Format::Json => NodeRecord::from_json(&text),
    };
    parsed.map_err(|source| ConfigError::Record {
        path: path.to_path_buf(),
        source,
    })
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rewrite limits
    pub rewrite: RewriteConfig,
    /// Options for trees built from documents
    pub store: remodel_tree::StoreOptions,
    /// Column partitioners to activate
    pub column_controls: Vec<ColumnControlConfig>,
    /// Rule definition files
    pub rules: Vec<PathBuf>,
    /// Directory relative rule paths are resolved against
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse YAML configuration
    ///
    /// # Errors
    /// Returns error if the YAML is invalid
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse JSON configuration
    ///
    /// # Errors
    /// Returns error if the JSON is invalid
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a `.yaml`, `.yml` or `.json` file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = read(path)?;
        let config = match format_of(path)? {
            Format::Yaml => Self::from_yaml(&text)?,
            Format::Json => Self::from_json(&text)?,
        };
        debug!(path = %path.display(), rules = config.rules.len(), "loaded engine configuration");
        Ok(config.with_base_dir(path.parent().unwrap_or_else(|| Path::new("."))))
    }

    /// With base directory for relative rule paths
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// With rule definition file
    #[must_use]
    pub fn with_rule_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.rules.push(path.into());
        self
    }

    /// With column partitioner
    #[must_use]
    pub fn with_column_control(mut self, config: ColumnControlConfig) -> Self {
        self.column_controls.push(config);
        self
    }

    /// With rewrite limits
    #[inline]
    #[must_use]
    pub fn with_rewrite(mut self, rewrite: RewriteConfig) -> Self {
        self.rewrite = rewrite;
        self
    }

    /// Location of a rule file after resolving against the base directory
    #[must_use]
    pub fn rule_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Load rule files and activate column partitioners
    ///
    /// Rule files come first, in listed order, followed by the partitioners;
    /// the result is ranked with ties kept in that order.
    ///
    /// # Errors
    /// Returns the first load, parse or activation error
    pub fn build_rule_set(&self) -> Result<RuleSet, ConfigError> {
        let mut providers: Vec<Box<dyn RuleProvider>> = Vec::new();
        for file in &self.rules {
            let path = self.rule_path(file);
            let folder = load_record(&path)?;
            let provider = DefinitionRuleProvider::from_folder(folder.name.clone(), &folder)?;
            debug!(path = %path.display(), rules = provider.len(), "loaded rule definitions");
            providers.push(Box::new(provider));
        }

        let mut columns = Vec::with_capacity(self.column_controls.len());
        for config in &self.column_controls {
            columns.push(Arc::new(ColumnControlRule::activate(config)?) as Arc<dyn Rule>);
        }
        providers.push(Box::new(StaticRuleProvider::new("column-controls", columns)));

        Ok(RuleSet::from_providers(providers.iter().map(|provider| &**provider)))
    }

    /// Build a rewriter with this configuration's rules and limits
    ///
    /// # Errors
    /// See [`EngineConfig::build_rule_set`]
    pub fn rewriter(&self) -> Result<TreeRewriter, ConfigError> {
        Ok(TreeRewriter::new(self.build_rule_set()?).with_config(self.rewrite))
    }
}
