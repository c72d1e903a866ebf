use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::types::OutputFormat;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported source type `{0}`")]
    UnsupportedSource(String),
    #[error("unsupported asset reference mode `{0}` (expected relative, absolute, colocate or disabled)")]
    UnsupportedAssetMode(String),
    #[error("unsupported output format `{0}` (expected markdown or html)")]
    UnsupportedFormat(String),
    #[error("invalid duration `{0}` (expected e.g. 12h, 7d, 2w, 1y)")]
    InvalidDuration(String),
    #[error("invalid preserved selector `{0}`")]
    InvalidSelector(String),
    #[error("invalid source location `{location}`: {message}")]
    InvalidLocation { location: String, message: String },
}

/// How rewritten asset URLs are expressed in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssetMode {
    /// Shared assets folder, referenced relative to the document.
    #[default]
    Relative,
    /// Shared assets folder, referenced from the output root (`/assets/...`).
    Absolute,
    /// Assets beside the document, which is written as `index.<ext>`.
    Colocate,
    /// Leave remote URLs untouched and download nothing.
    Disabled,
}

impl AssetMode {
    pub fn downloads_enabled(self) -> bool {
        self != AssetMode::Disabled
    }
}

impl FromStr for AssetMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "relative" => Ok(AssetMode::Relative),
            "absolute" => Ok(AssetMode::Absolute),
            "colocate" => Ok(AssetMode::Colocate),
            "disabled" => Ok(AssetMode::Disabled),
            _ => Err(ConfigError::UnsupportedAssetMode(value.to_string())),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "html" => Ok(OutputFormat::Html),
            _ => Err(ConfigError::UnsupportedFormat(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    pub kind: String,
    pub location: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// Raw configuration as read from disk. Call [`ImportConfig::validate`] before use.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default = "default_drafts_folder")]
    pub drafts_folder: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_asset_refs")]
    pub asset_refs: String,
    #[serde(default = "default_assets_folder")]
    pub assets_folder: String,
    #[serde(default = "default_true")]
    pub safe_mode: bool,
    #[serde(default)]
    pub overwrite_drafts: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub within: Option<String>,
    #[serde(default = "default_cache_duration")]
    pub cache_duration: String,
    #[serde(default)]
    pub preserved_selectors: Vec<String>,
    #[serde(default)]
    pub persist: Option<String>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

fn default_output() -> PathBuf {
    PathBuf::from(".")
}
fn default_drafts_folder() -> String {
    "drafts".to_string()
}
fn default_format() -> String {
    "markdown".to_string()
}
fn default_asset_refs() -> String {
    "relative".to_string()
}
fn default_assets_folder() -> String {
    "assets".to_string()
}
fn default_true() -> bool {
    true
}
fn default_cache_duration() -> String {
    "24h".to_string()
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            drafts_folder: default_drafts_folder(),
            format: default_format(),
            asset_refs: default_asset_refs(),
            assets_folder: default_assets_folder(),
            safe_mode: true,
            overwrite_drafts: false,
            dry_run: false,
            verbose: false,
            within: None,
            cache_duration: default_cache_duration(),
            preserved_selectors: Vec::new(),
            persist: None,
            sources: Vec::new(),
        }
    }
}

impl ImportConfig {
    /// Parse every stringly-typed setting. Sources are checked later by the registry.
    pub fn validate(&self) -> Result<ImportOptions, ConfigError> {
        self.validate_at(Utc::now())
    }

    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<ImportOptions, ConfigError> {
        let within = match self.within.as_deref().map(str::trim) {
            None | Some("") | Some("*") => None,
            Some(raw) => {
                let span = parse_duration(raw)?;
                let span = chrono::Duration::from_std(span)
                    .map_err(|_| ConfigError::InvalidDuration(raw.to_string()))?;
                now.checked_sub_signed(span)
            }
        };

        for selector in &self.preserved_selectors {
            scraper::Selector::parse(selector)
                .map_err(|_| ConfigError::InvalidSelector(selector.clone()))?;
        }

        Ok(ImportOptions {
            output_folder: self.output.clone(),
            drafts_folder: self.drafts_folder.clone(),
            format: self.format.parse()?,
            assets: self.asset_refs.parse()?,
            assets_folder: self.assets_folder.clone(),
            safe_mode: self.safe_mode,
            overwrite_drafts: self.overwrite_drafts,
            dry_run: self.dry_run,
            verbose: self.verbose,
            within,
            cache_duration: parse_duration(&self.cache_duration)?,
            preserved_selectors: self.preserved_selectors.clone(),
        })
    }
}

/// Validated, typed settings shared by every stage of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    pub output_folder: PathBuf,
    pub drafts_folder: String,
    pub format: OutputFormat,
    pub assets: AssetMode,
    pub assets_folder: String,
    pub safe_mode: bool,
    pub overwrite_drafts: bool,
    pub dry_run: bool,
    pub verbose: bool,
    /// Only entries dated at or after this instant are imported.
    pub within: Option<DateTime<Utc>>,
    pub cache_duration: Duration,
    pub preserved_selectors: Vec<String>,
}

impl ImportOptions {
    pub fn default_with_output(output_folder: impl Into<PathBuf>) -> Self {
        Self {
            output_folder: output_folder.into(),
            drafts_folder: default_drafts_folder(),
            format: OutputFormat::Markdown,
            assets: AssetMode::Relative,
            assets_folder: default_assets_folder(),
            safe_mode: true,
            overwrite_drafts: false,
            dry_run: false,
            verbose: false,
            within: None,
            cache_duration: Duration::from_secs(24 * 60 * 60),
            preserved_selectors: Vec::new(),
        }
    }
}

/// Parse `<n><unit>` where unit is one of `s`, `h`, `d`, `w`, `y`.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let trimmed = raw.trim();
    let invalid = || ConfigError::InvalidDuration(raw.to_string());
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (digits, unit) = trimmed.split_at(split);
    let count: u64 = digits.parse().map_err(|_| invalid())?;
    let seconds_per_unit = match unit {
        "s" => 1,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        "y" => 365 * 24 * 60 * 60,
        _ => return Err(invalid()),
    };
    count
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn durations_parse_with_units() {
        assert_eq!(parse_duration("12h").unwrap(), Duration::from_secs(12 * 3600));
        assert_eq!(parse_duration("2w").unwrap(), Duration::from_secs(14 * 86400));
        assert!(parse_duration("12").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("3 months").is_err());
    }

    #[test]
    fn within_becomes_a_cutoff() {
        let now = Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap();
        let config = ImportConfig {
            within: Some("7d".into()),
            ..ImportConfig::default()
        };
        let options = config.validate_at(now).unwrap();
        assert_eq!(
            options.within,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );

        let everything = ImportConfig {
            within: Some("*".into()),
            ..ImportConfig::default()
        };
        assert_eq!(everything.validate_at(now).unwrap().within, None);
    }

    #[test]
    fn unsupported_modes_are_rejected() {
        let bad_assets = ImportConfig {
            asset_refs: "inline".into(),
            ..ImportConfig::default()
        };
        assert_eq!(
            bad_assets.validate().unwrap_err(),
            ConfigError::UnsupportedAssetMode("inline".into())
        );

        let bad_format = ImportConfig {
            format: "pdf".into(),
            ..ImportConfig::default()
        };
        assert_eq!(
            bad_format.validate().unwrap_err(),
            ConfigError::UnsupportedFormat("pdf".into())
        );
    }

    #[test]
    fn broken_selectors_fail_validation() {
        let config = ImportConfig {
            preserved_selectors: vec!["figure.chart".into(), "div[".into()],
            ..ImportConfig::default()
        };
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::InvalidSelector("div[".into())
        );
    }
}
