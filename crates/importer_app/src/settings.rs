//! Command line and the RON run configuration.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use importer_engine::ImportConfig;

pub const DEFAULT_CONFIG: &str = "import.ron";

/// Command line of the `importer` binary.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "importer", version)]
#[command(about = "Import entries from configured sources into a static site tree", long_about = None)]
pub struct CliArgs {
    /// RON run configuration
    #[arg(default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Also write the log to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Transform everything but leave the output tree untouched
    #[arg(long)]
    pub dry_run: bool,
}

/// Read and parse the configuration file at `path`.
pub fn load(path: &Path) -> Result<ImportConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: ImportConfig = ron::from_str(&content)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::{load, CliArgs};
    use clap::Parser;
    use std::path::PathBuf;

    fn parse(raw: &[&str]) -> Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("importer").chain(raw.iter().copied()))
    }

    #[test]
    fn defaults_to_import_ron() {
        assert_eq!(
            parse(&[]).unwrap(),
            CliArgs {
                config: PathBuf::from("import.ron"),
                log_file: None,
                dry_run: false,
            }
        );
    }

    #[test]
    fn flags_and_path() {
        let parsed = parse(&["--log-file", "run.log", "site.ron", "--dry-run"]).unwrap();
        assert_eq!(parsed.config, PathBuf::from("site.ron"));
        assert_eq!(parsed.log_file, Some(PathBuf::from("run.log")));
        assert!(parsed.dry_run);

        assert!(parse(&["--verbose"]).is_err());
        assert!(parse(&["--log-file"]).is_err());
        assert!(parse(&["a.ron", "b.ron"]).is_err());
    }

    #[test]
    fn loads_ron_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import.ron");
        std::fs::write(
            &path,
            r#"(
                output: "site",
                asset_refs: "colocate",
                within: Some("30d"),
                preserved_selectors: ["figure.chart"],
                sources: [
                    (kind: "json", location: "posts.json"),
                    (kind: "jsonfeed", location: "https://blog.example/feed.json", label: Some("blog")),
                ],
            )"#,
        )
        .unwrap();

        let config = load(&path).unwrap();

        assert_eq!(config.output, PathBuf::from("site"));
        assert_eq!(config.asset_refs, "colocate");
        assert_eq!(config.within.as_deref(), Some("30d"));
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[1].label.as_deref(), Some("blog"));
        assert!(config.safe_mode);
        assert_eq!(config.drafts_folder, "drafts");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("absent.ron")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
