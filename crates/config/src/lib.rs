//! Layered configuration for `tome`.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults,
//! 2. `config.toml` in the user's configuration directory,
//! 3. an explicit file (`.toml`, `.yaml`/`.yml` or `.json`),
//! 4. `TOME_` environment variables, with `__` separating nested keys
//!    (`TOME_SCAN__INTERVAL=30`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "TOME_";
const APPLICATION: &str = "tome";
const FILE_NAME: &str = "config.toml";
const DATABASE_NAME: &str = "catalog.sqlite";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite catalog file.
    pub database: PathBuf,
    /// Directory downloads are staged in.
    pub staging: PathBuf,
    /// Root of the organized library tree.
    pub library: PathBuf,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Seconds between scanner passes.
    pub interval: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { interval: 5 }
    }
}

impl ScanConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Destination template, relative to the library root. Unset means the
    /// library's built-in layout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Write `metadata.json` next to associated files.
    pub sidecar: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            template: None,
            sidecar: true,
        }
    }
}

impl Config {
    /// Built-in defaults, with the catalog stored under `data_dir`.
    pub fn defaults(data_dir: &Path) -> Self {
        Self {
            database: data_dir.join(DATABASE_NAME),
            staging: PathBuf::from("/srv/media/downloads"),
            library: PathBuf::from("/srv/media/library"),
            scan: ScanConfig::default(),
            layout: LayoutConfig::default(),
        }
    }

    /// Load every source, then [validate](Self::validate) the result.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let dirs = ProjectDirs::from("", "", APPLICATION).ok_or_raise(|| ErrorKind::NoHomeDirectory)?;
        let user = dirs.config_dir().join(FILE_NAME);
        Self::from_layers(Self::defaults(dirs.data_dir()), &user, explicit)
    }

    fn from_layers(defaults: Self, user: &Path, explicit: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(defaults));
        if user.is_file() {
            tracing::debug!(path = %user.display(), "Reading user configuration");
            figment = figment.merge(Toml::file(user));
        }
        if let Some(path) = explicit {
            figment = merge_file(figment, path)?;
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values that parse but can't work together.
    pub fn validate(&self) -> Result<()> {
        for (name, path) in [("staging", &self.staging), ("library", &self.library), ("database", &self.database)] {
            if !path.is_absolute() {
                exn::bail!(ErrorKind::Invalid(format!("{name} must be an absolute path: {}", path.display())));
            }
        }
        if self.staging.starts_with(&self.library) || self.library.starts_with(&self.staging) {
            exn::bail!(ErrorKind::Invalid(format!(
                "staging ({}) and library ({}) must be separate directories",
                self.staging.display(),
                self.library.display()
            )));
        }
        if self.scan.interval == 0 {
            exn::bail!(ErrorKind::Invalid("scan.interval must be at least 1 second".to_string()));
        }
        if self.layout.template.as_deref().is_some_and(|t| t.trim().is_empty()) {
            exn::bail!(ErrorKind::Invalid("layout.template must not be empty".to_string()));
        }
        Ok(())
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    if !path.is_file() {
        exn::bail!(ErrorKind::Invalid(format!("config file not found: {}", path.display())));
    }
    tracing::debug!(path = %path.display(), "Reading configuration file");
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => exn::bail!(ErrorKind::Invalid(format!("unsupported config format: {}", path.display()))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;

    fn defaults() -> Config {
        Config::defaults(Path::new("/var/lib/tome"))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = defaults();
        config.validate().unwrap();
        assert_eq!(config.database, Path::new("/var/lib/tome/catalog.sqlite"));
        assert_eq!(config.scan.period(), Duration::from_secs(5));
        assert!(config.layout.sidecar);
    }

    #[test]
    fn test_layers_override_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("config.toml");
        fs::write(&user, "staging = \"/data/incoming\"\n[scan]\ninterval = 60\n").unwrap();
        let explicit = dir.path().join("override.yaml");
        fs::write(&explicit, "scan:\n  interval: 30\nlayout:\n  sidecar: false\n").unwrap();

        let config = Config::from_layers(defaults(), &user, Some(&explicit)).unwrap();
        assert_eq!(config.staging, Path::new("/data/incoming"));
        assert_eq!(config.library, Path::new("/srv/media/library"));
        assert_eq!(config.scan.interval, 30);
        assert!(!config.layout.sidecar);
        assert_eq!(config.layout.template, None);
    }

    #[test]
    fn test_template_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("tome.toml");
        fs::write(&explicit, "[layout]\ntemplate = \"{{ author }}/{{ title }}\"\n").unwrap();
        let config = Config::from_layers(defaults(), &dir.path().join("none.toml"), Some(&explicit)).unwrap();
        assert_eq!(config.layout.template.as_deref(), Some("{{ author }}/{{ title }}"));
        assert!(config.layout.sidecar);
    }

    #[test]
    fn test_blank_template() {
        let layout = LayoutConfig { template: Some("  ".to_string()), ..LayoutConfig::default() };
        let config = Config { layout, ..defaults() };
        assert!(matches!(&*config.validate().unwrap_err(), ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("tome.json");
        fs::write(&explicit, r#"{"library": "/data/books"}"#).unwrap();
        let config = Config::from_layers(defaults(), &dir.path().join("missing.toml"), Some(&explicit)).unwrap();
        assert_eq!(config.library, Path::new("/data/books"));
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_layers(defaults(), &dir.path().join("none.toml"), Some(&dir.path().join("gone.toml")))
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("tome.ini");
        fs::write(&explicit, "staging=/x").unwrap();
        let err = Config::from_layers(defaults(), &dir.path().join("none.toml"), Some(&explicit)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("tome.toml");
        fs::write(&explicit, "[scan]\ninterval = \"often\"\n").unwrap();
        let err = Config::from_layers(defaults(), &dir.path().join("none.toml"), Some(&explicit)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Load));
    }

    #[rstest]
    #[case("/srv/media", "/srv/media/library")]
    #[case("/srv/media/library/incoming", "/srv/media/library")]
    #[case("/srv/media/library", "/srv/media/library")]
    #[case("downloads", "/srv/media/library")]
    #[case("/srv/media/downloads", "library")]
    fn test_invalid_roots(#[case] staging: &str, #[case] library: &str) {
        let config = Config { staging: PathBuf::from(staging), library: PathBuf::from(library), ..defaults() };
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_sibling_prefix_is_not_nesting() {
        let config = Config {
            staging: PathBuf::from("/srv/media/lib-staging"),
            library: PathBuf::from("/srv/media/lib"),
            ..defaults()
        };
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_interval() {
        let config = Config { scan: ScanConfig { interval: 0 }, ..defaults() };
        assert!(matches!(&*config.validate().unwrap_err(), ErrorKind::Invalid(_)));
    }
}
