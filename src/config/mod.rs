//! The configuration document: a captured (or hand-written) description of
//! a machine, organised into named profiles.
//!
//! The on-disk format is YAML. Empty lists and unset options are omitted on
//! output so that a resolved profile prints the same way a person would
//! write it.
pub mod profiles;
pub mod validation;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use crate::error::ConfigError;

/// File name of the document inside the config directory.
pub const DOCUMENT_FILE: &str = "config.yaml";

/// Directory (inside the config directory) holding dotfile payloads.
pub const DOTFILES_DIR: &str = "dotfiles";

/// Name of the profile used when none is given on the command line.
pub const DEFAULT_PROFILE: &str = "default";

/// A complete configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Document format version.
    #[serde(
        deserialize_with = "deserialize_version",
        serialize_with = "serialize_version"
    )]
    pub version: String,
    /// Where and when the document was captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Profiles keyed by unique name.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

/// Capture provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// When the document was captured.
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub captured_at: Option<DateTime<Utc>>,
    /// Host name of the machine it was captured on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_machine: Option<String>,
    /// macOS version of that machine.
    #[serde(
        default,
        rename = "macos_version",
        alias = "os_version",
        skip_serializing_if = "Option::is_none"
    )]
    pub os_version: Option<String>,
    /// Version of the tool that wrote the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
}

/// A named set of applications, dotfiles and preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile name; filled from the document's map key on load.
    #[serde(skip)]
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Name of the profile this one inherits from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Applications to install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applications: Option<Applications>,
    /// Files to install under the home directory.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dotfiles: Vec<Dotfile>,
    /// `defaults` entries to write.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferences: Vec<Preference>,
}

/// Applications grouped by install channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applications {
    /// Homebrew taps, formulas and casks.
    #[serde(
        default,
        rename = "homebrew",
        alias = "package_manager",
        skip_serializing_if = "Option::is_none"
    )]
    pub package_manager: Option<PackageManagerApps>,
    /// Mac App Store apps, installed through `mas`.
    #[serde(
        default,
        rename = "mas",
        alias = "app_store",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub app_store: Vec<AppStoreApp>,
    /// Apps that must be installed by hand; never executed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manual: Vec<ManualApp>,
}

impl Applications {
    /// Whether no application of any kind is listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.package_manager
            .as_ref()
            .is_none_or(PackageManagerApps::is_empty)
            && self.app_store.is_empty()
            && self.manual.is_empty()
    }
}

/// Homebrew packages, by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManagerApps {
    /// Third-party repositories, e.g. `homebrew/cask-fonts`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taps: Vec<String>,
    /// Command-line packages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formulas: Vec<String>,
    /// GUI apps.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub casks: Vec<String>,
}

impl PackageManagerApps {
    /// Whether all three lists are empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.taps.is_empty() && self.formulas.is_empty() && self.casks.is_empty()
    }
}

/// An app installed from the Mac App Store, identified by its numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppStoreApp {
    /// App Store id; `0` is invalid.
    pub id: u64,
    /// Display name.
    pub name: String,
}

/// An app with no automated install channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualApp {
    /// Display name.
    pub name: String,
    /// Where to download it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Extra steps to show the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// A file under the home directory whose payload lives in the config
/// directory's `dotfiles/` folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dotfile {
    /// Path relative to the home directory (e.g. `.zshrc`).
    pub path: String,
    /// Link or copy.
    #[serde(default, skip_serializing_if = "DotfileMode::is_symlink")]
    pub mode: DotfileMode,
    /// Reserved; templates are installed as plain files.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub template: bool,
}

/// How a dotfile is installed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DotfileMode {
    /// Symlink the target to the payload.
    #[default]
    Symlink,
    /// Copy the payload; files only.
    Copy,
}

impl DotfileMode {
    const fn is_symlink(&self) -> bool {
        matches!(self, Self::Symlink)
    }
}

impl Dotfile {
    /// Why this entry cannot be installed under the home directory, if it
    /// cannot. Empty, absolute and `..` paths would resolve outside both the
    /// home directory and the payload folder.
    #[must_use]
    pub fn path_problem(&self) -> Option<String> {
        let path = Path::new(&self.path);
        if self.path.trim().is_empty() {
            Some("dotfile path is empty".to_string())
        } else if path.has_root() {
            Some(format!("'{}' must be relative to the home directory", self.path))
        } else if path.components().any(|c| matches!(c, Component::ParentDir)) {
            Some(format!("'{}' must not contain '..'", self.path))
        } else {
            None
        }
    }
}

/// A single `defaults` entry.
///
/// Entries without a `key` or `value` are kept in the document (capture
/// emits them for whole domains) but are not applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    /// `defaults` domain, e.g. `com.apple.dock`.
    pub domain: String,
    /// Key within the domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Value to write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<PreferenceValue>,
    /// Explicit `defaults` type; inferred from the value when unset.
    #[serde(
        default,
        rename = "type",
        skip_serializing_if = "Option::is_none"
    )]
    pub value_type: Option<PreferenceType>,
}

/// Separator between domain and key in a preference identifier.
pub const PREFERENCE_KEY_SEPARATOR: char = ':';

impl Preference {
    /// Why the domain cannot be used, if it cannot. A `:` in the domain would
    /// make `domain:key` identifiers ambiguous.
    #[must_use]
    pub fn domain_problem(&self) -> Option<String> {
        if self.domain.trim().is_empty() {
            Some("domain is empty".to_string())
        } else if self.domain.contains(PREFERENCE_KEY_SEPARATOR) {
            Some(format!(
                "domain '{}' must not contain '{PREFERENCE_KEY_SEPARATOR}'",
                self.domain
            ))
        } else {
            None
        }
    }
}

/// A preference value as written in YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreferenceValue {
    /// `true` / `false`.
    Bool(bool),
    /// Whole number.
    Int(i64),
    /// Number with a fraction.
    Float(f64),
    /// Any other scalar.
    String(String),
    /// YAML sequence.
    Array(Vec<PreferenceValue>),
    /// YAML mapping.
    Dict(BTreeMap<String, PreferenceValue>),
}

impl PreferenceValue {
    /// The `defaults` type this value maps to when none is given.
    #[must_use]
    pub const fn inferred_type(&self) -> PreferenceType {
        match self {
            Self::Bool(_) => PreferenceType::Bool,
            Self::Int(_) => PreferenceType::Int,
            Self::Float(_) => PreferenceType::Float,
            Self::String(_) => PreferenceType::String,
            Self::Array(_) => PreferenceType::Array,
            Self::Dict(_) => PreferenceType::Dict,
        }
    }

    /// Render a scalar the way `defaults read` prints it.
    #[must_use]
    pub fn to_scalar_string(&self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::Array(_) | Self::Dict(_) => None,
        }
    }
}

/// Value types understood by `defaults write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceType {
    /// `-string`
    String,
    /// `-int`
    #[serde(alias = "integer")]
    Int,
    /// `-float`
    Float,
    /// `-bool`
    #[serde(alias = "boolean")]
    Bool,
    /// `-array`
    Array,
    /// `-dict`
    Dict,
}

impl PreferenceType {
    /// The `defaults write` flag for this type.
    #[must_use]
    pub const fn flag(self) -> &'static str {
        match self {
            Self::String => "-string",
            Self::Int => "-int",
            Self::Float => "-float",
            Self::Bool => "-bool",
            Self::Array => "-array",
            Self::Dict => "-dict",
        }
    }
}

impl Configuration {
    /// Load and parse the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DocumentNotFound`] if the file does not exist,
    /// [`ConfigError::Read`] if it cannot be read, or
    /// [`ConfigError::Parse`] if it is not a valid document.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::DocumentNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse a document from YAML text. `path` is used for error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not a valid document.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut document: Self =
            serde_yaml_ng::from_str(content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        for (name, profile) in &mut document.profiles {
            profile.name.clone_from(name);
        }
        Ok(document)
    }

    /// Serialize to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml_ng::to_string(self).map_err(ConfigError::Serialize)
    }

    /// Sorted profile names.
    #[must_use]
    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }
}

/// Path of the document inside a config directory.
#[must_use]
pub fn document_path(config_dir: &Path) -> PathBuf {
    config_dir.join(DOCUMENT_FILE)
}

/// Path of the dotfile payload directory inside a config directory.
#[must_use]
pub fn dotfiles_path(config_dir: &Path) -> PathBuf {
    config_dir.join(DOTFILES_DIR)
}

// Early documents wrote `version: 1`; later ones may quote it.
fn deserialize_version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
        Text(String),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
        Raw::Text(s) => s,
    })
}

fn serialize_version<S>(version: &str, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match version.parse::<u64>() {
        Ok(n) => serializer.serialize_u64(n),
        Err(_) => serializer.serialize_str(version),
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version: 1
metadata:
  captured_at: "2024-01-15T10:30:00Z"
  source_machine: studio
  macos_version: "14.2"
  tool_version: "0.3.0"
profiles:
  default:
    description: Everything
    applications:
      homebrew:
        taps: [homebrew/cask-fonts]
        formulas: [git, ripgrep]
        casks: [slack]
      mas:
        - id: 497799835
          name: Xcode
      manual:
        - name: Logic Pro
          url: https://apple.com/logic-pro
    dotfiles:
      - path: .zshrc
      - path: .gitconfig
        mode: copy
    preferences:
      - domain: com.apple.dock
        key: autohide
        value: true
      - domain: NSGlobalDomain
        key: KeyRepeat
        value: 2
        type: int
  work:
    extends: default
    applications:
      homebrew:
        formulas: [awscli]
"#;

    fn sample() -> Configuration {
        Configuration::parse(SAMPLE, Path::new("config.yaml")).expect("sample parses")
    }

    #[test]
    fn parse_full_document() {
        let doc = sample();
        assert_eq!(doc.version, "1");
        let meta = doc.metadata.as_ref().unwrap();
        assert_eq!(meta.source_machine.as_deref(), Some("studio"));
        assert_eq!(meta.os_version.as_deref(), Some("14.2"));
        assert!(meta.captured_at.is_some());

        let default = &doc.profiles["default"];
        assert_eq!(default.name, "default");
        let apps = default.applications.as_ref().unwrap();
        let brew = apps.package_manager.as_ref().unwrap();
        assert_eq!(brew.formulas, vec!["git", "ripgrep"]);
        assert_eq!(apps.app_store[0].id, 497_799_835);
        assert_eq!(apps.manual[0].name, "Logic Pro");
        assert_eq!(default.dotfiles[0].mode, DotfileMode::Symlink);
        assert_eq!(default.dotfiles[1].mode, DotfileMode::Copy);
        assert_eq!(
            default.preferences[0].value,
            Some(PreferenceValue::Bool(true))
        );
        assert_eq!(default.preferences[1].value_type, Some(PreferenceType::Int));
    }

    #[test]
    fn profile_names_are_filled_and_sorted() {
        let doc = sample();
        assert_eq!(doc.profile_names(), vec!["default", "work"]);
        assert_eq!(doc.profiles["work"].extends.as_deref(), Some("default"));
    }

    #[test]
    fn alias_keys_are_accepted() {
        let yaml = r"
version: '2'
profiles:
  p:
    applications:
      package_manager:
        formulas: [jq]
      app_store:
        - id: 1
          name: One
";
        let doc = Configuration::parse(yaml, Path::new("c.yaml")).unwrap();
        let apps = doc.profiles["p"].applications.as_ref().unwrap();
        assert_eq!(apps.package_manager.as_ref().unwrap().formulas, vec!["jq"]);
        assert_eq!(apps.app_store.len(), 1);
        assert_eq!(doc.version, "2");
    }

    #[test]
    fn naive_timestamp_is_read_as_utc() {
        let yaml = "version: 1\nmetadata:\n  captured_at: '2024-01-15T10:30:00.123456'\nprofiles: {}\n";
        let doc = Configuration::parse(yaml, Path::new("c.yaml")).unwrap();
        let ts = doc.metadata.unwrap().captured_at.unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-15T10:30:00.123456+00:00");
    }

    #[test]
    fn output_omits_empty_and_default_fields() {
        let mut doc = sample();
        doc.metadata = None;
        doc.profiles.remove("work");
        let yaml = doc.to_yaml().unwrap();
        assert!(yaml.contains("version: 1"));
        assert!(!yaml.contains("mode: symlink"));
        assert!(yaml.contains("mode: copy"));
        assert!(!yaml.contains("template"));
        assert!(!yaml.contains("extends"));
        assert!(!yaml.contains("instructions"));
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let err = Configuration::parse("version: [", Path::new("bad.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn missing_document_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Configuration::load(&document_path(dir.path())).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn applications_is_empty() {
        assert!(Applications::default().is_empty());
        let apps = Applications {
            package_manager: Some(PackageManagerApps::default()),
            ..Applications::default()
        };
        assert!(apps.is_empty());
    }

    #[test]
    fn preference_value_rendering() {
        assert_eq!(
            PreferenceValue::Bool(false).to_scalar_string().as_deref(),
            Some("0")
        );
        assert_eq!(
            PreferenceValue::String("x".into()).inferred_type(),
            PreferenceType::String
        );
        assert!(PreferenceValue::Array(vec![]).to_scalar_string().is_none());
        assert_eq!(PreferenceType::Bool.flag(), "-bool");
    }

    #[test]
    fn dotfile_paths_must_stay_under_home() {
        let dotfile = |path: &str| Dotfile {
            path: path.to_string(),
            mode: DotfileMode::Symlink,
            template: false,
        };
        assert!(dotfile(".zshrc").path_problem().is_none());
        assert!(dotfile(".config/git/config").path_problem().is_none());
        assert!(dotfile("/etc/hosts").path_problem().is_some());
        assert!(dotfile("../outside").path_problem().is_some());
        assert!(dotfile(".config/../../outside").path_problem().is_some());
        assert!(dotfile("  ").path_problem().is_some());
    }

    #[test]
    fn preference_domain_must_not_contain_separator() {
        let pref = |domain: &str| Preference {
            domain: domain.to_string(),
            key: Some("autohide".to_string()),
            value: Some(PreferenceValue::Bool(true)),
            value_type: None,
        };
        assert!(pref("com.apple.dock").domain_problem().is_none());
        assert!(pref("").domain_problem().is_some());
        let problem = pref("com.apple:dock").domain_problem().unwrap();
        assert!(problem.contains("':'"));
    }
}
