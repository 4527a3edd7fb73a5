//! Backup configuration loading and parsing

use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;

/// Default archival command
pub const DEFAULT_ARCHIVE_COMMAND: &[&str] = &["cpio", "-o"];

/// Default compression command; the archive path is appended as the last argument
pub const DEFAULT_COMPRESSION_COMMAND: &[&str] = &["gzip", "-9"];

/// Default enumeration command; the root path is appended as the last argument
pub const DEFAULT_ENUMERATION_COMMAND: &[&str] = &["find"];

/// Parsed backup configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupConfig {
    /// Named root directories to capture
    #[serde(default, alias = "dirs")]
    pub directories: BTreeMap<String, Utf8PathBuf>,

    /// Named exclusion patterns (regular expressions)
    #[serde(default)]
    pub ignore: BTreeMap<String, String>,

    /// How roots are enumerated
    #[serde(default)]
    pub enumeration: EnumerationConfig,

    /// How the archive is written
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// How the archive is compressed
    #[serde(default)]
    pub compression: CompressionConfig,
}

/// Enumeration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumerationConfig {
    #[serde(default)]
    pub method: EnumerationMethod,

    /// Command used by [`EnumerationMethod::Find`]
    #[serde(default = "default_enumeration_command")]
    pub command: ToolCommand,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            method: EnumerationMethod::default(),
            command: default_enumeration_command(),
        }
    }
}

/// Directory enumeration backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnumerationMethod {
    /// In-process directory walk
    #[default]
    Walk,
    /// External `find` process
    Find,
}

/// Archive settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub method: ArchiveMethod,

    /// Command used by [`ArchiveMethod::Cpio`]
    #[serde(default = "default_archive_command")]
    pub command: ToolCommand,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            method: ArchiveMethod::default(),
            command: default_archive_command(),
        }
    }
}

/// Archive backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveMethod {
    /// External cpio process fed on stdin
    #[default]
    Cpio,
    /// In-process tar writer
    Tar,
}

/// Compression settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompressionConfig {
    #[serde(default)]
    pub method: CompressionMethod,

    /// Command used by [`CompressionMethod::Gzip`]
    #[serde(default = "default_compression_command")]
    pub command: ToolCommand,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            method: CompressionMethod::default(),
            command: default_compression_command(),
        }
    }
}

/// Compression backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionMethod {
    /// External gzip process
    #[default]
    Gzip,
    /// In-process gzip encoder
    Builtin,
}

/// An external program and its leading arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
}

impl ToolCommand {
    /// Build a command from a program name and its arguments.
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl TryFrom<Vec<String>> for ToolCommand {
    type Error = String;

    fn try_from(mut parts: Vec<String>) -> std::result::Result<Self, Self::Error> {
        if parts.is_empty() || parts[0].trim().is_empty() {
            return Err("command must name a program".to_string());
        }
        let program = parts.remove(0);
        Ok(Self {
            program,
            args: parts,
        })
    }
}

impl From<ToolCommand> for Vec<String> {
    fn from(command: ToolCommand) -> Self {
        let mut parts = vec![command.program];
        parts.extend(command.args);
        parts
    }
}

impl std::fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

fn command_from(parts: &[&str]) -> ToolCommand {
    ToolCommand::new(parts[0], &parts[1..])
}

fn default_enumeration_command() -> ToolCommand {
    command_from(DEFAULT_ENUMERATION_COMMAND)
}

fn default_archive_command() -> ToolCommand {
    command_from(DEFAULT_ARCHIVE_COMMAND)
}

fn default_compression_command() -> ToolCommand {
    command_from(DEFAULT_COMPRESSION_COMMAND)
}

impl BackupConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config_not_found(path.as_str())
            } else {
                Error::Io(e)
            }
        })?;

        let config = Self::from_yaml(&content)?;
        tracing::debug!(
            "Loaded {} with {} directories and {} ignore patterns",
            path,
            config.directories.len(),
            config.ignore.len()
        );
        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        // Archive members are made relative to `/`, so roots must be absolute
        if let Some((name, path)) = self
            .directories
            .iter()
            .find(|(_, path)| !path.is_absolute())
        {
            return Err(Error::invalid_config(format!(
                "directory '{}' must be an absolute path, got '{}'",
                name, path
            )));
        }
        Ok(())
    }

    /// Root directories in configuration key order
    pub fn roots(&self) -> Vec<Utf8PathBuf> {
        self.directories.values().cloned().collect()
    }

    /// Exclusion pattern strings in configuration key order
    pub fn patterns(&self) -> Vec<String> {
        self.ignore.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
directories:
  www: /var/www
"#;
        let config = BackupConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.roots(), vec![Utf8PathBuf::from("/var/www")]);
        assert!(config.patterns().is_empty());
        assert_eq!(config.enumeration.method, EnumerationMethod::Walk);
        assert_eq!(config.archive.method, ArchiveMethod::Cpio);
        assert_eq!(config.archive.command.program(), "cpio");
        assert_eq!(config.archive.command.args(), ["-o"]);
        assert_eq!(config.compression.method, CompressionMethod::Gzip);
        assert_eq!(config.compression.command.to_string(), "gzip -9");
    }

    #[test]
    fn test_parse_dirs_alias_and_ignore() {
        let yaml = r#"
dirs:
  b: /data/b
  a: /data/a
ignore:
  tmp: '\.tmp$'
  cache: /cache/
"#;
        let config = BackupConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.roots(),
            vec![Utf8PathBuf::from("/data/a"), Utf8PathBuf::from("/data/b")]
        );
        assert_eq!(config.patterns(), vec!["/cache/", r"\.tmp$"]);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
directories:
  etc: /etc
enumeration:
  method: find
  command: [/usr/bin/find]
archive:
  method: tar
compression:
  method: builtin
  command: [pigz, "-9"]
"#;
        let config = BackupConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.enumeration.method, EnumerationMethod::Find);
        assert_eq!(config.enumeration.command.program(), "/usr/bin/find");
        assert_eq!(config.archive.method, ArchiveMethod::Tar);
        assert_eq!(config.compression.method, CompressionMethod::Builtin);
        assert_eq!(config.compression.command.to_string(), "pigz -9");
    }

    #[test]
    fn test_empty_command_rejected() {
        let yaml = r#"
archive:
  command: []
"#;
        assert!(matches!(
            BackupConfig::from_yaml(yaml),
            Err(Error::YamlParse(_))
        ));
    }

    #[test]
    fn test_relative_directory_rejected() {
        let yaml = r#"
directories:
  www: var/www
"#;
        assert!(matches!(
            BackupConfig::from_yaml(yaml),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(BackupConfig::from_yaml("destinations: {}\n").is_err());
    }

    #[test]
    fn test_misspelled_section_key_rejected() {
        for yaml in [
            "archive:\n  methd: tar\n",
            "enumeration:\n  mode: find\n",
            "compression:\n  level: 9\n",
        ] {
            let err = BackupConfig::from_yaml(yaml).unwrap_err();
            assert!(matches!(err, Error::YamlParse(_)), "{yaml}");
        }
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().join("absent.yaml")).unwrap();
        assert!(matches!(
            BackupConfig::load(&path),
            Err(Error::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().join("backup.yaml")).unwrap();
        fs::write(&path, "directories:\n  home: /home\n").unwrap();

        let config = BackupConfig::load(&path).unwrap();
        assert_eq!(config.roots(), vec![Utf8PathBuf::from("/home")]);
    }
}
