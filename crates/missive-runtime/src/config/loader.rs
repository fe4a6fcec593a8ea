//! Layered configuration loading on top of figment.
//!
//! Sources, from lowest to highest precedence:
//!
//! 1. [`MissiveConfig::default`]
//! 2. values passed to [`ConfigLoader::merge`]
//! 3. the profile file, e.g. `missive.production.toml`
//! 4. the main file, e.g. `missive.toml`
//! 5. `MISSIVE_*` environment variables, with `__` between keys:
//!    `MISSIVE_LOGGING__LEVEL=debug` sets `logging.level`
//!
//! Files are looked up in each search directory in turn, trying the stems
//! `missive` and `config` with every enabled format (`toml` with the
//! `toml-config` feature, `yaml`/`yml` with `yaml-config`). The first
//! directory, stem and extension for which either the main or the profile
//! file exists is used; the rest are ignored.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new().profile("production").load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info};

use super::error::{ConfigError, ConfigResult};
use super::schema::MissiveConfig;
use super::validation::validate_config;

/// Environment variable selecting the profile.
pub const PROFILE_ENV: &str = "MISSIVE_PROFILE";

/// Prefix of environment variables merged into the configuration.
pub const ENV_PREFIX: &str = "MISSIVE_";

const FILE_STEMS: [&str; 2] = ["missive", "config"];

/// Selects the profile file merged beneath the main file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// `development`, used when no profile is given.
    #[default]
    Development,
    /// `production`.
    Production,
    /// Any other name, stored lowercase.
    Custom(String),
}

impl Profile {
    /// The name used in profile file names, e.g. `missive.{name}.toml`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// The profile named by `MISSIVE_PROFILE`, or development when unset.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .map(|name| Self::from(name.as_str()))
            .unwrap_or_default()
    }
}

/// Case-insensitive; `dev` and `prod` are accepted.
impl From<&str> for Profile {
    fn from(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "development" | "dev" => Self::Development,
            "production" | "prod" => Self::Production,
            _ => Self::Custom(name),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Toml,
    Yaml,
}

impl FileFormat {
    const ALL: [Self; 2] = [Self::Toml, Self::Yaml];

    fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Toml => &["toml"],
            Self::Yaml => &["yaml", "yml"],
        }
    }

    fn enabled(self) -> bool {
        match self {
            Self::Toml => cfg!(feature = "toml-config"),
            Self::Yaml => cfg!(feature = "yaml-config"),
        }
    }

    /// The enabled format matching the extension of `path`.
    fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.enabled() && format.extensions().contains(&ext.as_str()))
    }

    #[cfg_attr(
        not(any(feature = "toml-config", feature = "yaml-config")),
        allow(unused_variables)
    )]
    fn merge_into(self, figment: Figment, path: &Path) -> Figment {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => figment.merge(Toml::file(path)),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => figment.merge(Yaml::file(path)),
            #[allow(unreachable_patterns)]
            _ => figment,
        }
    }
}

/// Builds a [`MissiveConfig`] from defaults, files and the environment.
#[derive(Debug)]
pub struct ConfigLoader {
    profile: Profile,
    search_paths: Vec<PathBuf>,
    config_file: Option<PathBuf>,
    overrides: Vec<MissiveConfig>,
    load_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// A loader using the profile from `MISSIVE_PROFILE` and reading the
    /// environment.
    pub fn new() -> Self {
        Self {
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            config_file: None,
            overrides: Vec::new(),
            load_env: true,
        }
    }

    /// Overrides the profile taken from `MISSIVE_PROFILE`.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::from(profile.as_ref());
        self
    }

    /// Adds a directory to search for configuration files.
    ///
    /// Without any, the current directory and `<user config dir>/missive`
    /// are searched.
    pub fn search_path(mut self, path: impl AsRef<Path>) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching. It must exist.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Merges `MISSIVE_*` environment variables last (the default).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Ignores `MISSIVE_*` environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Layers `config` above the defaults and below every file.
    pub fn merge(mut self, config: MissiveConfig) -> Self {
        self.overrides.push(config);
        self
    }

    /// Merges every source, then validates the result.
    ///
    /// # Errors
    ///
    /// Fails if an explicit file is missing or has an unsupported extension,
    /// if the sources cannot be deserialized, or if validation rejects a
    /// value.
    pub fn load(self) -> ConfigResult<MissiveConfig> {
        let config: MissiveConfig = self.figment()?.extract()?;
        validate_config(&config)?;

        debug!(
            profile = %self.profile,
            level = %config.logging.level,
            validate_on_build = config.dispatch.validate_on_build,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn figment(&self) -> ConfigResult<Figment> {
        let files = match &self.config_file {
            Some(path) if !path.is_file() => return Err(ConfigError::FileNotFound(path.clone())),
            Some(path) => vec![path.clone()],
            None => self.discover(),
        };

        let mut figment = self.overrides.iter().fold(
            Figment::from(Serialized::defaults(MissiveConfig::default())),
            |figment, config| figment.merge(Serialized::defaults(config)),
        );

        if files.is_empty() {
            debug!(search_paths = ?self.search_dirs(), "No configuration file found");
        }
        for path in &files {
            let format = FileFormat::of(path)
                .ok_or_else(|| ConfigError::UnsupportedFormat { path: path.clone() })?;
            info!(path = %path.display(), "Loading configuration file");
            figment = format.merge_into(figment, path);
        }

        if self.load_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).split("__"));
        }
        Ok(figment)
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("missive")))
            .collect()
    }

    /// The profile file then the main file of the first candidate that has
    /// either.
    fn discover(&self) -> Vec<PathBuf> {
        let extensions: Vec<&str> = FileFormat::ALL
            .into_iter()
            .filter(|format| format.enabled())
            .flat_map(|format| format.extensions().iter().copied())
            .collect();

        for dir in self.search_dirs() {
            for stem in FILE_STEMS {
                for ext in &extensions {
                    let found: Vec<PathBuf> = [
                        dir.join(format!("{stem}.{}.{ext}", self.profile)),
                        dir.join(format!("{stem}.{ext}")),
                    ]
                    .into_iter()
                    .filter(|path| path.is_file())
                    .collect();

                    if !found.is_empty() {
                        return found;
                    }
                }
            }
        }
        Vec::new()
    }
}

/// Loads from the default search paths and the environment.
pub fn load_config() -> ConfigResult<MissiveConfig> {
    ConfigLoader::new().load()
}

/// Loads `path` and the environment.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<MissiveConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;
    use crate::config::{LogFormat, LogLevel, LogOutput};

    fn load_from(jail: &Jail, loader: ConfigLoader) -> figment::Result<MissiveConfig> {
        loader
            .search_path(jail.directory())
            .load()
            .map_err(|e| figment::Error::from(e.to_string()))
    }

    #[test]
    fn test_nothing_to_load_yields_defaults() {
        Jail::expect_with(|jail| {
            let config = load_from(jail, ConfigLoader::new().without_env())?;
            assert_eq!(config, MissiveConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_profile_names() {
        assert_eq!(Profile::from("prod"), Profile::Production);
        assert_eq!(Profile::from("Development"), Profile::Development);
        assert_eq!(Profile::from(" Staging "), Profile::Custom("staging".into()));
        assert_eq!(Profile::Custom("qa".into()).to_string(), "qa");
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env(PROFILE_ENV, "production");
            assert_eq!(Profile::from_env(), Profile::Production);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "missive.toml",
                r#"
                    [logging]
                    level = "debug"
                    format = "pretty"

                    [dispatch]
                    log_registrations = true
                "#,
            )?;
            jail.set_env("MISSIVE_LOGGING__LEVEL", "warn");

            let config = load_from(jail, ConfigLoader::new())?;

            assert_eq!(config.logging.level, LogLevel::Warn);
            assert_eq!(config.logging.format, LogFormat::Pretty);
            assert!(config.dispatch.log_registrations);
            assert!(config.dispatch.validate_on_build);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_main_file_overrides_profile_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "missive.production.toml",
                "[logging]\noutput = \"stderr\"\nthread_ids = true\n",
            )?;
            jail.create_file("missive.toml", "[logging]\nthread_ids = false\n")?;

            let loader = ConfigLoader::new().profile("production").without_env();
            let config = load_from(jail, loader)?;

            assert_eq!(config.logging.output, LogOutput::Stderr);
            assert!(!config.logging.thread_ids);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_profile_file_alone_is_loaded() {
        Jail::expect_with(|jail| {
            jail.create_file("config.production.toml", "[logging]\nlevel = \"error\"\n")?;

            let loader = ConfigLoader::new().profile("prod").without_env();
            let config = load_from(jail, loader)?;

            assert_eq!(config.logging.level, LogLevel::Error);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_invalid_file_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("missive.toml", "[logging]\noutput = \"file\"\n")?;

            let result = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load();

            assert!(matches!(result, Err(ConfigError::Invalid { .. })));
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_errors() {
        let result = ConfigLoader::new()
            .file("does/not/exist.toml")
            .without_env()
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));

        Jail::expect_with(|jail| {
            jail.create_file("missive.ini", "level = debug\n")?;
            let result = ConfigLoader::new()
                .file(jail.directory().join("missive.ini"))
                .without_env()
                .load();
            assert!(matches!(result, Err(ConfigError::UnsupportedFormat { .. })));
            Ok(())
        });
    }

    #[test]
    fn test_programmatic_merge() {
        Jail::expect_with(|jail| {
            let mut overrides = MissiveConfig::default();
            overrides.dispatch.validate_on_build = false;

            let config = load_from(jail, ConfigLoader::new().without_env().merge(overrides))?;

            assert!(!config.dispatch.validate_on_build);
            Ok(())
        });
    }
}
