//! Settings loaders: JSON file and `ASSISTANT_*` environment variables.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::schema::Settings;

/// Prefix of every environment variable read by [`Settings::from_env`].
pub const ENV_PREFIX: &str = "ASSISTANT_";

impl Settings {
    /// Reads settings from a JSON file; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlays `ASSISTANT_*` pairs from the supplied iterator.
    ///
    /// Keys without the prefix and unknown keys are ignored. Empty values
    /// clear optional settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidVar`] if a value does not parse.
    pub fn apply_vars<I, K, V>(&mut self, vars: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let key = key.as_ref();
            let value = value.as_ref();
            let Some(field) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            match field {
                "MODEL" => self.model = value.to_owned(),
                "PROVIDER" => self.provider = parse(key, value)?,
                "BASE_URL" => self.base_url = non_empty(value).map(str::to_owned),
                "NAME" => self.name = value.to_owned(),
                "TEMPERATURE" => self.temperature = parse(key, value)?,
                "TOP_P" => self.top_p = parse_optional(key, value)?,
                "MAX_TOKENS" => self.max_tokens = parse(key, value)?,
                "SEED" => self.seed = parse_optional(key, value)?,
                "DEBUG" | "DEBUG_MODE" => self.debug = parse_bool(key, value)?,
                "CLEAR_TERMINAL" => self.clear_terminal = parse_bool(key, value)?,
                "HISTORY_LIMIT" => self.history_limit = parse(key, value)?,
                "MAX_TOOL_ROUNDS" => self.max_tool_rounds = parse(key, value)?,
                "ENABLE_REASONING_VALIDATION" => {
                    self.enable_reasoning_validation = parse_bool(key, value)?;
                }
                "REASONING_QUALITY_THRESHOLD" => {
                    self.reasoning_quality_threshold = parse(key, value)?;
                }
                "REQUEST_TIMEOUT_SECS" => self.request_timeout_secs = parse(key, value)?,
                "PROMPTS_PATH" => self.prompts_path = non_empty(value).map(PathBuf::from),
                _ => {
                    debug!(key, "ignoring unknown settings variable");
                    continue;
                }
            }
            debug!(key, "applied settings override");
        }
        Ok(())
    }

    /// Defaults overlaid by the supplied variables, then validated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidVar`] or [`ConfigError::Invalid`].
    pub fn from_vars<I, K, V>(vars: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = Self::default();
        settings.apply_vars(vars)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults overlaid by the process environment, then validated.
    ///
    /// # Errors
    ///
    /// See [`Settings::from_vars`].
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Full layering: defaults, then `file` if given, then the environment.
    ///
    /// # Errors
    ///
    /// Returns any loader or validation error.
    pub fn load(file: Option<&Path>) -> ConfigResult<Self> {
        Self::load_with_vars(file, std::env::vars())
    }

    /// Like [`Settings::load`] with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Returns any loader or validation error.
    pub fn load_with_vars<I, K, V>(file: Option<&Path>, vars: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_vars(vars)?;
        settings.validate()?;
        Ok(settings)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn parse<T>(key: &str, value: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|err: T::Err| ConfigError::InvalidVar {
        key: key.to_owned(),
        value: value.to_owned(),
        reason: err.to_string(),
    })
}

fn parse_optional<T>(key: &str, value: &str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    non_empty(value).map(|v| parse(key, v)).transpose()
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidVar {
            key: key.to_owned(),
            value: value.to_owned(),
            reason: "expected a boolean".to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Provider;
    use std::io::Write;

    #[test]
    fn env_overrides_defaults() {
        let settings = Settings::from_vars([
            ("ASSISTANT_MODEL", "llama3.2"),
            ("ASSISTANT_PROVIDER", "ollama"),
            ("ASSISTANT_TEMPERATURE", "0.5"),
            ("ASSISTANT_SEED", "42"),
            ("ASSISTANT_DEBUG", "true"),
            ("PATH", "/usr/bin"),
        ])
        .unwrap();

        assert_eq!(settings.model, "llama3.2");
        assert_eq!(settings.provider, Provider::Ollama);
        assert!((settings.temperature - 0.5).abs() < f32::EPSILON);
        assert_eq!(settings.seed, Some(42));
        assert!(settings.debug);
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = Settings::from_vars([("ASSISTANT_MAX_TOKENS", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar { ref key, .. } if key == "ASSISTANT_MAX_TOKENS"));
        assert!(err.to_string().contains("lots"));
    }

    #[test]
    fn env_values_are_validated() {
        let err = Settings::from_vars([("ASSISTANT_TEMPERATURE", "3")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "temperature", .. }));
    }

    #[test]
    fn empty_values_clear_optionals() {
        let mut settings = Settings {
            seed: Some(7),
            ..Settings::default()
        };
        settings.apply_vars([("ASSISTANT_SEED", "")]).unwrap();
        assert_eq!(settings.seed, None);
    }

    #[test]
    fn file_then_env_layering() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"name": "Jarvis", "history_limit": 10, "max_tokens": 1024, "extra": 1}}"#
        )
        .unwrap();

        let settings =
            Settings::load_with_vars(Some(file.path()), [("ASSISTANT_MAX_TOKENS", "2048")])
                .unwrap();

        assert_eq!(settings.name, "Jarvis");
        assert_eq!(settings.history_limit, 10);
        assert_eq!(settings.max_tokens, 2048);
        assert_eq!(settings.model, "gemini-2.0-flash");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::from_file(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
