//! Configuration presets for common scenarios

use super::{Config, DisplayConfig, Format};
use crate::error::LogResult;

impl Config {
    /// Create configuration from environment variables.
    ///
    /// `HOSTPATH_LOG` wins over `RUST_LOG`. An unrecognised
    /// `HOSTPATH_LOG_FORMAT` is an error, not a silent default.
    pub fn from_env() -> LogResult<Self> {
        let mut config = Self::from_vars(|key| std::env::var(key).ok())?;
        config.display.parse_env();
        Ok(config)
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> LogResult<Self> {
        let mut config = Self::default();

        if let Some(level) = var("HOSTPATH_LOG").or_else(|| var("RUST_LOG")) {
            config.level = level;
        }
        if let Some(format) = var("HOSTPATH_LOG_FORMAT") {
            config.format = format.parse()?;
        }

        Ok(config)
    }

    /// Development configuration (pretty, debug level)
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: Format::Pretty,
            display: DisplayConfig {
                colors: true,
                source: true,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }

    /// Production configuration (JSON, info level)
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Json,
            display: DisplayConfig {
                colors: false,
                source: false,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }

    /// Raise the level by a `-v` count: 1 is debug, 2 or more is trace.
    ///
    /// Zero leaves the configured level alone, so an explicit filter from the
    /// environment survives a plain invocation.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        match verbosity {
            0 => {}
            1 => self.level = "debug".to_string(),
            _ => self.level = "trace".to_string(),
        }
        self
    }

    /// Override the output format
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0, "warn")]
    #[case(1, "debug")]
    #[case(2, "trace")]
    #[case(5, "trace")]
    fn verbosity_maps_to_level(#[case] verbosity: u8, #[case] expected: &str) {
        let config = Config {
            level: "warn".to_string(),
            ..Config::default()
        }
        .with_verbosity(verbosity);
        assert_eq!(config.level, expected);
    }

    #[rstest]
    #[case("pretty", Format::Pretty)]
    #[case("JSON", Format::Json)]
    #[case("text", Format::Compact)]
    fn parses_format_names(#[case] raw: &str, #[case] expected: Format) {
        assert_eq!(raw.parse::<Format>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_format() {
        assert!("xml".parse::<Format>().is_err());
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn env_format_is_parsed() {
        let config = Config::from_vars(vars(&[("HOSTPATH_LOG_FORMAT", "json")])).unwrap();
        assert_eq!(config.format, Format::Json);
    }

    #[test]
    fn unknown_env_format_is_an_error() {
        let err = Config::from_vars(vars(&[("HOSTPATH_LOG_FORMAT", "xml")])).unwrap_err();
        assert!(matches!(err, crate::LogError::UnknownFormat(ref raw) if raw == "xml"));
    }

    #[test]
    fn hostpath_log_wins_over_rust_log() {
        let config = Config::from_vars(vars(&[
            ("RUST_LOG", "warn"),
            ("HOSTPATH_LOG", "hostpath=debug"),
        ]))
        .unwrap();
        assert_eq!(config.level, "hostpath=debug");

        let config = Config::from_vars(vars(&[("RUST_LOG", "warn")])).unwrap();
        assert_eq!(config.level, "warn");
    }

    #[test]
    fn production_is_json_without_colors() {
        let config = Config::production();
        assert_eq!(config.format, Format::Json);
        assert!(!config.display.colors);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: Config = serde_json::from_str(r#"{"level":"debug","format":"json"}"#).unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, Format::Json);
        assert_eq!(config.writer, crate::Writer::Stderr);
    }
}
