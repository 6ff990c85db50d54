use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub analysis: AnalysisConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

/// Ranking and anomaly thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Entries per ranking view (default: 5)
    pub top_n: usize,
    /// Written/read ratio above which skew is classified as expansion (default: 1.5)
    pub skew_expansion_ratio: f64,
    /// Elapsed time multiple of the job average that counts as slow (default: 2.0)
    pub anomaly_elapsed_factor: f64,
    /// Input bytes fraction of the job average that counts as little input (default: 0.5)
    pub anomaly_input_factor: f64,
    /// Read rate fraction of the job average that counts as starved (default: 0.2)
    pub anomaly_read_rate_factor: f64,
    /// Prefix shared by runtime vertex identifiers (default: "SV")
    pub vertex_id_prefix: String,
    /// Unit of the runtime document's time attributes, used for rendering only
    pub time_unit: TimeUnit,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub format: ReportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum TimeUnit {
    #[serde(rename = "us", alias = "microseconds")]
    Microseconds,
    #[default]
    #[serde(rename = "ms", alias = "milliseconds")]
    Milliseconds,
    #[serde(rename = "s", alias = "seconds")]
    Seconds,
}

impl TimeUnit {
    /// Convert a raw document value to milliseconds for display
    pub fn to_millis(self, value: u64) -> f64 {
        match self {
            TimeUnit::Microseconds => value as f64 / 1000.0,
            TimeUnit::Milliseconds => value as f64,
            TimeUnit::Seconds => value as f64 * 1000.0,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "us" | "microseconds" => Ok(TimeUnit::Microseconds),
            "ms" | "milliseconds" => Ok(TimeUnit::Milliseconds),
            "s" | "seconds" => Ok(TimeUnit::Seconds),
            other => Err(format!("unsupported time unit: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unsupported report format: {}", other)),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Markdown => write!(f, "markdown"),
            ReportFormat::Json => write!(f, "json"),
        }
    }
}

impl Config {
    /// Load configuration with environment variable override support
    ///
    /// Loading order:
    /// 1. Load from the explicit path, or from conf/config.toml / config.toml
    /// 2. Override with environment variables (prefixed with APP_)
    /// 3. Validate the final configuration
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, anyhow::Error> {
        // 1. Load from config file
        let mut config = match explicit_path {
            Some(path) => Self::from_toml(path)?,
            None => match Self::find_config_file() {
                Some(config_path) => Self::from_toml(Path::new(&config_path))?,
                None => {
                    tracing::debug!("Configuration file not found, using defaults");
                    Config::default()
                },
            },
        };

        // 2. Override with environment variables
        config.apply_env_overrides();

        // 3. Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - APP_LOG_LEVEL: Logging level (e.g., "warn,job_insight=info")
    /// - APP_LOG_FILE: Log file path
    /// - APP_TOP_N: Entries per ranking view
    /// - APP_SKEW_EXPANSION_RATIO: Expansion classification threshold
    /// - APP_TIME_UNIT: Unit of runtime time attributes ("us", "ms", "s")
    /// - APP_REPORT_FORMAT: Output format ("markdown", "json")
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(level) = var("APP_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }

        if let Some(file) = var("APP_LOG_FILE") {
            self.logging.file = if file.trim().is_empty() { None } else { Some(file) };
            tracing::info!("Override logging.file from env: {:?}", self.logging.file);
        }

        if let Some(top_n) = var("APP_TOP_N") {
            match top_n.trim().parse::<usize>() {
                Ok(val) => {
                    self.analysis.top_n = val;
                    tracing::info!("Override analysis.top_n from env: {}", val);
                },
                Err(e) => tracing::warn!(
                    "Invalid APP_TOP_N '{}': {} (keep {})",
                    top_n,
                    e,
                    self.analysis.top_n
                ),
            }
        }

        if let Some(ratio) = var("APP_SKEW_EXPANSION_RATIO") {
            match ratio.trim().parse::<f64>() {
                Ok(val) => {
                    self.analysis.skew_expansion_ratio = val;
                    tracing::info!("Override analysis.skew_expansion_ratio from env: {}", val);
                },
                Err(e) => tracing::warn!(
                    "Invalid APP_SKEW_EXPANSION_RATIO '{}': {} (keep {})",
                    ratio,
                    e,
                    self.analysis.skew_expansion_ratio
                ),
            }
        }

        if let Some(unit) = var("APP_TIME_UNIT") {
            match unit.parse::<TimeUnit>() {
                Ok(val) => {
                    self.analysis.time_unit = val;
                    tracing::info!("Override analysis.time_unit from env: {:?}", val);
                },
                Err(e) => tracing::warn!(
                    "Invalid APP_TIME_UNIT '{}': {} (keep {:?})",
                    unit,
                    e,
                    self.analysis.time_unit
                ),
            }
        }

        if let Some(format) = var("APP_REPORT_FORMAT") {
            match format.parse::<ReportFormat>() {
                Ok(val) => {
                    self.report.format = val;
                    tracing::info!("Override report.format from env: {}", val);
                },
                Err(e) => tracing::warn!(
                    "Invalid APP_REPORT_FORMAT '{}': {} (keep {})",
                    format,
                    e,
                    self.report.format
                ),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.analysis.validate()
    }

    fn find_config_file() -> Option<String> {
        let possible_paths =
            ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &Path) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.top_n == 0 {
            anyhow::bail!("analysis.top_n must be > 0");
        }

        let factors = [
            ("analysis.skew_expansion_ratio", self.skew_expansion_ratio),
            ("analysis.anomaly_elapsed_factor", self.anomaly_elapsed_factor),
            ("analysis.anomaly_input_factor", self.anomaly_input_factor),
            ("analysis.anomaly_read_rate_factor", self.anomaly_read_rate_factor),
        ];
        for (name, value) in factors {
            if !value.is_finite() || value <= 0.0 {
                anyhow::bail!("{} must be a positive number, got {}", name, value);
            }
        }

        if self.vertex_id_prefix.is_empty() {
            anyhow::bail!("analysis.vertex_id_prefix cannot be empty");
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "warn,job_insight=info".to_string(), file: None }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            skew_expansion_ratio: 1.5,
            anomaly_elapsed_factor: 2.0,
            anomaly_input_factor: 0.5,
            anomaly_read_rate_factor: 0.2,
            vertex_id_prefix: "SV".to_string(),
            time_unit: TimeUnit::default(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { format: ReportFormat::Markdown }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
[analysis]
top_n = 3
time_unit = "us"

[report]
format = "json"
"#,
        )
        .unwrap();

        assert_eq!(config.analysis.top_n, 3);
        assert_eq!(config.analysis.time_unit, TimeUnit::Microseconds);
        assert_eq!(config.analysis.skew_expansion_ratio, 1.5);
        assert_eq!(config.analysis.vertex_id_prefix, "SV");
        assert_eq!(config.report.format, ReportFormat::Json);
        assert_eq!(config.logging.level, "warn,job_insight=info");
    }

    #[test]
    fn test_load_sample_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../conf/config.toml");
        let config = Config::from_toml(&path).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.top_n, 5);
        assert_eq!(config.logging.file, None);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        assert!(Config::load(Some(Path::new("/nonexistent/job-insight.toml"))).is_err());
    }

    /// Collects formatted log output for assertions
    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_invalid_override_is_logged_and_skipped() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .finish();

        let mut config = Config::default();
        tracing::subscriber::with_default(subscriber, || {
            config.apply_overrides(|key| match key {
                "APP_TOP_N" => Some("abc".to_string()),
                "APP_TIME_UNIT" => Some("us".to_string()),
                _ => None,
            })
        });

        assert_eq!(config.analysis.top_n, 5);
        assert_eq!(config.analysis.time_unit, TimeUnit::Microseconds);
        let output = logs.contents();
        assert!(output.contains("WARN"));
        assert!(output.contains("Invalid APP_TOP_N 'abc'"));
        assert!(output.contains("Override analysis.time_unit from env"));
    }

    #[test]
    fn test_validate_rejects_zero_top_n() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.analysis.top_n = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_factor() {
        let mut config = Config::default();
        config.analysis.anomaly_read_rate_factor = 0.0;
        assert!(config.validate().is_err());

        config.analysis.anomaly_read_rate_factor = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_enums_from_str() {
        assert_eq!("MD".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert_eq!("seconds".parse::<TimeUnit>().unwrap(), TimeUnit::Seconds);
        assert!("xml".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_time_unit_to_millis() {
        assert_eq!(TimeUnit::Microseconds.to_millis(2500), 2.5);
        assert_eq!(TimeUnit::Milliseconds.to_millis(42), 42.0);
        assert_eq!(TimeUnit::Seconds.to_millis(3), 3000.0);
    }
}
