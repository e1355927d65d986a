//! Configuration management for issueflow
//!
//! Settings are layered: built-in defaults, then `ISSUEFLOW_*` environment
//! variables, then an `issueflow.yaml` file. Later layers win.

use crate::common::env_loader::EnvLoader;
use crate::cost::{CostAttributor, MemoryRateDirectory, WorkItemLabels, DEFAULT_RATE_DIVISOR};
use crate::ingest::ControllerSettings;
use crate::issues::{
    Calendar, CategoryMap, CustomFieldIds, DictionaryUsernameDirectory, ElapsedCalendar,
    HierarchyLabels, IssueExtractor, WorkingHoursCalendar,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const CONFIG_FILENAME: &str = "issueflow.yaml";
const ENV_PREFIX: &str = "ISSUEFLOW";

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file from disk
    #[error("Failed to read configuration file {path}: {source}")]
    FileRead {
        /// Path to the configuration file that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML content from a configuration file
    #[error("Invalid YAML syntax in {path}:\n{source}\n\nHint: Check for proper indentation and YAML formatting")]
    YamlParse {
        /// Path to the configuration file with invalid YAML content
        path: PathBuf,
        /// Underlying YAML parsing error
        #[source]
        source: serde_yaml::Error,
    },

    /// Invalid configuration value for a specific field
    #[error("Invalid configuration value for '{field}': {value}\n{hint}")]
    InvalidValue {
        /// Name of the configuration field
        field: String,
        /// The invalid value that was provided
        value: String,
        /// How to fix it
        hint: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {message}")]
    Validation {
        /// What failed
        message: String,
    },
}

/// Working window used to measure business time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSettings {
    /// Measure plain elapsed time instead of working hours
    pub elapsed: bool,
    /// First working hour of the day (default: 9)
    pub workday_start_hour: u32,
    /// Hour the working day ends (default: 18)
    pub workday_end_hour: u32,
    /// Offset of the local time zone from UTC, in minutes (default: 0)
    pub utc_offset_minutes: i32,
    /// Non-working dates
    pub holidays: Vec<NaiveDate>,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            elapsed: false,
            workday_start_hour: 9,
            workday_end_hour: 18,
            utc_offset_minutes: 0,
            holidays: Vec::new(),
        }
    }
}

/// Configuration settings for issueflow
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Query selecting the ingested universe (default: empty)
    pub query: String,
    /// Items requested per page (default: 100)
    pub page_size: u64,
    /// Items fetched per invocation at most (default: 5000)
    pub fetch_budget: u64,
    /// Working-set rows written per invocation (default: 2500)
    pub working_set_batch_size: u64,
    /// Changelog rows written per invocation (default: 5000)
    pub changelog_batch_size: u64,
    /// Directory holding the checkpoint, records and output tables (default: ".issueflow")
    pub data_dir: PathBuf,
    /// Tool name used in changelog keys (default: "jira")
    pub tool_name: String,
    /// Divisor turning an income weight into an hourly rate (default: 200)
    pub rate_divisor: Decimal,
    /// JSON file the file-backed issue source reads (default: none)
    pub source_path: Option<PathBuf>,
    /// Business time window
    pub calendar: CalendarSettings,
    /// Status id to category label
    pub status_categories: HashMap<String, String>,
    /// Project key to squad
    pub squads: HashMap<String, String>,
    /// Alias to canonical person name
    pub usernames: HashMap<String, String>,
    /// Person to income weight
    pub income_weights: HashMap<String, Decimal>,
    /// Tracker custom field ids
    pub custom_fields: CustomFieldIds,
    /// Type labels of hierarchy levels
    pub hierarchy_labels: HierarchyLabels,
    /// Type labels of costed work items
    pub work_item_labels: WorkItemLabels,
}

impl Default for Config {
    fn default() -> Self {
        let defaults = ControllerSettings::default();
        Self {
            query: defaults.query,
            page_size: defaults.page_size,
            fetch_budget: defaults.fetch_budget,
            working_set_batch_size: defaults.working_set_batch_size,
            changelog_batch_size: defaults.changelog_batch_size,
            data_dir: PathBuf::from(".issueflow"),
            tool_name: defaults.tool_name,
            rate_divisor: Decimal::from(DEFAULT_RATE_DIVISOR),
            source_path: None,
            calendar: CalendarSettings::default(),
            status_categories: HashMap::new(),
            squads: HashMap::new(),
            usernames: HashMap::new(),
            income_weights: HashMap::new(),
            custom_fields: CustomFieldIds::default(),
            hierarchy_labels: HierarchyLabels::default(),
            work_item_labels: WorkItemLabels::default(),
        }
    }
}

impl Config {
    /// Create a new configuration instance with values loaded from:
    /// 1. YAML file found by [`Config::find_yaml_config_file`] (highest precedence)
    /// 2. Environment variables
    /// 3. Defaults (lowest precedence)
    ///
    /// A YAML file that cannot be read or parsed is logged and skipped.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.apply_env_vars();

        match YamlConfig::load_or_default() {
            Ok(yaml_config) => {
                yaml_config.apply_to_config(&mut config);
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load YAML configuration, falling back to env vars and defaults: {}",
                    e
                );
            }
        }

        config
    }

    /// Load defaults and environment, then the YAML file at `path`
    ///
    /// Unlike [`Config::new`], a broken file is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_vars();
        YamlConfig::load_from_file(path)?.apply_to_config(&mut config);
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        let loader = EnvLoader::new(ENV_PREFIX);

        self.query = loader.load_string("QUERY", &self.query);
        self.page_size = loader.load_validated("PAGE_SIZE", self.page_size, |v| *v > 0);
        self.fetch_budget = loader.load_validated("FETCH_BUDGET", self.fetch_budget, |v| *v > 0);
        self.working_set_batch_size = loader.load_validated(
            "WORKING_SET_BATCH_SIZE",
            self.working_set_batch_size,
            |v| *v > 0,
        );
        self.changelog_batch_size = loader.load_validated(
            "CHANGELOG_BATCH_SIZE",
            self.changelog_batch_size,
            |v| *v > 0,
        );
        self.data_dir = loader.load_path("DATA_DIR", &self.data_dir);
        self.tool_name = loader.load_string("TOOL_NAME", &self.tool_name);
        self.rate_divisor = loader.load_parsed("RATE_DIVISOR", self.rate_divisor);
        if let Some(path) = loader.load_optional::<PathBuf>("SOURCE_PATH") {
            self.source_path = Some(path);
        }
    }

    /// Find the issueflow.yaml configuration file
    ///
    /// The search order is:
    /// 1. Current working directory: `issueflow.yaml`
    /// 2. `~/.config/issueflow/issueflow.yaml`
    /// 3. `~/issueflow.yaml`
    pub fn find_yaml_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(CONFIG_FILENAME)];

        if let Some(home_dir) = dirs::home_dir() {
            search_paths.push(
                home_dir
                    .join(".config")
                    .join("issueflow")
                    .join(CONFIG_FILENAME),
            );
            search_paths.push(home_dir.join(CONFIG_FILENAME));
        }

        for config_path in search_paths {
            if let Some(path) = Self::check_config_file(&config_path) {
                tracing::debug!("Found configuration file: {:?}", path);
                return Some(path);
            }
        }

        tracing::debug!("No {} configuration file found in any search location", CONFIG_FILENAME);
        None
    }

    /// Check if a configuration file exists and is readable
    pub fn check_config_file(config_path: &Path) -> Option<PathBuf> {
        match config_path.try_exists() {
            Ok(true) if config_path.is_file() => match std::fs::File::open(config_path) {
                Ok(_) => Some(config_path.to_path_buf()),
                Err(e) => {
                    tracing::warn!(
                        "Configuration file {:?} exists but cannot be read: {}",
                        config_path,
                        e
                    );
                    None
                }
            },
            Ok(false) => None,
            Ok(true) => {
                tracing::debug!(
                    "Found {:?} but it is not a file (possibly a directory)",
                    config_path
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    "Error checking for configuration file {:?}: {}",
                    config_path,
                    e
                );
                None
            }
        }
    }

    /// Validate the current configuration settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_limits()?;
        self.validate_calendar()?;
        self.validate_categories()?;
        Ok(())
    }

    fn validate_limits(&self) -> Result<(), ConfigError> {
        let positive = [
            ("page_size", self.page_size),
            ("fetch_budget", self.fetch_budget),
            ("working_set_batch_size", self.working_set_batch_size),
            ("changelog_batch_size", self.changelog_batch_size),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    hint: format!("{} must be greater than zero", field),
                });
            }
        }

        if self.rate_divisor <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "rate_divisor".to_string(),
                value: self.rate_divisor.to_string(),
                hint: "rate_divisor must be greater than zero".to_string(),
            });
        }

        if self.tool_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "tool_name".to_string(),
                value: self.tool_name.clone(),
                hint: "tool_name prefixes changelog keys and cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    fn validate_calendar(&self) -> Result<(), ConfigError> {
        let calendar = &self.calendar;
        if calendar.elapsed {
            return Ok(());
        }
        if calendar.workday_end_hour > 24 || calendar.workday_start_hour >= calendar.workday_end_hour
        {
            return Err(ConfigError::InvalidValue {
                field: "calendar".to_string(),
                value: format!(
                    "{}..{}",
                    calendar.workday_start_hour, calendar.workday_end_hour
                ),
                hint: "workday_start_hour must be before workday_end_hour, which is at most 24"
                    .to_string(),
            });
        }
        if calendar.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::InvalidValue {
                field: "calendar.utc_offset_minutes".to_string(),
                value: calendar.utc_offset_minutes.to_string(),
                hint: "utc_offset_minutes must be within one day of UTC".to_string(),
            });
        }
        Ok(())
    }

    fn validate_categories(&self) -> Result<(), ConfigError> {
        let mut statuses: Vec<&String> = self.status_categories.keys().collect();
        statuses.sort();
        for status in statuses {
            if self.status_categories[status].trim().is_empty() {
                return Err(ConfigError::Validation {
                    message: format!("status '{}' maps to an empty category label", status),
                });
            }
        }
        Ok(())
    }

    /// Limits for the ingestion controller
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            query: self.query.clone(),
            page_size: self.page_size,
            fetch_budget: self.fetch_budget,
            working_set_batch_size: self.working_set_batch_size,
            changelog_batch_size: self.changelog_batch_size,
            tool_name: self.tool_name.clone(),
        }
    }

    /// The status to category map
    pub fn category_map(&self) -> CategoryMap {
        CategoryMap::from(&self.status_categories)
    }

    /// The business time calendar
    pub fn calendar(&self) -> Result<Arc<dyn Calendar>, ConfigError> {
        let settings = &self.calendar;
        if settings.elapsed {
            return Ok(Arc::new(ElapsedCalendar));
        }
        let calendar = WorkingHoursCalendar::new(
            settings.workday_start_hour,
            settings.workday_end_hour,
            settings.utc_offset_minutes,
        )
        .ok_or_else(|| ConfigError::Validation {
            message: format!(
                "working window {}..{} at offset {} minutes is not usable",
                settings.workday_start_hour,
                settings.workday_end_hour,
                settings.utc_offset_minutes
            ),
        })?
        .with_holidays(settings.holidays.iter().copied());
        Ok(Arc::new(calendar))
    }

    /// An extractor using every mapping in this configuration
    pub fn extractor(&self) -> Result<IssueExtractor, ConfigError> {
        let usernames = DictionaryUsernameDirectory::from(&self.usernames);
        Ok(IssueExtractor::new(self.category_map(), self.calendar()?)
            .with_usernames(Arc::new(usernames))
            .with_squads(self.squads.clone())
            .with_custom_fields(self.custom_fields.clone()))
    }

    /// A cost attributor using the income weights and labels in this configuration
    pub fn cost_attributor(&self) -> CostAttributor {
        CostAttributor::new(Arc::new(MemoryRateDirectory::from(&self.income_weights)))
            .with_rate_divisor(self.rate_divisor)
            .with_work_item_labels(self.work_item_labels.clone())
            .with_hierarchy_labels(self.hierarchy_labels.clone())
    }

    /// Where the checkpoint is kept
    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir.join("checkpoint.json")
    }

    /// Where fetched records are kept
    pub fn records_path(&self) -> PathBuf {
        self.data_dir.join("records.jsonl")
    }

    /// Where the working-set table is written
    pub fn working_set_path(&self) -> PathBuf {
        self.data_dir.join("working_set.csv")
    }

    /// Where the changelog table is written
    pub fn changelog_path(&self) -> PathBuf {
        self.data_dir.join("changelog.csv")
    }

    /// Generate an example YAML configuration file content
    pub fn example_yaml_config() -> &'static str {
        r#"# issueflow.yaml

query: "project in (SHOP, PAY) ORDER BY key"
page_size: 100
fetch_budget: 5000
data_dir: ".issueflow"
source_path: "export/issues.json"

calendar:
  workday_start_hour: 9
  workday_end_hour: 18
  utc_offset_minutes: -180
  holidays: ["2024-12-25"]

status_categories:
  "10000": backlog_time
  "3": in_progress_time
  "10001": done_time

squads:
  SHOP: Checkout

usernames:
  "ana.souza@example.com": Ana Souza

income_weights:
  Ana Souza: 20000
"#
    }
}

/// Configuration loaded from an issueflow.yaml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlConfig {
    /// Query selecting the ingested universe
    pub query: Option<String>,
    /// Items requested per page
    pub page_size: Option<u64>,
    /// Items fetched per invocation
    pub fetch_budget: Option<u64>,
    /// Working-set rows written per invocation
    pub working_set_batch_size: Option<u64>,
    /// Changelog rows written per invocation
    pub changelog_batch_size: Option<u64>,
    /// Data directory
    pub data_dir: Option<PathBuf>,
    /// Tool name
    pub tool_name: Option<String>,
    /// Rate divisor
    pub rate_divisor: Option<Decimal>,
    /// Issue payload file
    pub source_path: Option<PathBuf>,
    /// Business time window
    pub calendar: Option<CalendarSettings>,
    /// Status id to category label
    pub status_categories: Option<HashMap<String, String>>,
    /// Project key to squad
    pub squads: Option<HashMap<String, String>>,
    /// Username dictionary
    pub usernames: Option<HashMap<String, String>>,
    /// Income weights
    pub income_weights: Option<HashMap<String, Decimal>>,
    /// Custom field ids
    pub custom_fields: Option<CustomFieldIds>,
    /// Hierarchy type labels
    pub hierarchy_labels: Option<HierarchyLabels>,
    /// Work item type labels
    pub work_item_labels: Option<WorkItemLabels>,
}

impl YamlConfig {
    /// Apply YAML configuration values to an existing Config
    /// YAML values take precedence over existing values
    pub fn apply_to_config(&self, config: &mut Config) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut config.query, &self.query);
        set(&mut config.page_size, &self.page_size);
        set(&mut config.fetch_budget, &self.fetch_budget);
        set(&mut config.working_set_batch_size, &self.working_set_batch_size);
        set(&mut config.changelog_batch_size, &self.changelog_batch_size);
        set(&mut config.data_dir, &self.data_dir);
        set(&mut config.tool_name, &self.tool_name);
        set(&mut config.rate_divisor, &self.rate_divisor);
        set(&mut config.calendar, &self.calendar);
        set(&mut config.status_categories, &self.status_categories);
        set(&mut config.squads, &self.squads);
        set(&mut config.usernames, &self.usernames);
        set(&mut config.income_weights, &self.income_weights);
        set(&mut config.custom_fields, &self.custom_fields);
        set(&mut config.hierarchy_labels, &self.hierarchy_labels);
        set(&mut config.work_item_labels, &self.work_item_labels);
        if self.source_path.is_some() {
            config.source_path = self.source_path.clone();
        }
    }

    /// Load YAML configuration from a file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::info!("Loading YAML configuration from: {:?}", path);

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Try to load YAML configuration, returning default if file not found
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Config::find_yaml_config_file() {
            Some(path) => Self::load_from_file(path),
            None => {
                tracing::debug!("No configuration file found, using default YAML config");
                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::TempDir;

    const ENV_VARS: [&str; 6] = [
        "ISSUEFLOW_QUERY",
        "ISSUEFLOW_PAGE_SIZE",
        "ISSUEFLOW_FETCH_BUDGET",
        "ISSUEFLOW_DATA_DIR",
        "ISSUEFLOW_RATE_DIVISOR",
        "ISSUEFLOW_SOURCE_PATH",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILENAME);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.fetch_budget, 5000);
        assert_eq!(config.working_set_batch_size, 2500);
        assert_eq!(config.changelog_batch_size, 5000);
        assert_eq!(config.tool_name, "jira");
        assert_eq!(config.rate_divisor, dec!(200));
        assert_eq!(config.data_dir, PathBuf::from(".issueflow"));
        assert_eq!(config.calendar.workday_start_hour, 9);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_config_new_without_overrides() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp_dir.path()).unwrap();

        let config = Config::new();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.source_path, None);

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_config_with_env_vars() {
        clear_env();
        std::env::set_var("ISSUEFLOW_QUERY", "project = SHOP");
        std::env::set_var("ISSUEFLOW_PAGE_SIZE", "50");
        std::env::set_var("ISSUEFLOW_FETCH_BUDGET", "0");
        std::env::set_var("ISSUEFLOW_RATE_DIVISOR", "160");
        std::env::set_var("ISSUEFLOW_SOURCE_PATH", "/tmp/issues.json");

        let temp_dir = TempDir::new().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp_dir.path()).unwrap();

        let config = Config::new();
        assert_eq!(config.query, "project = SHOP");
        assert_eq!(config.page_size, 50);
        assert_eq!(config.fetch_budget, 5000);
        assert_eq!(config.rate_divisor, dec!(160));
        assert_eq!(config.source_path, Some(PathBuf::from("/tmp/issues.json")));

        std::env::set_current_dir(original_dir).unwrap();
        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_precedence_yaml_overrides_env() {
        clear_env();
        std::env::set_var("ISSUEFLOW_PAGE_SIZE", "50");
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(temp_dir.path(), "page_size: 25\ntool_name: tracker\n");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.tool_name, "tracker");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_find_yaml_config_file_in_current_dir() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        write_config(temp_dir.path(), "fetch_budget: 300\n");
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp_dir.path()).unwrap();

        let found = Config::find_yaml_config_file();
        let config = Config::new();

        std::env::set_current_dir(original_dir).unwrap();
        assert_eq!(found, Some(PathBuf::from(CONFIG_FILENAME)));
        assert_eq!(config.fetch_budget, 300);
    }

    #[test]
    fn test_check_config_file_rejects_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Config::check_config_file(temp_dir.path()).is_none());
        assert!(Config::check_config_file(&temp_dir.path().join("missing.yaml")).is_none());
    }

    #[test]
    fn test_example_yaml_config_parses() {
        let yaml: YamlConfig = serde_yaml::from_str(Config::example_yaml_config()).unwrap();
        let mut config = Config::default();
        yaml.apply_to_config(&mut config);

        assert!(config.validate().is_ok());
        assert_eq!(config.calendar.utc_offset_minutes, -180);
        assert_eq!(config.calendar.holidays.len(), 1);
        assert_eq!(config.status_categories.get("3").map(String::as_str), Some("in_progress_time"));
        assert_eq!(config.income_weights.get("Ana Souza"), Some(&dec!(20000)));
        assert!(config.category_map().is_in("10001", "done_time"));
    }

    #[test]
    fn test_yaml_config_partial_keeps_existing_values() {
        let yaml: YamlConfig = serde_yaml::from_str("tool_name: tracker").unwrap();
        let mut config = Config::default();
        yaml.apply_to_config(&mut config);
        assert_eq!(config.tool_name, "tracker");
        assert_eq!(config.page_size, 100);
        assert_eq!(config.custom_fields, CustomFieldIds::default());
    }

    #[test]
    fn test_load_from_file_errors() {
        let temp_dir = TempDir::new().unwrap();
        let missing = YamlConfig::load_from_file(temp_dir.path().join("nope.yaml"));
        assert!(matches!(missing, Err(ConfigError::FileRead { .. })));

        let path = write_config(temp_dir.path(), "page_size: [not a number\n");
        assert!(matches!(
            YamlConfig::load_from_file(&path),
            Err(ConfigError::YamlParse { .. })
        ));

        let path = write_config(temp_dir.path(), "unknown_setting: 1\n");
        assert!(matches!(
            YamlConfig::load_from_file(&path),
            Err(ConfigError::YamlParse { .. })
        ));

        let path = write_config(temp_dir.path(), "   \n");
        assert!(YamlConfig::load_from_file(&path).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.page_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "page_size"
        ));

        let mut config = Config::default();
        config.rate_divisor = Decimal::ZERO;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.calendar.workday_start_hour = 18;
        config.calendar.workday_end_hour = 9;
        assert!(config.validate().is_err());
        assert!(config.calendar().is_err());

        let mut config = Config::default();
        config.status_categories.insert("3".to_string(), " ".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_elapsed_calendar_skips_window_checks() {
        let mut config = Config::default();
        config.calendar.elapsed = true;
        config.calendar.workday_start_hour = 20;
        assert!(config.validate().is_ok());
        assert!(config.calendar().is_ok());
    }

    #[test]
    fn test_derived_settings_and_paths() {
        let mut config = Config::default();
        config.data_dir = PathBuf::from("/data");
        config.query = "project = SHOP".to_string();

        let settings = config.controller_settings();
        assert_eq!(settings.query, "project = SHOP");
        assert_eq!(settings.page_size, 100);
        assert_eq!(config.checkpoint_path(), PathBuf::from("/data/checkpoint.json"));
        assert_eq!(config.records_path(), PathBuf::from("/data/records.jsonl"));
        assert_eq!(config.working_set_path(), PathBuf::from("/data/working_set.csv"));
        assert_eq!(config.changelog_path(), PathBuf::from("/data/changelog.csv"));
        assert!(config.extractor().is_ok());
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::InvalidValue {
            field: "page_size".to_string(),
            value: "0".to_string(),
            hint: "page_size must be greater than zero".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("page_size"));
        assert!(message.contains("greater than zero"));
    }
}
