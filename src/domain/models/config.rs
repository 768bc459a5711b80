use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format of block start/close dates, always UTC.
pub const BLOCK_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Main configuration structure for Defier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Course settings: blocks, thresholds and defy rules
    #[serde(default)]
    pub course: CourseConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Retry policy for optimistic-lock conflicts
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Course-level challenge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CourseConfig {
    /// Course namespace; also the name of the course group and board
    #[serde(default = "default_course_name")]
    pub name: String,

    /// Weight of the challenge module in the course grade
    #[serde(default = "default_module_weight")]
    pub module_weight: u32,

    /// Defies a participant must win to complete a block
    #[serde(default = "default_wins_required")]
    pub wins_required: u32,

    /// Maximum number of playable defies per block that count towards its score
    #[serde(default = "default_max_challenges")]
    pub max_challenges: u32,

    /// Content blocks, in display order
    #[serde(default = "default_blocks")]
    pub blocks: Vec<BlockConfig>,

    /// Per-defy rules
    #[serde(default)]
    pub defy: DefyConfig,
}

fn default_course_name() -> String {
    "default".to_string()
}

const fn default_module_weight() -> u32 {
    6
}

const fn default_wins_required() -> u32 {
    3
}

const fn default_max_challenges() -> u32 {
    5
}

fn default_blocks() -> Vec<BlockConfig> {
    vec![BlockConfig::new("block-1")]
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self {
            name: default_course_name(),
            module_weight: default_module_weight(),
            wins_required: default_wins_required(),
            max_challenges: default_max_challenges(),
            blocks: default_blocks(),
            defy: DefyConfig::default(),
        }
    }
}

impl CourseConfig {
    pub fn block(&self, block_id: &str) -> Option<&BlockConfig> {
        self.blocks.iter().find(|b| b.title == block_id)
    }

    pub fn block_ids(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|b| b.title.as_str())
    }
}

/// One content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BlockConfig {
    /// Block title, used as the block id
    pub title: String,

    /// Weight of the block inside the module
    #[serde(default = "default_block_weight")]
    pub weight: u32,

    /// Opening date (`YYYY-MM-DD hh:mm`, UTC)
    #[serde(default)]
    pub start_date: Option<String>,

    /// Deadline (`YYYY-MM-DD hh:mm`, UTC)
    #[serde(default)]
    pub close_date: Option<String>,

    /// Question content, opaque to the engine
    #[serde(default)]
    pub question_cast: Option<String>,
}

const fn default_block_weight() -> u32 {
    1
}

impl BlockConfig {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            weight: default_block_weight(),
            start_date: None,
            close_date: None,
            question_cast: None,
        }
    }

    pub fn start(&self) -> Result<Option<DateTime<Utc>>, String> {
        parse_block_date(self.start_date.as_deref())
    }

    pub fn close(&self) -> Result<Option<DateTime<Utc>>, String> {
        parse_block_date(self.close_date.as_deref())
    }
}

fn parse_block_date(value: Option<&str>) -> Result<Option<DateTime<Utc>>, String> {
    value
        .map(|s| {
            NaiveDateTime::parse_from_str(s.trim(), BLOCK_DATE_FORMAT)
                .map(|naive| naive.and_utc())
                .map_err(|e| format!("invalid block date '{s}': {e}"))
        })
        .transpose()
}

/// Rules for a single defy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DefyConfig {
    /// Rounds in each defy
    #[serde(default = "default_rounds")]
    pub rounds: u32,

    /// Hours an invitation stays open (advisory)
    #[serde(default = "default_accept_window_hours")]
    pub accept_window_hours: u32,

    /// Minutes to answer each round (advisory)
    #[serde(default = "default_round_time_minutes")]
    pub round_time_minutes: u32,
}

const fn default_rounds() -> u32 {
    3
}

const fn default_accept_window_hours() -> u32 {
    24
}

const fn default_round_time_minutes() -> u32 {
    5
}

impl Default for DefyConfig {
    fn default() -> Self {
        Self {
            rounds: default_rounds(),
            accept_window_hours: default_accept_window_hours(),
            round_time_minutes: default_round_time_minutes(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".defier/defier.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        if self.path.starts_with("sqlite:") {
            self.path.clone()
        } else {
            format!("sqlite:{}", self.path)
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stdout only when unset)
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Retry policy for read-modify-write cycles that lose a race
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    8
}

const fn default_initial_backoff_ms() -> u64 {
    5
}

const fn default_max_backoff_ms() -> u64 {
    250
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_dates() {
        let mut block = BlockConfig::new("b");
        assert_eq!(block.start().unwrap(), None);

        block.start_date = Some("1997-07-16 19:20".to_string());
        let start = block.start().unwrap().unwrap();
        assert_eq!(start.to_rfc3339(), "1997-07-16T19:20:00+00:00");

        block.close_date = Some("tomorrow".to_string());
        assert!(block.close().is_err());
    }

    #[test]
    fn test_database_url() {
        let mut db = DatabaseConfig::default();
        assert_eq!(db.url(), "sqlite:.defier/defier.db");
        db.path = "sqlite::memory:".to_string();
        assert_eq!(db.url(), "sqlite::memory:");
    }

    #[test]
    fn test_course_lookup() {
        let course = CourseConfig::default();
        assert!(course.block("block-1").is_some());
        assert!(course.block("missing").is_none());
        assert_eq!(course.block_ids().collect::<Vec<_>>(), vec!["block-1"]);
    }
}
