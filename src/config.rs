//! Configuration loading and management
//!
//! Handles parsing of `.journey.toml` configuration files.

use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::events::EventDestination;
use crate::projection::MilestoneMatch;

pub const CONFIG_FILE_NAME: &str = ".journey.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Journey document location
    #[serde(default)]
    pub store: StoreConfig,

    /// View projection settings
    #[serde(default)]
    pub projection: ProjectionConfig,

    /// Calendar bucketing settings
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// Event output settings
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the journey document, relative to the config directory
    #[serde(default = "default_store_path")]
    pub path: String,

    /// How long to wait for the document lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_store_path() -> String {
    "journey.json".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    crate::lock::DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Include tasks without a milestone id whose title shares the
    /// milestone title's first word
    #[serde(default = "default_true")]
    pub milestone_keyword_fallback: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            milestone_keyword_fallback: true,
        }
    }
}

impl ProjectionConfig {
    pub fn milestone_match(&self) -> MilestoneMatch {
        MilestoneMatch::from_flag(self.milestone_keyword_fallback)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Fixed UTC offset for day boundaries, e.g. "+02:00"
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
        }
    }
}

impl CalendarConfig {
    pub fn offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.utc_offset).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "calendar.utc_offset: invalid offset '{}' (expected +HH:MM, -HH:MM or Z)",
                self.utc_offset
            ))
        })
    }
}

/// Parse `Z`, `+HH:MM`, `-HH:MM` or `+HHMM`.
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match raw.chars().next()? {
        '+' => (1, &raw[1..]),
        '-' => (-1, &raw[1..]),
        _ => return None,
    };
    if !rest.is_ascii() {
        return None;
    }
    let (hours, minutes) = match rest.split_once(':') {
        Some(parts) => parts,
        None if rest.len() == 4 => rest.split_at(2),
        None => return None,
    };
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hours) || !two_digits(minutes) {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventsConfig {
    /// "-" for stdout, otherwise a file path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

impl EventsConfig {
    pub fn destination(&self) -> Option<EventDestination> {
        EventDestination::parse(self.destination.as_deref())
    }
}

impl Config {
    /// Load configuration from a `.journey.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `dir`, or return defaults when absent.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Journey document path, resolved against `dir`.
    pub fn store_path(&self, dir: &Path) -> PathBuf {
        let path = Path::new(self.store.path.trim());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            dir.join(path)
        }
    }

    fn validate(&self) -> Result<()> {
        if self.store.path.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "store.path cannot be empty".to_string(),
            ));
        }
        if self.store.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "store.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        self.calendar.offset()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.store.path, "journey.json");
        assert_eq!(cfg.store.lock_timeout_ms, crate::lock::DEFAULT_LOCK_TIMEOUT_MS);
        assert!(cfg.projection.milestone_keyword_fallback);
        assert_eq!(cfg.projection.milestone_match(), MilestoneMatch::KeywordFallback);
        assert_eq!(cfg.calendar.utc_offset, "+00:00");
        assert_eq!(cfg.events.destination(), None);
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        let content = r#"
[store]
path = "data/me.json"
lock_timeout_ms = 250

[projection]
milestone_keyword_fallback = false

[calendar]
utc_offset = "-05:00"

[events]
destination = "-"
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.store_path(dir.path()), dir.path().join("data/me.json"));
        assert_eq!(cfg.store.lock_timeout_ms, 250);
        assert_eq!(cfg.projection.milestone_match(), MilestoneMatch::Strict);
        assert_eq!(
            cfg.calendar.offset().expect("offset").local_minus_utc(),
            -5 * 3600
        );
        assert_eq!(cfg.events.destination(), Some(EventDestination::Stdout));
    }

    #[test]
    fn invalid_offset_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[calendar]\nutc_offset = \"CET\"").expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_store_path_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[store]\npath = \"  \"").expect("write config");

        assert!(matches!(Config::load(&path), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn offsets_parse() {
        assert_eq!(parse_utc_offset("Z").map(|o| o.local_minus_utc()), Some(0));
        assert_eq!(parse_utc_offset("+0530").map(|o| o.local_minus_utc()), Some(19800));
        assert_eq!(parse_utc_offset("-01:30").map(|o| o.local_minus_utc()), Some(-5400));
        assert_eq!(parse_utc_offset("+24:00"), None);
        assert_eq!(parse_utc_offset("05:00"), None);
        assert_eq!(parse_utc_offset(""), None);
        assert_eq!(parse_utc_offset("+1é2"), None);
        assert_eq!(parse_utc_offset("+é:00"), None);
        assert_eq!(parse_utc_offset("+-1:00"), None);
    }

    #[test]
    fn load_from_dir_defaults_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from_dir(dir.path()).expect("defaults");
        assert_eq!(cfg.store.path, "journey.json");
    }

    #[test]
    fn save_writes_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.toml");
        Config::default().save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("path = \"journey.json\""));
        let reloaded = Config::load(&path).expect("reload");
        assert!(reloaded.projection.milestone_keyword_fallback);
    }
}
