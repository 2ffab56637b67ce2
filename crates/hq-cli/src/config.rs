//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Duration;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use hq_core::{ActivityPolicy, IntervalRules, ManagerConfig};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Shortest fact the store accepts, in minutes.
    pub min_fact_minutes: u32,
    /// Reject facts naming activities that do not exist yet.
    pub require_existing_activities: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("min_fact_minutes", &self.min_fact_minutes)
            .field(
                "require_existing_activities",
                &self.require_existing_activities,
            )
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("hq.db"),
            min_fact_minutes: 0,
            require_existing_activities: false,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // HQ_DATABASE_PATH, HQ_MIN_FACT_MINUTES, ...
        figment = figment.merge(Env::prefixed("HQ_"));

        figment.extract()
    }

    /// Interval validation for the fact store.
    pub fn interval_rules(&self) -> IntervalRules {
        IntervalRules::new(Duration::minutes(i64::from(self.min_fact_minutes)))
    }

    /// Lifecycle settings for the fact manager.
    pub const fn manager_config(&self) -> ManagerConfig {
        let activity_policy = if self.require_existing_activities {
            ActivityPolicy::RequireExisting
        } else {
            ActivityPolicy::CreateInline
        };
        ManagerConfig { activity_policy }
    }
}

/// Returns the platform-specific config directory for hq.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hq"))
}

/// Returns the platform-specific data directory for hq.
///
/// On Linux: `~/.local/share/hq`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("hq"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_hq() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "hq");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("hq.db"));
        assert_eq!(config.min_fact_minutes, 0);
        assert!(!config.require_existing_activities);
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"database_path = "/tmp/elsewhere.db"
min_fact_minutes = 1
require_existing_activities = true
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/elsewhere.db"));
        assert_eq!(config.interval_rules().min_duration, Duration::minutes(1));
        assert_eq!(
            config.manager_config().activity_policy,
            ActivityPolicy::RequireExisting
        );
    }

    #[test]
    fn test_default_policy_creates_inline() {
        let config = Config::default();
        assert_eq!(
            config.manager_config().activity_policy,
            ActivityPolicy::CreateInline
        );
        assert_eq!(config.interval_rules(), IntervalRules::default());
    }
}
