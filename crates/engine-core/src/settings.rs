use crate::error::SettingsError;
use model::migration::selection::{ConflictStrategy, ErrorPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MIN_BATCH_SIZE: usize = 100;
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Recognized run options. Every field has a default, so a run can start
/// from an empty document; unknown keys are rejected to catch typos early.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RunSettings {
    /// Bound on translate→deploy retries per object.
    pub max_repair_attempts: usize,
    /// Bound on cycles of the dependency queue.
    pub max_dependency_cycles: usize,
    /// Rows per bulk insert.
    pub batch_size: usize,
    /// Applied globally during deployment; `None` triggers the interactive
    /// prompt on OBJECT_EXISTS.
    pub conflict_strategy: Option<ConflictStrategy>,
    /// Whether the repair controller may invoke the LLM translator.
    pub use_llm_repair: bool,
    /// Whether the root-cause analyzer may call the search provider.
    pub use_web_search: bool,
    /// Bound on user-prompt waits, in seconds.
    pub resolution_timeout_secs: u64,
    /// Per-call bound on LLM requests, in seconds.
    pub llm_timeout_secs: u64,
    /// Schema used when an object name is unqualified.
    pub default_schema: String,
    /// Truncate target tables before copying rows.
    pub truncate_before_copy: bool,
    pub error_policy: ErrorPolicy,
    /// Parallel objects of the same kind; 1 keeps runs deterministic.
    pub parallelism: usize,
    /// Where run artifacts and the shared memory file live.
    pub output_dir: String,
    pub shared_memory_path: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        RunSettings {
            max_repair_attempts: 3,
            max_dependency_cycles: 3,
            batch_size: 1000,
            conflict_strategy: None,
            use_llm_repair: true,
            use_web_search: true,
            resolution_timeout_secs: 30,
            llm_timeout_secs: 120,
            default_schema: "dbo".to_string(),
            truncate_before_copy: false,
            error_policy: ErrorPolicy::Continue,
            parallelism: 1,
            output_dir: "output".to_string(),
            shared_memory_path: "output/shared_memory.json".to_string(),
        }
    }
}

impl RunSettings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: RunSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(SettingsError::Invalid {
                name: "batch_size".into(),
                reason: format!(
                    "{} is outside {MIN_BATCH_SIZE}..={MAX_BATCH_SIZE}",
                    self.batch_size
                ),
            });
        }
        if self.max_repair_attempts == 0 {
            return Err(SettingsError::Invalid {
                name: "max_repair_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.parallelism == 0 || self.parallelism > 4 {
            return Err(SettingsError::Invalid {
                name: "parallelism".into(),
                reason: format!("{} is outside 1..=4", self.parallelism),
            });
        }
        Ok(())
    }

    pub fn resolution_timeout(&self) -> Duration {
        Duration::from_secs(self.resolution_timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_recognized_options() {
        let settings = RunSettings::default();
        assert_eq!(settings.max_repair_attempts, 3);
        assert_eq!(settings.max_dependency_cycles, 3);
        assert_eq!(settings.batch_size, 1000);
        assert_eq!(settings.default_schema, "dbo");
        assert!(settings.use_llm_repair);
        assert!(settings.use_web_search);
        assert_eq!(settings.resolution_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn batch_size_out_of_range_is_rejected() {
        let json = r#"{"batch_size": 50}"#;
        assert!(RunSettings::from_json(json).is_err());
        let json = r#"{"batch_size": 20000}"#;
        assert!(RunSettings::from_json(json).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(RunSettings::from_json(r#"{"bacth_size": 1000}"#).is_err());
    }

    #[test]
    fn conflict_strategy_parses_from_screaming_case() {
        let settings =
            RunSettings::from_json(r#"{"conflict_strategy": "CREATE_OR_ALTER"}"#).unwrap();
        assert_eq!(
            settings.conflict_strategy,
            Some(ConflictStrategy::CreateOrAlter)
        );
    }
}
