use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reviewbot_core::{ConfigError, SuggestionLimits};
use reviewbot_queue::QueueConfig;
use serde::{Deserialize, Serialize};

pub const LLM_PROVIDERS: &[&str] = &["openai", "gemini", "ollama", "openrouter"];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    pub features: FeatureFlags,
    pub review_queue: QueueSettings,
    pub suggestion_queue: QueueSettings,
    pub suggestion_limits: SuggestionLimitSettings,
    pub llm: LlmSettings,
    pub storage: StorageSettings,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeatureFlags {
    pub merge_request_review: bool,
    pub push_review: bool,
    pub refactor_suggestion: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueSettings {
    pub max_requests_per_minute: u32,
    pub worker_concurrency: usize,
    pub max_pending_jobs: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SuggestionLimitSettings {
    pub max_files: usize,
    pub max_file_chars: usize,
    pub max_total_chars: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: String,
    pub model: String,
    /// Replaces the built-in review instruction when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_system_prompt: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageSettings {
    pub review_cache_db_path: String,
    pub refactor_suggestion_state_db_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            features: FeatureFlags::default(),
            review_queue: QueueSettings::review_default(),
            suggestion_queue: QueueSettings::suggestion_default(),
            suggestion_limits: SuggestionLimitSettings::default(),
            llm: LlmSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            merge_request_review: true,
            push_review: true,
            refactor_suggestion: true,
        }
    }
}

impl QueueSettings {
    pub fn review_default() -> Self {
        Self { max_requests_per_minute: 2, worker_concurrency: 1, max_pending_jobs: 100 }
    }

    pub fn suggestion_default() -> Self {
        Self { max_requests_per_minute: 1, worker_concurrency: 1, max_pending_jobs: 50 }
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::new(self.max_requests_per_minute, self.worker_concurrency)
            .with_soft_pending_limit(self.max_pending_jobs)
    }
}

impl Default for SuggestionLimitSettings {
    fn default() -> Self {
        let limits = SuggestionLimits::default();
        Self {
            max_files: limits.max_files,
            max_file_chars: limits.max_file_chars,
            max_total_chars: limits.max_total_chars,
        }
    }
}

impl SuggestionLimitSettings {
    pub fn limits(&self) -> SuggestionLimits {
        SuggestionLimits {
            max_files: self.max_files,
            max_file_chars: self.max_file_chars,
            max_total_chars: self.max_total_chars,
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-5-mini".to_string(),
            review_system_prompt: None,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            review_cache_db_path: "data/review_cache.db".to_string(),
            refactor_suggestion_state_db_path: "data/refactor_suggestion_state.db".to_string(),
        }
    }
}

impl StorageSettings {
    pub fn review_cache_path(&self) -> PathBuf {
        expand_path(&self.review_cache_db_path)
    }

    pub fn claim_state_path(&self) -> PathBuf {
        expand_path(&self.refactor_suggestion_state_db_path)
    }
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).to_string())
}

// Queue sections default per section, so a partial table is merged field by field.
#[derive(Deserialize, Default)]
#[serde(default)]
struct QueueSettingsPatch {
    max_requests_per_minute: Option<u32>,
    worker_concurrency: Option<usize>,
    max_pending_jobs: Option<usize>,
}

impl QueueSettingsPatch {
    fn over(self, base: QueueSettings) -> QueueSettings {
        QueueSettings {
            max_requests_per_minute: self
                .max_requests_per_minute
                .unwrap_or(base.max_requests_per_minute),
            worker_concurrency: self.worker_concurrency.unwrap_or(base.worker_concurrency),
            max_pending_jobs: self.max_pending_jobs.unwrap_or(base.max_pending_jobs),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SettingsFile {
    log_level: Option<String>,
    features: FeatureFlags,
    review_queue: Option<QueueSettingsPatch>,
    suggestion_queue: Option<QueueSettingsPatch>,
    suggestion_limits: SuggestionLimitSettings,
    llm: LlmSettings,
    storage: StorageSettings,
}

impl Settings {
    /// Parse a settings file. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: SettingsFile = toml::from_str(s).context("parse settings toml")?;
        let defaults = Settings::default();
        Ok(Self {
            log_level: file.log_level.unwrap_or(defaults.log_level),
            features: file.features,
            review_queue: file.review_queue.unwrap_or_default().over(defaults.review_queue),
            suggestion_queue: file
                .suggestion_queue
                .unwrap_or_default()
                .over(defaults.suggestion_queue),
            suggestion_limits: file.suggestion_limits,
            llm: file.llm,
            storage: file.storage,
        })
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_toml_str(&s).with_context(|| format!("load {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
        }
        let s = toml::to_string_pretty(self).context("serialize settings")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// File (when present) -> environment overrides -> validation.
    pub fn load<F>(path: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match path {
            Some(p) if p.exists() => Self::load_from(p)?,
            _ => Self::default(),
        };
        settings.apply_env(env)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Same as `load`, reading the process environment.
    pub fn load_with_process_env(path: Option<&Path>) -> Result<Self> {
        Self::load(path, |name| std::env::var(name).ok())
    }

    /// Override fields from environment variables. Blank values count as unset.
    pub fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| env(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = get("ENABLE_MERGE_REQUEST_REVIEW") {
            self.features.merge_request_review = parse_bool(&v);
        }
        if let Some(v) = get("ENABLE_PUSH_REVIEW") {
            self.features.push_review = parse_bool(&v);
        }
        if let Some(v) = get("ENABLE_REFACTOR_SUGGESTION_REVIEW") {
            self.features.refactor_suggestion = parse_bool(&v);
        }

        if let Some(v) = get("REVIEW_MAX_REQUESTS_PER_MINUTE") {
            self.review_queue.max_requests_per_minute =
                parse_rate("REVIEW_MAX_REQUESTS_PER_MINUTE", &v)?;
        }
        if let Some(v) = get("REVIEW_WORKER_CONCURRENCY") {
            self.review_queue.worker_concurrency = parse_workers("REVIEW_WORKER_CONCURRENCY", &v)?;
        }
        if let Some(v) = get("REVIEW_MAX_PENDING_JOBS") {
            self.review_queue.max_pending_jobs = parse_positive("REVIEW_MAX_PENDING_JOBS", &v)?;
        }

        if let Some(v) = get("REFACTOR_SUGGESTION_MAX_REQUESTS_PER_MINUTE") {
            self.suggestion_queue.max_requests_per_minute =
                parse_rate("REFACTOR_SUGGESTION_MAX_REQUESTS_PER_MINUTE", &v)?;
        }
        if let Some(v) = get("REFACTOR_SUGGESTION_WORKER_CONCURRENCY") {
            self.suggestion_queue.worker_concurrency =
                parse_workers("REFACTOR_SUGGESTION_WORKER_CONCURRENCY", &v)?;
        }
        if let Some(v) = get("REFACTOR_SUGGESTION_MAX_PENDING_JOBS") {
            self.suggestion_queue.max_pending_jobs =
                parse_positive("REFACTOR_SUGGESTION_MAX_PENDING_JOBS", &v)?;
        }

        if let Some(v) = get("REFACTOR_SUGGESTION_MAX_FILES") {
            self.suggestion_limits.max_files = parse_positive("REFACTOR_SUGGESTION_MAX_FILES", &v)?;
        }
        if let Some(v) = get("REFACTOR_SUGGESTION_MAX_FILE_CHARS") {
            self.suggestion_limits.max_file_chars =
                parse_positive("REFACTOR_SUGGESTION_MAX_FILE_CHARS", &v)?;
        }
        if let Some(v) = get("REFACTOR_SUGGESTION_MAX_TOTAL_CHARS") {
            self.suggestion_limits.max_total_chars =
                parse_positive("REFACTOR_SUGGESTION_MAX_TOTAL_CHARS", &v)?;
        }

        if let Some(v) = get("LLM_PROVIDER") {
            self.llm.provider = v.to_lowercase();
        }
        if let Some(v) = get("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("REVIEW_SYSTEM_PROMPT") {
            self.llm.review_system_prompt = Some(v);
        }
        if let Some(v) = get("REVIEW_CACHE_DB_PATH") {
            self.storage.review_cache_db_path = v;
        }
        if let Some(v) = get("REFACTOR_SUGGESTION_STATE_DB_PATH") {
            self.storage.refactor_suggestion_state_db_path = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for q in [&self.review_queue, &self.suggestion_queue] {
            if q.max_requests_per_minute == 0 {
                return Err(ConfigError::NonPositiveRate(0));
            }
            if q.worker_concurrency == 0 {
                return Err(ConfigError::NonPositiveWorkers(0));
            }
        }
        let positive = [
            ("review_queue.max_pending_jobs", self.review_queue.max_pending_jobs),
            ("suggestion_queue.max_pending_jobs", self.suggestion_queue.max_pending_jobs),
            ("suggestion_limits.max_files", self.suggestion_limits.max_files),
            ("suggestion_limits.max_file_chars", self.suggestion_limits.max_file_chars),
            ("suggestion_limits.max_total_chars", self.suggestion_limits.max_total_chars),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::invalid(name, "must be positive"));
            }
        }
        if !LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(ConfigError::invalid(
                "llm.provider",
                format!("'{}' is not one of {}", self.llm.provider, LLM_PROVIDERS.join(", ")),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Missing("llm.model".to_string()));
        }
        if self.storage.review_cache_db_path.trim().is_empty() {
            return Err(ConfigError::Missing("storage.review_cache_db_path".to_string()));
        }
        if self.storage.refactor_suggestion_state_db_path.trim().is_empty() {
            return Err(ConfigError::Missing(
                "storage.refactor_suggestion_state_db_path".to_string(),
            ));
        }
        let f = &self.features;
        if !(f.merge_request_review || f.push_review || f.refactor_suggestion) {
            return Err(ConfigError::invalid("features", "at least one feature must be enabled"));
        }
        Ok(())
    }

    /// `tracing` directive for `log_level`, or `None` when the name is unknown.
    pub fn log_directive(&self) -> Option<&'static str> {
        match self.log_level.trim().to_ascii_lowercase().as_str() {
            "trace" => Some("trace"),
            "debug" => Some("debug"),
            "info" => Some("info"),
            "warn" | "warning" => Some("warn"),
            "error" | "critical" => Some("error"),
            _ => None,
        }
    }

    pub fn config_path(root: &Path) -> PathBuf {
        root.join("reviewbot.toml")
    }
}

/// `1/true/yes/on` (any case) enable; every other value disables.
fn parse_bool(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_int(name: &str, v: &str) -> Result<i64, ConfigError> {
    v.parse::<i64>()
        .map_err(|_| ConfigError::invalid(name, format!("'{}' is not an integer", v)))
}

fn parse_rate(name: &str, v: &str) -> Result<u32, ConfigError> {
    let n = parse_int(name, v)?;
    if n <= 0 {
        return Err(ConfigError::NonPositiveRate(n));
    }
    u32::try_from(n).map_err(|_| ConfigError::invalid(name, "too large"))
}

fn parse_workers(name: &str, v: &str) -> Result<usize, ConfigError> {
    let n = parse_int(name, v)?;
    if n <= 0 {
        return Err(ConfigError::NonPositiveWorkers(n));
    }
    usize::try_from(n).map_err(|_| ConfigError::invalid(name, "too large"))
}

fn parse_positive(name: &str, v: &str) -> Result<usize, ConfigError> {
    let n = parse_int(name, v)?;
    if n <= 0 {
        return Err(ConfigError::invalid(name, "must be positive"));
    }
    usize::try_from(n).map_err(|_| ConfigError::invalid(name, "too large"))
}
