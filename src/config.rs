use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub health_check_timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            timeout_seconds: 60,
            health_check_timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    pub binary: String,
    pub timeout_seconds: u64,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            binary: "pdflatex".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub ttl_seconds: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self { ttl_seconds: 3600 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulletSelectionConfig {
    pub target_bullets: usize,
    pub min_bullets_per_job: usize,
    pub max_bullets_per_job: usize,
}

impl Default for BulletSelectionConfig {
    fn default() -> Self {
        Self {
            target_bullets: 18,
            min_bullets_per_job: 2,
            max_bullets_per_job: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    pub fuzzy_threshold: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { fuzzy_threshold: 0.85 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancerConfig {
    pub confidence_threshold: f64,
    pub max_bullets_to_enhance: usize,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            max_bullets_to_enhance: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub llm: LlmConfig,
    pub compiler: CompilerConfig,
    pub task: TaskConfig,
    pub bullet_selection: BulletSelectionConfig,
    pub matcher: MatcherConfig,
    pub enhancer: EnhancerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
    config: AppConfig,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        let config = Self::load_or_create_default_config(&config_path)?;
        Ok(ConfigManager { config_path, config })
    }

    pub fn new_with_path(config_path: PathBuf) -> Result<Self> {
        let config = Self::load_or_create_default_config(&config_path)?;
        Ok(ConfigManager { config_path, config })
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .context("Could not determine config directory")?;

        let app_config_dir = config_dir.join("tailoring-pipeline");

        if !app_config_dir.exists() {
            fs::create_dir_all(&app_config_dir).context("Failed to create config directory")?;
            info!("Created config directory: {:?}", app_config_dir);
        }

        Ok(app_config_dir.join("config.json"))
    }

    fn load_or_create_default_config(config_path: &PathBuf) -> Result<AppConfig> {
        if config_path.exists() {
            info!("Loading configuration from: {:?}", config_path);
            Self::load_config(config_path)
        } else {
            info!("Creating default configuration at: {:?}", config_path);
            let config = Self::default_config();
            Self::save_config_to_path(&config, config_path)?;
            Ok(config)
        }
    }

    fn load_config(config_path: &PathBuf) -> Result<AppConfig> {
        let config_str = fs::read_to_string(config_path).context("Failed to read config file")?;
        let config: AppConfig =
            serde_json::from_str(&config_str).context("Failed to parse config file")?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    fn save_config_to_path(config: &AppConfig, config_path: &PathBuf) -> Result<()> {
        let config_str =
            serde_json::to_string_pretty(config).context("Failed to serialize config")?;
        fs::write(config_path, config_str).context("Failed to write config file")?;
        info!("Configuration saved to: {:?}", config_path);
        Ok(())
    }

    fn default_config() -> AppConfig {
        let default_db_path = if let Some(home_dir) = dirs::home_dir() {
            home_dir.join(".tailoring-pipeline").join("pipeline.db")
        } else {
            PathBuf::from("./data/pipeline.db")
        };
        let database_url = format!("sqlite:{}", default_db_path.to_string_lossy());

        AppConfig {
            database_url,
            llm: LlmConfig::default(),
            compiler: CompilerConfig::default(),
            task: TaskConfig::default(),
            bullet_selection: BulletSelectionConfig::default(),
            matcher: MatcherConfig::default(),
            enhancer: EnhancerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    pub fn database_url(&self) -> &str {
        &self.config.database_url
    }

    pub fn llm(&self) -> &LlmConfig {
        &self.config.llm
    }

    pub fn compiler(&self) -> &CompilerConfig {
        &self.config.compiler
    }

    pub fn bullet_selection(&self) -> &BulletSelectionConfig {
        &self.config.bullet_selection
    }

    pub fn matcher(&self) -> &MatcherConfig {
        &self.config.matcher
    }

    pub fn enhancer(&self) -> &EnhancerConfig {
        &self.config.enhancer
    }

    pub fn task(&self) -> &TaskConfig {
        &self.config.task
    }

    pub fn save_config(&self) -> Result<()> {
        Self::save_config_to_path(&self.config, &self.config_path)
    }

    /// Validate configuration, returning human-readable warnings (never hard errors —
    /// an invalid value is clamped by the caller, not fatal to startup).
    pub fn validate_config(&self) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        if self.config.database_url.is_empty() {
            warnings.push("Database URL cannot be empty".to_string());
        }

        if self.config.llm.model.is_empty() {
            warnings.push("LLM model must be specified".to_string());
        }

        if self.config.bullet_selection.max_bullets_per_job == 0 {
            warnings.push("max_bullets_per_job must be at least 1".to_string());
        }

        if self.config.bullet_selection.min_bullets_per_job
            > self.config.bullet_selection.max_bullets_per_job
        {
            warnings.push("min_bullets_per_job cannot exceed max_bullets_per_job".to_string());
        }

        if !(0.0..=1.0).contains(&self.config.matcher.fuzzy_threshold) {
            warnings.push("fuzzy_threshold must be between 0.0 and 1.0".to_string());
        }

        if !(0.0..=1.0).contains(&self.config.enhancer.confidence_threshold) {
            warnings.push("enhancer confidence_threshold must be between 0.0 and 1.0".to_string());
        }

        for warning in &warnings {
            warn!("Configuration warning: {}", warning);
        }

        Ok(warnings)
    }

    pub fn reset_to_default(&mut self) -> Result<()> {
        self.config = Self::default_config();
        self.save_config()
    }

    /// Environment variable overrides, applied once after load.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(db_url) = std::env::var("TAILOR_DATABASE_URL") {
            self.config.database_url = db_url;
            info!("Database URL overridden from environment");
        }

        if let Ok(base_url) = std::env::var("TAILOR_LLM_BASE_URL") {
            self.config.llm.base_url = base_url;
            info!("LLM base URL overridden from environment");
        }

        if let Ok(model) = std::env::var("TAILOR_LLM_MODEL") {
            self.config.llm.model = model;
            info!("LLM model overridden from environment");
        }

        if let Ok(log_level) = std::env::var("TAILOR_LOG_LEVEL") {
            self.config.logging.level = log_level;
            info!("Log level overridden from environment");
        }

        Ok(())
    }

    pub fn export_config(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.config).context("Failed to export configuration")
    }

    pub fn config_exists(&self) -> bool {
        self.config_path.exists()
    }

    pub fn get_config_file_path(&self) -> &PathBuf {
        &self.config_path
    }
}

/// Partial update for LLM settings, merged field-by-field.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfigUpdate {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl ConfigManager {
    pub fn partial_update_llm(&mut self, update: LlmConfigUpdate) -> Result<()> {
        if let Some(base_url) = update.base_url {
            self.config.llm.base_url = base_url;
        }
        if let Some(model) = update.model {
            self.config.llm.model = model;
        }
        if let Some(timeout) = update.timeout_seconds {
            self.config.llm.timeout_seconds = timeout;
        }
        self.save_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_creation() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let config_manager = ConfigManager::new_with_path(config_path.clone()).unwrap();

        assert!(config_path.exists());
        assert_eq!(config_manager.llm().timeout_seconds, 60);
    }

    #[test]
    fn test_config_validation() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let mut config_manager = ConfigManager::new_with_path(config_path).unwrap();

        let warnings = config_manager.validate_config().unwrap();
        assert!(warnings.is_empty());

        config_manager.config.bullet_selection.max_bullets_per_job = 0;
        config_manager.config.matcher.fuzzy_threshold = 2.0;

        let warnings = config_manager.validate_config().unwrap();
        assert!(warnings.len() >= 2);
    }

    #[test]
    fn test_partial_update() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let mut config_manager = ConfigManager::new_with_path(config_path).unwrap();

        let update = LlmConfigUpdate {
            base_url: Some("http://example.internal:11434".to_string()),
            model: Some("mistral".to_string()),
            timeout_seconds: None,
        };
        config_manager.partial_update_llm(update).unwrap();

        assert_eq!(config_manager.llm().base_url, "http://example.internal:11434");
        assert_eq!(config_manager.llm().model, "mistral");
        assert_eq!(config_manager.llm().timeout_seconds, 60);
    }
}
