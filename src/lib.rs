// Library exports for integration testing

pub mod ats_scorer;
pub mod bullet_enhancer;
pub mod bullet_selector;
pub mod comparator;
pub mod config;
pub mod database;
pub mod errors;
pub mod fit_scorer;
pub mod keyword_extractor;
pub mod matcher;
pub mod models;
pub mod ollama;
pub mod orchestrator;
pub mod parser;
pub mod template_engine;
pub mod utils;

use config::ConfigManager;
use database::Database;
use orchestrator::Orchestrator;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared state handed to whatever front end drives the pipeline. The
/// orchestrator is its own internally-synchronized unit (task map behind an
/// `RwLock`), so it is shared directly rather than behind an extra mutex; the
/// database and config manager keep the teacher's single-mutex-per-resource
/// convention.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub config: Arc<Mutex<ConfigManager>>,
    pub orchestrator: Arc<Orchestrator>,
}
