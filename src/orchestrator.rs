use futures::Stream;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

use crate::ats_scorer::AtsScorer;
use crate::bullet_enhancer::BulletEnhancer;
use crate::bullet_selector::BulletSelector;
use crate::comparator::ResumeComparator;
use crate::config::AppConfig;
use crate::database::Database;
use crate::errors::{PipelineError, PipelineResult};
use crate::fit_scorer::FitScorer;
use crate::keyword_extractor::KeywordExtractor;
use crate::models::{EnhancementStats, GenerationRequest, NewAtsScore, NewVariant, ResumeComparison, TaskState, TaskStatus, Variant};
use crate::ollama::OllamaClient;
use crate::parser::ResumeParser;
use crate::template_engine::TemplateEngine;

struct TaskHandle {
    sender: watch::Sender<TaskState>,
}

/// Owns the task map and drives each generation end to end. Mirrors the
/// teacher's `AppState`-held `Arc<Mutex<...>>` pattern, but keyed per task and
/// backed by a watch channel so progress can be observed without polling the
/// orchestrator itself.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<AppConfig>,
    ollama: OllamaClient,
    db: Arc<tokio::sync::Mutex<Database>>,
    tasks: Arc<RwLock<HashMap<String, TaskHandle>>>,
    variants: Arc<RwLock<HashMap<String, Variant>>>,
}

impl Orchestrator {
    pub fn new(config: Arc<AppConfig>, db: Arc<tokio::sync::Mutex<Database>>) -> PipelineResult<Self> {
        let ollama = OllamaClient::new(&config.llm)?;
        Ok(Self {
            config,
            ollama,
            db,
            tasks: Arc::new(RwLock::new(HashMap::new())),
            variants: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Looks up the variant produced by a completed task, once its id is
    /// visible on the task's `TaskState`. The orchestrator keeps completed
    /// variants in memory only; long-term storage is the caller's job.
    pub async fn get_variant(&self, variant_id: &str) -> Option<Variant> {
        self.variants.read().await.get(variant_id).cloned()
    }

    /// Registers a new task and spawns the pipeline as its own `tokio` unit.
    /// Returns the task id immediately; progress is observed via `subscribe`.
    pub async fn submit(&self, request: GenerationRequest) -> String {
        let task_id = uuid::Uuid::new_v4().to_string();
        let (sender, _receiver) = watch::channel(TaskState::new(task_id.clone()));

        self.tasks.write().await.insert(task_id.clone(), TaskHandle { sender });

        let this = self.clone();
        let id_for_task = task_id.clone();
        tokio::spawn(async move {
            this.run(id_for_task, request).await;
        });

        task_id
    }

    pub async fn status(&self, task_id: &str) -> Option<TaskState> {
        let tasks = self.tasks.read().await;
        tasks.get(task_id).map(|h| h.sender.borrow().clone())
    }

    /// Delta stream at a floor frequency of 2 Hz: each step waits for either a
    /// real change or the floor interval, whichever comes first, and yields a
    /// snapshot. Closes right after the first terminal snapshot is yielded.
    pub async fn subscribe(&self, task_id: &str) -> Option<impl Stream<Item = TaskState>> {
        let tasks = self.tasks.read().await;
        let receiver = tasks.get(task_id)?.sender.subscribe();

        Some(futures::stream::unfold((receiver, false), |(mut receiver, done)| async move {
            if done {
                return None;
            }

            let snapshot = receiver.borrow().clone();
            if snapshot.status.is_terminal() {
                return Some((snapshot, (receiver, true)));
            }

            tokio::select! {
                changed = receiver.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(500)) => {}
            }

            let state = receiver.borrow().clone();
            let is_terminal = state.status.is_terminal();
            Some((state, (receiver, is_terminal)))
        }))
    }

    fn checkpoint(&self, sender: &watch::Sender<TaskState>, percent: u8, message: &str) {
        sender.send_modify(|state| {
            state.status = TaskStatus::Running;
            state.percent = percent;
            state.message = message.to_string();
            state.updated_at = chrono::Utc::now();
        });
    }

    async fn run(&self, task_id: String, request: GenerationRequest) {
        let Some(handle) = self.tasks.read().await.get(&task_id).map(|h| h.sender.clone()) else {
            return;
        };

        info!("task {}: starting generation for '{}'", task_id, request.job_title);
        self.checkpoint(&handle, 0, "starting generation");

        match self.execute(&handle, &request).await {
            Ok(variant) => {
                handle.send_modify(|state| {
                    state.status = TaskStatus::Completed;
                    state.percent = 100;
                    state.message = "done".to_string();
                    state.variant_id = Some(variant.id.clone());
                    state.updated_at = chrono::Utc::now();
                });
                info!("task {}: completed, variant {}", task_id, variant.id);
                self.variants.write().await.insert(variant.id.clone(), variant);
            }
            Err(err) => {
                err.log(&format!("task {task_id}"));
                handle.send_modify(|state| {
                    state.status = TaskStatus::Failed;
                    state.error = Some(err.to_string());
                    state.updated_at = chrono::Utc::now();
                });
            }
        }
    }

    async fn execute(&self, progress: &watch::Sender<TaskState>, request: &GenerationRequest) -> PipelineResult<Variant> {
        let resume = ResumeParser::parse(&request.resume_source)?;
        self.checkpoint(progress, 10, "parsing résumé");

        let keywords = KeywordExtractor::extract_keywords(&request.job_description, 30);
        self.checkpoint(progress, 20, "extracting job keywords");

        let mut selection_config = self.config.bullet_selection.clone();
        selection_config.target_bullets = request.target_bullets;
        let selector = BulletSelector::new(selection_config);
        let mut experience_sections = selector.select_bullets(&resume, &keywords);
        self.checkpoint(progress, 40, "selecting relevant bullets");

        let missing_keywords: Vec<String> = keywords.iter().map(|k| k.text.clone()).collect();

        let mut enhancement_stats = EnhancementStats { bullets_enhanced: 0, keywords_added: Vec::new() };

        if request.use_ai {
            let enhancer = BulletEnhancer::new(self.ollama.clone(), self.config.enhancer.confidence_threshold);

            for section in &mut experience_sections {
                let bullets: Vec<_> = section.selected_bullets.iter().map(|sb| sb.bullet.clone()).collect();
                let enhancements = enhancer
                    .enhance_bullets_batch(&bullets, &request.job_title, &missing_keywords, self.config.enhancer.max_bullets_to_enhance)
                    .await?;

                for enhancement in enhancements {
                    if let Some(selected) = section.selected_bullets.iter_mut().find(|sb| sb.bullet.text == enhancement.original_text) {
                        selected.enhanced_text = Some(enhancement.enhanced_text);
                        selected.was_enhanced = true;
                        enhancement_stats.bullets_enhanced += 1;
                        enhancement_stats.keywords_added.extend(enhancement.keywords_added);
                    }
                }
            }
            enhancement_stats.keywords_added.sort();
            enhancement_stats.keywords_added.dedup();
        } else {
            warn!("AI enhancement disabled for this request, using selected bullets verbatim");
        }

        let summary = self.generate_summary(&resume, &experience_sections, &request.job_title, &missing_keywords).await;

        let engine = TemplateEngine::new(self.config.compiler.clone());
        let variant_id = Variant::new_id();
        let filename = format!("{variant_id}.tex");
        let output_dir = std::path::Path::new("data/resumes/variants");
        let (source_path, pdf_path) =
            engine.generate_files(&resume.source_text, summary.as_deref(), &experience_sections, output_dir, &filename).await?;

        let total_bullets: usize = experience_sections.iter().map(|s| s.selected_bullets.len()).sum();

        let mut variant = Variant {
            id: variant_id,
            base_resume_handle: request.resume_handle.clone(),
            job_title: request.job_title.clone(),
            company: request.company.clone(),
            experience_sections,
            summary,
            source_path,
            pdf_path,
            ats_score: None,
            fit_score: None,
            created_at: chrono::Utc::now(),
            enhancement_stats,
        };

        if let Ok(variant_resume) = ResumeParser::parse(&variant.source_path_contents()?) {
            let ats_scorer = AtsScorer::new(self.config.matcher.fuzzy_threshold);
            let fit_scorer = FitScorer::new(self.config.matcher.fuzzy_threshold);
            variant.ats_score = Some(ats_scorer.score_resume(&variant_resume, &request.job_description, &request.job_title));
            variant.fit_score = Some(fit_scorer.score_fit(&variant_resume, &request.job_description, &request.job_title));
        }

        self.persist_variant(request, &variant, total_bullets).await?;
        self.checkpoint(progress, 80, "variant persisted");

        Ok(variant)
    }

    /// Writes the variant, and its ATS score when one was computed, to the
    /// persistence gateway. Runs inside `execute` so the task never reaches
    /// `Completed` before the artifact is durably recorded.
    async fn persist_variant(&self, request: &GenerationRequest, variant: &Variant, total_bullets: usize) -> PipelineResult<()> {
        let new_variant = NewVariant {
            variant_id: variant.id.clone(),
            job_id: request.job_id,
            base_resume_handle: variant.base_resume_handle.clone(),
            source_path: variant.source_path.clone(),
            pdf_path: variant.pdf_path.clone(),
            metadata_path: None,
            target_bullets: request.target_bullets as i64,
            ai_enhancement_enabled: request.use_ai,
            bullets_enhanced: variant.enhancement_stats.bullets_enhanced as i64,
            total_bullets: total_bullets as i64,
            keywords_added: variant.enhancement_stats.keywords_added.clone(),
        };

        let db = self.db.lock().await;
        match &variant.ats_score {
            Some(ats) => {
                let missing_keywords: Vec<String> = ats.missing_keywords.iter().map(|k| k.text.clone()).collect();
                let new_score = NewAtsScore {
                    variant_id: variant.id.clone(),
                    overall_score: ats.overall_score,
                    keyword_score: ats.keyword_score,
                    experience_score: ats.experience_score,
                    skills_score: ats.skills_score,
                    education_score: ats.education_score,
                    format_score: ats.format_score,
                    missing_keywords,
                    recommendations: ats.improvements.clone(),
                };
                db.add_variant_with_score(&new_variant, &new_score).await
            }
            None => db.add_variant(&new_variant).await,
        }
    }

    async fn generate_summary(
        &self,
        resume: &crate::models::Resume,
        sections: &[crate::models::ExperienceSection],
        job_title: &str,
        keywords: &[String],
    ) -> Option<String> {
        let experience_bullets: Vec<String> =
            sections.iter().flat_map(|s| s.selected_bullets.iter().take(2)).map(|sb| sb.rendered_text().to_string()).collect();

        if self.ollama.is_available().await {
            if let Ok(Some(summary)) =
                self.ollama.generate_summary(&experience_bullets, &resume.skills.technical, job_title, keywords).await
            {
                return Some(summary);
            }
        }

        if let Some(existing) = &resume.summary {
            return Some(Self::inject_keywords(existing, keywords));
        }

        let top: Vec<&str> = keywords.iter().take(3).map(|s| s.as_str()).collect();
        if top.is_empty() {
            None
        } else {
            Some(format!("Experienced professional with expertise in {} seeking {} role.", top.join(", "), job_title))
        }
    }

    fn inject_keywords(summary: &str, keywords: &[String]) -> String {
        let summary_lower = summary.to_lowercase();
        let missing: Vec<&str> =
            keywords.iter().take(3).filter(|k| !summary_lower.contains(&k.to_lowercase())).map(|s| s.as_str()).collect();

        if missing.is_empty() {
            return summary.to_string();
        }

        format!("{summary} Specialized in {}.", missing.join(", "))
    }

    pub fn compare_with_original(&self, original: &crate::models::Resume, variant: &Variant) -> ResumeComparison {
        ResumeComparator::new().compare(original, &variant.experience_sections)
    }
}

impl Variant {
    /// Re-reads the rendered variant source back off disk so scoring runs
    /// against exactly what was written, matching the original's round-trip
    /// through the parser after template generation.
    fn source_path_contents(&self) -> PipelineResult<String> {
        std::fs::read_to_string(&self.source_path)
            .map_err(|e| PipelineError::internal(format!("failed to re-read generated variant: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BulletSelectionConfig, CompilerConfig, EnhancerConfig, LlmConfig, LoggingConfig, MatcherConfig, TaskConfig};

    fn test_config() -> Arc<AppConfig> {
        Arc::new(AppConfig {
            database_url: "sqlite::memory:".to_string(),
            llm: LlmConfig { base_url: "http://127.0.0.1:1".to_string(), ..LlmConfig::default() },
            compiler: CompilerConfig::default(),
            task: TaskConfig::default(),
            bullet_selection: BulletSelectionConfig::default(),
            matcher: MatcherConfig::default(),
            enhancer: EnhancerConfig::default(),
            logging: LoggingConfig::default(),
        })
    }

    async fn test_db() -> Arc<tokio::sync::Mutex<Database>> {
        Arc::new(tokio::sync::Mutex::new(Database::new_with_url("sqlite::memory:").await.unwrap()))
    }

    #[tokio::test]
    async fn submit_creates_a_pending_then_progressing_task() {
        let orchestrator = Orchestrator::new(test_config(), test_db().await).unwrap();
        let request = GenerationRequest {
            resume_handle: "resume-1".to_string(),
            resume_source: "\\documentclass{article}\\begin{document}\\end{document}".to_string(),
            job_description: "Looking for a Platform Engineer with Kubernetes and Kafka experience.".to_string(),
            job_title: "Platform Engineer".to_string(),
            company: "Acme".to_string(),
            target_bullets: 5,
            use_ai: false,
            job_id: 1,
        };

        let task_id = orchestrator.submit(request).await;
        let status = orchestrator.status(&task_id).await;
        assert!(status.is_some());
    }

    #[test]
    fn inject_keywords_appends_only_missing_terms() {
        let result = Orchestrator::inject_keywords("Experienced backend engineer.", &["Kubernetes".to_string(), "backend".to_string()]);
        assert!(result.contains("Kubernetes"));
        assert_eq!(result.matches("backend").count(), 1);
    }

    #[test]
    fn inject_keywords_is_noop_when_all_present() {
        let result = Orchestrator::inject_keywords("Experienced Kubernetes engineer.", &["Kubernetes".to_string()]);
        assert_eq!(result, "Experienced Kubernetes engineer.");
    }
}
