use std::sync::Arc;

use tailoring_pipeline::config::{AppConfig, BulletSelectionConfig, CompilerConfig, EnhancerConfig, LlmConfig, LoggingConfig, MatcherConfig, TaskConfig};
use tailoring_pipeline::database::Database;
use tailoring_pipeline::models::{GenerationRequest, NewJob, TaskStatus};
use tailoring_pipeline::orchestrator::Orchestrator;
use tokio::sync::Mutex;
use tokio_stream::StreamExt;

const SAMPLE_RESUME: &str = r#"
\documentclass{article}
\newcommand{\resumeSubheading}[4]{}
\newcommand{\resumeItem}[1]{\item #1}

\begin{document}
\name{Jordan Rivera}
\email{jordan@example.com}

\section*{Summary}
Backend engineer with a focus on distributed systems.
%-----------EXPERIENCE-----------
\resumeSubheading
  {Senior Backend Engineer}{Jan 2021 -- Present}{Acme Corp}{Remote}
  \resumeItemListStart
  \begin{itemize}
      \resumeItem{Built a distributed queue that processed 2M messages daily}
      \resumeItem{Operated a 12-node Kafka cluster supporting real time ingestion}
      \resumeItem{Led migration of a monolith to microservices, cutting p99 latency 40%}
      \resumeItem{Mentored three junior engineers on on-call practices}
  \end{itemize}
    \resumeItemListEnd

\section{Education}
\resumeSubheading
  {State University}{Springfield}{B.S. Computer Science}{May 2017}

\section{Skills}
Technical: Rust, Python, Go, Kubernetes
Tools: Docker, Kafka, Terraform
\end{document}
"#;

const JOB_DESCRIPTION: &str = "We need a Platform Engineer with required Kafka experience \
and strong Kubernetes background to own our real time data infrastructure.";

/// Points the LLM client at an address nothing listens on so `use_ai=false`
/// runs stay fully offline and deterministic.
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

async fn test_db() -> Arc<Mutex<Database>> {
    Arc::new(Mutex::new(Database::new_with_url("sqlite::memory:").await.unwrap()))
}

async fn sample_request(db: &Database, job_title: &str, company: &str) -> GenerationRequest {
    let job_id = db
        .add_job(&NewJob {
            company: company.to_string(),
            job_title: job_title.to_string(),
            job_description: JOB_DESCRIPTION.to_string(),
            ..NewJob::default()
        })
        .await
        .expect("job insert for test fixture");

    GenerationRequest {
        resume_handle: "jordan-rivera".to_string(),
        resume_source: SAMPLE_RESUME.to_string(),
        job_description: JOB_DESCRIPTION.to_string(),
        job_title: job_title.to_string(),
        company: company.to_string(),
        target_bullets: 3,
        use_ai: false,
        job_id,
    }
}

async fn run_to_completion(orchestrator: &Orchestrator, request: GenerationRequest) -> tailoring_pipeline::models::TaskState {
    let task_id = orchestrator.submit(request).await;
    let mut stream = orchestrator.subscribe(&task_id).await.expect("task was just submitted");

    let mut percents = Vec::new();
    let mut final_state = None;
    while let Some(state) = stream.next().await {
        percents.push(state.percent);
        if state.status.is_terminal() {
            final_state = Some(state);
            break;
        }
    }

    let final_state = final_state.expect("stream must close with a terminal state");
    assert_eq!(final_state.status, TaskStatus::Completed, "task failed: {:?}", final_state.error);
    assert!(percents.iter().any(|p| *p <= 10));
    assert!(percents.iter().any(|p| *p >= 80));
    assert_eq!(*percents.last().unwrap(), 100);

    final_state
}

#[tokio::test]
async fn happy_path_with_ai_disabled_produces_a_scored_variant() {
    let db = test_db().await;
    let orchestrator = Orchestrator::new(test_config(), db.clone()).unwrap();
    let request = sample_request(&*db.lock().await, "Platform Engineer", "Acme").await;
    let final_state = run_to_completion(&orchestrator, request).await;

    let variant_id = final_state.variant_id.expect("completed task must carry a variant id");
    let variant = orchestrator.get_variant(&variant_id).await.expect("variant must be retrievable after completion");

    assert_eq!(variant.enhancement_stats.bullets_enhanced, 0);
    assert!(variant.enhancement_stats.keywords_added.is_empty());

    let ats = variant.ats_score.expect("ATS score must be computed");
    assert!(ats.overall_score >= 0.0 && ats.overall_score <= 100.0);

    let written = std::fs::read_to_string(&variant.source_path).unwrap();
    assert!(written.contains("\\resumeItem"));

    let _ = std::fs::remove_file(&variant.source_path);
}

#[tokio::test]
async fn concurrent_tasks_get_independent_progress_and_output() {
    let db = test_db().await;
    let orchestrator = Orchestrator::new(test_config(), db.clone()).unwrap();

    let request_a = sample_request(&*db.lock().await, "Platform Engineer", "Acme").await;
    let request_b = sample_request(&*db.lock().await, "Site Reliability Engineer", "Globex").await;
    let a = orchestrator.submit(request_a).await;
    let b = orchestrator.submit(request_b).await;
    assert_ne!(a, b);

    let mut stream_a = orchestrator.subscribe(&a).await.unwrap();
    let mut stream_b = orchestrator.subscribe(&b).await.unwrap();

    let mut last_a = None;
    while let Some(state) = stream_a.next().await {
        if state.status.is_terminal() {
            last_a = Some(state);
            break;
        }
    }
    let mut last_b = None;
    while let Some(state) = stream_b.next().await {
        if state.status.is_terminal() {
            last_b = Some(state);
            break;
        }
    }

    let variant_a = last_a.unwrap().variant_id.unwrap();
    let variant_b = last_b.unwrap().variant_id.unwrap();
    assert_ne!(variant_a, variant_b);

    let resolved_a = orchestrator.get_variant(&variant_a).await.unwrap();
    let resolved_b = orchestrator.get_variant(&variant_b).await.unwrap();
    assert_ne!(resolved_a.source_path, resolved_b.source_path);

    let _ = std::fs::remove_file(&resolved_a.source_path);
    let _ = std::fs::remove_file(&resolved_b.source_path);
}
