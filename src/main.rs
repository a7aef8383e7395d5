mod ats_scorer;
mod bullet_enhancer;
mod bullet_selector;
mod comparator;
mod config;
mod database;
mod errors;
mod fit_scorer;
mod keyword_extractor;
mod matcher;
mod models;
mod ollama;
mod orchestrator;
mod parser;
mod template_engine;
mod utils;

use std::sync::Arc;

use config::ConfigManager;
use database::Database;
use log::{error, info, warn};
use models::{GenerationRequest, NewJob};
use orchestrator::Orchestrator;
use tokio::sync::Mutex;
use tokio_stream::StreamExt;

/// Minimal argument set for a one-shot run: this binary is the pipeline's
/// driver, not the dashboard; a real front end would submit requests and
/// stream progress over its own transport instead of blocking on stdout.
struct Args {
    resume_path: String,
    job_description_path: String,
    job_title: String,
    company: String,
    use_ai: bool,
    target_bullets: usize,
}

fn parse_args() -> Result<Args, String> {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    if raw.len() < 4 {
        return Err(
            "usage: tailor <resume.tex> <job_description.txt> <job_title> <company> [--ai] [--target-bullets N]".to_string(),
        );
    }

    let mut use_ai = false;
    let mut target_bullets = 15;
    let mut positional = Vec::new();
    let mut i = 0;
    while i < raw.len() {
        match raw[i].as_str() {
            "--ai" => use_ai = true,
            "--target-bullets" => {
                i += 1;
                target_bullets = raw.get(i).and_then(|v| v.parse().ok()).ok_or("--target-bullets requires a number")?;
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    if positional.len() < 4 {
        return Err("missing one of: resume path, job description path, job title, company".to_string());
    }

    Ok(Args {
        resume_path: positional[0].clone(),
        job_description_path: positional[1].clone(),
        job_title: positional[2].clone(),
        company: positional[3].clone(),
        use_ai,
        target_bullets,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    info!("starting tailoring pipeline");

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(2);
        }
    };

    let mut config_manager = ConfigManager::new()?;
    config_manager.apply_env_overrides()?;

    let warnings = config_manager.validate_config()?;
    for warning in warnings {
        warn!("configuration warning: {warning}");
    }

    let database = Database::new_with_url(config_manager.database_url()).await?;
    match database.health_check().await {
        Ok(true) => info!("database health check passed"),
        Ok(false) => warn!("database health check failed, continuing anyway"),
        Err(e) => {
            error!("database health check error: {e}");
            return Err(e.into());
        }
    }

    let resume_source = tokio::fs::read_to_string(&args.resume_path).await?;
    let job_description = tokio::fs::read_to_string(&args.job_description_path).await?;

    let job_record = match database.get_job_by_details(&args.company, &args.job_title).await? {
        Some(existing) => existing,
        None => {
            let job_id = database
                .add_job(&NewJob {
                    company: args.company.clone(),
                    job_title: args.job_title.clone(),
                    job_description: job_description.clone(),
                    job_url: None,
                    requirements: None,
                    posted_date: None,
                    deadline_date: None,
                    location: None,
                    salary_range: None,
                    employment_type: None,
                    source: None,
                    notes: None,
                })
                .await?;
            database.get_job(job_id).await?.expect("job row just inserted")
        }
    };

    let config = Arc::new(config_manager.get_config().clone());
    let db = Arc::new(Mutex::new(database));
    let orchestrator = Orchestrator::new(config, db.clone())?;

    let request = GenerationRequest {
        resume_handle: args.resume_path.clone(),
        resume_source,
        job_description,
        job_title: args.job_title.clone(),
        company: args.company.clone(),
        target_bullets: args.target_bullets,
        use_ai: args.use_ai,
        job_id: job_record.id,
    };

    let task_id = orchestrator.submit(request).await;
    info!("submitted task {task_id}");

    let mut stream = orchestrator.subscribe(&task_id).await.expect("task was just submitted");
    let mut final_state = None;
    while let Some(state) = stream.next().await {
        info!("task {task_id}: {:>3}% {}", state.percent, state.message);
        if state.status.is_terminal() {
            final_state = Some(state);
        }
    }

    let Some(final_state) = final_state else {
        error!("progress stream closed without a terminal state");
        std::process::exit(1);
    };

    let Some(variant_id) = final_state.variant_id else {
        error!("task failed: {}", final_state.error.unwrap_or_else(|| "unknown error".to_string()));
        std::process::exit(1);
    };

    // Persistence already happened inside the orchestrator at checkpoint 80,
    // before this stream's terminal state was published.
    let variant = orchestrator.get_variant(&variant_id).await.expect("completed task must have a stored variant");

    let export_path = utils::export_variants(std::slice::from_ref(&variant), "json").await?;

    println!("variant {} written to {}", variant.id, variant.source_path);
    if let Some(pdf) = &variant.pdf_path {
        println!("pdf compiled to {pdf}");
    }
    if let Some(ats) = &variant.ats_score {
        println!("ATS score: {:.1}/100", ats.overall_score);
    }
    if let Some(fit) = &variant.fit_score {
        println!("fit score: {:.1}/100", fit.overall_score);
    }
    println!("exported summary to {export_path}");

    Ok(())
}
