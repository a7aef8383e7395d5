use chrono::Utc;
use log::info;
use serde_json::json;
use std::path::Path;

use crate::errors::{PipelineError, PipelineResult};
use crate::models::Variant;

/// Writes a batch of generated variants to `./exports` in the requested
/// format and returns the path written to.
pub async fn export_variants(variants: &[Variant], format: &str) -> PipelineResult<String> {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let filename = format!("variant_export_{}_{}.{}", timestamp, variants.len(), format);
    let file_path = Path::new("./exports").join(&filename);

    tokio::fs::create_dir_all("./exports").await?;

    match format.to_lowercase().as_str() {
        "json" => export_json(variants, &file_path).await?,
        "csv" => export_csv(variants, &file_path).await?,
        "txt" => export_txt(variants, &file_path).await?,
        other => return Err(PipelineError::input(format!("unsupported export format: {other}"))),
    }

    info!("exported {} variants to {}", variants.len(), file_path.display());
    Ok(file_path.to_string_lossy().to_string())
}

async fn export_json(variants: &[Variant], file_path: &Path) -> PipelineResult<()> {
    let export_data = json!({
        "export_timestamp": Utc::now().to_rfc3339(),
        "total_variants": variants.len(),
        "variants": variants,
    });

    let json_string = serde_json::to_string_pretty(&export_data)
        .map_err(|e| PipelineError::internal(format!("failed to serialize variants: {e}")))?;
    tokio::fs::write(file_path, json_string).await?;
    Ok(())
}

async fn export_csv(variants: &[Variant], file_path: &Path) -> PipelineResult<()> {
    let mut csv_content = String::new();
    csv_content.push_str("ID,Job Title,Company,ATS Score,Fit Score,Bullets Enhanced,Total Bullets,Created At\n");

    for variant in variants {
        let total_bullets: usize = variant.experience_sections.iter().map(|s| s.selected_bullets.len()).sum();
        csv_content.push_str(&format!(
            "{},{},{},{:.1},{:.1},{},{},{}\n",
            variant.id,
            variant.job_title,
            variant.company,
            variant.ats_score.as_ref().map(|s| s.overall_score).unwrap_or(0.0),
            variant.fit_score.as_ref().map(|s| s.overall_score).unwrap_or(0.0),
            variant.enhancement_stats.bullets_enhanced,
            total_bullets,
            variant.created_at.to_rfc3339(),
        ));
    }

    tokio::fs::write(file_path, csv_content).await?;
    Ok(())
}

async fn export_txt(variants: &[Variant], file_path: &Path) -> PipelineResult<()> {
    let mut txt_content = String::new();
    txt_content.push_str("Tailored Variant Export Report\n");
    txt_content.push_str(&format!("Generated: {}\n", Utc::now().format("%Y-%m-%d %H:%M:%S UTC")));
    txt_content.push_str(&format!("Total Variants: {}\n\n", variants.len()));
    txt_content.push_str(&"=".repeat(80));
    txt_content.push_str("\n\n");

    for (i, variant) in variants.iter().enumerate() {
        txt_content.push_str(&format!("Variant #{}\n", i + 1));
        txt_content.push_str(&format!("ID: {}\n", variant.id));
        txt_content.push_str(&format!("Job: {} at {}\n", variant.job_title, variant.company));

        if let Some(ats) = &variant.ats_score {
            txt_content.push_str(&format!("ATS Score: {:.1}/100\n", ats.overall_score));
        }
        if let Some(fit) = &variant.fit_score {
            txt_content.push_str(&format!("Fit Score: {:.1}/100\n", fit.overall_score));
        }

        txt_content.push_str(&format!("Bullets Enhanced: {}\n", variant.enhancement_stats.bullets_enhanced));
        if !variant.enhancement_stats.keywords_added.is_empty() {
            txt_content.push_str(&format!("Keywords Added: {}\n", variant.enhancement_stats.keywords_added.join(", ")));
        }
        txt_content.push_str(&format!("Created: {}\n", variant.created_at.format("%Y-%m-%d %H:%M:%S UTC")));

        txt_content.push('\n');
        txt_content.push_str(&"-".repeat(80));
        txt_content.push_str("\n\n");
    }

    tokio::fs::write(file_path, txt_content).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EnhancementStats;

    fn sample_variant() -> Variant {
        Variant {
            id: "v1".to_string(),
            base_resume_handle: "resume-1".to_string(),
            job_title: "Platform Engineer".to_string(),
            company: "Acme".to_string(),
            experience_sections: Vec::new(),
            summary: Some("Experienced engineer.".to_string()),
            source_path: "/tmp/v1.tex".to_string(),
            pdf_path: None,
            ats_score: None,
            fit_score: None,
            created_at: Utc::now(),
            enhancement_stats: EnhancementStats { bullets_enhanced: 2, keywords_added: vec!["Kubernetes".to_string()] },
        }
    }

    #[tokio::test]
    async fn export_json_writes_a_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("variants.json");

        let variants = vec![sample_variant()];
        export_json(&variants, &file_path).await.unwrap();

        let contents = tokio::fs::read_to_string(&file_path).await.unwrap();
        assert!(contents.contains("Platform Engineer"));
    }

    #[tokio::test]
    async fn export_csv_includes_scores_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("variants.csv");

        let variants = vec![sample_variant()];
        export_csv(&variants, &file_path).await.unwrap();

        let contents = tokio::fs::read_to_string(&file_path).await.unwrap();
        assert!(contents.contains("Acme"));
        assert!(contents.contains("v1"));
    }

    #[tokio::test]
    async fn unsupported_format_is_rejected() {
        let variants = vec![sample_variant()];
        let result = export_variants(&variants, "xml").await;
        assert!(result.is_err());
    }
}
