use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::config::CompilerConfig;
use crate::errors::PipelineResult;
use crate::models::ExperienceSection;

static SUMMARY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)(\\section\*\{Summary\}\s*\n)(.*?)(\n\s*%-+[A-Z\s]+-+)").unwrap());
static BULLET_BLOCK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)(\\resumeItemListStart\s*\n)((?:.*?\n)*?)(\s*\\resumeItemListEnd)").unwrap());
static AI_PLACEHOLDER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\[X\]\s*\.?").unwrap());

pub struct TemplateEngine {
    compiler: CompilerConfig,
}

impl TemplateEngine {
    pub fn new(compiler: CompilerConfig) -> Self {
        Self { compiler }
    }

    /// Writes the modified source to `output_dir/filename` and attempts a two-pass
    /// compile. Returns `(source_path, pdf_path)`; `pdf_path` is `None` when the
    /// compiler binary is unavailable or compilation fails.
    pub async fn generate_files(
        &self,
        original_source: &str,
        summary: Option<&str>,
        experience_sections: &[ExperienceSection],
        output_dir: &Path,
        filename: &str,
    ) -> PipelineResult<(String, Option<String>)> {
        tokio::fs::create_dir_all(output_dir).await?;

        let source_path = output_dir.join(filename);
        let modified = self.modify_template(original_source, summary, experience_sections);

        tokio::fs::write(&source_path, &modified).await?;
        info!("source written to: {:?}", source_path);

        let pdf_path = self.compile_pdf(&source_path).await;

        Ok((source_path.to_string_lossy().to_string(), pdf_path))
    }

    fn modify_template(&self, original: &str, summary: Option<&str>, experience_sections: &[ExperienceSection]) -> String {
        let mut content = original.to_string();
        content = self.replace_summary(&content, summary);
        content = self.replace_experience_bullets(&content, experience_sections);
        content
    }

    fn replace_summary(&self, content: &str, new_summary: Option<&str>) -> String {
        let Some(new_summary) = new_summary else {
            return content.to_string();
        };

        if let Some(caps) = SUMMARY_PATTERN.captures(content) {
            let whole = caps.get(0).unwrap();
            let before = &caps[1];
            let after = &caps[3];
            let replacement = format!("{before}{new_summary}\n{after}");
            info!("replaced summary section");
            format!("{}{}{}", &content[..whole.start()], replacement, &content[whole.end()..])
        } else {
            warn!("summary section not found in template");
            content.to_string()
        }
    }

    fn replace_experience_bullets(&self, content: &str, experience_sections: &[ExperienceSection]) -> String {
        let mut new_bullets = Vec::new();
        for section in experience_sections {
            for selected in &section.selected_bullets {
                let mut text = selected.rendered_text().to_string();
                text = AI_PLACEHOLDER_PATTERN.replace_all(&text, "").to_string();
                text = text.trim().to_string();
                new_bullets.push(format!("      \\resumeItem{{{text}}}"));
            }
        }
        let bullets_block = format!("{}\n", new_bullets.join("\n"));

        if let Some(caps) = BULLET_BLOCK_PATTERN.captures(content) {
            let whole = caps.get(0).unwrap();
            let start_marker = &caps[1];
            let end_marker = &caps[3];
            let replacement = format!("{start_marker}{bullets_block}{end_marker}");
            info!("replaced experience bullets");
            format!("{}{}{}", &content[..whole.start()], replacement, &content[whole.end()..])
        } else {
            warn!("could not find experience bullets block");
            content.to_string()
        }
    }

    async fn compile_pdf(&self, source_path: &Path) -> Option<String> {
        let output_dir = source_path.parent().unwrap_or_else(|| Path::new("."));

        for pass in 1..=2 {
            let run = tokio::time::timeout(
                Duration::from_secs(self.compiler.timeout_seconds),
                Command::new(&self.compiler.binary)
                    .arg("-interaction=nonstopmode")
                    .arg("-output-directory")
                    .arg(output_dir)
                    .arg(source_path)
                    .output(),
            )
            .await;

            match run {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    warn!("{} not available, skipping PDF compilation: {}", self.compiler.binary, e);
                    return None;
                }
                Err(_) => {
                    warn!("compiler timed out on pass {}", pass);
                    return None;
                }
            }
        }

        let pdf_path = source_path.with_extension("pdf");
        if !pdf_path.exists() {
            return None;
        }

        info!("PDF compiled successfully");
        self.cleanup_aux_files(source_path);
        Some(pdf_path.to_string_lossy().to_string())
    }

    fn cleanup_aux_files(&self, source_path: &Path) {
        for ext in ["aux", "log", "out"] {
            let aux_file: PathBuf = source_path.with_extension(ext);
            if aux_file.exists() {
                let _ = std::fs::remove_file(&aux_file);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BulletPoint, ExperienceEntry, SelectedBullet};

    const SAMPLE_TEMPLATE: &str = "\\section*{Summary}\nOld summary text.\n\n%-----------EXPERIENCE-----------\n\\resumeItemListStart\n      \\resumeItem{Old bullet one}\n      \\resumeItem{Old bullet two}\n    \\resumeItemListEnd\n";

    fn section_with_bullets(texts: &[&str]) -> ExperienceSection {
        ExperienceSection {
            experience: ExperienceEntry {
                title: "Engineer".to_string(),
                company: "Acme".to_string(),
                location: None,
                start_date: None,
                end_date: None,
                bullets: Vec::new(),
                is_current: true,
                line_number: None,
            },
            selected_bullets: texts
                .iter()
                .enumerate()
                .map(|(i, t)| SelectedBullet {
                    bullet: BulletPoint::new(format!("b{i}"), *t, "experience"),
                    relevance_score: 0.9,
                    selection_reason: "test".to_string(),
                    enhanced_text: None,
                    was_enhanced: false,
                })
                .collect(),
            total_available: texts.len(),
        }
    }

    #[test]
    fn replace_summary_substitutes_new_text() {
        let engine = TemplateEngine::new(CompilerConfig::default());
        let result = engine.replace_summary(SAMPLE_TEMPLATE, Some("New summary text."));
        assert!(result.contains("New summary text."));
        assert!(!result.contains("Old summary text."));
    }

    #[test]
    fn replace_summary_is_noop_without_new_summary() {
        let engine = TemplateEngine::new(CompilerConfig::default());
        let result = engine.replace_summary(SAMPLE_TEMPLATE, None);
        assert_eq!(result, SAMPLE_TEMPLATE);
    }

    #[test]
    fn replace_experience_bullets_preserves_resume_item_command() {
        let engine = TemplateEngine::new(CompilerConfig::default());
        let sections = vec![section_with_bullets(&["New bullet one", "New bullet two"])];
        let result = engine.replace_experience_bullets(SAMPLE_TEMPLATE, &sections);

        assert!(result.contains("\\resumeItem{New bullet one}"));
        assert!(result.contains("\\resumeItem{New bullet two}"));
        assert!(!result.contains("Old bullet one"));
    }

    #[test]
    fn ai_placeholder_is_stripped_from_enhanced_bullets() {
        let engine = TemplateEngine::new(CompilerConfig::default());
        let sections = vec![section_with_bullets(&["Reduced latency by [X]."])];
        let result = engine.replace_experience_bullets(SAMPLE_TEMPLATE, &sections);

        assert!(result.contains("\\resumeItem{Reduced latency by}"));
        assert!(!result.contains("[X]"));
    }

    #[tokio::test]
    async fn compile_pdf_returns_none_for_missing_binary() {
        let engine = TemplateEngine::new(CompilerConfig {
            binary: "definitely-not-a-real-compiler-binary".to_string(),
            timeout_seconds: 5,
        });
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("resume.tex");
        tokio::fs::write(&source_path, SAMPLE_TEMPLATE).await.unwrap();

        let pdf_path = engine.compile_pdf(&source_path).await;
        assert!(pdf_path.is_none());
    }
}
