use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::errors::PipelineResult;
use crate::models::{BulletEnhancement, BulletPoint};
use crate::ollama::OllamaClient;

static QUANTIFICATION_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+[%+]?").unwrap());
static BULLET_MARKER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*\u{2022}]\s*").unwrap());
static BOLD_MARKDOWN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());

const ACTION_VERBS: &[&str] = &[
    "managed", "developed", "implemented", "optimized", "designed", "automated", "configured", "deployed",
];

pub struct BulletEnhancer {
    ollama: OllamaClient,
    min_confidence: f64,
}

impl BulletEnhancer {
    pub fn new(ollama: OllamaClient, min_confidence: f64) -> Self {
        Self { ollama, min_confidence }
    }

    pub async fn enhance_bullet(
        &self,
        bullet: &BulletPoint,
        job_title: &str,
        missing_keywords: &[String],
    ) -> PipelineResult<Option<BulletEnhancement>> {
        if !self.ollama.is_available().await {
            info!("Ollama not available, skipping enhancement");
            return Ok(None);
        }

        let raw = self.ollama.enhance_bullet(&bullet.text, job_title, missing_keywords).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        let enhanced_text = Self::clean_bullet(&raw);
        if enhanced_text.is_empty() {
            return Ok(None);
        }

        let keywords_added = Self::find_added_keywords(&bullet.text, &enhanced_text, missing_keywords);
        let improvement_score = Self::calculate_improvement(&enhanced_text, &keywords_added);
        let confidence = Self::estimate_confidence(&bullet.text, &enhanced_text);

        if confidence < self.min_confidence {
            info!("enhancement confidence too low: {:.2}", confidence);
            return Ok(None);
        }

        Ok(Some(BulletEnhancement {
            original_text: bullet.text.clone(),
            enhanced_text,
            keywords_added,
            improvement_score,
            confidence,
        }))
    }

    /// Tries up to `2 * max_enhancements` candidate bullets and keeps the first
    /// `max_enhancements` that clear the confidence bar.
    pub async fn enhance_bullets_batch(
        &self,
        bullets: &[BulletPoint],
        job_title: &str,
        missing_keywords: &[String],
        max_enhancements: usize,
    ) -> PipelineResult<Vec<BulletEnhancement>> {
        info!("enhancing up to {} bullets", max_enhancements);

        let top_keywords: Vec<String> = missing_keywords.iter().take(3).cloned().collect();
        let mut enhancements = Vec::new();

        for bullet in bullets.iter().take(max_enhancements * 2) {
            if let Some(enhancement) = self.enhance_bullet(bullet, job_title, &top_keywords).await? {
                enhancements.push(enhancement);
            }
            if enhancements.len() >= max_enhancements {
                break;
            }
        }

        info!("enhanced {} bullets", enhancements.len());
        Ok(enhancements)
    }

    fn clean_bullet(text: &str) -> String {
        let trimmed = text.trim().trim_matches(|c| c == '"' || c == '\'');
        let no_marker = BULLET_MARKER_PATTERN.replace(trimmed, "");
        let no_bold = BOLD_MARKDOWN_PATTERN.replace_all(&no_marker, "$1");
        let mut result = no_bold.trim().to_string();

        if let Some(first) = result.chars().next() {
            let rest: String = result.chars().skip(1).collect();
            result = format!("{}{}", first.to_uppercase(), rest);
        }

        result
    }

    fn find_added_keywords(original: &str, enhanced: &str, target_keywords: &[String]) -> Vec<String> {
        let original_lower = original.to_lowercase();
        let enhanced_lower = enhanced.to_lowercase();

        target_keywords
            .iter()
            .filter(|kw| {
                let kw_lower = kw.to_lowercase();
                !original_lower.contains(&kw_lower) && enhanced_lower.contains(&kw_lower)
            })
            .cloned()
            .collect()
    }

    /// Weights: keywords added up to 0.5, quantification 0.3, action verb 0.2.
    fn calculate_improvement(enhanced: &str, keywords_added: &[String]) -> f64 {
        let mut score = 0.0;

        if !keywords_added.is_empty() {
            score += (keywords_added.len() as f64 * 0.15).min(0.5);
        }

        if QUANTIFICATION_PATTERN.is_match(enhanced) {
            score += 0.3;
        }

        let enhanced_lower = enhanced.to_lowercase();
        if ACTION_VERBS.iter().any(|v| enhanced_lower.contains(v)) {
            score += 0.2;
        }

        score.min(1.0)
    }

    fn estimate_confidence(original: &str, enhanced: &str) -> f64 {
        let orig_len = original.split_whitespace().count();
        let enh_len = enhanced.split_whitespace().count();

        if orig_len == 0 {
            return 0.5;
        }
        if enh_len as f64 > orig_len as f64 * 2.0 || (enh_len as f64) < orig_len as f64 * 0.5 {
            return 0.5;
        }

        let orig_words: HashSet<String> = original.to_lowercase().split_whitespace().map(String::from).collect();
        let enh_words: HashSet<String> = enhanced.to_lowercase().split_whitespace().map(String::from).collect();
        let overlap = orig_words.intersection(&enh_words).count() as f64 / orig_words.len() as f64;

        if overlap < 0.3 {
            return 0.6;
        }

        if !enhanced.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
            return 0.7;
        }

        0.9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_bullet_strips_markers_and_capitalizes() {
        let cleaned = BulletEnhancer::clean_bullet("- \"led the kafka migration\"");
        assert_eq!(cleaned, "Led the kafka migration");
    }

    #[test]
    fn clean_bullet_strips_bold_markdown() {
        let cleaned = BulletEnhancer::clean_bullet("**Optimized** throughput by 40%");
        assert_eq!(cleaned, "Optimized throughput by 40%");
    }

    #[test]
    fn find_added_keywords_detects_new_terms_only() {
        let added = BulletEnhancer::find_added_keywords(
            "Built internal dashboards for the team",
            "Built internal Kubernetes dashboards for the team using Grafana",
            &["Kubernetes".to_string(), "Grafana".to_string(), "team".to_string()],
        );
        assert_eq!(added.len(), 2);
        assert!(added.contains(&"Kubernetes".to_string()));
        assert!(added.contains(&"Grafana".to_string()));
    }

    #[test]
    fn improvement_score_rewards_keywords_metrics_and_verbs() {
        let score = BulletEnhancer::calculate_improvement(
            "Deployed Kubernetes clusters, improving throughput by 40%",
            &["Kubernetes".to_string()],
        );
        assert!(score > 0.5);
    }

    #[test]
    fn confidence_drops_when_length_changes_drastically() {
        let confidence = BulletEnhancer::estimate_confidence("Led migration", "a");
        assert_eq!(confidence, 0.5);
    }

    #[test]
    fn confidence_high_for_similar_professional_rewrite() {
        let confidence = BulletEnhancer::estimate_confidence(
            "Led Kafka migration to reduce latency",
            "Led Kafka migration to reduce latency by 30%",
        );
        assert!(confidence >= 0.7);
    }
}
