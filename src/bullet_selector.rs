use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::config::BulletSelectionConfig;
use crate::models::{BulletPoint, ExperienceEntry, ExperienceSection, Keyword, Resume, SelectedBullet};

static QUANTIFICATION_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+[%+]?").unwrap());

const STRONG_VERBS: &[&str] = &[
    "architected", "designed", "implemented", "optimized", "automated", "led", "managed",
    "developed", "deployed", "reduced", "increased", "improved", "scaled",
];
const RECENT_YEARS: &[&str] = &["2024", "2025", "2026"];

pub struct BulletSelector {
    config: BulletSelectionConfig,
}

impl BulletSelector {
    pub fn new(config: BulletSelectionConfig) -> Self {
        Self { config }
    }

    /// Greedily fills the target-bullet budget in score order, then tops up any
    /// experience left under its minimum, respecting the per-experience cap throughout.
    pub fn select_bullets(&self, resume: &Resume, jd_keywords: &[Keyword]) -> Vec<ExperienceSection> {
        info!(
            "selecting bullets across {} experience entries (target {})",
            resume.experience.len(),
            self.config.target_bullets
        );

        let keyword_texts: Vec<String> = jd_keywords.iter().take(20).map(|k| k.text.to_lowercase()).collect();
        let reason_keywords: Vec<String> = jd_keywords.iter().take(10).map(|k| k.text.to_lowercase()).collect();

        let mut all_scored: Vec<(usize, BulletPoint, f64)> = Vec::new();
        for (idx, exp) in resume.experience.iter().enumerate() {
            for bullet in &exp.bullets {
                let score = Self::score_bullet(bullet, exp, &keyword_texts);
                all_scored.push((idx, bullet.clone(), score));
            }
        }
        all_scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap());

        let mut by_experience: HashMap<usize, Vec<(BulletPoint, f64)>> = HashMap::new();
        let mut total_selected = 0usize;

        for (idx, bullet, score) in &all_scored {
            let entry = by_experience.entry(*idx).or_default();

            if entry.len() >= self.config.max_bullets_per_job {
                continue;
            }
            if total_selected >= self.config.target_bullets {
                break;
            }

            entry.push((bullet.clone(), *score));
            total_selected += 1;
        }

        for (idx, exp) in resume.experience.iter().enumerate() {
            let entry = by_experience.entry(idx).or_default();
            if entry.len() >= self.config.min_bullets_per_job {
                continue;
            }

            let selected_ids: Vec<&str> = entry.iter().map(|(b, _)| b.id.as_str()).collect();
            let need = self.config.min_bullets_per_job - entry.len();
            for bullet in exp.bullets.iter().filter(|b| !selected_ids.contains(&b.id.as_str())).take(need) {
                let score = Self::score_bullet(bullet, exp, &keyword_texts);
                entry.push((bullet.clone(), score));
            }
        }

        let mut sections: Vec<ExperienceSection> = resume
            .experience
            .iter()
            .enumerate()
            .filter_map(|(idx, exp)| {
                let bullets = by_experience.remove(&idx)?;
                let selected_bullets: Vec<SelectedBullet> = bullets
                    .into_iter()
                    .map(|(bullet, score)| {
                        let reason = Self::selection_reason(&bullet, score, &reason_keywords);
                        SelectedBullet {
                            bullet,
                            relevance_score: score,
                            selection_reason: reason,
                            enhanced_text: None,
                            was_enhanced: false,
                        }
                    })
                    .collect();

                Some(ExperienceSection {
                    experience: exp.clone(),
                    selected_bullets,
                    total_available: exp.bullets.len(),
                })
            })
            .collect();

        for section in &mut sections {
            section.selected_bullets.sort_by(|a, b| b.relevance_score.partial_cmp(&a.relevance_score).unwrap());
        }

        info!("selected {} bullets across {} experiences", total_selected, sections.len());
        sections
    }

    /// Weights: keyword match 40%, quantification 20%, action verb 15%, length 10%, recency 15%.
    fn score_bullet(bullet: &BulletPoint, exp: &ExperienceEntry, jd_keywords: &[String]) -> f64 {
        let mut score = 0.0;
        let text_lower = bullet.text.to_lowercase();

        let matched_keywords = jd_keywords.iter().filter(|kw| text_lower.contains(kw.as_str())).count();
        score += (matched_keywords as f64 / 5.0).min(1.0) * 0.4;

        if QUANTIFICATION_PATTERN.is_match(&bullet.text) {
            score += 0.2;
        }

        let first_word = bullet.text.split_whitespace().next().unwrap_or("").to_lowercase();
        if STRONG_VERBS.contains(&first_word.as_str()) {
            score += 0.15;
        } else if STRONG_VERBS.iter().any(|v| text_lower.contains(v)) {
            score += 0.10;
        }

        let word_count = bullet.text.split_whitespace().count();
        if (10..=25).contains(&word_count) {
            score += 0.10;
        } else if (8..=30).contains(&word_count) {
            score += 0.05;
        }

        let end_date_lower = exp.end_date.as_deref().unwrap_or("").to_lowercase();
        if exp.is_current || end_date_lower.contains("present") {
            score += 0.15;
        } else if RECENT_YEARS.iter().any(|y| end_date_lower.contains(y)) {
            score += 0.10;
        } else {
            score += 0.05;
        }

        score.min(1.0)
    }

    fn selection_reason(bullet: &BulletPoint, score: f64, jd_keywords: &[String]) -> String {
        let mut reasons = Vec::new();
        let text_lower = bullet.text.to_lowercase();

        let matched: Vec<&String> = jd_keywords.iter().filter(|kw| text_lower.contains(kw.as_str())).collect();
        if !matched.is_empty() {
            let sample: Vec<&str> = matched.iter().take(3).map(|s| s.as_str()).collect();
            reasons.push(format!("Matches keywords: {}", sample.join(", ")));
        }

        if QUANTIFICATION_PATTERN.is_match(&bullet.text) {
            reasons.push("Contains quantifiable results".to_string());
        }

        if STRONG_VERBS.iter().any(|v| text_lower.contains(v)) {
            reasons.push("Strong action verb".to_string());
        }

        if score >= 0.8 {
            reasons.push("High relevance score".to_string());
        }

        if reasons.is_empty() {
            "Relevant to role".to_string()
        } else {
            reasons.join("; ")
        }
    }

    pub fn reorder_by_relevance(&self, sections: &mut [ExperienceSection]) {
        for section in sections {
            section.selected_bullets.sort_by(|a, b| b.relevance_score.partial_cmp(&a.relevance_score).unwrap());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KeywordCategory;

    fn exp_with_bullets(title: &str, company: &str, current: bool, texts: &[&str]) -> ExperienceEntry {
        ExperienceEntry {
            title: title.to_string(),
            company: company.to_string(),
            location: None,
            start_date: Some("Jan 2020".to_string()),
            end_date: Some(if current { "Present".to_string() } else { "Dec 2021".to_string() }),
            bullets: texts
                .iter()
                .enumerate()
                .map(|(i, t)| BulletPoint::new(format!("{company}_{i}"), *t, "experience"))
                .collect(),
            is_current: current,
            line_number: None,
        }
    }

    fn kw(text: &str) -> Keyword {
        Keyword {
            text: text.to_string(),
            category: KeywordCategory::Technical,
            importance: 0.8,
            synonyms: Vec::new(),
            context: None,
        }
    }

    fn sample_resume() -> Resume {
        Resume {
            personal: Default::default(),
            summary: None,
            experience: vec![
                exp_with_bullets(
                    "Platform Engineer",
                    "Acme",
                    true,
                    &[
                        "Architected Kafka cluster serving 200k events/sec",
                        "Attended weekly meetings",
                        "Improved reliability by 40% using Kubernetes",
                    ],
                ),
                exp_with_bullets("Engineer", "OldCo", false, &["Wrote internal documentation"]),
            ],
            education: Vec::new(),
            skills: Default::default(),
            projects: Vec::new(),
            certifications: Vec::new(),
            awards: Vec::new(),
            all_bullets: Vec::new(),
            macros: Default::default(),
            warnings: Vec::new(),
            source_text: String::new(),
            parsed_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn selects_highest_scoring_bullets_first() {
        let config = BulletSelectionConfig {
            target_bullets: 2,
            min_bullets_per_job: 1,
            max_bullets_per_job: 6,
        };
        let selector = BulletSelector::new(config);
        let resume = sample_resume();
        let keywords = vec![kw("Kafka"), kw("Kubernetes")];

        let sections = selector.select_bullets(&resume, &keywords);
        let acme = sections.iter().find(|s| s.experience.company == "Acme").unwrap();
        assert!(acme.selected_bullets.iter().any(|b| b.bullet.text.contains("Kafka")));
    }

    #[test]
    fn respects_minimum_bullets_per_experience() {
        let config = BulletSelectionConfig {
            target_bullets: 1,
            min_bullets_per_job: 1,
            max_bullets_per_job: 6,
        };
        let selector = BulletSelector::new(config);
        let resume = sample_resume();

        let sections = selector.select_bullets(&resume, &[]);
        for section in &sections {
            assert!(section.selected_bullets.len() >= 1);
        }
    }

    #[test]
    fn respects_max_bullets_per_experience() {
        let config = BulletSelectionConfig {
            target_bullets: 10,
            min_bullets_per_job: 1,
            max_bullets_per_job: 2,
        };
        let selector = BulletSelector::new(config);
        let resume = sample_resume();

        let sections = selector.select_bullets(&resume, &[kw("Kafka")]);
        for section in &sections {
            assert!(section.selected_bullets.len() <= 2);
        }
    }

    #[test]
    fn current_role_bullets_score_at_least_as_high_as_past_role() {
        let resume = sample_resume();
        let exp_current = &resume.experience[0];
        let exp_past = &resume.experience[1];

        let score_current = BulletSelector::score_bullet(&exp_current.bullets[1], exp_current, &[]);
        let score_past = BulletSelector::score_bullet(&exp_past.bullets[0], exp_past, &[]);
        assert!(score_current >= score_past);
    }
}
