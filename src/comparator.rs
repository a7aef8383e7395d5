use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::matcher::similarity_ratio;
use crate::models::{BulletChange, BulletChangeType, ExperienceSection, Resume, ResumeComparison, SectionDelta};

static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").unwrap());

const STOPWORDS: &[&str] = &["the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by"];

const SIMILARITY_MATCH_THRESHOLD: f64 = 0.5;
const UNCHANGED_THRESHOLD: f64 = 0.9;

pub struct ResumeComparator;

impl Default for ResumeComparator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResumeComparator {
    pub fn new() -> Self {
        Self
    }

    /// Three-pass bullet alignment: exact-text-enhanced pairs first, then best
    /// remaining similarity match above threshold, then whatever's left over is
    /// counted as truly removed or added.
    pub fn compare(&self, original: &Resume, variant_sections: &[ExperienceSection]) -> ResumeComparison {
        info!("comparing original résumé against tailored variant");

        let original_bullets: Vec<&str> = original.all_bullets.iter().map(|b| b.text.as_str()).collect();
        let new_bullets: Vec<(&str, Option<&str>)> = variant_sections
            .iter()
            .flat_map(|s| s.selected_bullets.iter())
            .map(|sb| (sb.bullet.text.as_str(), sb.enhanced_text.as_deref()))
            .collect();

        let bullet_changes = self.compare_bullets(&original_bullets, &new_bullets);

        let section_deltas = self.compare_sections(original, variant_sections);

        let keywords_added = self.extract_added_keywords(&bullet_changes);

        let orig_text = original_bullets.join(" ");
        let new_text: String = new_bullets.iter().map(|(orig, enh)| enh.unwrap_or(orig)).collect::<Vec<_>>().join(" ");
        let similarity = similarity_ratio(&orig_text, &new_text);

        ResumeComparison { section_deltas, bullet_changes, keywords_added, similarity }
    }

    fn compare_bullets(&self, original_bullets: &[&str], new_bullets: &[(&str, Option<&str>)]) -> Vec<BulletChange> {
        let mut changes = Vec::new();
        let mut used_orig: HashSet<usize> = HashSet::new();
        let mut used_new: HashSet<usize> = HashSet::new();

        // First pass: bullets with an explicit enhanced_text are a known original/new pair.
        for (i, orig_text) in original_bullets.iter().enumerate() {
            for (j, (new_orig, enhanced)) in new_bullets.iter().enumerate() {
                if used_new.contains(&j) {
                    continue;
                }
                if let Some(enhanced_text) = enhanced {
                    if new_orig == orig_text {
                        let similarity = similarity_ratio(orig_text, enhanced_text);
                        changes.push(BulletChange {
                            change_type: BulletChangeType::Modified,
                            original_text: Some(orig_text.to_string()),
                            new_text: Some(enhanced_text.to_string()),
                            similarity,
                        });
                        used_orig.insert(i);
                        used_new.insert(j);
                        break;
                    }
                }
            }
        }

        // Second pass: match remaining bullets by text similarity.
        for (i, orig_text) in original_bullets.iter().enumerate() {
            if used_orig.contains(&i) {
                continue;
            }

            let mut best_match = None;
            let mut best_similarity = 0.0;
            for (j, (new_text, _)) in new_bullets.iter().enumerate() {
                if used_new.contains(&j) {
                    continue;
                }
                let similarity = similarity_ratio(orig_text, new_text);
                if similarity > best_similarity && similarity > SIMILARITY_MATCH_THRESHOLD {
                    best_similarity = similarity;
                    best_match = Some(j);
                }
            }

            if let Some(j) = best_match {
                let new_text = new_bullets[j].0;
                let change_type = if best_similarity >= UNCHANGED_THRESHOLD {
                    BulletChangeType::Unchanged
                } else {
                    BulletChangeType::Modified
                };
                changes.push(BulletChange {
                    change_type,
                    original_text: Some(orig_text.to_string()),
                    new_text: Some(new_text.to_string()),
                    similarity: best_similarity,
                });
                used_orig.insert(i);
                used_new.insert(j);
            }
        }

        // Third pass: whatever's left is truly removed or added.
        for (i, orig_text) in original_bullets.iter().enumerate() {
            if !used_orig.contains(&i) {
                changes.push(BulletChange {
                    change_type: BulletChangeType::Removed,
                    original_text: Some(orig_text.to_string()),
                    new_text: None,
                    similarity: 0.0,
                });
            }
        }
        for (j, (new_text, _)) in new_bullets.iter().enumerate() {
            if !used_new.contains(&j) {
                changes.push(BulletChange {
                    change_type: BulletChangeType::Added,
                    original_text: None,
                    new_text: Some(new_text.to_string()),
                    similarity: 0.0,
                });
            }
        }

        changes
    }

    fn compare_sections(&self, original: &Resume, variant_sections: &[ExperienceSection]) -> Vec<SectionDelta> {
        let original_has_summary = original.summary.as_deref().is_some_and(|s| !s.trim().is_empty());

        let mut deltas = vec![SectionDelta {
            section: "summary".to_string(),
            original_present: original_has_summary,
            variant_present: original_has_summary,
            changed: false,
        }];

        let original_companies: HashMap<&str, &str> =
            original.experience.iter().map(|e| (e.company.as_str(), e.title.as_str())).collect();

        for section in variant_sections {
            let company = section.experience.company.as_str();
            let original_present = original_companies.contains_key(company);
            let bullets_changed = section.selected_bullets.iter().any(|sb| sb.was_enhanced)
                || section.selected_bullets.len() != section.total_available;

            deltas.push(SectionDelta {
                section: format!("experience:{company}"),
                original_present,
                variant_present: true,
                changed: bullets_changed,
            });
        }

        deltas
    }

    fn extract_added_keywords(&self, bullet_changes: &[BulletChange]) -> Vec<String> {
        let mut added: HashSet<String> = HashSet::new();

        for change in bullet_changes {
            let (Some(orig), Some(new)) = (&change.original_text, &change.new_text) else {
                continue;
            };
            for word in self.find_new_keywords(orig, new) {
                added.insert(word);
            }
        }

        let mut sorted: Vec<String> = added.into_iter().collect();
        sorted.sort();
        sorted.truncate(10);
        sorted
    }

    fn find_new_keywords(&self, original: &str, new: &str) -> Vec<String> {
        let orig_words: HashSet<String> = WORD_PATTERN.find_iter(&original.to_lowercase()).map(|m| m.as_str().to_string()).collect();
        let new_words: HashSet<String> = WORD_PATTERN.find_iter(&new.to_lowercase()).map(|m| m.as_str().to_string()).collect();

        let mut meaningful: Vec<String> = new_words
            .difference(&orig_words)
            .filter(|w| w.len() > 3 && !STOPWORDS.contains(&w.as_str()))
            .cloned()
            .collect();
        meaningful.sort();
        meaningful.truncate(10);
        meaningful
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BulletPoint, ExperienceEntry, PersonalInfo, SelectedBullet, SkillsSection};

    fn sample_resume(bullets: &[&str]) -> Resume {
        Resume {
            personal: PersonalInfo::default(),
            summary: Some("Experienced engineer.".to_string()),
            experience: vec![ExperienceEntry {
                title: "Engineer".to_string(),
                company: "Acme".to_string(),
                location: None,
                start_date: None,
                end_date: None,
                bullets: bullets.iter().enumerate().map(|(i, t)| BulletPoint::new(format!("b{i}"), *t, "experience")).collect(),
                is_current: true,
                line_number: None,
            }],
            education: Vec::new(),
            skills: SkillsSection::default(),
            projects: Vec::new(),
            certifications: Vec::new(),
            awards: Vec::new(),
            all_bullets: bullets.iter().enumerate().map(|(i, t)| BulletPoint::new(format!("b{i}"), *t, "experience")).collect(),
            macros: Default::default(),
            warnings: Vec::new(),
            source_text: String::new(),
            parsed_at: chrono::Utc::now(),
        }
    }

    fn section(original: &Resume, texts_and_enhancements: &[(&str, Option<&str>)]) -> ExperienceSection {
        ExperienceSection {
            experience: original.experience[0].clone(),
            selected_bullets: texts_and_enhancements
                .iter()
                .enumerate()
                .map(|(i, (text, enhanced))| SelectedBullet {
                    bullet: BulletPoint::new(format!("b{i}"), *text, "experience"),
                    relevance_score: 0.9,
                    selection_reason: "test".to_string(),
                    enhanced_text: enhanced.map(|s| s.to_string()),
                    was_enhanced: enhanced.is_some(),
                })
                .collect(),
            total_available: texts_and_enhancements.len(),
        }
    }

    #[test]
    fn identical_bullets_are_unchanged() {
        let original = sample_resume(&["Led Kafka migration to reduce latency"]);
        let sections = vec![section(&original, &[("Led Kafka migration to reduce latency", None)])];

        let comparison = ResumeComparator::new().compare(&original, &sections);
        assert_eq!(comparison.bullet_changes.len(), 1);
        assert_eq!(comparison.bullet_changes[0].change_type, BulletChangeType::Unchanged);
    }

    #[test]
    fn enhanced_bullet_is_detected_as_modified_with_similarity() {
        let original = sample_resume(&["Led Kafka migration"]);
        let sections = vec![section(&original, &[("Led Kafka migration", Some("Led Kafka migration, reducing latency by 30%"))])];

        let comparison = ResumeComparator::new().compare(&original, &sections);
        assert_eq!(comparison.bullet_changes.len(), 1);
        assert_eq!(comparison.bullet_changes[0].change_type, BulletChangeType::Modified);
        assert!(comparison.bullet_changes[0].similarity > 0.5);
    }

    #[test]
    fn removed_and_added_bullets_are_identified() {
        let original = sample_resume(&["Wrote internal documentation for onboarding"]);
        let sections = vec![section(&original, &[("Architected Kubernetes deployment pipeline", None)])];

        let comparison = ResumeComparator::new().compare(&original, &sections);
        let removed = comparison.bullet_changes.iter().any(|c| c.change_type == BulletChangeType::Removed);
        let added = comparison.bullet_changes.iter().any(|c| c.change_type == BulletChangeType::Added);
        assert!(removed);
        assert!(added);
    }

    #[test]
    fn new_keywords_exclude_stopwords_and_short_words() {
        let comparator = ResumeComparator::new();
        let added = comparator.find_new_keywords("Built internal dashboards for the team", "Built internal Kubernetes dashboards for the team using Grafana");
        assert!(added.contains(&"kubernetes".to_string()));
        assert!(added.contains(&"grafana".to_string()));
        assert!(!added.contains(&"for".to_string()));
    }

    #[test]
    fn section_delta_flags_unlisted_experience_as_not_originally_present() {
        let original = sample_resume(&["Wrote internal documentation"]);
        let mut new_section = section(&original, &[("New role bullet", None)]);
        new_section.experience.company = "NewCo".to_string();

        let comparison = ResumeComparator::new().compare(&original, &[new_section]);
        let delta = comparison.section_deltas.iter().find(|d| d.section == "experience:NewCo").unwrap();
        assert!(!delta.original_present);
        assert!(delta.variant_present);
    }
}
