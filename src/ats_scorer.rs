use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::keyword_extractor::KeywordExtractor;
use crate::matcher::KeywordMatcher;
use crate::models::{ATSScore, KeywordCategory, KeywordMatch, MatchType, Resume, SectionScore};

const WEIGHT_KEYWORD: f64 = 0.40;
const WEIGHT_EXPERIENCE: f64 = 0.20;
const WEIGHT_SKILLS: f64 = 0.20;
const WEIGHT_EDUCATION: f64 = 0.10;
const WEIGHT_FORMAT: f64 = 0.10;

static REQUIRED_YEARS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\+?\s*years?").unwrap());
const TITLE_KEYWORDS: &[&str] = &["kafka", "administrator", "devops", "platform", "engineer", "sre"];

pub struct AtsScorer {
    matcher: KeywordMatcher,
}

impl AtsScorer {
    pub fn new(fuzzy_threshold: f64) -> Self {
        Self {
            matcher: KeywordMatcher::new(fuzzy_threshold),
        }
    }

    pub fn score_resume(&self, resume: &Resume, job_description: &str, job_title: &str) -> ATSScore {
        info!("calculating ATS score");

        let keywords = KeywordExtractor::extract_keywords(job_description, 50);
        let matches = self.matcher.match_keywords(resume, &keywords);

        let required_years = REQUIRED_YEARS_PATTERN
            .captures(job_description)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok());

        let keyword_score = Self::calculate_keyword_score(&matches);
        let experience_score = Self::calculate_experience_score(resume, job_title, required_years);
        let skills_score = Self::calculate_skills_score(resume, &matches);
        let education_score = Self::calculate_education_score(resume);
        let format_score = Self::calculate_format_score(resume);

        let overall = keyword_score * WEIGHT_KEYWORD
            + experience_score * WEIGHT_EXPERIENCE
            + skills_score * WEIGHT_SKILLS
            + education_score * WEIGHT_EDUCATION
            + format_score * WEIGHT_FORMAT;

        let section_scores = Self::calculate_section_scores(resume, &matches);

        let matched_keywords: Vec<KeywordMatch> = matches
            .iter()
            .filter(|m| m.match_type != MatchType::Missing)
            .cloned()
            .collect();
        let missing_keywords = matches
            .iter()
            .filter(|m| m.match_type == MatchType::Missing)
            .map(|m| m.keyword.clone())
            .collect();

        let (critical_gaps, improvements, enhancements) = Self::generate_recommendations(&matches, resume);

        info!("ATS score: {:.1}/100", overall);

        ATSScore {
            overall_score: overall,
            keyword_score,
            experience_score,
            skills_score,
            education_score,
            format_score,
            matched_keywords,
            missing_keywords,
            section_scores,
            critical_gaps,
            improvements,
            enhancements,
        }
    }

    /// Importance-weighted average of per-match scores, minus 5 per missing
    /// critical (importance ≥ 0.8) keyword, clamped to [0, 100].
    fn calculate_keyword_score(matches: &[KeywordMatch]) -> f64 {
        if matches.is_empty() {
            return 0.0;
        }

        let mut total_weighted = 0.0;
        let mut total_weight = 0.0;
        for m in matches {
            let weight = m.keyword.importance;
            total_weighted += m.score() * weight;
            total_weight += weight;
        }

        if total_weight == 0.0 {
            return 0.0;
        }

        let raw_score = (total_weighted / total_weight) * 100.0;

        let missing_critical = matches
            .iter()
            .filter(|m| m.match_type == MatchType::Missing && m.keyword.importance >= 0.8)
            .count();
        let penalty = missing_critical as f64 * 5.0;

        (raw_score - penalty).clamp(0.0, 100.0)
    }

    fn calculate_experience_score(resume: &Resume, job_title: &str, required_years: Option<u32>) -> f64 {
        let mut score = 0.0;

        match required_years {
            Some(years) if years > 0 => {
                let total_years = resume.experience.len() as f64;
                if total_years >= years as f64 {
                    score += 40.0;
                } else {
                    score += 40.0 * (total_years / years as f64);
                }
            }
            _ => {
                if !resume.experience.is_empty() {
                    score += 30.0;
                }
            }
        }

        if !resume.experience.is_empty() && !job_title.is_empty() {
            let jd_title_lower = job_title.to_lowercase();
            let mut matched = false;
            for exp in &resume.experience {
                let exp_title_lower = exp.title.to_lowercase();
                let overlap = TITLE_KEYWORDS
                    .iter()
                    .filter(|kw| exp_title_lower.contains(**kw) && jd_title_lower.contains(**kw))
                    .count();
                if overlap > 0 {
                    score += (overlap as f64 * 10.0).min(30.0);
                    matched = true;
                    break;
                }
            }
            if !matched && !resume.experience.is_empty() {
                // no overlap found — no credit beyond the years component
            }
        } else if !resume.experience.is_empty() {
            score += 15.0;
        }

        if let Some(recent) = resume.experience.first() {
            if recent.is_current
                || recent
                    .end_date
                    .as_deref()
                    .map(|d| d.to_lowercase().contains("present"))
                    .unwrap_or(false)
            {
                score += 15.0;
            } else {
                score += 10.0;
            }
        }

        if resume.experience.len() >= 2 {
            score += 15.0;
        } else if resume.experience.len() == 1 {
            score += 10.0;
        }

        score.min(100.0)
    }

    fn calculate_skills_score(resume: &Resume, matches: &[KeywordMatch]) -> f64 {
        let mut score = 0.0;

        let all_tech: Vec<&KeywordMatch> = matches
            .iter()
            .filter(|m| m.keyword.category == KeywordCategory::Technical)
            .collect();
        let tech_matches = all_tech
            .iter()
            .filter(|m| m.match_type != MatchType::Missing)
            .count();
        if !all_tech.is_empty() {
            score += (tech_matches as f64 / all_tech.len() as f64) * 50.0;
        }

        let all_tools: Vec<&KeywordMatch> = matches
            .iter()
            .filter(|m| m.keyword.category == KeywordCategory::Tool)
            .collect();
        let tool_matches = all_tools
            .iter()
            .filter(|m| m.match_type != MatchType::Missing)
            .count();
        if !all_tools.is_empty() {
            score += (tool_matches as f64 / all_tools.len() as f64) * 25.0;
        }

        let cert_matched = matches
            .iter()
            .any(|m| m.keyword.category == KeywordCategory::Certification && m.match_type != MatchType::Missing);
        if cert_matched {
            score += 15.0;
        } else if !resume.certifications.is_empty() {
            score += 10.0;
        }

        let total_skills =
            resume.skills.technical.len() + resume.skills.tools.len() + resume.skills.languages.len();
        if total_skills >= 15 {
            score += 10.0;
        } else if total_skills >= 10 {
            score += 7.0;
        } else if total_skills >= 5 {
            score += 5.0;
        }

        score.min(100.0)
    }

    fn calculate_education_score(resume: &Resume) -> f64 {
        if resume.education.is_empty() {
            return 30.0;
        }

        let mut score = 50.0;

        for edu in &resume.education {
            let degree_lower = edu.degree.to_lowercase();
            if ["phd", "doctorate", "doctor"].iter().any(|kw| degree_lower.contains(kw)) {
                score += 30.0;
                break;
            } else if ["master", "ms", "msc", "mba"].iter().any(|kw| degree_lower.contains(kw)) {
                score += 25.0;
                break;
            } else if ["bachelor", "bs", "ba", "bsc"].iter().any(|kw| degree_lower.contains(kw)) {
                score += 20.0;
                break;
            } else if degree_lower.contains("diploma") {
                score += 15.0;
                break;
            }
        }

        let relevant_fields = ["computer", "software", "information", "technology", "engineering", "science"];
        for edu in &resume.education {
            let degree_lower = edu.degree.to_lowercase();
            if relevant_fields.iter().any(|f| degree_lower.contains(f)) {
                score += 20.0;
                break;
            }
        }

        score.min(100.0)
    }

    fn calculate_format_score(resume: &Resume) -> f64 {
        let mut score = 20.0;

        let mut sections_present = 0;
        if resume.personal.name.is_some() {
            sections_present += 1;
        }
        if resume.personal.email.is_some() {
            sections_present += 1;
        }
        if !resume.experience.is_empty() {
            sections_present += 1;
        }
        if !resume.education.is_empty() {
            sections_present += 1;
        }
        if !resume.skills.technical.is_empty() || !resume.skills.tools.is_empty() {
            sections_present += 1;
        }
        score += (sections_present as f64 / 5.0) * 40.0;

        let total_bullets = resume.all_bullets.len();
        if (10..=25).contains(&total_bullets) {
            score += 20.0;
        } else if (5..10).contains(&total_bullets) || (26..=30).contains(&total_bullets) {
            score += 15.0;
        } else {
            score += 10.0;
        }

        let mut contact_score = 0.0;
        if resume.personal.email.is_some() {
            contact_score += 5.0;
        }
        if resume.personal.phone.is_some() {
            contact_score += 5.0;
        }
        if resume.personal.linkedin.is_some() {
            contact_score += 5.0;
        }
        if resume.personal.github.is_some() {
            contact_score += 5.0;
        }
        score += contact_score;

        score.min(100.0)
    }

    fn calculate_section_scores(resume: &Resume, matches: &[KeywordMatch]) -> HashMap<String, SectionScore> {
        let mut section_scores = HashMap::new();

        let sections: Vec<(&str, String)> = vec![
            ("summary", resume.summary.clone().unwrap_or_default()),
            ("experience", Self::experience_text(resume)),
            ("skills", Self::skills_text(resume)),
            ("education", Self::education_text(resume)),
        ];

        let total_section_keywords = matches
            .iter()
            .filter(|m| {
                matches!(
                    m.keyword.category,
                    KeywordCategory::Technical | KeywordCategory::Domain | KeywordCategory::Tool
                )
            })
            .count() as u32;

        for (section_name, section_text) in sections {
            if section_text.is_empty() {
                continue;
            }

            let section_matches: Vec<&KeywordMatch> = matches
                .iter()
                .filter(|m| m.locations.iter().any(|l| l == section_name))
                .collect();

            let word_count = section_text.split_whitespace().count();
            let match_rate = if total_section_keywords > 0 {
                section_matches.len() as f64 / total_section_keywords as f64
            } else {
                0.0
            };
            let density = if word_count > 0 {
                (section_matches.len() as f64 / word_count as f64) * 100.0
            } else {
                0.0
            };
            let quality = if section_matches.is_empty() {
                0.0
            } else {
                section_matches.iter().map(|m| m.score()).sum::<f64>() / section_matches.len() as f64
            };

            let mut suggestions = Vec::new();
            if match_rate < 0.3 {
                suggestions.push(format!("Add more relevant keywords to {}", section_name));
            }
            if density < 2.0 && (section_name == "experience" || section_name == "skills") {
                suggestions.push(format!("Increase keyword density in {}", section_name));
            }

            section_scores.insert(
                section_name.to_string(),
                SectionScore {
                    section_name: section_name.to_string(),
                    matches: section_matches.len() as u32,
                    total: total_section_keywords,
                    match_rate,
                    density,
                    quality_score: quality * 100.0,
                    suggestions,
                },
            );
        }

        section_scores
    }

    fn experience_text(resume: &Resume) -> String {
        let mut parts = Vec::new();
        for exp in &resume.experience {
            parts.push(exp.title.clone());
            parts.push(exp.company.clone());
            for bullet in &exp.bullets {
                parts.push(bullet.text.clone());
            }
        }
        parts.into_iter().filter(|p| !p.is_empty()).collect::<Vec<_>>().join(" ")
    }

    fn skills_text(resume: &Resume) -> String {
        let mut parts = resume.skills.technical.clone();
        parts.extend(resume.skills.tools.clone());
        parts.extend(resume.skills.languages.clone());
        parts.into_iter().filter(|p| !p.is_empty()).collect::<Vec<_>>().join(" ")
    }

    fn education_text(resume: &Resume) -> String {
        let mut parts = Vec::new();
        for edu in &resume.education {
            parts.push(edu.degree.clone());
            parts.push(edu.institution.clone());
        }
        parts.into_iter().filter(|p| !p.is_empty()).collect::<Vec<_>>().join(" ")
    }

    fn generate_recommendations(
        matches: &[KeywordMatch],
        resume: &Resume,
    ) -> (Vec<String>, Vec<String>, Vec<String>) {
        let mut critical_gaps = Vec::new();
        let mut improvements = Vec::new();
        let mut enhancements = Vec::new();

        let critical_missing: Vec<&KeywordMatch> = matches
            .iter()
            .filter(|m| m.match_type == MatchType::Missing && m.keyword.importance >= 0.8)
            .collect();
        for m in critical_missing.iter().take(5) {
            critical_gaps.push(format!(
                "Add '{}' - appears {} times in JD",
                m.keyword.text,
                (m.keyword.importance * 10.0) as u32
            ));
        }

        let weak_matches: Vec<&KeywordMatch> = matches
            .iter()
            .filter(|m| {
                matches!(m.match_type, MatchType::Partial | MatchType::Stemmed) && m.keyword.importance >= 0.6
            })
            .collect();
        for m in weak_matches.iter().take(5) {
            improvements.push(format!(
                "Strengthen '{}' - currently matched as '{}'",
                m.keyword.text, m.matched_text
            ));
        }

        let low_freq: Vec<&KeywordMatch> = matches
            .iter()
            .filter(|m| {
                matches!(m.match_type, MatchType::Exact | MatchType::Synonym)
                    && m.frequency == 1
                    && m.keyword.importance >= 0.7
            })
            .collect();
        for m in low_freq.iter().take(3) {
            improvements.push(format!(
                "Use '{}' more frequently - currently only appears once",
                m.keyword.text
            ));
        }

        let nice_to_have: Vec<&KeywordMatch> = matches
            .iter()
            .filter(|m| m.match_type == MatchType::Missing && m.keyword.importance >= 0.4 && m.keyword.importance < 0.6)
            .collect();
        for m in nice_to_have.iter().take(5) {
            enhancements.push(format!("Consider adding '{}' to boost relevance", m.keyword.text));
        }

        if resume.summary.is_none() {
            improvements.push("Add a professional summary highlighting key qualifications".to_string());
        }
        if resume.all_bullets.len() < 10 {
            improvements.push("Add more bullet points with quantified achievements".to_string());
        }
        if resume.certifications.is_empty() {
            enhancements.push("Add relevant certifications if you have any".to_string());
        }

        (critical_gaps, improvements, enhancements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExperienceEntry, PersonalInfo, SkillsSection};
    use std::collections::HashMap as StdHashMap;

    const SAMPLE_JOB_DESCRIPTION: &str = "Requirements: 3+ years experience required with Kafka \
        cluster administration. Must have Kubernetes and AWS certified background.";

    fn sample_resume() -> Resume {
        Resume {
            personal: PersonalInfo {
                name: Some("Jordan Rivera".to_string()),
                email: Some("jordan@example.com".to_string()),
                ..Default::default()
            },
            summary: Some("Platform engineer with distributed systems focus".to_string()),
            experience: vec![ExperienceEntry {
                title: "Platform Engineer".to_string(),
                company: "Acme Corp".to_string(),
                location: None,
                start_date: Some("Jan 2021".to_string()),
                end_date: Some("Present".to_string()),
                bullets: (0..12)
                    .map(|i| crate::models::BulletPoint::new(
                        format!("b{i}"),
                        "Managed Kafka cluster and improved throughput by 30%",
                        "experience",
                    ))
                    .collect(),
                is_current: true,
                line_number: None,
            }],
            education: vec![crate::models::EducationEntry {
                degree: "B.S. Computer Science".to_string(),
                institution: "State University".to_string(),
                location: None,
                graduation_date: Some("May 2017".to_string()),
                gpa: None,
                honors: None,
                line_number: None,
            }],
            skills: SkillsSection {
                technical: vec!["Kafka".to_string(), "Kubernetes".to_string()],
                ..Default::default()
            },
            projects: Vec::new(),
            certifications: Vec::new(),
            awards: Vec::new(),
            all_bullets: Vec::new(),
            macros: StdHashMap::new(),
            warnings: Vec::new(),
            source_text: String::new(),
            parsed_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn overall_equals_weighted_sum_of_components() {
        let scorer = AtsScorer::new(0.85);
        let resume = sample_resume();
        let score = scorer.score_resume(&resume, SAMPLE_JOB_DESCRIPTION, "Platform Engineer");

        let expected = score.keyword_score * WEIGHT_KEYWORD
            + score.experience_score * WEIGHT_EXPERIENCE
            + score.skills_score * WEIGHT_SKILLS
            + score.education_score * WEIGHT_EDUCATION
            + score.format_score * WEIGHT_FORMAT;

        assert!((score.overall_score - expected).abs() < 0.05);
    }

    #[test]
    fn all_components_within_zero_to_hundred() {
        let scorer = AtsScorer::new(0.85);
        let resume = sample_resume();
        let score = scorer.score_resume(&resume, SAMPLE_JOB_DESCRIPTION, "Platform Engineer");

        for component in [
            score.keyword_score,
            score.experience_score,
            score.skills_score,
            score.education_score,
            score.format_score,
        ] {
            assert!((0.0..=100.0).contains(&component));
        }
    }

    #[test]
    fn zero_keyword_description_yields_zero_keyword_score() {
        let score = AtsScorer::calculate_keyword_score(&[]);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn missing_critical_keyword_produces_critical_gap() {
        let scorer = AtsScorer::new(0.85);
        let mut resume = sample_resume();
        resume.skills.technical.clear();
        resume.experience[0].bullets.clear();

        let score = scorer.score_resume(&resume, "Required: Kafka. Required: Kafka.", "Platform Engineer");
        assert!(score.critical_gaps.iter().any(|g| g.contains("kafka")));
    }
}
