use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{HashMap, HashSet};

use crate::models::{Keyword, KeywordMatch, MatchType, Resume};

const ACTION_VERBS: &[&str] = &[
    "managed", "implemented", "developed", "created", "designed", "optimized", "improved",
    "configured", "automated", "deployed",
];
const IMPACT_WORDS: &[&str] = &["increased", "reduced", "improved", "achieved", "delivered"];

static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").unwrap());
static QUANTIFICATION_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+[%+]?").unwrap());

/// Ratcliff/Obershelp-style similarity ratio: 2 * matched_chars / total_chars,
/// recursively finding the longest common substring and matching the remaining
/// left/right halves. There's no `difflib.SequenceMatcher` equivalent in the
/// ecosystem, so this is hand-rolled to the same algorithm.
pub(crate) fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matching_chars(&a, &b);
    (2.0 * matched as f64) / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let (len, a_start, b_start) = longest_common_substring(a, b);
    if len == 0 {
        return 0;
    }

    let left = matching_chars(&a[..a_start], &b[..b_start]);
    let right = matching_chars(&a[a_start + len..], &b[b_start + len..]);
    len + left + right
}

/// Returns `(length, a_start, b_start)` of the longest common contiguous run.
fn longest_common_substring(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut dp = vec![0usize; b.len() + 1];

    for i in 0..a.len() {
        let mut prev_diag = 0;
        for j in 0..b.len() {
            let temp = dp[j + 1];
            if a[i] == b[j] {
                dp[j + 1] = prev_diag + 1;
                if dp[j + 1] > best.0 {
                    best = (dp[j + 1], i + 1 - dp[j + 1], j + 1 - dp[j + 1]);
                }
            } else {
                dp[j + 1] = 0;
            }
            prev_diag = temp;
        }
    }

    best
}

pub struct KeywordMatcher {
    fuzzy_threshold: f64,
    stemmer: Stemmer,
}

impl KeywordMatcher {
    pub fn new(fuzzy_threshold: f64) -> Self {
        Self {
            fuzzy_threshold,
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    pub fn match_keywords(&self, resume: &Resume, keywords: &[Keyword]) -> Vec<KeywordMatch> {
        info!("matching {} keywords against résumé", keywords.len());

        let resume_text = self.build_resume_text(resume);
        let section_texts = self.build_section_texts(resume);

        let matches: Vec<KeywordMatch> = keywords
            .iter()
            .map(|kw| self.match_single_keyword(kw, &resume_text, &section_texts))
            .collect();

        let found = matches.iter().filter(|m| m.match_type != MatchType::Missing).count();
        info!("found {} matches", found);
        matches
    }

    fn build_resume_text(&self, resume: &Resume) -> String {
        let mut parts: Vec<String> = Vec::new();

        if let Some(name) = &resume.personal.name {
            parts.push(name.clone());
        }
        if let Some(summary) = &resume.summary {
            parts.push(summary.clone());
        }
        for exp in &resume.experience {
            parts.push(exp.title.clone());
            parts.push(exp.company.clone());
            for bullet in &exp.bullets {
                parts.push(bullet.text.clone());
            }
        }
        for edu in &resume.education {
            parts.push(edu.degree.clone());
            parts.push(edu.institution.clone());
        }
        parts.extend(resume.skills.technical.clone());
        parts.extend(resume.skills.tools.clone());
        parts.extend(resume.skills.languages.clone());
        parts.extend(resume.certifications.clone());

        parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    fn build_section_texts(&self, resume: &Resume) -> HashMap<String, String> {
        let mut sections = HashMap::new();

        if let Some(summary) = &resume.summary {
            sections.insert("summary".to_string(), summary.to_lowercase());
        }

        let mut exp_parts = Vec::new();
        for exp in &resume.experience {
            exp_parts.push(exp.title.clone());
            exp_parts.push(exp.company.clone());
            for bullet in &exp.bullets {
                exp_parts.push(bullet.text.clone());
            }
        }
        sections.insert(
            "experience".to_string(),
            exp_parts.join(" ").to_lowercase(),
        );

        let mut skill_parts = resume.skills.technical.clone();
        skill_parts.extend(resume.skills.tools.clone());
        sections.insert("skills".to_string(), skill_parts.join(" ").to_lowercase());

        let mut edu_parts = Vec::new();
        for edu in &resume.education {
            edu_parts.push(edu.degree.clone());
            edu_parts.push(edu.institution.clone());
        }
        sections.insert(
            "education".to_string(),
            edu_parts.join(" ").to_lowercase(),
        );

        sections
    }

    fn match_single_keyword(
        &self,
        keyword: &Keyword,
        full_text: &str,
        section_texts: &HashMap<String, String>,
    ) -> KeywordMatch {
        if let Some(m) = self.exact_match(keyword, full_text, section_texts) {
            return m;
        }
        if let Some(m) = self.synonym_match(keyword, full_text, section_texts) {
            return m;
        }
        if let Some(m) = self.stemmed_match(keyword, full_text, section_texts) {
            return m;
        }
        if let Some(m) = self.fuzzy_match(keyword, full_text, section_texts) {
            return m;
        }

        KeywordMatch {
            keyword: keyword.clone(),
            match_type: MatchType::Missing,
            matched_text: String::new(),
            locations: Vec::new(),
            frequency: 0,
            context_score: 0.0,
        }
    }

    fn exact_match(
        &self,
        keyword: &Keyword,
        full_text: &str,
        section_texts: &HashMap<String, String>,
    ) -> Option<KeywordMatch> {
        let keyword_lower = keyword.text.to_lowercase();
        let pattern = word_boundary_pattern(&keyword_lower);

        let frequency = pattern.find_iter(full_text).count();
        if frequency == 0 {
            return None;
        }

        let locations = locations_matching(&pattern, section_texts);
        let context_score = self.calculate_context_score(keyword, full_text);

        Some(KeywordMatch {
            keyword: keyword.clone(),
            match_type: MatchType::Exact,
            matched_text: keyword.text.clone(),
            locations,
            frequency: frequency as u32,
            context_score,
        })
    }

    fn synonym_match(
        &self,
        keyword: &Keyword,
        full_text: &str,
        section_texts: &HashMap<String, String>,
    ) -> Option<KeywordMatch> {
        for synonym in &keyword.synonyms {
            let synonym_lower = synonym.to_lowercase();
            let pattern = word_boundary_pattern(&synonym_lower);
            let frequency = pattern.find_iter(full_text).count();
            if frequency == 0 {
                continue;
            }

            let locations = locations_matching(&pattern, section_texts);
            let context_score = self.calculate_context_score(keyword, full_text);

            return Some(KeywordMatch {
                keyword: keyword.clone(),
                match_type: MatchType::Synonym,
                matched_text: synonym.clone(),
                locations,
                frequency: frequency as u32,
                context_score,
            });
        }
        None
    }

    fn stemmed_match(
        &self,
        keyword: &Keyword,
        full_text: &str,
        section_texts: &HashMap<String, String>,
    ) -> Option<KeywordMatch> {
        let keyword_stem = self.stemmer.stem(&keyword.text.to_lowercase()).to_string();

        let mut matched_words: HashMap<String, u32> = HashMap::new();
        for word in WORD_PATTERN.find_iter(full_text) {
            let w = word.as_str();
            if self.stemmer.stem(&w.to_lowercase()) == keyword_stem {
                *matched_words.entry(w.to_string()).or_insert(0) += 1;
            }
        }

        if matched_words.is_empty() {
            return None;
        }

        let matched_text = matched_words
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(word, _)| word.clone())
            .unwrap();
        let frequency: u32 = matched_words.values().sum();

        let locations: Vec<String> = section_texts
            .iter()
            .filter(|(_, text)| text.contains(&matched_text.to_lowercase()))
            .map(|(section, _)| section.clone())
            .collect();

        Some(KeywordMatch {
            keyword: keyword.clone(),
            match_type: MatchType::Stemmed,
            matched_text,
            locations,
            frequency,
            context_score: 0.0,
        })
    }

    fn fuzzy_match(
        &self,
        keyword: &Keyword,
        full_text: &str,
        section_texts: &HashMap<String, String>,
    ) -> Option<KeywordMatch> {
        let keyword_lower = keyword.text.to_lowercase();
        let mut seen: HashSet<String> = HashSet::new();
        let mut best_match: Option<String> = None;
        let mut best_ratio = 0.0;

        for word in WORD_PATTERN.find_iter(full_text) {
            let w = word.as_str().to_lowercase();
            if !seen.insert(w.clone()) {
                continue;
            }
            let ratio = similarity_ratio(&keyword_lower, &w);
            if ratio > best_ratio && ratio >= self.fuzzy_threshold {
                best_ratio = ratio;
                best_match = Some(word.as_str().to_string());
            }
        }

        let best_match = best_match?;
        let frequency = full_text.to_lowercase().matches(&best_match.to_lowercase()).count() as u32;

        let locations: Vec<String> = section_texts
            .iter()
            .filter(|(_, text)| text.contains(&best_match.to_lowercase()))
            .map(|(section, _)| section.clone())
            .collect();

        Some(KeywordMatch {
            keyword: keyword.clone(),
            match_type: MatchType::Partial,
            matched_text: best_match,
            locations,
            frequency,
            context_score: 0.0,
        })
    }

    /// +0.3 for a nearby action verb, +0.3 for quantification, +0.2 for an impact
    /// word, each occurrence capped at 0.8, overall result capped at 1.0.
    fn calculate_context_score(&self, keyword: &Keyword, text: &str) -> f64 {
        let keyword_lower = keyword.text.to_lowercase();
        let pattern = word_boundary_pattern(&keyword_lower);
        let text_lower = text.to_lowercase();

        let mut score = 0.0;
        for m in pattern.find_iter(text) {
            let start = m.start().saturating_sub(50);
            let end = (m.end() + 50).min(text.len());
            let context = safe_slice_lower(&text_lower, start, end);

            let mut occurrence_score = 0.0;
            if ACTION_VERBS.iter().any(|v| context.contains(v)) {
                occurrence_score += 0.3;
            }
            if QUANTIFICATION_PATTERN.is_match(&context) {
                occurrence_score += 0.3;
            }
            if IMPACT_WORDS.iter().any(|w| context.contains(w)) {
                occurrence_score += 0.2;
            }
            score += occurrence_score.min(0.8);
        }

        score.min(1.0)
    }
}

fn word_boundary_pattern(word: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word))).unwrap()
}

fn locations_matching(pattern: &Regex, section_texts: &HashMap<String, String>) -> Vec<String> {
    section_texts
        .iter()
        .filter(|(_, text)| pattern.is_match(text))
        .map(|(section, _)| section.clone())
        .collect()
}

fn safe_slice_lower(text_lower: &str, start: usize, end: usize) -> String {
    let chars: Vec<char> = text_lower.chars().collect();
    let start = start.min(chars.len());
    let end = end.min(chars.len());
    chars[start..end].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{KeywordCategory, PersonalInfo, SkillsSection};

    fn sample_resume() -> Resume {
        Resume {
            personal: PersonalInfo {
                name: Some("Jordan Rivera".to_string()),
                ..Default::default()
            },
            summary: Some("Platform engineer focused on distributed systems".to_string()),
            experience: vec![crate::models::ExperienceEntry {
                title: "Senior Engineer".to_string(),
                company: "Acme Corp".to_string(),
                location: None,
                start_date: None,
                end_date: None,
                bullets: vec![crate::models::BulletPoint::new(
                    "b1",
                    "Managed a Kubernetes cluster and improved throughput by 40%",
                    "experience",
                )],
                is_current: true,
                line_number: None,
            }],
            education: Vec::new(),
            skills: SkillsSection {
                technical: vec!["Python".to_string(), "Docker".to_string()],
                ..Default::default()
            },
            projects: Vec::new(),
            certifications: Vec::new(),
            awards: Vec::new(),
            all_bullets: Vec::new(),
            macros: HashMap::new(),
            warnings: Vec::new(),
            source_text: String::new(),
            parsed_at: chrono::Utc::now(),
        }
    }

    fn kw(text: &str, synonyms: Vec<&str>) -> Keyword {
        Keyword {
            text: text.to_string(),
            category: KeywordCategory::Technical,
            importance: 0.8,
            synonyms: synonyms.into_iter().map(String::from).collect(),
            context: None,
        }
    }

    #[test]
    fn exact_match_found_with_context_score() {
        let matcher = KeywordMatcher::new(0.85);
        let resume = sample_resume();
        let matches = matcher.match_keywords(&resume, &[kw("kubernetes", vec![])]);
        assert_eq!(matches[0].match_type, MatchType::Exact);
        assert!(matches[0].context_score > 0.0);
    }

    #[test]
    fn synonym_match_falls_back_when_no_exact() {
        let matcher = KeywordMatcher::new(0.85);
        let resume = sample_resume();
        let matches = matcher.match_keywords(&resume, &[kw("container orchestration", vec!["kubernetes"])]);
        assert_eq!(matches[0].match_type, MatchType::Synonym);
    }

    #[test]
    fn stemmed_match_finds_plural_forms() {
        let matcher = KeywordMatcher::new(0.85);
        let resume = sample_resume();
        let matches = matcher.match_keywords(&resume, &[kw("clusters", vec![])]);
        assert_eq!(matches[0].match_type, MatchType::Stemmed);
    }

    #[test]
    fn missing_keyword_reports_missing_with_zero_frequency() {
        let matcher = KeywordMatcher::new(0.85);
        let resume = sample_resume();
        let matches = matcher.match_keywords(&resume, &[kw("blockchain", vec![])]);
        assert_eq!(matches[0].match_type, MatchType::Missing);
        assert_eq!(matches[0].frequency, 0);
    }

    #[test]
    fn similarity_ratio_identical_strings_is_one() {
        assert_eq!(similarity_ratio("kafka", "kafka"), 1.0);
    }

    #[test]
    fn similarity_ratio_completely_different_is_low() {
        assert!(similarity_ratio("kafka", "zzzzz") < 0.3);
    }
}
