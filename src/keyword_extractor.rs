use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

use crate::models::{Keyword, KeywordCategory};

struct TechPattern {
    name: &'static str,
    regex: Regex,
}

static TECH_PATTERNS: Lazy<Vec<TechPattern>> = Lazy::new(|| {
    let defs: &[(&str, &str)] = &[
        ("kafka", r"(?i)\b(?:kafka|apache\s+kafka|confluent)\b"),
        ("kubernetes", r"(?i)\bk8s\b|\bkubernetes\b"),
        ("docker", r"(?i)\bdocker\b|\bcontainerization\b"),
        ("python", r"(?i)\bpython\b|\bpython3\b"),
        ("java", r"(?i)\bjava\b(?!\s*script)"),
        ("aws", r"(?i)\baws\b|\bamazon\s+web\s+services\b"),
        ("azure", r"(?i)\bazure\b|\bmicrosoft\s+azure\b"),
        ("terraform", r"(?i)\bterraform\b|\biac\b|\binfrastructure\s+as\s+code\b"),
        ("ansible", r"(?i)\bansible\b"),
        ("jenkins", r"(?i)\bjenkins\b|\bci/cd\b"),
        ("git", r"(?i)\bgit\b|\bgithub\b|\bgitlab\b"),
    ];
    defs.iter()
        .map(|(name, pattern)| TechPattern {
            name,
            regex: Regex::new(pattern).unwrap(),
        })
        .collect()
});

static SYNONYMS: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("kafka", vec!["apache kafka", "confluent kafka", "kafka streams"]);
    m.insert("kubernetes", vec!["k8s", "container orchestration"]);
    m.insert("ci/cd", vec!["continuous integration", "continuous deployment", "jenkins", "gitlab ci"]);
    m.insert("monitoring", vec!["observability", "telemetry", "alerting", "grafana", "prometheus"]);
    m.insert("scripting", vec!["automation", "bash", "shell", "python scripting"]);
    m.insert("cloud", vec!["aws", "azure", "gcp", "cloud computing"]);
    m
});

const CERTIFICATIONS: &[&str] = &[
    "aws certified",
    "azure certified",
    "cka",
    "ckad",
    "confluent certified",
    "kafka certification",
    "terraform certified",
    "ansible certified",
];

static DOMAIN_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    let defs: &[(&str, &str)] = &[
        ("cluster management", r"(?i)\bcluster\s+(?:management|administration|scaling)\b"),
        ("high availability", r"(?i)\bhigh\s+availability\b|\bha\b"),
        ("disaster recovery", r"(?i)\bdisaster\s+recovery\b|\bdr\b|\bbackup\b"),
        ("performance tuning", r"(?i)\bperformance\s+(?:tuning|optimization)\b"),
        ("security", r"(?i)\bsecurity\b|\bssl/tls\b|\bencryption\b|\bsasl\b"),
        ("monitoring", r"(?i)\bmonitoring\b|\bobservability\b|\bmetrics\b"),
        ("replication", r"(?i)\breplication\b|\bdata\s+replication\b"),
        ("partitioning", r"(?i)\bpartition(?:ing|s)?\b"),
        ("throughput", r"(?i)\bthroughput\b|\blatency\b"),
    ];
    defs.iter()
        .map(|(name, pattern)| (*name, Regex::new(pattern).unwrap()))
        .collect()
});

const SOFT_SKILLS: &[&str] = &[
    "collaboration",
    "communication",
    "leadership",
    "problem solving",
    "analytical",
    "troubleshooting",
    "teamwork",
    "mentoring",
    "documentation",
    "agile",
    "scrum",
];

static REQUIREMENTS_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)requirements?|qualifications?").unwrap());
static EMPHASIS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:required|must|essential|critical|key)\b").unwrap());

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Mines a ranked keyword table out of a job description.
///
/// Tokenization here is intentionally plain (unicode word-boundary splitting)
/// rather than a full NLP stack — there's no in-ecosystem stand-in for NLTK's
/// tokenizers, and the n-gram stage only needs alphanumeric word runs.
pub struct KeywordExtractor;

impl KeywordExtractor {
    pub fn extract_keywords(job_description: &str, top_n: usize) -> Vec<Keyword> {
        info!("extracting keywords from job description");

        let mut keywords = Vec::new();
        keywords.extend(Self::extract_technical_skills(job_description));
        keywords.extend(Self::extract_certifications(job_description));
        keywords.extend(Self::extract_key_phrases(job_description, 3));
        keywords.extend(Self::extract_domain_terms(job_description));
        keywords.extend(Self::extract_soft_skills(job_description));

        let ranked = Self::deduplicate_and_rank(keywords, top_n);
        info!("extracted {} unique keywords", ranked.len());
        ranked
    }

    fn extract_technical_skills(text: &str) -> Vec<Keyword> {
        let text_lower = text.to_lowercase();
        let mut out = Vec::new();

        for tp in TECH_PATTERNS.iter() {
            for m in tp.regex.find_iter(&text_lower) {
                let importance = Self::calculate_importance(text, m.as_str());
                let start = m.start().saturating_sub(20);
                let end = (m.end() + 20).min(text.len());
                let context = safe_slice(text, start, end);

                out.push(Keyword {
                    text: tp.name.to_string(),
                    category: KeywordCategory::Technical,
                    importance,
                    synonyms: SYNONYMS
                        .get(tp.name)
                        .map(|v| v.iter().map(|s| s.to_string()).collect())
                        .unwrap_or_default(),
                    context: Some(context),
                });
            }
        }

        out
    }

    fn extract_certifications(text: &str) -> Vec<Keyword> {
        let text_lower = text.to_lowercase();
        CERTIFICATIONS
            .iter()
            .filter(|cert| text_lower.contains(*cert))
            .map(|cert| Keyword {
                text: title_case(cert),
                category: KeywordCategory::Certification,
                importance: 0.9,
                synonyms: Vec::new(),
                context: None,
            })
            .collect()
    }

    fn extract_key_phrases(text: &str, max_n: usize) -> Vec<Keyword> {
        let text_lower = text.to_lowercase();
        let mut counts: HashMap<String, u32> = HashMap::new();

        for sentence in split_sentences(&text_lower) {
            let words: Vec<&str> = sentence
                .unicode_words()
                .filter(|w| w.chars().all(|c| c.is_alphanumeric()) && w.chars().count() > 2)
                .collect();

            for n in 2..=max_n {
                if words.len() < n {
                    continue;
                }
                for window in words.windows(n) {
                    let phrase = window.join(" ");
                    *counts.entry(phrase).or_insert(0) += 1;
                }
            }
        }

        let mut sorted: Vec<(String, u32)> = counts.into_iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        sorted
            .into_iter()
            .take(20)
            .filter(|(_, count)| *count >= 2)
            .map(|(phrase, count)| Keyword {
                category: Self::categorize_phrase(&phrase),
                importance: (count as f64 / 5.0).min(1.0),
                synonyms: Vec::new(),
                context: None,
                text: phrase,
            })
            .collect()
    }

    fn extract_domain_terms(text: &str) -> Vec<Keyword> {
        let text_lower = text.to_lowercase();
        DOMAIN_PATTERNS
            .iter()
            .filter(|(_, re)| re.is_match(&text_lower))
            .map(|(term, _)| Keyword {
                text: term.to_string(),
                category: KeywordCategory::Domain,
                importance: 0.8,
                synonyms: Vec::new(),
                context: None,
            })
            .collect()
    }

    fn extract_soft_skills(text: &str) -> Vec<Keyword> {
        let text_lower = text.to_lowercase();
        SOFT_SKILLS
            .iter()
            .filter(|skill| text_lower.contains(*skill))
            .map(|skill| Keyword {
                text: title_case(skill),
                category: KeywordCategory::SoftSkill,
                importance: 0.5,
                synonyms: Vec::new(),
                context: None,
            })
            .collect()
    }

    /// Base 0.5, +0.3 if mentioned after a requirements/qualifications header,
    /// +0.2 if in the first 500 characters, +0.2 near an emphasis word (within
    /// 50 chars), +0.1 per occurrence capped at +0.3, final result capped at 1.0.
    fn calculate_importance(full_text: &str, keyword: &str) -> f64 {
        let text_lower = full_text.to_lowercase();
        let keyword_lower = keyword.to_lowercase();
        let mut importance = 0.5;

        if let Some(header_pos) = REQUIREMENTS_HEADER.find(&text_lower) {
            if text_lower[header_pos.end()..].contains(&keyword_lower) {
                importance += 0.3;
            }
        }

        let first_para_len = text_lower.len().min(500);
        if text_lower[..first_para_len].contains(&keyword_lower) {
            importance += 0.2;
        }

        for m in EMPHASIS_PATTERN.find_iter(&text_lower) {
            let window_end = (m.end() + 50).min(text_lower.len());
            if text_lower[m.end()..window_end].contains(&keyword_lower) {
                importance += 0.2;
                break;
            }
        }

        let frequency = text_lower.matches(&keyword_lower).count();
        importance += (frequency as f64 * 0.1).min(0.3);

        importance.min(1.0)
    }

    fn categorize_phrase(phrase: &str) -> KeywordCategory {
        let phrase_lower = phrase.to_lowercase();
        let tech_indicators = ["system", "cluster", "server", "data", "api", "infrastructure"];
        if tech_indicators.iter().any(|ind| phrase_lower.contains(ind)) {
            return KeywordCategory::Technical;
        }

        let exp_indicators = ["experience", "years", "background", "expertise"];
        if exp_indicators.iter().any(|ind| phrase_lower.contains(ind)) {
            return KeywordCategory::Experience;
        }

        KeywordCategory::Domain
    }

    fn deduplicate_and_rank(keywords: Vec<Keyword>, top_n: usize) -> Vec<Keyword> {
        let mut unique: HashMap<String, Keyword> = HashMap::new();

        for kw in keywords {
            let key = kw.text.to_lowercase().trim().to_string();
            match unique.get(&key) {
                Some(existing) if existing.importance >= kw.importance => {}
                _ => {
                    unique.insert(key, kw);
                }
            }
        }

        let mut sorted: Vec<Keyword> = unique.into_values().collect();
        sorted.sort_by(|a, b| {
            b.category
                .priority()
                .cmp(&a.category.priority())
                .then(b.importance.partial_cmp(&a.importance).unwrap())
        });

        sorted.truncate(top_n);
        sorted
    }
}

fn safe_slice(text: &str, start: usize, end: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let start = start.min(chars.len());
    let end = end.min(chars.len());
    chars[start..end].iter().collect()
}

fn split_sentences(text: &str) -> Vec<&str> {
    text.split(|c| matches!(c, '.' | '!' | '?' | '\n'))
        .filter(|s| !s.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_JOB_DESCRIPTION: &str = "We need a Senior Platform Engineer with strong \
        Kubernetes and Docker experience. Requirements: must have hands-on Kafka cluster \
        management and AWS certified background. The ideal candidate has experience with \
        CI/CD pipelines, monitoring, and cross-team collaboration. Required: Terraform \
        infrastructure as code experience.";

    #[test]
    fn extracts_technical_skills() {
        let keywords = KeywordExtractor::extract_keywords(SAMPLE_JOB_DESCRIPTION, 50);
        assert!(keywords.iter().any(|k| k.text == "kubernetes"));
        assert!(keywords.iter().any(|k| k.text == "kafka"));
    }

    #[test]
    fn extracts_certifications() {
        let keywords = KeywordExtractor::extract_keywords(SAMPLE_JOB_DESCRIPTION, 50);
        assert!(keywords.iter().any(|k| k.category == KeywordCategory::Certification));
    }

    #[test]
    fn extracts_domain_terms() {
        let keywords = KeywordExtractor::extract_keywords(SAMPLE_JOB_DESCRIPTION, 50);
        assert!(keywords.iter().any(|k| k.text == "cluster management"));
    }

    #[test]
    fn respects_top_n_cap() {
        let keywords = KeywordExtractor::extract_keywords(SAMPLE_JOB_DESCRIPTION, 3);
        assert!(keywords.len() <= 3);
    }

    #[test]
    fn importance_capped_at_one() {
        let importance = KeywordExtractor::calculate_importance(
            "required required required kafka kafka kafka kafka",
            "kafka",
        );
        assert!(importance <= 1.0);
    }

    #[test]
    fn deduplicates_case_insensitively() {
        let keywords = vec![
            Keyword {
                text: "Kafka".to_string(),
                category: KeywordCategory::Technical,
                importance: 0.5,
                synonyms: vec![],
                context: None,
            },
            Keyword {
                text: "kafka".to_string(),
                category: KeywordCategory::Technical,
                importance: 0.9,
                synonyms: vec![],
                context: None,
            },
        ];
        let ranked = KeywordExtractor::deduplicate_and_rank(keywords, 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].importance, 0.9);
    }
}
