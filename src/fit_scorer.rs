use chrono::Datelike;
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::keyword_extractor::KeywordExtractor;
use crate::matcher::KeywordMatcher;
use crate::models::{
    CareerTrajectory, CultureIndicators, ExperienceEntry, ExperienceMatch, FitLevel, GapSeverity,
    JobFitScore, Keyword, KeywordCategory, KeywordMatch, MatchType, Resume, SkillGap, SkillMatch,
    SkillMatchKind, TrajectoryTrend,
};

const WEIGHT_SKILL: f64 = 0.35;
const WEIGHT_EXPERIENCE: f64 = 0.30;
const WEIGHT_TRAJECTORY: f64 = 0.15;
const WEIGHT_CULTURE: f64 = 0.10;
const WEIGHT_EDUCATION: f64 = 0.10;

static YEARS_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\+?\s*years?").unwrap());
static YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"20\d{2}|19\d{2}").unwrap());
static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").unwrap());

const TITLE_STOPWORDS: &[&str] = &["senior", "junior", "lead", "staff", "principal", "engineer", "developer"];

const DOMAIN_KEYWORDS: &[(&str, &[&str])] = &[
    ("data streaming", &["kafka", "kinesis", "pubsub", "streaming", "real-time"]),
    ("devops", &["devops", "sre", "infrastructure", "ci/cd", "automation"]),
    ("cloud", &["aws", "azure", "gcp", "cloud"]),
    ("distributed systems", &["distributed", "microservices", "cluster", "replication"]),
];

const COMPANY_SIZE_KEYWORDS: &[(&str, &[&str])] = &[
    ("startup", &["startup", "founding team", "early stage", "seed", "series a"]),
    ("scaleup", &["growth stage", "scaling", "series b", "series c", "expanding"]),
    ("enterprise", &["enterprise", "fortune", "global", "multinational", "large scale"]),
];

const WORK_STYLE_KEYWORDS: &[(&str, &[&str])] = &[
    ("collaborative", &["collaborated", "cross-functional", "team", "partnered", "coordinated"]),
    ("autonomous", &["independently", "self-directed", "initiative", "owned", "drove"]),
    ("leadership", &["led", "mentored", "managed", "guided", "coached"]),
    ("innovative", &["innovative", "created", "designed", "pioneered", "launched"]),
];

const VALUES_KEYWORDS: &[(&str, &[&str])] = &[
    ("quality", &["quality", "excellence", "best practices", "standards"]),
    ("innovation", &["innovation", "cutting-edge", "modern", "new technology"]),
    ("efficiency", &["efficiency", "optimization", "performance", "streamlined"]),
    ("collaboration", &["collaboration", "teamwork", "partnership", "cross-functional"]),
    ("customer focus", &["customer", "user", "client", "stakeholder"]),
];

const LEVEL_SENIOR: &[&str] = &["senior", "sr", "lead", "principal", "staff"];
const LEVEL_JUNIOR: &[&str] = &["junior", "jr", "associate"];
const LEVEL_ENTRY: &[&str] = &["intern", "trainee", "apprentice"];

/// Proficiency scale used for skill-gap analysis, on the same five-point
/// scale the candidate/required levels are stored on (`SkillMatch` uses
/// plain `f64`, so these are the only values that scale ever takes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SkillLevel {
    None,
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl SkillLevel {
    fn as_f64(self) -> f64 {
        match self {
            SkillLevel::None => 0.0,
            SkillLevel::Beginner => 2.0,
            SkillLevel::Intermediate => 3.0,
            SkillLevel::Advanced => 4.0,
            SkillLevel::Expert => 5.0,
        }
    }
}

/// Checked in order: the first level whose vocabulary appears in the
/// evidence text wins, so `Expert`'s list is checked before `Advanced`'s.
const LEVEL_INDICATORS: &[(SkillLevel, &[&str])] = &[
    (
        SkillLevel::Expert,
        &["expert", "mastery", "deep expertise", "architect", "led team", "mentored", "designed from scratch"],
    ),
    (
        SkillLevel::Advanced,
        &["advanced", "proficient", "extensive experience", "production", "at scale", "optimized", "implemented"],
    ),
    (
        SkillLevel::Intermediate,
        &["experience with", "worked with", "familiar", "configured", "deployed", "maintained"],
    ),
    (SkillLevel::Beginner, &["basic", "learning", "exposure to", "assisted with"]),
];

/// `(current, required) -> estimated duration to close the gap`, mirroring
/// the fixed lookup table job-fit gap analysis was trained on. Pairs not
/// listed fall back to a six-to-twelve month default.
const TRAINING_ESTIMATES: &[((SkillLevel, SkillLevel), &str)] = &[
    ((SkillLevel::None, SkillLevel::Beginner), "1-3 months"),
    ((SkillLevel::None, SkillLevel::Intermediate), "3-6 months"),
    ((SkillLevel::None, SkillLevel::Advanced), "6-12 months"),
    ((SkillLevel::None, SkillLevel::Expert), "1-2 years"),
    ((SkillLevel::Beginner, SkillLevel::Intermediate), "2-4 months"),
    ((SkillLevel::Beginner, SkillLevel::Advanced), "4-8 months"),
    ((SkillLevel::Beginner, SkillLevel::Expert), "8-18 months"),
    ((SkillLevel::Intermediate, SkillLevel::Advanced), "3-6 months"),
    ((SkillLevel::Intermediate, SkillLevel::Expert), "6-12 months"),
    ((SkillLevel::Advanced, SkillLevel::Expert), "3-6 months"),
];
const DEFAULT_TRAINING_ESTIMATE: &str = "6-12 months";

pub struct FitScorer {
    matcher: KeywordMatcher,
}

impl FitScorer {
    pub fn new(fuzzy_threshold: f64) -> Self {
        Self {
            matcher: KeywordMatcher::new(fuzzy_threshold),
        }
    }

    pub fn score_fit(&self, resume: &Resume, job_description: &str, job_title: &str) -> JobFitScore {
        info!("scoring job fit for {}", job_title);

        let keywords = KeywordExtractor::extract_keywords(job_description, 40);
        let matches = self.matcher.match_keywords(resume, &keywords);

        let (skill_matches, skill_gaps) = Self::build_skill_matches(resume, &matches);
        let skill_score = Self::calculate_skill_score(&skill_matches, &skill_gaps);

        let required_years = YEARS_PATTERN
            .captures(job_description)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok());
        let required_domains: Vec<&str> = DOMAIN_KEYWORDS
            .iter()
            .filter(|(_, kws)| kws.iter().any(|kw| job_description.to_lowercase().contains(kw)))
            .map(|(name, _)| *name)
            .collect();
        let required_tech: Vec<String> = keywords
            .iter()
            .filter(|k| matches!(k.category, KeywordCategory::Technical | KeywordCategory::Tool))
            .map(|k| k.text.clone())
            .collect();

        let experience_matches = Self::evaluate_experience(resume, job_title, &required_domains, &required_tech);
        let experience_score = Self::calculate_experience_score(&experience_matches, required_years);

        let trajectory = Self::analyze_trajectory(resume);
        let required_level = Self::level_from_title(job_title);
        let trajectory_score = Self::calculate_trajectory_score(&trajectory, required_level);

        let culture_indicators = Self::analyze_culture(resume, job_description, &required_domains);
        let culture_score = Self::calculate_culture_score(&culture_indicators);

        let education_score = Self::calculate_education_score(resume, job_description, &keywords);

        let overall_score = skill_score * WEIGHT_SKILL
            + experience_score * WEIGHT_EXPERIENCE
            + trajectory_score * WEIGHT_TRAJECTORY
            + culture_score * WEIGHT_CULTURE
            + education_score * WEIGHT_EDUCATION;

        let fit_level = FitLevel::from_score(overall_score);

        info!("job fit score: {:.1}/100 ({:?})", overall_score, fit_level);

        JobFitScore {
            overall_score,
            fit_level,
            skill_score,
            experience_score,
            trajectory_score,
            culture_score,
            education_score,
            skill_matches,
            skill_gaps,
            experience_matches,
            culture_indicators,
            trajectory,
        }
    }

    fn build_skill_matches(resume: &Resume, matches: &[KeywordMatch]) -> (Vec<SkillMatch>, Vec<SkillGap>) {
        let mut skill_matches = Vec::new();
        let mut skill_gaps = Vec::new();

        for m in matches {
            if !matches!(
                m.keyword.category,
                KeywordCategory::Technical | KeywordCategory::Tool | KeywordCategory::Domain
            ) {
                continue;
            }

            let required = m.keyword.importance >= 0.7;
            let importance = if required { 1.0 } else { 0.5 };
            let required_level = if required { SkillLevel::Advanced } else { SkillLevel::Intermediate };

            if m.match_type == MatchType::Missing {
                let current_level = SkillLevel::None;
                let training_time = Self::estimate_training_time(current_level, required_level);
                let severity = if m.keyword.importance >= 0.9 && training_time.contains("year") {
                    GapSeverity::Critical
                } else if m.keyword.importance >= 0.7 {
                    GapSeverity::Moderate
                } else {
                    GapSeverity::Minor
                };
                skill_gaps.push(SkillGap {
                    skill: m.keyword.text.clone(),
                    severity,
                    estimated_training_time: training_time,
                });
                continue;
            }

            let evidence = Self::find_skill_evidence(resume, &m.keyword.text);
            let candidate_level = Self::infer_skill_level(&evidence);
            let candidate_score = candidate_level.as_f64();
            let required_score = required_level.as_f64();
            let strength = if candidate_score >= required_score {
                1.0
            } else if required_score > 0.0 {
                candidate_score / required_score
            } else {
                0.0
            } * importance;

            let kind = match m.match_type {
                MatchType::Exact => SkillMatchKind::Direct,
                MatchType::Synonym => SkillMatchKind::Synonym,
                _ => SkillMatchKind::Fuzzy,
            };

            skill_matches.push(SkillMatch {
                skill: m.keyword.text.clone(),
                kind,
                candidate_level: candidate_score,
                required_level: required_score,
                importance,
                strength,
            });
        }

        (skill_matches, skill_gaps)
    }

    /// Collects evidence snippets for a skill from the résumé summary and
    /// every bullet, the way level inference reads them: summary first, then
    /// each bullet's subsection paired with its text.
    fn find_skill_evidence(resume: &Resume, skill: &str) -> Vec<String> {
        let skill_lower = skill.to_lowercase();
        let mut evidence = Vec::new();

        if let Some(summary) = &resume.summary {
            if summary.to_lowercase().contains(&skill_lower) {
                let truncated: String = summary.chars().take(100).collect();
                evidence.push(format!("Summary: {truncated}"));
            }
        }

        for bullet in &resume.all_bullets {
            if bullet.text.to_lowercase().contains(&skill_lower) {
                let subsection = bullet.subsection.as_deref().unwrap_or(&bullet.section);
                evidence.push(format!("{subsection}: {}", bullet.text));
            }
        }

        evidence
    }

    /// Infers proficiency from evidence text: the first indicator vocabulary
    /// that matches wins, in expert-to-beginner order; with no vocabulary hit
    /// the evidence count decides; no evidence at all still means some
    /// exposure, not none.
    fn infer_skill_level(evidence: &[String]) -> SkillLevel {
        if evidence.is_empty() {
            return SkillLevel::Beginner;
        }

        let text = evidence.join(" ").to_lowercase();
        for (level, indicators) in LEVEL_INDICATORS {
            if indicators.iter().any(|kw| text.contains(kw)) {
                return *level;
            }
        }

        if evidence.len() >= 5 {
            SkillLevel::Advanced
        } else if evidence.len() >= 3 {
            SkillLevel::Intermediate
        } else {
            SkillLevel::Beginner
        }
    }

    fn estimate_training_time(current: SkillLevel, required: SkillLevel) -> String {
        TRAINING_ESTIMATES
            .iter()
            .find(|((from, to), _)| *from == current && *to == required)
            .map(|(_, duration)| duration.to_string())
            .unwrap_or_else(|| DEFAULT_TRAINING_ESTIMATE.to_string())
    }

    fn calculate_skill_score(matches: &[SkillMatch], gaps: &[SkillGap]) -> f64 {
        let total = matches.len() + gaps.len();
        if total == 0 {
            return 0.0;
        }

        let match_score: f64 = matches.iter().map(|m| m.strength).sum();
        let critical_gaps = gaps.iter().filter(|g| g.severity == GapSeverity::Critical).count();
        let penalty = critical_gaps as f64 * 2.0;

        let score = (match_score / total as f64) * 100.0 - penalty;
        score.max(0.0).min(100.0)
    }

    fn evaluate_experience(
        resume: &Resume,
        job_title: &str,
        required_domains: &[&str],
        required_tech: &[String],
    ) -> Vec<ExperienceMatch> {
        let mut matches: Vec<ExperienceMatch> = resume
            .experience
            .iter()
            .map(|exp| {
                let exp_text = Self::experience_text(exp).to_lowercase();

                let title_score = Self::compare_job_titles(&exp.title, job_title);

                let domain_score = if required_domains.is_empty() {
                    0.0
                } else {
                    let hits = required_domains
                        .iter()
                        .filter(|d| Self::has_domain_experience(&exp_text, d))
                        .count();
                    hits as f64 / required_domains.len() as f64
                };

                let tech_score = if required_tech.is_empty() {
                    0.0
                } else {
                    let hits = required_tech
                        .iter()
                        .filter(|t| exp_text.contains(&t.to_lowercase()))
                        .count();
                    hits as f64 / required_tech.len() as f64
                };

                let relevance = title_score * 0.3 + domain_score * 0.3 + tech_score * 0.4;
                let duration_months = Self::calculate_duration(exp);
                let recency_weight = Self::calculate_recency(exp.end_date.as_deref());

                ExperienceMatch {
                    title: exp.title.clone(),
                    company: exp.company.clone(),
                    relevance,
                    duration_months,
                    recency_weight,
                }
            })
            .collect();

        matches.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap());
        matches
    }

    fn experience_text(exp: &ExperienceEntry) -> String {
        let bullets: String = exp.bullets.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join(" ");
        format!("{} {} {}", exp.title, exp.company, bullets)
    }

    fn compare_job_titles(candidate_title: &str, required_title: &str) -> f64 {
        let candidate_lower = candidate_title.to_lowercase();
        let required_lower = required_title.to_lowercase();

        if candidate_lower == required_lower {
            return 1.0;
        }

        let mut candidate_words: HashSet<String> =
            WORD_PATTERN.find_iter(&candidate_lower).map(|m| m.as_str().to_string()).collect();
        let mut required_words: HashSet<String> =
            WORD_PATTERN.find_iter(&required_lower).map(|m| m.as_str().to_string()).collect();

        for stop in TITLE_STOPWORDS {
            candidate_words.remove(*stop);
            required_words.remove(*stop);
        }

        if candidate_words.is_empty() && required_words.is_empty() {
            return 0.5;
        }

        let intersection = candidate_words.intersection(&required_words).count();
        let union = candidate_words.union(&required_words).count();

        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }

    fn has_domain_experience(text: &str, domain: &str) -> bool {
        if text.contains(domain) {
            return true;
        }
        DOMAIN_KEYWORDS
            .iter()
            .find(|(name, _)| *name == domain)
            .map(|(_, kws)| kws.iter().any(|kw| text.contains(kw)))
            .unwrap_or(false)
    }

    fn calculate_duration(exp: &ExperienceEntry) -> u32 {
        let start_year = exp.start_date.as_deref().and_then(Self::extract_year);
        let end_year = match &exp.end_date {
            Some(d) if !d.to_lowercase().contains("present") => Self::extract_year(d),
            _ => Some(chrono::Utc::now().year() as u32),
        };

        match (start_year, end_year) {
            (Some(s), Some(e)) if e >= s => (e - s) * 12,
            _ => 12,
        }
    }

    fn extract_year(date_str: &str) -> Option<u32> {
        YEAR_PATTERN.find(date_str).and_then(|m| m.as_str().parse().ok())
    }

    fn calculate_recency(end_date: Option<&str>) -> f64 {
        let end_date = match end_date {
            Some(d) => d,
            None => return 0.5,
        };

        if end_date.to_lowercase().contains("present") {
            return 1.0;
        }

        let end_year = match Self::extract_year(end_date) {
            Some(y) => y,
            None => return 0.5,
        };

        let current_year = chrono::Utc::now().year() as u32;
        let years_ago = current_year.saturating_sub(end_year);

        match years_ago {
            0 => 1.0,
            1 => 0.9,
            2 => 0.7,
            3..=5 => 0.5,
            _ => 0.3,
        }
    }

    fn calculate_experience_score(matches: &[ExperienceMatch], required_years: Option<u32>) -> f64 {
        if matches.is_empty() {
            return 0.0;
        }

        let total_months: u32 = matches.iter().filter(|m| m.relevance > 0.5).map(|m| m.duration_months).sum();
        let total_years = total_months as f64 / 12.0;

        let years_score = match required_years {
            Some(years) if years > 0 => (total_years / years as f64).min(1.0),
            _ => 1.0,
        };

        let avg_relevance = matches.iter().map(|m| m.relevance).sum::<f64>() / matches.len() as f64;
        let avg_recency = matches.iter().map(|m| m.recency_weight).sum::<f64>() / matches.len() as f64;

        let score = (years_score * 0.4 + avg_relevance * 0.4 + avg_recency * 0.2) * 100.0;
        score.min(100.0)
    }

    fn title_level(title: &str) -> u8 {
        let lower = title.to_lowercase();
        if LEVEL_SENIOR.iter().any(|kw| lower.contains(kw)) {
            4
        } else if LEVEL_JUNIOR.iter().any(|kw| lower.contains(kw)) {
            2
        } else if LEVEL_ENTRY.iter().any(|kw| lower.contains(kw)) {
            1
        } else {
            3
        }
    }

    fn level_from_title(job_title: &str) -> u8 {
        Self::title_level(job_title)
    }

    fn analyze_trajectory(resume: &Resume) -> CareerTrajectory {
        if resume.experience.is_empty() {
            return CareerTrajectory {
                trend: TrajectoryTrend::InsufficientData,
                promotions: 0,
                average_tenure_months: 0.0,
                current_level: 1,
            };
        }

        let levels: Vec<u8> = resume.experience.iter().map(|e| Self::title_level(&e.title)).collect();

        let trend = if levels.len() < 2 {
            TrajectoryTrend::InsufficientData
        } else {
            let mut upward = 0;
            let mut downward = 0;
            for w in levels.windows(2) {
                if w[0] > w[1] {
                    upward += 1;
                } else if w[0] < w[1] {
                    downward += 1;
                }
            }
            if upward > downward {
                TrajectoryTrend::Upward
            } else if downward > upward {
                TrajectoryTrend::Downward
            } else {
                TrajectoryTrend::Lateral
            }
        };

        let mut promotions = 0;
        for w in resume.experience.windows(2) {
            if w[0].company == w[1].company && Self::title_level(&w[0].title) > Self::title_level(&w[1].title) {
                promotions += 1;
            }
        }

        let total_months: u32 = resume
            .experience
            .iter()
            .map(Self::calculate_duration)
            .sum();
        let average_tenure_months = total_months as f64 / resume.experience.len() as f64;
        let current_level = Self::title_level(&resume.experience[0].title);

        CareerTrajectory {
            trend,
            promotions,
            average_tenure_months,
            current_level,
        }
    }

    fn calculate_trajectory_score(trajectory: &CareerTrajectory, required_level: u8) -> f64 {
        let mut score = 0.0;

        let current_level = trajectory.current_level;

        if current_level as f64 >= required_level as f64 {
            score += 50.0;
        } else {
            score += (current_level as f64 / required_level as f64) * 50.0;
        }

        match trajectory.trend {
            TrajectoryTrend::Upward => score += 20.0,
            TrajectoryTrend::Lateral => score += 10.0,
            _ => {}
        }

        if trajectory.promotions >= 2 {
            score += 15.0;
        } else if trajectory.promotions == 1 {
            score += 10.0;
        }

        if (18.0..=48.0).contains(&trajectory.average_tenure_months) {
            score += 15.0;
        } else if (12.0..18.0).contains(&trajectory.average_tenure_months) {
            score += 10.0;
        }

        score.min(100.0)
    }

    fn analyze_culture(resume: &Resume, job_description: &str, required_domains: &[&str]) -> CultureIndicators {
        let jd_lower = job_description.to_lowercase();
        let required_size = COMPANY_SIZE_KEYWORDS
            .iter()
            .find(|(_, kws)| kws.iter().any(|kw| jd_lower.contains(kw)))
            .map(|(name, _)| *name);

        let company_size_match = match required_size {
            Some(size) => resume.experience.iter().any(|exp| {
                let text = Self::experience_text(exp).to_lowercase();
                COMPANY_SIZE_KEYWORDS
                    .iter()
                    .find(|(name, _)| *name == size)
                    .map(|(_, kws)| kws.iter().any(|kw| text.contains(kw)))
                    .unwrap_or(false)
            }),
            None => false,
        };

        let industry_match = required_domains.iter().any(|domain| {
            resume.experience.iter().any(|exp| {
                let text = format!("{} {}", exp.title, Self::experience_text(exp)).to_lowercase();
                text.contains(domain)
            })
        });

        let all_text = format!(
            "{} {}",
            resume.summary.clone().unwrap_or_default(),
            resume.all_bullets.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join(" ")
        )
        .to_lowercase();

        let mut work_style = std::collections::HashMap::new();
        for (style, kws) in WORK_STYLE_KEYWORDS {
            let hits = kws.iter().filter(|kw| all_text.contains(**kw)).count() as u32;
            if hits >= 2 {
                work_style.insert(style.to_string(), hits);
            }
        }

        let mut values = std::collections::HashMap::new();
        for (value, kws) in VALUES_KEYWORDS {
            let hits = kws.iter().filter(|kw| all_text.contains(**kw)).count() as u32;
            if hits >= 2 {
                values.insert(value.to_string(), hits);
            }
        }

        let leadership_style = Self::determine_leadership_style(&all_text);

        CultureIndicators {
            company_size_match,
            industry_match,
            work_style,
            values,
            leadership_style,
        }
    }

    fn determine_leadership_style(all_text: &str) -> Option<String> {
        let servant = ["mentored", "coached", "supported", "enabled", "empowered"];
        let directive = ["directed", "managed", "oversaw", "supervised", "controlled"];
        let collaborative = ["collaborated", "facilitated", "coordinated", "partnered"];

        let score = |kws: &[&str]| kws.iter().filter(|kw| all_text.contains(**kw)).count();

        let scores = [("servant", score(&servant)), ("directive", score(&directive)), ("collaborative", score(&collaborative))];

        let (style, max) = scores.iter().max_by_key(|(_, count)| *count).unwrap();
        if *max == 0 {
            None
        } else {
            Some(style.to_string())
        }
    }

    fn calculate_culture_score(indicators: &CultureIndicators) -> f64 {
        let mut score = if indicators.company_size_match { 35.0 } else { 10.0 };
        score += if indicators.industry_match { 35.0 } else { 10.0 };
        score += (indicators.work_style.len().min(3) as f64 / 3.0) * 15.0;
        score += (indicators.values.len().min(3) as f64 / 3.0) * 15.0;
        score.min(100.0)
    }

    fn calculate_education_score(resume: &Resume, job_description: &str, keywords: &[Keyword]) -> f64 {
        if resume.education.is_empty() {
            return 50.0;
        }

        let mut score = 50.0;
        let jd_lower = job_description.to_lowercase();

        let required_degrees = ["phd", "doctorate", "master", "mba", "bachelor", "diploma"];
        let required_degree = required_degrees.iter().find(|d| jd_lower.contains(**d));

        match required_degree {
            Some(required) => {
                let matched = resume
                    .education
                    .iter()
                    .any(|edu| edu.degree.to_lowercase().contains(*required));
                if matched {
                    score += 30.0;
                }
            }
            None => score += 20.0,
        }

        let required_certs: Vec<&Keyword> = keywords
            .iter()
            .filter(|k| k.category == KeywordCategory::Certification)
            .collect();
        let cert_match = required_certs.iter().any(|cert| {
            resume
                .certifications
                .iter()
                .any(|c| c.to_lowercase().contains(&cert.text.to_lowercase()))
        });

        if cert_match {
            score += 20.0;
        } else if !resume.certifications.is_empty() {
            score += 10.0;
        }

        score.min(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BulletPoint, EducationEntry, PersonalInfo, SkillsSection};
    use std::collections::HashMap as StdHashMap;

    const SAMPLE_JOB_DESCRIPTION: &str = "Seeking a Senior Platform Engineer with 5+ years experience \
        in Kafka streaming and AWS cloud infrastructure at an enterprise scale. Bachelor's degree preferred.";

    fn sample_resume() -> Resume {
        Resume {
            personal: PersonalInfo {
                name: Some("Jordan Rivera".to_string()),
                ..Default::default()
            },
            summary: Some("Platform engineer with distributed systems focus".to_string()),
            experience: vec![
                ExperienceEntry {
                    title: "Senior Platform Engineer".to_string(),
                    company: "Acme Corp".to_string(),
                    location: None,
                    start_date: Some("Jan 2021".to_string()),
                    end_date: Some("Present".to_string()),
                    bullets: vec![BulletPoint::new(
                        "acme_0",
                        "Led migration of Kafka cluster to AWS at enterprise scale",
                        "experience",
                    )],
                    is_current: true,
                    line_number: None,
                },
                ExperienceEntry {
                    title: "Platform Engineer".to_string(),
                    company: "Acme Corp".to_string(),
                    location: None,
                    start_date: Some("Jan 2018".to_string()),
                    end_date: Some("Dec 2020".to_string()),
                    bullets: vec![BulletPoint::new(
                        "acme_1",
                        "Collaborated with cross-functional team on streaming pipeline",
                        "experience",
                    )],
                    is_current: false,
                    line_number: None,
                },
            ],
            education: vec![EducationEntry {
                degree: "B.S. Computer Science".to_string(),
                institution: "State University".to_string(),
                location: None,
                graduation_date: Some("May 2017".to_string()),
                gpa: None,
                honors: None,
                line_number: None,
            }],
            skills: SkillsSection {
                technical: vec!["Kafka".to_string(), "AWS".to_string()],
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
    fn overall_score_is_weighted_sum() {
        let scorer = FitScorer::new(0.85);
        let resume = sample_resume();
        let fit = scorer.score_fit(&resume, SAMPLE_JOB_DESCRIPTION, "Senior Platform Engineer");

        let expected = fit.skill_score * WEIGHT_SKILL
            + fit.experience_score * WEIGHT_EXPERIENCE
            + fit.trajectory_score * WEIGHT_TRAJECTORY
            + fit.culture_score * WEIGHT_CULTURE
            + fit.education_score * WEIGHT_EDUCATION;

        assert!((fit.overall_score - expected).abs() < 0.05);
    }

    #[test]
    fn promotion_detected_within_same_company() {
        let resume = sample_resume();
        let trajectory = FitScorer::analyze_trajectory(&resume);
        assert_eq!(trajectory.promotions, 1);
    }

    #[test]
    fn fit_level_matches_score_bucket() {
        assert_eq!(FitLevel::from_score(95.0), FitLevel::Excellent);
        assert_eq!(FitLevel::from_score(55.0), FitLevel::Weak);
        assert_eq!(FitLevel::from_score(10.0), FitLevel::Poor);
    }

    #[test]
    fn empty_experience_yields_zero_experience_score() {
        let score = FitScorer::calculate_experience_score(&[], Some(3));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn job_title_jaccard_similarity_for_overlapping_titles() {
        let score = FitScorer::compare_job_titles("Senior Platform Engineer", "Platform Engineer");
        assert!(score > 0.0);
    }

    #[test]
    fn skill_level_inferred_from_expert_vocabulary() {
        let evidence = vec!["experience: Served as architect for the Kafka platform".to_string()];
        assert_eq!(FitScorer::infer_skill_level(&evidence), SkillLevel::Expert);
    }

    #[test]
    fn skill_level_falls_back_to_evidence_count_without_vocabulary_hit() {
        let evidence = vec!["summary: used Rust".to_string(), "a: used Rust".to_string(), "b: used Rust".to_string()];
        assert_eq!(FitScorer::infer_skill_level(&evidence), SkillLevel::Intermediate);
    }

    #[test]
    fn skill_level_defaults_to_beginner_with_no_evidence() {
        assert_eq!(FitScorer::infer_skill_level(&[]), SkillLevel::Beginner);
    }

    #[test]
    fn missing_skill_gap_is_critical_only_when_training_time_spans_years() {
        let time = FitScorer::estimate_training_time(SkillLevel::None, SkillLevel::Expert);
        assert!(time.contains("year"));
        let time = FitScorer::estimate_training_time(SkillLevel::None, SkillLevel::Advanced);
        assert!(!time.contains("year"));
    }

    #[test]
    fn trajectory_current_level_reflects_most_recent_title() {
        let resume = sample_resume();
        let trajectory = FitScorer::analyze_trajectory(&resume);
        assert_eq!(trajectory.current_level, 4);
    }
}
