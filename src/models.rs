use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ---------------------------------------------------------------------
// Résumé document model
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PersonalInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulletPoint {
    /// Stable id of the form `<company-or-section>_<index>`.
    pub id: String,
    pub text: String,
    pub section: String,
    pub subsection: Option<String>,
    pub is_modifiable: bool,
    pub original_text: Option<String>,
    pub command_name: Option<String>,
    pub line_number: Option<usize>,
}

impl BulletPoint {
    pub fn new(id: impl Into<String>, text: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            section: section.into(),
            subsection: None,
            is_modifiable: true,
            original_text: None,
            command_name: None,
            line_number: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperienceEntry {
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub bullets: Vec<BulletPoint>,
    pub is_current: bool,
    pub line_number: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EducationEntry {
    pub degree: String,
    pub institution: String,
    pub location: Option<String>,
    pub graduation_date: Option<String>,
    pub gpa: Option<String>,
    pub honors: Option<String>,
    pub line_number: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SkillsSection {
    pub technical: Vec<String>,
    pub tools: Vec<String>,
    pub languages: Vec<String>,
    pub certifications: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectEntry {
    pub name: String,
    pub description: String,
}

/// The raw, unexpanded definition of a `\newcommand`/`\renewcommand`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MacroDefinition {
    pub name: String,
    pub arity: Option<usize>,
    pub body: String,
    pub expanded: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseWarning {
    pub section: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseFailure {
    pub section: String,
    pub message: String,
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to parse section '{}': {}", self.section, self.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resume {
    pub personal: PersonalInfo,
    pub summary: Option<String>,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub skills: SkillsSection,
    pub projects: Vec<ProjectEntry>,
    pub certifications: Vec<String>,
    pub awards: Vec<String>,
    pub all_bullets: Vec<BulletPoint>,
    pub macros: HashMap<String, MacroDefinition>,
    pub warnings: Vec<ParseWarning>,
    pub source_text: String,
    pub parsed_at: DateTime<Utc>,
}

impl Resume {
    pub fn modifiable_bullets(&self) -> Vec<&BulletPoint> {
        self.all_bullets.iter().filter(|b| b.is_modifiable).collect()
    }

    pub fn bullets_in_section(&self, section: &str) -> Vec<&BulletPoint> {
        self.all_bullets.iter().filter(|b| b.section == section).collect()
    }
}

// ---------------------------------------------------------------------
// Keywords and matching
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeywordCategory {
    Required,
    Technical,
    SoftSkill,
    Tool,
    Domain,
    Certification,
    Experience,
}

impl KeywordCategory {
    /// Sort priority used when ranking extracted keywords (higher first).
    pub fn priority(&self) -> u8 {
        match self {
            KeywordCategory::Required => 5,
            KeywordCategory::Technical | KeywordCategory::Certification => 4,
            KeywordCategory::Domain | KeywordCategory::Tool => 3,
            KeywordCategory::Experience => 2,
            KeywordCategory::SoftSkill => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    pub text: String,
    pub category: KeywordCategory,
    pub importance: f64,
    pub synonyms: Vec<String>,
    pub context: Option<String>,
}

impl Keyword {
    pub fn normalized(&self) -> String {
        self.text.to_lowercase().trim().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    Exact,
    Synonym,
    Stemmed,
    Partial,
    Missing,
}

impl MatchType {
    /// Base reliability score used by the ATS scorer's per-match score.
    pub fn base_score(&self) -> f64 {
        match self {
            MatchType::Exact => 1.0,
            MatchType::Synonym => 0.85,
            MatchType::Stemmed => 0.7,
            MatchType::Partial => 0.5,
            MatchType::Missing => 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub keyword: Keyword,
    pub match_type: MatchType,
    pub matched_text: String,
    pub locations: Vec<String>,
    pub frequency: u32,
    pub context_score: f64,
}

impl KeywordMatch {
    /// Derived per-match score: `base(match-type) * freq-multiplier(capped 1.3) + context*0.2`, capped at 1.
    pub fn score(&self) -> f64 {
        if matches!(self.match_type, MatchType::Missing) {
            return 0.0;
        }
        let freq_multiplier = (1.0 + 0.05 * (self.frequency.saturating_sub(1) as f64)).min(1.3);
        let raw = self.match_type.base_score() * freq_multiplier + self.context_score * 0.2;
        raw.min(1.0)
    }
}

// ---------------------------------------------------------------------
// ATS score
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionScore {
    pub section_name: String,
    pub matches: u32,
    pub total: u32,
    pub match_rate: f64,
    pub density: f64,
    pub quality_score: f64,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ATSScore {
    pub overall_score: f64,
    pub keyword_score: f64,
    pub experience_score: f64,
    pub skills_score: f64,
    pub education_score: f64,
    pub format_score: f64,
    pub matched_keywords: Vec<KeywordMatch>,
    pub missing_keywords: Vec<Keyword>,
    pub section_scores: HashMap<String, SectionScore>,
    pub critical_gaps: Vec<String>,
    pub improvements: Vec<String>,
    pub enhancements: Vec<String>,
}

// ---------------------------------------------------------------------
// Job-fit score
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitLevel {
    Excellent,
    Strong,
    Good,
    Moderate,
    Weak,
    Poor,
}

impl FitLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            FitLevel::Excellent
        } else if score >= 80.0 {
            FitLevel::Strong
        } else if score >= 70.0 {
            FitLevel::Good
        } else if score >= 60.0 {
            FitLevel::Moderate
        } else if score >= 50.0 {
            FitLevel::Weak
        } else {
            FitLevel::Poor
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillMatchKind {
    Direct,
    Synonym,
    Fuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GapSeverity {
    Critical,
    Moderate,
    Minor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillMatch {
    pub skill: String,
    pub kind: SkillMatchKind,
    pub candidate_level: f64,
    pub required_level: f64,
    pub importance: f64,
    pub strength: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillGap {
    pub skill: String,
    pub severity: GapSeverity,
    pub estimated_training_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceMatch {
    pub title: String,
    pub company: String,
    pub relevance: f64,
    pub duration_months: u32,
    pub recency_weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrajectoryTrend {
    Upward,
    Lateral,
    Downward,
    InsufficientData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareerTrajectory {
    pub trend: TrajectoryTrend,
    pub promotions: u32,
    pub average_tenure_months: f64,
    /// Seniority level (1-4) inferred from the candidate's most recent title.
    pub current_level: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CultureIndicators {
    pub company_size_match: bool,
    pub industry_match: bool,
    pub work_style: HashMap<String, u32>,
    pub values: HashMap<String, u32>,
    pub leadership_style: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFitScore {
    pub overall_score: f64,
    pub fit_level: FitLevel,
    pub skill_score: f64,
    pub experience_score: f64,
    pub trajectory_score: f64,
    pub culture_score: f64,
    pub education_score: f64,
    pub skill_matches: Vec<SkillMatch>,
    pub skill_gaps: Vec<SkillGap>,
    pub experience_matches: Vec<ExperienceMatch>,
    pub culture_indicators: CultureIndicators,
    pub trajectory: CareerTrajectory,
}

// ---------------------------------------------------------------------
// Bullet selection
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedBullet {
    pub bullet: BulletPoint,
    pub relevance_score: f64,
    pub selection_reason: String,
    pub enhanced_text: Option<String>,
    pub was_enhanced: bool,
}

impl SelectedBullet {
    pub fn rendered_text(&self) -> &str {
        self.enhanced_text.as_deref().unwrap_or(&self.bullet.text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceSection {
    pub experience: ExperienceEntry,
    pub selected_bullets: Vec<SelectedBullet>,
    pub total_available: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulletEnhancement {
    pub original_text: String,
    pub enhanced_text: String,
    pub keywords_added: Vec<String>,
    pub improvement_score: f64,
    pub confidence: f64,
}

// ---------------------------------------------------------------------
// Variant / comparison
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementStats {
    pub bullets_enhanced: u32,
    pub keywords_added: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: String,
    pub base_resume_handle: String,
    pub job_title: String,
    pub company: String,
    pub experience_sections: Vec<ExperienceSection>,
    pub summary: Option<String>,
    pub source_path: String,
    pub pdf_path: Option<String>,
    pub ats_score: Option<ATSScore>,
    pub fit_score: Option<JobFitScore>,
    pub created_at: DateTime<Utc>,
    pub enhancement_stats: EnhancementStats,
}

impl Variant {
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulletChangeType {
    Unchanged,
    Modified,
    Added,
    Removed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulletChange {
    pub change_type: BulletChangeType,
    pub original_text: Option<String>,
    pub new_text: Option<String>,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDelta {
    pub section: String,
    pub original_present: bool,
    pub variant_present: bool,
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeComparison {
    pub section_deltas: Vec<SectionDelta>,
    pub bullet_changes: Vec<BulletChange>,
    pub keywords_added: Vec<String>,
    pub similarity: f64,
}

// ---------------------------------------------------------------------
// Task orchestration
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub id: String,
    pub status: TaskStatus,
    pub percent: u8,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub variant_id: Option<String>,
    pub error: Option<String>,
}

impl TaskState {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: TaskStatus::Pending,
            percent: 0,
            message: "queued".to_string(),
            created_at: now,
            updated_at: now,
            variant_id: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub resume_handle: String,
    pub resume_source: String,
    pub job_description: String,
    pub job_title: String,
    pub company: String,
    pub target_bullets: usize,
    pub use_ai: bool,
    /// Row id of the job this variant is generated against, resolved by the
    /// caller before submission so the orchestrator can persist the variant
    /// without re-deriving or re-creating the job record.
    pub job_id: i64,
}

// ---------------------------------------------------------------------
// Persistence Gateway records
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobRecord {
    pub id: i64,
    pub company: String,
    pub job_title: String,
    pub job_description: String,
    pub job_url: Option<String>,
    pub requirements: Option<String>,
    pub posted_date: Option<String>,
    pub deadline_date: Option<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub employment_type: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub company: String,
    pub job_title: String,
    pub job_description: String,
    pub job_url: Option<String>,
    pub requirements: Option<String>,
    pub posted_date: Option<String>,
    pub deadline_date: Option<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub employment_type: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VariantRecord {
    pub variant_id: String,
    pub job_id: i64,
    pub base_resume_handle: String,
    pub source_path: String,
    pub pdf_path: Option<String>,
    pub metadata_path: Option<String>,
    pub target_bullets: i64,
    pub ai_enhancement_enabled: bool,
    pub bullets_enhanced: i64,
    pub total_bullets: i64,
    pub keywords_added: String,
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AtsScoreRecord {
    pub id: i64,
    pub variant_id: String,
    pub overall_score: f64,
    pub keyword_score: f64,
    pub experience_score: f64,
    pub skills_score: f64,
    pub education_score: f64,
    pub format_score: f64,
    pub missing_keywords: String,
    pub recommendations: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Applied,
    Interviewing,
    Offer,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Interviewing => "interviewing",
            ApplicationStatus::Offer => "offer",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "interviewing" => ApplicationStatus::Interviewing,
            "offer" => ApplicationStatus::Offer,
            "rejected" => ApplicationStatus::Rejected,
            "withdrawn" => ApplicationStatus::Withdrawn,
            _ => ApplicationStatus::Applied,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApplicationRecord {
    pub id: i64,
    pub job_id: i64,
    pub variant_id: Option<String>,
    pub applied_date: String,
    pub application_method: Option<String>,
    pub application_url: Option<String>,
    pub cover_letter_path: Option<String>,
    pub status: String,
    pub status_updated_at: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewVariant {
    pub variant_id: String,
    pub job_id: i64,
    pub base_resume_handle: String,
    pub source_path: String,
    pub pdf_path: Option<String>,
    pub metadata_path: Option<String>,
    pub target_bullets: i64,
    pub ai_enhancement_enabled: bool,
    pub bullets_enhanced: i64,
    pub total_bullets: i64,
    pub keywords_added: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewAtsScore {
    pub variant_id: String,
    pub overall_score: f64,
    pub keyword_score: f64,
    pub experience_score: f64,
    pub skills_score: f64,
    pub education_score: f64,
    pub format_score: f64,
    pub missing_keywords: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub job_id: i64,
    pub variant_id: Option<String>,
    pub applied_date: String,
    pub application_method: Option<String>,
    pub application_url: Option<String>,
    pub cover_letter_path: Option<String>,
    pub status: ApplicationStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseStatistics {
    pub total_jobs: i64,
    pub total_variants: i64,
    pub total_applications: i64,
    pub applications_by_status: HashMap<String, i64>,
    pub avg_ats_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub jobs: Vec<JobRecord>,
    pub variants: Vec<VariantRecord>,
    pub ats_scores: Vec<AtsScoreRecord>,
    pub applications: Vec<ApplicationRecord>,
    pub exported_at: DateTime<Utc>,
}
