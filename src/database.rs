use log::info;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use crate::errors::PipelineResult;
use crate::models::{
    ApplicationRecord, ApplicationStatus, AtsScoreRecord, DatabaseSnapshot, DatabaseStatistics, JobRecord, NewApplication,
    NewAtsScore, NewJob, NewVariant, VariantRecord,
};

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new_with_url(database_url: &str) -> PipelineResult<Self> {
        info!("connecting to database: {}", database_url);

        if database_url.starts_with("sqlite:") && !database_url.contains(":memory:") {
            let db_path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
            if let Some(parent) = std::path::Path::new(db_path).parent() {
                tokio::fs::create_dir_all(parent).await?;
                info!("created database directory: {:?}", parent);
            }
        }

        let pool = SqlitePool::connect(database_url).await?;
        let db = Database { pool };
        db.run_migrations().await?;

        info!("database initialized successfully");
        Ok(db)
    }

    async fn run_migrations(&self) -> PipelineResult<()> {
        info!("running database migrations");

        sqlx::query("PRAGMA journal_mode=WAL").execute(&self.pool).await?;
        sqlx::query("PRAGMA busy_timeout=30000").execute(&self.pool).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company TEXT NOT NULL,
                job_title TEXT NOT NULL,
                job_description TEXT NOT NULL,
                job_url TEXT,
                requirements TEXT,
                posted_date TEXT,
                deadline_date TEXT,
                location TEXT,
                salary_range TEXT,
                employment_type TEXT,
                source TEXT,
                notes TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS variants (
                variant_id TEXT PRIMARY KEY,
                job_id INTEGER NOT NULL,
                base_resume_handle TEXT NOT NULL,
                source_path TEXT NOT NULL,
                pdf_path TEXT,
                metadata_path TEXT,
                target_bullets INTEGER NOT NULL DEFAULT 18,
                ai_enhancement_enabled BOOLEAN NOT NULL DEFAULT TRUE,
                bullets_enhanced INTEGER NOT NULL DEFAULT 0,
                total_bullets INTEGER NOT NULL DEFAULT 0,
                keywords_added TEXT NOT NULL DEFAULT '[]',
                generated_at TEXT NOT NULL DEFAULT (datetime('now')),
                FOREIGN KEY (job_id) REFERENCES jobs (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ats_scores (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                variant_id TEXT NOT NULL,
                overall_score REAL NOT NULL,
                keyword_score REAL NOT NULL,
                experience_score REAL NOT NULL,
                skills_score REAL NOT NULL,
                education_score REAL NOT NULL,
                format_score REAL NOT NULL,
                missing_keywords TEXT NOT NULL DEFAULT '[]',
                recommendations TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                FOREIGN KEY (variant_id) REFERENCES variants (variant_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL,
                variant_id TEXT,
                applied_date TEXT NOT NULL,
                application_method TEXT,
                application_url TEXT,
                cover_letter_path TEXT,
                status TEXT NOT NULL DEFAULT 'applied',
                status_updated_at TEXT,
                notes TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                FOREIGN KEY (job_id) REFERENCES jobs (id),
                FOREIGN KEY (variant_id) REFERENCES variants (variant_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_variants_job_id ON variants(job_id)").execute(&self.pool).await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_ats_scores_variant_id ON ats_scores(variant_id)").execute(&self.pool).await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_applications_job_id ON applications(job_id)").execute(&self.pool).await?;

        Ok(())
    }

    pub async fn health_check(&self) -> PipelineResult<bool> {
        let result = sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(result.get::<i32, _>(0) == 1)
    }

    // ========== Jobs ==========

    pub async fn add_job(&self, job: &NewJob) -> PipelineResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO jobs (
                company, job_title, job_description, job_url, requirements,
                posted_date, deadline_date, location, salary_range,
                employment_type, source, notes
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.company)
        .bind(&job.job_title)
        .bind(&job.job_description)
        .bind(&job.job_url)
        .bind(&job.requirements)
        .bind(&job.posted_date)
        .bind(&job.deadline_date)
        .bind(&job.location)
        .bind(&job.salary_range)
        .bind(&job.employment_type)
        .bind(&job.source)
        .bind(&job.notes)
        .execute(&self.pool)
        .await?;

        let job_id = result.last_insert_rowid();
        info!("added job: {} - {} (id: {})", job.company, job.job_title, job_id);
        Ok(job_id)
    }

    pub async fn get_job(&self, job_id: i64) -> PipelineResult<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRecord>("SELECT * FROM jobs WHERE id = ?").bind(job_id).fetch_optional(&self.pool).await?;
        Ok(row)
    }

    pub async fn get_job_by_details(&self, company: &str, job_title: &str) -> PipelineResult<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRecord>(
            "SELECT * FROM jobs WHERE company = ? AND job_title = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(company)
        .bind(job_title)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_job_by_url(&self, job_url: &str) -> PipelineResult<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRecord>("SELECT * FROM jobs WHERE job_url = ?").bind(job_url).fetch_optional(&self.pool).await?;
        Ok(row)
    }

    pub async fn list_jobs(&self, limit: i64) -> PipelineResult<Vec<JobRecord>> {
        let rows =
            sqlx::query_as::<_, JobRecord>("SELECT * FROM jobs ORDER BY created_at DESC LIMIT ?").bind(limit).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    // ========== Variants ==========

    pub async fn add_variant(&self, variant: &NewVariant) -> PipelineResult<()> {
        let keywords_json = serde_json::to_string(&variant.keywords_added).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            r#"
            INSERT INTO variants (
                variant_id, job_id, base_resume_handle, source_path, pdf_path,
                metadata_path, target_bullets, ai_enhancement_enabled,
                bullets_enhanced, total_bullets, keywords_added
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&variant.variant_id)
        .bind(variant.job_id)
        .bind(&variant.base_resume_handle)
        .bind(&variant.source_path)
        .bind(&variant.pdf_path)
        .bind(&variant.metadata_path)
        .bind(variant.target_bullets)
        .bind(variant.ai_enhancement_enabled)
        .bind(variant.bullets_enhanced)
        .bind(variant.total_bullets)
        .bind(keywords_json)
        .execute(&self.pool)
        .await?;

        info!("added variant: {} for job {}", variant.variant_id, variant.job_id);
        Ok(())
    }

    /// Inserts the variant and its ATS score in a single transaction so a
    /// variant is never persisted without the score it was generated with.
    pub async fn add_variant_with_score(&self, variant: &NewVariant, score: &NewAtsScore) -> PipelineResult<()> {
        let mut tx = self.pool.begin().await?;
        let keywords_json = serde_json::to_string(&variant.keywords_added).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            r#"
            INSERT INTO variants (
                variant_id, job_id, base_resume_handle, source_path, pdf_path,
                metadata_path, target_bullets, ai_enhancement_enabled,
                bullets_enhanced, total_bullets, keywords_added
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&variant.variant_id)
        .bind(variant.job_id)
        .bind(&variant.base_resume_handle)
        .bind(&variant.source_path)
        .bind(&variant.pdf_path)
        .bind(&variant.metadata_path)
        .bind(variant.target_bullets)
        .bind(variant.ai_enhancement_enabled)
        .bind(variant.bullets_enhanced)
        .bind(variant.total_bullets)
        .bind(keywords_json)
        .execute(&mut *tx)
        .await?;

        let missing_json = serde_json::to_string(&score.missing_keywords).unwrap_or_else(|_| "[]".to_string());
        let recommendations_json = serde_json::to_string(&score.recommendations).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            r#"
            INSERT INTO ats_scores (
                variant_id, overall_score, keyword_score, experience_score,
                skills_score, education_score, format_score,
                missing_keywords, recommendations
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&score.variant_id)
        .bind(score.overall_score)
        .bind(score.keyword_score)
        .bind(score.experience_score)
        .bind(score.skills_score)
        .bind(score.education_score)
        .bind(score.format_score)
        .bind(missing_json)
        .bind(recommendations_json)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("added variant {} with ats score {:.1}", variant.variant_id, score.overall_score);
        Ok(())
    }

    pub async fn get_variant(&self, variant_id: &str) -> PipelineResult<Option<VariantRecord>> {
        let row = sqlx::query_as::<_, VariantRecord>("SELECT * FROM variants WHERE variant_id = ?")
            .bind(variant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_variants(&self, job_id: Option<i64>) -> PipelineResult<Vec<VariantRecord>> {
        let rows = match job_id {
            Some(job_id) => {
                sqlx::query_as::<_, VariantRecord>("SELECT * FROM variants WHERE job_id = ? ORDER BY generated_at DESC")
                    .bind(job_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as::<_, VariantRecord>("SELECT * FROM variants ORDER BY generated_at DESC LIMIT 50")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }

    // ========== ATS scores ==========

    pub async fn add_ats_score(&self, score: &NewAtsScore) -> PipelineResult<i64> {
        let missing_json = serde_json::to_string(&score.missing_keywords).unwrap_or_else(|_| "[]".to_string());
        let recommendations_json = serde_json::to_string(&score.recommendations).unwrap_or_else(|_| "[]".to_string());

        let result = sqlx::query(
            r#"
            INSERT INTO ats_scores (
                variant_id, overall_score, keyword_score, experience_score,
                skills_score, education_score, format_score,
                missing_keywords, recommendations
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&score.variant_id)
        .bind(score.overall_score)
        .bind(score.keyword_score)
        .bind(score.experience_score)
        .bind(score.skills_score)
        .bind(score.education_score)
        .bind(score.format_score)
        .bind(missing_json)
        .bind(recommendations_json)
        .execute(&self.pool)
        .await?;

        info!("added ats score for variant {}: {:.1}", score.variant_id, score.overall_score);
        Ok(result.last_insert_rowid())
    }

    pub async fn get_ats_score(&self, variant_id: &str) -> PipelineResult<Option<AtsScoreRecord>> {
        let row = sqlx::query_as::<_, AtsScoreRecord>(
            "SELECT * FROM ats_scores WHERE variant_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(variant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    // ========== Applications ==========

    pub async fn add_application(&self, application: &NewApplication) -> PipelineResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO applications (
                job_id, variant_id, applied_date, application_method,
                application_url, cover_letter_path, status, notes
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(application.job_id)
        .bind(&application.variant_id)
        .bind(&application.applied_date)
        .bind(&application.application_method)
        .bind(&application.application_url)
        .bind(&application.cover_letter_path)
        .bind(application.status.as_str())
        .bind(&application.notes)
        .execute(&self.pool)
        .await?;

        let application_id = result.last_insert_rowid();
        info!("added application {} for job {}", application_id, application.job_id);
        Ok(application_id)
    }

    pub async fn update_application_status(&self, application_id: i64, status: ApplicationStatus, notes: Option<&str>) -> PipelineResult<()> {
        sqlx::query(
            r#"
            UPDATE applications
            SET status = ?, status_updated_at = datetime('now'), notes = COALESCE(?, notes), updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(notes)
        .bind(application_id)
        .execute(&self.pool)
        .await?;

        info!("updated application {} status to: {}", application_id, status.as_str());
        Ok(())
    }

    pub async fn get_active_applications(&self) -> PipelineResult<Vec<ApplicationRecord>> {
        let rows = sqlx::query_as::<_, ApplicationRecord>(
            "SELECT * FROM applications WHERE status NOT IN ('rejected', 'withdrawn') ORDER BY applied_date DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ========== Reports ==========

    pub async fn get_statistics(&self) -> PipelineResult<DatabaseStatistics> {
        let total_jobs = sqlx::query("SELECT COUNT(*) as count FROM jobs").fetch_one(&self.pool).await?.get::<i64, _>("count");
        let total_variants = sqlx::query("SELECT COUNT(*) as count FROM variants").fetch_one(&self.pool).await?.get::<i64, _>("count");
        let total_applications =
            sqlx::query("SELECT COUNT(*) as count FROM applications").fetch_one(&self.pool).await?.get::<i64, _>("count");

        let status_rows = sqlx::query("SELECT status, COUNT(*) as count FROM applications GROUP BY status").fetch_all(&self.pool).await?;
        let applications_by_status: HashMap<String, i64> =
            status_rows.into_iter().map(|row| (row.get::<String, _>("status"), row.get::<i64, _>("count"))).collect();

        let avg_score: Option<f64> = sqlx::query("SELECT AVG(overall_score) as avg FROM ats_scores")
            .fetch_one(&self.pool)
            .await?
            .get::<Option<f64>, _>("avg");

        Ok(DatabaseStatistics {
            total_jobs,
            total_variants,
            total_applications,
            applications_by_status,
            avg_ats_score: avg_score.unwrap_or(0.0),
        })
    }

    /// Dumps the full database as a single JSON snapshot suitable for backup.
    pub async fn export_snapshot(&self) -> PipelineResult<DatabaseSnapshot> {
        let jobs = sqlx::query_as::<_, JobRecord>("SELECT * FROM jobs ORDER BY id").fetch_all(&self.pool).await?;
        let variants = sqlx::query_as::<_, VariantRecord>("SELECT * FROM variants ORDER BY generated_at").fetch_all(&self.pool).await?;
        let ats_scores = sqlx::query_as::<_, AtsScoreRecord>("SELECT * FROM ats_scores ORDER BY id").fetch_all(&self.pool).await?;
        let applications = sqlx::query_as::<_, ApplicationRecord>("SELECT * FROM applications ORDER BY id").fetch_all(&self.pool).await?;

        Ok(DatabaseSnapshot { jobs, variants, ats_scores, applications, exported_at: chrono::Utc::now() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> Database {
        Database::new_with_url("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn health_check_passes_on_fresh_database() {
        let db = memory_db().await;
        assert!(db.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn add_and_get_job_round_trips() {
        let db = memory_db().await;
        let job = NewJob { company: "Acme".to_string(), job_title: "Platform Engineer".to_string(), job_description: "Build things".to_string(), ..Default::default() };

        let job_id = db.add_job(&job).await.unwrap();
        let fetched = db.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(fetched.company, "Acme");
        assert_eq!(fetched.job_title, "Platform Engineer");
    }

    #[tokio::test]
    async fn add_variant_with_score_is_atomic() {
        let db = memory_db().await;
        let job = NewJob { company: "Acme".to_string(), job_title: "Engineer".to_string(), job_description: "desc".to_string(), ..Default::default() };
        let job_id = db.add_job(&job).await.unwrap();

        let variant = NewVariant {
            variant_id: "v1".to_string(),
            job_id,
            base_resume_handle: "resume-1".to_string(),
            source_path: "/tmp/v1.tex".to_string(),
            keywords_added: vec!["Kubernetes".to_string()],
            ..Default::default()
        };
        let score = NewAtsScore {
            variant_id: "v1".to_string(),
            overall_score: 82.5,
            keyword_score: 90.0,
            experience_score: 80.0,
            skills_score: 75.0,
            education_score: 100.0,
            format_score: 95.0,
            missing_keywords: vec!["Terraform".to_string()],
            recommendations: vec![],
        };

        db.add_variant_with_score(&variant, &score).await.unwrap();

        let fetched_variant = db.get_variant("v1").await.unwrap().unwrap();
        assert_eq!(fetched_variant.base_resume_handle, "resume-1");

        let fetched_score = db.get_ats_score("v1").await.unwrap().unwrap();
        assert_eq!(fetched_score.overall_score, 82.5);
    }

    #[tokio::test]
    async fn application_status_update_preserves_notes_when_not_provided() {
        let db = memory_db().await;
        let job = NewJob { company: "Acme".to_string(), job_title: "Engineer".to_string(), job_description: "desc".to_string(), ..Default::default() };
        let job_id = db.add_job(&job).await.unwrap();

        let application = NewApplication {
            job_id,
            variant_id: None,
            applied_date: "2026-01-01".to_string(),
            application_method: None,
            application_url: None,
            cover_letter_path: None,
            status: ApplicationStatus::Applied,
            notes: Some("initial note".to_string()),
        };
        let application_id = db.add_application(&application).await.unwrap();

        db.update_application_status(application_id, ApplicationStatus::Interviewing, None).await.unwrap();

        let active = db.get_active_applications().await.unwrap();
        let updated = active.iter().find(|a| a.id == application_id).unwrap();
        assert_eq!(updated.status, "interviewing");
        assert_eq!(updated.notes.as_deref(), Some("initial note"));
    }

    #[tokio::test]
    async fn statistics_reflect_inserted_rows() {
        let db = memory_db().await;
        let job = NewJob { company: "Acme".to_string(), job_title: "Engineer".to_string(), job_description: "desc".to_string(), ..Default::default() };
        db.add_job(&job).await.unwrap();

        let stats = db.get_statistics().await.unwrap();
        assert_eq!(stats.total_jobs, 1);
        assert_eq!(stats.total_variants, 0);
    }

    #[tokio::test]
    async fn export_snapshot_includes_all_tables() {
        let db = memory_db().await;
        let job = NewJob { company: "Acme".to_string(), job_title: "Engineer".to_string(), job_description: "desc".to_string(), ..Default::default() };
        db.add_job(&job).await.unwrap();

        let snapshot = db.export_snapshot().await.unwrap();
        assert_eq!(snapshot.jobs.len(), 1);
        assert!(snapshot.variants.is_empty());
    }
}
