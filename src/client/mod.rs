pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::aggregate::{self, CategoryView, SemesterView};
use crate::error::AppError;
use crate::models::{CourseRecord, CreditRow, Semester};

pub use http::CurriculumHttpClient;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Accepted,
    Rejected(String),
}

/// Source of stored curriculum data and sink for submitted semesters.
///
/// `fetch_courses` reports `AppError::NotFound` when nothing matches the
/// filter; network or server failures come back as `AppError::Transport`.
#[async_trait]
pub trait CurriculumClient: Send + Sync {
    async fn fetch_courses(
        &self,
        department: &str,
        regulation: &str,
        semester: Option<Semester>,
    ) -> Result<Vec<CourseRecord>, AppError>;

    async fn fetch_courses_by_semester(
        &self,
        department: &str,
        regulation: &str,
    ) -> Result<SemesterView, AppError> {
        let courses = self.fetch_courses(department, regulation, None).await?;
        aggregate::group_by_semester(&courses)
    }

    async fn fetch_courses_by_category(
        &self,
        department: &str,
        regulation: &str,
    ) -> Result<CategoryView, AppError> {
        let courses = self.fetch_courses(department, regulation, None).await?;
        aggregate::group_by_category(&courses)
    }

    async fn submit_courses(&self, courses: &[CourseRecord]) -> Result<SubmitOutcome, AppError>;

    async fn fetch_credit_summary(
        &self,
        department: &str,
        semester: Option<Semester>,
    ) -> Result<Vec<CreditRow>, AppError>;
}
