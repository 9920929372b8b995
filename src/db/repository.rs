use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tracing::{error, info};
use uuid::Uuid;

use crate::aggregate::{self, SEMESTER_CREDIT_CEILING, SEMESTER_ROW_LIMIT};
use crate::client::{CurriculumClient, SubmitOutcome};
use crate::error::AppError;
use crate::models::{
    Category, CommonalityType, CourseRecord, CreditRow, Semester, TheoryOrPractical,
    valid_credits,
};

#[derive(Debug, FromRow)]
struct CourseRow {
    department: String,
    regulation: String,
    semester: i64,
    serial_number: i64,
    course_code: Option<String>,
    course_name: Option<String>,
    category: Option<String>,
    theory_or_practical: String,
    commonality_type: String,
    common_departments: String,
    credits: Option<f64>,
    ltp: String,
}

impl CourseRow {
    fn into_record(self) -> Result<CourseRecord, AppError> {
        let semester = u8::try_from(self.semester)
            .map_err(|_| corrupt("semester", &self.semester.to_string()))
            .and_then(Semester::new)?;
        let serial_number = u32::try_from(self.serial_number)
            .map_err(|_| corrupt("serial_number", &self.serial_number.to_string()))?;
        let category = match self.category.as_deref() {
            Some(raw) => Some(Category::parse(raw).ok_or_else(|| corrupt("category", raw))?),
            None => None,
        };
        let theory_or_practical = TheoryOrPractical::parse(&self.theory_or_practical)
            .ok_or_else(|| corrupt("theory_or_practical", &self.theory_or_practical))?;
        let commonality_type = CommonalityType::parse(&self.commonality_type)
            .ok_or_else(|| corrupt("commonality_type", &self.commonality_type))?;

        Ok(CourseRecord {
            serial_number,
            department: self.department,
            regulation: self.regulation,
            semester,
            course_code: self.course_code,
            course_name: self.course_name,
            category,
            theory_or_practical,
            commonality_type,
            common_departments: serde_json::from_str(&self.common_departments)?,
            credits: self.credits,
            ltp: self.ltp,
        })
    }
}

fn corrupt(column: &str, value: &str) -> AppError {
    error!("unexpected value in courses.{}: {:?}", column, value);
    AppError::InternalServerError
}

pub async fn fetch_courses(
    db: &SqlitePool,
    department: &str,
    regulation: &str,
    semester: Option<Semester>,
) -> Result<Vec<CourseRecord>, AppError> {
    let rows = sqlx::query_as::<_, CourseRow>(
        r#"
        SELECT department, regulation, semester, serial_number, course_code, course_name,
               category, theory_or_practical, commonality_type, common_departments, credits, ltp
        FROM courses
        WHERE department = ?1 AND regulation = ?2 AND (?3 IS NULL OR semester = ?3)
        ORDER BY semester, serial_number
        "#,
    )
    .bind(department)
    .bind(regulation)
    .bind(semester.map(|s| i64::from(s.get())))
    .fetch_all(db)
    .await?;

    rows.into_iter().map(CourseRow::into_record).collect()
}

pub async fn fetch_credit_rows(
    db: &SqlitePool,
    department: &str,
    semester: Option<Semester>,
) -> Result<Vec<CreditRow>, AppError> {
    let rows: Vec<(Option<String>, Option<f64>)> = sqlx::query_as(
        r#"
        SELECT category, credits
        FROM courses
        WHERE department = ?1 AND (?2 IS NULL OR semester = ?2)
        ORDER BY semester, serial_number
        "#,
    )
    .bind(department)
    .bind(semester.map(|s| i64::from(s.get())))
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(category, credits)| CreditRow {
            category: category.as_deref().and_then(Category::parse),
            credits,
        })
        .collect())
}

/// Replaces everything stored for the batch's department, regulation and
/// semester with the batch itself.
pub async fn replace_semester(db: &SqlitePool, courses: &[CourseRecord]) -> Result<usize, AppError> {
    let Some(first) = courses.first() else {
        return Ok(0);
    };
    let now = Utc::now().to_rfc3339();
    let semester = i64::from(first.semester.get());

    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM courses WHERE department = ?1 AND regulation = ?2 AND semester = ?3")
        .bind(&first.department)
        .bind(&first.regulation)
        .bind(semester)
        .execute(&mut *tx)
        .await?;

    for course in courses {
        let common_departments = serde_json::to_string(&course.common_departments)?;
        sqlx::query(
            r#"
            INSERT INTO courses
                (id, department, regulation, semester, serial_number, course_code, course_name,
                category, theory_or_practical, commonality_type, common_departments, credits,
                ltp, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&course.department)
        .bind(&course.regulation)
        .bind(semester)
        .bind(i64::from(course.serial_number))
        .bind(&course.course_code)
        .bind(&course.course_name)
        .bind(course.category.map(Category::code))
        .bind(course.theory_or_practical.as_str())
        .bind(course.commonality_type.as_str())
        .bind(common_departments)
        .bind(course.credits)
        .bind(&course.ltp)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(courses.len())
}

/// Checks a submitted batch before it may replace a stored semester.
///
/// Serial numbers must run densely over `1..=len`.
pub fn validate_batch(courses: &[CourseRecord]) -> Result<(), String> {
    let Some(first) = courses.first() else {
        return Err("no courses submitted".to_string());
    };
    if courses.len() > SEMESTER_ROW_LIMIT as usize {
        return Err(format!(
            "a semester holds at most {} courses, got {}",
            SEMESTER_ROW_LIMIT,
            courses.len()
        ));
    }

    let mut serials = HashSet::new();
    for course in courses {
        if course.department != first.department
            || course.regulation != first.regulation
            || course.semester != first.semester
        {
            return Err("all courses must share department, regulation and semester".to_string());
        }
        if course.serial_number == 0 {
            return Err("serial numbers start at 1".to_string());
        }
        if course.serial_number as usize > courses.len() {
            return Err(format!(
                "serial number {} is outside 1..={}",
                course.serial_number,
                courses.len()
            ));
        }
        if !serials.insert(course.serial_number) {
            return Err(format!("duplicate serial number {}", course.serial_number));
        }
        if course.credits.is_some_and(|c| !valid_credits(c)) {
            return Err(format!("invalid credits on course {}", course.serial_number));
        }
    }

    aggregate::check_credit_budget(courses, SEMESTER_CREDIT_CEILING)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Curriculum store backed by the local SQLite database.
#[derive(Clone)]
pub struct SqliteCurriculum {
    db: SqlitePool,
}

impl SqliteCurriculum {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CurriculumClient for SqliteCurriculum {
    async fn fetch_courses(
        &self,
        department: &str,
        regulation: &str,
        semester: Option<Semester>,
    ) -> Result<Vec<CourseRecord>, AppError> {
        let courses = fetch_courses(&self.db, department, regulation, semester).await?;
        if courses.is_empty() {
            return Err(AppError::NotFound);
        }
        Ok(courses)
    }

    async fn submit_courses(&self, courses: &[CourseRecord]) -> Result<SubmitOutcome, AppError> {
        if let Err(reason) = validate_batch(courses) {
            return Ok(SubmitOutcome::Rejected(reason));
        }
        let stored = replace_semester(&self.db, courses).await?;
        info!(
            "stored {} courses for {}/{} semester {}",
            stored, courses[0].department, courses[0].regulation, courses[0].semester
        );
        Ok(SubmitOutcome::Accepted)
    }

    async fn fetch_credit_summary(
        &self,
        department: &str,
        semester: Option<Semester>,
    ) -> Result<Vec<CreditRow>, AppError> {
        let rows = fetch_credit_rows(&self.db, department, semester).await?;
        if rows.is_empty() {
            return Err(AppError::NotFound);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn course(semester: u8, serial: u32, code: &str, category: Category, credits: f64) -> CourseRecord {
        let mut c = CourseRecord::placeholder(serial, "CSE", "R21", Semester::new(semester).unwrap());
        c.course_code = Some(code.to_string());
        c.course_name = Some(format!("Course {}", code));
        c.category = Some(category);
        c.credits = Some(credits);
        c.ltp = "3-0-0".to_string();
        c
    }

    #[tokio::test]
    async fn test_submit_and_fetch_semester() {
        let repo = SqliteCurriculum::new(test_pool().await);

        let mut shared = course(3, 2, "MA3401", Category::Bsc, 4.0);
        shared.commonality_type = CommonalityType::Common;
        shared.common_departments = ["IT".to_string(), "CSE".to_string()].into_iter().collect();
        let batch = vec![course(3, 1, "CS3401", Category::Pcc, 3.0), shared.clone()];

        let outcome = repo.submit_courses(&batch).await.expect("Failed to submit");
        assert_eq!(outcome, SubmitOutcome::Accepted);

        let stored = repo
            .fetch_courses("CSE", "R21", Some(Semester::new(3).unwrap()))
            .await
            .expect("Failed to fetch courses");
        assert_eq!(stored, batch);
        assert_eq!(stored[1].common_departments, shared.common_departments);
    }

    #[tokio::test]
    async fn test_resubmit_replaces_semester() {
        let repo = SqliteCurriculum::new(test_pool().await);
        let first = vec![
            course(4, 1, "A", Category::Pcc, 3.0),
            course(4, 2, "B", Category::Pcc, 3.0),
        ];
        repo.submit_courses(&first).await.unwrap();
        repo.submit_courses(&[course(4, 1, "C", Category::Esc, 2.0)])
            .await
            .unwrap();

        let stored = repo.fetch_courses("CSE", "R21", None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].course_code.as_deref(), Some("C"));
    }

    #[tokio::test]
    async fn test_missing_scope_is_not_found() {
        let repo = SqliteCurriculum::new(test_pool().await);
        assert!(matches!(
            repo.fetch_courses("MECH", "R21", None).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            repo.fetch_credit_summary("MECH", None).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_rejects_invalid_batches() {
        let repo = SqliteCurriculum::new(test_pool().await);

        let duplicate = vec![
            course(1, 1, "A", Category::Bsc, 3.0),
            course(1, 1, "B", Category::Bsc, 3.0),
        ];
        assert!(matches!(
            repo.submit_courses(&duplicate).await.unwrap(),
            SubmitOutcome::Rejected(_)
        ));

        let mixed = vec![
            course(1, 1, "A", Category::Bsc, 3.0),
            course(2, 2, "B", Category::Bsc, 3.0),
        ];
        assert!(matches!(
            repo.submit_courses(&mixed).await.unwrap(),
            SubmitOutcome::Rejected(_)
        ));

        let heavy: Vec<_> = (1..=7)
            .map(|i| course(1, i, "X", Category::Pcc, 4.0))
            .collect();
        assert!(matches!(
            repo.submit_courses(&heavy).await.unwrap(),
            SubmitOutcome::Rejected(_)
        ));
        assert!(matches!(
            repo.submit_courses(&[]).await.unwrap(),
            SubmitOutcome::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn test_rejects_sparse_serials() {
        let repo = SqliteCurriculum::new(test_pool().await);
        let semester = Semester::new(2).unwrap();

        let runaway = CourseRecord::placeholder(4_000_000_000, "CSE", "R21", semester);
        assert!(matches!(
            repo.submit_courses(&[runaway]).await.unwrap(),
            SubmitOutcome::Rejected(_)
        ));

        let gap = vec![
            course(2, 1, "A", Category::Bsc, 3.0),
            course(2, 3, "C", Category::Bsc, 3.0),
        ];
        assert!(matches!(
            repo.submit_courses(&gap).await.unwrap(),
            SubmitOutcome::Rejected(_)
        ));

        let too_many: Vec<_> = (1..=SEMESTER_ROW_LIMIT + 1)
            .map(|i| CourseRecord::placeholder(i, "CSE", "R21", semester))
            .collect();
        assert!(matches!(
            repo.submit_courses(&too_many).await.unwrap(),
            SubmitOutcome::Rejected(_)
        ));

        assert!(matches!(
            repo.fetch_courses("CSE", "R21", Some(semester)).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_rejects_unusable_credits() {
        let repo = SqliteCurriculum::new(test_pool().await);

        let nan_hides_overflow = vec![
            course(5, 1, "A", Category::Pcc, f64::NAN),
            course(5, 2, "B", Category::Pcc, 30.0),
        ];
        assert!(matches!(
            repo.submit_courses(&nan_hides_overflow).await.unwrap(),
            SubmitOutcome::Rejected(_)
        ));

        let negative_offset = vec![
            course(5, 1, "A", Category::Pcc, 30.0),
            course(5, 2, "B", Category::Pcc, -7.0),
        ];
        assert!(matches!(
            repo.submit_courses(&negative_offset).await.unwrap(),
            SubmitOutcome::Rejected(_)
        ));
        assert!(repo.fetch_courses("CSE", "R21", None).await.is_err());
    }

    #[tokio::test]
    async fn test_partial_rows_round_trip() {
        let repo = SqliteCurriculum::new(test_pool().await);
        let blank = CourseRecord::placeholder(1, "CSE", "R21", Semester::new(6).unwrap());
        repo.submit_courses(&[blank.clone()]).await.unwrap();

        let stored = repo.fetch_courses("CSE", "R21", None).await.unwrap();
        assert_eq!(stored, vec![blank]);
    }

    #[tokio::test]
    async fn test_credit_summary_and_groupings() {
        let repo = SqliteCurriculum::new(test_pool().await);
        repo.submit_courses(&[
            course(1, 1, "MA1101", Category::Bsc, 4.0),
            course(1, 2, "GE1101", Category::Esc, 3.0),
        ])
        .await
        .unwrap();
        repo.submit_courses(&[course(2, 1, "CS1201", Category::Pcc, 3.0)])
            .await
            .unwrap();

        let rows = repo.fetch_credit_summary("CSE", None).await.unwrap();
        assert_eq!(rows.len(), 3);
        let sem2 = repo
            .fetch_credit_summary("CSE", Some(Semester::new(2).unwrap()))
            .await
            .unwrap();
        assert_eq!(sem2.len(), 1);

        let by_semester = repo.fetch_courses_by_semester("CSE", "R21").await.unwrap();
        assert_eq!(by_semester.len(), 8);
        assert_eq!(by_semester[&Semester::new(1).unwrap()].len(), 2);

        let by_category = repo.fetch_courses_by_category("CSE", "R21").await.unwrap();
        assert_eq!(by_category.len(), 3);
        assert_eq!(by_category[&Category::Pcc][0].semester, Semester::new(2).unwrap());
    }
}
