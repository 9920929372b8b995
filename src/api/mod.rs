use std::collections::BTreeMap;

use axum::Json;
use axum::extract::Query;
use axum::routing::get;
use axum::{Router, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::aggregate::{self, CategoryShare, CategoryView, SemesterView};
use crate::client::SubmitOutcome;
use crate::error::AppError;
use crate::models::*;
use crate::state::AppState;

#[derive(Deserialize)]
struct ScopeParams {
    department: Option<String>,
    regulation: Option<String>,
    semester: Option<u8>,
}

#[derive(Deserialize)]
struct SubmitCoursesBody {
    courses: Vec<CourseRecord>,
}

#[derive(Serialize)]
struct CategoryLabel {
    code: Category,
    label: &'static str,
}

#[derive(Serialize)]
struct CatalogResponse {
    departments: Vec<Department>,
    categories: Vec<CategoryLabel>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/departments", get(list_departments))
        .route("/api/credits", get(credit_breakdown))
        .route("/api/credits/summary", get(credit_summary))
        .route("/api/credits/semester", get(semester_totals))
        .route("/api/courses/semester", get(courses_by_semester))
        .route("/api/courses/category", get(courses_by_category))
        .route("/semester-details", get(semester_details).post(submit_semester))
        .with_state(state)
}

fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("Missing {} parameter", name)))
}

impl ScopeParams {
    fn department(&self, state: &AppState) -> Result<String, AppError> {
        let department = required(self.department.clone(), "department")?;
        state.catalog.require(&department)?;
        Ok(department)
    }

    fn regulation(&self) -> Result<String, AppError> {
        required(self.regulation.clone(), "regulation")
    }

    fn semester(&self) -> Result<Option<Semester>, AppError> {
        self.semester.map(Semester::new).transpose()
    }
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn list_departments(State(state): State<AppState>) -> Json<CatalogResponse> {
    Json(CatalogResponse {
        departments: state.catalog.departments().to_vec(),
        categories: Category::ALL
            .into_iter()
            .map(|code| CategoryLabel {
                code,
                label: Catalog::category_label(code),
            })
            .collect(),
    })
}

async fn credit_breakdown(
    State(state): State<AppState>,
    Query(params): Query<ScopeParams>,
) -> Result<Json<Vec<CategoryShare>>, AppError> {
    let department = params.department(&state)?;
    let rows = state
        .curriculum
        .fetch_credit_summary(&department, params.semester()?)
        .await?;
    Ok(Json(aggregate::credit_breakdown_rows(&rows)?))
}

async fn credit_summary(
    State(state): State<AppState>,
    Query(params): Query<ScopeParams>,
) -> Result<Json<Vec<CreditRow>>, AppError> {
    let department = params.department(&state)?;
    let rows = state
        .curriculum
        .fetch_credit_summary(&department, params.semester()?)
        .await?;
    Ok(Json(rows))
}

/// Credit sum per semester for one department and regulation.
async fn semester_totals(
    State(state): State<AppState>,
    Query(params): Query<ScopeParams>,
) -> Result<Json<BTreeMap<Semester, f64>>, AppError> {
    let department = params.department(&state)?;
    let regulation = params.regulation()?;
    let courses = state
        .curriculum
        .fetch_courses(&department, &regulation, None)
        .await?;
    Ok(Json(aggregate::semester_credit_totals(&courses)))
}

async fn courses_by_semester(
    State(state): State<AppState>,
    Query(params): Query<ScopeParams>,
) -> Result<Json<SemesterView>, AppError> {
    let department = params.department(&state)?;
    let regulation = params.regulation()?;
    let view = state
        .curriculum
        .fetch_courses_by_semester(&department, &regulation)
        .await?;
    Ok(Json(view))
}

async fn courses_by_category(
    State(state): State<AppState>,
    Query(params): Query<ScopeParams>,
) -> Result<Json<CategoryView>, AppError> {
    let department = params.department(&state)?;
    let regulation = params.regulation()?;
    let view = state
        .curriculum
        .fetch_courses_by_category(&department, &regulation)
        .await?;
    Ok(Json(view))
}

async fn semester_details(
    State(state): State<AppState>,
    Query(params): Query<ScopeParams>,
) -> Result<Json<Vec<CourseRecord>>, AppError> {
    let department = params.department(&state)?;
    let regulation = params.regulation()?;
    let courses = state
        .curriculum
        .fetch_courses(&department, &regulation, params.semester()?)
        .await?;
    Ok(Json(courses))
}

async fn submit_semester(
    State(state): State<AppState>,
    Json(body): Json<SubmitCoursesBody>,
) -> Result<(StatusCode, Json<SubmitOutcome>), AppError> {
    for course in &body.courses {
        state.catalog.require(&course.department)?;
        for dept in &course.common_departments {
            state.catalog.require(dept)?;
        }
    }

    match state.curriculum.submit_courses(&body.courses).await? {
        SubmitOutcome::Accepted => Ok((StatusCode::CREATED, Json(SubmitOutcome::Accepted))),
        SubmitOutcome::Rejected(reason) => Err(AppError::BadRequest(reason)),
    }
}
