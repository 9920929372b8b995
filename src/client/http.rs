use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::aggregate::{CategoryView, SemesterView};
use crate::client::{CurriculumClient, SubmitOutcome};
use crate::error::{AppError, ErrorResponse};
use crate::models::{CourseRecord, CreditRow, Semester};

#[derive(Debug, Serialize)]
struct SubmitCoursesRequest<'a> {
    courses: &'a [CourseRecord],
}

/// Talks to the curriculum HTTP API exposed by `api::router`.
pub struct CurriculumHttpClient {
    client: Client,
    base_url: String,
}

impl CurriculumHttpClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::BadRequest(format!("Failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str, params: &[(&str, Option<String>)]) -> Result<Url, AppError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| AppError::BadRequest(format!("Invalid API url: {}", e)))?;
        let present: Vec<(&str, &String)> = params
            .iter()
            .filter_map(|(name, value)| value.as_ref().map(|v| (*name, v)))
            .collect();
        if !present.is_empty() {
            url.query_pairs_mut().extend_pairs(present);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, AppError> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(AppError::NotFound);
    }
    if status.is_client_error() {
        return Err(AppError::BadRequest(error_message(response).await));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Transport(format!("Curriculum API error {}: {}", status, body)));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| AppError::Transport(format!("Failed to parse API response: {}", e)))
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.message)
        .unwrap_or_else(|_| format!("{} {}", status, body))
}

#[async_trait]
impl CurriculumClient for CurriculumHttpClient {
    async fn fetch_courses(
        &self,
        department: &str,
        regulation: &str,
        semester: Option<Semester>,
    ) -> Result<Vec<CourseRecord>, AppError> {
        let url = self.url(
            "/semester-details",
            &[
                ("department", Some(department.to_string())),
                ("regulation", Some(regulation.to_string())),
                ("semester", semester.map(|s| s.to_string())),
            ],
        )?;
        self.get_json(url).await
    }

    async fn fetch_courses_by_semester(
        &self,
        department: &str,
        regulation: &str,
    ) -> Result<SemesterView, AppError> {
        let url = self.url(
            "/api/courses/semester",
            &[
                ("department", Some(department.to_string())),
                ("regulation", Some(regulation.to_string())),
            ],
        )?;
        self.get_json(url).await
    }

    async fn fetch_courses_by_category(
        &self,
        department: &str,
        regulation: &str,
    ) -> Result<CategoryView, AppError> {
        let url = self.url(
            "/api/courses/category",
            &[
                ("department", Some(department.to_string())),
                ("regulation", Some(regulation.to_string())),
            ],
        )?;
        self.get_json(url).await
    }

    async fn submit_courses(&self, courses: &[CourseRecord]) -> Result<SubmitOutcome, AppError> {
        let url = self.url("/semester-details", &[])?;
        let response = self
            .client
            .post(url)
            .json(&SubmitCoursesRequest { courses })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(SubmitOutcome::Accepted)
        } else if status.is_client_error() {
            let reason = error_message(response).await;
            tracing::warn!("submission rejected ({}): {}", status, reason);
            Ok(SubmitOutcome::Rejected(reason))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AppError::Transport(format!("Curriculum API error {}: {}", status, body)))
        }
    }

    async fn fetch_credit_summary(
        &self,
        department: &str,
        semester: Option<Semester>,
    ) -> Result<Vec<CreditRow>, AppError> {
        let url = self.url(
            "/api/credits/summary",
            &[
                ("department", Some(department.to_string())),
                ("semester", semester.map(|s| s.to_string())),
            ],
        )?;
        self.get_json(url).await
    }
}
