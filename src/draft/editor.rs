use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::{self, SEMESTER_CREDIT_CEILING, SEMESTER_ROW_LIMIT};
use crate::client::{CurriculumClient, SubmitOutcome};
use crate::draft::store::{DraftKey, DraftStore};
use crate::error::AppError;
use crate::models::{
    Catalog, Category, CommonalityType, CourseRecord, Semester, TheoryOrPractical, non_blank,
    valid_credits,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorState {
    Empty,
    Loaded,
    Editing,
    Submitting,
    Submitted,
}

/// Where the working set came from on the last `load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    Draft,
    Remote,
    Placeholder,
}

/// One field assignment on a course row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldUpdate {
    CourseCode(Option<String>),
    CourseName(Option<String>),
    Category(Option<Category>),
    TheoryOrPractical(TheoryOrPractical),
    CommonalityType(CommonalityType),
    CommonDepartments(BTreeSet<String>),
    Credits(Option<f64>),
    Ltp(String),
}

impl FieldUpdate {
    /// Builds an update from a form field name and its raw text.
    pub fn parse(field: &str, raw: &str) -> Result<Self, AppError> {
        let update = match field {
            "course_code" => FieldUpdate::CourseCode(non_blank(raw)),
            "course_name" => FieldUpdate::CourseName(non_blank(raw)),
            "category" => {
                if raw.trim().is_empty() {
                    FieldUpdate::Category(None)
                } else {
                    let category = Category::parse(raw)
                        .ok_or_else(|| AppError::BadRequest(format!("unknown category: {}", raw)))?;
                    FieldUpdate::Category(Some(category))
                }
            }
            "tp" | "theory_or_practical" => FieldUpdate::TheoryOrPractical(
                TheoryOrPractical::parse(raw)
                    .ok_or_else(|| AppError::BadRequest(format!("unknown course type: {}", raw)))?,
            ),
            "gate_common" | "commonality_type" => FieldUpdate::CommonalityType(
                CommonalityType::parse(raw)
                    .ok_or_else(|| AppError::BadRequest(format!("unknown commonality: {}", raw)))?,
            ),
            "common_dept" | "common_departments" => FieldUpdate::CommonDepartments(
                raw.split(',')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            "credits" => FieldUpdate::Credits(parse_credits(raw)?),
            "ltp" => FieldUpdate::Ltp(raw.to_string()),
            other => return Err(AppError::BadRequest(format!("unknown field: {}", other))),
        };
        Ok(update)
    }
}

fn parse_credits(raw: &str) -> Result<Option<f64>, AppError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => check_credits(value).map(Some),
        // blank or non-numeric input stays blank
        _ => Ok(None),
    }
}

fn check_credits(value: f64) -> Result<f64, AppError> {
    if valid_credits(value) {
        Ok(value)
    } else {
        Err(AppError::BadRequest(format!(
            "credits must be a non-negative number, got {}",
            value
        )))
    }
}

/// Working copy of one semester's course list during interactive entry.
///
/// Every edit is written through to the draft store, so a draft survives
/// until the semester is accepted by the curriculum client.
pub struct DraftEditor {
    client: Arc<dyn CurriculumClient>,
    store: Arc<dyn DraftStore>,
    catalog: Arc<Catalog>,
    department: String,
    regulation: String,
    semester: Semester,
    credit_ceiling: f64,
    records: Vec<CourseRecord>,
    state: EditorState,
}

impl DraftEditor {
    pub fn new(
        client: Arc<dyn CurriculumClient>,
        store: Arc<dyn DraftStore>,
        catalog: Arc<Catalog>,
        department: impl Into<String>,
        regulation: impl Into<String>,
        semester: Semester,
    ) -> Self {
        Self {
            client,
            store,
            catalog,
            department: department.into(),
            regulation: regulation.into(),
            semester,
            credit_ceiling: SEMESTER_CREDIT_CEILING,
            records: Vec::new(),
            state: EditorState::Empty,
        }
    }

    pub fn with_credit_ceiling(mut self, ceiling: f64) -> Self {
        self.credit_ceiling = ceiling;
        self
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn records(&self) -> &[CourseRecord] {
        &self.records
    }

    pub fn semester(&self) -> Semester {
        self.semester
    }

    pub fn total_credits(&self) -> f64 {
        aggregate::total_credits(&self.records)
    }

    fn key(&self) -> DraftKey {
        DraftKey::new(self.semester)
    }

    fn placeholder(&self, serial_number: u32) -> CourseRecord {
        CourseRecord::placeholder(
            serial_number,
            self.department.clone(),
            self.regulation.clone(),
            self.semester,
        )
    }

    /// Populates the working set from the local draft, or from the client
    /// when no draft exists.
    ///
    /// On a transport failure the editor is still seeded with a single
    /// placeholder row and remains usable; the error is handed back so the
    /// caller can show it.
    pub async fn load(&mut self) -> Result<LoadSource, AppError> {
        if let Some(draft) = self.store.get(self.key()).await? {
            info!("loaded {} draft rows for {}", draft.len(), self.key());
            self.records = draft;
            self.state = EditorState::Loaded;
            return Ok(LoadSource::Draft);
        }

        let fetched = self
            .client
            .fetch_courses(&self.department, &self.regulation, Some(self.semester))
            .await;

        let outcome = match fetched.and_then(|rows| self.reconcile(rows)) {
            Ok(rows) if !rows.is_empty() => {
                self.records = rows;
                Ok(LoadSource::Remote)
            }
            Ok(_) => {
                self.records = vec![self.placeholder(1)];
                Ok(LoadSource::Placeholder)
            }
            Err(e) if e.is_empty_state() => {
                self.records = vec![self.placeholder(1)];
                Ok(LoadSource::Placeholder)
            }
            Err(e) => {
                warn!(
                    "failed to fetch semester {} for {}/{}: {}",
                    self.semester, self.department, self.regulation, e
                );
                self.records = vec![self.placeholder(1)];
                Err(e)
            }
        };

        self.state = EditorState::Loaded;
        outcome
    }

    /// Lays rows out over `1..=max(serial)`, padding gaps with placeholders.
    /// An empty input stays empty.
    fn reconcile(&self, rows: Vec<CourseRecord>) -> Result<Vec<CourseRecord>, AppError> {
        let Some(max_serial) = rows.iter().map(|r| r.serial_number).max() else {
            return Ok(Vec::new());
        };
        if max_serial > SEMESTER_ROW_LIMIT {
            return Err(AppError::BadRequest(format!(
                "course serial {} is beyond the {} rows a semester may hold",
                max_serial, SEMESTER_ROW_LIMIT
            )));
        }
        let mut slots: Vec<Option<CourseRecord>> = vec![None; max_serial.max(1) as usize];

        for row in rows {
            if row.serial_number == 0 {
                warn!("dropping course row without a serial number");
                continue;
            }
            let slot = &mut slots[row.serial_number as usize - 1];
            if slot.is_none() {
                *slot = Some(row);
            }
        }

        Ok(slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.unwrap_or_else(|| self.placeholder(i as u32 + 1)))
            .collect())
    }

    fn ensure_editable(&self) -> Result<(), AppError> {
        match self.state {
            EditorState::Submitted => Err(AppError::Conflict(format!(
                "semester {} has already been submitted",
                self.semester
            ))),
            EditorState::Submitting => Err(AppError::Conflict(format!(
                "semester {} is being submitted",
                self.semester
            ))),
            _ => Ok(()),
        }
    }

    pub async fn add_row(&mut self) -> Result<&CourseRecord, AppError> {
        self.ensure_editable()?;
        let serial = self.records.len() as u32 + 1;
        if serial > SEMESTER_ROW_LIMIT {
            return Err(AppError::BadRequest(format!(
                "a semester holds at most {} courses",
                SEMESTER_ROW_LIMIT
            )));
        }
        let row = self.placeholder(serial);
        self.records.push(row);
        self.state = EditorState::Editing;
        self.persist().await?;
        Ok(&self.records[self.records.len() - 1])
    }

    pub async fn set_field(&mut self, index: usize, update: FieldUpdate) -> Result<(), AppError> {
        self.ensure_editable()?;
        match &update {
            FieldUpdate::CommonDepartments(depts) => {
                for dept in depts {
                    self.catalog.require(dept)?;
                }
                if !depts.is_empty() {
                    self.require_shared(index)?;
                }
            }
            FieldUpdate::Credits(Some(value)) => {
                check_credits(*value)?;
            }
            _ => {}
        }

        let record = self.record_mut(index)?;
        match update {
            FieldUpdate::CourseCode(v) => record.course_code = v,
            FieldUpdate::CourseName(v) => record.course_name = v,
            FieldUpdate::Category(v) => record.category = v,
            FieldUpdate::TheoryOrPractical(v) => record.theory_or_practical = v,
            FieldUpdate::CommonalityType(v) => {
                record.commonality_type = v;
                record.common_departments.clear();
            }
            FieldUpdate::CommonDepartments(v) => record.common_departments = v,
            FieldUpdate::Credits(v) => record.credits = v,
            FieldUpdate::Ltp(v) => record.ltp = v,
        }

        self.state = EditorState::Editing;
        self.persist().await
    }

    pub async fn toggle_common_department(&mut self, index: usize, dept: &str) -> Result<(), AppError> {
        self.ensure_editable()?;
        self.catalog.require(dept)?;
        self.require_shared(index)?;

        let record = self.record_mut(index)?;
        if !record.common_departments.remove(dept) {
            record.common_departments.insert(dept.to_string());
        }

        self.state = EditorState::Editing;
        self.persist().await
    }

    /// Common departments only apply to courses shared across departments.
    fn require_shared(&self, index: usize) -> Result<(), AppError> {
        match self.records.get(index) {
            Some(record) if !record.commonality_type.is_shared() => Err(AppError::BadRequest(
                format!(
                    "course {} is {} and has no common departments",
                    record.serial_number,
                    record.commonality_type.as_str()
                ),
            )),
            _ => Ok(()),
        }
    }

    fn record_mut(&mut self, index: usize) -> Result<&mut CourseRecord, AppError> {
        let len = self.records.len();
        self.records
            .get_mut(index)
            .ok_or_else(|| AppError::BadRequest(format!("row {} out of range (have {})", index, len)))
    }

    async fn persist(&self) -> Result<(), AppError> {
        self.store.set(self.key(), &self.records).await
    }

    /// Sends the semester to the client once it fits the credit ceiling.
    ///
    /// Nothing is discarded on failure: the rows stay in memory and in the
    /// draft store until the client accepts them.
    pub async fn submit(&mut self) -> Result<(), AppError> {
        self.ensure_editable()?;

        if let Err(e) = aggregate::check_credit_budget(&self.records, self.credit_ceiling) {
            warn!("semester {} rejected locally: {}", self.semester, e);
            self.state = EditorState::Editing;
            return Err(e);
        }

        self.state = EditorState::Submitting;
        let result = self.client.submit_courses(&self.records).await;

        match result {
            Ok(SubmitOutcome::Accepted) => {
                if let Err(e) = self.store.clear(self.key()).await {
                    warn!("submitted semester {} but could not clear draft: {}", self.semester, e);
                }
                info!(
                    "submitted {} courses for semester {} ({}/{})",
                    self.records.len(),
                    self.semester,
                    self.department,
                    self.regulation
                );
                self.state = EditorState::Submitted;
                Ok(())
            }
            Ok(SubmitOutcome::Rejected(reason)) => {
                self.state = EditorState::Editing;
                Err(AppError::SubmissionFailed(reason))
            }
            Err(e) => {
                self.state = EditorState::Editing;
                Err(AppError::SubmissionFailed(e.to_string()))
            }
        }
    }
}
