use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::course::Category;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub code: String,
    pub name: String,
}

/// Lookup table of departments known to one institution.
///
/// Built once at start-up and shared read-only; each tenant can hand its own
/// table to the editor and the API state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    departments: Vec<Department>,
}

impl Catalog {
    pub fn new(departments: Vec<Department>) -> Result<Self, AppError> {
        let mut seen = std::collections::HashSet::new();
        for dept in &departments {
            if dept.code.trim().is_empty() {
                return Err(AppError::BadRequest("department code must not be empty".to_string()));
            }
            if !seen.insert(dept.code.as_str()) {
                return Err(AppError::BadRequest(format!("duplicate department code: {}", dept.code)));
            }
        }
        Ok(Self { departments })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::BadRequest(format!("cannot read catalog {}: {}", path.display(), e))
        })?;
        let departments: Vec<Department> = serde_json::from_str(&raw)?;
        Self::new(departments)
    }

    pub fn departments(&self) -> &[Department] {
        &self.departments
    }

    pub fn contains(&self, code: &str) -> bool {
        self.departments.iter().any(|d| d.code == code)
    }

    pub fn name_of(&self, code: &str) -> Option<&str> {
        self.departments
            .iter()
            .find(|d| d.code == code)
            .map(|d| d.name.as_str())
    }

    pub fn require(&self, code: &str) -> Result<(), AppError> {
        if self.contains(code) {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!("unknown department: {}", code)))
        }
    }

    pub fn category_label(category: Category) -> &'static str {
        match category {
            Category::Hsmc => "Humanities & Social Science Courses (HSMC)",
            Category::Bsc => "Basic Science Courses (BSC)",
            Category::Esc => "Engineering Science Courses (ESC)",
            Category::Pcc => "Program Core Courses (PCC)",
            Category::Pec => "Professional Elective Courses (PEC)",
            Category::Oec => "Open Elective Courses (OEC)",
            Category::Eec => "Employability Enhancement Courses (EEC)",
            Category::Mc => "Mandatory Courses (MC)",
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        let departments = [
            ("CSE", "Computer Science and Engineering"),
            ("AIML", "Artificial Intelligence and Machine Learning"),
            ("AIDS", "Artificial Intelligence and Data Science"),
            ("IT", "Information Technology"),
            ("CSBS", "Computer Science and Business Systems"),
            ("CYS", "Cyber Security"),
            ("ECE", "Electronics and Communication Engineering"),
            ("EEE", "Electrical and Electronics Engineering"),
            ("ACT", "Advanced Communication Technology"),
            ("VLSI", "VLSI Design and Technology"),
            ("MECH", "Mechanical Engineering"),
            ("MCT", "Mechatronics"),
            ("CIVIL", "Civil Engineering"),
            ("BIOMED", "Biomedical Engineering"),
        ]
        .into_iter()
        .map(|(code, name)| Department {
            code: code.to_string(),
            name: name.to_string(),
        })
        .collect();

        Self { departments }
    }
}
