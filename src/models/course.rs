use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Semester number, always within 1..=8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Semester(u8);

impl Semester {
    pub const FIRST: u8 = 1;
    pub const LAST: u8 = 8;

    pub fn new(value: u8) -> Result<Self, AppError> {
        if (Self::FIRST..=Self::LAST).contains(&value) {
            Ok(Self(value))
        } else {
            Err(AppError::BadRequest(format!(
                "semester must be between {} and {}, got {}",
                Self::FIRST,
                Self::LAST,
                value
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Every semester of a programme, in order.
    pub fn all() -> impl Iterator<Item = Semester> {
        (Self::FIRST..=Self::LAST).map(Semester)
    }
}

impl TryFrom<u8> for Semester {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Semester::new(value)
    }
}

impl From<Semester> for u8 {
    fn from(value: Semester) -> Self {
        value.0
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Hsmc,
    Bsc,
    Esc,
    Pcc,
    Pec,
    Oec,
    Eec,
    Mc,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Hsmc,
        Category::Bsc,
        Category::Esc,
        Category::Pcc,
        Category::Pec,
        Category::Oec,
        Category::Eec,
        Category::Mc,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Category::Hsmc => "HSMC",
            Category::Bsc => "BSC",
            Category::Esc => "ESC",
            Category::Pcc => "PCC",
            Category::Pec => "PEC",
            Category::Oec => "OEC",
            Category::Eec => "EEC",
            Category::Mc => "MC",
        }
    }

    pub fn parse(raw: &str) -> Option<Category> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TheoryOrPractical {
    #[default]
    Theory,
    Practical,
    #[serde(rename = "Theory cum Practical")]
    TheoryCumPractical,
}

impl TheoryOrPractical {
    pub fn as_str(self) -> &'static str {
        match self {
            TheoryOrPractical::Theory => "Theory",
            TheoryOrPractical::Practical => "Practical",
            TheoryOrPractical::TheoryCumPractical => "Theory cum Practical",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Theory" => Some(TheoryOrPractical::Theory),
            "Practical" => Some(TheoryOrPractical::Practical),
            "Theory cum Practical" | "TheoryCumPractical" => {
                Some(TheoryOrPractical::TheoryCumPractical)
            }
            _ => None,
        }
    }
}

/// Whether a course belongs to one department (`Gate`) or is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommonalityType {
    #[default]
    Gate,
    Common,
    Both,
}

impl CommonalityType {
    pub fn as_str(self) -> &'static str {
        match self {
            CommonalityType::Gate => "Gate",
            CommonalityType::Common => "Common",
            CommonalityType::Both => "Both",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Gate" => Some(CommonalityType::Gate),
            "Common" => Some(CommonalityType::Common),
            "Both" => Some(CommonalityType::Both),
            _ => None,
        }
    }

    pub fn is_shared(self) -> bool {
        !matches!(self, CommonalityType::Gate)
    }
}

/// One curriculum entry. Blank fields are `None` while a draft is in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub serial_number: u32,
    pub department: String,
    pub regulation: String,
    pub semester: Semester,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub course_name: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub theory_or_practical: TheoryOrPractical,
    #[serde(default)]
    pub commonality_type: CommonalityType,
    #[serde(default)]
    pub common_departments: BTreeSet<String>,
    #[serde(default)]
    pub credits: Option<f64>,
    #[serde(default)]
    pub ltp: String,
}

impl CourseRecord {
    /// Empty row used to pad a semester draft.
    pub fn placeholder(
        serial_number: u32,
        department: impl Into<String>,
        regulation: impl Into<String>,
        semester: Semester,
    ) -> Self {
        Self {
            serial_number,
            department: department.into(),
            regulation: regulation.into(),
            semester,
            course_code: None,
            course_name: None,
            category: None,
            theory_or_practical: TheoryOrPractical::default(),
            commonality_type: CommonalityType::default(),
            common_departments: BTreeSet::new(),
            credits: None,
            ltp: String::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.course_code.is_some()
            && self.course_name.is_some()
            && self.category.is_some()
            && self.credits.is_some()
    }

    pub fn is_blank(&self) -> bool {
        self.course_code.is_none()
            && self.course_name.is_none()
            && self.category.is_none()
            && self.credits.is_none()
            && self.ltp.is_empty()
    }
}

/// A single `{category, credits}` row as reported by a credit summary query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditRow {
    pub category: Option<Category>,
    pub credits: Option<f64>,
}

impl From<&CourseRecord> for CreditRow {
    fn from(record: &CourseRecord) -> Self {
        Self {
            category: record.category,
            credits: record.credits,
        }
    }
}

/// Treats empty and whitespace-only text as blank.
pub fn non_blank(raw: impl Into<String>) -> Option<String> {
    let raw = raw.into();
    if raw.trim().is_empty() { None } else { Some(raw) }
}

/// Credits are finite and never negative.
pub fn valid_credits(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}
