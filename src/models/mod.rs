pub mod catalog;
pub mod course;

pub use catalog::{Catalog, Department};
pub use course::{
    Category, CommonalityType, CourseRecord, CreditRow, Semester, TheoryOrPractical, non_blank,
    valid_credits,
};
