use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::models::{Category, CourseRecord, CreditRow, Semester, valid_credits};

/// Credits a single semester may carry at submission.
pub const SEMESTER_CREDIT_CEILING: f64 = 26.0;

/// Most course rows one semester may hold.
pub const SEMESTER_ROW_LIMIT: u32 = 64;

/// Credits are summed in thousandths so shares are computed on exact values.
const CREDIT_SCALE: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemesterEntry {
    pub course_code: Option<String>,
    pub course_name: Option<String>,
    pub credits: Option<f64>,
    pub ltp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub semester: Semester,
    pub course_code: Option<String>,
    pub course_name: Option<String>,
    pub credits: Option<f64>,
    pub ltp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: Option<Category>,
    pub credits: f64,
    pub percentage: f64,
}

pub type SemesterView = BTreeMap<Semester, Vec<SemesterEntry>>;
pub type CategoryView = BTreeMap<Category, Vec<CategoryEntry>>;

/// Groups courses by semester. Every semester appears, empty ones included.
pub fn group_by_semester(records: &[CourseRecord]) -> Result<SemesterView, AppError> {
    if records.is_empty() {
        return Err(AppError::EmptyInput);
    }

    let mut view: SemesterView = Semester::all().map(|s| (s, Vec::new())).collect();
    for record in records {
        view.entry(record.semester).or_default().push(SemesterEntry {
            course_code: record.course_code.clone(),
            course_name: record.course_name.clone(),
            credits: record.credits,
            ltp: record.ltp.clone(),
        });
    }
    Ok(view)
}

/// Groups courses by category. Only categories that occur become keys.
pub fn group_by_category(records: &[CourseRecord]) -> Result<CategoryView, AppError> {
    if records.is_empty() {
        return Err(AppError::EmptyInput);
    }

    let mut view = CategoryView::new();
    for record in records {
        let Some(category) = record.category else {
            debug!(
                "skipping uncategorised course {} (semester {})",
                record.serial_number, record.semester
            );
            continue;
        };
        view.entry(category).or_default().push(CategoryEntry {
            semester: record.semester,
            course_code: record.course_code.clone(),
            course_name: record.course_name.clone(),
            credits: record.credits,
            ltp: record.ltp.clone(),
        });
    }
    Ok(view)
}

pub fn credit_breakdown(records: &[CourseRecord]) -> Result<Vec<CategoryShare>, AppError> {
    let rows: Vec<CreditRow> = records.iter().map(CreditRow::from).collect();
    credit_breakdown_rows(&rows)
}

/// Per-category credit totals and their share of the whole, in first-seen
/// category order. Rows without credits are left out of the sums.
pub fn credit_breakdown_rows(rows: &[CreditRow]) -> Result<Vec<CategoryShare>, AppError> {
    let mut totals: Vec<(Option<Category>, i128)> = Vec::new();
    for row in rows {
        let Some(credits) = row.credits else { continue };
        if !valid_credits(credits) {
            warn!("ignoring invalid credit value {} in breakdown", credits);
            continue;
        }
        let milli = to_milli(credits);
        match totals.iter_mut().find(|(c, _)| *c == row.category) {
            Some((_, sum)) => *sum += milli,
            None => totals.push((row.category, milli)),
        }
    }

    let total: i128 = totals.iter().map(|(_, c)| c).sum();
    if total <= 0 {
        return Err(AppError::ZeroTotal);
    }

    Ok(totals
        .into_iter()
        .map(|(category, credits)| CategoryShare {
            category,
            credits: credits as f64 / CREDIT_SCALE,
            percentage: percent_half_up(credits, total),
        })
        .collect())
}

pub fn total_credits(records: &[CourseRecord]) -> f64 {
    records.iter().filter_map(|r| r.credits).sum()
}

/// Credit sum per semester, every semester present.
pub fn semester_credit_totals(records: &[CourseRecord]) -> BTreeMap<Semester, f64> {
    let mut totals: BTreeMap<Semester, f64> = Semester::all().map(|s| (s, 0.0)).collect();
    for record in records {
        if let Some(credits) = record.credits.filter(|c| valid_credits(*c)) {
            *totals.entry(record.semester).or_default() += credits;
        }
    }
    totals
}

/// Fails when any credit value is unusable or the sum is over `ceiling`.
pub fn check_credit_budget(records: &[CourseRecord], ceiling: f64) -> Result<f64, AppError> {
    if let Some(bad) = records
        .iter()
        .find(|r| r.credits.is_some_and(|c| !valid_credits(c)))
    {
        return Err(AppError::BadRequest(format!(
            "course {} has invalid credits",
            bad.serial_number
        )));
    }

    let total = total_credits(records);
    if !total.is_finite() {
        return Err(AppError::BadRequest("total credits are out of range".to_string()));
    }
    if total > ceiling {
        Err(AppError::CreditBudgetExceeded { total })
    } else {
        Ok(total)
    }
}

fn to_milli(credits: f64) -> i128 {
    // saturating cast; inputs are already finite and non-negative
    i128::from((credits * CREDIT_SCALE).round() as i64)
}

/// `part / whole` as a percentage, rounded half-up to two places on exact
/// integers.
fn percent_half_up(part: i128, whole: i128) -> f64 {
    let scaled = part * 10_000;
    let hundredths = (2 * scaled + whole) / (2 * whole);
    hundredths as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(semester: u8, category: Option<Category>, credits: Option<f64>) -> CourseRecord {
        let mut record =
            CourseRecord::placeholder(1, "CSE", "R21", Semester::new(semester).unwrap());
        record.category = category;
        record.credits = credits;
        record.course_code = Some(format!("C{}", semester));
        record
    }

    #[test]
    fn semester_view_covers_all_semesters() {
        let records = vec![
            course(1, Some(Category::Bsc), Some(4.0)),
            course(1, Some(Category::Esc), Some(3.0)),
            course(5, Some(Category::Pcc), Some(3.0)),
        ];
        let view = group_by_semester(&records).unwrap();

        let keys: Vec<u8> = view.keys().map(|s| s.get()).collect();
        assert_eq!(keys, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(view.values().map(Vec::len).sum::<usize>(), records.len());
        assert_eq!(view[&Semester::new(1).unwrap()].len(), 2);
        assert!(view[&Semester::new(2).unwrap()].is_empty());
    }

    #[test]
    fn semester_view_keeps_input_order() {
        let mut a = course(2, Some(Category::Pcc), Some(3.0));
        a.course_code = Some("B".to_string());
        let mut b = course(2, Some(Category::Pcc), Some(3.0));
        b.course_code = Some("A".to_string());
        let view = group_by_semester(&[a, b]).unwrap();
        let codes: Vec<_> = view[&Semester::new(2).unwrap()]
            .iter()
            .map(|e| e.course_code.clone().unwrap())
            .collect();
        assert_eq!(codes, vec!["B", "A"]);
    }

    #[test]
    fn empty_input_is_reported() {
        assert!(matches!(group_by_semester(&[]), Err(AppError::EmptyInput)));
        assert!(matches!(group_by_category(&[]), Err(AppError::EmptyInput)));
    }

    #[test]
    fn category_view_has_only_present_categories() {
        let records = vec![
            course(1, Some(Category::Bsc), Some(4.0)),
            course(3, Some(Category::Pcc), Some(3.0)),
            course(4, Some(Category::Pcc), Some(3.0)),
            course(4, None, Some(2.0)),
        ];
        let view = group_by_category(&records).unwrap();
        let keys: Vec<Category> = view.keys().copied().collect();
        assert_eq!(keys, vec![Category::Bsc, Category::Pcc]);

        let semesters: Vec<u8> = view[&Category::Pcc].iter().map(|e| e.semester.get()).collect();
        assert_eq!(semesters, vec![3, 4]);
    }

    #[test]
    fn duplicate_codes_count_separately() {
        let records = vec![
            course(1, Some(Category::Pcc), Some(3.0)),
            course(1, Some(Category::Pcc), Some(3.0)),
        ];
        let view = group_by_category(&records).unwrap();
        assert_eq!(view[&Category::Pcc].len(), 2);
        let shares = credit_breakdown(&records).unwrap();
        assert_eq!(shares[0].credits, 6.0);
    }

    #[test]
    fn breakdown_matches_worked_example() {
        let records = vec![
            course(1, Some(Category::Pcc), Some(4.0)),
            course(1, Some(Category::Bsc), Some(3.0)),
            course(2, Some(Category::Pcc), Some(3.0)),
        ];
        let shares = credit_breakdown(&records).unwrap();
        assert_eq!(
            shares,
            vec![
                CategoryShare {
                    category: Some(Category::Pcc),
                    credits: 7.0,
                    percentage: 70.0
                },
                CategoryShare {
                    category: Some(Category::Bsc),
                    credits: 3.0,
                    percentage: 30.0
                },
            ]
        );
    }

    #[test]
    fn breakdown_percentages_sum_to_hundred() {
        let records = vec![
            course(1, Some(Category::Hsmc), Some(1.0)),
            course(1, Some(Category::Bsc), Some(1.0)),
            course(1, Some(Category::Esc), Some(1.0)),
            course(2, Some(Category::Pcc), Some(4.5)),
            course(2, None, Some(2.0)),
        ];
        let shares = credit_breakdown(&records).unwrap();
        let sum: f64 = shares.iter().map(|s| s.percentage).sum();
        assert!((sum - 100.0).abs() <= 0.01 * shares.len() as f64);
        assert!(shares.iter().any(|s| s.category.is_none()));
    }

    #[test]
    fn breakdown_skips_blank_credits() {
        let records = vec![
            course(1, Some(Category::Pcc), Some(4.0)),
            course(1, Some(Category::Bsc), None),
        ];
        let shares = credit_breakdown(&records).unwrap();
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].percentage, 100.0);
    }

    #[test]
    fn zero_total_is_an_error_not_nan() {
        let records = vec![
            course(1, Some(Category::Mc), Some(0.0)),
            course(1, Some(Category::Mc), None),
        ];
        assert!(matches!(credit_breakdown(&records), Err(AppError::ZeroTotal)));
        assert!(matches!(credit_breakdown(&[]), Err(AppError::ZeroTotal)));
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(percent_half_up(1, 3), 33.33);
        assert_eq!(percent_half_up(2, 3), 66.67);
        assert_eq!(percent_half_up(1, 800), 0.13);
    }

    #[test]
    fn shares_on_a_boundary_round_up() {
        // 23/160 is exactly 14.375 percent
        let records = vec![
            course(1, Some(Category::Pcc), Some(23.0)),
            course(2, Some(Category::Bsc), Some(137.0)),
        ];
        let shares = credit_breakdown(&records).unwrap();
        assert_eq!(shares[0].percentage, 14.38);
        assert_eq!(shares[1].percentage, 85.63);

        let records = vec![
            course(1, Some(Category::Pcc), Some(41.0)),
            course(1, Some(Category::Esc), Some(51.0)),
            course(2, Some(Category::Bsc), Some(68.0)),
        ];
        let shares = credit_breakdown(&records).unwrap();
        assert_eq!(shares[0].percentage, 25.63);
        assert_eq!(shares[1].percentage, 31.88);
        assert_eq!(shares[2].percentage, 42.5);

        let records = vec![
            course(1, Some(Category::Pcc), Some(11.5)),
            course(1, Some(Category::Bsc), Some(68.5)),
        ];
        let shares = credit_breakdown(&records).unwrap();
        assert_eq!(shares[0].credits, 11.5);
        assert_eq!(shares[0].percentage, 14.38);
    }

    #[test]
    fn breakdown_ignores_unusable_credits() {
        let records = vec![
            course(1, Some(Category::Pcc), Some(4.0)),
            course(1, Some(Category::Bsc), Some(f64::NAN)),
            course(1, Some(Category::Esc), Some(-2.0)),
        ];
        let shares = credit_breakdown(&records).unwrap();
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].percentage, 100.0);
    }

    #[test]
    fn credit_budget_ceiling() {
        let over: Vec<_> = [4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 3.0]
            .into_iter()
            .map(|c| course(1, Some(Category::Pcc), Some(c)))
            .collect();
        match check_credit_budget(&over, SEMESTER_CREDIT_CEILING) {
            Err(AppError::CreditBudgetExceeded { total }) => assert_eq!(total, 27.0),
            other => panic!("unexpected: {:?}", other),
        }

        let at: Vec<_> = [4.0, 4.0, 4.0, 4.0, 4.0, 3.0, 3.0]
            .into_iter()
            .map(|c| course(1, Some(Category::Pcc), Some(c)))
            .collect();
        assert_eq!(check_credit_budget(&at, SEMESTER_CREDIT_CEILING).unwrap(), 26.0);
    }

    #[test]
    fn credit_budget_rejects_unusable_values() {
        let nan_hides_overflow = vec![
            course(1, Some(Category::Pcc), Some(f64::NAN)),
            course(1, Some(Category::Pcc), Some(30.0)),
        ];
        assert!(matches!(
            check_credit_budget(&nan_hides_overflow, SEMESTER_CREDIT_CEILING),
            Err(AppError::BadRequest(_))
        ));

        let negative_offsets_overflow = vec![
            course(1, Some(Category::Pcc), Some(30.0)),
            course(1, Some(Category::Pcc), Some(-7.0)),
        ];
        assert!(matches!(
            check_credit_budget(&negative_offsets_overflow, SEMESTER_CREDIT_CEILING),
            Err(AppError::BadRequest(_))
        ));

        let overflowing = vec![
            course(1, Some(Category::Pcc), Some(f64::MAX)),
            course(1, Some(Category::Pcc), Some(f64::MAX)),
        ];
        assert!(matches!(
            check_credit_budget(&overflowing, SEMESTER_CREDIT_CEILING),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn semester_totals_include_empty_semesters() {
        let records = vec![
            course(1, Some(Category::Pcc), Some(4.0)),
            course(1, Some(Category::Bsc), Some(3.5)),
        ];
        let totals = semester_credit_totals(&records);
        assert_eq!(totals.len(), 8);
        assert_eq!(totals[&Semester::new(1).unwrap()], 7.5);
        assert_eq!(totals[&Semester::new(8).unwrap()], 0.0);
    }
}
