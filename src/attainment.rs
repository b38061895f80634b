use serde::{Deserialize, Serialize};

use crate::calc::{classify_level, round4, CoLabel, CoLevel, CoStats, PerCo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestType {
    #[serde(rename = "Internal 1")]
    Internal1,
    #[serde(rename = "Internal 2")]
    Internal2,
    #[serde(rename = "Unit Test")]
    UnitTest,
    Assignment,
    Semester,
}

impl TestType {
    pub const ALL: [TestType; 5] = [
        TestType::Internal1,
        TestType::Internal2,
        TestType::UnitTest,
        TestType::Assignment,
        TestType::Semester,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TestType::Internal1 => "Internal 1",
            TestType::Internal2 => "Internal 2",
            TestType::UnitTest => "Unit Test",
            TestType::Assignment => "Assignment",
            TestType::Semester => "Semester",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        TestType::ALL.into_iter().find(|t| t.label() == s)
    }
}

/// One assessment sitting's contribution to the blend: its test type and
/// the stored per-CO cohort statistics. The blend trusts the stored block
/// and never re-aggregates students.
#[derive(Debug, Clone)]
pub struct AssessmentSource {
    pub test_type: TestType,
    pub attainment: PerCo<CoStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttainmentOutcome {
    pub internal_attainment: PerCo<f64>,
    pub direct_attainment: PerCo<f64>,
    pub final_attainment: PerCo<f64>,
    pub levels: PerCo<CoLevel>,
    pub missing: Vec<String>,
}

// Stage weights. Internal blends the averaged internal-exam CO pass rate
// with unit test and assignment; Direct folds in the semester exam; Final
// adds the survey-based indirect score.
const W_INTERNAL_CO: f64 = 0.60;
const W_UNIT_TEST: f64 = 0.15;
const W_ASSIGNMENT: f64 = 0.25;
const W_SEMESTER: f64 = 0.60;
const W_INTERNAL: f64 = 0.40;
const W_DIRECT: f64 = 0.90;
const W_INDIRECT: f64 = 0.10;

fn pct_or_zero(stats: &CoStats) -> f64 {
    stats.pct.unwrap_or(0.0)
}

/// Blends up to five assessment sittings plus the indirect survey record
/// into the reported attainment.
///
/// Formula, per CO:
///   Internal = avg(Internal 1, Internal 2) x 0.60 + UnitTest x 0.15 + Assignment x 0.25
///   Direct   = Semester x 0.60 + Internal x 0.40
///   Final    = Direct x 0.90 + Indirect x 0.10
///
/// Each stage is rounded to 4 decimals. Missing sources contribute 0 and
/// are reported in `missing`. A CO no sitting ever mapped stays at its
/// zeroed defaults with level "N/A". The indirect record is on the 0-3
/// survey scale while the direct side is a 0-100 pass rate; the blend and
/// the level thresholds intentionally take both as-is.
pub fn compute_attainment(
    sources: &[AssessmentSource],
    indirect: &PerCo<f64>,
) -> AttainmentOutcome {
    let mut internal1: Option<&PerCo<CoStats>> = None;
    let mut internal2: Option<&PerCo<CoStats>> = None;
    let mut unit_test: Option<&PerCo<CoStats>> = None;
    let mut assignment: Option<&PerCo<CoStats>> = None;
    let mut semester: Option<&PerCo<CoStats>> = None;

    // Last sitting wins per slot, matching the active-document contract of
    // one live assessment per test type.
    for s in sources {
        match s.test_type {
            TestType::Internal1 => internal1 = Some(&s.attainment),
            TestType::Internal2 => internal2 = Some(&s.attainment),
            TestType::UnitTest => unit_test = Some(&s.attainment),
            TestType::Assignment => assignment = Some(&s.attainment),
            TestType::Semester => semester = Some(&s.attainment),
        }
    }

    let internals: Vec<&PerCo<CoStats>> = [internal1, internal2].into_iter().flatten().collect();

    let mut missing: Vec<String> = Vec::new();
    if internals.is_empty() {
        missing.push("Internal 1 or Internal 2".to_string());
    }
    if unit_test.is_none() {
        missing.push("Unit Test".to_string());
    }
    if assignment.is_none() {
        missing.push("Assignment".to_string());
    }
    if semester.is_none() {
        missing.push("Semester".to_string());
    }

    let provided: Vec<&PerCo<CoStats>> = internals
        .iter()
        .copied()
        .chain(unit_test)
        .chain(assignment)
        .chain(semester)
        .collect();

    let mut internal_out = PerCo::<f64>::default();
    let mut direct_out = PerCo::<f64>::default();
    let mut final_out = PerCo::<f64>::default();
    let mut levels = PerCo::filled(CoLevel::NotApplicable);

    for co in CoLabel::ALL {
        let applicable = provided.iter().any(|a| a.get(co).pct.is_some());
        if !applicable {
            continue;
        }

        let co_internal = if internals.is_empty() {
            0.0
        } else {
            round4(
                internals.iter().map(|a| pct_or_zero(a.get(co))).sum::<f64>()
                    / internals.len() as f64,
            )
        };
        let ut = unit_test.map(|a| pct_or_zero(a.get(co))).unwrap_or(0.0);
        let asg = assignment.map(|a| pct_or_zero(a.get(co))).unwrap_or(0.0);
        let sem = semester.map(|a| pct_or_zero(a.get(co))).unwrap_or(0.0);

        let internal = round4(co_internal * W_INTERNAL_CO + ut * W_UNIT_TEST + asg * W_ASSIGNMENT);
        let direct = round4(sem * W_SEMESTER + internal * W_INTERNAL);
        let final_value = round4(direct * W_DIRECT + *indirect.get(co) * W_INDIRECT);

        *internal_out.get_mut(co) = internal;
        *direct_out.get_mut(co) = direct;
        *final_out.get_mut(co) = final_value;
        *levels.get_mut(co) = CoLevel::Achieved(classify_level(final_value));
    }

    AttainmentOutcome {
        internal_attainment: internal_out,
        direct_attainment: direct_out,
        final_attainment: final_out,
        levels,
        missing,
    }
}
