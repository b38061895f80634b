use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

/// Percentage a student must reach on a CO for it to count toward the
/// cohort pass rate.
pub const PASS_THRESHOLD_PERCENT: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoLabel {
    Co1,
    Co2,
    Co3,
    Co4,
    Co5,
    Co6,
}

impl CoLabel {
    pub const ALL: [CoLabel; 6] = [
        CoLabel::Co1,
        CoLabel::Co2,
        CoLabel::Co3,
        CoLabel::Co4,
        CoLabel::Co5,
        CoLabel::Co6,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CoLabel::Co1 => "co1",
            CoLabel::Co2 => "co2",
            CoLabel::Co3 => "co3",
            CoLabel::Co4 => "co4",
            CoLabel::Co5 => "co5",
            CoLabel::Co6 => "co6",
        }
    }
}

/// One value per CO slot. Keeping the six slots as named fields (rather than
/// an open map) means a missing or misspelled label cannot survive past the
/// serde boundary.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerCo<T> {
    pub co1: T,
    pub co2: T,
    pub co3: T,
    pub co4: T,
    pub co5: T,
    pub co6: T,
}

impl<T> PerCo<T> {
    pub fn get(&self, co: CoLabel) -> &T {
        match co {
            CoLabel::Co1 => &self.co1,
            CoLabel::Co2 => &self.co2,
            CoLabel::Co3 => &self.co3,
            CoLabel::Co4 => &self.co4,
            CoLabel::Co5 => &self.co5,
            CoLabel::Co6 => &self.co6,
        }
    }

    pub fn get_mut(&mut self, co: CoLabel) -> &mut T {
        match co {
            CoLabel::Co1 => &mut self.co1,
            CoLabel::Co2 => &mut self.co2,
            CoLabel::Co3 => &mut self.co3,
            CoLabel::Co4 => &mut self.co4,
            CoLabel::Co5 => &mut self.co5,
            CoLabel::Co6 => &mut self.co6,
        }
    }

    pub fn build(mut f: impl FnMut(CoLabel) -> T) -> Self {
        Self {
            co1: f(CoLabel::Co1),
            co2: f(CoLabel::Co2),
            co3: f(CoLabel::Co3),
            co4: f(CoLabel::Co4),
            co5: f(CoLabel::Co5),
            co6: f(CoLabel::Co6),
        }
    }
}

impl<T: Copy> PerCo<T> {
    pub fn filled(v: T) -> Self {
        Self::build(|_| v)
    }
}

/// Raw marks for one student, keyed by question id. Sparse: an unattempted
/// question simply has no entry and reads as 0.
pub type Marks = HashMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEntry {
    pub co: CoLabel,
    pub max_mark: f64,
}

/// Question id -> CO assignment and maximum mark. Labels arrive already
/// normalized to lowercase co1..co6 by the entry form / upload parser.
pub type QuestionConfig = HashMap<String, QuestionEntry>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub sl_no: i64,
    pub reg_no: String,
    pub roll_no: String,
    pub name: String,
    #[serde(default)]
    pub marks: Marks,
}

/// Per-student scoring output: raw CO totals, grand total and CO
/// percentages (0-100, two decimals).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoResult {
    #[serde(flatten)]
    pub totals: PerCo<f64>,
    pub total: f64,
    pub percentage: PerCo<f64>,
}

/// Attainment level for one CO: 0-3, or not applicable when the assessment
/// mapped no questions to the CO. Serializes as a number or the string "N/A".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoLevel {
    #[default]
    NotApplicable,
    Achieved(u8),
}

impl Serialize for CoLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CoLevel::NotApplicable => serializer.serialize_str("N/A"),
            CoLevel::Achieved(n) => serializer.serialize_u8(*n),
        }
    }
}

impl<'de> Deserialize<'de> for CoLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        match raw {
            serde_json::Value::String(ref s) if s == "N/A" => Ok(CoLevel::NotApplicable),
            serde_json::Value::Number(n) => n
                .as_u64()
                .filter(|v| *v <= 3)
                .map(|v| CoLevel::Achieved(v as u8))
                .ok_or_else(|| D::Error::custom("level must be an integer 0-3")),
            _ => Err(D::Error::custom("level must be 0-3 or \"N/A\"")),
        }
    }
}

/// Cohort statistics for one CO within one assessment sitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoStats {
    pub attended: usize,
    pub scoring60: usize,
    pub pct: Option<f64>,
    pub level: CoLevel,
}

/// Everything derived from one assessment's students + question config.
/// Stored inside the assessment document; the attainment blend reads the
/// `attainment` block back instead of recomputing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedAssessment {
    pub co_max: PerCo<f64>,
    pub per_student_co: Vec<CoResult>,
    pub attainment: PerCo<CoStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PartWiseTotals {
    #[serde(rename = "partA")]
    pub part_a: PerCo<f64>,
    #[serde(rename = "partB_a")]
    pub part_b_a: PerCo<f64>,
    #[serde(rename = "partB_b")]
    pub part_b_b: PerCo<f64>,
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Splits an internal-choice id (`q11a`, `q14B`) into question number and
/// variant. Ids without the `q<number><a|b>` shape are not part of a pair.
fn choice_variant(q_id: &str) -> Option<(u32, char)> {
    let rest = q_id.strip_prefix('q').or_else(|| q_id.strip_prefix('Q'))?;
    if rest.len() < 2 {
        return None;
    }
    let (digits, suffix) = rest.split_at(rest.len() - 1);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let num: u32 = digits.parse().ok()?;
    let part = suffix.chars().next()?.to_ascii_lowercase();
    if part != 'a' && part != 'b' {
        return None;
    }
    Some((num, part))
}

fn plain_question_number(q_id: &str) -> Option<u32> {
    let rest = q_id.strip_prefix('q').or_else(|| q_id.strip_prefix('Q'))?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// Internal-choice rule: within an a/b pair only the better-attempted
/// variant counts; on equal marks the 'a' variant wins the tie.
fn counts_for_student(q_id: &str, marks: &Marks) -> bool {
    let Some((num, part)) = choice_variant(q_id) else {
        return true;
    };
    let pair_part = if part == 'a' { 'b' } else { 'a' };
    let pair_id = format!("q{}{}", num, pair_part);

    let mark = marks.get(q_id).copied().unwrap_or(0.0);
    let pair_mark = marks.get(pair_id.as_str()).copied().unwrap_or(0.0);

    if mark < pair_mark {
        return false;
    }
    if mark == pair_mark && part == 'b' {
        return false;
    }
    true
}

/// Per-CO max-mark totals. With `marks` supplied the internal-choice rule
/// picks the variant the student actually attempted, so the denominator
/// matches the marks counted for that student. Without marks this is the
/// static exam-design view and every configured max mark is summed as-is.
pub fn co_max_marks(config: &QuestionConfig, marks: Option<&Marks>) -> PerCo<f64> {
    let mut max = PerCo::<f64>::default();
    for (q_id, q) in config {
        if let Some(marks) = marks {
            if !counts_for_student(q_id, marks) {
                continue;
            }
        }
        *max.get_mut(q.co) += q.max_mark;
    }
    max
}

/// Scores one student's marks against the question config. Marks on ids
/// with no config entry still raise the grand total but land in no CO
/// bucket. Never fails: absent marks are 0, a zero denominator yields a
/// zero percentage.
pub fn score_marks(marks: &Marks, config: &QuestionConfig) -> CoResult {
    let mut result = CoResult::default();

    for (q_id, &mark) in marks {
        if !counts_for_student(q_id, marks) {
            continue;
        }
        result.total += mark;
        if let Some(q) = config.get(q_id) {
            *result.totals.get_mut(q.co) += mark;
        }
    }

    let max = co_max_marks(config, Some(marks));
    for co in CoLabel::ALL {
        let denom = *max.get(co);
        if denom > 0.0 {
            *result.percentage.get_mut(co) = round2(100.0 * result.totals.get(co) / denom);
        }
    }

    result
}

/// Max-mark sums grouped by exam part: Part A is q1..q10 without a suffix,
/// Part B splits by the a/b suffix. Structural only; a student's choice of
/// variant does not move marks between partitions.
pub fn part_wise_totals(config: &QuestionConfig) -> PartWiseTotals {
    let mut out = PartWiseTotals::default();
    for (q_id, q) in config {
        if let Some((_, part)) = choice_variant(q_id) {
            let bucket = if part == 'a' {
                &mut out.part_b_a
            } else {
                &mut out.part_b_b
            };
            *bucket.get_mut(q.co) += q.max_mark;
        } else if plain_question_number(q_id).map(|n| n <= 10).unwrap_or(false) {
            *out.part_a.get_mut(q.co) += q.max_mark;
        }
    }
    out
}

/// Level thresholds on the 0-100 pass-rate scale. Exactly 70 resolves to
/// level 2, not 3; the other boundaries are inclusive upward.
pub fn classify_level(pct: f64) -> u8 {
    if pct > 70.0 {
        3
    } else if pct >= 60.0 {
        2
    } else if pct >= 50.0 {
        1
    } else {
        0
    }
}

/// Aggregates one assessment sitting: per-student CO results plus per-CO
/// cohort pass-rate statistics. A CO with no mapped questions gets
/// `pct: None` / level N/A and is skipped by later blending.
pub fn compute_assessment(students: &[Student], config: &QuestionConfig) -> ComputedAssessment {
    let co_max = co_max_marks(config, None);
    let per_student_co: Vec<CoResult> = students
        .iter()
        .map(|s| score_marks(&s.marks, config))
        .collect();

    let attainment = PerCo::build(|co| {
        if *co_max.get(co) <= 0.0 {
            return CoStats {
                attended: 0,
                scoring60: 0,
                pct: None,
                level: CoLevel::NotApplicable,
            };
        }
        let attended = per_student_co.len();
        let scoring60 = per_student_co
            .iter()
            .filter(|r| *r.percentage.get(co) >= PASS_THRESHOLD_PERCENT)
            .count();
        let pct = if attended > 0 {
            round2(100.0 * scoring60 as f64 / attended as f64)
        } else {
            0.0
        };
        CoStats {
            attended,
            scoring60,
            pct: Some(pct),
            level: CoLevel::Achieved(classify_level(pct)),
        }
    });

    ComputedAssessment {
        co_max,
        per_student_co,
        attainment,
    }
}

/// Rewrites serial numbers to a dense 1-based sequence. Run whenever a
/// student collection has been reordered or had entries removed.
pub fn resequence_sl_no(students: &mut [Student]) {
    for (i, s) in students.iter_mut().enumerate() {
        s.sl_no = i as i64 + 1;
    }
}
