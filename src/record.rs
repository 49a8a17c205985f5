//! Domain records produced by the extraction pipeline.
//!
//! [`ExamRecord`] is one row of an exam-schedule table. Its serde shape is
//! the wire contract with the extraction service (`slNo`, `examDate`, …), so
//! the same type deserialises model output and serialises `--json` output.
//!
//! Source documents are inconsistent: the model sometimes returns the serial
//! number as a JSON number, and occasionally omits a column or sends `null`.
//! Both are normalised here, at the parsing boundary, so every record that
//! leaves this module has all seven fields as (possibly empty) strings.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Wire field names, in table column order.
pub const FIELD_NAMES: [&str; 7] = [
    "slNo",
    "examDate",
    "batch",
    "subjectCode",
    "subjectName",
    "registerNumber",
    "studentName",
];

/// Human-readable column headers, in the same order as [`FIELD_NAMES`].
pub const COLUMN_HEADERS: [&str; 7] = [
    "Sl.no",
    "Exam Date",
    "Batch",
    "Subject Code",
    "Subject Name",
    "Register Number",
    "Student Name",
];

/// One extracted exam-schedule row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRecord {
    /// Serial number as printed in the source table.
    #[serde(
        rename = "slNo",
        alias = "serialNumber",
        default,
        deserialize_with = "lenient_text"
    )]
    pub serial_number: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub exam_date: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub batch: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub subject_code: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub subject_name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub register_number: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub student_name: String,
}

impl ExamRecord {
    /// Build a record from its seven column values, in column order.
    pub fn from_fields(fields: [String; 7]) -> Self {
        let [serial_number, exam_date, batch, subject_code, subject_name, register_number, student_name] =
            fields;
        Self {
            serial_number,
            exam_date,
            batch,
            subject_code,
            subject_name,
            register_number,
            student_name,
        }
    }

    /// All seven values in column order.
    pub fn fields(&self) -> [&str; 7] {
        [
            &self.serial_number,
            &self.exam_date,
            &self.batch,
            &self.subject_code,
            &self.subject_name,
            &self.register_number,
            &self.student_name,
        ]
    }

    /// Case-insensitive substring match against every field.
    ///
    /// The query is used as typed, surrounding spaces included. Only the
    /// empty string matches everything.
    pub fn matches(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let needle = query.to_lowercase();
        self.fields()
            .iter()
            .any(|value| value.to_lowercase().contains(&needle))
    }
}

/// Records whose any field contains `query` (case-insensitive), in order.
pub fn filter_records<'a>(records: &'a [ExamRecord], query: &str) -> Vec<&'a ExamRecord> {
    records.iter().filter(|r| r.matches(query)).collect()
}

/// Accept a string, number, boolean or `null` and yield text.
///
/// Arrays and objects are not table cells; they are rejected so a badly
/// nested response surfaces as a format error instead of a silent blank.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a text cell, got {}",
            match other {
                Value::Array(_) => "an array",
                _ => "an object",
            }
        ))),
    }
}
