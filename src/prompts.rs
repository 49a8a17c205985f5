//! Extraction instruction and response schema.
//!
//! Centralising the prompt here keeps every extractor backend asking the
//! model the same question, and lets unit tests inspect it without a network
//! round trip.
//!
//! The field names in the prompt and in [`response_schema`] must stay equal
//! to [`crate::record::FIELD_NAMES`]; the schema is what the Gemini backend
//! declares as its `responseSchema`, and the record type deserialises the
//! same names.

use crate::record::FIELD_NAMES;
use serde_json::{json, Map, Value};

/// Default instruction sent alongside the page images.
///
/// Used when `ExamConfig::system_prompt` is `None`.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You are an expert at reading scanned exam schedules. Extract every student exam record from the attached document pages.

Follow these rules precisely:

1. OUTPUT SHAPE
   - Return a JSON array of objects
   - Each object has exactly these fields: "slNo", "examDate", "batch", "subjectCode", "subjectName", "registerNumber", "studentName"
   - Every value is a string

2. ROWS
   - Read every row of every table carefully, in the order printed
   - Tables may continue across pages; keep one object per printed row
   - "slNo" is the serial number printed in the table

3. MISSING VALUES
   - If a field is missing for a row, use an empty string

4. FORMATTING
   - Format dates consistently across all rows where possible

5. OUTPUT FORMAT
   - Output ONLY the JSON array
   - Do NOT wrap it in ```json fences
   - Do NOT add commentary or explanations"#;

/// Short user-turn text accompanying the images for chat-style providers.
pub const USER_TURN_TEXT: &str = "Extract the exam records from these pages.";

/// JSON schema (Gemini `responseSchema` dialect) for the record array.
///
/// Array of objects; all seven properties are strings and all are required.
pub fn response_schema() -> Value {
    let mut properties = Map::new();
    for name in FIELD_NAMES {
        properties.insert(name.to_string(), json!({ "type": "STRING" }));
    }
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": properties,
            "required": FIELD_NAMES,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_every_field() {
        for name in FIELD_NAMES {
            assert!(
                DEFAULT_EXTRACTION_PROMPT.contains(&format!("\"{name}\"")),
                "prompt is missing {name}"
            );
        }
    }

    #[test]
    fn schema_requires_all_string_fields() {
        let schema = response_schema();
        assert_eq!(schema["type"], "ARRAY");
        assert_eq!(schema["items"]["type"], "OBJECT");

        let props = schema["items"]["properties"].as_object().unwrap();
        assert_eq!(props.len(), 7);
        assert!(props.values().all(|p| p["type"] == "STRING"));

        let required: Vec<&str> = schema["items"]["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(required, FIELD_NAMES.to_vec());
    }
}
