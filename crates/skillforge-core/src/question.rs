//! Clarifying questions and configuration fields.
//!
//! The question generator returns 3-5 multiple-choice questions plus an
//! optional set of typed configuration fields (URLs, credentials, ...)
//! that the eventual skill needs filled in. These are the wire shapes for
//! that structured response, with the normalization and bounds validation
//! the pipeline applies before accepting one.

use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Minimum number of questions in an accepted set.
pub const MIN_QUESTIONS: usize = 3;
/// Maximum number of questions in an accepted set.
pub const MAX_QUESTIONS: usize = 5;
/// Maximum number of options per question.
pub const MAX_OPTIONS: usize = 5;
/// Minimum number of options per question.
pub const MIN_OPTIONS: usize = 2;
/// Maximum number of configuration fields in an accepted set.
pub const MAX_CONFIG_FIELDS: usize = 5;

/// A single clarifying question with multiple-choice options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarifyingQuestion {
    /// Stable identifier for the question (snake_case).
    pub id: String,
    /// The question text.
    pub question: String,
    /// Answer options, ordered. 2-5 entries, unique.
    pub options: Vec<String>,
    /// Index of the recommended option. Always a valid index into `options`.
    pub recommended_index: usize,
    /// Whether an answer is required before generation.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl ClarifyingQuestion {
    /// Validates option bounds, uniqueness, and the recommended index.
    pub fn validate(&self) -> Result<()> {
        if self.options.len() < MIN_OPTIONS || self.options.len() > MAX_OPTIONS {
            return Err(ForgeError::contract(format!(
                "Question '{}' has {} options, expected {}..={}",
                self.id,
                self.options.len(),
                MIN_OPTIONS,
                MAX_OPTIONS
            )));
        }
        let unique: HashSet<&str> = self.options.iter().map(String::as_str).collect();
        if unique.len() != self.options.len() {
            return Err(ForgeError::contract(format!(
                "Question '{}' has duplicate options",
                self.id
            )));
        }
        if self.recommended_index >= self.options.len() {
            return Err(ForgeError::contract(format!(
                "Question '{}' recommends index {} but only has {} options",
                self.id,
                self.recommended_index,
                self.options.len()
            )));
        }
        Ok(())
    }

    /// Returns the text of the recommended option.
    pub fn recommended_option(&self) -> &str {
        &self.options[self.recommended_index]
    }
}

/// The input type of a configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFieldType {
    Text,
    Url,
    Password,
    Number,
    Email,
}

/// A typed key/value prompt the generated skill needs filled in.
///
/// Fields are conditionally generated: they exist only when the capability
/// description references concrete external values (URLs, credentials,
/// intervals) that cannot be safely defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigField {
    /// Stable identifier (snake_case), unique within a field set.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Placeholder shown in the input before a value is entered.
    #[serde(default)]
    pub placeholder: String,
    /// Input type, driving local validation.
    #[serde(rename = "type")]
    pub field_type: ConfigFieldType,
    /// Whether a value must be supplied before generation.
    #[serde(default)]
    pub required: bool,
    /// Optional help text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The structured response of the question generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSet {
    #[serde(default)]
    pub questions: Vec<ClarifyingQuestion>,
    #[serde(default)]
    pub config_fields: Vec<ConfigField>,
}

impl QuestionSet {
    /// Normalizes an over-sized but otherwise sane response the way the
    /// provider contract allows: truncate to [`MAX_QUESTIONS`] questions,
    /// [`MAX_OPTIONS`] options per question, [`MAX_CONFIG_FIELDS`] config
    /// fields, and clamp each recommended index into range.
    ///
    /// An under-sized response is not repaired here; `validate` rejects it.
    pub fn normalize(mut self) -> Self {
        self.questions.truncate(MAX_QUESTIONS);
        for question in &mut self.questions {
            question.options.truncate(MAX_OPTIONS);
            if !question.options.is_empty() {
                question.recommended_index =
                    question.recommended_index.min(question.options.len() - 1);
            }
        }
        self.config_fields.truncate(MAX_CONFIG_FIELDS);
        self
    }

    /// Validates the set against the structured-output contract.
    ///
    /// # Errors
    ///
    /// Returns a `ContractViolation` when the question count is outside
    /// 3..=5, any question fails its own validation, or ids collide.
    pub fn validate(&self) -> Result<()> {
        if self.questions.len() < MIN_QUESTIONS || self.questions.len() > MAX_QUESTIONS {
            return Err(ForgeError::contract(format!(
                "Expected {}..={} questions, got {}",
                MIN_QUESTIONS,
                MAX_QUESTIONS,
                self.questions.len()
            )));
        }
        let mut question_ids = HashSet::new();
        for question in &self.questions {
            question.validate()?;
            if !question_ids.insert(question.id.as_str()) {
                return Err(ForgeError::contract(format!(
                    "Duplicate question id '{}'",
                    question.id
                )));
            }
        }
        if self.config_fields.len() > MAX_CONFIG_FIELDS {
            return Err(ForgeError::contract(format!(
                "Expected at most {} config fields, got {}",
                MAX_CONFIG_FIELDS,
                self.config_fields.len()
            )));
        }
        let mut field_ids = HashSet::new();
        for field in &self.config_fields {
            if !field_ids.insert(field.id.as_str()) {
                return Err(ForgeError::contract(format!(
                    "Duplicate config field id '{}'",
                    field.id
                )));
            }
        }
        Ok(())
    }

    /// Looks up a question by its stable id.
    pub fn question(&self, id: &str) -> Option<&ClarifyingQuestion> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// The user's answer to one clarifying question.
///
/// Every question carries an "other" escape hatch, so an answer is either
/// a choice index or free text; both normalize to the same string
/// representation downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    /// A selected option, by index into the question's options.
    Choice(usize),
    /// Free text entered through the "other" escape hatch.
    FreeText(String),
}

/// Pairs a question's stable id with the user's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredAnswer {
    pub question_id: String,
    pub answer: AnswerValue,
}

impl StructuredAnswer {
    /// Creates an answer selecting an option by index.
    pub fn choice(question_id: impl Into<String>, index: usize) -> Self {
        Self {
            question_id: question_id.into(),
            answer: AnswerValue::Choice(index),
        }
    }

    /// Creates a free-text answer.
    pub fn free_text(question_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            answer: AnswerValue::FreeText(text.into()),
        }
    }

    /// Normalizes the answer to its downstream string representation.
    ///
    /// A choice resolves to the option text; an out-of-range choice falls
    /// back to the question's recommended option. Free text passes through.
    pub fn resolve(&self, question: &ClarifyingQuestion) -> String {
        match &self.answer {
            AnswerValue::Choice(index) => question
                .options
                .get(*index)
                .unwrap_or_else(|| &question.options[question.recommended_index])
                .clone(),
            AnswerValue::FreeText(text) => text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_question(id: &str) -> ClarifyingQuestion {
        ClarifyingQuestion {
            id: id.to_string(),
            question: "How often should the check run?".to_string(),
            options: vec![
                "Every 5 minutes".to_string(),
                "Hourly".to_string(),
                "Daily".to_string(),
            ],
            recommended_index: 1,
            required: true,
        }
    }

    fn sample_set(count: usize) -> QuestionSet {
        QuestionSet {
            questions: (0..count).map(|i| sample_question(&format!("q{}", i))).collect(),
            config_fields: vec![],
        }
    }

    #[test]
    fn test_question_bounds_accepted() {
        for count in MIN_QUESTIONS..=MAX_QUESTIONS {
            assert!(sample_set(count).validate().is_ok(), "count {}", count);
        }
    }

    #[test]
    fn test_question_bounds_rejected() {
        assert!(sample_set(2).validate().unwrap_err().is_contract_violation());
        assert!(sample_set(6).validate().unwrap_err().is_contract_violation());
        assert!(sample_set(0).validate().unwrap_err().is_contract_violation());
    }

    #[test]
    fn test_recommended_index_out_of_range_rejected() {
        let mut set = sample_set(3);
        set.questions[1].recommended_index = 7;
        assert!(set.validate().unwrap_err().is_contract_violation());
    }

    #[test]
    fn test_duplicate_options_rejected() {
        let mut set = sample_set(3);
        set.questions[0].options = vec!["Same".to_string(), "Same".to_string()];
        set.questions[0].recommended_index = 0;
        assert!(set.validate().unwrap_err().is_contract_violation());
    }

    #[test]
    fn test_normalize_truncates_and_clamps() {
        let mut set = sample_set(7);
        set.questions[0].recommended_index = 10;
        let set = set.normalize();
        assert_eq!(set.questions.len(), MAX_QUESTIONS);
        assert_eq!(set.questions[0].recommended_index, 2);
        assert!(set.validate().is_ok());
    }

    #[test]
    fn test_duplicate_field_ids_rejected() {
        let field = ConfigField {
            id: "website_url".to_string(),
            label: "Website URL".to_string(),
            placeholder: "https://example.com".to_string(),
            field_type: ConfigFieldType::Url,
            required: true,
            description: None,
        };
        let mut set = sample_set(3);
        set.config_fields = vec![field.clone(), field];
        assert!(set.validate().unwrap_err().is_contract_violation());
    }

    #[test]
    fn test_answer_resolution() {
        let question = sample_question("cadence");
        assert_eq!(
            StructuredAnswer::choice("cadence", 2).resolve(&question),
            "Daily"
        );
        assert_eq!(
            StructuredAnswer::free_text("cadence", "Twice a day").resolve(&question),
            "Twice a day"
        );
        // Out-of-range choice falls back to the recommendation.
        assert_eq!(
            StructuredAnswer::choice("cadence", 9).resolve(&question),
            "Hourly"
        );
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::json!({
            "id": "cadence",
            "question": "How often?",
            "options": ["A", "B"],
            "recommendedIndex": 1
        });
        let question: ClarifyingQuestion = serde_json::from_value(json).unwrap();
        assert_eq!(question.recommended_index, 1);
        assert!(question.required);
    }
}
