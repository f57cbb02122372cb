use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::autofill::keys::normalize_key;

/// Pure value normalizations a rule may apply before writing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTransform {
    Trim,
    Uppercase,
    /// ISO-3166 alpha-2 for the spellings marketplaces commonly emit.
    CountryCode,
    /// Trimmed and upper-cased; a US ZIP+4 is cut to its 5-digit prefix.
    PostalCode,
    DigitsOnly,
}

impl FieldTransform {
    pub fn apply(self, value: &Value) -> Value {
        let Some(text) = scalar_text(value) else {
            return value.clone();
        };

        let transformed = match self {
            Self::Trim => text.trim().to_owned(),
            Self::Uppercase => text.trim().to_uppercase(),
            Self::CountryCode => country_code(&text),
            Self::PostalCode => postal_code(&text),
            Self::DigitsOnly => text.chars().filter(char::is_ascii_digit).collect(),
        };
        Value::String(transformed)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn country_code(text: &str) -> String {
    match normalize_key(text).as_str() {
        "us" | "usa" | "unitedstates" | "unitedstatesofamerica" => "US".to_owned(),
        "ca" | "can" | "canada" => "CA".to_owned(),
        "mx" | "mex" | "mexico" => "MX".to_owned(),
        _ => text.trim().to_uppercase(),
    }
}

fn postal_code(text: &str) -> String {
    let trimmed = text.trim().to_uppercase();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    let us_zip_plus_four = digits.len() == 9
        && trimmed.chars().all(|ch| ch.is_ascii_digit() || ch == '-' || ch == ' ');
    if us_zip_plus_four {
        return digits[..5].to_owned();
    }
    trimmed
}

/// Fills `target_field_name` from the first candidate key that yields a
/// non-blank value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoPopulationRule {
    pub target_field_name: String,
    pub source_key_candidates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<FieldTransform>,
}

impl AutoPopulationRule {
    pub fn new<I, S>(target_field_name: impl Into<String>, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target_field_name: target_field_name.into(),
            source_key_candidates: candidates.into_iter().map(Into::into).collect(),
            transform: None,
        }
    }

    pub fn with_transform(mut self, transform: FieldTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn transformed(&self, value: &Value) -> Value {
        match self.transform {
            Some(transform) => transform.apply(value),
            None => value.clone(),
        }
    }
}
