//! Parsing of the model's onboarding plan.

use serde::de::DeserializeOwned;

use crate::types::{LearningStep, StarterTask};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingPlan {
    pub learning_path: Vec<LearningStep>,
    pub starter_tasks: Vec<StarterTask>,
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("the model returned an empty plan")]
    Empty,

    #[error("the model returned malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("plan is not a JSON object")]
    NotAnObject,

    #[error("plan field `{0}` is missing or not an array")]
    MissingField(&'static str),

    #[error("invalid entry {index} in `{field}`: {source}")]
    InvalidEntry {
        field: &'static str,
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Strip one surrounding Markdown code fence, with or without a language tag.
fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = rest.strip_prefix("json").unwrap_or(rest);
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim()
}

fn parse_entries<T: DeserializeOwned>(
    value: &mut serde_json::Map<String, serde_json::Value>,
    field: &'static str,
) -> Result<Vec<T>, PlanError> {
    let Some(serde_json::Value::Array(items)) = value.remove(field) else {
        return Err(PlanError::MissingField(field));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item).map_err(|source| PlanError::InvalidEntry {
                field,
                index,
                source,
            })
        })
        .collect()
}

/// Parse raw model output into a plan.
///
/// # Errors
///
/// Returns [`PlanError`] when the text is empty after fence cleanup, is not a
/// JSON object, lacks `learning_path` or `starter_tasks` arrays, or holds an
/// entry missing a required field.
pub fn parse_plan(raw: &str) -> Result<OnboardingPlan, PlanError> {
    let cleaned = strip_fence(raw.trim());
    if cleaned.is_empty() {
        return Err(PlanError::Empty);
    }
    let serde_json::Value::Object(mut obj) = serde_json::from_str(cleaned)? else {
        return Err(PlanError::NotAnObject);
    };
    let learning_path = parse_entries(&mut obj, "learning_path")?;
    let starter_tasks = parse_entries(&mut obj, "starter_tasks")?;
    Ok(OnboardingPlan {
        learning_path,
        starter_tasks,
    })
}
