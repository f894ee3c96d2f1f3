//! Known model catalog

use crate::types::Model;

pub const DEFAULT_MODEL_ID: &str = "gemini-3-pro-preview";

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

fn entry(id: &str, name: &str) -> Model {
    Model {
        id: id.to_string(),
        name: name.to_string(),
        base_url: BASE_URL.to_string(),
        context_window: 1_048_576,
        max_output_tokens: 65_536,
    }
}

/// All models this client knows about
pub fn known_models() -> Vec<Model> {
    vec![
        entry("gemini-3-pro-preview", "Gemini 3 Pro Preview"),
        entry("gemini-2.5-pro", "Gemini 2.5 Pro"),
        entry("gemini-2.5-flash", "Gemini 2.5 Flash"),
    ]
}

/// Look up a model by exact id, falling back to a substring match
pub fn get_model(id: &str) -> Option<Model> {
    let query = id.to_lowercase();
    let models = known_models();
    if let Some(model) = models.iter().find(|m| m.id.to_lowercase() == query) {
        return Some(model.clone());
    }
    models
        .into_iter()
        .find(|m| m.id.to_lowercase().contains(&query))
}

/// Build an entry for a model id not in the catalog
pub fn custom(id: &str) -> Model {
    Model {
        id: id.to_string(),
        name: id.to_string(),
        base_url: BASE_URL.to_string(),
        context_window: 1_048_576,
        max_output_tokens: 65_536,
    }
}

pub fn default_model() -> Model {
    get_model(DEFAULT_MODEL_ID).unwrap_or_else(|| custom(DEFAULT_MODEL_ID))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_is_in_catalog() {
        let model = default_model();
        assert_eq!(model.id, DEFAULT_MODEL_ID);
        assert!(model.base_url.starts_with("https://"));
    }

    #[test]
    fn lookup_matches_exact_id_first() {
        let model = get_model("gemini-2.5-pro").unwrap();
        assert_eq!(model.name, "Gemini 2.5 Pro");
    }

    #[test]
    fn lookup_falls_back_to_substring() {
        let model = get_model("flash").unwrap();
        assert_eq!(model.id, "gemini-2.5-flash");
    }

    #[test]
    fn unknown_ids_return_none() {
        assert!(get_model("claude-sonnet").is_none());
    }

    #[test]
    fn custom_entries_use_the_standard_base_url() {
        let model = custom("gemini-experimental");
        assert_eq!(model.id, "gemini-experimental");
        assert_eq!(model.base_url, BASE_URL);
    }
}
