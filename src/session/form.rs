use serde_json::{Map, Number, Value};

use crate::api::{ParameterKind, ParameterSpec, ScraperConfig};
use crate::error::{BurpError, BurpResult};
use crate::record::value_to_text;

/// Turn typed-in text into the value sent for `spec`.
///
/// Numbers become JSON numbers (integers when they have no fraction);
/// text and select values stay strings. Blank input is an empty string so
/// the required check can report it.
pub fn parse_parameter(spec: &ParameterSpec, raw: &str) -> BurpResult<Value> {
    let trimmed = raw.trim();
    match spec.kind {
        ParameterKind::Number if !trimmed.is_empty() => {
            if let Ok(int) = trimmed.parse::<i64>() {
                return Ok(Value::Number(int.into()));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| BurpError::InvalidParameter {
                    name: spec.name.clone(),
                    reason: format!("'{}' is not a number", trimmed),
                })
        }
        _ => Ok(Value::String(raw.to_string())),
    }
}

/// Check every parameter of `config` against `values`.
///
/// Required parameters must be present and non-blank. Numbers must parse
/// and respect `min`/`max`; select values must be one of the options.
pub fn validate_parameters(config: &ScraperConfig, values: &Map<String, Value>) -> BurpResult<()> {
    for spec in &config.parameters {
        let text = values.get(&spec.name).map(value_to_text).unwrap_or_default();
        let blank = text.trim().is_empty();

        if blank {
            if spec.required {
                return Err(BurpError::MissingParameter {
                    name: spec.name.clone(),
                });
            }
            continue;
        }

        match spec.kind {
            ParameterKind::Number => check_number(spec, &text)?,
            ParameterKind::Select => check_option(spec, &text)?,
            ParameterKind::Text => {}
        }
    }
    Ok(())
}

fn check_number(spec: &ParameterSpec, text: &str) -> BurpResult<()> {
    let number: f64 = text.trim().parse().map_err(|_| BurpError::InvalidParameter {
        name: spec.name.clone(),
        reason: format!("'{}' is not a number", text.trim()),
    })?;

    if let Some(min) = spec.min {
        if number < min {
            return Err(BurpError::InvalidParameter {
                name: spec.name.clone(),
                reason: format!("must be at least {}", min),
            });
        }
    }
    if let Some(max) = spec.max {
        if number > max {
            return Err(BurpError::InvalidParameter {
                name: spec.name.clone(),
                reason: format!("must be at most {}", max),
            });
        }
    }
    Ok(())
}

fn check_option(spec: &ParameterSpec, text: &str) -> BurpResult<()> {
    let options = spec.option_values();
    if options.is_empty() || options.iter().any(|o| o == text) {
        return Ok(());
    }
    Err(BurpError::InvalidParameter {
        name: spec.name.clone(),
        reason: format!("must be one of: {}", options.join(", ")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn amazon() -> ScraperConfig {
        serde_json::from_value(json!({
            "id": "amazon",
            "name": "Amazon",
            "parameters": [
                {"name": "search_term", "type": "text", "label": "Search Term", "required": true},
                {"name": "max_pages", "type": "number", "default": 3, "min": 1, "max": 10, "required": true},
                {"name": "sort", "type": "select", "options": [{"value": "price", "label": "Price"}]}
            ]
        }))
        .unwrap()
    }

    fn values(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_required_and_blank() {
        let config = amazon();
        assert!(matches!(
            validate_parameters(&config, &values(json!({"max_pages": 3}))),
            Err(BurpError::MissingParameter { name }) if name == "search_term"
        ));
        assert!(validate_parameters(&config, &values(json!({"search_term": "   ", "max_pages": 3}))).is_err());
        assert!(validate_parameters(&config, &values(json!({"search_term": "laptop", "max_pages": 3}))).is_ok());
    }

    #[test]
    fn test_number_bounds_and_options() {
        let config = amazon();
        let too_many = values(json!({"search_term": "x", "max_pages": 11}));
        assert!(matches!(
            validate_parameters(&config, &too_many),
            Err(BurpError::InvalidParameter { .. })
        ));

        let bad_sort = values(json!({"search_term": "x", "max_pages": 2, "sort": "rating"}));
        assert!(validate_parameters(&config, &bad_sort).is_err());

        let good_sort = values(json!({"search_term": "x", "max_pages": "2", "sort": "price"}));
        assert!(validate_parameters(&config, &good_sort).is_ok());
    }

    #[test]
    fn test_parse_parameter() {
        let config = amazon();
        let pages = config.parameter("max_pages").unwrap();
        assert_eq!(parse_parameter(pages, " 4 ").unwrap(), json!(4));
        assert_eq!(parse_parameter(pages, "2.5").unwrap(), json!(2.5));
        assert!(parse_parameter(pages, "many").is_err());
        assert_eq!(parse_parameter(pages, "").unwrap(), json!(""));

        let term = config.parameter("search_term").unwrap();
        assert_eq!(parse_parameter(term, "echo dot").unwrap(), json!("echo dot"));
    }
}
