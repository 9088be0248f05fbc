//! Cleaning of loosely formatted sheet values.

use serde_json::Value;

/// Convert a raw sheet value into a float.
///
/// Numbers pass through.  Strings are stripped of `%` and `‰` markers, have
/// comma decimal separators replaced by periods, and are trimmed before
/// parsing.  Anything unparseable, and any other JSON type, yields `None`.
/// Never fails.
pub fn clean_value(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = s.replace(['%', '‰'], "").replace(',', ".");
            cleaned.trim().parse::<f64>().ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn percent_with_comma_decimal() {
        assert_eq!(clean_value(&json!("96,88%")), Some(96.88));
    }

    #[test]
    fn per_mille() {
        assert_eq!(clean_value(&json!("12.3‰")), Some(12.3));
    }

    #[test]
    fn plain_number() {
        assert_eq!(clean_value(&json!(42)), Some(42.0));
    }

    #[test]
    fn garbage_string() {
        assert_eq!(clean_value(&json!("abc")), None);
    }

    #[test]
    fn whitespace_is_trimmed() {
        assert_eq!(clean_value(&json!("  87,5 % ")), Some(87.5));
    }

    #[test]
    fn other_types() {
        assert_eq!(clean_value(&json!(null)), None);
        assert_eq!(clean_value(&json!(true)), None);
        assert_eq!(clean_value(&json!(["1"])), None);
    }
}
