//! Scalar <-> text conversion for plain text editors.
//!
//! `from_text(to_text(v)) == v` for booleans, numbers, null and most strings.
//! The empty string comes back as `null`, and strings that look like numbers
//! or booleans come back typed.
use serde_json::{Number, Value};

pub fn to_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        // containers never reach a leaf editor; keep their JSON form readable
        Value::Array(_) | Value::Object(_) => v.to_string(),
    }
}

pub fn from_text(text: &str) -> Value {
    let s = text.trim();
    if s.is_empty() {
        return Value::Null;
    }
    if s.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(u) = s.parse::<u64>() {
        return Value::Number(u.into());
    }
    if let Ok(f) = s.parse::<f64>()
        && let Some(n) = Number::from_f64(f)
    {
        return Value::Number(n);
    }
    Value::String(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    #[allow(clippy::approx_constant)]
    fn scalar_round_trip() {
        for v in [json!(true), json!(false), json!(42), json!(3.14), json!("hello"), Value::Null] {
            assert_eq!(from_text(&to_text(&v)), v, "round trip of {}", v);
        }
    }

    #[test]
    fn empty_string_becomes_null() {
        assert_eq!(from_text(&to_text(&json!(""))), Value::Null);
        assert_eq!(from_text("   "), Value::Null);
    }

    #[test]
    fn coercion_chain() {
        assert_eq!(from_text("TRUE"), json!(true));
        assert_eq!(from_text("False"), json!(false));
        assert_eq!(from_text(" 17 "), json!(17));
        assert_eq!(from_text("-2"), json!(-2));
        assert_eq!(from_text("18446744073709551615"), json!(18446744073709551615u64));
        assert_eq!(from_text("0.5"), json!(0.5));
        assert_eq!(from_text("1e3"), json!(1000.0));
        assert_eq!(from_text("NW/4 of Section 12"), json!("NW/4 of Section 12"));
        // not representable as a JSON number
        assert_eq!(from_text("inf"), json!("inf"));
        assert_eq!(from_text("NaN"), json!("NaN"));
    }
}
