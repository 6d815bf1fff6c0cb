//! Field values and the identity keys derived from them.
//!
//! Field values are `sea_query::Value`s. Grouping related records by foreign
//! key and diffing collections by primary key both need a hashable identity;
//! [`key_of`] provides one that treats `Int(1)` and `BigInt(1)` as the same key
//! so a key copied between records of different integer widths still matches.

pub use sea_query::Value;

/// Returns `true` if `value` is a SQL `NULL` of any type.
pub fn is_null(value: &Value) -> bool {
    *value == value.as_null()
}

/// Normalized identity of a non-null value, `None` for `NULL`.
pub fn key_of(value: &Value) -> Option<String> {
    if is_null(value) {
        return None;
    }
    let key = match value {
        Value::TinyInt(Some(i)) => format!("i:{i}"),
        Value::SmallInt(Some(i)) => format!("i:{i}"),
        Value::Int(Some(i)) => format!("i:{i}"),
        Value::BigInt(Some(i)) => format!("i:{i}"),
        Value::TinyUnsigned(Some(u)) => format!("i:{u}"),
        Value::SmallUnsigned(Some(u)) => format!("i:{u}"),
        Value::Unsigned(Some(u)) => format!("i:{u}"),
        Value::BigUnsigned(Some(u)) => format!("i:{u}"),
        Value::String(Some(s)) => format!("s:{s}"),
        Value::Char(Some(c)) => format!("s:{c}"),
        Value::Bool(Some(b)) => format!("b:{b}"),
        other => format!("{other:?}"),
    };
    Some(key)
}

/// Key of an optional field value, `None` when absent or `NULL`.
pub(crate) fn key_of_opt(value: Option<&Value>) -> Option<String> {
    value.and_then(key_of)
}

/// `NULL` of the same type as `value`, or an untyped integer `NULL`.
pub(crate) fn null_like(value: Option<&Value>) -> Value {
    match value {
        Some(v) => v.as_null(),
        None => Value::Int(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_null() {
        assert!(is_null(&Value::Int(None)));
        assert!(is_null(&Value::String(None)));
        assert!(!is_null(&Value::Int(Some(0))));
        assert!(!is_null(&Value::String(Some(String::new()))));
    }

    #[test]
    fn test_key_of_integer_widths_match() {
        assert_eq!(key_of(&Value::Int(Some(1))), key_of(&Value::BigInt(Some(1))));
        assert_eq!(key_of(&Value::Unsigned(Some(7))), Some("i:7".to_string()));
        assert_ne!(key_of(&Value::Int(Some(1))), key_of(&Value::String(Some("1".to_string()))));
    }

    #[test]
    fn test_key_of_null_is_none() {
        assert_eq!(key_of(&Value::BigInt(None)), None);
        assert_eq!(key_of_opt(None), None);
    }

    #[test]
    fn test_null_like_keeps_type() {
        assert_eq!(null_like(Some(&Value::String(Some("a".into())))), Value::String(None));
        assert_eq!(null_like(None), Value::Int(None));
    }
}
