//! Type-directed literal quoting and `%s` template substitution.
//!
//! Parameterized helpers such as `query_f` substitute quoted literals into the
//! SQL text, so injection safety rests on [`Quoter::quote`] being correct for
//! every portable type.

use crate::dialect::Dialect;
use crate::error::SchemaKitError;
use crate::models::{PortableType, Value};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Compatibility switches for literal quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteOptions {
    /// Quote float values as driver string literals without numeric coercion,
    /// reproducing the legacy behavior (`'3.5'`). When false, finite numbers
    /// are emitted bare (`3.5`).
    #[serde(default = "legacy_float_default")]
    pub legacy_float_quoting: bool,
}

fn legacy_float_default() -> bool {
    true
}

impl Default for QuoteOptions {
    fn default() -> Self {
        Self {
            legacy_float_quoting: legacy_float_default(),
        }
    }
}

/// Quotes values and identifiers for one dialect.
#[derive(Clone, Copy)]
pub struct Quoter<'d> {
    dialect: &'d dyn Dialect,
    options: QuoteOptions,
}

impl<'d> Quoter<'d> {
    /// Creates a quoter bound to a dialect.
    pub fn new(dialect: &'d dyn Dialect, options: QuoteOptions) -> Self {
        Self { dialect, options }
    }

    /// Quotes an identifier with the dialect's quote character.
    pub fn quote_identifier(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    /// Quotes a value according to its declared portable type.
    ///
    /// `Null` always yields `NULL`. Integers are coerced first; the value `1`
    /// is emitted bare while every other integer goes through driver string
    /// quoting (`'2'`). Floats follow [`QuoteOptions::legacy_float_quoting`].
    /// All other types are string-quoted, byte values as hex literals.
    pub fn quote(&self, value: &Value, column_type: PortableType) -> String {
        if value.is_null() {
            return "NULL".to_string();
        }
        match column_type {
            PortableType::Integer => {
                let coerced = coerce_integer(value);
                if coerced == 1 {
                    "1".to_string()
                } else {
                    self.dialect.quote_string(&coerced.to_string())
                }
            }
            PortableType::Float if !self.options.legacy_float_quoting => {
                match numeric_literal(value) {
                    Some(literal) => literal,
                    None => self.quote_text(value),
                }
            }
            _ => self.quote_text(value),
        }
    }

    fn quote_text(&self, value: &Value) -> String {
        match value {
            Value::Bytes(bytes) => hex_literal(bytes),
            other => self
                .dialect
                .quote_string(&other.as_text().unwrap_or_default()),
        }
    }

    /// Quotes parallel type and value arrays.
    ///
    /// # Errors
    /// Returns [`SchemaKitError::ArgumentMismatch`] when the arrays differ in
    /// length.
    pub fn quote_all(&self, types: &[PortableType], values: &[Value]) -> Result<Vec<String>> {
        if types.len() != values.len() {
            return Err(SchemaKitError::argument_mismatch(
                "types and values arrays",
                types.len(),
                values.len(),
            ));
        }
        Ok(values
            .iter()
            .zip(types)
            .map(|(value, column_type)| self.quote(value, *column_type))
            .collect())
    }
}

/// Lenient integer coercion: floats truncate, text uses its leading integer
/// prefix, anything unparsable is 0.
pub fn coerce_integer(value: &Value) -> i64 {
    match value {
        Value::Null => 0,
        Value::Integer(i) => *i,
        // `as` saturates at the i64 bounds and maps NaN to 0
        Value::Float(f) => f.trunc() as i64,
        Value::Text(s) => leading_integer(s),
        Value::Bytes(b) => leading_integer(&String::from_utf8_lossy(b)),
    }
}

fn leading_integer(s: &str) -> i64 {
    let trimmed = s.trim_start();
    let mut end = 0;
    for (i, c) in trimmed.char_indices() {
        let sign = i == 0 && (c == '-' || c == '+');
        if !(sign || c.is_ascii_digit()) {
            break;
        }
        end = i + c.len_utf8();
    }
    let digits = &trimmed[..end];
    match digits.parse::<i64>() {
        Ok(n) => n,
        Err(_) if digits.len() > 1 && digits.starts_with('-') => i64::MIN,
        Err(_) if digits.chars().any(|c| c.is_ascii_digit()) => i64::MAX,
        Err(_) => 0,
    }
}

fn numeric_literal(value: &Value) -> Option<String> {
    let number = match value {
        Value::Integer(i) => return Some(i.to_string()),
        Value::Float(f) => *f,
        Value::Text(s) => s.trim().parse::<f64>().ok()?,
        Value::Null | Value::Bytes(_) => return None,
    };
    number.is_finite().then(|| number.to_string())
}

/// Hex literal for binary data, accepted by both built-in dialects.
pub fn hex_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 3);
    out.push_str("X'");
    for byte in bytes {
        out.push_str(&format!("{:02X}", byte));
    }
    out.push('\'');
    out
}

/// Substitutes already-quoted literals for `%s` placeholders in order.
///
/// `%%` produces a literal `%`; any other `%x` sequence is copied unchanged.
///
/// # Errors
/// Returns [`SchemaKitError::ArgumentMismatch`] when the number of `%s`
/// placeholders differs from the number of values.
pub fn substitute(template: &str, quoted: &[String]) -> Result<String> {
    let placeholders = count_placeholders(template);
    if placeholders != quoted.len() {
        return Err(SchemaKitError::argument_mismatch(
            "template placeholders and values",
            placeholders,
            quoted.len(),
        ));
    }

    let mut out = String::with_capacity(template.len() + quoted.iter().map(String::len).sum::<usize>());
    let mut values = quoted.iter();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') => {
                chars.next();
                if let Some(value) = values.next() {
                    out.push_str(value);
                }
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }
    Ok(out)
}

fn count_placeholders(template: &str) -> usize {
    let mut count = 0;
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.next() {
                Some('s') => count += 1,
                Some(_) | None => {}
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, SqliteDialect};

    fn mysql() -> Quoter<'static> {
        Quoter::new(&MySqlDialect, QuoteOptions::default())
    }

    #[test]
    fn test_null_is_always_null_literal() {
        for column_type in PortableType::ALL {
            assert_eq!(mysql().quote(&Value::Null, column_type), "NULL");
        }
    }

    #[test]
    fn test_integer_fast_path() {
        let q = mysql();
        assert_eq!(q.quote(&Value::from(1), PortableType::Integer), "1");
        assert_eq!(q.quote(&Value::from(2), PortableType::Integer), "'2'");
        assert_eq!(q.quote(&Value::from("1"), PortableType::Integer), "1");
        assert_eq!(q.quote(&Value::from("12abc"), PortableType::Integer), "'12'");
        assert_eq!(q.quote(&Value::from("abc"), PortableType::Integer), "'0'");
        assert_eq!(q.quote(&Value::from(2.9), PortableType::Integer), "'2'");
        assert_eq!(q.quote(&Value::from(-7), PortableType::Integer), "'-7'");
    }

    #[test]
    fn test_float_legacy_quoting() {
        let q = mysql();
        assert_eq!(q.quote(&Value::from(3.5), PortableType::Float), "'3.5'");
        assert_eq!(q.quote(&Value::from("3.5abc"), PortableType::Float), "'3.5abc'");
    }

    #[test]
    fn test_float_fixed_quoting() {
        let q = Quoter::new(
            &MySqlDialect,
            QuoteOptions {
                legacy_float_quoting: false,
            },
        );
        assert_eq!(q.quote(&Value::from(3.5), PortableType::Float), "3.5");
        assert_eq!(q.quote(&Value::from(" 2.25 "), PortableType::Float), "2.25");
        assert_eq!(q.quote(&Value::from(4), PortableType::Float), "4");
        assert_eq!(q.quote(&Value::from(f64::NAN), PortableType::Float), "'NaN'");
        assert_eq!(q.quote(&Value::from("x'y"), PortableType::Float), "'x''y'");
    }

    #[test]
    fn test_string_quoting_per_dialect() {
        assert_eq!(
            mysql().quote(&Value::from("it's a \\ test"), PortableType::Text),
            "'it''s a \\ test'"
        );
        let sqlite = Quoter::new(&SqliteDialect, QuoteOptions::default());
        assert_eq!(
            sqlite.quote(&Value::from("it's"), PortableType::Text),
            "'it''s'"
        );
        assert_eq!(
            sqlite.quote(&Value::Bytes(vec![0x01, 0xab]), PortableType::Clob),
            "X'01AB'"
        );
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(mysql().quote_identifier("order"), "`order`");
        assert_eq!(mysql().quote_identifier("a`b"), "`a``b`");
        let sqlite = Quoter::new(&SqliteDialect, QuoteOptions::default());
        assert_eq!(sqlite.quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_quote_all_requires_equal_lengths() {
        let err = mysql()
            .quote_all(&[PortableType::Text], &[Value::from("a"), Value::from(1)])
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaKitError::ArgumentMismatch {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_substitute() {
        let sql = substitute(
            "SELECT * FROM t WHERE a=%s AND b LIKE 'x%%' AND c=%s AND d=%d",
            &["'x'".to_string(), "5".to_string()],
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a='x' AND b LIKE 'x%' AND c=5 AND d=%d");

        assert!(substitute("a=%s", &[]).is_err());
        assert!(substitute("a=1", &["2".to_string()]).is_err());
        assert_eq!(substitute("100%", &[]).unwrap(), "100%");
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(coerce_integer(&Value::from(" -42xyz")), -42);
        assert_eq!(coerce_integer(&Value::from("+7")), 7);
        assert_eq!(coerce_integer(&Value::from("-")), 0);
        assert_eq!(coerce_integer(&Value::from("99999999999999999999")), i64::MAX);
        assert_eq!(coerce_integer(&Value::from(f64::INFINITY)), i64::MAX);
    }
}
