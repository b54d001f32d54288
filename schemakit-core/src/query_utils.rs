//! SQL expression helpers.
//!
//! Column arguments are SQL expressions inserted verbatim; only values are
//! quoted.

use crate::dialect::Dialect;
use crate::error::SchemaKitError;
use crate::models::{PortableType, Value};
use crate::quoting::Quoter;
use crate::Result;

/// Builds dialect-specific expression fragments.
#[derive(Clone, Copy)]
pub struct QueryUtils<'d> {
    dialect: &'d dyn Dialect,
    quoter: Quoter<'d>,
}

impl<'d> QueryUtils<'d> {
    /// Builds helpers for `dialect`, quoting values with `quoter`.
    pub fn new(dialect: &'d dyn Dialect, quoter: Quoter<'d>) -> Self {
        Self { dialect, quoter }
    }

    /// `field IN (...)` over quoted values. An empty list never matches,
    /// or always matches when negated.
    pub fn in_clause(
        &self,
        field: &str,
        values: &[Value],
        negate: bool,
        column_type: PortableType,
    ) -> String {
        if values.is_empty() {
            return if negate { "1=1" } else { "1=2" }.to_string();
        }
        let list = values
            .iter()
            .map(|value| self.quoter.quote(value, column_type))
            .collect::<Vec<_>>()
            .join(",");
        let operator = if negate { "NOT IN" } else { "IN" };
        format!("{} {} ({})", field, operator, list)
    }

    /// `LIKE` comparison, upper-casing both sides when case-insensitive.
    ///
    /// # Errors
    /// Returns a schema error for column types other than text and clob.
    pub fn like(
        &self,
        column: &str,
        column_type: PortableType,
        value: &str,
        case_insensitive: bool,
    ) -> Result<String> {
        if !column_type.is_text_like() {
            return Err(SchemaKitError::schema(format!(
                "LIKE is not supported for column type '{}'",
                column_type
            )));
        }
        let quoted = self.quoter.quote(&Value::from(value), column_type);
        Ok(if case_insensitive {
            format!("UPPER({}) LIKE UPPER({})", column, quoted)
        } else {
            format!("{} LIKE {}", column, quoted)
        })
    }

    /// Equality with a quoted value. With `empty_or_null`, an empty value
    /// also matches NULL.
    pub fn equals(
        &self,
        column: &str,
        value: &Value,
        column_type: PortableType,
        empty_or_null: bool,
    ) -> String {
        let empty = value.as_text().is_none_or(|text| text.is_empty());
        if empty_or_null && empty {
            return format!("({} = '' OR {} IS NULL)", column, column);
        }
        format!("{} = {}", column, self.quoter.quote(value, column_type))
    }

    /// Current timestamp expression.
    pub fn now(&self) -> &'static str {
        self.dialect.now()
    }

    /// Concatenation of expressions; with `allow_null` each part is
    /// wrapped in `COALESCE(part, '')` so a NULL part does not null the
    /// result.
    pub fn concat<S: AsRef<str>>(&self, parts: &[S], allow_null: bool) -> String {
        let parts: Vec<String> = parts
            .iter()
            .map(|part| {
                if allow_null {
                    format!("COALESCE({}, '')", part.as_ref())
                } else {
                    part.as_ref().to_string()
                }
            })
            .collect();
        self.dialect.concat(&parts)
    }

    /// Upper-cased expression.
    pub fn upper(&self, expression: &str) -> String {
        format!("UPPER({})", expression)
    }

    /// Lower-cased expression.
    pub fn lower(&self, expression: &str) -> String {
        format!("LOWER({})", expression)
    }

    /// Substring from 1-based `position`, optionally limited to `length`.
    pub fn substr(&self, expression: &str, position: u64, length: Option<u64>) -> String {
        self.dialect.substr(expression, position, length)
    }

    /// 1-based position of `needle` in `haystack` searching from
    /// `position`; 0 when absent.
    pub fn locate(&self, needle: &str, haystack: &str, position: u64) -> String {
        self.dialect.locate(needle, haystack, position)
    }
}
