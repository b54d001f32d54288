//! Portable type system.
//!
//! Maps portable column types onto native type syntax, validates column
//! definitions, and rebuilds candidate definitions from native metadata.

mod naming;

pub use naming::NamingRules;

use crate::error::SchemaKitError;
use crate::models::{CandidateDefinition, ColumnDefinition, PortableType, TableDefinition};
use crate::Result;
use std::collections::HashSet;

/// Integer byte widths accepted as `length` of an integer column.
pub const INTEGER_LENGTHS: [u32; 5] = [1, 2, 3, 4, 8];

/// Largest float precision accepted.
pub const MAX_FLOAT_PRECISION: u32 = 53;

/// Definition attributes whose presence is checked per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Text length in characters, or integer width in bytes
    Length,
    /// Float precision in bits
    Precision,
    /// NOT NULL constraint
    NotNull,
    /// Column default value
    Default,
    /// Fixed-width text (`CHAR` instead of `VARCHAR`)
    Fixed,
    /// Membership in the primary key
    Primary,
    /// Backed by an auto-increment counter
    Autoincrement,
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Attribute::Length => "length",
            Attribute::Precision => "precision",
            Attribute::NotNull => "notnull",
            Attribute::Default => "default",
            Attribute::Fixed => "fixed",
            Attribute::Primary => "primary",
            Attribute::Autoincrement => "autoincrement",
        };
        f.write_str(name)
    }
}

/// Attributes a column of the given type may carry.
pub fn allowed_attributes(column_type: PortableType) -> &'static [Attribute] {
    use Attribute::*;

    match column_type {
        PortableType::Text => &[Length, NotNull, Default, Fixed, Primary],
        PortableType::Integer => &[Length, NotNull, Default, Primary, Autoincrement],
        PortableType::Float => &[Precision, NotNull, Default, Primary],
        PortableType::Date
        | PortableType::Time
        | PortableType::DateTime
        | PortableType::Timestamp => &[NotNull, Default, Primary],
        PortableType::Clob => &[NotNull],
    }
}

/// Attributes actually set on a definition.
pub fn present_attributes(definition: &ColumnDefinition) -> Vec<Attribute> {
    let mut present = Vec::new();
    if definition.length.is_some() {
        present.push(Attribute::Length);
    }
    if definition.precision.is_some() {
        present.push(Attribute::Precision);
    }
    if definition.not_null {
        present.push(Attribute::NotNull);
    }
    if definition.default.is_some() {
        present.push(Attribute::Default);
    }
    if definition.fixed {
        present.push(Attribute::Fixed);
    }
    if definition.is_primary {
        present.push(Attribute::Primary);
    }
    if definition.autoincrement {
        present.push(Attribute::Autoincrement);
    }
    present
}

/// Returns a copy without the attributes its type does not allow.
///
/// Used when a column changes type and attributes of the old definition
/// must not leak into the new one.
pub fn strip_disallowed(definition: &ColumnDefinition) -> ColumnDefinition {
    let allowed = allowed_attributes(definition.column_type);
    let keep = |attribute| allowed.contains(&attribute);
    ColumnDefinition {
        column_type: definition.column_type,
        length: definition.length.filter(|_| keep(Attribute::Length)),
        precision: definition.precision.filter(|_| keep(Attribute::Precision)),
        not_null: definition.not_null && keep(Attribute::NotNull),
        default: definition.default.clone().filter(|_| keep(Attribute::Default)),
        fixed: definition.fixed && keep(Attribute::Fixed),
        is_primary: definition.is_primary && keep(Attribute::Primary),
        autoincrement: definition.autoincrement && keep(Attribute::Autoincrement),
    }
}

/// Validates a column definition against the portable type rules.
///
/// # Errors
/// Returns [`SchemaKitError::Schema`] naming the first violated rule.
pub fn check_column_definition(definition: &ColumnDefinition, rules: &NamingRules) -> Result<()> {
    let column_type = definition.column_type;
    let allowed = allowed_attributes(column_type);
    if let Some(attribute) = present_attributes(definition)
        .into_iter()
        .find(|a| !allowed.contains(a))
    {
        return Err(SchemaKitError::schema(format!(
            "Attribute '{}' is not allowed for type '{}'",
            attribute, column_type
        )));
    }

    match column_type {
        PortableType::Text => match definition.length {
            None => {
                return Err(SchemaKitError::schema(
                    "Type 'text' requires a length",
                ));
            }
            Some(length) if length == 0 || length > rules.max_text_length => {
                return Err(SchemaKitError::schema(format!(
                    "Invalid length {} for type 'text': must be between 1 and {}",
                    length, rules.max_text_length
                )));
            }
            Some(_) => {}
        },
        PortableType::Integer => {
            if let Some(length) = definition.length
                && !INTEGER_LENGTHS.contains(&length)
            {
                return Err(SchemaKitError::schema(format!(
                    "Invalid length {} for type 'integer': must be one of 1, 2, 3, 4, 8",
                    length
                )));
            }
        }
        PortableType::Float => {
            if let Some(precision) = definition.precision
                && (precision == 0 || precision > MAX_FLOAT_PRECISION)
            {
                return Err(SchemaKitError::schema(format!(
                    "Invalid precision {} for type 'float': must be between 1 and {}",
                    precision, MAX_FLOAT_PRECISION
                )));
            }
        }
        _ => {}
    }

    if definition.autoincrement {
        if !definition.not_null {
            return Err(SchemaKitError::schema(
                "Autoincrement columns must be NOT NULL",
            ));
        }
        if definition.default.is_some() {
            return Err(SchemaKitError::schema(
                "Autoincrement columns cannot have a default value",
            ));
        }
    }

    if let Some(default) = &definition.default {
        check_default(definition, default)?;
    }

    Ok(())
}

fn check_default(definition: &ColumnDefinition, default: &str) -> Result<()> {
    let valid = match definition.column_type {
        PortableType::Integer => default.trim().parse::<i64>().is_ok(),
        PortableType::Float => default
            .trim()
            .parse::<f64>()
            .is_ok_and(f64::is_finite),
        PortableType::Text => definition
            .length
            .is_none_or(|length| default.chars().count() <= length as usize),
        _ => true,
    };
    if valid {
        Ok(())
    } else {
        Err(SchemaKitError::schema(format!(
            "Default value '{}' is not valid for type '{}'",
            default, definition.column_type
        )))
    }
}

/// Validates table name, column names, column definitions and the primary key.
///
/// # Errors
/// Returns [`SchemaKitError::Schema`] on the first violation.
pub fn check_table_definition(table: &TableDefinition, rules: &NamingRules) -> Result<()> {
    rules.check_table_name(&table.name)?;
    if table.columns.is_empty() {
        return Err(SchemaKitError::schema(format!(
            "Table '{}' has no columns",
            table.name
        )));
    }

    let mut seen = HashSet::new();
    for (name, definition) in &table.columns {
        rules.check_column_name(name)?;
        if !seen.insert(name.as_str()) {
            return Err(SchemaKitError::schema(format!(
                "Duplicate column '{}' in table '{}'",
                name, table.name
            )));
        }
        check_column_definition(definition, rules).map_err(|e| match e {
            SchemaKitError::Schema { message } => {
                SchemaKitError::schema(format!("Column '{}': {}", name, message))
            }
            other => other,
        })?;
    }

    let primary_key = table.effective_primary_key();
    if let Some(missing) = primary_key.iter().find(|c| !seen.contains(c.as_str())) {
        return Err(SchemaKitError::schema(format!(
            "Primary key column '{}' does not exist in table '{}'",
            missing, table.name
        )));
    }

    let autoincrement: Vec<&str> = table
        .columns
        .iter()
        .filter(|(_, d)| d.autoincrement)
        .map(|(n, _)| n.as_str())
        .collect();
    if autoincrement.len() > 1 {
        return Err(SchemaKitError::schema(format!(
            "Table '{}' has more than one autoincrement column",
            table.name
        )));
    }
    if let Some(column) = autoincrement.first()
        && !primary_key.iter().any(|c| c == column)
    {
        return Err(SchemaKitError::schema(format!(
            "Autoincrement column '{}' must be part of the primary key",
            column
        )));
    }

    Ok(())
}

/// Native type name for a portable definition, shared by the built-in
/// dialects.
pub fn native_type(definition: &ColumnDefinition) -> String {
    match definition.column_type {
        PortableType::Text => {
            let length = definition.length.unwrap_or(255);
            if definition.fixed {
                format!("CHAR({})", length)
            } else {
                format!("VARCHAR({})", length)
            }
        }
        PortableType::Integer => match definition.length {
            Some(1) => "TINYINT".to_string(),
            Some(2) => "SMALLINT".to_string(),
            Some(3) => "MEDIUMINT".to_string(),
            None | Some(4) => "INT".to_string(),
            Some(_) => "BIGINT".to_string(),
        },
        PortableType::Float => match definition.precision {
            Some(precision) => format!("FLOAT({})", precision),
            None => "DOUBLE".to_string(),
        },
        PortableType::Date => "DATE".to_string(),
        PortableType::Time => "TIME".to_string(),
        // Legacy mapping: the two names are swapped on purpose.
        PortableType::DateTime => "TIMESTAMP".to_string(),
        PortableType::Timestamp => "DATETIME".to_string(),
        PortableType::Clob => "LONGTEXT".to_string(),
    }
}

/// A live column as reported by backend metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeColumn {
    /// Column name as stored by the backend
    pub name: String,
    /// Lowercase base type, e.g. `varchar`
    pub data_type: String,
    /// First type argument, e.g. `20` in `varchar(20)`
    pub length: Option<u32>,
    /// Second type argument, e.g. `2` in `decimal(10,2)`
    pub scale: Option<u32>,
    /// Whether NULL is accepted
    pub nullable: bool,
    /// Raw default as reported, possibly still quoted; see
    /// [`normalize_default`]
    pub default: Option<String>,
    /// Backed by `AUTO_INCREMENT` or an `AUTOINCREMENT` rowid alias
    pub autoincrement: bool,
    /// Part of the primary key
    pub primary: bool,
}

const INTEGER_BASES: [&str; 6] = ["tinyint", "smallint", "mediumint", "int", "integer", "bigint"];

impl NativeColumn {
    /// Builds a native column from a declared type string such as
    /// `int(11) unsigned` or `VARCHAR(20)`.
    pub fn from_declared(name: impl Into<String>, declared: &str) -> Self {
        let (data_type, length, scale) = parse_declared_type(declared);
        Self {
            name: name.into(),
            data_type,
            length,
            scale,
            nullable: true,
            default: None,
            autoincrement: false,
            primary: false,
        }
    }

    /// Canonical lowercase native type; integer display widths are dropped.
    pub fn native_type(&self) -> String {
        if INTEGER_BASES.contains(&self.data_type.as_str()) {
            return self.data_type.clone();
        }
        match (self.length, self.scale) {
            (Some(length), Some(scale)) => format!("{}({},{})", self.data_type, length, scale),
            (Some(length), None) => format!("{}({})", self.data_type, length),
            _ => self.data_type.clone(),
        }
    }
}

/// Splits a declared type into lowercase base name and numeric arguments.
pub fn parse_declared_type(declared: &str) -> (String, Option<u32>, Option<u32>) {
    let lower = declared.trim().to_ascii_lowercase();
    let (head, args) = match lower.split_once('(') {
        Some((head, rest)) => (head, rest.split(')').next().unwrap_or_default()),
        None => (lower.as_str(), ""),
    };
    let base = head
        .split_whitespace()
        .filter(|w| !matches!(*w, "unsigned" | "signed" | "zerofill"))
        .collect::<Vec<_>>()
        .join(" ");
    let mut numbers = args.split(',').map(|a| a.trim().parse::<u32>().ok());
    let length = numbers.next().flatten();
    let scale = numbers.next().flatten();
    (base, length, scale)
}

/// Strips literal quoting that some backends put around column defaults.
pub fn normalize_default(raw: Option<String>) -> Option<String> {
    let raw = raw?;
    if raw.eq_ignore_ascii_case("null") {
        return None;
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        let inner = &raw[1..raw.len().saturating_sub(1)];
        return Some(inner.replace("''", "'"));
    }
    Some(raw)
}

/// All plausible portable reconstructions of a native column, most specific
/// first.
///
/// # Errors
/// Returns [`SchemaKitError::Schema`] for native types with no portable
/// counterpart (blobs, enums, spatial types, ...).
pub fn candidate_definitions(column: &NativeColumn) -> Result<Vec<CandidateDefinition>> {
    use PortableType::*;

    let integer = |length: u32| (Integer, Some(length), None, false);
    let shapes: Vec<(PortableType, Option<u32>, Option<u32>, bool)> =
        match column.data_type.as_str() {
            "tinyint" => vec![integer(1)],
            "smallint" => vec![integer(2)],
            "mediumint" => vec![integer(3)],
            "int" => vec![integer(4)],
            // SQLite INTEGER is 64-bit and backs autoincrement columns of
            // every width.
            "integer" => vec![integer(8), integer(4), integer(3), integer(2), integer(1)],
            "bigint" => vec![integer(8)],
            "bool" | "boolean" => vec![integer(1)],
            "year" => vec![integer(2), (Date, None, None, false)],
            "varchar" | "character varying" | "nvarchar" | "varchar2" => {
                vec![(Text, Some(column.length.unwrap_or(255)), None, false)]
            }
            "char" | "character" | "nchar" => {
                vec![(Text, Some(column.length.unwrap_or(1)), None, true)]
            }
            "tinytext" => vec![(Text, Some(255), None, false), (Clob, None, None, false)],
            "text" => vec![
                (Clob, None, None, false),
                (Text, Some(column.length.unwrap_or(4000)), None, false),
            ],
            "mediumtext" | "longtext" | "clob" => vec![(Clob, None, None, false)],
            "float" => match column.length {
                Some(precision) => vec![
                    (Float, None, Some(precision), false),
                    (Float, None, None, false),
                ],
                None => vec![(Float, None, None, false)],
            },
            "double" | "double precision" | "real" => vec![(Float, None, None, false)],
            "decimal" | "numeric" => vec![(Float, None, column.length, false)],
            "date" => vec![(Date, None, None, false)],
            "time" => vec![(Time, None, None, false)],
            "datetime" => vec![(Timestamp, None, None, false), (DateTime, None, None, false)],
            "timestamp" => vec![(DateTime, None, None, false), (Timestamp, None, None, false)],
            other => {
                return Err(SchemaKitError::schema(format!(
                    "Column '{}' has native type '{}' with no portable equivalent",
                    column.name, other
                )));
            }
        };

    let native_type = column.native_type();
    let default = normalize_default(column.default.clone());
    Ok(shapes
        .into_iter()
        .map(|(column_type, length, precision, fixed)| {
            let allowed = allowed_attributes(column_type);
            let autoincrement =
                column.autoincrement && allowed.contains(&Attribute::Autoincrement);
            CandidateDefinition {
                definition: ColumnDefinition {
                    column_type,
                    length,
                    precision,
                    not_null: !column.nullable,
                    default: default
                        .clone()
                        .filter(|_| !autoincrement && allowed.contains(&Attribute::Default)),
                    fixed,
                    is_primary: column.primary && allowed.contains(&Attribute::Primary),
                    autoincrement,
                },
                native_type: native_type.clone(),
            }
        })
        .collect())
}
