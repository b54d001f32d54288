//! Table change descriptions.
//!
//! A [`TableChange`] is what callers ask for; an [`AlterAction`] is the fully
//! resolved form a dialect renders, with every column definition complete.

use crate::models::{ColumnDefinition, PortableType};
use crate::types;
use serde::{Deserialize, Serialize};

/// A requested table change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TableChange {
    /// Adds a new column.
    AddColumn {
        name: String,
        definition: ColumnDefinition,
    },
    /// Removes an existing column.
    RemoveColumn { name: String },
    /// Renames a column, optionally replacing its definition.
    RenameColumn {
        from: String,
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        definition: Option<ColumnDefinition>,
    },
    /// Changes attributes of an existing column.
    ChangeColumn { name: String, change: ColumnChange },
    /// Renames the table.
    RenameTable { to: String },
}

/// Partial column definition; unset fields keep the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnChange {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub column_type: Option<PortableType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_null: Option<bool>,
    /// `Some(None)` removes the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoincrement: Option<bool>,
}

impl ColumnChange {
    /// Builder method to change the type.
    pub fn with_type(mut self, column_type: PortableType) -> Self {
        self.column_type = Some(column_type);
        self
    }

    /// Builder method to change the length.
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Builder method to change the precision.
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Builder method to change nullability.
    pub fn with_not_null(mut self, not_null: bool) -> Self {
        self.not_null = Some(not_null);
        self
    }

    /// Builder method to set or clear the default.
    pub fn with_default(mut self, default: Option<String>) -> Self {
        self.default = Some(default);
        self
    }

    /// Builder method to change fixed-width text.
    pub fn with_fixed(mut self, fixed: bool) -> Self {
        self.fixed = Some(fixed);
        self
    }

    /// Builder method to change auto-increment.
    pub fn with_autoincrement(mut self, autoincrement: bool) -> Self {
        self.autoincrement = Some(autoincrement);
        self
    }

    /// Merges the change over the current definition.
    ///
    /// When the type changes, attributes the new type does not allow are
    /// dropped from the current definition before the change is applied.
    pub fn apply(&self, current: &ColumnDefinition) -> ColumnDefinition {
        let mut base = current.clone();
        if let Some(column_type) = self.column_type
            && column_type != current.column_type
        {
            base.column_type = column_type;
            base = types::strip_disallowed(&base);
        }
        if let Some(length) = self.length {
            base.length = Some(length);
        }
        if let Some(precision) = self.precision {
            base.precision = Some(precision);
        }
        if let Some(not_null) = self.not_null {
            base.not_null = not_null;
        }
        if let Some(default) = &self.default {
            base.default = default.clone();
        }
        if let Some(fixed) = self.fixed {
            base.fixed = fixed;
        }
        if let Some(autoincrement) = self.autoincrement {
            base.autoincrement = autoincrement;
            if autoincrement {
                base.not_null = true;
            }
        }
        base
    }
}

/// A resolved table change ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterAction {
    AddColumn {
        name: String,
        definition: ColumnDefinition,
    },
    DropColumn {
        name: String,
    },
    RenameColumn {
        from: String,
        to: String,
        definition: ColumnDefinition,
    },
    ChangeColumn {
        name: String,
        definition: ColumnDefinition,
    },
    RenameTable {
        to: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_keeps_unset_fields() {
        let current = ColumnDefinition::text(20).not_null().with_default("x");
        let changed = ColumnChange::default().with_length(40).apply(&current);
        assert_eq!(changed, ColumnDefinition::text(40).not_null().with_default("x"));
    }

    #[test]
    fn test_apply_type_change_strips_disallowed() {
        let current = ColumnDefinition::text(20).fixed().not_null();
        let changed = ColumnChange::default()
            .with_type(PortableType::Clob)
            .apply(&current);
        assert_eq!(changed.column_type, PortableType::Clob);
        assert_eq!(changed.length, None);
        assert!(!changed.fixed);
        assert!(changed.not_null);
    }

    #[test]
    fn test_apply_clears_default() {
        let current = ColumnDefinition::integer(4).with_default("3");
        let changed = ColumnChange::default().with_default(None).apply(&current);
        assert_eq!(changed.default, None);
    }

    #[test]
    fn test_autoincrement_implies_not_null() {
        let changed = ColumnChange::default()
            .with_autoincrement(true)
            .apply(&ColumnDefinition::integer(4));
        assert!(changed.autoincrement && changed.not_null);
    }

    #[test]
    fn test_table_change_serde_shape() {
        let change: TableChange = serde_json::from_value(serde_json::json!({
            "action": "change_column",
            "name": "title",
            "change": {"length": 80}
        }))
        .unwrap();
        assert_eq!(
            change,
            TableChange::ChangeColumn {
                name: "title".into(),
                change: ColumnChange::default().with_length(80),
            }
        );
    }
}
