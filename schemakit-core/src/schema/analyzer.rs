//! Choice among ambiguous column reconstructions.

use crate::dialect::Dialect;
use crate::error::SchemaKitError;
use crate::models::CandidateDefinition;
use crate::types;
use crate::Result;

/// Picks one candidate definition for rename and modify flows.
///
/// Ranking, first difference wins:
/// 1. candidates that pass the column definition checks;
/// 2. candidates whose rendered native type equals the introspected one,
///    i.e. the lossless reconstruction;
/// 3. introspection order, which lists the most specific candidate first.
#[derive(Debug, Clone, Copy)]
pub struct DefinitionAnalyzer<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> DefinitionAnalyzer<'d> {
    /// Creates an analyzer that renders candidates with `dialect`.
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self { dialect }
    }

    /// Returns exactly one candidate for any non-empty input.
    ///
    /// # Errors
    /// Returns a schema error when `candidates` is empty.
    pub fn get_best_definition_alternative<'c>(
        &self,
        candidates: &'c [CandidateDefinition],
    ) -> Result<&'c CandidateDefinition> {
        candidates
            .iter()
            .enumerate()
            .min_by_key(|(position, candidate)| {
                let invalid =
                    types::check_column_definition(&candidate.definition, self.dialect.rules())
                        .is_err();
                let lossy = !self.is_lossless(candidate);
                (invalid, lossy, *position)
            })
            .map(|(_, candidate)| candidate)
            .ok_or_else(|| SchemaKitError::schema("No candidate definitions to choose from"))
    }

    fn is_lossless(&self, candidate: &CandidateDefinition) -> bool {
        let rendered = self
            .dialect
            .native_type(&candidate.definition)
            .to_ascii_lowercase();
        rendered == candidate.native_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, SqliteDialect};
    use crate::models::{ColumnDefinition, PortableType};
    use crate::types::NativeColumn;

    fn candidates(declared: &str) -> Vec<CandidateDefinition> {
        types::candidate_definitions(&NativeColumn::from_declared("c", declared)).unwrap()
    }

    #[test]
    fn test_empty_input_is_error() {
        let analyzer = DefinitionAnalyzer::new(&MySqlDialect);
        assert!(analyzer.get_best_definition_alternative(&[]).is_err());
    }

    #[test]
    fn test_single_candidate_is_returned() {
        let all = candidates("varchar(20)");
        let best = DefinitionAnalyzer::new(&MySqlDialect)
            .get_best_definition_alternative(&all)
            .unwrap();
        assert_eq!(best.definition, ColumnDefinition::text(20));
    }

    #[test]
    fn test_prefers_lossless_candidate() {
        // datetime reconstructs as timestamp (renders DATETIME) or datetime
        // (renders TIMESTAMP)
        let all = candidates("datetime");
        let best = DefinitionAnalyzer::new(&MySqlDialect)
            .get_best_definition_alternative(&all)
            .unwrap();
        assert_eq!(best.definition.column_type, PortableType::Timestamp);

        let all = candidates("timestamp");
        let best = DefinitionAnalyzer::new(&MySqlDialect)
            .get_best_definition_alternative(&all)
            .unwrap();
        assert_eq!(best.definition.column_type, PortableType::DateTime);
    }

    #[test]
    fn test_sqlite_integer_keeps_64_bit_width() {
        let mut column = NativeColumn::from_declared("id", "INTEGER");
        column.nullable = false;
        column.primary = true;
        column.autoincrement = true;
        let all = types::candidate_definitions(&column).unwrap();
        let best = DefinitionAnalyzer::new(&SqliteDialect)
            .get_best_definition_alternative(&all)
            .unwrap();
        assert_eq!(best.definition.length, Some(8));
        assert!(best.definition.autoincrement);
        assert!(all.iter().any(|c| c.definition.is_equivalent_to(
            &ColumnDefinition::integer(4).autoincrement()
        )));
    }

    #[test]
    fn test_prefers_valid_candidate() {
        // text(65535) exceeds the text length limit, clob is valid
        let mut column = NativeColumn::from_declared("body", "text");
        column.length = Some(65535);
        let all = types::candidate_definitions(&column).unwrap();
        let best = DefinitionAnalyzer::new(&MySqlDialect)
            .get_best_definition_alternative(&all)
            .unwrap();
        assert_eq!(best.definition.column_type, PortableType::Clob);
    }

    #[test]
    fn test_falls_back_to_first_candidate() {
        let all = vec![
            CandidateDefinition {
                definition: ColumnDefinition::text(10),
                native_type: "nvarchar(10)".into(),
            },
            CandidateDefinition {
                definition: ColumnDefinition::text(20),
                native_type: "nvarchar(10)".into(),
            },
        ];
        let best = DefinitionAnalyzer::new(&SqliteDialect)
            .get_best_definition_alternative(&all)
            .unwrap();
        assert_eq!(best.definition.length, Some(10));
    }

    #[test]
    fn test_deterministic() {
        let all = candidates("tinytext");
        let analyzer = DefinitionAnalyzer::new(&MySqlDialect);
        let first = analyzer.get_best_definition_alternative(&all).unwrap();
        let second = analyzer.get_best_definition_alternative(&all).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.definition, ColumnDefinition::text(255));
    }
}
