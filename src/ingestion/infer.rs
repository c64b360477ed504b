//! Column type inference - all-or-nothing INTEGER vs TEXT

use crate::ingestion::types::{Column, ColumnSchema, ColumnType, RecordSet};

/// INTEGER if every non-empty value parses as a base-10 integer and at least one does,
/// otherwise TEXT. Pure function.
pub fn infer_column_type<'a, I>(values: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut saw_integer = false;

    for value in values.into_iter().filter(|v| !v.is_empty()) {
        if value.parse::<i64>().is_err() {
            return ColumnType::Text;
        }
        saw_integer = true;
    }

    if saw_integer {
        ColumnType::Integer
    } else {
        ColumnType::Text
    }
}

/// Infer a schema for every column of a record set, in header order
pub fn infer_schema(records: &RecordSet) -> ColumnSchema {
    let columns = records
        .headers
        .iter()
        .enumerate()
        .map(|(idx, name)| Column {
            name: name.clone(),
            column_type: infer_column_type(records.column(idx)),
        })
        .collect();

    ColumnSchema::new(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_integers() {
        assert_eq!(infer_column_type(["10", "7", "-3"]), ColumnType::Integer);
    }

    #[test]
    fn test_one_text_value_forces_text() {
        assert_eq!(infer_column_type(["10", "seven", "3"]), ColumnType::Text);
    }

    #[test]
    fn test_no_floats_or_dates() {
        assert_eq!(infer_column_type(["1.5"]), ColumnType::Text);
        assert_eq!(infer_column_type(["2024-01-01"]), ColumnType::Text);
    }

    #[test]
    fn test_empty_values_are_ignored() {
        assert_eq!(infer_column_type(["10", "", "7"]), ColumnType::Integer);
    }

    #[test]
    fn test_no_evidence_is_text() {
        assert_eq!(infer_column_type(Vec::<&str>::new()), ColumnType::Text);
        assert_eq!(infer_column_type(["", ""]), ColumnType::Text);
    }

    #[test]
    fn test_infer_schema() {
        let records = RecordSet {
            headers: vec!["Name".to_string(), "Score".to_string()],
            rows: vec![
                vec!["Ann".to_string(), "10".to_string()],
                vec!["Bo".to_string(), "7".to_string()],
            ],
        };

        let schema = infer_schema(&records);
        assert_eq!(
            schema.columns,
            vec![
                Column {
                    name: "Name".to_string(),
                    column_type: ColumnType::Text
                },
                Column {
                    name: "Score".to_string(),
                    column_type: ColumnType::Integer
                },
            ]
        );
    }

    #[test]
    fn test_zero_rows_is_all_text() {
        let records = RecordSet {
            headers: vec!["Id".to_string(), "Name".to_string()],
            rows: vec![],
        };
        let schema = infer_schema(&records);
        assert!(schema
            .columns
            .iter()
            .all(|c| c.column_type == ColumnType::Text));
    }
}
