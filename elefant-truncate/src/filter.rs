use crate::quoting::quote_value_string;
use crate::{ElefantTruncateError, IdentifierQuoter, Result};
use itertools::Itertools;

/// Selects the rows that are deleted from every target table.
///
/// The same filter is applied to every table, so the column has to exist on all of them.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub enum RowFilter {
    /// Delete every row.
    #[default]
    All,
    /// Delete the rows where the column has one of the values.
    Values { column: String, values: Vec<String> },
    /// Delete the rows where `lower <= column < upper`. A missing bound leaves that side open.
    Range {
        column: String,
        lower: Option<String>,
        upper: Option<String>,
    },
}

impl RowFilter {
    /// Builds a filter from the loose parameters a user can give.
    ///
    /// Discrete values and range bounds cannot be combined, and neither can be given without
    /// a column.
    pub fn new(
        column: Option<String>,
        values: Vec<String>,
        lower: Option<String>,
        upper: Option<String>,
    ) -> Result<Self> {
        let has_bounds = lower.is_some() || upper.is_some();

        let Some(column) = column else {
            if !values.is_empty() || has_bounds {
                return Err(ElefantTruncateError::InvalidFilter(
                    "values and bounds require a column".to_string(),
                ));
            }
            return Ok(RowFilter::All);
        };

        if column.is_empty() {
            return Err(ElefantTruncateError::InvalidFilter(
                "the column name cannot be empty".to_string(),
            ));
        }

        match (values.is_empty(), has_bounds) {
            (false, true) => Err(ElefantTruncateError::InvalidFilter(format!(
                "cannot filter `{column}` by both values and bounds"
            ))),
            (false, false) => Ok(RowFilter::Values { column, values }),
            (true, true) => Ok(RowFilter::Range {
                column,
                lower,
                upper,
            }),
            (true, false) => Err(ElefantTruncateError::InvalidFilter(format!(
                "filtering by `{column}` requires either values or a lower or upper bound"
            ))),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, RowFilter::All)
    }

    /// Renders the filter as a `where` condition, or `None` when every row is selected.
    pub fn to_sql(&self, quoter: &IdentifierQuoter) -> Option<String> {
        match self {
            RowFilter::All => None,
            RowFilter::Values { column, values } => Some(format!(
                "{} IN ({})",
                quoter.quote_column(column),
                values.iter().map(|v| quote_value_string(v)).join(", ")
            )),
            RowFilter::Range {
                column,
                lower,
                upper,
            } => {
                let column = quoter.quote_column(column);
                let lower = lower
                    .as_deref()
                    .map(|l| format!("{column} >= {}", quote_value_string(l)));
                let upper = upper
                    .as_deref()
                    .map(|u| format!("{column} < {}", quote_value_string(u)));

                let condition = lower.into_iter().chain(upper).join(" AND ");
                (!condition.is_empty()).then_some(condition)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn no_column_selects_everything() {
        let filter = RowFilter::new(None, vec![], None, None).unwrap();

        assert_eq!(filter, RowFilter::All);
        assert_eq!(filter.to_sql(&IdentifierQuoter::empty()), None);
    }

    #[test]
    fn renders_discrete_values() {
        let filter = RowFilter::new(Some(s("status")), vec![s("closed"), s("it's gone")], None, None).unwrap();

        assert_eq!(
            filter.to_sql(&IdentifierQuoter::empty()).unwrap(),
            "status IN ('closed', 'it''s gone')"
        );
    }

    #[test]
    fn renders_range_with_inclusive_lower_and_exclusive_upper_bound() {
        let filter = RowFilter::new(
            Some(s("created_at")),
            vec![],
            Some(s("2020-01-01")),
            Some(s("2021-01-01")),
        )
        .unwrap();

        assert_eq!(
            filter.to_sql(&IdentifierQuoter::empty()).unwrap(),
            "created_at >= '2020-01-01' AND created_at < '2021-01-01'"
        );
    }

    #[test]
    fn renders_open_ended_ranges() {
        let quoter = IdentifierQuoter::empty();

        let lower_only = RowFilter::new(Some(s("id")), vec![], Some(s("10")), None).unwrap();
        assert_eq!(lower_only.to_sql(&quoter).unwrap(), "id >= '10'");

        let upper_only = RowFilter::new(Some(s("CreatedAt")), vec![], None, Some(s("10"))).unwrap();
        assert_eq!(upper_only.to_sql(&quoter).unwrap(), "\"CreatedAt\" < '10'");
    }

    #[test]
    fn rejects_conflicting_parameters() {
        let both = RowFilter::new(Some(s("id")), vec![s("1")], Some(s("0")), None);
        assert!(matches!(both, Err(ElefantTruncateError::InvalidFilter(_))));

        let no_column = RowFilter::new(None, vec![s("1")], None, None);
        assert!(matches!(no_column, Err(ElefantTruncateError::InvalidFilter(_))));

        let bounds_without_column = RowFilter::new(None, vec![], None, Some(s("1")));
        assert!(matches!(
            bounds_without_column,
            Err(ElefantTruncateError::InvalidFilter(_))
        ));

        let column_only = RowFilter::new(Some(s("id")), vec![], None, None);
        assert!(matches!(column_only, Err(ElefantTruncateError::InvalidFilter(_))));
    }
}
