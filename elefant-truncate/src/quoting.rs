use crate::postgres_client_wrapper::{FromPgChar, FromRow, RowEnumExt};
use crate::{ElefantTruncateError, PostgresClientWrapper, TableName};
use itertools::Itertools;
use std::collections::HashMap;
use tokio_postgres::Row;
use tracing::instrument;

/// Quotes identifiers for use in the generated delete statements, leaving them bare when
/// Postgres would read them back unchanged.
#[derive(Debug, Default)]
pub struct IdentifierQuoter {
    /// Keywords that have to be quoted, and whether they are allowed as bare column names.
    keywords: HashMap<String, bool>,
}

impl IdentifierQuoter {
    pub(crate) fn new(keywords: HashMap<String, bool>) -> Self {
        Self { keywords }
    }

    /// Creates a quoter that knows no keywords.
    ///
    /// This is mainly useful for testing as it doesn't require connecting to Postgres.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads the keyword list of the connected server.
    #[instrument(skip_all)]
    pub async fn load(connection: &PostgresClientWrapper) -> crate::Result<Self> {
        let keywords = connection
            .get_results::<Keyword>("select word, catcode from pg_get_keywords() where catcode <> 'U'")
            .await?;

        let keywords = keywords
            .into_iter()
            .map(|k| {
                let allowed_as_column = k.category == KeywordCategory::AllowedInColumnName
                    || k.category == KeywordCategory::AllowedInTypeOrFunctionName;
                (k.word, allowed_as_column)
            })
            .collect();

        Ok(Self::new(keywords))
    }

    /// Quotes an identifier as needed.
    ///
    /// Ported from <https://github.com/postgres/postgres/blob/97957fdbaa429c7c582d4753b108cb1e23e1b28a/src/backend/utils/adt/ruleutils.c#L11975>
    pub fn quote(&self, identifier: impl AsRef<str>) -> String {
        self.quote_with_usage(identifier.as_ref(), false)
    }

    /// Quotes an identifier that is used as a column name, where some keywords are allowed bare.
    pub fn quote_column(&self, identifier: impl AsRef<str>) -> String {
        self.quote_with_usage(identifier.as_ref(), true)
    }

    /// Quotes both parts of a schema qualified table name.
    pub fn quote_table(&self, table: &TableName) -> String {
        format!("{}.{}", self.quote(&table.schema), self.quote(&table.name))
    }

    /// Quotes and joins multiple column names.
    pub fn quote_columns<S: AsRef<str>>(&self, columns: impl IntoIterator<Item = S>) -> String {
        columns.into_iter().map(|c| self.quote_column(c)).join(", ")
    }

    fn quote_with_usage(&self, identifier: &str, column_name: bool) -> String {
        if identifier.is_empty() {
            return "\"\"".to_string();
        }

        let mut chars = identifier.chars();

        let safe = if let Some(allowed_as_column) = self.keywords.get(identifier) {
            column_name && *allowed_as_column
        } else {
            matches!(chars.next(), Some('a'..='z' | '_'))
                && chars.all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_'))
        };

        if safe {
            identifier.to_string()
        } else {
            let escaped = identifier.replace('"', r#""""#);

            format!("\"{escaped}\"")
        }
    }
}

/// Quotes a string value for usage in Postgres.
pub(crate) fn quote_value_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

struct Keyword {
    word: String,
    category: KeywordCategory,
}

impl FromRow for Keyword {
    fn from_row(row: Row) -> crate::Result<Self> {
        Ok(Keyword {
            word: row.try_get(0)?,
            category: row.try_get_enum_value(1)?,
        })
    }
}

#[derive(Eq, PartialEq, Debug)]
enum KeywordCategory {
    Unreserved,
    AllowedInColumnName,
    AllowedInTypeOrFunctionName,
    Reserved,
}

impl FromPgChar for KeywordCategory {
    fn from_pg_char(c: char) -> crate::Result<Self> {
        match c {
            'U' => Ok(KeywordCategory::Unreserved),
            'C' => Ok(KeywordCategory::AllowedInColumnName),
            'T' => Ok(KeywordCategory::AllowedInTypeOrFunctionName),
            'R' => Ok(KeywordCategory::Reserved),
            _ => Err(ElefantTruncateError::InvalidKeywordType(c.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting() {
        let quoter = IdentifierQuoter::new(HashMap::from([
            ("table".to_string(), false),
            ("year".to_string(), true),
        ]));

        macro_rules! test_quote {
            ($identifier:literal, $expected:literal) => {
                let quoted = quoter.quote($identifier);
                assert_eq!(quoted, $expected);
            };
        }

        test_quote!("table", "\"table\"");
        test_quote!("year", "\"year\"");
        test_quote!("orders", "orders");
        test_quote!("order_lines_2", "order_lines_2");
        test_quote!("order-lines", "\"order-lines\"");
        test_quote!("1orders", "\"1orders\"");
        test_quote!("Orders", "\"Orders\"");
        test_quote!("my\"table", "\"my\"\"table\"");
        test_quote!("", "\"\"");

        assert_eq!(quoter.quote_column("year"), "year");
        assert_eq!(quoter.quote_column("table"), "\"table\"");
    }

    #[test]
    fn quotes_qualified_table_names() {
        let quoter = IdentifierQuoter::empty();

        assert_eq!(
            quoter.quote_table(&TableName::new("public", "orders")),
            "public.orders"
        );
        assert_eq!(
            quoter.quote_table(&TableName::new("Sales", "Orders")),
            "\"Sales\".\"Orders\""
        );
        assert_eq!(quoter.quote_columns(["id", "Version"]), "id, \"Version\"");
    }

    #[test]
    fn quotes_values() {
        assert_eq!(quote_value_string("2020-01-01"), "'2020-01-01'");
        assert_eq!(quote_value_string("o'brien"), "'o''brien'");
    }
}
