use crate::{IdentifierQuoter, RowFilter, TableName, TableSchema};
use std::fmt::{Display, Formatter};

/// The delete statement resolved for a single table.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DeleteStatement {
    pub table: TableName,
    pub filter: RowFilter,
    quoted_table: String,
    predicate: Option<String>,
    quoted_primary_key: Option<String>,
}

impl DeleteStatement {
    pub fn new(schema: &TableSchema, filter: &RowFilter, quoter: &IdentifierQuoter) -> Self {
        let quoted_primary_key = if schema.primary_key_columns.is_empty() {
            None
        } else {
            Some(quoter.quote_columns(&schema.primary_key_columns))
        };

        DeleteStatement {
            table: schema.name.clone(),
            filter: filter.clone(),
            quoted_table: quoter.quote_table(&schema.name),
            predicate: filter.to_sql(quoter),
            quoted_primary_key,
        }
    }

    pub fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }

    fn where_clause(&self) -> String {
        match &self.predicate {
            Some(predicate) => format!(" WHERE {predicate}"),
            None => String::new(),
        }
    }

    /// The statement deleting every selected row at once. This is also what is shown to the
    /// user before anything is deleted.
    pub fn delete_sql(&self) -> String {
        format!("DELETE FROM {}{}", self.quoted_table, self.where_clause())
    }

    pub fn count_sql(&self) -> String {
        format!("SELECT count(*) FROM {}{}", self.quoted_table, self.where_clause())
    }

    /// A statement deleting at most `batch_size` of the selected rows, addressed by primary key.
    ///
    /// Returns `None` for tables without a primary key, which have to be deleted in one go.
    pub fn batch_delete_sql(&self, batch_size: usize) -> Option<String> {
        let primary_key = self.quoted_primary_key.as_ref()?;

        Some(format!(
            "DELETE FROM {table} WHERE ({primary_key}) IN (SELECT {primary_key} FROM {table}{where_clause} LIMIT {batch_size})",
            table = self.quoted_table,
            where_clause = self.where_clause(),
        ))
    }
}

impl Display for DeleteStatement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.delete_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> TableSchema {
        TableSchema::new(TableName::new("public", "orders")).with_primary_key(["shop_id", "id"])
    }

    #[test]
    fn deletes_everything_without_filter() {
        let statement = DeleteStatement::new(&orders(), &RowFilter::All, &IdentifierQuoter::empty());

        assert_eq!(statement.delete_sql(), "DELETE FROM public.orders");
        assert_eq!(statement.count_sql(), "SELECT count(*) FROM public.orders");
        assert_eq!(statement.predicate(), None);
        assert_eq!(
            statement.batch_delete_sql(500).unwrap(),
            "DELETE FROM public.orders WHERE (shop_id, id) IN (SELECT shop_id, id FROM public.orders LIMIT 500)"
        );
    }

    #[test]
    fn applies_the_filter_to_every_statement() {
        let filter = RowFilter::Range {
            column: "created_at".to_string(),
            lower: Some("2020-01-01".to_string()),
            upper: Some("2021-01-01".to_string()),
        };
        let statement = DeleteStatement::new(&orders(), &filter, &IdentifierQuoter::empty());

        assert_eq!(
            statement.to_string(),
            "DELETE FROM public.orders WHERE created_at >= '2020-01-01' AND created_at < '2021-01-01'"
        );
        assert_eq!(
            statement.count_sql(),
            "SELECT count(*) FROM public.orders WHERE created_at >= '2020-01-01' AND created_at < '2021-01-01'"
        );
        assert_eq!(
            statement.batch_delete_sql(10).unwrap(),
            "DELETE FROM public.orders WHERE (shop_id, id) IN (SELECT shop_id, id FROM public.orders WHERE created_at >= '2020-01-01' AND created_at < '2021-01-01' LIMIT 10)"
        );
    }

    #[test]
    fn tables_without_primary_key_cannot_be_batched() {
        let schema = TableSchema::new(TableName::new("audit", "Events"));
        let statement = DeleteStatement::new(&schema, &RowFilter::All, &IdentifierQuoter::empty());

        assert_eq!(statement.delete_sql(), "DELETE FROM audit.\"Events\"");
        assert_eq!(statement.batch_delete_sql(100), None);
    }
}
