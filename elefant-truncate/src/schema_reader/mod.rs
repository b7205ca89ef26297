use crate::postgres_client_wrapper::PostgresClientWrapper;
use crate::{ElefantTruncateError, Result, TableName, TableSchema};
use futures::try_join;
use itertools::Itertools;
use std::collections::HashMap;
use tracing::{debug, instrument};

mod foreign_key;
mod primary_key;
mod table;

/// Reads the tables to delete from the Postgres catalog.
pub struct SchemaReader<'a> {
    connection: &'a PostgresClientWrapper,
}

impl SchemaReader<'_> {
    pub fn new(connection: &PostgresClientWrapper) -> SchemaReader {
        SchemaReader { connection }
    }

    /// Fetches the schema of the named tables, or of every table when no names are given.
    ///
    /// Names without a schema are looked up in `public`. The tables are sorted by name.
    #[instrument(skip_all)]
    pub async fn fetch_table_schemas(&self, tables: &[String]) -> Result<Vec<TableSchema>> {
        let (all_tables, primary_key_columns, foreign_keys) = try_join!(
            self.get_tables(),
            self.get_primary_key_columns(),
            self.get_foreign_keys(),
        )
        .map_err(|e| ElefantTruncateError::SchemaFetch(Box::new(e)))?;

        let mut schemas: HashMap<TableName, TableSchema> = all_tables
            .into_iter()
            .map(|t| TableName::new(t.schema_name, t.table_name))
            .map(|name| (name.clone(), TableSchema::new(name)))
            .collect();

        for column in primary_key_columns {
            let name = TableName::new(column.schema_name, column.table_name);
            if let Some(schema) = schemas.get_mut(&name) {
                schema.primary_key_columns.push(column.column_name);
            }
        }

        for foreign_key in foreign_keys {
            let source = TableName::new(
                &foreign_key.source_schema_name,
                &foreign_key.source_table_name,
            );
            if let Some(schema) = schemas.get_mut(&source) {
                schema.add_parent(
                    TableName::new(
                        &foreign_key.target_schema_name,
                        &foreign_key.target_table_name,
                    ),
                    foreign_key.removes_all_referencing_rows(),
                );
            }
        }

        let selected = if tables.is_empty() {
            schemas.into_values().collect_vec()
        } else {
            let requested = tables
                .iter()
                .map(|t| TableName::parse(t))
                .unique()
                .collect_vec();

            let missing = requested
                .iter()
                .filter(|t| !schemas.contains_key(t))
                .map(|t| t.to_string())
                .collect_vec();

            if !missing.is_empty() {
                return Err(ElefantTruncateError::TablesNotFound(missing));
            }

            requested
                .iter()
                .filter_map(|t| schemas.remove(t))
                .collect_vec()
        };

        debug!("Found {} tables", selected.len());

        Ok(selected
            .into_iter()
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect())
    }
}

macro_rules! define_catalog_query {
    ($fn_name:ident, $result:ident, $query:literal) => {
        impl $crate::schema_reader::SchemaReader<'_> {
            #[tracing::instrument(skip_all)]
            pub(in crate::schema_reader) async fn $fn_name(&self) -> $crate::Result<Vec<$result>> {
                self.connection.get_results($query).await
            }
        }
    };
}

pub(crate) use define_catalog_query;
