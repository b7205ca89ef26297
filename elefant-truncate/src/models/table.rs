use crate::TableName;

/// The structural facts about a table that matter when deleting its rows.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableSchema {
    pub name: TableName,
    /// The primary key columns, in key order. Empty if the table has no primary key.
    pub primary_key_columns: Vec<String>,
    /// The tables this table references with a foreign key.
    pub parents: Vec<ParentTable>,
}

/// A table referenced by a foreign key.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParentTable {
    pub table: TableName,
    /// If deleting the rows of the parent is guaranteed to remove every row of the child as well.
    ///
    /// This is only the case for `on delete cascade` foreign keys where none of the referencing
    /// columns are nullable, as rows with a null reference survive the parent being deleted.
    pub on_delete_cascade: bool,
}

impl TableSchema {
    pub fn new(name: TableName) -> Self {
        TableSchema {
            name,
            primary_key_columns: vec![],
            parents: vec![],
        }
    }

    pub fn with_primary_key<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.primary_key_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parent(mut self, table: TableName, on_delete_cascade: bool) -> Self {
        self.add_parent(table, on_delete_cascade);
        self
    }

    /// Registers a foreign key to `table`. Several foreign keys to the same table only cascade
    /// if all of them do.
    pub fn add_parent(&mut self, table: TableName, on_delete_cascade: bool) {
        match self.parents.iter_mut().find(|p| p.table == table) {
            Some(existing) => existing.on_delete_cascade &= on_delete_cascade,
            None => self.parents.push(ParentTable {
                table,
                on_delete_cascade,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_foreign_keys_to_the_same_parent() {
        let schema = TableSchema::new(TableName::new("public", "orders"))
            .with_parent(TableName::new("public", "customers"), true)
            .with_parent(TableName::new("public", "customers"), false)
            .with_parent(TableName::new("public", "shops"), true);

        assert_eq!(
            schema.parents,
            vec![
                ParentTable {
                    table: TableName::new("public", "customers"),
                    on_delete_cascade: false,
                },
                ParentTable {
                    table: TableName::new("public", "shops"),
                    on_delete_cascade: true,
                },
            ]
        );
    }
}
