use crate::postgres_client_wrapper::{FromPgChar, FromRow, RowEnumExt};
use crate::schema_reader::define_catalog_query;
use crate::ElefantTruncateError;
use tokio_postgres::Row;

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ReferenceAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl FromPgChar for ReferenceAction {
    fn from_pg_char(c: char) -> crate::Result<Self> {
        match c {
            'a' => Ok(ReferenceAction::NoAction),
            'r' => Ok(ReferenceAction::Restrict),
            'c' => Ok(ReferenceAction::Cascade),
            'n' => Ok(ReferenceAction::SetNull),
            'd' => Ok(ReferenceAction::SetDefault),
            _ => Err(ElefantTruncateError::UnknownReferenceAction(c.to_string())),
        }
    }
}

pub struct ForeignKeyResult {
    pub source_schema_name: String,
    pub source_table_name: String,
    pub target_schema_name: String,
    pub target_table_name: String,
    pub delete_action: ReferenceAction,
    pub columns_not_null: bool,
}

impl ForeignKeyResult {
    /// If deleting a row of the target table removes every referencing row.
    ///
    /// Rows with a null reference don't reference anything, so they survive the cascade.
    pub fn removes_all_referencing_rows(&self) -> bool {
        self.delete_action == ReferenceAction::Cascade && self.columns_not_null
    }
}

impl FromRow for ForeignKeyResult {
    fn from_row(row: Row) -> crate::Result<Self> {
        Ok(Self {
            source_schema_name: row.try_get(0)?,
            source_table_name: row.try_get(1)?,
            target_schema_name: row.try_get(2)?,
            target_table_name: row.try_get(3)?,
            delete_action: row.try_get_enum_value(4)?,
            columns_not_null: row.try_get(5)?,
        })
    }
}

//language=postgresql
define_catalog_query!(get_foreign_keys, ForeignKeyResult, r#"
select tab_ns.nspname    as source_schema_name,
       tab.relname       as source_table_name,
       target_ns.nspname as target_schema_name,
       target.relname    as target_table_name,
       con.confdeltype   as delete_action,
       (select coalesce(bool_and(att.attnotnull), false)
        from pg_catalog.pg_attribute att
        where att.attrelid = con.conrelid
          and att.attnum = any (con.conkey)) as columns_not_null
from pg_catalog.pg_constraint con
         join pg_catalog.pg_class tab on con.conrelid = tab.oid
         join pg_catalog.pg_namespace tab_ns on tab_ns.oid = tab.relnamespace
         join pg_catalog.pg_class target on con.confrelid = target.oid
         join pg_catalog.pg_namespace target_ns on target_ns.oid = target.relnamespace
where con.contype = 'f'
  and con.conparentid = 0
  and tab_ns.nspname not in ('pg_catalog', 'pg_toast', 'information_schema')
order by tab_ns.nspname, tab.relname, con.conname;
"#);
