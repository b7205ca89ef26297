use crate::postgres_client_wrapper::FromRow;
use crate::schema_reader::define_catalog_query;
use tokio_postgres::Row;

pub struct PrimaryKeyColumnResult {
    pub schema_name: String,
    pub table_name: String,
    pub column_name: String,
}

impl FromRow for PrimaryKeyColumnResult {
    fn from_row(row: Row) -> crate::Result<Self> {
        Ok(Self {
            schema_name: row.try_get(0)?,
            table_name: row.try_get(1)?,
            column_name: row.try_get(2)?,
        })
    }
}

//language=postgresql
define_catalog_query!(get_primary_key_columns, PrimaryKeyColumnResult, r#"
select ns.nspname  as schema_name,
       tab.relname as table_name,
       att.attname as column_name
from pg_catalog.pg_constraint con
         join pg_catalog.pg_class tab on con.conrelid = tab.oid
         join pg_catalog.pg_namespace ns on ns.oid = tab.relnamespace
         cross join lateral unnest(con.conkey) with ordinality as key(attnum, position)
         join pg_catalog.pg_attribute att on att.attrelid = tab.oid and att.attnum = key.attnum
where con.contype = 'p'
  and ns.nspname not in ('pg_catalog', 'pg_toast', 'information_schema')
order by ns.nspname, tab.relname, key.position;
"#);
