use crate::postgres_client_wrapper::FromRow;
use crate::schema_reader::define_catalog_query;
use tokio_postgres::Row;

pub struct TablesResult {
    pub schema_name: String,
    pub table_name: String,
}

impl FromRow for TablesResult {
    fn from_row(row: Row) -> crate::Result<Self> {
        Ok(Self {
            schema_name: row.try_get(0)?,
            table_name: row.try_get(1)?,
        })
    }
}

//language=postgresql
define_catalog_query!(get_tables, TablesResult, r#"
select ns.nspname as schema_name,
       cl.relname as table_name
from pg_catalog.pg_class cl
         join pg_catalog.pg_namespace ns on ns.oid = cl.relnamespace
where cl.relkind in ('r', 'p')
  and not cl.relispartition
  and ns.nspname not in ('pg_catalog', 'pg_toast', 'information_schema')
  and ns.nspname not like 'pg_temp_%'
  and ns.nspname not like 'pg_toast_temp_%'
order by ns.nspname, cl.relname;
"#);
