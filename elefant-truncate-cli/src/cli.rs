use clap::{Args, Parser};
use elefant_truncate::{
    DeletePriority, Result, RowFilter, TruncateOptions, DEFAULT_ROW_COUNT_INTERVAL, DEFAULT_TIMEOUT,
};
use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about)]
/// Deletes the rows of Postgres tables without dropping the tables.
///
/// Tables are deleted in foreign key order: a table is only deleted once every table referencing
/// it is empty, unless the references cascade. Nothing is rolled back if the deletion fails
/// halfway, so backups are recommended.
pub struct Cli {
    #[command(flatten)]
    pub db_args: DbArgs,

    /// Don't ask for confirmation before deleting.
    #[arg(short, long)]
    pub quiet: bool,

    /// The tables to delete rows from, as `table` or `schema.table`. Defaults to every table.
    #[arg(short, long, value_delimiter = ',')]
    pub tables: Vec<String>,

    /// Only delete rows where this column matches the given values or bounds.
    /// The column has to exist in every table.
    #[arg(short, long)]
    pub column: Option<String>,

    /// Delete the rows where the column has one of these values.
    #[arg(short, long, value_delimiter = ',', conflicts_with_all = ["lower", "upper"])]
    pub values: Vec<String>,

    /// Delete the rows where the column is at least this value.
    #[arg(short, long)]
    pub lower: Option<String>,

    /// Delete the rows where the column is below this value.
    #[arg(short, long)]
    pub upper: Option<String>,

    /// How eagerly the deletes compete with other load, from 0 to 3. 0 is unspecified, 1 is low,
    /// 2 is medium and 3 is high.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub priority: i32,

    /// How many days the deletion may take before it is cancelled. 0 means the default of one day.
    #[arg(short = 'o', long, default_value_t = 1)]
    pub timeout: u32,

    /// How many statements to run at the same time. Defaults to the number of estimated cores
    /// on the machine. If the available parallelism cannot be determined, it defaults to 1.
    #[arg(long, default_value_t = get_default_max_parallelism())]
    pub max_parallelism: NonZeroUsize,
}

fn get_default_max_parallelism() -> NonZeroUsize {
    thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

impl Cli {
    /// Validates the filter and priority options.
    pub fn get_truncate_options(&self) -> Result<TruncateOptions> {
        Ok(TruncateOptions {
            filter: RowFilter::new(
                self.column.clone(),
                self.values.clone(),
                self.lower.clone(),
                self.upper.clone(),
            )?,
            priority: DeletePriority::try_from(self.priority)?,
            timeout: match self.timeout {
                0 => DEFAULT_TIMEOUT,
                days => Duration::from_secs(u64::from(days) * 24 * 60 * 60),
            },
            max_parallelism: self.max_parallelism,
            row_count_interval: DEFAULT_ROW_COUNT_INTERVAL,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    /// The host of the database to delete rows in
    #[arg(long)]
    pub db_host: String,

    /// The port of the database
    #[arg(long, default_value_t = 5432)]
    pub db_port: u16,

    /// The username to use when connecting to the database
    #[arg(long)]
    pub db_user: String,

    /// The password to use when connecting to the database
    #[arg(long, env = "PGPASSWORD", hide_env_values = true)]
    pub db_password: String,

    /// The name of the database
    #[arg(long)]
    pub db_name: String,
}

impl DbArgs {
    pub(crate) fn get_connection_string(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={}",
            self.db_host, self.db_port, self.db_user, self.db_password, self.db_name
        )
    }

    /// The connection string without the password, for showing to the user.
    pub(crate) fn get_display_string(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.db_user, self.db_host, self.db_port, self.db_name
        )
    }

    #[cfg(test)]
    pub(crate) fn from_test_helper(helper: &elefant_truncate::test_helpers::TestHelper) -> Self {
        Self {
            db_host: "localhost".to_string(),
            db_port: helper.port,
            db_user: "postgres".to_string(),
            db_password: "passw0rd".to_string(),
            db_name: helper.test_db_name.clone(),
        }
    }
}
