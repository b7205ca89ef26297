use crate::cli::Cli;
use crate::progress::ProgressPrinter;
use clap::Parser;
use elefant_truncate::{
    Coordinator, PostgresClientWrapper, PostgresStatementExecutor, Result, SchemaReader,
};
use std::io::{IsTerminal, Write};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

mod cli;
mod confirm;
mod progress;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut stdout = std::io::stdout();
    let redraw = stdout.is_terminal();
    run(cli, &mut stdout, redraw).await?;

    Ok(())
}

#[instrument(skip_all)]
async fn run<W: Write>(cli: Cli, out: &mut W, redraw: bool) -> Result<()> {
    let options = cli.get_truncate_options()?;

    writeln!(out, "Running with priority {}", cli.priority)?;
    writeln!(out, "Deleting with a timeout of {:?}", options.timeout)?;

    writeln!(
        out,
        "Fetching table schema from {}",
        cli.db_args.get_display_string()
    )?;
    let connection = PostgresClientWrapper::new(&cli.db_args.get_connection_string()).await?;
    let schemas = SchemaReader::new(&connection)
        .fetch_table_schemas(&cli.tables)
        .await?;

    for schema in &schemas {
        writeln!(out, "{}", schema.name)?;
    }
    writeln!(out)?;

    if schemas.is_empty() {
        writeln!(out, "No tables found, nothing to delete.")?;
        return Ok(());
    }

    if cli.quiet {
        writeln!(out, "Rows in these tables will be deleted.")?;
    } else {
        let confirmed = confirm::confirm(
            out,
            &mut std::io::stdin().lock(),
            "Rows in these tables will be deleted. Do you want to continue?",
        )?;
        if !confirmed {
            writeln!(out, "Aborted.")?;
            return Ok(());
        }
    }

    let executor = PostgresStatementExecutor::new(&connection).await?;
    let mut coordinator = Coordinator::new(schemas, executor, options)?;

    for statement in coordinator.delete_statements() {
        writeln!(out, "Executing: {statement}")?;
    }

    let mut printer = ProgressPrinter::new(coordinator.subscribe(), redraw);
    let cancellation = coordinator.cancellation_token();

    coordinator.start();
    let started = Instant::now();

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling the deletion");
            cancellation.cancel();
        }
    });

    let completed = coordinator.wait_completed();
    tokio::pin!(completed);

    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    let result = loop {
        tokio::select! {
            result = &mut completed => break result,
            _ = ticker.tick() => printer.render(out, started.elapsed())?,
        }
    };

    interrupt.abort();
    printer.render(out, started.elapsed())?;
    result?;

    info!("Deletion finished in {:?}", started.elapsed());
    writeln!(out, "\nDone! All rows have been deleted successfully.")?;

    Ok(())
}
