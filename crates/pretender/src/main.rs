//! Bootstrap binary: wires a `SqlHandle`, migrates the metadata relation,
//! and starts the TTL and stream sweepers. Deliberately carries no request
//! transport of its own — the engine crate is the library surface a
//! hosted-protocol-speaking front end embeds; this binary's job ends at
//! standing the engine up and keeping it running.

use clap::Parser;
use derivative::Derivative;
use sql::{Dialect, SqlHandle};
use std::time::Duration;

/// Pretender runs the item engine's background housekeeping against a SQL
/// engine, without itself speaking any hosted-service wire protocol.
#[derive(Derivative, Parser)]
#[derivative(Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// URL of the backing SQL database.
    #[derivative(Debug = "ignore")]
    #[clap(long = "database", env = "DATABASE_URL", default_value = "sqlite::memory:")]
    database_url: String,
    /// Use the PostgreSQL dialect instead of SQLite.
    #[clap(long = "use-postgresql", env = "USE_POSTGRESQL")]
    use_postgresql: bool,
    /// Interval, in seconds, between TTL sweeper passes.
    #[clap(long = "ttl-sweep-interval-secs", env = "TTL_SWEEP_INTERVAL_SECS", default_value_t = sweep::ttl::DEFAULT_INTERVAL.as_secs())]
    ttl_sweep_interval_secs: u64,
    /// Interval, in seconds, between stream sweeper passes.
    #[clap(long = "stream-sweep-interval-secs", env = "STREAM_SWEEP_INTERVAL_SECS", default_value_t = sweep::stream::DEFAULT_INTERVAL.as_secs())]
    stream_sweep_interval_secs: u64,
}

fn main() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(!matches!(std::env::var("NO_COLOR"), Ok(v) if v == "1"))
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing default failed");

    let args = Args::parse();
    tracing::info!(?args, "starting pretender");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let result = runtime.block_on(async_main(args));

    tracing::info!(?result, "shutting down");
    runtime.shutdown_timeout(Duration::from_secs(5));
    result
}

async fn async_main(args: Args) -> anyhow::Result<()> {
    let dialect = Dialect::from_use_postgresql(args.use_postgresql);
    let handle = SqlHandle::connect(&args.database_url, dialect).await?;
    store::metadata_store::ensure_metadata_relation(&handle).await?;

    let ttl_sweeper = sweep::ttl::spawn(handle.clone(), Duration::from_secs(args.ttl_sweep_interval_secs));
    let stream_sweeper = sweep::stream::spawn(handle.clone(), Duration::from_secs(args.stream_sweep_interval_secs));

    tokio::signal::ctrl_c().await?;
    tracing::info!("caught interrupt, stopping sweepers");
    ttl_sweeper.stop().await;
    stream_sweeper.stop().await;
    Ok(())
}
