use clap::Parser;
use lib::structs::{CHUNK_SIZE, CSV_URL, DATABASE_URL, LOCAL_FILE, LOG_FILE, TABLE_NAME};
use lib::{FileLogger, HttpFetcher, LogObserver, PipelineConfig, PipelineError, SqliteLoader, run};
use log::{LevelFilter, debug, error};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the gzip-compressed CSV to load
    #[arg(long, env = "TYROO_URL", default_value = CSV_URL)]
    url: String,

    /// Where the downloaded archive is written
    #[arg(long, env = "TYROO_LOCAL_PATH", default_value = LOCAL_FILE)]
    local_path: PathBuf,

    /// Rows per chunk
    #[arg(long, env = "TYROO_CHUNK_SIZE", default_value_t = CHUNK_SIZE)]
    chunk_size: usize,

    /// Target table name
    #[arg(long, env = "TYROO_TABLE", default_value = TABLE_NAME)]
    table: String,

    /// SQLite store (file path, sqlite://path or :memory:)
    #[arg(long, env = "TYROO_DATABASE_URL", default_value = DATABASE_URL)]
    database_url: String,

    /// Log file, created if missing
    #[arg(long, env = "TYROO_LOG_FILE", default_value = LOG_FILE)]
    log_file: PathBuf,

    /// Log level for output
    #[arg(long, default_value = "false")]
    debug: bool,
}

impl From<Args> for PipelineConfig {
    fn from(args: Args) -> Self {
        Self {
            url: args.url,
            local_path: args.local_path,
            chunk_size: args.chunk_size,
            table_name: args.table,
            database_url: args.database_url,
            log_file: args.log_file,
        }
    }
}

fn main() -> Result<(), PipelineError> {
    let total_start = Instant::now();

    // Acquire CLI args
    let args = Args::parse();
    let level = if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let config = PipelineConfig::from(args);

    // Logger first so a rejected configuration still reaches the log file
    FileLogger::open(&config.log_file, level)?.install()?;
    config
        .validate()
        .inspect_err(|e| error!("Configuration rejected: {}", e))?;
    debug!("Configuration: {:?}", config);

    println!("Tyroo ETL: {} -> {}", config.url, config.table_name);
    let mut loader = SqliteLoader::open(&config.database_url, &config.table_name)
        .inspect_err(|e| error!("Database connection failed: {}", e))?;
    let fetcher = HttpFetcher::default();

    let summary = run(&config, &fetcher, &mut loader, &LogObserver)?;

    println!(
        "Loaded {} of {} rows in {} chunks into {}",
        summary.rows_loaded, summary.rows_read, summary.chunks, config.table_name
    );
    println!("\nTotal runtime: {:.2?}", total_start.elapsed());
    log::logger().flush();
    Ok(())
}
