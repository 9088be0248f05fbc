use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use vigia::dataset::BaselineProvider;
use vigia::etl::{Etl, SCRIPT_FILENAME, SNAPSHOT_PATH};
use vigia::sink::DbConfig;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Repeat interval in minutes.  Overrides ETL_INTERVAL_MINUTES; 0 runs once.
    #[arg(short, long)]
    interval: Option<u64>,

    /// Where to write the generated SQL script
    #[arg(long, default_value = SCRIPT_FILENAME)]
    script: PathBuf,

    /// Where to write the public JSON snapshot
    #[arg(long, default_value = SNAPSHOT_PATH)]
    snapshot: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();
    dotenvy::dotenv().ok();

    let interval = args.interval.unwrap_or_else(|| {
        std::env::var("ETL_INTERVAL_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    });

    let etl = Etl {
        provider: Box::new(BaselineProvider),
        analyzer: None,
        script_path: args.script,
        snapshot_path: args.snapshot,
        db: DbConfig::from_env(),
    };

    info!("running municipal health indicator ETL");
    match etl.run(interval).await {
        Ok(report) if !report.all_failed() => ExitCode::SUCCESS,
        Ok(_) => {
            error!("every ETL step failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
