use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use clap::{Parser, Subcommand};

mod config;
mod llm;
mod normalize;
mod ops;
mod parser;
mod render;
mod sut;

use sut::source::FileReference;
use sut::SutIndex;

#[derive(Parser)]
#[command(name = "sutaudit")]
#[command(version = "0.1")]
#[command(about = "SGK medical report drug reimbursement auditor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Audit every report image in a directory (Default)
    Run {
        /// Directory containing report images
        #[arg(default_value = "./inputs")]
        input_dir: PathBuf,
        /// SUT reference document (PDF or text); overrides SUT_PATH
        #[arg(long)]
        sut: Option<PathBuf>,
        /// Output directory; overrides SUTAUDIT_OUTPUT_DIR
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Search the SUT reference document for a keyword
    Search {
        keyword: String,
        #[arg(long)]
        sut: Option<PathBuf>,
    },
    /// Parse an already extracted report text file and print the result as JSON
    Parse {
        path: PathBuf,
    },
}

fn load_index(config: &config::Config, sut: Option<PathBuf>) -> SutIndex {
    let reference = FileReference::new(sut.unwrap_or_else(|| config.sut_path.clone()));
    tracing::debug!("SUT reference document: {}", reference.path().display());
    SutIndex::new(reference)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let app_dir = config::Config::get_app_data_dir();

    // Setup logging
    let file_appender = tracing_appender::rolling::never(app_dir, "sutaudit.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug,hyper=info,reqwest=info")),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                ),
        )
        .init();

    let config = config::Config::from_env();

    let command = cli.command.unwrap_or(Commands::Run {
        input_dir: PathBuf::from("./inputs"),
        sut: None,
        output: None,
    });

    match command {
        Commands::Run { input_dir, sut, output } => {
            let index = load_index(&config, sut);
            let output_dir = output.unwrap_or_else(|| config.output_dir.clone());
            let auditor = ops::Auditor::new(&config, index);
            ops::run_audit(&auditor, &input_dir, &output_dir).await?;
        }
        Commands::Search { keyword, sut } => {
            let index = load_index(&config, sut);
            let matches = index.find_by_keyword(&keyword).await?;
            println!(
                "{} match(es) for \"{}\" in {} normalized bytes",
                matches.len(),
                keyword,
                index.corpus_len().await?
            );
            for (i, m) in matches.iter().enumerate() {
                println!("\n[{}] ({})\n{}", i + 1, m.location, m.text);
            }
        }
        Commands::Parse { path } => {
            let text = std::fs::read_to_string(&path)?;
            let meta = parser::parse_report(&text);
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
    }

    Ok(())
}
