//! postcloud CLI
//!
//! Crawl a profile into a record file, then build a corpus from it.

use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use postcloud::{
    error::Result,
    models::{Config, post::parse_timestamp},
    pipeline,
    services::TimeWindow,
};
use tokio_util::sync::CancellationToken;

/// postcloud - post crawler and word-frequency corpus builder
#[derive(Parser, Debug)]
#[command(
    name = "postcloud",
    version,
    about = "Crawl posts and build word-frequency corpora"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a profile's posts into the record file
    Crawl {
        /// Profile id
        #[arg(long)]
        uid: Option<String>,

        /// Session cookie string
        #[arg(long)]
        cookies: Option<String>,

        /// Highest page to fetch (negative for unlimited)
        #[arg(long, allow_negative_numbers = true)]
        max_page: Option<i64>,

        /// Stop at posts older than this time
        #[arg(long, value_parser = parse_timestamp)]
        after: Option<NaiveDateTime>,

        /// Record file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep existing records instead of truncating the file
        #[arg(long)]
        append: bool,
    },

    /// Build the pruned corpus export from the record file
    Generate {
        /// Record file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Corpus export file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Window start, inclusive
        #[arg(long, value_parser = parse_timestamp)]
        after: Option<NaiveDateTime>,

        /// Window end, inclusive
        #[arg(long, value_parser = parse_timestamp)]
        before: Option<NaiveDateTime>,

        /// Word cap handed to the renderer
        #[arg(long)]
        max_words: Option<usize>,

        /// User dictionary for the segmenter
        #[arg(long)]
        custom_dict: Option<PathBuf>,
    },

    /// Print stored posts within a time range as JSON lines
    Query {
        /// Range start, inclusive
        #[arg(long, value_parser = parse_timestamp)]
        start: NaiveDateTime,

        /// Range end, inclusive
        #[arg(long, value_parser = parse_timestamp)]
        end: NaiveDateTime,

        /// Record file (default: the crawl output)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, stopping at the next page boundary...");
            token.cancel();
        }
    });
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config)?;
    log::debug!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Crawl {
            uid,
            cookies,
            max_page,
            after,
            output,
            append,
        } => {
            let crawl = &mut config.crawl;
            if let Some(uid) = uid {
                crawl.uid = uid;
            }
            if let Some(cookies) = cookies {
                crawl.cookies = cookies;
            }
            if let Some(max_page) = max_page {
                crawl.max_page = max_page;
            }
            if after.is_some() {
                crawl.after = after;
            }
            if let Some(output) = output {
                crawl.output = output;
            }
            crawl.append |= append;

            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());

            let report = pipeline::run_crawl(&config, cancel).await?;
            log::info!(
                "Crawl complete: {} posts, {} pages ({})",
                report.posts_written,
                report.pages,
                report.stop
            );
        }

        Command::Generate {
            input,
            output,
            after,
            before,
            max_words,
            custom_dict,
        } => {
            let generate = &mut config.generate;
            if let Some(input) = input {
                generate.input = input;
            }
            if let Some(output) = output {
                generate.output = output;
            }
            if after.is_some() {
                generate.after = after;
            }
            if before.is_some() {
                generate.before = before;
            }
            if let Some(max_words) = max_words {
                generate.max_words = max_words;
            }
            if custom_dict.is_some() {
                generate.custom_dict = custom_dict;
            }
            config.validate()?;

            let export = pipeline::run_generate(&config.generate, Local::now().naive_local()).await?;
            for (word, count) in export.most_common.iter().take(10) {
                log::info!("  {} ({})", word, count);
            }
        }

        Command::Query { start, end, input } => {
            let input = input.unwrap_or_else(|| config.crawl.output.clone());
            let posts = pipeline::run_query(&input, TimeWindow::new(start, end)).await?;
            for post in &posts {
                println!("{}", post.to_record()?);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            match config.validate_crawl() {
                Ok(()) => log::info!("✓ Crawl session configured"),
                Err(e) => log::warn!("Crawl not ready: {}", e),
            }
        }
    }

    Ok(())
}
