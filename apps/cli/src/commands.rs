//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use kindle_voz_core::{
    BookOptions, EbookConvert, Pipeline, ProgressReporter, RunReport, load_locators,
};
use kindle_voz_crawler::{HttpFetcher, ReadableExtractor};
use kindle_voz_delivery::SmtpMailer;
use kindle_voz_shared::{
    AppConfig, config_file_path, ensure_config_dir, init_config, load_config, validate_mail,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// kindle-voz: forum threads and articles, delivered to your Kindle.
#[derive(Parser)]
#[command(
    name = "kindle-voz",
    version,
    about = "Fetch a list of article URLs, package them as an e-book, and mail it to a reading device.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the e-book from a source list and deliver it.
    Run {
        /// Source list, one URL per line (defaults to `[defaults].urls`).
        #[arg(short, long)]
        urls: Option<PathBuf>,

        /// Book title (defaults to `[defaults].name`).
        #[arg(short, long)]
        name: Option<String>,

        /// Also copy the packaged e-book into this directory.
        #[arg(long)]
        copy_to: Option<PathBuf>,

        /// Skip mail delivery.
        #[arg(long, requires = "copy_to")]
        no_send: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
    /// Show resolved configuration.
    Show,
    /// Print the config file location.
    Path,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "kindle_voz=info",
        1 => "kindle_voz=debug",
        _ => "kindle_voz=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    ensure_config_dir()?;

    match cli.command {
        Command::Run {
            urls,
            name,
            copy_to,
            no_send,
        } => cmd_run(urls, name, copy_to, no_send).await,
        Command::Config { action } => match action {
            ConfigAction::Init { force } => cmd_config_init(force),
            ConfigAction::Show => cmd_config_show(),
            ConfigAction::Path => cmd_config_path(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    urls: Option<PathBuf>,
    name: Option<String>,
    copy_to: Option<PathBuf>,
    no_send: bool,
) -> Result<()> {
    let config = load_config()?;

    let urls = urls.unwrap_or_else(|| PathBuf::from(&config.defaults.urls));
    let title = name.unwrap_or_else(|| config.defaults.name.clone());

    // Mail settings are checked before any fetch.
    let mail = if no_send {
        None
    } else {
        Some(validate_mail(&config.mail)?)
    };

    let locators = load_locators(&urls)?;

    info!(
        urls = %urls.display(),
        title = %title,
        locators = locators.len(),
        deliver = mail.is_some(),
        "starting run"
    );

    let mut pipeline = Pipeline::new(
        Box::new(HttpFetcher::new(&config.fetch)?),
        Box::new(ReadableExtractor),
        Box::new(EbookConvert::new(config.convert.command.clone())),
    );
    if let Some(settings) = mail {
        pipeline = pipeline.with_mailer(Box::new(SmtpMailer::new(settings)?));
    }

    let mut options = BookOptions::new(title, config.convert.clone());
    options.copy_to = copy_to;

    let reporter = CliProgress::new();
    let report = pipeline.run(&options, &locators, &reporter).await?;

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!();
    if report.delivered {
        println!("  E-book delivered!");
    } else {
        println!("  E-book built.");
    }
    println!("  Run:      {}", report.run_id);
    println!("  Title:    {}", report.title);
    println!("  Chapters: {}", report.chapter_count());
    println!(
        "  Output:   {} ({}, {} bytes)",
        report.output_name, report.output_profile, report.output_bytes
    );
    if let Some(path) = &report.copied_to {
        println!("  Copy:     {}", path.display());
    }
    if !report.skipped.is_empty() {
        println!("  Skipped:  {}", report.skipped.len());
        for (locator, reason) in &report.skipped {
            println!("    - {locator}: {reason}");
        }
    }
    println!("  Started:  {}", report.started_at.to_rfc3339());
    println!("  Time:     {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid spinner template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        // Clears the line when a run aborts before `done`.
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn locator_started(&self, locator: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Fetching [{current}/{total}] {locator}"));
    }

    fn locator_skipped(&self, locator: &str, reason: &str) {
        self.spinner.println(format!("  skipped {locator}: {reason}"));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}

fn cmd_config_init(force: bool) -> Result<()> {
    let path = init_config(force)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let mut config: AppConfig = load_config()?;
    if config.mail.password.is_some() {
        config.mail.password = Some("********".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn cmd_config_path() -> Result<()> {
    println!("{}", config_file_path()?.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "kindle-voz", "-vv", "run", "--urls", "list.txt", "--name", "Thread",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Run {
                urls,
                name,
                copy_to,
                no_send,
            } => {
                assert_eq!(urls, Some(PathBuf::from("list.txt")));
                assert_eq!(name.as_deref(), Some("Thread"));
                assert!(copy_to.is_none());
                assert!(!no_send);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn config_init_force_flag() {
        let cli = Cli::try_parse_from(["kindle-voz", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Init { force: true }
            }
        ));

        let cli = Cli::try_parse_from(["kindle-voz", "config", "init"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Init { force: false }
            }
        ));
    }

    #[test]
    fn no_send_requires_copy_to() {
        assert!(Cli::try_parse_from(["kindle-voz", "run", "--no-send"]).is_err());
        assert!(
            Cli::try_parse_from(["kindle-voz", "run", "--no-send", "--copy-to", "out"]).is_ok()
        );
    }
}
