//! CLI entry point for `takeoutdoc`.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};

use takeoutdoc::config::Config;
use takeoutdoc::convert::{calendar, chat};
use takeoutdoc::error::TakeoutError;
use takeoutdoc::model::ignore::IgnoreSet;
use takeoutdoc::pipeline::{self, OutputMode, Phase, PipelineOptions, RunSummary};
use takeoutdoc::render::OutputFormat;

#[derive(Parser)]
#[command(
    name = "takeoutdoc",
    version,
    about = "Turn Google Takeout exports into readable documents",
    long_about = "Convert MBOX mailboxes into threaded PDF or text documents, \
                  Google Chat exports into transcripts and ICS calendars into CSV."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// MBOX file(s) to convert
    #[arg(long, value_name = "FILE", num_args = 1..)]
    mbox: Vec<PathBuf>,

    /// Google Chat export folder (the one containing `Groups/`)
    #[arg(long, value_name = "DIR")]
    chat: Option<PathBuf>,

    /// ICS calendar file(s) to convert to CSV
    #[arg(long, value_name = "FILE", num_args = 1..)]
    calendar: Vec<PathBuf>,

    /// Output directory for documents and spreadsheets
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output: PathBuf,

    /// File with sender addresses to leave out, one per line
    #[arg(long, value_name = "FILE")]
    ignore_list: Option<PathBuf>,

    /// One document per message instead of one per mailbox
    #[arg(long)]
    split: bool,

    /// Document format [default: from config, else pdf]
    #[arg(long, value_enum, value_name = "FORMAT")]
    format: Option<OutputFormat>,

    /// Also save invite.ics calendar attachments
    #[arg(long)]
    include_invites: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => return cmd_completions(shell),
        Some(Commands::Manpage) => return cmd_manpage(),
        None => {}
    }

    // Load configuration
    let config = takeoutdoc::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    if cli.mbox.is_empty() && cli.chat.is_none() && cli.calendar.is_empty() {
        return Err(TakeoutError::NothingToDo.into());
    }

    let options = pipeline_options(&cli, &config)?;
    let ignore = cli
        .ignore_list
        .as_deref()
        .or(config.mail.ignore_list.as_deref())
        .map(IgnoreSet::load)
        .unwrap_or_default();

    let mut attempted = 0usize;
    let mut failed = 0usize;
    let mut record = |what: &Path, result: anyhow::Result<()>| {
        attempted += 1;
        if let Err(e) = result {
            failed += 1;
            tracing::error!(input = %what.display(), error = %e, "Conversion failed");
            eprintln!("  Error: {}: {e}", what.display());
        }
    };

    for mbox in &cli.mbox {
        record(mbox, cmd_mailbox(mbox, &cli.output, &options, &ignore));
    }
    if let Some(root) = &cli.chat {
        record(root, cmd_chat(root, &ignore));
    }
    for ics in &cli.calendar {
        record(ics, cmd_calendar(ics, &cli.output));
    }

    if failed == attempted {
        anyhow::bail!("every requested conversion failed");
    }
    Ok(())
}

/// Merge CLI flags over the configuration file.
fn pipeline_options(cli: &Cli, config: &Config) -> anyhow::Result<PipelineOptions> {
    let format = match cli.format {
        Some(format) => format,
        None => config.mail.format.parse()?,
    };
    let mode = if cli.split || config.mail.split {
        OutputMode::PerMessage
    } else {
        OutputMode::Single
    };
    Ok(PipelineOptions {
        mode,
        format,
        include_calendar_invites: cli.include_invites || config.mail.include_calendar_invites,
        layout: config.render.clone(),
    })
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = takeoutdoc::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "takeoutdoc.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "takeoutdoc", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn progress_style(template: &str) -> anyhow::Result<ProgressStyle> {
    Ok(ProgressStyle::default_bar()
        .template(template)?
        .progress_chars("#>-"))
}

/// Convert one mailbox and print its summary.
fn cmd_mailbox(
    path: &Path,
    output: &Path,
    options: &PipelineOptions,
    ignore: &IgnoreSet,
) -> anyhow::Result<()> {
    let file_size = std::fs::metadata(path)
        .map_err(|e| TakeoutError::open(path, e))?
        .len();

    let reading = progress_style(
        "{spinner:.green} Reading [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
    )?;
    let rendering = progress_style("{spinner:.green} Rendering [{bar:40.cyan/blue}] {pos}/{len}")?;

    let pb = ProgressBar::new(file_size);
    pb.set_style(reading);
    let phase = Cell::new(Phase::Reading);

    let start = Instant::now();
    let summary = pipeline::convert_mailbox(
        path,
        output,
        options,
        ignore,
        Some(&|now: Phase, current: u64, total: u64| {
            if phase.get() != now {
                phase.set(now);
                pb.set_style(rendering.clone());
                pb.set_position(0);
            }
            pb.set_length(total);
            pb.set_position(current);
        }),
    );
    pb.finish_and_clear();
    let summary = summary?;

    print_summary(path, file_size, &summary, start.elapsed());
    Ok(())
}

fn print_summary(path: &Path, file_size: u64, summary: &RunSummary, elapsed: std::time::Duration) {
    println!();
    println!("  {:<25} {}", "Mailbox", path.display());
    println!("  {:<25} {}", "File size", format_size(file_size, BINARY));
    println!("  {:<25} {}", "Messages read", summary.messages_read);
    println!("  {:<25} {}", "Ignored senders", summary.messages_ignored);
    println!("  {:<25} {}", "Threads", summary.threads);
    println!("  {:<25} {}", "Documents written", summary.documents_written);
    if summary.attachments_written > 0 {
        println!("  {:<25} {}", "Attachments saved", summary.attachments_written);
    }
    if summary.failures > 0 {
        println!("  {:<25} {}", "Messages skipped", summary.failures);
    }
    println!("  {:<25} {:.2?}", "Time", elapsed);
    println!();
}

/// Convert a Google Chat export into transcripts.
fn cmd_chat(root: &Path, ignore: &IgnoreSet) -> anyhow::Result<()> {
    let summary = chat::convert_chats(root, ignore)?;
    println!();
    println!("  {:<25} {}", "Chat export", root.display());
    println!("  {:<25} {}", "Transcripts written", summary.chats_written);
    println!("  {:<25} {}", "Folders skipped", summary.chats_skipped);
    println!("  {:<25} {}", "Messages", summary.messages_written);
    println!("  {:<25} {}", "Ignored senders", summary.messages_ignored);
    println!();
    Ok(())
}

/// Convert one calendar into a spreadsheet.
fn cmd_calendar(ics: &Path, output: &Path) -> anyhow::Result<()> {
    let (csv_path, events) = calendar::convert_calendar(ics, output)?;
    println!("  Exported {events} event(s) to {}", csv_path.display());
    Ok(())
}
