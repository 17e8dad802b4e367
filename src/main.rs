// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow, Context};
use log::{error, warn, info, LevelFilter, Log, Metadata, Record, Level, SetLoggerError};
use std::path::PathBuf;
use std::io::Write;
use clap::{Args, Parser, ValueEnum, CommandFactory, Subcommand};
use clap_complete::{generate, Shell};

use bookvox::app_config::{self, Config};
use bookvox::app_controller::Controller;
use bookvox::subtitle_processor::SubtitleFormat;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for SubtitleFormat to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliSubtitleFormat {
    Vtt,
    Srt,
}

impl From<CliSubtitleFormat> for SubtitleFormat {
    fn from(cli_format: CliSubtitleFormat) -> Self {
        match cli_format {
            CliSubtitleFormat::Vtt => SubtitleFormat::Vtt,
            CliSubtitleFormat::Srt => SubtitleFormat::Srt,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export an EPUB and narrate a range of its chapters, each as its own audiobook
    Batch(BatchArgs),

    /// Generate shell completions for bookvox
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options shared by every narration mode
#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Voice to narrate with (ex en-US-MichelleNeural)
    #[arg(long, value_name = "VOICE")]
    speaker: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Subtitle output format
    #[arg(long, value_enum)]
    subtitle_format: Option<CliSubtitleFormat>,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// EPUB file to export and narrate
    #[arg(value_name = "EPUB")]
    epub_path: PathBuf,

    /// First chapter to narrate (1-based)
    #[arg(long)]
    from_chapter: Option<usize>,

    /// Last chapter to narrate (inclusive)
    #[arg(long)]
    to_chapter: Option<usize>,

    /// Number of chapters narrated at the same time
    #[arg(short, long)]
    jobs: Option<usize>,

    #[command(flatten)]
    common: CommonArgs,
}

/// bookvox - narrate books into M4B audiobooks with time-aligned subtitles
#[derive(Parser, Debug)]
#[command(name = "bookvox")]
#[command(version)]
#[command(about = "Narrate books into chaptered M4B audiobooks with subtitles")]
#[command(long_about = "bookvox reads a book with a speech service and builds an M4B audiobook
with chapter markers, cover art and a subtitle track aligned to the audio.

EXAMPLES:
    bookvox book.epub                            # Export chapters to book-1.txt, book-2.txt, ... and the cover
    bookvox book.txt --cover book.jpg            # Narrate a text file into book.m4b + book.vtt
    bookvox --speaker en-GB-SoniaNeural book.txt # Use another voice
    bookvox chapters/                            # Narrate every .txt file in a folder
    bookvox batch book.epub --from-chapter 3 -j 2
    bookvox completions bash > bookvox.bash      # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.

RESUMING:
    Finished titles, paragraphs and chapters are checkpointed next to the book.
    Running the same command again continues where an interrupted run stopped.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input EPUB, text file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Image to embed as cover art
    #[arg(long, value_name = "IMAGE")]
    cover: Option<PathBuf>,

    #[command(flatten)]
    common: CommonArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() {
    // Max level is narrowed once the config is known
    if let Err(e) = CustomLogger::init(LevelFilter::Trace) {
        eprintln!("Failed to initialize logger: {}", e);
    }
    log::set_max_level(LevelFilter::Info);

    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "bookvox", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Batch(args)) => {
            let config = load_config(&args.common)?;
            let controller = Controller::with_config(config)?;
            let summary = controller
                .run_batch(&args.epub_path, args.from_chapter, args.to_chapter, args.jobs)
                .await?;
            Controller::summary_result(&summary)
        }
        None => {
            let input_path = cli.input_path.ok_or_else(|| {
                anyhow!("INPUT_PATH is required when no subcommand is specified")
            })?;
            if !input_path.exists() {
                return Err(anyhow!("Input path does not exist: {:?}", input_path));
            }
            let config = load_config(&cli.common)?;
            let controller = Controller::with_config(config)?;
            controller.run(input_path, cli.cover).await
        }
    }
}

/// Load or create the config file, apply CLI overrides, validate, set the log level
fn load_config(options: &CommonArgs) -> Result<Config> {
    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = &options.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let (mut config, created) = Config::load_or_create(&options.config_path)?;
    if created {
        warn!("Config file not found at '{}', created default config.", options.config_path);
    }

    // Override config with CLI options if provided
    if let Some(speaker) = &options.speaker {
        config.speech.voice = speaker.clone();
    }
    if let Some(format) = &options.subtitle_format {
        config.subtitles.format = format.clone().into();
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate()
        .context("Configuration validation failed")?;

    log::set_max_level(config.log_level.to_level_filter());
    info!("Using voice {} via {}", config.speech.voice, config.speech.endpoint);

    Ok(config)
}
