mod app;
mod config;
mod domain;
mod engine;
mod error;
mod input;
mod logging;
mod metrics;
mod notifications;
mod persistence;
mod report;
mod sound;
mod ticker;
mod ui;

use app::{AppState, Conversion};
use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use config::{load_config, save_config, AppConfig};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use domain::format_duration;
use persistence::{config_file, ensure_etime_dir, get_etime_dir, init_local_etime, log_file, JsonFileStore};
use ratatui::{backend::CrosstermBackend, Terminal};
use sound::TerminalBell;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "etime")]
#[command(about = "A terminal task timer with estimates, overtime alarms and daily reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a local .etime directory in the current directory
    Init,
    /// Generate a daily report with statistics
    Report {
        /// Date to generate report for (YYYY-MM-DD format). Defaults to today.
        #[arg(short, long)]
        date: Option<String>,
        /// Output file path. Defaults to <etime dir>/report-YYYY-MM-DD.md
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Convert legacy-counter tasks to interval tracking
    ConvertLegacy,
    /// Show the config file path and current settings
    Config {
        /// Write the defaults to config.json if it does not exist
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init) => {
            logging::init_stderr_logging();
            let etime_dir = init_local_etime()?;
            println!("Initialized etime directory: {}", etime_dir.display());
            println!();
            println!("etime will now use this local directory for task storage.");
            println!("Run 'etime' to start tracking tasks.");
            Ok(())
        }
        Some(Commands::Report { date, output }) => {
            logging::init_stderr_logging();
            let report_date = if let Some(date_str) = date {
                chrono::NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                    .map_err(|e| anyhow::anyhow!("Invalid date format. Use YYYY-MM-DD: {}", e))?
            } else {
                chrono::Local::now().date_naive()
            };

            let dir = ensure_etime_dir()?;
            let config = load_config(config_file(&dir))?;
            let store = JsonFileStore::new(&dir);
            let output_path = output.map(std::path::PathBuf::from);

            println!("Generating report for {}...", report_date);
            let report_path = report::generate_report(
                &store,
                &dir,
                Some(report_date),
                output_path,
                config.distraction_file.as_deref(),
            )?;
            println!("Report generated: {}", report_path.display());
            Ok(())
        }
        Some(Commands::ConvertLegacy) => {
            logging::init_stderr_logging();
            let dir = get_etime_dir()?;
            let mut store = JsonFileStore::new(&dir);
            let outcomes = app::convert_legacy(&mut store, Utc::now())?;
            if outcomes.is_empty() {
                println!("No legacy tasks found.");
            }
            for outcome in outcomes {
                match outcome {
                    Conversion::Converted { name, elapsed_seconds } => {
                        println!("Converted \"{}\" ({})", name, format_duration(elapsed_seconds))
                    }
                    Conversion::SkippedOngoing { name } => {
                        println!("Skipped \"{}\": pause it first", name)
                    }
                }
            }
            Ok(())
        }
        Some(Commands::Config { init }) => {
            logging::init_stderr_logging();
            let dir = get_etime_dir()?;
            let path = config_file(&dir);
            let config = load_config(&path)?;
            if init && !path.exists() {
                ensure_etime_dir()?;
                save_config(&path, &config)?;
                println!("Wrote default config: {}", path.display());
            } else {
                println!("Config file: {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        None => run_tui(),
    }
}

fn run_tui() -> Result<()> {
    let etime_dir = ensure_etime_dir()?;
    logging::init_file_logging(&log_file(&etime_dir))?;

    // Show which directory we're using
    eprintln!("Using etime directory: {}", etime_dir.display());

    let config = load_config(config_file(&etime_dir))?;
    let mut app = build_app(&etime_dir, config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Save on exit
    if let Err(e) = app.shutdown() {
        error!("Error saving state: {:#}", e);
        eprintln!("Error saving state: {:#}", e);
    }

    if let Err(err) = result {
        eprintln!("Error: {}", err);
    }

    Ok(())
}

fn build_app(dir: &Path, config: AppConfig) -> Result<AppState> {
    let repeat = Duration::from_secs(config.alarm_repeat_secs);
    let bell = if config.sound {
        TerminalBell::new(repeat)
    } else {
        TerminalBell::silent(repeat)
    };
    let store = JsonFileStore::new(dir);
    AppState::new(config, Box::new(store), Box::new(bell), Utc::now())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut AppState) -> Result<()> {
    let tick_rate = ticker::tick_duration(app.config.tick_ms);
    info!(tick_ms = tick_rate.as_millis() as u64, "tui started");

    loop {
        // Render
        terminal.draw(|f| ui::render(f, app, Utc::now()))?;

        // Handle events with timeout for ticking
        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                // Only process key press events (ignore key release)
                if key.kind == KeyEventKind::Press && input::handle_key(app, key, Utc::now()) {
                    return Ok(());
                }
            }
        }

        app.tick(Utc::now());
    }
}
