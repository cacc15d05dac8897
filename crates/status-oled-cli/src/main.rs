//! StatusOLED Control Tool
//!
//! CLI for driving the StatusOLED daemon via D-Bus.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use status_oled_client::{BusType, DaemonClient};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum CliBusType {
    /// Try session bus first, fall back to system bus
    #[default]
    Auto,
    /// Use session bus (for user services)
    Session,
    /// Use system bus (for system services)
    System,
}

impl From<CliBusType> for BusType {
    fn from(bus: CliBusType) -> Self {
        match bus {
            CliBusType::Auto => BusType::Auto,
            CliBusType::Session => BusType::Session,
            CliBusType::System => BusType::System,
        }
    }
}

#[derive(Parser)]
#[command(name = "statusoledctl")]
#[command(about = "Control tool for the StatusOLED daemon")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// D-Bus bus type to use
    #[arg(long, default_value = "auto", value_enum)]
    bus: CliBusType,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a status message (omit to show the queued lines)
    Text {
        /// Message to display; an empty string clears the displays
        message: Option<String>,
    },
    /// Set or show the print progress
    Progress {
        /// Progress in percent (0-100, omit to show current)
        percent: Option<f64>,
    },
    /// Feed a G-code line (only M117 changes the display)
    Gcode {
        /// G-code line, e.g. "M117 Heating"
        line: String,
    },
    /// Notify a printer event
    Event {
        /// Event: PrintStarted, PrintResumed, PrintPaused, PrintDone, PrintFailed, PrintCancelled, Shutdown
        name: String,
    },
    /// Blank every display
    Clear,
    /// Save a screenshot of the display
    Screenshot {
        /// Output file path (default: screenshot.png)
        #[arg(default_value = "screenshot.png")]
        output: String,
    },
    /// List fonts available to the daemon
    Fonts,
    /// Daemon control commands
    Daemon {
        #[command(subcommand)]
        action: DaemonCommands,
    },
}

#[derive(Subcommand)]
enum DaemonCommands {
    /// Check if daemon is running
    Status,
    /// Request daemon shutdown
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Connect to daemon
    let client = DaemonClient::connect_with_bus(cli.bus.into())
        .await
        .context("Failed to connect to daemon. Is statusoledd running?")?;
    debug!("Connected to daemon");

    match cli.command {
        Commands::Text { message } => handle_text(message, &client).await,
        Commands::Progress { percent } => handle_progress(percent, &client).await,
        Commands::Gcode { line } => handle_gcode(&line, &client).await,
        Commands::Event { name } => {
            client.notify_event(&name).await?;
            println!("Event sent: {}", name);
            Ok(())
        }
        Commands::Clear => {
            client.clear_display().await?;
            println!("Displays cleared");
            Ok(())
        }
        Commands::Screenshot { output } => handle_screenshot(&output, &client).await,
        Commands::Fonts => handle_fonts(&client).await,
        Commands::Daemon { action } => handle_daemon(action, &client).await,
    }
}

async fn handle_text(message: Option<String>, client: &DaemonClient) -> Result<()> {
    match message {
        Some(message) => {
            client.show_text(&message).await?;
            if message.is_empty() {
                println!("Displays cleared");
            } else {
                println!("Showing: {}", message);
            }
        }
        None => {
            let lines = client.text().await?;
            if lines.is_empty() {
                println!("No status text");
            }
            for line in lines {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

async fn handle_progress(percent: Option<f64>, client: &DaemonClient) -> Result<()> {
    match percent {
        Some(percent) => {
            if !(0.0..=100.0).contains(&percent) {
                anyhow::bail!("Progress must be between 0 and 100");
            }
            client.set_progress(percent).await?;
            println!("Progress set to: {:.1}%", percent);
        }
        None => {
            let current = client.progress().await?;
            println!("Current progress: {:.1}%", current);
        }
    }
    Ok(())
}

async fn handle_gcode(line: &str, client: &DaemonClient) -> Result<()> {
    if client.send_gcode(line).await? {
        println!("Status updated");
    } else {
        println!("Ignored (not a status command)");
    }
    Ok(())
}

async fn handle_fonts(client: &DaemonClient) -> Result<()> {
    let fonts = client.list_fonts().await?;
    if fonts.is_empty() {
        println!("No fonts found (builtin font only)");
    }
    for font in fonts {
        println!("{}", font);
    }
    Ok(())
}

async fn handle_screenshot(output: &str, client: &DaemonClient) -> Result<()> {
    let png_data = client.get_screen_png().await?;
    std::fs::write(output, &png_data).context("Failed to write screenshot file")?;
    println!("Screenshot saved to: {}", output);
    Ok(())
}

async fn handle_daemon(action: DaemonCommands, client: &DaemonClient) -> Result<()> {
    match action {
        DaemonCommands::Status => {
            let connected = client.is_panel_connected().await?;
            let progress = client.progress().await?;
            println!("Daemon Status:");
            println!("  Running: yes");
            println!("  Panel connected: {}", if connected { "yes" } else { "no" });
            println!("  Progress: {:.1}%", progress);
        }
        DaemonCommands::Quit => {
            client.quit().await?;
            println!("Daemon shutdown requested");
        }
    }
    Ok(())
}
