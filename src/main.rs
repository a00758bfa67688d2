//! Command-line client for the SmartDevice LED/button board.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use smartdevice_ble::ble::constants::DEFAULT_SCAN_DURATION_SECS;
use smartdevice_ble::{BoardEvent, BoardManager, BoardProfile, DiscoveredDevice, EventSender};

#[derive(Parser)]
#[command(name = "smartdevice-ble")]
#[command(about = "BLE client for the SmartDevice LED/button board")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for nearby boards
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value_t = DEFAULT_SCAN_DURATION_SECS)]
        duration: u64,
    },
    /// Connect to a board and control it interactively
    Control {
        /// Device name (or fragment) to connect to; first named device when omitted
        #[arg(short, long)]
        device: Option<String>,
        /// Board profile JSON path
        #[arg(short, long)]
        profile: Option<PathBuf>,
        /// How long to scan for the board before giving up, in seconds
        #[arg(long, default_value_t = 10)]
        scan_timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { duration } => scan_boards(duration).await,
        Commands::Control {
            device,
            profile,
            scan_timeout,
        } => control_board(device, profile, scan_timeout).await,
    }
}

async fn scan_boards(duration: u64) -> Result<()> {
    let (events, mut rx) = EventSender::channel(64);
    let mut manager = BoardManager::new(BoardProfile::default(), events).await?;

    manager.start_scan().await?;
    println!("Scanning for {} seconds...", duration);

    let deadline = tokio::time::sleep(Duration::from_secs(duration));
    tokio::pin!(deadline);
    let mut found = 0usize;
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = rx.recv() => match event {
                Some(BoardEvent::DeviceFound(device)) => {
                    found += 1;
                    println!("  {} [{}] rssi={:?}", device.name, device.address, device.rssi);
                }
                Some(BoardEvent::Error { message }) => bail!("scan failed: {}", message),
                Some(_) => {}
                None => break,
            },
        }
    }
    manager.stop_scan().await?;

    println!("Found {} device(s).", found);
    Ok(())
}

async fn control_board(
    device_filter: Option<String>,
    profile_path: Option<PathBuf>,
    scan_timeout: u64,
) -> Result<()> {
    let profile = match profile_path {
        Some(path) => BoardProfile::load(&path).await?,
        None => BoardProfile::default(),
    };
    let filter = device_filter.or_else(|| profile.device_name.clone());

    let (events, mut rx) = EventSender::channel(64);
    let mut manager = BoardManager::new(profile, events).await?;

    manager.start_scan().await?;
    println!("Scanning for a board...");
    let target = wait_for_board(&mut rx, filter.as_deref(), scan_timeout).await?;
    manager.stop_scan().await?;

    let Some(target) = target else {
        bail!("no matching board found within {} seconds", scan_timeout);
    };

    println!("Connecting to {} [{}]...", target.name, target.address);
    manager.connect_device(&target.id).await?;
    info!("Session ready.");
    println!("Connected. Commands: led <1|2|3>, status, quit");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(BoardEvent::ButtonClicked { button, count }) => {
                    println!("button {}: {} click(s)", button, count);
                }
                Some(BoardEvent::Disconnected) => {
                    println!("Board disconnected.");
                    return Ok(());
                }
                Some(_) => {}
                None => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_command(&manager, line.trim()).await? {
                    break;
                }
            }
        }
    }

    manager.disconnect().await?;
    Ok(())
}

/// Drains scan events until a board matching `filter` shows up or the
/// timeout expires. With no filter, the first named device wins.
async fn wait_for_board(
    rx: &mut mpsc::Receiver<BoardEvent>,
    filter: Option<&str>,
    scan_timeout: u64,
) -> Result<Option<DiscoveredDevice>> {
    let deadline = tokio::time::sleep(Duration::from_secs(scan_timeout));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => return Ok(None),
            event = rx.recv() => match event {
                Some(BoardEvent::DeviceFound(device)) => {
                    let matches = match filter {
                        Some(fragment) => device
                            .name
                            .to_lowercase()
                            .contains(&fragment.to_lowercase()),
                        None => true,
                    };
                    if matches {
                        return Ok(Some(device));
                    }
                    println!("  (skipping {})", device.name);
                }
                Some(BoardEvent::Error { message }) => bail!("scan failed: {}", message),
                Some(_) => {}
                None => return Ok(None),
            },
        }
    }
}

/// Runs one interactive command; returns false when the loop should end.
async fn handle_command(manager: &BoardManager, line: &str) -> Result<bool> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("led") => match parts.next().and_then(|n| n.parse::<usize>().ok()) {
            Some(number @ 1..=3) => {
                manager.toggle_led(number - 1).await?;
                let states = manager.led_states();
                println!("LEDs: {}", format_leds(&states));
            }
            _ => println!("usage: led <1|2|3>"),
        },
        Some("status") => {
            println!("state: {:?}", manager.session_state());
            println!("LEDs: {}", format_leds(&manager.led_states()));
            for (button, count) in manager.button_counts() {
                println!("button {}: {} click(s)", button, count);
            }
        }
        Some("quit") | Some("exit") => return Ok(false),
        Some(_) => println!("commands: led <1|2|3>, status, quit"),
        None => {}
    }
    Ok(true)
}

fn format_leds(states: &[bool]) -> String {
    states
        .iter()
        .map(|&on| if on { "on" } else { "off" })
        .collect::<Vec<_>>()
        .join(" ")
}
