//! ami_cli-rs: Interactive Asterisk Manager Interface client
//!
//! Logs in to an Asterisk PBX over AMI, prints channel state and hangup
//! events, and runs call control, DND and CLI commands with readline
//! editing and history.

use anyhow::{Context, Result};
use asterisk_ami_tokio::{
    AmiClient, AmiConnectOptions, AmiError, AmiEventStream, AuthMethod, EventMask,
    DEFAULT_AMI_PORT,
};
use clap::Parser;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::time::Duration;
use tracing::{error, info, warn};

mod commands;
mod event_display;

use commands::{CallerSlot, CommandProcessor};
use event_display::EventDisplay;

/// Default Asterisk CLI function key bindings
fn get_default_fnkeys() -> Vec<&'static str> {
    vec![
        "help",                     // F1
        "core show version",        // F2
        "core show channels",       // F3
        "core show calls",          // F4
        "core show uptime",         // F5
        "dialplan reload",          // F6
        "pjsip show endpoints",     // F7
        "sip show peers",           // F8
        "database show DND",        // F9
        "queue show",               // F10
        "manager show connected",   // F11
        "version",                  // F12
    ]
}

/// Parse function key shortcuts (F1-F12)
fn parse_function_key(input: &str) -> Option<&'static str> {
    let index: usize = input
        .to_lowercase()
        .strip_prefix('f')?
        .parse()
        .ok()?;
    get_default_fnkeys()
        .get(index.checked_sub(1)?)
        .copied()
}

/// Interactive Asterisk Manager Interface CLI client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Asterisk hostname or IP address
    #[arg(short = 'H', long, env = "AMI_HOST", default_value = "localhost")]
    host: String,

    /// AMI port
    #[arg(short = 'P', long, env = "AMI_PORT", default_value_t = DEFAULT_AMI_PORT)]
    port: u16,

    /// Manager username (manager.conf section)
    #[arg(short, long, env = "AMI_USERNAME", default_value = "admin")]
    username: String,

    /// Manager secret
    #[arg(short = 'p', long, env = "AMI_SECRET", hide_env_values = true)]
    secret: String,

    /// Log in with an MD5 challenge instead of sending the secret
    #[arg(long)]
    md5: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Execute single command and exit
    #[arg(short = 'x')]
    execute: Option<String>,

    /// History file path
    #[arg(long)]
    history_file: Option<PathBuf>,

    /// Connection timeout in seconds
    #[arg(short, long, default_value_t = 10)]
    timeout: u64,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    /// Send a Ping every N seconds
    #[arg(long, value_name = "SECONDS")]
    keepalive: Option<u64>,

    /// Channel technology used by `call`
    #[arg(long, default_value = "SIP")]
    tech: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.debug)?;
    if args.no_color {
        colored::control::set_override(false);
    }

    let (client, events) = match connect_to_asterisk(&args).await {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("{}", "Not connected".red().bold());
            eprintln!("Failed to connect to Asterisk at {}:{}", args.host, args.port);
            match e.downcast_ref::<AmiError>() {
                Some(AmiError::Io(io_err))
                    if io_err.kind() == std::io::ErrorKind::ConnectionRefused =>
                {
                    eprintln!(
                        "Connection refused - is Asterisk running with manager enabled on port {}?",
                        args.port
                    );
                }
                Some(AmiError::Timeout { .. }) => {
                    eprintln!("Connection timed out after {} seconds", args.timeout);
                }
                _ => eprintln!("Error: {:#}", e),
            }
            std::process::exit(1);
        }
    };

    let last_caller: CallerSlot = Arc::new(Mutex::new(None));
    let processor = CommandProcessor::new(args.tech.clone(), last_caller.clone());

    if let Some(ref command) = args.execute {
        drop(events);
        let result = processor
            .execute_command(&client, command)
            .await;
        client
            .disconnect()
            .await?;
        if let Err(e) = result {
            report_error(&e);
            std::process::exit(1);
        }
        return Ok(());
    }

    let display = EventDisplay::new(args.json, last_caller);
    let event_task = tokio::spawn(
        display
            .dispatcher()
            .run(events),
    );

    run_interactive_mode(&client, &processor, &args).await?;

    info!("Disconnecting from Asterisk...");
    client
        .disconnect()
        .await?;
    event_task.abort();

    Ok(())
}

/// Set up logging based on debug level
fn setup_logging(debug: bool) -> Result<()> {
    let filter = if debug { "debug" } else { "error" };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}

/// Connect and log in, then print the server version
async fn connect_to_asterisk(args: &Args) -> Result<(AmiClient, AmiEventStream)> {
    info!("Connecting to Asterisk at {}:{}", args.host, args.port);

    let mut options = AmiConnectOptions::new()
        .connect_timeout(Duration::from_secs(args.timeout))
        .auth(if args.md5 {
            AuthMethod::Md5
        } else {
            AuthMethod::Plain
        });
    if args.execute.is_some() {
        options = options.events(EventMask::Off);
    }
    if let Some(secs) = args.keepalive {
        options = options.keepalive_interval(Duration::from_secs(secs));
    }

    let (client, events) = AmiClient::connect_with_options(
        &args.host,
        args.port,
        &args.username,
        &args.secret,
        options,
    )
    .await
    .context("Failed to log in to Asterisk")?;

    if args.execute.is_none() {
        println!("{}", "Connected".green().bold());
        match client
            .asterisk_version()
            .await
        {
            Ok(version) => println!("Asterisk version: {}", version),
            Err(e) => {
                warn!("CoreSettings failed: {}", e);
                println!("AMI version: {}", client.protocol_version());
            }
        }
    }

    Ok((client, events))
}

/// Print a failed operation, separating connection trouble from rejected commands
fn report_error(e: &anyhow::Error) {
    match e.downcast_ref::<AmiError>() {
        Some(ami) if ami.is_connection_error() => {
            eprintln!("{}: {}", "Connection failed".red().bold(), ami)
        }
        Some(ami) => eprintln!("{}: {}", "Command failed".red().bold(), ami),
        None => eprintln!("{}: {:#}", "Error".red().bold(), e),
    }
}

/// Run interactive CLI mode
async fn run_interactive_mode(
    client: &AmiClient,
    processor: &CommandProcessor,
    args: &Args,
) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    let history_file = args
        .history_file
        .clone()
        .unwrap_or_else(|| {
            let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            path.push(".ami_cli_history");
            path
        });

    if history_file.exists() {
        if let Err(e) = rl.load_history(&history_file) {
            warn!("Could not load history: {}", e);
        }
    }

    println!("Asterisk CLI ready. Type 'help' for commands, 'quit' to exit.\n");

    loop {
        let prompt = format!("asterisk@{}> ", args.host);

        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    "quit" | "exit" | "bye" => {
                        println!("Goodbye!");
                        break;
                    }
                    "clear" => {
                        print!("\x1B[2J\x1B[1;1H");
                        continue;
                    }
                    "history" => {
                        processor.show_history(&rl);
                        continue;
                    }
                    "help" => {
                        processor.show_help();
                        continue;
                    }
                    _ => {
                        let command = match parse_function_key(line) {
                            Some("help") => {
                                processor.show_help();
                                continue;
                            }
                            Some(fn_command) => fn_command,
                            None => line,
                        };

                        if let Err(e) = processor
                            .execute_command(client, command)
                            .await
                        {
                            report_error(&e);
                        }

                        if !client.is_connected() {
                            eprintln!("{} ({:?})", "Connection lost".red().bold(), client.status());
                            break;
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => {
                error!("Error reading input: {}", e);
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(&history_file) {
        warn!("Could not save history: {}", e);
    }

    Ok(())
}
