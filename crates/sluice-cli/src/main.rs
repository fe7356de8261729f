//! Sluice CLI Client
//!
//! Interactive command-line client for sluice servers.
//!
//! # Usage
//!
//! ```bash
//! # Connect to a local server
//! sluice
//!
//! # Connect to a remote server
//! sluice files.example.com 2121
//!
//! # Execute a single command
//! sluice -c "get report.csv"
//! ```

mod commands;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sluice_transport::{Client, ClientConfig, DEFAULT_PORT};
use tokio::runtime::Runtime;

use crate::commands::{execute, parse_input, Step};

/// Sluice Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "sluice")]
#[command(author, version, about = "Sluice CLI - single-stream file transfer client")]
struct Args {
    /// Server hostname
    #[arg(default_value = "127.0.0.1", env = "SLUICE_HOST")]
    host: String,

    /// Server port
    #[arg(default_value_t = DEFAULT_PORT, env = "SLUICE_PORT")]
    port: u16,

    /// Execute command and exit
    #[arg(short, long)]
    command: Option<String>,

    /// Quiet mode (no banner)
    #[arg(short, long)]
    quiet: bool,

    /// Deadline for each reply or payload read in milliseconds
    #[arg(long, default_value = "1000", env = "SLUICE_READ_TIMEOUT_MS")]
    timeout_ms: u64,

    /// Log protocol activity to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    let addr = format!("{}:{}", args.host, args.port);
    let config = ClientConfig::default().with_read_timeout(Duration::from_millis(args.timeout_ms.max(1)));

    // Connect
    let mut client = connect(&rt, &addr, &config)?;

    if !args.quiet {
        println!(
            "{}",
            format!(
                r#"
  sluice CLI   Connected to {}
               {}
               Type 'help' for commands, 'quit' to exit
"#,
                addr,
                client.greeting()
            )
            .cyan()
        );
    }

    // Single command mode
    if let Some(line) = args.command {
        let input = parse_input(&line).map_err(anyhow::Error::msg)?;
        let result = execute(&rt, &mut client, input);
        let _ = rt.block_on(client.quit());
        result?;
        return Ok(());
    }

    // Interactive mode
    let mut rl = DefaultEditor::new()?;
    let history_path = dirs_next::home_dir()
        .map(|p| p.join(".sluice_history"))
        .unwrap_or_default();

    let _ = rl.load_history(&history_path);

    loop {
        let prompt = format!("{}> ", "sluice".green());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                let input = match parse_input(line) {
                    Ok(input) => input,
                    Err(usage) => {
                        eprintln!("{}", usage.yellow());
                        continue;
                    }
                };

                match execute(&rt, &mut client, input) {
                    Ok(Step::Continue) => {}
                    Ok(Step::Quit) => break,
                    Err(e) if e.is_recoverable() => {
                        eprintln!("{}", e.to_string().red());
                    }
                    Err(e) => {
                        eprintln!("{} {}", "Error:".red(), e);

                        // Try to reconnect
                        match connect(&rt, &addr, &config) {
                            Ok(new_client) => {
                                client = new_client;
                                println!("{}", "Reconnected.".yellow());
                            }
                            Err(_) => {
                                eprintln!("{}", "Connection lost.".red());
                                let _ = rl.save_history(&history_path);
                                anyhow::bail!("connection to {} lost", addr);
                            }
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);

    match rt.block_on(client.quit()) {
        Ok(reply) => println!("{}", reply),
        Err(e) => eprintln!("{} {}", "Error:".red(), e),
    }
    Ok(())
}

fn connect(rt: &Runtime, addr: &str, config: &ClientConfig) -> Result<Client> {
    rt.block_on(Client::connect(addr, config.clone()))
        .with_context(|| format!("Failed to connect to {}", addr))
}

// Minimal home directory lookup for the history file
mod dirs_next {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
    }
}
