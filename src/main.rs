/*!
 * Copyright (c) 2026 Ming Lyu, aka mingcheng
 *
 * This source code is licensed under the MIT License,
 * which is located in the LICENSE file in the source tree's root directory.
 *
 * File: main.rs
 * Author: mingcheng <mingcheng@apache.org>
 * File Created: 2026-03-02 10:05:12
 *
 * Modified By: mingcheng <mingcheng@apache.org>
 * Last Modified: 2026-03-04 17:22:09
 */

mod config;
mod error;
mod imap_fetcher;
mod message;
mod smtp_sender;
mod traits;

use clap::{Parser, Subcommand};
use config::AppConfig;
use imap_fetcher::ImapFetcher;
use log::{error, info};
use message::OutboundEmail;
use rustls::crypto;
use smtp_sender::SmtpSender;
use std::io::Write;
use std::process::ExitCode;
use traits::{MailFetcher, MailSender};

struct MultiWriter {
    writers: Vec<Box<dyn Write + Send + 'static>>,
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        for w in &mut self.writers {
            let _ = w.write(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        for w in &mut self.writers {
            let _ = w.flush();
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch unseen messages from the configured folder (default)
    Fetch {
        /// Print the fetched messages as JSON instead of a count
        #[arg(long)]
        json: bool,
    },
    /// Send one plain-text message from the configured account
    Send {
        #[arg(long)]
        to: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        body: String,
    },
}

fn initialize_logger(config: &AppConfig) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::new();

    if let Some(level) = &config.log_level {
        builder.parse_filters(level);
    } else if let Ok(env_level) = std::env::var("RUST_LOG") {
        builder.parse_filters(&env_level);
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }

    if let Some(log_file) = &config.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(|e| anyhow::anyhow!("Failed to open log file {}: {}", log_file, e))?;

        if config.quiet {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        } else {
            let multi_writer = MultiWriter {
                writers: vec![Box::new(file), Box::new(std::io::stderr())],
            };
            builder.target(env_logger::Target::Pipe(Box::new(multi_writer)));
        }
    } else if config.quiet {
        builder.target(env_logger::Target::Pipe(Box::new(std::io::sink())));
    }

    builder.init();
    Ok(())
}

/// Runs one fetch and reports it on stdout. Returns false when the fetch failed.
async fn run_fetch(fetcher: &dyn MailFetcher, json: bool) -> anyhow::Result<bool> {
    info!("Checking for new emails...");

    let emails = match fetcher.fetch_unseen().await {
        Ok(emails) => emails,
        Err(e) => {
            error!("Failed to fetch emails ({} error): {}", e.kind(), e);
            return Ok(false);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&emails)?);
    } else if emails.is_empty() {
        println!("No new emails found.");
    } else {
        println!("Found {} new email(s).", emails.len());
        for email in &emails {
            info!("{}", email.summary());
        }
    }

    Ok(true)
}

/// Sends one message. Returns false when the send failed.
async fn run_send(sender: &dyn MailSender, email: &OutboundEmail) -> bool {
    match sender.send_email(email).await {
        Ok(()) => {
            println!("Email sent successfully!");
            true
        }
        Err(e) => {
            error!("Failed to send email ({} error): {}", e.kind(), e);
            false
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let _ = crypto::ring::default_provider().install_default();

    let args = Args::parse();

    let config = match args.config {
        Some(path) => AppConfig::new_from_file(&path),
        None => AppConfig::new(),
    }
    .unwrap_or_else(|e| {
        eprintln!("Failed to load config: {:?}", e);
        if let Ok(path) = std::env::current_dir() {
            eprintln!("Current search path: {:?}", path);
        }
        eprintln!("Please create a `config.toml` or set APP_... environment variables, or specify a config file with --config.");
        std::process::exit(1);
    });

    initialize_logger(&config)?;

    let succeeded = match args.command.unwrap_or(Command::Fetch { json: false }) {
        Command::Fetch { json } => {
            let fetcher = ImapFetcher::new(
                config.imap.clone(),
                config.account.clone(),
                config.timeout(),
            );
            run_fetch(&fetcher, json).await?
        }
        Command::Send { to, subject, body } => {
            let sender = SmtpSender::new(
                config.smtp.clone(),
                config.account.clone(),
                config.timeout(),
            );
            run_send(&sender, &OutboundEmail::new(to, subject, body)).await
        }
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
