//! budgetcache - command-line host for the family budget cache layer.
//!
//! Wires the app-shell cache, the session cache and the exchange-rate cache
//! together from configuration and exposes each operation as a command.

use std::io;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use budgetcache_core::gateway::TransactionFilter;
use budgetcache_core::rates::{convert_all, Currency};
use budgetcache_core::shell::ShellRequest;
use budgetcache_core::{AppContext, Config};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "\
Usage: budgetcache [--log-file] <command>

Commands:
  rates                          Show exchange rates (cached for 4 hours)
  convert <amount> <CURRENCY>    Convert an amount into UAH, USD, EUR and PLN
  settings                       Show backend settings
  tags                           Show tag definitions
  transactions [--from D] [--to D] [--author A] [--tag T]
  delete <id>                    Soft-delete a transaction
  restore <id>                   Restore a soft-deleted transaction
  shell install [version]        Install and activate the app shell
  shell route <path>             Route one request through the app shell
  shell status                   Show app shell lifecycle state
  config [init]                  Show configuration, or write it to the config file
  clear-cache                    Drop cached rates and session data";

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "budgetcache.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let log_to_file = take_flag(&mut args, "--log-file");

    let config = Config::load()?;
    let log_dir = if log_to_file {
        Some(config.cache_dir()?.join("logs"))
    } else {
        None
    };
    let _guard = init_tracing(log_dir.as_deref());
    info!(version = %config.version, "budgetcache starting");

    if args.is_empty() || args[0] == "help" || args[0] == "--help" {
        println!("{}", USAGE);
        return Ok(());
    }

    let ctx = AppContext::from_config(config)?;
    let result = run(&ctx, &args).await;
    ctx.end_session()?;
    result
}

async fn run(ctx: &AppContext, args: &[String]) -> Result<()> {
    let command = args[0].as_str();
    let rest = &args[1..];

    match command {
        "rates" => {
            let rates = ctx.rates().get_rates().await?;
            print_json(&rates)?;
            if let Some(age) = ctx.rates().cache().age_display() {
                eprintln!("Fetched {}", age);
            }
        }
        "convert" => {
            let amount: f64 = rest
                .first()
                .ok_or_else(|| anyhow!("Missing amount"))?
                .parse()
                .context("Amount must be a number")?;
            let code = rest.get(1).map(String::as_str).unwrap_or("UAH");
            let currency = Currency::from_code(code)
                .ok_or_else(|| anyhow!("Unsupported currency: {}", code))?;
            let rates = ctx.rates().get_rates().await?;
            print_json(&convert_all(amount, currency, &rates))?;
        }
        "settings" => print_json(&ctx.reference()?.settings().await?)?,
        "tags" => print_json(&ctx.reference()?.tag_definitions().await?)?,
        "transactions" => {
            let filter = parse_filter(rest)?;
            print_json(&ctx.reference()?.transactions(&filter).await?)?;
        }
        "delete" => {
            let id = rest.first().ok_or_else(|| anyhow!("Missing transaction id"))?;
            print_json(&ctx.reference()?.soft_delete(id).await?)?;
        }
        "restore" => {
            let id = rest.first().ok_or_else(|| anyhow!("Missing transaction id"))?;
            print_json(&ctx.reference()?.restore(id).await?)?;
        }
        "shell" => run_shell(ctx, rest).await?,
        "config" => match rest.first().map(String::as_str) {
            Some("init") => {
                let path = ctx.config().save()?;
                eprintln!("Wrote {}", path.display());
            }
            None => print_json(ctx.config())?,
            Some(other) => bail!("Unknown config command: {}", other),
        },
        "clear-cache" => {
            ctx.rates().cache().clear()?;
            ctx.end_session()?;
            eprintln!("Caches cleared");
        }
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }
    Ok(())
}

async fn run_shell(ctx: &AppContext, args: &[String]) -> Result<()> {
    let shell = ctx.shell();
    match args.first().map(String::as_str) {
        Some("install") => {
            let version = args
                .get(1)
                .cloned()
                .unwrap_or_else(|| ctx.config().version.clone());
            let installed = shell.install_configured(&version).await?;
            eprintln!("Installed {} ({} assets)", installed.namespace, installed.assets);
            let activated = shell.activate(&version).await?;
            eprintln!("Activated {}", activated.namespace);
            for name in activated.purged {
                eprintln!("  removed {}", name);
            }
        }
        Some("route") => {
            let path = args.get(1).ok_or_else(|| anyhow!("Missing path"))?;
            let request = ShellRequest::get_path(shell.config().routing.origin(), path)?;
            let response = shell.route(&request).await;
            eprintln!("{} {}", response.status, response.status_text);
            println!("{}", response.text());
        }
        Some("status") | None => {
            println!("lifecycle: {:?}", shell.lifecycle());
            println!(
                "namespace: {}",
                shell.current_namespace().unwrap_or_else(|| "none".to_string())
            );
            println!("clients claimed: {}", shell.clients_claimed());
        }
        Some(other) => bail!("Unknown shell command: {}", other),
    }
    Ok(())
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    let before = args.len();
    args.retain(|a| a != flag);
    args.len() != before
}

fn parse_filter(args: &[String]) -> Result<TransactionFilter> {
    let mut filter = TransactionFilter::default();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let value = iter
            .next()
            .cloned()
            .ok_or_else(|| anyhow!("Missing value for {}", flag))?;
        match flag.as_str() {
            "--from" => filter.from = Some(value),
            "--to" => filter.to = Some(value),
            "--author" => filter.author = Some(value),
            "--tag" => filter.tag = Some(value),
            other => bail!("Unknown filter: {}", other),
        }
    }
    Ok(filter)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
