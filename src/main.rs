//! Stirixis: console entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI flags, load config
//!   3. Init logger once (CLI `-v` flags > env > config)
//!   4. Open the store, build the LLM provider
//!   5. Spawn Ctrl-C → shutdown signal watcher
//!   6. Run the login gate until a session exists (or the user quits)
//!   7. Run the chat subsystem until `/quit`, EOF or Ctrl-C

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

use stirixis::config::{self, Config};
use stirixis::error::AppError;
use stirixis::llm::{self, LlmProvider};
use stirixis::logger;
use stirixis::session::SessionGate;
use stirixis::store::Database;
use stirixis::subsystems::comms;

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args()?;
    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some(), config.log_file.as_deref())?;

    info!(
        app_name = %config.app_name,
        work_dir = %config.work_dir.display(),
        db = %config.store.db_path.display(),
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    let store = Arc::new(Database::open(&config.store.db_path)?);
    let provider = llm::providers::build(&config.llm)?;

    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    print_startup_summary(&config, &provider);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let gate = SessionGate::new(store.clone());

    let session = tokio::select! {
        _ = shutdown.cancelled() => None,
        session = comms::login::run(&gate, &mut lines, &mut stdout) => session?,
    };

    if let Some(session) = session {
        info!(user_id = session.user_id, "chat session starting");
        comms::start(&config, store, provider, session, lines, shutdown.clone())
            .join()
            .await?;
    }

    shutdown.cancel();

    use std::io::Write as _;
    println!("\nBye :) ...");
    let _ = std::io::stdout().flush();
    Ok(())
}

fn print_startup_summary(config: &Config, provider: &LlmProvider) {
    let llm_line = match provider {
        LlmProvider::Subprocess(_) => format!(
            "subprocess `{} {}` timeout={}s",
            config.llm.subprocess.command,
            config.llm.subprocess.args.join(" "),
            config.llm.timeout_seconds
        ),
        _ => format!("{} timeout={}s", provider.name(), config.llm.timeout_seconds),
    };
    let reminders_line = if cfg!(feature = "subsystem-reminders") && config.reminders.enabled {
        format!("every {}s", config.reminders.poll_interval_secs)
    } else {
        "disabled".to_string()
    };

    println!("{}", config.app_name);
    println!("  pid:       {}", std::process::id());
    println!("  database:  {}", config.store.db_path.display());
    println!("  model:     {llm_line}");
    println!("  workers:   {}", config.relay.workers);
    println!("  reminders: {reminders_line}");
    println!();
}

fn parse_cli_args() -> Result<CliArgs, AppError> {
    let mut verbosity = 0u8;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--" => break,
            "-h" | "--help" => {
                println!("Usage: stirixis [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| AppError::Config("-f/--config requires a path argument".into()))?;
                config_path = Some(path);
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            other => return Err(AppError::Config(format!("unexpected argument: {other}"))),
        }
    }

    Ok(CliArgs {
        log_level: logger::level_for_verbosity(verbosity),
        config_path,
    })
}
