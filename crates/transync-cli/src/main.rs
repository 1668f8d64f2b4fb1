//! transync command line

mod settings;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use transync_content::{classify, ReqwestClient, SheetsApiClient, SystemClock};
use transync_core::{
    FileStateStore, MemoryStateStore, RefreshScheduler, StateStore, SyncConfig, SyncServices,
    TaskList,
};

fn cli() -> Command {
    Command::new("transync")
        .version(transync_core::VERSION)
        .about("Translation task directory sync")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .default_value(settings::DEFAULT_CONFIG)
                .value_parser(value_parser!(PathBuf))
                .help("Path to the TOML configuration file"),
        )
        .subcommand(
            Command::new("refresh")
                .about("Pull the task directory and merge it into the local list")
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Bypass cache freshness and overwrite in-progress tasks"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("resolve")
                .about("Resolve a content reference to plain text")
                .arg(Arg::new("url").required(true).help("Document, spreadsheet, file or plain URL"))
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Skip the cached copy"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Show every task with its effective status")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(Command::new("daemon").about("Refresh now, then at each scheduled slot until interrupted"))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("transync=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn open_state(config: &SyncConfig) -> Result<Arc<dyn StateStore>> {
    Ok(match &config.state_path {
        Some(path) => Arc::new(
            FileStateStore::open(path).with_context(|| format!("opening state {}", path.display()))?,
        ),
        None => Arc::new(MemoryStateStore::new()),
    })
}

fn build_services(config: &SyncConfig) -> Result<SyncServices> {
    config.validate().context("invalid configuration")?;

    let http = Arc::new(
        ReqwestClient::new(config.resolver.attempt_timeout()).context("building HTTP client")?,
    );
    let api_key = config.directory.api_key.clone().unwrap_or_else(|| {
        tracing::warn!(env = settings::API_KEY_ENV, "no Sheets API key configured");
        String::new()
    });
    let sheets = Arc::new(SheetsApiClient::new(http.clone(), api_key));
    let state = open_state(config)?;

    Ok(SyncServices::build(config, http, sheets, state, Arc::new(SystemClock)))
}

fn print_list(list: &TaskList, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(list)?);
        return Ok(());
    }
    for task in &list.tasks {
        println!(
            "{:>5}  {:<8} {:<6} {}",
            task.record.id.to_string(),
            task.status.to_string(),
            task.record.language_pair.to_string(),
            task.record.title
        );
    }
    if list.merged {
        let s = &list.summary;
        println!(
            "added {} updated {} unchanged {} protected {} removed {}",
            s.added, s.updated, s.unchanged, s.protected, s.removed
        );
    } else {
        println!("directory unchanged");
    }
    Ok(())
}

async fn run_refresh(config: &SyncConfig, sub: &ArgMatches) -> Result<()> {
    let services = build_services(config)?;
    let list = services.sync.refresh(sub.get_flag("force")).await?;
    print_list(&list, sub.get_flag("json"))
}

async fn run_status(config: &SyncConfig, sub: &ArgMatches) -> Result<()> {
    let services = build_services(config)?;
    let list = services.sync.refresh(false).await?;
    print_list(&list, sub.get_flag("json"))
}

async fn run_resolve(config: &SyncConfig, sub: &ArgMatches) -> Result<()> {
    let url = sub.get_one::<String>("url").map(String::as_str).unwrap_or_default();
    let http = Arc::new(
        ReqwestClient::new(config.resolver.attempt_timeout()).context("building HTTP client")?,
    );
    let sheets = Arc::new(SheetsApiClient::new(
        http.clone(),
        config.directory.api_key.clone().unwrap_or_default(),
    ));
    let resolver = transync_content::ContentResolver::new(
        http,
        transync_content::ResponseCache::new(config.cache),
        config.resolver.clone(),
    )
    .with_sheets(sheets);

    tracing::info!(class = classify(url).label(), "resolving");
    let text = resolver.resolve_cached(url, sub.get_flag("force")).await?;
    println!("{text}");
    Ok(())
}

async fn run_daemon(config: &SyncConfig) -> Result<()> {
    let slots = config.schedule.parsed_slots()?;
    let services = build_services(config)?;

    match services.sync.refresh(false).await {
        Ok(list) => tracing::info!(tasks = list.tasks.len(), "initial refresh done"),
        Err(err) => tracing::warn!(error = %err, "initial refresh failed"),
    }

    let (tx, rx) = watch::channel(false);
    let scheduler = RefreshScheduler::new(services.sync.clone(), slots);
    let handle = tokio::spawn(async move { scheduler.run(rx).await });

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutdown requested");
    let _ = tx.send(true);
    handle.await.context("scheduler task panicked")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = cli().get_matches();

    let path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(settings::DEFAULT_CONFIG));
    let config = settings::load(&path)?;

    match matches.subcommand() {
        Some(("refresh", sub)) => run_refresh(&config, sub).await,
        Some(("resolve", sub)) => run_resolve(&config, sub).await,
        Some(("status", sub)) => run_status(&config, sub).await,
        Some(("daemon", _)) => run_daemon(&config).await,
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}
