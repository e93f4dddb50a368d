use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use feedrelay::{
    start_poll_scheduler, Config, Database, HttpFeedSource, PollScheduler, SubscriptionLocks,
    SubscriptionService, TelegramSink,
};

const USAGE: &str = "usage: feedrelay [--config PATH] [run | add TITLE URL [DESTINATION] | remove TITLE | list]";

/// What the binary was asked to do.
#[derive(Debug, PartialEq)]
enum Command {
    Run,
    Add {
        title: String,
        source: String,
        destination: Option<String>,
    },
    Remove {
        title: String,
    },
    List,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<(String, Command), String> {
    let mut config_path = "config.toml".to_string();
    let mut words = Vec::new();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                config_path = args.next().ok_or("--config requires a path")?;
            }
            "-h" | "--help" => return Err(String::new()),
            _ => words.push(arg),
        }
    }

    let command = match words.as_slice() {
        [] => Command::Run,
        [cmd] if cmd == "run" => Command::Run,
        [cmd] if cmd == "list" => Command::List,
        [cmd, title] if cmd == "remove" => Command::Remove {
            title: title.clone(),
        },
        [cmd, title, source] if cmd == "add" => Command::Add {
            title: title.clone(),
            source: source.clone(),
            destination: None,
        },
        [cmd, title, source, destination] if cmd == "add" => Command::Add {
            title: title.clone(),
            source: source.clone(),
            destination: Some(destination.clone()),
        },
        _ => return Err(format!("unrecognized arguments: {}", words.join(" "))),
    };

    Ok((config_path, command))
}

#[tokio::main]
async fn main() -> ExitCode {
    let (config_path, command) = match parse_args(std::env::args().skip(1)) {
        Ok(parsed) => parsed,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("{msg}");
            }
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    // Load configuration
    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = feedrelay::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        feedrelay::logging::init_console_only(&config.logging.level);
    }

    match execute(&config, command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(config: &Config, command: Command) -> feedrelay::Result<()> {
    let db = Arc::new(Database::open(&config.database.path).await?);
    let source = Arc::new(HttpFeedSource::new(&config.fetch)?);

    let result = match command {
        Command::Run => serve(config, Arc::clone(&db), source).await,
        Command::Add {
            title,
            source: url,
            destination,
        } => {
            let locks = SubscriptionLocks::new();
            let service = SubscriptionService::new(&db, source.as_ref(), &locks)
                .with_seed_policy(config.poll.seed);
            service
                .add(&title, &url, destination.as_deref())
                .await
                .map(|sub| println!("added\nTITLE: {}\nRSS: {}", sub.title, sub.source))
        }
        Command::Remove { title } => {
            let locks = SubscriptionLocks::new();
            let service = SubscriptionService::new(&db, source.as_ref(), &locks);
            service
                .remove(&title)
                .await
                .map(|()| println!("Removed: {}", title))
        }
        Command::List => {
            let locks = SubscriptionLocks::new();
            let service = SubscriptionService::new(&db, source.as_ref(), &locks);
            service.list().await.map(|subs| {
                if subs.is_empty() {
                    println!("The database is empty");
                }
                for sub in subs {
                    println!(
                        "Title: {}\nrss url: {}\nlast checked article: {}",
                        sub.title,
                        sub.source,
                        sub.last_seen.as_deref().unwrap_or("-")
                    );
                }
            })
        }
    };

    if let Ok(db) = Arc::try_unwrap(db) {
        db.close().await;
    }
    result
}

async fn serve(
    config: &Config,
    db: Arc<Database>,
    source: Arc<HttpFeedSource>,
) -> feedrelay::Result<()> {
    config.validate()?;

    info!("feedrelay starting");
    let sink = Arc::new(TelegramSink::new(&config.telegram)?);
    let scheduler = PollScheduler::new(db, source, sink)
        .with_config(&config.poll)
        .with_default_destination(config.telegram.chat_id.clone());

    let handle = start_poll_scheduler(scheduler);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, finishing in-flight subscriptions");
    handle.shutdown().await;
    Ok(())
}
