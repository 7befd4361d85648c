use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use url::Url;

use marquee::catalog::CatalogClient;
use marquee::config::Config;
use marquee::session::{Intent, ListUiState, Pager};
use marquee::store::{ListKey, Store, StoreError};
use marquee::util::{format_rating, format_release_date, truncate_title};

/// Get the config directory path (~/.config/marquee/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("marquee");
    Ok(config_dir)
}

#[derive(Parser, Debug)]
#[command(name = "marquee", about = "Offline-first movie catalog browser")]
struct Args {
    /// Reset the cache database (delete and recreate)
    #[arg(long)]
    reset_db: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Force a clean reload of a list's first page
    Refresh {
        /// List to refresh: upcoming, top-rated, now-playing or popular
        list: ListKey,
    },
    /// Load the next page of a list, resuming from the cached boundary
    More {
        list: ListKey,
    },
    /// Print a list's cached titles without touching the network
    Show {
        list: ListKey,
    },
    /// Search the catalog and cache the first page of results
    Search {
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    // Set up config directory
    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        println!("Created config directory: {}", config_dir.display());
    }

    // Set directory permissions on Unix (user-only access)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let config = Config::load(&config_dir.join("config.toml"))?;
    let db_path = config_dir.join("catalog.db");

    // Handle --reset-db flag
    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete cache database")?;
        println!("Cache reset.");
    }

    let Some(command) = args.command else {
        if args.reset_db {
            return Ok(());
        }
        anyhow::bail!("No command given. Try `marquee show upcoming` or `marquee --help`.");
    };

    // Open cache store
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let store = match Store::open(db_path_str).await {
        Ok(store) => store,
        Err(StoreError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of marquee appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open cache: {}", e));
        }
    };

    let base_url = Url::parse(&config.api_base_url)
        .with_context(|| format!("Invalid api_base_url: {}", config.api_base_url))?;
    let client = CatalogClient::new(reqwest::Client::new(), base_url, config.resolved_api_key())
        .with_timeout(std::time::Duration::from_secs(config.request_timeout_secs));
    let pager = Pager::new(store, client);

    let (list, state) = match command {
        Command::Refresh { list } => {
            pager.attach(&list).await?;
            let state = pager.handle(&list, Intent::Refresh).await?;
            (list, state)
        }
        Command::More { list } => {
            pager.attach(&list).await?;
            let state = pager.load_more(&list).await?;
            (list, state)
        }
        Command::Show { list } => {
            let state = pager.attach(&list).await?;
            (list, state)
        }
        Command::Search { query } => {
            let state = pager
                .handle(&ListKey::Upcoming, Intent::ChangeQuery(query))
                .await?;
            (state.list.clone(), state)
        }
    };

    print_list(&pager, &list, &state, config.page_size).await?;
    Ok(())
}

/// Render the session outcome: cached rows first, then any error affordances.
async fn print_list<R: marquee::catalog::RemoteSource>(
    pager: &Pager<R>,
    list: &ListKey,
    state: &ListUiState,
    page_size: i64,
) -> Result<()> {
    println!(
        "{} — {} cached title(s){}",
        list,
        state.cached_count,
        if state.phase.end_reached() {
            ", end of list"
        } else {
            ""
        }
    );

    let mut view = pager.store().view_with_page_size(list.clone(), page_size);
    loop {
        let window = view.next_window().await?;
        if window.is_empty() {
            break;
        }
        for title in &window {
            println!(
                "  {:>3}. {:<43} {:>7}  {}",
                title.position + 1,
                truncate_title(&title.title, 40),
                format_rating(title.vote_average),
                format_release_date(title.release_date.as_deref()),
            );
        }
        if window.len() < page_size as usize {
            break;
        }
    }

    if let Some(error) = &state.error {
        eprintln!("Error: {}", error.key.as_str());
        if error.offline_fallback && state.cached_count > 0 {
            eprintln!("You appear to be offline; showing cached results.");
        }
        if error.retryable {
            eprintln!("Run the command again to retry.");
        }
    }

    Ok(())
}
