//! WebEdit command line
//!
//! Opens a site's block editor in Chromium, seeds it with content, and writes
//! the edited post to a file when `save` is typed on stdin.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use url::Url;
use webedit_bridge::auth::{
    BearerTokenAuthenticator, FormLoginAuthenticator, NoAuthenticator, RequestAuthenticator,
};
use webedit_bridge::browser::{BrowserController, SurfaceConfig};
use webedit_bridge::session::{
    editor_url_for_site, EditorSessionController, SessionConfig, SessionHandle, SessionOutcome,
    SessionState,
};
use webedit_bridge::next_available_name;

/// Environment variable holding an OAuth bearer token
const TOKEN_ENV_VAR: &str = "WEBEDIT_TOKEN";

/// Environment variable holding the password for form login
const PASSWORD_ENV_VAR: &str = "WEBEDIT_PASSWORD";

/// WebEdit - edit posts in a site's block editor
#[derive(Parser, Debug)]
#[command(name = "webedit")]
#[command(version)]
#[command(about = "Edit posts in an embedded block editor")]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the editor; type `save` or `cancel` on stdin
    Edit {
        /// Site home URL
        #[arg(long)]
        site: Url,

        /// Block HTML to seed the editor with
        #[arg(long)]
        content: Option<PathBuf>,

        /// Where to write the saved post (a free name is picked if it exists)
        #[arg(short, long, default_value = "post.html")]
        output: PathBuf,

        /// Username for form login (password from WEBEDIT_PASSWORD)
        #[arg(long)]
        user: Option<String>,

        /// Run the browser headless
        #[arg(long)]
        headless: bool,

        /// Path to Chrome/Chromium executable
        #[arg(long)]
        chrome_path: Option<PathBuf>,
    },

    /// Print the first free path derived from PATH
    NextName {
        /// Candidate path
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::NextName { path } => {
            let free = next_available_name(&path)?;
            println!("{}", free.display());
            Ok(())
        }
        Command::Edit {
            site,
            content,
            output,
            user,
            headless,
            chrome_path,
        } => edit(site, content, output, user, headless, chrome_path).await,
    }
}

fn authenticator_for(
    site: &Url,
    user: Option<String>,
) -> anyhow::Result<Arc<dyn RequestAuthenticator>> {
    if let Some(token) = BearerTokenAuthenticator::from_env(TOKEN_ENV_VAR) {
        tracing::info!("Using bearer token from {}", TOKEN_ENV_VAR);
        return Ok(Arc::new(token));
    }

    if let Some(user) = user {
        let password = std::env::var(PASSWORD_ENV_VAR)
            .with_context(|| format!("{} must be set for form login", PASSWORD_ENV_VAR))?;
        return Ok(Arc::new(FormLoginAuthenticator::for_site(site, user, password)?));
    }

    tracing::warn!(
        "No credentials: set {} or pass --user with {}",
        TOKEN_ENV_VAR,
        PASSWORD_ENV_VAR
    );
    Ok(Arc::new(NoAuthenticator))
}

async fn edit(
    site: Url,
    content: Option<PathBuf>,
    output: PathBuf,
    user: Option<String>,
    headless: bool,
    chrome_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let blocks = match content {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        None => String::new(),
    };

    let authenticator = authenticator_for(&site, user)?;
    let config = SessionConfig::builder(editor_url_for_site(&site)?)
        .content(blocks)
        .build();

    let mut surface_config = SurfaceConfig::builder().headless(headless);
    if let Some(path) = chrome_path {
        surface_config = surface_config.chrome_path(path);
    }
    let browser = Arc::new(BrowserController::with_config(surface_config.build()).await?);

    let started = EditorSessionController::new(config, authenticator, browser.clone())
        .start()
        .await;

    let result = match started {
        Ok(handle) => drive(handle, &output).await,
        Err(e) => Err(e.into()),
    };

    match Arc::try_unwrap(browser) {
        Ok(browser) => browser.close().await?,
        Err(_) => tracing::warn!("Browser still referenced; leaving it to exit with the process"),
    }

    result
}

async fn drive(mut handle: SessionHandle, output: &Path) -> anyhow::Result<()> {
    println!("Editor open. Type `save` or `cancel`.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => match line.trim() {
                    "save" => {
                        if let Err(e) = handle.save().await {
                            eprintln!("Save failed, try again: {}", e);
                        }
                    }
                    "cancel" => handle.cancel(),
                    "" => {}
                    other => eprintln!("Unknown command: {}", other),
                },
                None => {
                    handle.cancel();
                    break;
                }
            },
            _ = handle.wait_for(SessionState::Closed) => break,
        }
    }

    match handle.finished().await {
        SessionOutcome::Saved(html) => {
            let path = next_available_name(output)?;
            tokio::fs::write(&path, html)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Saved to {}", path.display());
            Ok(())
        }
        SessionOutcome::Cancelled => {
            println!("Cancelled");
            Ok(())
        }
        SessionOutcome::Failed(e) => bail!("editor session failed: {}", e),
    }
}
