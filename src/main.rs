use clap::{Parser, Subcommand};

use botsync::config::BotConfig;
use botsync::error::Error;
use botsync::git::{self, MirrorCache, Provisioner, RepoId};
use botsync::github::GithubClient;

/// Exit code for "try again later", per BSD sysexits, so shell-level
/// schedulers can tell a retry signal from a real failure.
const EX_TEMPFAIL: i32 = 75;

#[derive(Parser)]
#[command(
    name = "botsync",
    about = "Mirror-cached repository synchronization for unattended GitHub automation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the bare mirror of a repository
    Refresh {
        /// Repository in org/repo format
        repo: String,
    },

    /// List branches currently present in a repository's mirror
    Branches {
        /// Repository in org/repo format
        repo: String,
    },

    /// Provision a throwaway clone of a branch and report its state
    Checkout {
        /// Repository in org/repo format
        repo: String,
        /// Branch to check out
        branch: String,
    },

    /// Check whether a user has push rights on a repository
    CanPush {
        /// Repository in org/repo format
        repo: String,
        /// GitHub login to look up
        username: String,
    },

    /// Check external tooling and configuration
    Doctor,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Refresh { repo } => cmd_refresh(&repo),
        Commands::Branches { repo } => cmd_branches(&repo),
        Commands::Checkout { repo, branch } => cmd_checkout(&repo, &branch),
        Commands::CanPush { repo, username } => cmd_can_push(&repo, &username),
        Commands::Doctor => cmd_doctor(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        let code = match e.downcast_ref::<Error>() {
            Some(Error::Retry(signal)) => {
                if let Some(reset) = signal.not_before() {
                    eprintln!("Retry after unix time {reset}");
                }
                EX_TEMPFAIL
            }
            _ => 1,
        };
        std::process::exit(code);
    }
}

type CmdResult = Result<(), Box<dyn std::error::Error>>;

fn cmd_refresh(repo: &str) -> CmdResult {
    let config = BotConfig::load()?;
    let id: RepoId = repo.parse()?;
    let cache = MirrorCache::from_config(&config);
    let path = cache.ensure(&id)?;
    println!("Mirror of {id} up to date at {}", path.display());
    Ok(())
}

fn cmd_branches(repo: &str) -> CmdResult {
    let config = BotConfig::load()?;
    let id: RepoId = repo.parse()?;
    let cache = MirrorCache::from_config(&config);
    cache.ensure(&id)?;
    for branch in cache.local_branches(&id)? {
        println!("{branch}");
    }
    Ok(())
}

fn cmd_checkout(repo: &str, branch: &str) -> CmdResult {
    let config = BotConfig::load()?;
    let id: RepoId = repo.parse()?;
    let provisioner = Provisioner::from_config(&config);

    let workspace = provisioner.temporary_clone(&id, branch)?;
    println!(
        "Checked out {} of {id} at {}",
        git::current_branch(workspace.path())?,
        workspace.path().display()
    );
    println!("HEAD {}", git::head_sha(workspace.path())?);
    // The workspace is dropped here and its directory removed.
    Ok(())
}

fn cmd_can_push(repo: &str, username: &str) -> CmdResult {
    let config = BotConfig::load()?;
    let id: RepoId = repo.parse()?;
    let client = GithubClient::from_config(&config);
    let allowed = client.can_push(&id, username)?;
    println!("{}", if allowed { "yes" } else { "no" });
    Ok(())
}

fn cmd_doctor() -> CmdResult {
    let git_ok = std::process::Command::new("git")
        .args(["--version"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    println!(
        "[{}] git: {}",
        if git_ok { "OK" } else { "FAIL" },
        if git_ok { "available" } else { "not found" }
    );

    let config = BotConfig::load()?;
    println!("[OK] cache root: {}", config.cache_dir.display());
    println!(
        "[{}] github token: {}",
        if config.github_token.is_some() {
            "OK"
        } else {
            "INFO"
        },
        if config.github_token.is_some() {
            "configured"
        } else {
            "not set (anonymous clones only)"
        }
    );
    println!(
        "[{}] commit identity: {}",
        if config.git_name.is_some() {
            "OK"
        } else {
            "INFO"
        },
        config.git_name.as_deref().unwrap_or("not set")
    );

    if !git_ok {
        std::process::exit(1);
    }
    Ok(())
}
