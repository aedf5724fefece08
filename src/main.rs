use anyhow::Result;
use bit_reflog::Timestamp;
use bit_reflog::areas::repository::Repository;
use bit_reflog::artifacts::reflog::expire::ExpireFlags;
use bit_reflog::commands::porcelain::prune::PruneRequest;
use bit_reflog::commands::porcelain::reflog::{ReflogDeleteRequest, ReflogExpireRequest};
use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "bit-reflog",
    version = "0.1.0",
    author = "Sami Barbut-Dica",
    about = "Reflog expiry and pruning for git repositories",
    long_about = "Expires old and unreachable reflog entries and prunes loose objects \
    that nothing references any more.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
",
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "init",
        about = "Initialize a new repository",
        long_about = "This command initializes a new repository in the current directory or at the specified path."
    )]
    Init {
        #[arg(index = 1, help = "The path to the repository")]
        path: Option<String>,
    },
    #[command(name = "reflog", about = "Manage reflog information")]
    Reflog {
        #[command(subcommand)]
        command: ReflogCommands,
    },
    #[command(
        name = "prune",
        about = "Remove unreachable loose objects",
        long_about = "This command removes loose objects that are not reachable from any ref, \
        HEAD or reflog entry and are older than the expiry date."
    )]
    Prune {
        #[arg(short = 'n', long, help = "Only list what would be removed")]
        dry_run: bool,
        #[arg(short, long, help = "Report every removed object")]
        verbose: bool,
        #[arg(long, help = "Only remove objects older than this date")]
        expire: Option<String>,
    },
}

#[derive(Args)]
struct ExpireArgs {
    #[arg(short = 'n', long, help = "Do not actually prune any entries")]
    dry_run: bool,
    #[arg(long, help = "Chain the old id of each kept entry to the entry before it")]
    rewrite: bool,
    #[arg(long, help = "Update the ref to the last kept entry")]
    updateref: bool,
    #[arg(long, help = "Report every kept and pruned entry")]
    verbose: bool,
}

impl ExpireArgs {
    fn flags(&self) -> ExpireFlags {
        let mut flags = ExpireFlags::empty();
        flags.set(ExpireFlags::DRY_RUN, self.dry_run);
        flags.set(ExpireFlags::REWRITE, self.rewrite);
        flags.set(ExpireFlags::UPDATE_REF, self.updateref);
        flags.set(ExpireFlags::VERBOSE, self.verbose);
        flags
    }
}

#[derive(Subcommand)]
enum ReflogCommands {
    #[command(name = "expire", about = "Prune older reflog entries")]
    Expire {
        #[command(flatten)]
        options: ExpireArgs,
        #[arg(long, help = "Expire the reflogs of all refs")]
        all: bool,
        #[arg(long, help = "Prune entries older than this date")]
        expire: Option<String>,
        #[arg(long, help = "Prune entries older than this date that the tip cannot reach")]
        expire_unreachable: Option<String>,
        #[arg(long, help = "Also prune entries whose objects are missing")]
        stale_fix: bool,
        #[arg(index = 1, help = "The refs whose reflogs to expire")]
        refs: Vec<String>,
    },
    #[command(name = "delete", about = "Delete single entries from the reflog")]
    Delete {
        #[command(flatten)]
        options: ExpireArgs,
        #[arg(index = 1, required = true, help = "Entries as <ref>@{N} or <ref>@{date}")]
        entries: Vec<String>,
    },
    #[command(name = "exists", about = "Check whether a ref has a reflog")]
    Exists {
        #[arg(index = 1)]
        refname: String,
    },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let now: Timestamp = chrono::Utc::now().timestamp();

    match cli.command {
        Commands::Init { path } => {
            let path = match path {
                Some(path) => path,
                None => std::env::current_dir()?.to_string_lossy().into_owned(),
            };
            let mut repository = Repository::new(&path, Box::new(std::io::stdout()))?;

            repository.init()?
        }
        Commands::Reflog { command } => {
            let repository = open_current()?;

            match command {
                ReflogCommands::Expire {
                    options,
                    all,
                    expire,
                    expire_unreachable,
                    stale_fix,
                    refs,
                } => {
                    repository.reflog_expire(&ReflogExpireRequest {
                        refs,
                        all,
                        expire,
                        expire_unreachable,
                        stale_fix,
                        flags: options.flags(),
                        now,
                    })?;
                }
                ReflogCommands::Delete { options, entries } => {
                    repository.reflog_delete(&ReflogDeleteRequest {
                        entries,
                        flags: options.flags(),
                        now,
                    })?;
                }
                ReflogCommands::Exists { refname } => {
                    if !repository.reflog_exists(&refname) {
                        return Ok(ExitCode::FAILURE);
                    }
                }
            }
        }
        Commands::Prune {
            dry_run,
            verbose,
            expire,
        } => {
            let repository = open_current()?;

            repository.prune(&PruneRequest {
                dry_run,
                verbose,
                expire,
                now,
            })?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn open_current() -> Result<Repository> {
    let pwd = std::env::current_dir()?;
    Repository::open(&pwd.to_string_lossy(), Box::new(std::io::stdout()))
}
