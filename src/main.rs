use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use git_partial::{CommitMessage, GitPartial, Settings};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "git-partial")]
#[command(about = "Commit or discard selected files, hunks and lines")]
#[command(version)]
struct Cli {
    /// Repository to operate on
    #[arg(short = 'C', long = "repo", global = true, default_value = ".")]
    repo: PathBuf,

    /// Settings file (default: .git-partial.toml in the repository)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List changed paths
    Status,
    /// Show diffs with hunk indices and line offsets
    Diff {
        /// Paths to show (default: every changed path)
        paths: Vec<String>,
    },
    /// Commit selected parts (e.g. src/main.rs, src/main.rs:0,2 or src/main.rs:1/3..4)
    Commit {
        /// Commit summary
        #[arg(short = 'm', long = "message")]
        summary: String,
        /// Commit description
        #[arg(short, long)]
        description: Option<String>,
        /// Selection references
        #[arg(required = true)]
        refs: Vec<String>,
    },
    /// Discard selected parts from the working tree
    Discard {
        /// Selection references
        #[arg(required = true)]
        refs: Vec<String>,
    },
    /// Print shell completions
    Completions { shell: Shell },
    /// Print the man page
    Man,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "git-partial", &mut io::stdout());
            return Ok(());
        }
        Commands::Man => {
            clap_mangen::Man::new(Cli::command()).render(&mut io::stdout())?;
            return Ok(());
        }
        _ => {}
    }

    let settings = Settings::load(cli.config.as_deref(), &cli.repo)?;
    let mut partial = GitPartial::open(&cli.repo, &settings)?;

    match cli.command {
        Commands::Status => {
            for change in partial.status() {
                match &change.original {
                    Some(original) => println!("{:>10}  {} -> {}", change.kind, original, change.path),
                    None => println!("{:>10}  {}", change.kind, change.path),
                }
            }
        }
        Commands::Diff { paths } => {
            print!("{}", partial.diff(&paths)?);
        }
        Commands::Commit {
            summary,
            description,
            refs,
        } => {
            partial.commit(&refs, CommitMessage::new(summary, description))?;
        }
        Commands::Discard { refs } => {
            partial.discard(&refs)?;
        }
        Commands::Completions { .. } | Commands::Man => {}
    }

    Ok(())
}
