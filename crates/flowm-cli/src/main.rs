mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    change::ChangesSubcommand, config::ConfigSubcommand, project::ProjectsSubcommand,
    quality::QualitySubcommand, specs::SpecsSubcommand, timeline::TimelineSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "flowm",
    about = "Flow Maestro: scaffold projects and changes, merge spec deltas into canonical specs",
    version,
    propagate_version = true
)]
struct Cli {
    /// Workspace root (default: nearest ancestor containing .flow-maestro/)
    #[arg(long, global = true, env = "FLOWM_ROOT")]
    root: Option<PathBuf>,

    /// Project slug (default: the active project)
    #[arg(long, short = 'p', global = true)]
    project: Option<String>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .flow-maestro/ in the workspace root
    Init,

    /// Register, list and activate projects; record constitution entries
    Projects {
        #[command(subcommand)]
        subcommand: ProjectsSubcommand,
    },

    /// Scaffold, list, show and archive changes
    Changes {
        #[command(subcommand)]
        subcommand: ChangesSubcommand,
    },

    /// Validate, preview and merge spec deltas
    Specs {
        #[command(subcommand)]
        subcommand: SpecsSubcommand,
    },

    /// Lint change documents for leftover placeholders
    Quality {
        #[command(subcommand)]
        subcommand: QualitySubcommand,
    },

    /// Show or append change timeline events
    Timeline {
        #[command(subcommand)]
        subcommand: TimelineSubcommand,
    },

    /// Show or validate .flow-maestro/config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let project = cli.project.as_deref();

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Projects { subcommand } => {
            cmd::project::run(&root, project, subcommand, cli.json)
        }
        Commands::Changes { subcommand } => {
            cmd::change::run(&root, project, subcommand, cli.json)
        }
        Commands::Specs { subcommand } => cmd::specs::run(&root, project, subcommand, cli.json),
        Commands::Quality { subcommand } => {
            cmd::quality::run(&root, project, subcommand, cli.json)
        }
        Commands::Timeline { subcommand } => {
            cmd::timeline::run(&root, project, subcommand, cli.json)
        }
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
