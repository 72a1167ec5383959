mod cmd;
mod output;
mod root;
mod terminal;

use clap::{ArgAction, Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ibmi-actions",
    about = "Run IBM i Actions against members, stream files, objects and local files",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .ibmi/ or .git/)
    #[arg(long, global = true, env = "IBMI_ACTIONS_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an Action against one or more resources
    Run {
        /// `member:/LIB/FILE/MBR.EXT`, `streamfile:/path`, `object:/LIB/NAME.TYPE` or a local path
        #[arg(required = true)]
        resources: Vec<String>,

        /// Action to run instead of choosing one
        #[arg(long)]
        action: Option<String>,

        /// Workspace folder owning local file targets (default: project root)
        #[arg(long)]
        workspace: Option<PathBuf>,

        /// Tree node the run was triggered from, e.g. `filter/LIB1/QRPGLESRC`
        #[arg(long)]
        node: Option<String>,

        /// Ask prompted inputs once per target instead of once per run
        #[arg(long)]
        prompt_each: bool,
    },

    /// List the Actions applicable to resources, most recently used first
    Actions {
        #[arg(required = true)]
        resources: Vec<String>,

        #[arg(long)]
        workspace: Option<PathBuf>,
    },

    /// Print the command an Action would run, without running it
    Expand {
        #[arg(required = true)]
        resources: Vec<String>,

        #[arg(long)]
        action: String,

        #[arg(long)]
        workspace: Option<PathBuf>,
    },

    /// Parse a local event file and print its diagnostics
    Evfevent {
        file: PathBuf,

        /// Independent ASP the compiled member lives on
        #[arg(long)]
        asp: Option<String>,

        /// Member extension used when placing member diagnostics
        #[arg(long)]
        ext: Option<String>,
    },

    /// Inspect and validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Run {
            resources,
            action,
            workspace,
            node,
            prompt_each,
        } => cmd::run::run(
            &root,
            cmd::run::RunArgs {
                resources,
                action,
                workspace,
                node,
                prompt_each,
            },
            cli.json,
        ),
        Commands::Actions {
            resources,
            workspace,
        } => cmd::actions::run(&root, &resources, workspace.as_deref(), cli.json).map(|()| 0),
        Commands::Expand {
            resources,
            action,
            workspace,
        } => cmd::expand::run(&root, &resources, &action, workspace.as_deref(), cli.json)
            .map(|()| 0),
        Commands::Evfevent { file, asp, ext } => {
            cmd::evfevent::run(&root, &file, asp, ext, cli.json).map(|()| 0)
        }
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json).map(|()| 0),
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
