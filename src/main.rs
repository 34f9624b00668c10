use anyhow::Result;
use clap::Parser;
use log::error;
use modman::{
    commands::{self, Services},
    error::LifecycleError,
    lifecycle::Action,
    runtime::RealRuntime,
    setup::{SetupOptions, require_installed},
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// modman - module manager for the Connexion application
///
/// Lists, installs, updates and toggles the core package and its modules
/// from GitHub releases.
///
/// If the GITHUB_TOKEN environment variable is set, it will be used for authentication.
///
/// Examples:
///   modman setup --name "Grace Church" --abbreviation GC
///   modman list
///   modman install connexion-people
#[derive(Parser, Debug)]
#[command(author, version = env!("MODMAN_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Application root directory (defaults to ~/.modman; also via MODMAN_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "MODMAN_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub root: Option<PathBuf>,

    /// GitHub API URL (defaults to https://api.github.com)
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List the core package and every tracked module
    List(ListArgs),

    /// Install a module from its latest release
    Install(PackageArgs),

    /// Update an installed module to its latest release
    Update(PackageArgs),

    /// Enable an installed module
    Enable(PackageArgs),

    /// Disable an installed module
    Disable(PackageArgs),

    /// Queue an update of the core package to its latest release
    UpdateCore,

    /// Save the general settings and mark the application as installed
    Setup(SetupArgs),

    /// Show or change settings
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Show recorded notifications
    Notifications(NotificationsArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Print machine-readable JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct PackageArgs {
    /// Package identity, module name or alias (e.g. "connexion-people")
    #[arg(value_name = "PACKAGE")]
    pub identity: String,
}

#[derive(clap::Args, Debug)]
pub struct SetupArgs {
    /// Church name
    #[arg(long)]
    pub name: Option<String>,

    /// Church email address
    #[arg(long)]
    pub email: Option<String>,

    /// Short name shown as the application name
    #[arg(long)]
    pub abbreviation: Option<String>,

    /// Module to install during setup (repeatable)
    #[arg(long = "module", value_name = "PACKAGE")]
    pub modules: Vec<String>,
}

#[derive(clap::Subcommand, Debug)]
enum SettingsCommands {
    /// List settings tabs with their fields and values
    Tabs,

    /// Print one setting
    Get {
        /// Dotted key, e.g. "general.name"
        key: String,
    },

    /// Change one setting
    Set {
        /// Dotted key, e.g. "general.name"
        key: String,
        /// New value; parsed as JSON when possible, otherwise a string
        value: String,
    },
}

#[derive(clap::Args, Debug)]
pub struct NotificationsArgs {
    /// Remove the notifications after printing them
    #[arg(long)]
    pub clear: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<LifecycleError>()
                .map(LifecycleError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut services = Services::build(Arc::new(RealRuntime), cli.root, cli.api_url)?;

    let needs_setup = !matches!(
        cli.command,
        Commands::Setup(_) | Commands::Notifications(_)
    );
    if needs_setup {
        require_installed(services.runtime.as_ref(), &services.config)?;
    }

    let result = match cli.command {
        Commands::List(args) => commands::list(&services, args.json).await,
        Commands::Install(args) => commands::act(&services, &args.identity, Action::Install).await,
        Commands::Update(args) => commands::act(&services, &args.identity, Action::Update).await,
        Commands::Enable(args) => commands::act(&services, &args.identity, Action::Enable).await,
        Commands::Disable(args) => commands::act(&services, &args.identity, Action::Disable).await,
        Commands::UpdateCore => commands::update_core(&mut services).await,
        Commands::Setup(args) => {
            let options = SetupOptions {
                name: args.name,
                email: args.email,
                abbreviation: args.abbreviation,
                modules: args.modules,
            };
            commands::setup(&services, options).await
        }
        Commands::Settings(SettingsCommands::Tabs) => commands::settings::tabs(&services),
        Commands::Settings(SettingsCommands::Get { key }) => {
            commands::settings::get(&services, &key)
        }
        Commands::Settings(SettingsCommands::Set { key, value }) => {
            commands::settings::set(&services, &key, &value)
        }
        Commands::Notifications(args) => commands::notifications(&services, args.clear),
    };

    finish(result, services.shutdown().await)
}

/// The command's own error wins over a failure to stop background jobs.
fn finish(result: Result<()>, shutdown: Result<()>) -> Result<()> {
    if let Err(e) = shutdown {
        if result.is_err() {
            error!("Failed to stop background jobs: {:#}", e);
        } else {
            return Err(e);
        }
    }
    result
}
