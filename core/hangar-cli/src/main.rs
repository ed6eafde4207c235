//! hangar: command-line shell for the Hangar game launcher.
//!
//! Manages the local build library and the signed-in session, and launches
//! the selected build, waiting until the game exits.
//!
//! ## Subcommands
//!
//! - `builds list|add|remove|select`: the build library
//! - `login`, `logout`: the session (logout wipes all launcher state)
//! - `eor on|off`: the EOR toggle passed to the game
//! - `status`: session, toggle and selection at a glance
//! - `launch`: runs one launch cycle

mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use hangar_core::{HangarError, LaunchState, Launcher, StorageConfig, HOME_ENV};

#[derive(Parser)]
#[command(name = "hangar")]
#[command(about = "Game build library and launcher")]
#[command(version)]
struct Cli {
    /// Data directory (default: ~/.hangar)
    #[arg(long, global = true, env = HOME_ENV, value_name = "DIR")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the build library
    Builds {
        #[command(subcommand)]
        command: BuildsCommand,
    },

    /// Store credentials for launching
    Login {
        #[arg(long)]
        email: String,

        #[arg(long, env = "HANGAR_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out and clear every build, the selection and the toggle
    Logout,

    /// Turn the EOR toggle on or off
    Eor {
        #[arg(value_enum)]
        value: Toggle,
    },

    /// Show session, toggle and selected build
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Launch the selected build and wait until it exits
    Launch,
}

#[derive(Subcommand)]
enum BuildsCommand {
    /// List builds, newest first; `*` marks the selection
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a build directory
    Add {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Remove a build by id
    Remove {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Select the build at PATH
    Select {
        #[arg(value_name = "PATH")]
        path: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Hangar(#[from] HangarError),

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A launch refusal, reported as the notice the user would see.
    #[error("{0}")]
    Notice(String),
}

fn main() {
    let cli = Cli::parse();
    let storage = cli
        .home
        .clone()
        .map(StorageConfig::with_root)
        .unwrap_or_default();
    let _logging_guard = logging::init(&storage.logs_dir());

    if let Err(err) = run(cli.command, storage) {
        tracing::debug!(error = %err, "hangar command failed");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(command: Commands, storage: StorageConfig) -> Result<(), CliError> {
    let mut launcher = Launcher::open(storage)?;

    match command {
        Commands::Builds { command } => run_builds(&mut launcher, command)?,
        Commands::Login { email, password } => {
            launcher.login(&email, &password)?;
            println!("Signed in as {email}");
        }
        Commands::Logout => {
            launcher.logout()?;
            println!("Signed out; launcher state cleared");
        }
        Commands::Eor { value } => {
            let enabled = matches!(value, Toggle::On);
            launcher.set_eor(enabled)?;
            println!("eor: {}", on_off(enabled));
        }
        Commands::Status { json } => print_status(&launcher, json)?,
        Commands::Launch => run_launch(&mut launcher)?,
    }
    Ok(())
}

fn run_builds(launcher: &mut Launcher, command: BuildsCommand) -> Result<(), CliError> {
    match command {
        BuildsCommand::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(launcher.builds())?);
                return Ok(());
            }
            if launcher.builds().is_empty() {
                println!("No builds");
                return Ok(());
            }
            let selected_id = launcher.selected_build().map(|entry| entry.id.clone());
            for entry in launcher.builds() {
                let marker = if selected_id.as_deref() == Some(entry.id.as_str()) {
                    '*'
                } else {
                    ' '
                };
                println!("{marker} {}  {}  {}", entry.id, entry.name, entry.path);
            }
        }
        BuildsCommand::Add { path } => {
            let entry = launcher.add_build(&path)?;
            println!("Added {} ({})", entry.name, entry.id);
            if entry.cover.is_none() {
                println!("No cover image found");
            }
        }
        BuildsCommand::Remove { id } => {
            launcher.remove_build(&id)?;
            println!("Removed {id}");
        }
        BuildsCommand::Select { path } => {
            launcher.select_build(&path)?;
            println!("Selected {path}");
        }
    }
    Ok(())
}

fn print_status(launcher: &Launcher, json: bool) -> Result<(), CliError> {
    let email = launcher.session().map(|credentials| credentials.email.as_str());
    if json {
        let status = serde_json::json!({
            "email": email,
            "eor": launcher.eor(),
            "selectedBuildPath": launcher.selected_path(),
            "builds": launcher.builds().len(),
            "state": launcher.state(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    match email {
        Some(email) => println!("session: {email}"),
        None => println!("session: signed out"),
    }
    println!("eor: {}", on_off(launcher.eor()));
    match launcher.selected_build() {
        Some(entry) => println!("selected: {} ({})", entry.name, entry.path),
        None if !launcher.selected_path().is_empty() => {
            println!("selected: {}", launcher.selected_path())
        }
        None => println!("selected: none"),
    }
    println!("builds: {}", launcher.builds().len());
    Ok(())
}

fn run_launch(launcher: &mut Launcher) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    runtime.block_on(async {
        let mut states = launcher.subscribe();
        if let Err(err) = launcher.launch() {
            return Err(match launcher.notice() {
                Some(notice) => CliError::Notice(notice.message),
                None => err.into(),
            });
        }
        println!("Launching {}", launcher.launch_path().unwrap_or_default());

        loop {
            tokio::select! {
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *states.borrow_and_update();
                    println!("state: {state}");
                    if state == LaunchState::Idle {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    launcher.shutdown();
                    println!("Interrupted; stopped watching the game");
                    break;
                }
            }
        }
        Ok(())
    })
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
