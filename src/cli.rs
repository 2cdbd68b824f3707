//! Command-line interface.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use vigil_core::{InstallRequest, Launch, ServiceHost, SupervisorConfig, SupervisorError};

/// Service supervisor for the database engine.
#[derive(Parser, Debug)]
#[command(name = "vigil", version, about = "Runs the database engine as an OS service")]
pub struct Cli {
    /// Supervisor configuration file (TOML)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Sub-commands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Register the service; options are passed to the engine on every start
    Install {
        /// Engine options
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        options: Vec<String>,
    },
    /// Remove the service registration
    Uninstall,
    /// Run as the service (invoked by the init script or the SCM)
    Svc {
        /// Stay attached to the terminal instead of daemonizing
        #[arg(long)]
        foreground: bool,

        /// Path to the engine binary
        engine: PathBuf,

        /// Engine options
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        options: Vec<String>,
    },
}

impl Cli {
    /// Loads the configuration named by `--config`, or the defaults.
    pub fn load_config(&self) -> Result<SupervisorConfig> {
        match &self.config {
            Some(path) => SupervisorConfig::load(path)
                .with_context(|| format!("loading {}", path.display())),
            None => Ok(SupervisorConfig::new()),
        }
    }
}

/// Engine expected next to the supervisor binary.
#[must_use]
pub fn sibling_engine(supervisor: &Path, engine_name: &str) -> PathBuf {
    let file = format!("{engine_name}{}", std::env::consts::EXE_SUFFIX);
    supervisor
        .parent()
        .map_or_else(|| PathBuf::from(&file), |dir| dir.join(&file))
}

/// Builds the install request for the running supervisor binary.
pub fn install_request(
    config: &SupervisorConfig,
    config_path: Option<&Path>,
    options: Vec<String>,
) -> Result<InstallRequest> {
    let supervisor = std::env::current_exe()
        .and_then(|p| p.canonicalize())
        .context("locating the supervisor binary")?;
    let engine = sibling_engine(&supervisor, &config.engine_name);
    let config = config_path
        .map(|p| p.canonicalize())
        .transpose()
        .context("resolving the configuration path")?;
    Ok(InstallRequest {
        supervisor,
        engine,
        options,
        config,
    })
}

/// Executes `cli` against `host` and returns the process exit code.
pub fn execute<H: ServiceHost>(
    cli: Cli,
    config: SupervisorConfig,
    host: &H,
    privilege_hint: &str,
) -> Result<i32> {
    match cli.command {
        Command::Install { options } => {
            let request = install_request(&config, cli.config.as_deref(), options)?;
            println!("Installing {} service...", config.service_name);
            report_registration(host.install(&request), privilege_hint)?;
            println!("Done.");
            Ok(0)
        }
        Command::Uninstall => {
            println!("Uninstalling {} service...", config.service_name);
            report_registration(host.uninstall(), privilege_hint)?;
            println!("Done.");
            Ok(0)
        }
        Command::Svc {
            foreground,
            engine,
            options,
        } => {
            let launch = Launch {
                engine,
                options,
                foreground,
                config,
            };
            Ok(host.run(launch)?)
        }
    }
}

fn report_registration(result: vigil_core::Result<()>, privilege_hint: &str) -> Result<()> {
    match result {
        Err(e @ SupervisorError::Registration(_)) => {
            Err(anyhow::Error::new(e).context(privilege_hint.to_string()))
        }
        other => Ok(other?),
    }
}
