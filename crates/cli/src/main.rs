use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use drift_config::{AppSettings, DesiredState};
use drift_control::chaos::ChaosAgent;
use drift_control::controller::{ControlOptions, DriftController, ShutdownSignal};
use drift_control::{DockerCli, HeadlessUI};

#[derive(Parser)]
#[command(name = "driftctl", version, about = "Container drift controller")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the control loop until SIGINT/SIGTERM
    Run {
        /// Path to the desired state document
        #[arg(long)]
        config: Option<PathBuf>,
        /// Seconds between two control cycles
        #[arg(long)]
        interval: Option<u64>,
        /// Docker endpoint (docker -H), defaults to the local daemon
        #[arg(long)]
        docker_host: Option<String>,
    },
    /// Unleash the chaos agent against the managed container
    Chaos {
        /// Path to the desired state document naming the target
        #[arg(long)]
        config: Option<PathBuf>,
        /// Target container name, overrides the one from the config
        #[arg(long)]
        target: Option<String>,
        /// Decoy image for rogue deployments
        #[arg(long)]
        rogue_image: Option<String>,
        /// Host port for rogue deployments
        #[arg(long)]
        rogue_port: Option<u16>,
        /// Docker endpoint (docker -H), defaults to the local daemon
        #[arg(long)]
        docker_host: Option<String>,
    },
    /// Load and validate a desired state document
    Check {
        /// Path to the desired state document
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Requests shutdown on the first SIGINT or SIGTERM. The flag is
/// idempotent, a second signal while cleanup runs changes nothing.
fn spawn_signal_handler(shutdown: ShutdownSignal) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Failed to install SIGTERM handler: {e}");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        shutdown.request();
    });
}

async fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let mut settings = AppSettings::from_env()?;

    match cli.command {
        Commands::Run {
            config,
            interval,
            docker_host,
        } => {
            if let Some(config) = config {
                settings.config_file = config;
            }
            if let Some(secs) = interval {
                settings.polling_interval = Duration::from_secs(secs);
            }
            if let Some(host) = docker_host {
                settings.docker_host = Some(host);
            }

            println!("Drift controller starting");
            println!("  setpoint: {}", settings.config_file.display());
            println!("  interval: {:?}", settings.polling_interval);

            let runtime = Arc::new(DockerCli::new(settings.docker_host.clone()));
            let controller =
                DriftController::new(runtime, ControlOptions::from(&settings), HeadlessUI);
            spawn_signal_handler(controller.shutdown_signal());

            controller.run().await?;
        }
        Commands::Chaos {
            config,
            target,
            rogue_image,
            rogue_port,
            docker_host,
        } => {
            if let Some(config) = config {
                settings.config_file = config;
            }
            if let Some(image) = rogue_image {
                settings.rogue_image = image;
            }
            if let Some(port) = rogue_port {
                settings.rogue_port = port;
            }
            if let Some(host) = docker_host {
                settings.docker_host = Some(host);
            }

            let target = match target {
                Some(name) => name,
                None => DesiredState::load(&settings.config_file)?.app_name,
            };

            let runtime = Arc::new(DockerCli::new(settings.docker_host.clone()));
            let agent = ChaosAgent::new(
                runtime,
                target,
                settings.rogue_image.clone(),
                settings.rogue_port,
            );
            agent.unleash().await?;
        }
        Commands::Check { config } => {
            if let Some(config) = config {
                settings.config_file = config;
            }

            let desired = DesiredState::load(&settings.config_file)?;
            println!("Setpoint OK: {}", settings.config_file.display());
            println!("  app:            {}", desired.app_name);
            println!("  image:          {}", desired.image);
            println!("  status:         {:?}", desired.status);
            println!("  host port:      {}", desired.host_port);
            if let Some(fallback) = desired.fallback_host_port {
                println!("  fallback port:  {}", fallback);
            }
            println!("  container port: {}", desired.container_port);
        }
    }

    Ok(ExitCode::SUCCESS)
}
