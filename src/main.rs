//! `mcs` - command-line control of an MCS positioning stage.
//!
//! ```text
//! mcs --simulate info
//! mcs step --channel 1 --steps -2000 --amplitude 4095 --frequency 2000
//! mcs move-rel --channel 0 --delta-nm 1500
//! mcs sweep --steps 500
//! mcs show-config
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mcs_stage::{
    config::McsConfig, logging, transport::SimulatedTransport, validate, McsTransport,
    MotionCommand, Session, StageController,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "mcs", version, about = "Control a SmarAct MCS positioning stage")]
struct Cli {
    /// Configuration file (default: config/mcs.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the simulated controller instead of hardware
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the system and report its channel count
    Info,
    /// Step move on one channel
    Step {
        #[arg(long, allow_negative_numbers = true)]
        channel: i64,
        #[arg(long, allow_negative_numbers = true)]
        steps: i32,
        #[arg(long)]
        amplitude: Option<u32>,
        #[arg(long)]
        frequency: Option<u32>,
    },
    /// Closed-loop relative move on one channel
    MoveRel {
        #[arg(long, allow_negative_numbers = true)]
        channel: i64,
        #[arg(long, allow_negative_numbers = true)]
        delta_nm: i32,
    },
    /// Step every channel at once
    Sweep {
        #[arg(long, allow_negative_numbers = true)]
        steps: i32,
    },
    /// Print the effective configuration
    ShowConfig,
}

fn transport(config: &McsConfig, simulate: bool) -> Result<Arc<dyn McsTransport>> {
    if simulate {
        let sim = &config.simulation;
        return Ok(Arc::new(SimulatedTransport::with_speed(
            &sim.locator,
            sim.channels,
            sim.nm_per_second,
        )));
    }

    #[cfg(feature = "mcs_hardware")]
    {
        Ok(Arc::new(mcs_stage::transport::NativeTransport::new()))
    }

    #[cfg(not(feature = "mcs_hardware"))]
    {
        bail!("built without hardware support; rebuild with --features mcs_hardware or pass --simulate")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => McsConfig::load_from(path),
        None => McsConfig::load(),
    }
    .context("Failed to load configuration")?;
    logging::init(&config)?;

    if let Err(e) = run(cli, config).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(cli: Cli, mut config: McsConfig) -> Result<()> {
    if cli.simulate && config.session.locator.is_none() {
        config.session.locator = Some(config.simulation.locator.clone());
    }

    if let Command::ShowConfig = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let session = Session::from_config(transport(&config, cli.simulate)?, &config)?;
    let stage = StageController::new(session);

    let channels = stage.open().await.context("Failed to open MCS system")?;
    let locator = stage.locator().await?;
    info!(%locator, channels, "System open");

    let outcome = execute(&stage, &cli.command, &config, channels).await;
    let closed = stage.close().await.context("Failed to close MCS system");
    outcome?;
    closed
}

async fn execute(
    stage: &StageController<Arc<dyn McsTransport>>,
    command: &Command,
    config: &McsConfig,
    channels: u32,
) -> Result<()> {
    match *command {
        Command::Info => {
            let locator = stage.locator().await?;
            println!("locator:  {}", locator);
            println!("channels: {}", channels);
        }
        Command::Step {
            channel,
            steps,
            amplitude,
            frequency,
        } => {
            let command = MotionCommand::step_move(
                validate::channel_from_signed(channel)?,
                steps,
                amplitude.unwrap_or(config.motion.default_amplitude),
                frequency.unwrap_or(config.motion.default_frequency),
            );
            let done = stage.dispatch(command).await?;
            println!("{} completed in {:?}", command, done.elapsed);
        }
        Command::MoveRel { channel, delta_nm } => {
            let command =
                MotionCommand::relative_move(validate::channel_from_signed(channel)?, delta_nm);
            let done = stage.dispatch(command).await?;
            println!("{} completed in {:?}", command, done.elapsed);
        }
        Command::Sweep { steps } => {
            let commands: Vec<_> = (0..channels)
                .map(|ch| {
                    MotionCommand::step_move(
                        ch,
                        steps,
                        config.motion.default_amplitude,
                        config.motion.default_frequency,
                    )
                })
                .collect();
            let mut failed = 0;
            for (command, result) in commands.iter().zip(stage.move_many(commands.clone()).await) {
                match result {
                    Ok(done) => println!("{} completed in {:?}", command, done.elapsed),
                    Err(e) => {
                        failed += 1;
                        println!("{} failed: {}", command, e);
                    }
                }
            }
            if failed > 0 {
                bail!("{} of {} channels failed", failed, channels);
            }
        }
        Command::ShowConfig => {}
    }
    Ok(())
}
