//! Demo driver: spawns the worker thread, seeds a grid of creatures, runs
//! the simulation in bursts, and logs population statistics.

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use vivarium_app::{spawn_worker, submit_command, DriverCommand};
use vivarium_core::WorldSnapshot;

const WORLD_WIDTH: u32 = 800;
const WORLD_HEIGHT: u32 = 600;
const GRID_COLUMNS: u64 = 6;
const POPULATION: u64 = 24;
const TICKS_PER_BURST: u32 = 50;
const BURSTS: usize = 20;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}

fn log_population(snapshot: &WorldSnapshot) {
    let alive = snapshot.creatures.iter().filter(|c| !c.is_dead).count();
    let corpses = snapshot.creatures.len() - alive;
    let mean_energy = if alive > 0 {
        snapshot
            .creatures
            .iter()
            .filter(|c| !c.is_dead)
            .map(|c| c.energy)
            .sum::<f32>()
            / alive as f32
    } else {
        0.0
    };
    info!(
        generation = snapshot.generation,
        alive,
        corpses,
        mean_energy,
        "population"
    );
}

fn main() -> Result<()> {
    init_tracing();

    let worker = spawn_worker().context("failed to spawn the simulation worker")?;

    submit_command(
        &worker.commands,
        DriverCommand::Init {
            width: WORLD_WIDTH,
            height: WORLD_HEIGHT,
            seed: None,
            snapshot: None,
        },
    );
    for id in 0..POPULATION {
        let x = 80.0 + (id % GRID_COLUMNS) as f32 * 120.0;
        let y = 80.0 + (id / GRID_COLUMNS) as f32 * 120.0;
        submit_command(&worker.commands, DriverCommand::AddCreature { id, x, y });
    }
    submit_command(
        &worker.commands,
        DriverCommand::Start {
            speed: Some(TICKS_PER_BURST),
        },
    );

    for _ in 0..BURSTS {
        if !submit_command(&worker.commands, DriverCommand::Update) {
            break;
        }
        let snapshot = worker
            .snapshots
            .recv()
            .context("worker stopped before delivering a snapshot")?;
        log_population(&snapshot);
    }

    submit_command(&worker.commands, DriverCommand::Pause);
    submit_command(&worker.commands, DriverCommand::GetState);
    let final_snapshot = worker
        .snapshots
        .recv()
        .context("worker stopped before delivering the final snapshot")?;
    info!(
        generation = final_snapshot.generation,
        creatures = final_snapshot.creatures.len(),
        "simulation finished"
    );

    worker.shutdown();
    Ok(())
}
