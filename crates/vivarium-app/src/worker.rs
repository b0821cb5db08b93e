//! Simulation worker: a dedicated thread that owns the [`World`], executes
//! driver commands in arrival order, and publishes snapshots.

use std::io;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};
use vivarium_core::{CreatureId, World, WorldConfig, WorldSnapshot};

use crate::command::{
    create_command_bus, create_snapshot_bus, CommandReceiver, CommandSender, DriverCommand,
    SnapshotReceiver, SnapshotSender,
};

/// Default number of ticks executed per `Update` command.
pub const DEFAULT_SPEED: u32 = 1;
/// Queue depth for both the command and snapshot channels.
const BUS_CAPACITY: usize = 64;

/// State machine behind the worker thread. Public so drivers that want a
/// synchronous, in-process simulation can run it without channels.
pub struct SimWorker {
    world: Option<World>,
    running: bool,
    speed: u32,
}

impl Default for SimWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorker {
    /// Create a worker with no world. Commands other than `Init` are no-ops
    /// until one arrives.
    #[must_use]
    pub fn new() -> Self {
        Self {
            world: None,
            running: false,
            speed: DEFAULT_SPEED,
        }
    }

    /// Whether `Init` has been processed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.world.is_some()
    }

    /// Whether `Update` commands currently advance time.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Build or rebuild the world, fresh or restored from a prior snapshot.
    fn init_world(
        &mut self,
        width: u32,
        height: u32,
        seed: Option<u64>,
        snapshot: Option<WorldSnapshot>,
    ) {
        let config = WorldConfig {
            rng_seed: seed,
            ..WorldConfig::sized(width, height)
        };
        let restored = snapshot.is_some();
        let built = match snapshot {
            Some(snapshot) => World::from_snapshot(&snapshot, config),
            None => World::new(config),
        };
        match built {
            Ok(world) => {
                info!(width, height, ?seed, restored, "world initialized");
                self.world = Some(world);
                self.running = false;
            }
            Err(err) => error!(%err, "failed to initialize world"),
        }
    }

    /// Execute one command. Returns a snapshot when the command produces one
    /// (`Update` while running, and `GetState`).
    pub fn handle(&mut self, command: DriverCommand) -> Option<WorldSnapshot> {
        match command {
            DriverCommand::Init {
                width,
                height,
                seed,
                snapshot,
            } => {
                self.init_world(width, height, seed, snapshot);
                None
            }
            other if self.world.is_none() => {
                warn!(command = ?other, "command received before init; ignoring");
                None
            }
            DriverCommand::Start { speed } => {
                if let Some(speed) = speed {
                    self.speed = speed.max(1);
                }
                self.running = true;
                debug!(speed = self.speed, "simulation started");
                None
            }
            DriverCommand::Pause => {
                self.running = false;
                debug!("simulation paused");
                None
            }
            DriverCommand::Reset { width, height } => {
                let world = self.world.as_mut()?;
                let config = WorldConfig {
                    width,
                    height,
                    ..world.config().clone()
                };
                match World::new(config) {
                    Ok(fresh) => {
                        *world = fresh;
                        self.running = false;
                        info!("world reset");
                    }
                    Err(err) => error!(%err, "failed to reset world"),
                }
                None
            }
            DriverCommand::AddCreature { id, x, y } => {
                let world = self.world.as_mut()?;
                if let Err(err) = world.spawn_creature(CreatureId(id), x, y) {
                    warn!(%err, id, "spawn rejected");
                }
                None
            }
            DriverCommand::Update => {
                if !self.running {
                    debug!("update ignored while paused");
                    return None;
                }
                let world = self.world.as_mut()?;
                for _ in 0..self.speed {
                    let events = world.tick();
                    if events.fights > 0 || events.meals > 0 || events.removed > 0 {
                        debug!(
                            generation = events.generation,
                            fights = events.fights,
                            meals = events.meals,
                            removed = events.removed,
                            "tick events"
                        );
                    }
                }
                Some(world.to_snapshot())
            }
            DriverCommand::GetState => self.world.as_ref().map(World::to_snapshot),
            DriverCommand::SetSpeed { speed } => {
                self.speed = speed.max(1);
                debug!(speed = self.speed, "speed changed");
                None
            }
        }
    }

    /// Drain the command channel until every sender is dropped, publishing
    /// snapshots as commands produce them. A full snapshot queue drops the
    /// snapshot rather than stalling the simulation.
    pub fn run(mut self, commands: CommandReceiver, snapshots: SnapshotSender) {
        while let Ok(command) = commands.recv() {
            if let Some(snapshot) = self.handle(command) {
                if snapshots.try_send(snapshot).is_err() {
                    warn!("snapshot queue full or closed; dropping snapshot");
                }
            }
        }
        info!("command channel closed; worker exiting");
    }
}

/// Channels and thread handle for a running worker.
pub struct WorkerHandle {
    pub commands: CommandSender,
    pub snapshots: SnapshotReceiver,
    pub thread: JoinHandle<()>,
}

impl WorkerHandle {
    /// Drop the command side and wait for the worker thread to exit.
    pub fn shutdown(self) {
        drop(self.commands);
        if self.thread.join().is_err() {
            error!("worker thread panicked");
        }
    }
}

/// Spawn the simulation worker on its own thread. Fails only if the OS
/// refuses the thread.
pub fn spawn_worker() -> io::Result<WorkerHandle> {
    let (command_tx, command_rx) = create_command_bus(BUS_CAPACITY);
    let (snapshot_tx, snapshot_rx) = create_snapshot_bus(BUS_CAPACITY);
    let thread = thread::Builder::new()
        .name("vivarium-worker".into())
        .spawn(move || SimWorker::new().run(command_rx, snapshot_tx))?;
    Ok(WorkerHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
        thread,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init(worker: &mut SimWorker) {
        worker.handle(DriverCommand::Init {
            width: 800,
            height: 600,
            seed: Some(5),
            snapshot: None,
        });
    }

    #[test]
    fn commands_before_init_are_ignored() {
        let mut worker = SimWorker::new();
        assert!(worker
            .handle(DriverCommand::AddCreature {
                id: 1,
                x: 10.0,
                y: 10.0
            })
            .is_none());
        assert!(worker.handle(DriverCommand::GetState).is_none());
        assert!(!worker.is_initialized());

        init(&mut worker);
        assert!(worker.is_initialized());
        let snapshot = worker.handle(DriverCommand::GetState).expect("snapshot");
        assert_eq!(snapshot.generation, 0);
        assert!(snapshot.creatures.is_empty());
    }

    #[test]
    fn update_respects_running_state_and_speed() {
        let mut worker = SimWorker::new();
        init(&mut worker);
        worker.handle(DriverCommand::AddCreature {
            id: 1,
            x: 100.0,
            y: 100.0,
        });

        assert!(
            worker.handle(DriverCommand::Update).is_none(),
            "updates are ignored until started"
        );

        worker.handle(DriverCommand::Start { speed: Some(5) });
        let snapshot = worker.handle(DriverCommand::Update).expect("snapshot");
        assert_eq!(snapshot.generation, 5);

        worker.handle(DriverCommand::SetSpeed { speed: 2 });
        let snapshot = worker.handle(DriverCommand::Update).expect("snapshot");
        assert_eq!(snapshot.generation, 7);

        worker.handle(DriverCommand::Pause);
        assert!(worker.handle(DriverCommand::Update).is_none());
        let snapshot = worker.handle(DriverCommand::GetState).expect("snapshot");
        assert_eq!(snapshot.generation, 7, "paused updates do not advance time");
    }

    #[test]
    fn reset_discards_creatures_and_generation() {
        let mut worker = SimWorker::new();
        init(&mut worker);
        worker.handle(DriverCommand::AddCreature {
            id: 1,
            x: 100.0,
            y: 100.0,
        });
        worker.handle(DriverCommand::Start { speed: Some(3) });
        worker.handle(DriverCommand::Update);

        worker.handle(DriverCommand::Reset {
            width: 400,
            height: 400,
        });
        assert!(!worker.is_running(), "reset leaves the world paused");
        let snapshot = worker.handle(DriverCommand::GetState).expect("snapshot");
        assert_eq!(snapshot.generation, 0);
        assert!(snapshot.creatures.is_empty());
        assert_eq!(snapshot.width, 400);
        assert_eq!(snapshot.height, 400);
    }

    #[test]
    fn spawn_worker_returns_a_joinable_handle() {
        let worker = spawn_worker().expect("worker thread");
        worker.shutdown();
    }

    #[test]
    fn init_can_restore_a_prior_snapshot() {
        let mut worker = SimWorker::new();
        init(&mut worker);
        worker.handle(DriverCommand::AddCreature {
            id: 4,
            x: 120.0,
            y: 80.0,
        });
        worker.handle(DriverCommand::Start { speed: Some(10) });
        let saved = worker.handle(DriverCommand::Update).expect("snapshot");

        let mut restored = SimWorker::new();
        restored.handle(DriverCommand::Init {
            width: 800,
            height: 600,
            seed: Some(5),
            snapshot: Some(saved.clone()),
        });
        let current = restored.handle(DriverCommand::GetState).expect("snapshot");
        assert_eq!(current, saved);
    }

    #[test]
    fn duplicate_spawn_is_rejected_without_state_damage() {
        let mut worker = SimWorker::new();
        init(&mut worker);
        worker.handle(DriverCommand::AddCreature {
            id: 1,
            x: 100.0,
            y: 100.0,
        });
        worker.handle(DriverCommand::AddCreature {
            id: 1,
            x: 300.0,
            y: 300.0,
        });
        let snapshot = worker.handle(DriverCommand::GetState).expect("snapshot");
        assert_eq!(snapshot.creatures.len(), 1);
        assert_eq!(snapshot.creatures[0].x, 100.0);
    }
}
