//! Driver-side harness for the vivarium engine: a serialized command
//! protocol, channel plumbing, and a worker thread that owns the world and
//! ships JSON-friendly snapshots back to the driver.

pub mod command;
pub mod worker;

pub use command::{
    create_command_bus, create_snapshot_bus, submit_command, CommandReceiver, CommandSender,
    DriverCommand, SnapshotReceiver, SnapshotSender,
};
pub use worker::{spawn_worker, SimWorker, WorkerHandle};
