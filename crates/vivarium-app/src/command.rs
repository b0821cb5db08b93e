//! Command protocol between a driver and the simulation worker.
//!
//! Channels are crossfire MPMC with an async-capable sender and a blocking
//! receiver, so an async front end can feed the dedicated worker thread
//! without an executor on the worker side. Submission never blocks the
//! driver: a full queue drops the command with a warning.

use crossfire::mpmc;
use crossfire::{detect_backoff_cfg, MAsyncTx, MRx, TrySendError};
use serde::{Deserialize, Serialize};
use vivarium_core::WorldSnapshot;

/// Instructions accepted by the simulation worker.
///
/// The serialized form uses a `command` tag with camelCase variant names, so
/// a JSON driver sends e.g. `{"command":"addCreature","id":3,"x":40,"y":60}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum DriverCommand {
    /// Create the world, fresh or restored from a prior snapshot. Every
    /// other command is a logged no-op until this arrives.
    Init {
        width: u32,
        height: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot: Option<WorldSnapshot>,
    },
    /// Resume stepping, optionally changing the ticks-per-update rate.
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<u32>,
    },
    /// Stop stepping; state is retained.
    Pause,
    /// Discard the world and construct a fresh empty one with the given
    /// dimensions.
    Reset { width: u32, height: u32 },
    /// Spawn a creature with a caller-assigned id at the given position.
    AddCreature { id: u64, x: f32, y: f32 },
    /// Run one batch of ticks (the current speed) and ship a snapshot.
    /// Ignored while paused.
    Update,
    /// Ship a snapshot of the current state without advancing time.
    GetState,
    /// Change the ticks-per-update rate without starting or stopping.
    SetSpeed { speed: u32 },
}

/// Driver-side handle used to enqueue commands.
pub type CommandSender = MAsyncTx<DriverCommand>;
/// Worker-side handle used to drain commands.
pub type CommandReceiver = MRx<DriverCommand>;
/// Worker-side handle used to publish snapshots.
pub type SnapshotSender = MAsyncTx<WorldSnapshot>;
/// Driver-side handle used to consume snapshots.
pub type SnapshotReceiver = MRx<WorldSnapshot>;

/// Create the driver-to-worker command channel.
#[must_use]
pub fn create_command_bus(capacity: usize) -> (CommandSender, CommandReceiver) {
    detect_backoff_cfg();
    mpmc::bounded_tx_async_rx_blocking(capacity)
}

/// Create the worker-to-driver snapshot channel.
#[must_use]
pub fn create_snapshot_bus(capacity: usize) -> (SnapshotSender, SnapshotReceiver) {
    detect_backoff_cfg();
    mpmc::bounded_tx_async_rx_blocking(capacity)
}

/// Enqueue a command without blocking. Returns whether it was accepted; a
/// full queue or a stopped worker drops the command with a warning.
pub fn submit_command(sender: &CommandSender, command: DriverCommand) -> bool {
    match sender.try_send(command) {
        Ok(()) => true,
        Err(TrySendError::Full(command)) => {
            tracing::warn!(?command, "command queue full; dropping command");
            false
        }
        Err(TrySendError::Disconnected(command)) => {
            tracing::warn!(?command, "worker stopped; dropping command");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_serialize_with_a_command_tag() {
        let encoded = serde_json::to_string(&DriverCommand::AddCreature {
            id: 3,
            x: 40.0,
            y: 60.0,
        })
        .expect("encode");
        assert_eq!(encoded, r#"{"command":"addCreature","id":3,"x":40.0,"y":60.0}"#);

        let decoded: DriverCommand =
            serde_json::from_str(r#"{"command":"start","speed":5}"#).expect("decode");
        assert_eq!(decoded, DriverCommand::Start { speed: Some(5) });

        let decoded: DriverCommand =
            serde_json::from_str(r#"{"command":"pause"}"#).expect("decode");
        assert_eq!(decoded, DriverCommand::Pause);
    }

    #[test]
    fn init_seed_is_optional_on_the_wire() {
        let decoded: DriverCommand =
            serde_json::from_str(r#"{"command":"init","width":800,"height":600}"#)
                .expect("decode");
        assert_eq!(
            decoded,
            DriverCommand::Init {
                width: 800,
                height: 600,
                seed: None,
                snapshot: None
            }
        );
    }

    #[test]
    fn submit_reports_full_queues() {
        let (sender, receiver) = create_command_bus(1);
        assert!(submit_command(&sender, DriverCommand::Pause));
        assert!(!submit_command(&sender, DriverCommand::Pause));
        drop(receiver);
        assert!(!submit_command(&sender, DriverCommand::Pause));
    }
}
