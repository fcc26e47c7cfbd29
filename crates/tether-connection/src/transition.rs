//! The connection transition table.
//!
//! [`next_step`] is a pure function from the current state, one relay
//! trigger, and a snapshot of the machine's counters to the next step. The
//! actor in [`crate::ConnectionStateMachine`] applies the step; nothing in
//! here touches the relay or the runtime, so every edge can be tested with
//! plain `#[test]`s.
//!
//! # Edges
//!
//! | State              | Trigger                     | Step |
//! |--------------------|-----------------------------|------|
//! | `Starting*`/`Restoring*` | `Connected`           | `Connected` (`ConnectedToLobby` for the lobby) |
//! | `StartingHost`     | name conflict               | `StartingClient`, same room |
//! | `StartingHost`     | other failure               | retry `StartingHost` |
//! | `StartingClient`   | failure                     | `StartingHost` if eligible, else fail |
//! | `StartingLobby`    | failure                     | retry `StartingLobby` |
//! | `Connected` client | `MasterSwitched`/host left  | `MigratingHost` if fallback and eligible, else `MigratingClient` |
//! | `Connected`        | any other drop              | `Restoring*` for the held role |
//! | `ConnectedToLobby` | drop                        | `StartingLobby` |
//! | `Migrating*`       | disconnect                  | `Restoring*` of the same role |
//! | `RestoringHost`    | failure                     | `RestoringClient` |
//! | `RestoringClient`  | failure                     | retry (≤ N), escalate once, then fail |
//! | `Disconnecting`    | disconnect                  | `Disconnected` |
//! | `SwitchingRoom`    | disconnect                  | `Starting*` of the new target |
//! | `SwitchingLobby`   | disconnect                  | `StartingLobby` |
//!
//! Start failures are bounded by `max_start_attempts`. Anything not listed
//! is [`Step::Stay`].

use tether_transport::DisconnectReason;

use crate::{ConnectionState, ConnectionStatus, Role};

/// A relay observation (or a locally detected start failure) fed into the
/// table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The relay accepted our outstanding start request.
    Connected,
    /// Our connection ended, or the relay refused a start.
    Disconnected(DisconnectReason),
    /// The room's host is gone.
    MasterSwitched,
    /// A start never reached the relay: the relay rejected the call or the
    /// session scene didn't load.
    StartFailed(ConnectionStatus),
}

/// What the table needs to know beyond the state itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facts {
    /// Role held while `Connected`.
    pub role: Option<Role>,
    /// `ConnectionPolicy::can_act_as_fallback_host()`.
    pub eligible: bool,
    /// The latest election named us as fallback host.
    pub is_fallback: bool,
    /// A start request is out and its outcome hasn't arrived.
    pub start_pending: bool,
    /// Restore retries spent since the budget was last reset.
    pub restore_retries: u32,
    pub max_restore_retries: u32,
    /// Whether the one-time `RestoringClient → RestoringHost` escalation
    /// was used.
    pub escalated: bool,
    /// Failed start attempts since the last user command.
    pub start_attempts: u32,
    pub max_start_attempts: u32,
    /// Role the pending room switch connects in.
    pub switch_target: Role,
}

impl Default for Facts {
    fn default() -> Self {
        Self {
            role: None,
            eligible: true,
            is_fallback: false,
            start_pending: true,
            restore_retries: 0,
            max_restore_retries: 3,
            escalated: false,
            start_attempts: 0,
            max_start_attempts: 5,
            switch_target: Role::Host,
        }
    }
}

/// The outcome of one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing changes: duplicate, stray, or irrelevant trigger.
    Stay,
    /// Move to a new state. Start counters reset.
    Enter(ConnectionState),
    /// Spend one start attempt, then enter the state. Repeating the same
    /// state backs off first; switching roles doesn't.
    RetryStart(ConnectionState),
    /// Spend one restore retry and start `RestoringClient` again after a
    /// backoff.
    RetryRestore,
    /// Use the one-time escalation to `RestoringHost`.
    Escalate,
    /// Give up: report the status and go to `Disconnected`.
    Fail(ConnectionStatus),
}

/// Maps `state × trigger` to the next step.
pub fn next_step(state: ConnectionState, trigger: &Trigger, facts: &Facts) -> Step {
    use ConnectionState::*;

    match trigger {
        Trigger::Connected => match state {
            StartingLobby if facts.start_pending => Step::Enter(ConnectedToLobby),
            s if s.is_starting() && facts.start_pending => Step::Enter(Connected),
            _ => Step::Stay,
        },

        Trigger::MasterSwitched => match state {
            Connected if facts.role == Some(Role::Client) => Step::Enter(migration_target(facts)),
            _ => Step::Stay,
        },

        // The echo of our own shutdown only means something to states
        // that asked for it.
        Trigger::Disconnected(DisconnectReason::LocalShutdown) if !state.awaits_disconnect() => {
            Step::Stay
        }

        Trigger::Disconnected(reason) => {
            let host_left = *reason == DisconnectReason::HostLeft;
            let conflict = *reason == DisconnectReason::RoomNameConflict;
            on_drop(state, ConnectionStatus::from(reason), host_left, conflict, facts)
        }

        Trigger::StartFailed(status) => on_drop(state, *status, false, false, facts),
    }
}

fn on_drop(
    state: ConnectionState,
    status: ConnectionStatus,
    host_left: bool,
    conflict: bool,
    facts: &Facts,
) -> Step {
    use ConnectionState::*;

    // A failure only counts against the start that is actually out.
    // Anything else in a start state is a re-delivered disconnect.
    if state.is_starting() && !facts.start_pending {
        return Step::Stay;
    }

    let starts_exhausted = facts.start_attempts + 1 >= facts.max_start_attempts;

    match state {
        // A taken name always turns into a client join of that room, even
        // on the last attempt. The client start is bounded on its own.
        StartingHost if conflict => Step::RetryStart(StartingClient),
        StartingHost if starts_exhausted => Step::Fail(status),
        StartingHost => Step::RetryStart(StartingHost),

        StartingClient if starts_exhausted => Step::Fail(status),
        StartingClient if facts.eligible => Step::RetryStart(StartingHost),
        StartingClient => Step::Fail(status),

        StartingLobby if starts_exhausted => Step::Fail(status),
        StartingLobby => Step::RetryStart(StartingLobby),

        RestoringHost => Step::Enter(RestoringClient),

        RestoringClient if facts.restore_retries < facts.max_restore_retries => Step::RetryRestore,
        RestoringClient if facts.eligible && !facts.escalated => Step::Escalate,
        RestoringClient => Step::Fail(status),

        Connected => match facts.role {
            Some(Role::Client) if host_left => Step::Enter(migration_target(facts)),
            Some(Role::Host) => Step::Enter(RestoringHost),
            _ => Step::Enter(RestoringClient),
        },
        ConnectedToLobby => Step::Enter(StartingLobby),

        Disconnecting => Step::Enter(Disconnected),
        MigratingHost => Step::Enter(RestoringHost),
        MigratingClient => Step::Enter(RestoringClient),
        SwitchingRoom => Step::Enter(match facts.switch_target {
            Role::Host => StartingHost,
            Role::Client => StartingClient,
        }),
        SwitchingLobby => Step::Enter(StartingLobby),

        Disconnected => Step::Stay,
    }
}

fn migration_target(facts: &Facts) -> ConnectionState {
    if facts.is_fallback && facts.eligible {
        ConnectionState::MigratingHost
    } else {
        ConnectionState::MigratingClient
    }
}

/// Whether moving `from → to` starts a fresh restore budget.
///
/// The budget (retry count and the one-time escalation) resets when a
/// migration begins, or when a settled connection drops straight into a
/// restore. It never resets mid-restore, including on the
/// `RestoringHost → RestoringClient` fallthrough.
pub fn resets_restore_budget(from: ConnectionState, to: ConnectionState) -> bool {
    use ConnectionState::*;
    matches!(to, MigratingHost | MigratingClient) || (from == Connected && to.is_restoring())
}

// =========================================================================
// Tests
// =========================================================================
