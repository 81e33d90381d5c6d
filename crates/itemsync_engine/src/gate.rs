//! Single-flight sync gate.
//!
//! Tracks the engine lifecycle flags and refuses transitions that would
//! start a second synchronize, a second cooldown, or a second
//! initialization. Refused transitions leave the gate unchanged.

use std::fmt;

/// Coarse lifecycle phase derived from the gate flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    /// Not syncing. Either never initialized or between cycles.
    Idle,
    /// Identity resolution or the first sync is under way.
    Initializing,
    /// A synchronize call is outstanding.
    Synchronizing,
    /// The engine was disposed.
    Disposed,
}

/// Why the gate refused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRefusal {
    /// Initialization is already running.
    AlreadyInitializing,
    /// Initialization already completed.
    AlreadyInitialized,
    /// A synchronize call is already outstanding.
    SyncInProgress,
    /// A cooldown is already pending.
    AlreadyWaiting,
    /// The engine was disposed.
    Disposed,
}

impl fmt::Display for GateRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            GateRefusal::AlreadyInitializing => "already initializing",
            GateRefusal::AlreadyInitialized => "already initialized",
            GateRefusal::SyncInProgress => "sync is in progress",
            GateRefusal::AlreadyWaiting => "waiting for sync",
            GateRefusal::Disposed => "engine disposed",
        };
        f.write_str(reason)
    }
}

/// Flag state machine guarding sync and cooldown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncGate {
    initializing: bool,
    initialized: bool,
    synchronizing: bool,
    waiting_for_sync: bool,
    disposed: bool,
}

impl SyncGate {
    /// Creates a gate in the idle, uninitialized state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the coarse phase.
    pub fn phase(&self) -> GatePhase {
        if self.disposed {
            GatePhase::Disposed
        } else if self.synchronizing {
            GatePhase::Synchronizing
        } else if self.initializing {
            GatePhase::Initializing
        } else {
            GatePhase::Idle
        }
    }

    /// Returns true while initialization is running.
    pub fn is_initializing(&self) -> bool {
        self.initializing
    }

    /// Returns true once the first sync succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns true while a synchronize call is outstanding.
    pub fn is_synchronizing(&self) -> bool {
        self.synchronizing
    }

    /// Returns true while a cooldown is pending.
    pub fn is_waiting_for_sync(&self) -> bool {
        self.waiting_for_sync
    }

    /// Returns true after disposal.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Enters the initializing state.
    pub fn begin_initialization(&mut self) -> Result<(), GateRefusal> {
        if self.disposed {
            return Err(GateRefusal::Disposed);
        }
        if self.initializing {
            return Err(GateRefusal::AlreadyInitializing);
        }
        if self.initialized {
            return Err(GateRefusal::AlreadyInitialized);
        }
        self.initializing = true;
        Ok(())
    }

    /// Leaves the initializing state without completing it.
    pub fn abort_initialization(&mut self) {
        self.initializing = false;
    }

    /// Marks initialization complete.
    ///
    /// Returns true only for the first call, which is the one that should
    /// announce initialization.
    pub fn complete_initialization(&mut self) -> bool {
        if self.initialized {
            return false;
        }
        self.initializing = false;
        self.initialized = true;
        true
    }

    /// Takes the single-flight slot.
    pub fn try_begin_sync(&mut self) -> Result<(), GateRefusal> {
        if self.disposed {
            return Err(GateRefusal::Disposed);
        }
        if self.synchronizing {
            return Err(GateRefusal::SyncInProgress);
        }
        self.synchronizing = true;
        Ok(())
    }

    /// Releases the single-flight slot.
    pub fn finish_sync(&mut self) {
        self.synchronizing = false;
    }

    /// Enters the cooldown sub-state.
    pub fn try_begin_cooldown(&mut self) -> Result<(), GateRefusal> {
        if self.disposed {
            return Err(GateRefusal::Disposed);
        }
        if self.waiting_for_sync {
            return Err(GateRefusal::AlreadyWaiting);
        }
        self.waiting_for_sync = true;
        Ok(())
    }

    /// Leaves the cooldown sub-state.
    pub fn end_cooldown(&mut self) {
        self.waiting_for_sync = false;
    }

    /// Moves to the terminal disposed state.
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.initializing = false;
        self.synchronizing = false;
        self.waiting_for_sync = false;
    }
}
