//! Scan lifecycle state and operator signals
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Lifecycle state of a scan
///
/// `Idle -> Scanning -> {Paused, Aborted, Suspended} -> Done`. `Paused`
/// returns to `Scanning` once every outstanding pause token is resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanStatus {
    Idle,
    Scanning,
    Paused,
    Suspended,
    Aborted,
    Done,
}

impl ScanStatus {
    /// Returns true once the driver has stopped for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Suspended | Self::Aborted | Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Paused => "paused",
            Self::Suspended => "suspended",
            Self::Aborted => "aborted",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Proof of a pause request; must be handed back to resume
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct PauseToken(u64);

impl PauseToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Shared control block between the audit driver and its operators
///
/// Operators signal; the driver observes the signals at its safe points and
/// reports the resulting status.
#[derive(Debug)]
pub struct ScanControl {
    status: Mutex<ScanStatus>,
    pauses: Mutex<HashSet<u64>>,
    next_token: AtomicU64,
    aborted: AtomicBool,
    suspended: AtomicBool,
}

impl Default for ScanControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanControl {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(ScanStatus::Idle),
            pauses: Mutex::new(HashSet::new()),
            next_token: AtomicU64::new(1),
            aborted: AtomicBool::new(false),
            suspended: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> ScanStatus {
        *self.status.lock()
    }

    pub(crate) fn set_status(&self, status: ScanStatus) {
        let mut current = self.status.lock();
        if *current != status {
            tracing::debug!("Scan status: {} -> {}", *current, status);
            *current = status;
        }
    }

    /// Requests a pause; new dequeues halt until the token is resumed
    pub fn pause(&self) -> PauseToken {
        let id = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.pauses.lock().insert(id);
        tracing::info!("Pause requested (token {})", id);
        PauseToken(id)
    }

    /// Withdraws a pause request
    ///
    /// Returns false if the token was not outstanding. The scan stays paused
    /// while other tokens remain.
    pub fn resume(&self, token: PauseToken) -> bool {
        let removed = self.pauses.lock().remove(&token.0);
        if removed {
            tracing::info!("Pause token {} resumed", token.0);
        } else {
            tracing::warn!("Ignoring resume with unknown pause token {}", token.0);
        }
        removed
    }

    pub fn is_paused(&self) -> bool {
        !self.pauses.lock().is_empty()
    }

    /// Stops the driver at its next safe point without touching the queues
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Stops dequeuing at the next safe point, leaving the queues intact
    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::SeqCst);
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }
}
