//! The failure vocabulary shared by every container in the crate.

use thiserror::Error;

/// Error kinds a container operation can report.
///
/// The lock-free hot paths transport `Empty` and `Full` as `Option`/`bool`
/// returns; this enum is the named form used by the blocking layer and by
/// diagnostics. `RegistryExhausted` is a programmer error (thread count
/// exceeds the configured hazard-record count) and is raised as a panic at
/// the acquisition site rather than returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContainerError {
    /// `pop`/`try_pop` found no element.
    #[error("container is empty")]
    Empty,

    /// `try_push` found the ring full for its ticket.
    #[error("ring is full")]
    Full,

    /// The blocking queue was stopped and has drained.
    #[error("queue is stopped and drained")]
    Terminated,

    /// Every hazard record is owned by some thread.
    #[error("all {capacity} hazard records are owned; raise the registry size")]
    RegistryExhausted {
        /// Configured record count of the registry.
        capacity: usize,
    },
}

impl ContainerError {
    /// True for conditions the caller is expected to retry or absorb.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Empty | Self::Full)
    }

    /// True for conditions that will never clear on their own.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::RegistryExhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(ContainerError::Empty.is_recoverable());
        assert!(ContainerError::Full.is_recoverable());
        assert!(ContainerError::Terminated.is_terminal());
        assert!(ContainerError::RegistryExhausted { capacity: 128 }.is_terminal());
        assert!(!ContainerError::Terminated.is_recoverable());
    }

    #[test]
    fn display() {
        assert_eq!(ContainerError::Full.to_string(), "ring is full");
        assert!(ContainerError::RegistryExhausted { capacity: 8 }
            .to_string()
            .contains("8 hazard records"));
    }
}
