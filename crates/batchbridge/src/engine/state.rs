use std::fmt;

/// Lifecycle of an [`Engine`](super::Engine).
///
/// Transitions only move forward: `Created → Starting → Running → Stopping → Stopped`.
/// A stopped engine stays stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Created => "created",
            EngineState::Starting => "starting",
            EngineState::Running => "running",
            EngineState::Stopping => "stopping",
            EngineState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
