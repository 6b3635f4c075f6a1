use thiserror::Error;

/// A fatal VM condition. Emitting one sets `running = false`; the machine
/// stops after the offending instruction.
#[derive(Debug, Clone, Error)]
#[error("runtime error at pc {pc}: {message}")]
pub struct RuntimeError {
    pub message: String,
    pub pc: usize,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, pc: usize) -> Self {
        RuntimeError {
            message: message.into(),
            pc,
        }
    }
}
