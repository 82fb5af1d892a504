use std::fmt;

// Errors raised while interpreting a participant's input.
// They are local to one entity and never stop the simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    InvalidPayload { command: String },
    UnknownCommand(String),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::InvalidPayload { command } => {
                write!(f, "got invalid payload for {command} command")
            }
            InputError::UnknownCommand(command) => write!(f, "unknown command: {command}"),
        }
    }
}

impl std::error::Error for InputError {}
