//! Interactive shell processor: builtin command table, bounded history
//! with a never-wrapping cursor, virtual working directory, and
//! delegation of everything else to the privilege backend.

pub mod processor;
pub mod session;
pub mod transcript;

pub use processor::{ShellProcessor, NOT_CONNECTED_MESSAGE};
pub use session::{ShellConfig, ShellSession, DEFAULT_HISTORY_LIMIT, DEFAULT_HOME_DIRECTORY};
pub use transcript::{LineKind, TerminalLine};
