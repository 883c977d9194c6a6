pub const DEFAULT_HOME_DIRECTORY: &str = "/var/root";
pub const DEFAULT_HISTORY_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub home_directory: String,
    pub history_limit: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            home_directory: DEFAULT_HOME_DIRECTORY.to_owned(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Mutable per-session shell state. `cursor` stays in `[0, history.len()]`;
/// `history.len()` means "past the newest entry", which is where every new
/// command resets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSession {
    pub history: Vec<String>,
    pub cursor: usize,
    pub current_directory: String,
    pub connected: bool,
}

impl ShellSession {
    pub fn new(home_directory: &str) -> Self {
        Self {
            history: Vec::new(),
            cursor: 0,
            current_directory: home_directory.to_owned(),
            connected: false,
        }
    }

    pub fn reset(&mut self, home_directory: &str) {
        self.history.clear();
        self.cursor = 0;
        self.current_directory = home_directory.to_owned();
        self.connected = false;
    }
}
