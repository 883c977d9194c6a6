use std::sync::Arc;

use latchkey_protocol::{DeviceBackend, BACKEND_UNREACHABLE_MESSAGE};

use crate::session::{ShellConfig, ShellSession};
use crate::transcript::TerminalLine;

pub const NOT_CONNECTED_MESSAGE: &str = "Shell is not connected. Run the unlock first.";
const EXECUTION_FAILED_MESSAGE: &str = "Command execution failed";

const HELP_TEXT: &str = "latchkey terminal - privileged shell
All commands run through the privilege backend

Built-in:
  help      - Show this help message
  clear     - Clear terminal screen
  history   - Show command history
  cd <dir>  - Change directory
  exit      - End the shell session

All other commands are executed directly on the target.
Examples:
  ls -la /var/root
  cat /etc/passwd
  ps aux";

pub struct ShellProcessor {
    backend: Arc<dyn DeviceBackend>,
    config: ShellConfig,
    session: ShellSession,
    lines: Vec<TerminalLine>,
}

impl ShellProcessor {
    pub fn new(backend: Arc<dyn DeviceBackend>, config: ShellConfig) -> Self {
        let session = ShellSession::new(&config.home_directory);
        let mut processor = Self {
            backend,
            config,
            session,
            lines: Vec::new(),
        };
        processor.push(TerminalLine::system("latchkey terminal"));
        processor.push(TerminalLine::system("Type 'help' for available commands"));
        processor.push(TerminalLine::system(""));
        processor
    }

    pub fn lines(&self) -> &[TerminalLine] {
        &self.lines
    }

    pub fn session(&self) -> &ShellSession {
        &self.session
    }

    pub fn current_directory(&self) -> &str {
        &self.session.current_directory
    }

    pub fn is_connected(&self) -> bool {
        self.session.connected
    }

    /// Checks backend health and opens the session. On failure the session
    /// stays disconnected and a single error line is appended.
    pub async fn start(&mut self) {
        if let Err(error) = self.backend.health_check().await {
            tracing::warn!(error = %error, "shell start failed backend health check");
            self.push(TerminalLine::error(BACKEND_UNREACHABLE_MESSAGE));
            return;
        }

        self.session.connected = true;
        self.push(TerminalLine::system(
            "Shell session started with root privileges",
        ));
        self.push(TerminalLine::system("uid=0(root) gid=0(wheel)"));
        self.push(TerminalLine::system(""));

        if let Ok(pwd) = self.backend.execute_line("pwd").await {
            let pwd = pwd.trim();
            if !pwd.is_empty() {
                self.session.current_directory = pwd.to_owned();
            }
        }
    }

    pub fn stop(&mut self) {
        self.session.reset(&self.config.home_directory);
        self.push(TerminalLine::system("Shell session ended"));
    }

    /// Processes one command line. Side effects are observed through the
    /// transcript and session accessors.
    pub async fn execute(&mut self, line: &str) {
        if !self.session.connected {
            self.push(TerminalLine::error(NOT_CONNECTED_MESSAGE));
            return;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            self.push(TerminalLine::output(""));
            return;
        }

        self.record_history(trimmed);
        self.push(TerminalLine::command(trimmed));

        let (command, remainder) = split_first_token(trimmed);
        match command.to_ascii_lowercase().as_str() {
            "help" => self.show_help(),
            "clear" | "cls" => self.clear_transcript(),
            "history" => self.show_history(),
            "exit" | "quit" => self.stop(),
            "cd" => self.change_directory(remainder).await,
            _ => self.forward_to_backend(trimmed).await,
        }
    }

    /// Previous history entry, or `None` at the oldest. Never wraps.
    pub fn previous(&mut self) -> Option<&str> {
        if self.session.cursor == 0 {
            return None;
        }
        self.session.cursor -= 1;
        self.session
            .history
            .get(self.session.cursor)
            .map(String::as_str)
    }

    /// Next history entry, or `None` at the newest. Never wraps.
    pub fn next(&mut self) -> Option<&str> {
        if self.session.cursor + 1 >= self.session.history.len() {
            return None;
        }
        self.session.cursor += 1;
        self.session
            .history
            .get(self.session.cursor)
            .map(String::as_str)
    }

    fn record_history(&mut self, command: &str) {
        if self.session.history.len() >= self.config.history_limit {
            self.session.history.remove(0);
        }
        self.session.history.push(command.to_owned());
        self.session.cursor = self.session.history.len();
    }

    fn show_help(&mut self) {
        for line in HELP_TEXT.lines() {
            self.push(TerminalLine::output(line));
        }
    }

    fn clear_transcript(&mut self) {
        self.lines.clear();
        self.push(TerminalLine::system("Terminal cleared"));
    }

    fn show_history(&mut self) {
        if self.session.history.is_empty() {
            self.push(TerminalLine::output("No commands in history"));
            return;
        }
        let numbered: Vec<String> = self
            .session
            .history
            .iter()
            .enumerate()
            .map(|(index, command)| format!("  {}  {}", index + 1, command))
            .collect();
        for line in numbered {
            self.push(TerminalLine::output(line));
        }
    }

    async fn change_directory(&mut self, argument: &str) {
        let argument = argument.trim();
        let target = self.resolve_cd_target(argument);

        match self.backend.is_directory(&target).await {
            Ok(true) => {
                self.session.current_directory = target;
                self.push(TerminalLine::output(""));
            }
            Ok(false) => {
                let shown = if argument.is_empty() { &target } else { argument };
                self.push(TerminalLine::error(format!(
                    "cd: {shown}: No such file or directory"
                )));
            }
            Err(error) => {
                tracing::warn!(error = %error, target = %target, "cd verification failed");
                self.push(TerminalLine::error(BACKEND_UNREACHABLE_MESSAGE));
            }
        }
    }

    fn resolve_cd_target(&self, argument: &str) -> String {
        if argument.is_empty() || argument == "~" {
            return self.config.home_directory.clone();
        }
        if argument.starts_with('/') {
            return argument.to_owned();
        }
        if argument == ".." {
            return parent_of(&self.session.current_directory);
        }
        if self.session.current_directory == "/" {
            return format!("/{argument}");
        }
        format!("{}/{}", self.session.current_directory, argument)
    }

    async fn forward_to_backend(&mut self, command: &str) {
        // The backend is stateless per call, so the working directory is
        // re-established on every invocation.
        let full_command = if self.session.current_directory == self.config.home_directory {
            command.to_owned()
        } else {
            format!("cd '{}' && {}", self.session.current_directory, command)
        };

        match self.backend.execute_line(&full_command).await {
            Ok(output) => {
                let segments: Vec<&str> = output.split('\n').collect();
                let single = segments.len() == 1;
                for segment in segments {
                    if !segment.is_empty() || single {
                        self.push(TerminalLine::output(segment));
                    }
                }
                self.push(TerminalLine::output(""));
            }
            Err(error) => {
                tracing::warn!(error = %error, "backend shell execution failed");
                self.push(TerminalLine::error(EXECUTION_FAILED_MESSAGE));
            }
        }
    }

    fn push(&mut self, line: TerminalLine) {
        self.lines.push(line);
    }
}

fn split_first_token(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest),
        None => (line, ""),
    }
}

fn parent_of(path: &str) -> String {
    let components: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    if components.len() > 1 {
        format!("/{}", components[..components.len() - 1].join("/"))
    } else {
        "/".to_owned()
    }
}
