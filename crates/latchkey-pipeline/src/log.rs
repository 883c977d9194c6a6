use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: now_timestamp(),
            level,
            message: message.into(),
        }
    }
}

/// Append-only run log, one per driver instance. Cleared only by an
/// explicit caller request.
#[derive(Debug, Default)]
pub struct LogBuffer {
    entries: Vec<LogEntry>,
}

impl LogBuffer {
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.clone()
    }
}

fn now_timestamp() -> String {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let day_seconds = since_epoch.as_secs() % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        day_seconds / 3_600,
        (day_seconds % 3_600) / 60,
        day_seconds % 60
    )
}

#[cfg(test)]
mod tests {
    use super::{LogBuffer, LogEntry, LogLevel};

    #[test]
    fn buffer_appends_in_order_and_clears_on_request() {
        let mut buffer = LogBuffer::default();
        buffer.push(LogEntry::new(LogLevel::Info, "first"));
        buffer.push(LogEntry::new(LogLevel::Error, "second"));

        let messages: Vec<&str> = buffer
            .entries()
            .iter()
            .map(|entry| entry.message.as_str())
            .collect();
        assert_eq!(messages, vec!["first", "second"]);

        buffer.clear();
        assert!(buffer.entries().is_empty());
    }

    #[test]
    fn entry_timestamp_is_wall_clock_shaped() {
        let entry = LogEntry::new(LogLevel::Info, "tick");
        assert_eq!(entry.timestamp.len(), 8);
        assert_eq!(entry.timestamp.as_bytes()[2], b':');
        assert_eq!(entry.timestamp.as_bytes()[5], b':');
    }
}
