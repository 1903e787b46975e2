//! Wire format for forwarded lines:
//! `<PRI>Mon DD HH:MM:SS HOSTNAME APPNAME: MESSAGE\n`.
use chrono::{DateTime, Local};

use crate::config::RecordConfig;

#[derive(Debug, Clone)]
pub struct RecordFormatter {
    priority: u8,
    hostname: String,
    app_name: String,
    max_message_bytes: usize,
}

impl RecordFormatter {
    pub fn new(cfg: &RecordConfig) -> Self {
        let hostname = cfg
            .hostname
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(local_hostname);
        Self {
            priority: priority(cfg.facility, cfg.severity),
            hostname,
            app_name: cfg.app_name.clone(),
            max_message_bytes: cfg.max_message_bytes,
        }
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn format(&self, message: &str) -> Vec<u8> {
        self.format_at(message, Local::now())
    }

    pub fn format_at(&self, message: &str, at: DateTime<Local>) -> Vec<u8> {
        format!(
            "<{}>{} {} {}: {}\n",
            self.priority,
            at.format("%b %d %H:%M:%S"),
            self.hostname,
            self.app_name,
            truncate_utf8(message, self.max_message_bytes)
        )
        .into_bytes()
    }
}

pub fn priority(facility: u8, severity: u8) -> u8 {
    facility * 8 + severity
}

fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(unix)]
fn local_hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(not(unix))]
fn local_hostname() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn formatter(max: usize) -> RecordFormatter {
        RecordFormatter::new(&RecordConfig {
            hostname: Some("box01".to_string()),
            max_message_bytes: max,
            ..RecordConfig::default()
        })
    }

    #[test]
    fn user_info_priority_is_14() {
        assert_eq!(priority(1, 6), 14);
        assert_eq!(formatter(1024).priority(), 14);
    }

    #[test]
    fn formats_header_and_message() {
        let at = Local.with_ymd_and_hms(2024, 10, 1, 22, 0, 5).unwrap();
        let bytes = formatter(1024).format_at("hello", at);
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "<14>Oct 01 22:00:05 box01 my_app: hello\n"
        );
    }

    #[test]
    fn truncates_on_char_boundary() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 8, 7, 6).unwrap();
        // "é" is two bytes; a 4-byte budget cannot split it.
        let bytes = formatter(4).format_at("abcé", at);
        assert!(String::from_utf8(bytes).unwrap().ends_with("my_app: abc\n"));
    }

    #[test]
    fn falls_back_to_local_hostname() {
        let f = RecordFormatter::new(&RecordConfig {
            hostname: Some("   ".to_string()),
            ..RecordConfig::default()
        });
        assert!(!f.hostname.is_empty());
    }
}
