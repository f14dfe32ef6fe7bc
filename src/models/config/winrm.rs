use serde::Deserialize;
use std::time::Duration;

/// Credentials and transport settings for probing Windows hosts.
///
/// This section is loaded from `[winrm]` in `config.toml`. The helper is an
/// external program invoked as `<helper> <host> <user> <password> <script>`
/// that prints a JSON `{success, stdout, stderr}` envelope.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WinrmConfig {
    pub user: String,
    pub password: String,
    /// Helper executable; resolved via PATH when not absolute.
    pub helper: String,
    /// Upper bound for one probe round-trip, enforced on the helper process.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for WinrmConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: String::new(),
            helper: "winrm-exec".to_string(),
            connect_timeout: Duration::from_secs(30),
        }
    }
}
