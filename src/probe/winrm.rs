use std::process::Stdio;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::models::config::WinrmConfig;
use crate::probe::scripts;
use crate::probe::{ProbeResult, RemoteProbe};

/// JSON envelope printed by the WinRM helper.
#[derive(Debug, Deserialize)]
struct HelperEnvelope {
    success: bool,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
}

/// Probe implementation that shells out to an external WinRM helper:
/// `<helper> <host> <user> <password> <script>`. WinRM works from Linux
/// hosts against Windows machines, which is why the transport lives in a
/// separate program instead of this process.
pub struct WinRmProbe {
    cfg: WinrmConfig,
}

impl WinRmProbe {
    pub fn new(cfg: WinrmConfig) -> Self {
        Self { cfg }
    }

    /// Runs one script through the helper. A spawn failure is a transport
    /// fault and becomes `Err`; everything else (timeout, helper crash,
    /// remote failure) resolves to a failed `ProbeResult` so bulk tasks can
    /// keep going.
    async fn execute(&self, host: &str, script: &str) -> Result<ProbeResult> {
        let start = Instant::now();
        debug!("Executing PowerShell on {} via WinRM", host);

        let child = Command::new(&self.cfg.helper)
            .arg(host)
            .arg(&self.cfg.user)
            .arg(&self.cfg.password)
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning WinRM helper '{}'", self.cfg.helper))?;

        let output = match timeout(self.cfg.connect_timeout, child.wait_with_output()).await {
            Ok(result) => result.context("collecting WinRM helper output")?,
            Err(_) => {
                let duration_ms = start.elapsed().as_millis() as i64;
                error!(
                    "❌ WinRM helper timed out on {} after {:?}",
                    host, self.cfg.connect_timeout
                );
                return Ok(ProbeResult::failed(
                    format!("Command timed out after {:?}", self.cfg.connect_timeout),
                    duration_ms,
                ));
            }
        };

        let duration_ms = start.elapsed().as_millis() as i64;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() || stdout.trim().is_empty() {
            error!("❌ WinRM helper execution failed on {}: {}", host, stderr.trim());
            let message = if stderr.trim().is_empty() {
                "WinRM helper execution failed".to_string()
            } else {
                stderr.trim().to_string()
            };
            return Ok(ProbeResult::failed(message, duration_ms));
        }

        match serde_json::from_str::<HelperEnvelope>(stdout.trim()) {
            Ok(envelope) if envelope.success => {
                info!("✅ PowerShell execution successful on {} ({duration_ms}ms)", host);
                Ok(ProbeResult::ok(envelope.stdout.trim(), duration_ms))
            }
            Ok(envelope) => {
                error!(
                    "❌ PowerShell execution failed on {}: {}",
                    host,
                    envelope.stderr.trim()
                );
                Ok(ProbeResult {
                    success: false,
                    output: envelope.stdout.trim().to_string(),
                    error: Some(envelope.stderr.trim().to_string()),
                    duration_ms,
                })
            }
            Err(e) => {
                error!("❌ Failed to parse WinRM helper output on {}: {e}", host);
                Ok(ProbeResult::failed(
                    format!("Failed to parse helper output: {e}"),
                    duration_ms,
                ))
            }
        }
    }
}

#[async_trait]
impl RemoteProbe for WinRmProbe {
    async fn ping(&self, host: &str) -> Result<ProbeResult> {
        self.execute(host, &scripts::ping_script()).await
    }

    async fn registry_value(
        &self,
        host: &str,
        registry_path: &str,
        value_name: Option<&str>,
    ) -> Result<ProbeResult> {
        let script = scripts::registry_value_script(registry_path, value_name);
        self.execute(host, &script).await
    }

    async fn file_info(&self, host: &str, file_path: &str) -> Result<ProbeResult> {
        self.execute(host, &scripts::file_info_script(file_path)).await
    }

    async fn service_info(
        &self,
        host: &str,
        service_name: Option<&str>,
        executable_path: Option<&str>,
    ) -> Result<ProbeResult> {
        let script = scripts::service_info_script(service_name, executable_path);
        self.execute(host, &script).await
    }

    async fn current_user(&self, host: &str) -> Result<ProbeResult> {
        self.execute(host, &scripts::current_user_script()).await
    }

    async fn last_logged_on_user(&self, host: &str) -> Result<ProbeResult> {
        self.execute(host, &scripts::last_user_script()).await
    }

    async fn system_info(&self, host: &str) -> Result<ProbeResult> {
        self.execute(host, &scripts::system_info_script()).await
    }

    async fn run_script(&self, host: &str, script: &str) -> Result<ProbeResult> {
        self.execute(host, script).await
    }
}
