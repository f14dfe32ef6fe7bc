//! Remote probe capability.
//!
//! One method per logical probe against a Windows host. `Ok` with
//! `success: false` means the remote side answered and reported failure;
//! `Err` is reserved for transport faults (the helper could not be run at
//! all). The executor treats the two very differently: remote failures
//! become FAILED result rows, transport faults abort the task and drive
//! queue retry.

pub mod scripts;
pub mod winrm;

pub use winrm::WinRmProbe;

use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub duration_ms: i64,
}

impl ProbeResult {
    pub fn ok(output: impl Into<String>, duration_ms: i64) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            duration_ms,
        }
    }

    pub fn failed(error: impl Into<String>, duration_ms: i64) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            duration_ms,
        }
    }
}

#[async_trait]
pub trait RemoteProbe: Send + Sync {
    async fn ping(&self, host: &str) -> Result<ProbeResult>;

    async fn registry_value(
        &self,
        host: &str,
        registry_path: &str,
        value_name: Option<&str>,
    ) -> Result<ProbeResult>;

    async fn file_info(&self, host: &str, file_path: &str) -> Result<ProbeResult>;

    async fn service_info(
        &self,
        host: &str,
        service_name: Option<&str>,
        executable_path: Option<&str>,
    ) -> Result<ProbeResult>;

    async fn current_user(&self, host: &str) -> Result<ProbeResult>;

    async fn last_logged_on_user(&self, host: &str) -> Result<ProbeResult>;

    async fn system_info(&self, host: &str) -> Result<ProbeResult>;

    async fn run_script(&self, host: &str, script: &str) -> Result<ProbeResult>;
}
