// Shell command IP source.

use wlm_core::config::IpSourceConfig;
use wlm_core::traits::{IpSource, IpSourceFactory, parse_reported_ip};
use wlm_core::{Error, Result};

use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Runs `sh -c <cmd>` and parses its trimmed stdout as an IP
pub struct CommandIpSource {
    cmd: String,
    timeout: Duration,
}

impl CommandIpSource {
    pub fn new(cmd: impl Into<String>, timeout: Duration) -> Self {
        Self {
            cmd: cmd.into(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl IpSource for CommandIpSource {
    async fn current(&self) -> Result<IpAddr> {
        // The child is killed if the timeout drops the future
        let child = Command::new("sh")
            .arg("-c")
            .arg(&self.cmd)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                Error::ip_source(format!(
                    "command {:?} timed out after {:?}",
                    self.cmd, self.timeout
                ))
            })?
            .map_err(|e| Error::ip_source(format!("failed to run {:?}: {}", self.cmd, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ip_source(format!(
                "command {:?} exited with {}: {}",
                self.cmd,
                output.status,
                stderr.trim()
            )));
        }

        let ip = parse_reported_ip(&String::from_utf8_lossy(&output.stdout))?;
        tracing::debug!("command {:?} reported {}", self.cmd, ip);
        Ok(ip)
    }

    fn describe(&self) -> String {
        format!("command {:?}", self.cmd)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Factory for creating command IP sources
pub struct CommandFactory;

impl IpSourceFactory for CommandFactory {
    fn create(&self, config: &IpSourceConfig) -> Result<Box<dyn IpSource>> {
        match config {
            IpSourceConfig::Command { cmd, .. } => {
                Ok(Box::new(CommandIpSource::new(cmd.clone(), config.timeout())))
            }
            _ => Err(Error::config("Invalid config for command IP source")),
        }
    }
}
