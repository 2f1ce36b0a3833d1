//! The speedtest CLI and the record it prints.

use crate::{
    Error,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
use speedtest_gsheet_config::SpeedtestConfig;
use std::{
    path::PathBuf,
    process::Output,
    time::Duration,
};
use tokio::process::Command;

/// Source format of the `timestamp` field.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One result of `speedtest --format=json`. Fields the CLI emits beyond these are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub timestamp: String,
    pub isp: String,
    pub server: Server,
    pub ping: Ping,
    pub download: Transfer,
    pub upload: Transfer,
    pub interface: Interface,
    pub result: ResultLink,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub id: u64,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub location: String,
    pub country: String,
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    pub jitter: f64,
    pub latency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    /// Bytes per second.
    pub bandwidth: u64,
    pub bytes: u64,
    /// Milliseconds.
    pub elapsed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    pub internal_ip: String,
    pub name: String,
    pub mac_addr: String,
    pub is_vpn: bool,
    pub external_ip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultLink {
    pub id: String,
    pub url: String,
}

impl MeasurementRecord {
    pub fn from_json(output: &str) -> Result<Self> {
        serde_json::from_str(output.trim()).map_err(Error::Parse)
    }
}

impl Transfer {
    /// Throughput in megabits per second.
    pub fn mbps(&self) -> f64 {
        self.bandwidth as f64 / 125_000.0
    }
}

/// Format a throughput so that whole numbers keep one decimal (`100.0`) and fractions keep
/// their full precision.
pub fn format_mbps(mbps: f64) -> String {
    if mbps.fract() == 0.0 {
        format!("{mbps:.1}")
    } else {
        format!("{mbps}")
    }
}

/// Runs the speedtest executable.
#[derive(Debug, Clone)]
pub struct SpeedtestCli {
    binary: PathBuf,
    license_marker: PathBuf,
    timeout: Duration,
}

impl SpeedtestCli {
    pub fn new(config: &SpeedtestConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            license_marker: config.license_marker.clone(),
            timeout: config.timeout,
        }
    }

    /// Resolve the executable so that a missing CLI is reported at startup instead of on the
    /// first scheduled run.
    pub fn locate(&self) -> Result<PathBuf> {
        let path = which::which(&self.binary).map_err(|err| Error::Invocation {
            command: self.binary.display().to_string(),
            reason: err.to_string(),
        })?;
        debug!(?path, "found speedtest CLI at");
        Ok(path)
    }

    /// Accept the CLI license once per machine. The CLI writes its marker file after
    /// acceptance, so later starts skip the call. Returns whether the license was accepted now.
    pub async fn ensure_license_accepted(&self) -> Result<bool> {
        if self.license_marker.exists() {
            info!(marker = %self.license_marker.display(), "OOKLA Speedtest.net EULA file found, proceeding...");
            return Ok(false);
        }

        info!("OOKLA Speedtest.net EULA file *NOT* found, automatically accepting EULA...");
        let output = self.run(&["--accept-license".to_string()]).await?;
        debug!("Accept EULA output: {}", String::from_utf8_lossy(&output.stdout).trim());
        if !output.stderr.is_empty() {
            error!("Accept EULA error: {}", String::from_utf8_lossy(&output.stderr).trim());
        }
        info!("OOKLA Speedtest.net EULA accepted!");
        Ok(true)
    }

    /// Run one measurement. An empty `server_id` lets the CLI pick the server.
    pub async fn measure(&self, server_id: &str) -> Result<MeasurementRecord> {
        let args = measure_args(server_id);
        let output = self.run(&args).await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("Command output: {}", stdout.trim());
        if !stderr.trim().is_empty() {
            error!("Command error: {}", stderr.trim());
        }

        if !output.status.success() && stdout.trim().is_empty() {
            return Err(Error::Invocation {
                command: self.command_line(&args),
                reason: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }

        MeasurementRecord::from_json(&stdout)
    }

    async fn run(&self, args: &[String]) -> Result<Output> {
        let command = self.command_line(args);
        debug!("Running command: [{command}]");

        let child = Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(err)) => Err(Error::Invocation {
                command,
                reason: err.to_string(),
            }),
            Err(_) => Err(Error::Timeout {
                command,
                after: self.timeout,
            }),
        }
    }

    fn command_line(&self, args: &[String]) -> String {
        std::iter::once(self.binary.display().to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn measure_args(server_id: &str) -> Vec<String> {
    let mut args = Vec::with_capacity(2);
    if !server_id.is_empty() {
        args.push(format!("--server-id={server_id}"));
    }
    args.push("--format=json".to_string());
    args
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"{
        "type": "result",
        "timestamp": "2024-01-01T00:00:00Z",
        "ping": {"jitter": 0.512, "latency": 8.937, "low": 8.1, "high": 9.9},
        "download": {"bandwidth": 12500000, "bytes": 150123456, "elapsed": 12008},
        "upload": {"bandwidth": 2345678, "bytes": 30123456, "elapsed": 11003},
        "packetLoss": 0,
        "isp": "Example Fiber",
        "interface": {
            "internalIp": "192.168.1.20",
            "name": "eth0",
            "macAddr": "AA:BB:CC:DD:EE:FF",
            "isVpn": false,
            "externalIp": "203.0.113.7"
        },
        "server": {
            "id": 12345,
            "host": "speedtest.example.net",
            "port": 8080,
            "name": "Example Networks",
            "location": "Berlin",
            "country": "Germany",
            "ip": "198.51.100.4"
        },
        "result": {
            "id": "0f6c1d2e-3a4b-5c6d-7e8f-9a0b1c2d3e4f",
            "url": "https://www.speedtest.net/result/c/0f6c1d2e-3a4b-5c6d-7e8f-9a0b1c2d3e4f",
            "persisted": true
        }
    }"#;

    pub(crate) fn sample() -> MeasurementRecord {
        MeasurementRecord::from_json(SAMPLE).unwrap()
    }

    #[test]
    fn parses_cli_output() {
        let record = sample();
        assert_eq!(record.timestamp, "2024-01-01T00:00:00Z");
        assert_eq!(record.server.id, 12345);
        assert_eq!(record.server.port, 8080);
        assert_eq!(record.download.bandwidth, 12500000);
        assert!(!record.interface.is_vpn);
        assert_eq!(record.interface.mac_addr, "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn malformed_output() {
        assert!(matches!(
            MeasurementRecord::from_json("[error] Configuration - Could not retrieve or read configuration"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn missing_field() {
        let mut value: serde_json::Value = serde_json::from_str(SAMPLE).unwrap();
        value["interface"].as_object_mut().unwrap().remove("externalIp");
        let err = MeasurementRecord::from_json(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("externalIp"), "{err}");
    }

    #[test]
    fn throughput() {
        let record = sample();
        assert_eq!(format_mbps(record.download.mbps()), "100.0");
        assert_eq!(format_mbps(record.upload.mbps()), "18.765424");
    }

    #[test]
    fn arguments() {
        assert_eq!(measure_args("1234"), ["--server-id=1234", "--format=json"]);
        assert_eq!(measure_args(""), ["--format=json"]);
    }

    fn cli(binary: PathBuf, marker: PathBuf, timeout: Duration) -> SpeedtestCli {
        SpeedtestCli::new(&SpeedtestConfig {
            binary,
            license_marker: marker,
            timeout,
        })
    }

    #[tokio::test]
    async fn missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let cli = cli(
            dir.path().join("no-such-speedtest"),
            dir.path().join("marker.json"),
            Duration::from_secs(5),
        );
        assert!(matches!(cli.measure("1").await, Err(Error::Invocation { .. })));
        assert!(matches!(cli.locate(), Err(Error::Invocation { .. })));
    }

    #[cfg(unix)]
    pub(crate) fn script(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt as _;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_cli_with_server_id() {
        let dir = tempfile::tempdir().unwrap();
        let args_file = dir.path().join("args");
        std::fs::write(dir.path().join("sample.json"), SAMPLE).unwrap();
        let binary = script(
            dir.path(),
            "speedtest",
            &format!(
                "echo \"$@\" > {}\ncat {}",
                args_file.display(),
                dir.path().join("sample.json").display()
            ),
        );

        let cli = cli(binary.clone(), dir.path().join("marker.json"), Duration::from_secs(5));
        assert_eq!(cli.locate().unwrap(), binary);
        let record = cli.measure("12345").await.unwrap();
        assert_eq!(record, sample());
        assert_eq!(
            std::fs::read_to_string(args_file).unwrap().trim(),
            "--server-id=12345 --format=json"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_cli() {
        let dir = tempfile::tempdir().unwrap();
        let binary = script(dir.path(), "speedtest", "echo 'Cannot open socket' >&2\nexit 2");
        let cli = cli(binary, dir.path().join("marker.json"), Duration::from_secs(5));
        match cli.measure("1").await {
            Err(Error::Invocation { reason, .. }) => assert!(reason.contains("Cannot open socket"), "{reason}"),
            other => panic!("expected invocation error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_cli_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let binary = script(dir.path(), "speedtest", "sleep 30");
        let cli = cli(binary, dir.path().join("marker.json"), Duration::from_millis(200));
        assert!(matches!(cli.measure("1").await, Err(Error::Timeout { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn accepts_license_once() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("speedtest-cli.json");
        let binary = script(
            dir.path(),
            "speedtest",
            &format!("[ \"$1\" = \"--accept-license\" ] && echo '{{}}' > {}", marker.display()),
        );

        let cli = cli(binary, marker.clone(), Duration::from_secs(5));
        assert!(cli.ensure_license_accepted().await.unwrap());
        assert!(marker.exists());
        assert!(!cli.ensure_license_accepted().await.unwrap());
    }
}
