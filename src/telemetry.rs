//! Host telemetry snapshots.
//!
//! The snapshot is a short human-readable text block that is shown to the
//! operator and embedded verbatim in every prompt:
//!
//! ```text
//! CPU Usage: 12.3%
//! Memory Usage: 45.6%
//! GPU Info: NVIDIA RTX 4090 37.0% (61°C)
//! OS: Linux 6.8.0 (24.04)
//! ```

use async_trait::async_trait;
use sysinfo::System;
use tracing::{debug, warn};

/// Source of the telemetry text block.
#[async_trait]
pub trait Telemetry: Send + Sync {
    async fn snapshot(&self) -> String;
}

/// One GPU as reported by `nvidia-smi`.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuReading {
    pub name: String,
    pub utilization: f32,
    pub temperature: f32,
}

/// Raw values that make up a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct HostReading {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub gpus: Vec<GpuReading>,
    pub os: String,
}

/// Telemetry for the machine the console runs on.
#[derive(Debug, Clone, Default)]
pub struct HostTelemetry;

impl HostTelemetry {
    pub fn new() -> Self {
        Self
    }

    /// Blocking sample. CPU usage needs two refreshes spaced by the minimum
    /// update interval.
    pub fn sample() -> HostReading {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let memory_percent = match sys.total_memory() {
            0 => 0.0,
            total => (sys.used_memory() as f64 / total as f64 * 100.0) as f32,
        };

        HostReading {
            cpu_percent: sys.global_cpu_usage(),
            memory_percent,
            gpus: query_gpus(),
            os: os_description(),
        }
    }
}

#[async_trait]
impl Telemetry for HostTelemetry {
    async fn snapshot(&self) -> String {
        match tokio::task::spawn_blocking(Self::sample).await {
            Ok(reading) => format_snapshot(&reading),
            Err(e) => {
                warn!("Telemetry sampling task failed: {}", e);
                format_snapshot(&HostReading {
                    cpu_percent: 0.0,
                    memory_percent: 0.0,
                    gpus: Vec::new(),
                    os: os_description(),
                })
            }
        }
    }
}

fn os_description() -> String {
    let name = System::name().unwrap_or_else(|| std::env::consts::OS.to_string());
    let kernel = System::kernel_version().unwrap_or_default();
    let version = System::os_version().unwrap_or_default();
    format!("{name} {kernel} ({version})")
}

/// Ask `nvidia-smi` for per-GPU load and temperature. Absent tool or failure
/// means no GPUs.
fn query_gpus() -> Vec<GpuReading> {
    let output = std::process::Command::new("nvidia-smi")
        .args([
            "--query-gpu=name,utilization.gpu,temperature.gpu",
            "--format=csv,noheader,nounits",
        ])
        .output();

    match output {
        Ok(out) if out.status.success() => parse_nvidia_smi(&String::from_utf8_lossy(&out.stdout)),
        Ok(out) => {
            debug!(status = ?out.status.code(), "nvidia-smi exited unsuccessfully");
            Vec::new()
        }
        Err(e) => {
            debug!("nvidia-smi unavailable: {}", e);
            Vec::new()
        }
    }
}

/// Parse `name, utilization, temperature` CSV rows. Malformed rows are skipped.
pub fn parse_nvidia_smi(csv: &str) -> Vec<GpuReading> {
    csv.lines()
        .filter_map(|line| {
            let mut fields = line.rsplitn(3, ',').map(str::trim);
            let temperature = fields.next()?.parse().ok()?;
            let utilization = fields.next()?.parse().ok()?;
            let name = fields.next()?.to_string();
            if name.is_empty() {
                return None;
            }
            Some(GpuReading {
                name,
                utilization,
                temperature,
            })
        })
        .collect()
}

pub fn format_snapshot(reading: &HostReading) -> String {
    let gpu_info = if reading.gpus.is_empty() {
        "No GPU detected".to_string()
    } else {
        reading
            .gpus
            .iter()
            .map(|g| format!("{} {:.1}% ({}°C)", g.name, g.utilization, g.temperature))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    format!(
        "CPU Usage: {:.1}%\nMemory Usage: {:.1}%\nGPU Info: {}\nOS: {}",
        reading.cpu_percent, reading.memory_percent, gpu_info, reading.os
    )
}
