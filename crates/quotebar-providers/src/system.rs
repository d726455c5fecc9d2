//! Local system metrics.

use async_trait::async_trait;
use parking_lot::Mutex;
use quotebar_core::error::FetchError;
use quotebar_core::traits::Provider;
use quotebar_core::types::QuoteRecord;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Disks, System};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Supported metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metric {
    Cpu,
    Memory,
    Disk,
    Load,
    Uptime,
}

impl Metric {
    fn parse(id: &str) -> Option<Self> {
        match id.to_lowercase().as_str() {
            "cpu" => Some(Metric::Cpu),
            "memory" | "mem" => Some(Metric::Memory),
            "disk" => Some(Metric::Disk),
            "load" => Some(Metric::Load),
            "uptime" => Some(Metric::Uptime),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Metric::Cpu => "CPU",
            Metric::Memory => "Memory",
            Metric::Disk => "Disk",
            Metric::Load => "Load",
            Metric::Uptime => "Uptime",
        }
    }
}

struct Sampler {
    system: System,
    cpu_primed: bool,
}

/// Provider for CPU, memory, disk, load and uptime readings.
///
/// Sampling is synchronous, so it runs on the blocking pool.
pub struct SystemProvider {
    sampler: Arc<Mutex<Sampler>>,
}

impl SystemProvider {
    pub fn new() -> Self {
        Self {
            sampler: Arc::new(Mutex::new(Sampler {
                system: System::new(),
                cpu_primed: false,
            })),
        }
    }
}

impl Default for SystemProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn percent(used: f64, total: f64) -> f64 {
    if total > 0.0 {
        used / total * 100.0
    } else {
        0.0
    }
}

fn sample(sampler: &Mutex<Sampler>, id: &str, metric: Metric) -> Result<QuoteRecord, FetchError> {
    let record = match metric {
        Metric::Cpu => {
            let mut guard = sampler.lock();
            guard.system.refresh_cpu_usage();
            // Usage is a delta between two refreshes
            if !guard.cpu_primed {
                std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
                guard.system.refresh_cpu_usage();
                guard.cpu_primed = true;
            }
            let usage = guard.system.global_cpu_usage() as f64;
            QuoteRecord::new(id, metric.label(), usage, 0.0).with_unit("%")
        }
        Metric::Memory => {
            let mut guard = sampler.lock();
            guard.system.refresh_memory();
            let used = guard.system.used_memory() as f64;
            let total = guard.system.total_memory() as f64;
            QuoteRecord::new(id, metric.label(), percent(used, total), 0.0)
                .with_unit("%")
                .with_detail(format!("{:.1} / {:.1} GB", used / GIB, total / GIB))
        }
        Metric::Disk => {
            let disks = Disks::new_with_refreshed_list();
            let disk = disks
                .iter()
                .find(|d| d.mount_point() == std::path::Path::new("/"))
                .or_else(|| disks.iter().next())
                .ok_or_else(|| FetchError::NotFound("no mounted disk".to_string()))?;
            let total = disk.total_space() as f64;
            let used = total - disk.available_space() as f64;
            QuoteRecord::new(id, metric.label(), percent(used, total), 0.0)
                .with_unit("%")
                .with_detail(format!("{:.1} / {:.1} GB", used / GIB, total / GIB))
        }
        Metric::Load => {
            let load = System::load_average();
            QuoteRecord::new(id, metric.label(), load.one, 0.0).with_detail(format!(
                "{:.2} {:.2} {:.2}",
                load.one, load.five, load.fifteen
            ))
        }
        Metric::Uptime => {
            let secs = System::uptime();
            let hours = secs as f64 / 3600.0;
            QuoteRecord::new(id, metric.label(), hours, 0.0)
                .with_unit("h")
                .with_detail(format!("{}d {}h", secs / 86_400, (secs % 86_400) / 3600))
        }
    };
    Ok(record)
}

#[async_trait]
impl Provider for SystemProvider {
    async fn fetch(&self, instrument_id: &str, timeout: Duration) -> Result<QuoteRecord, FetchError> {
        let metric = Metric::parse(instrument_id)
            .ok_or_else(|| FetchError::NotFound(instrument_id.to_string()))?;
        let sampler = Arc::clone(&self.sampler);
        let id = instrument_id.to_string();

        let task = tokio::task::spawn_blocking(move || sample(&sampler, &id, metric));
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(FetchError::Network(format!("sampler task failed: {}", e))),
            Err(_) => Err(FetchError::Timeout(timeout)),
        }
    }

    fn name(&self) -> &str {
        "system"
    }

    fn description(&self) -> &str {
        "Local CPU, memory, disk, load and uptime"
    }

    fn examples(&self) -> &[&'static str] {
        &["cpu", "memory", "disk", "load", "uptime"]
    }
}
