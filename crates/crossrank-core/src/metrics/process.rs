use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::debug;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Resident and virtual memory of this process, in MiB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MemoryUsage {
    pub rss_mb: f64,
    pub vms_mb: f64,
}

/// Point-in-time resource usage of this process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProcessUsage {
    pub memory: MemoryUsage,
    /// Percent of one core since the previous sample (0 on the first one).
    pub cpu_percent: f32,
    pub num_threads: usize,
}

/// Samples this process through `sysinfo`.
///
/// CPU usage is a delta between refreshes, so the sampler keeps its `System`
/// between calls.
pub(crate) struct ProcessSampler {
    system: System,
    pid: Option<Pid>,
}

impl ProcessSampler {
    pub(crate) fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                debug!(error = e, "Process sampling unavailable on this platform");
                None
            }
        };

        Self {
            system: System::new(),
            pid,
        }
    }

    pub(crate) fn sample(&mut self) -> ProcessUsage {
        let Some(pid) = self.pid else {
            return ProcessUsage::default();
        };

        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing()
                .with_cpu()
                .with_memory()
                .with_tasks(),
        );

        let Some(process) = self.system.process(pid) else {
            return ProcessUsage::default();
        };

        ProcessUsage {
            memory: MemoryUsage {
                rss_mb: round2(process.memory() as f64 / BYTES_PER_MB),
                vms_mb: round2(process.virtual_memory() as f64 / BYTES_PER_MB),
            },
            cpu_percent: process.cpu_usage(),
            // Platforms without per-task data report the main thread only.
            num_threads: process.tasks().map_or(1, |tasks| tasks.len().max(1)),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
