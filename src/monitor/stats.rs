// Process raw Docker stats API response into a ProcStatus sample.

use crate::models::ProcStatus;
use bollard::models::ContainerStatsResponse;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Process a raw Docker stats response for a running container.
pub(crate) fn process_statistics(s: &ContainerStatsResponse) -> Option<ProcStatus> {
    let cpu_stats = s.cpu_stats.as_ref()?;
    let precpu_stats = s.precpu_stats.as_ref()?;

    let cpu_usage = cpu_stats.cpu_usage.as_ref()?;
    let precpu_usage = precpu_stats.cpu_usage.as_ref()?;

    let cpu_delta =
        cpu_usage.total_usage.unwrap_or(0) as i64 - precpu_usage.total_usage.unwrap_or(0) as i64;
    let system_delta = cpu_stats.system_cpu_usage.unwrap_or(0) as i64
        - precpu_stats.system_cpu_usage.unwrap_or(0) as i64;
    let online = cpu_stats.online_cpus.unwrap_or(1) as f64;
    let cpu_percent = if system_delta > 0 && online > 0.0 {
        (cpu_delta as f64 / system_delta as f64) * online * 100.0
    } else {
        0.0
    };

    let mem_usage = s.memory_stats.as_ref().and_then(|m| m.usage).unwrap_or(0);
    let mem_limit = s.memory_stats.as_ref().and_then(|m| m.limit).unwrap_or(0);
    let mem_percent = if mem_limit > 0 {
        mem_usage as f64 / mem_limit as f64 * 100.0
    } else {
        0.0
    };

    Some(ProcStatus {
        cpu_percent,
        mem_percent,
        mem_mb: mem_usage as f64 / BYTES_PER_MB,
        running: true,
        disk_mb: None,
    })
}
