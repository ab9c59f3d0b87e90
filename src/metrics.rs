//! Snapshot builder on top of sysinfo. Every call re-samples live state;
//! unavailable fields degrade to documented defaults instead of failing.

use crate::state::SharedSystem;
use crate::types::{now_millis, CoreStats, CpuStats, MemoryStats, SystemStats};
use sysinfo::System;

/// One aggregate CPU reading.
pub async fn collect_cpu(shared: &SharedSystem) -> CpuStats {
    let mut sys = shared.lock().await;
    sys.refresh_cpu_usage();
    cpu_from(&sys)
}

/// One memory reading.
pub async fn collect_memory(shared: &SharedSystem) -> MemoryStats {
    let mut sys = shared.lock().await;
    sys.refresh_memory();
    memory_from(&sys)
}

/// One per-core reading, ordered by logical CPU index.
pub async fn collect_cores(shared: &SharedSystem) -> Vec<CoreStats> {
    let mut sys = shared.lock().await;
    sys.refresh_cpu_usage();
    cores_from(&sys)
}

/// Full snapshot under a single lock/refresh, stamped when all reads are done.
pub async fn collect_stats(shared: &SharedSystem) -> SystemStats {
    let mut sys = shared.lock().await;
    sys.refresh_cpu_usage();
    sys.refresh_memory();
    let cpu = cpu_from(&sys);
    let memory = memory_from(&sys);
    let cores = cores_from(&sys);
    SystemStats {
        cpu,
        memory,
        cores,
        timestamp: now_millis(),
    }
}

fn cpu_from(sys: &System) -> CpuStats {
    let freqs: Vec<f32> = sys.cpus().iter().map(|c| c.frequency() as f32).collect();
    CpuStats {
        overall: sys.global_cpu_usage(),
        temperature: None,
        average_frequency: average(&freqs),
    }
}

fn cores_from(sys: &System) -> Vec<CoreStats> {
    let usages: Vec<f32> = sys.cpus().iter().map(|c| c.cpu_usage()).collect();
    let freqs: Vec<f32> = sys.cpus().iter().map(|c| c.frequency() as f32).collect();
    build_cores(&usages, &freqs)
}

/// Pair usage with frequency by index. Some sources report fewer frequency
/// entries than cores; those trailing cores read 0.0.
fn build_cores(usages: &[f32], freqs: &[f32]) -> Vec<CoreStats> {
    usages
        .iter()
        .enumerate()
        .map(|(i, &usage)| CoreStats {
            core_id: i,
            usage,
            frequency: freqs.get(i).copied().unwrap_or(0.0),
        })
        .collect()
}

fn memory_from(sys: &System) -> MemoryStats {
    let (cache, buffers) = cache_and_buffers();
    build_memory(
        sys.total_memory(),
        sys.used_memory(),
        sys.available_memory(),
        cache,
        buffers,
    )
}

fn build_memory(total: u64, used: u64, available: u64, cache: u64, buffers: u64) -> MemoryStats {
    let usage_percent = if total == 0 {
        0.0
    } else {
        (used as f32 / total as f32 * 100.0).clamp(0.0, 100.0)
    };
    MemoryStats {
        total,
        used,
        available,
        cache,
        buffers,
        usage_percent,
    }
}

fn average(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

// sysinfo does not expose cache/buffer pages; read them from /proc on Linux.
#[cfg(target_os = "linux")]
fn cache_and_buffers() -> (u64, u64) {
    match std::fs::read_to_string("/proc/meminfo") {
        Ok(s) => parse_meminfo(&s),
        Err(_) => (0, 0),
    }
}

#[cfg(not(target_os = "linux"))]
fn cache_and_buffers() -> (u64, u64) {
    (0, 0)
}

/// Extract `Cached:` and `Buffers:` (reported in kB) as bytes.
#[cfg(target_os = "linux")]
fn parse_meminfo(s: &str) -> (u64, u64) {
    let mut cache = 0u64;
    let mut buffers = 0u64;
    for line in s.lines() {
        let kb = |l: &str| {
            l.split_whitespace()
                .nth(1)
                .and_then(|v| v.parse::<u64>().ok())
                .map(|v| v * 1024)
        };
        if line.starts_with("Cached:") {
            cache = kb(line).unwrap_or(0);
        } else if line.starts_with("Buffers:") {
            buffers = kb(line).unwrap_or(0);
        }
    }
    (cache, buffers)
}
