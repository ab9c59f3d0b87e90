//! Data types sent to clients over HTTP and WebSocket.
//! Keep this module minimal and stable — it defines the wire format.

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Serialize, Clone)]
pub struct CpuStats {
    /// Aggregate usage across all cores, 0-100%.
    pub overall: f32,
    /// Celsius. No sensor backend is wired on this platform, so always null.
    pub temperature: Option<f32>,
    #[serde(rename = "averageFrequency")]
    pub average_frequency: f32, // MHz
}

#[derive(Debug, Serialize, Clone)]
pub struct CoreStats {
    /// Stable 0-based index in enumeration order of the metrics source.
    #[serde(rename = "coreId")]
    pub core_id: usize,
    pub usage: f32,     // 0-100%
    pub frequency: f32, // MHz, 0.0 when unavailable
}

#[derive(Debug, Serialize, Clone)]
pub struct MemoryStats {
    pub total: u64, // bytes
    pub used: u64,
    pub available: u64,
    /// Page cache / buffer bytes; 0 when the platform does not expose them.
    pub cache: u64,
    pub buffers: u64,
    #[serde(rename = "usagePercent")]
    pub usage_percent: f32, // 0-100%
}

#[derive(Debug, Serialize, Clone)]
pub struct SystemStats {
    pub cpu: CpuStats,
    pub memory: MemoryStats,
    pub cores: Vec<CoreStats>,
    /// Epoch milliseconds at capture completion.
    pub timestamp: u64,
}

/// Server→client stream envelope. Exactly two shapes:
/// `{"type":"stats",...,"data":{...}}` and `{"type":"heartbeat",...,"data":null}`.
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamMessage {
    Stats { timestamp: u64, data: SystemStats },
    Heartbeat { timestamp: u64, data: Option<()> },
}

impl StreamMessage {
    pub fn stats(data: SystemStats) -> Self {
        StreamMessage::Stats {
            timestamp: data.timestamp,
            data,
        }
    }

    pub fn heartbeat() -> Self {
        StreamMessage::Heartbeat {
            timestamp: now_millis(),
            data: None,
        }
    }
}

/// Epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
