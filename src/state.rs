//! Shared agent state: the sysinfo handle and the stream broadcaster.

use std::sync::Arc;
use sysinfo::System;
use tokio::sync::Mutex;

use crate::broadcast::Broadcaster;

pub type SharedSystem = Arc<Mutex<System>>;

#[derive(Clone)]
pub struct AppState {
    pub sys: SharedSystem,
    pub broadcaster: Arc<Broadcaster>,
}
