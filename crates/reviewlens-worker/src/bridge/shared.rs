//! Process-wide bridge accessor.
//!
//! The bridge is an ordinary value; this slot only exists so independent
//! callers in one process reach the same worker. Tests construct their own
//! bridges instead.

use std::sync::{LazyLock, Mutex};

use super::{WorkerBridge, lock};

static SHARED_BRIDGE: LazyLock<Mutex<Option<WorkerBridge>>> = LazyLock::new(|| Mutex::new(None));

/// The shared bridge, created with `init` on first use.
pub fn shared_bridge(init: impl FnOnce() -> WorkerBridge) -> WorkerBridge {
    lock(&SHARED_BRIDGE).get_or_insert_with(init).clone()
}

/// Stop and forget the shared bridge. The next `shared_bridge` call creates
/// a new one.
pub async fn reset_shared_bridge() {
    let bridge = lock(&SHARED_BRIDGE).take();
    if let Some(bridge) = bridge {
        bridge.stop().await;
    }
}
