//! Correlation table of in-flight worker calls.

use std::collections::BTreeMap;

use tokio::sync::oneshot;

use crate::error::BridgeError;
use crate::protocol::WorkerResponse;

pub(crate) type Reply = oneshot::Sender<Result<WorkerResponse, BridgeError>>;

pub(crate) struct PendingCall {
    pub(crate) action: String,
    pub(crate) reply: Reply,
}

/// Outstanding calls keyed by a monotonically increasing call id.
///
/// Every id is inserted once and removed at most once: by a matching
/// response, by its caller giving up (timeout or write failure), or by a
/// bulk drain on teardown.
#[derive(Default)]
pub(crate) struct PendingTable {
    last_id: u64,
    calls: BTreeMap<u64, PendingCall>,
}

impl PendingTable {
    pub(crate) fn register(
        &mut self,
        action: &str,
    ) -> (u64, oneshot::Receiver<Result<WorkerResponse, BridgeError>>) {
        self.last_id += 1;
        let call_id = self.last_id;
        let (reply, rx) = oneshot::channel();
        self.calls.insert(
            call_id,
            PendingCall {
                action: action.to_string(),
                reply,
            },
        );
        (call_id, rx)
    }

    pub(crate) fn remove(&mut self, call_id: u64) -> Option<PendingCall> {
        self.calls.remove(&call_id)
    }

    /// The call a response belongs to.
    ///
    /// A correlation id selects exactly that call (or nothing, if it already
    /// completed). Without one, the oldest outstanding call is chosen.
    pub(crate) fn take_for(&mut self, call_id: Option<u64>) -> Option<(u64, PendingCall)> {
        match call_id {
            Some(id) => self.calls.remove(&id).map(|call| (id, call)),
            None => self.calls.pop_first(),
        }
    }

    pub(crate) fn drain(&mut self) -> Vec<PendingCall> {
        std::mem::take(&mut self.calls).into_values().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.len()
    }
}
