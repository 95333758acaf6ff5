//! Typed fan-out of bridge events.
//!
//! Delivery semantics:
//! - `Ready`: at most once per spawned worker process
//! - `Progress`: every structured or parsed progress message, including
//!   asset-level (`subtype`) progress and phase completion
//! - `PhaseProgress`: phase progress only (no subtype, not 100, phase context set)
//! - `Info` / `Error`: worker notices and classified diagnostic lines
//! - `Closed`: once per worker exit that was not initiated by the bridge
//!
//! Subscribers that fall behind lose the oldest events (broadcast semantics).

use reviewlens_core::{PhaseContext, ProgressEvent};
use tokio::sync::broadcast;
use tracing::trace;

/// Broadcast channel capacity for bridge events.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    Ready,
    Progress(ProgressEvent),
    PhaseProgress(ProgressEvent),
    Info(String),
    Error(String),
    Closed { code: Option<i32> },
}

/// Sender side of the bridge's event channel.
#[derive(Debug, Clone)]
pub(crate) struct EventHub {
    sender: broadcast::Sender<BridgeEvent>,
}

impl EventHub {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub(crate) fn emit(&self, event: BridgeEvent) {
        if self.sender.receiver_count() > 0 {
            trace!(?event, "Broadcasting bridge event");
            let _ = self.sender.send(event);
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.sender.subscribe()
    }
}

/// Events produced by one progress message.
///
/// The generic channel always receives the event. Phase progress is emitted
/// only for subtype-less events below 100 while a phase context is set;
/// completion is signalled by the command response instead.
pub(crate) fn route_progress(
    event: ProgressEvent,
    context: Option<&PhaseContext>,
) -> Vec<BridgeEvent> {
    let phase = match context {
        Some(ctx) if event.subtype.is_none() && !event.is_phase_completion() => {
            Some(BridgeEvent::PhaseProgress(event.clone().with_context(ctx)))
        }
        _ => None,
    };

    let mut out = vec![BridgeEvent::Progress(event)];
    out.extend(phase);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(value: i32, subtype: Option<&str>) -> ProgressEvent {
        ProgressEvent {
            phase: None,
            phase_name: None,
            progress: value,
            message: None,
            subtype: subtype.map(str::to_string),
            model: None,
        }
    }

    fn ctx() -> PhaseContext {
        PhaseContext::new(3, "Sentiment Analysis")
    }

    #[test]
    fn test_phase_progress_gets_context() {
        let events = route_progress(progress(40, None), Some(&ctx()));
        assert_eq!(events.len(), 2);
        let BridgeEvent::PhaseProgress(event) = &events[1] else {
            panic!("expected phase progress");
        };
        assert_eq!(event.phase, Some(3));
        assert_eq!(event.phase_name.as_deref(), Some("Sentiment Analysis"));
    }

    #[test]
    fn test_hundred_percent_not_broadcast_as_phase_progress() {
        let events = route_progress(progress(100, None), Some(&ctx()));
        assert_eq!(events, vec![BridgeEvent::Progress(progress(100, None))]);
    }

    #[test]
    fn test_subtype_stays_on_generic_channel() {
        let events = route_progress(progress(30, Some("model_download")), Some(&ctx()));
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], BridgeEvent::Progress(_)));
    }

    #[test]
    fn test_no_context_no_phase_progress() {
        let events = route_progress(progress(30, None), None);
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_hub_delivers_to_subscribers() {
        let hub = EventHub::new();
        let mut rx = hub.subscribe();
        hub.emit(BridgeEvent::Info("hello".into()));
        assert_eq!(rx.recv().await.unwrap(), BridgeEvent::Info("hello".into()));
    }
}
