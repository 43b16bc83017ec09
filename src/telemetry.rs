// =============================================================================
// Telemetry — fire-and-forget event fan-out. Out of core scope; this module
// only owns the publish boundary so the core never couples its correctness
// to telemetry liveness.
// =============================================================================

use tracing::debug;

use crate::types::TelemetryEvent;

/// Publish interface returns immediately; failures log at debug and are
/// otherwise invisible to the caller.
pub trait TelemetrySink: Send + Sync {
    fn publish(&self, event: TelemetryEvent);
}

/// Default sink when no transport is configured — drops every event.
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn publish(&self, event: TelemetryEvent) {
        debug!(?event, "telemetry sink not configured, dropping event");
    }
}

/// In-memory sink for tests: records every event it receives.
#[derive(Default)]
pub struct RecordingSink {
    pub events: parking_lot::Mutex<Vec<TelemetryEvent>>,
}

impl TelemetrySink for RecordingSink {
    fn publish(&self, event: TelemetryEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    #[test]
    fn recording_sink_captures_events() {
        let sink = RecordingSink::default();
        sink.publish(TelemetryEvent::SignalGen {
            side: Side::Buy,
            strength: "HIGH",
            price: 100.0,
            stop_loss: 95.0,
            take_profit: 110.0,
            reason: "test".to_string(),
        });
        assert_eq!(sink.events.lock().len(), 1);
    }
}
