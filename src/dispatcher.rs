use crate::protocol::{parse_section, INFO_KEY, STATE_KEY};
use crate::session::SessionState;
use crate::subscription::{EventBus, SessionEvent};
use crate::types::{Info, State};
use std::sync::Arc;

/// Turns inbound frames into snapshot replacements and change events
pub struct MessageDispatcher {
    session: Arc<SessionState>,
    events: Arc<EventBus>,
}

impl MessageDispatcher {
    pub fn new(session: Arc<SessionState>, events: Arc<EventBus>) -> Self {
        Self { session, events }
    }

    /// Handle one inbound text frame
    ///
    /// `info` and `state` are handled independently: the device often sends
    /// only one of them, and a malformed section never blocks the other.
    /// Frames that are not JSON are dropped silently.
    pub fn dispatch(&self, text: &str) {
        tracing::debug!("Received: {}", text);

        let frame: serde_json::Value = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!("Dropping unparseable frame: {}", e);
                return;
            }
        };

        match parse_section::<Info>(&frame, INFO_KEY) {
            Some(Ok(info)) => self.publish_info(Some(Arc::new(info))),
            Some(Err(e)) => tracing::debug!("Ignoring malformed info section: {}", e),
            None => {}
        }

        match parse_section::<State>(&frame, STATE_KEY) {
            Some(Ok(state)) => self.publish_state(Some(Arc::new(state))),
            Some(Err(e)) => tracing::debug!("Ignoring malformed state section: {}", e),
            None => {}
        }
    }

    /// Drop both snapshots, notifying subscribers
    pub fn clear(&self) {
        self.publish_info(None);
        self.publish_state(None);
    }

    fn publish_info(&self, current: Option<Arc<Info>>) {
        let previous = self.session.replace_info(current.clone());
        self.events.publish(SessionEvent::InfoChanged { previous, current });
    }

    fn publish_state(&self, current: Option<Arc<State>>) {
        let previous = self.session.replace_state(current.clone());
        self.events.publish(SessionEvent::StateChanged { previous, current });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn setup() -> (MessageDispatcher, Arc<SessionState>, Arc<Mutex<Vec<SessionEvent>>>) {
        let session = Arc::new(SessionState::new());
        let events = Arc::new(EventBus::new(16));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = seen.clone();
        events.subscribe(move |event| log.lock().unwrap().push(event.clone()));

        (MessageDispatcher::new(session.clone(), events), session, seen)
    }

    #[test]
    fn state_only_frame_keeps_info() {
        let (dispatcher, session, seen) = setup();

        dispatcher.dispatch(&json!({ "info": { "leds": { "count": 30 } } }).to_string());
        let info_before = session.info().unwrap();

        dispatcher.dispatch(&json!({ "state": { "on": true, "bri": 10 } }).to_string());

        assert!(Arc::ptr_eq(&info_before, &session.info().unwrap()));
        assert_eq!(session.state().unwrap().brightness, 10);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[1], SessionEvent::StateChanged { previous: None, current: Some(_) }));
    }

    #[test]
    fn frame_without_sections_publishes_nothing() {
        let (dispatcher, session, seen) = setup();

        dispatcher.dispatch(&json!({ "success": true }).to_string());
        dispatcher.dispatch("not json at all");

        assert!(seen.lock().unwrap().is_empty());
        assert!(session.info().is_none());
        assert!(session.state().is_none());
    }

    #[test]
    fn malformed_section_does_not_block_the_other() {
        let (dispatcher, session, seen) = setup();

        dispatcher.dispatch(&json!({ "info": "garbage", "state": { "mainseg": 1 } }).to_string());

        assert!(session.info().is_none());
        assert_eq!(session.state().unwrap().main_segment_id, 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn snapshots_are_replaced_not_merged() {
        let (dispatcher, session, seen) = setup();

        dispatcher.dispatch(&json!({ "state": { "on": true, "bri": 200 } }).to_string());
        dispatcher.dispatch(&json!({ "state": { "bri": 50 } }).to_string());

        let state = session.state().unwrap();
        assert_eq!(state.brightness, 50);
        assert!(!state.on);

        let seen = seen.lock().unwrap();
        match &seen[1] {
            SessionEvent::StateChanged { previous: Some(prev), current: Some(cur) } => {
                assert_eq!(prev.brightness, 200);
                assert_eq!(cur.brightness, 50);
            }
            other => panic!("unexpected event: {:?}", other),
        };
    }

    #[test]
    fn clear_publishes_empty_snapshots() {
        let (dispatcher, session, seen) = setup();

        dispatcher.dispatch(&json!({ "info": {}, "state": {} }).to_string());
        dispatcher.clear();

        assert!(!session.is_ready());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert!(matches!(seen[2], SessionEvent::InfoChanged { previous: Some(_), current: None }));
        assert!(matches!(seen[3], SessionEvent::StateChanged { previous: Some(_), current: None }));
    }
}
