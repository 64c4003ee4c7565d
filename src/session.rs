use crate::error::{Result, WledError};
use crate::types::{Info, State};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};

/// Latest info and state snapshots received from the device
///
/// Snapshots are immutable once published; replacing one swaps the `Arc`,
/// so readers holding an older snapshot are never affected.
#[derive(Default)]
pub struct SessionState {
    info: RwLock<Option<Arc<Info>>>,
    state: RwLock<Option<Arc<State>>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self) -> Option<Arc<Info>> {
        self.info.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn state(&self) -> Option<Arc<State>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Both snapshots have been received
    pub fn is_ready(&self) -> bool {
        self.info().is_some() && self.state().is_some()
    }

    /// Swap in a new info snapshot, returning the previous one
    pub(crate) fn replace_info(&self, info: Option<Arc<Info>>) -> Option<Arc<Info>> {
        let mut slot = self.info.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, info)
    }

    /// Swap in a new state snapshot, returning the previous one
    pub(crate) fn replace_state(&self, state: Option<Arc<State>>) -> Option<Arc<State>> {
        let mut slot = self.state.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, state)
    }
}

/// A live view of one device: its snapshots plus a way to send commands
///
/// Builders and command helpers only depend on this trait.
#[async_trait]
pub trait DeviceSession: Send + Sync {
    /// Current info snapshot, `None` before it is received or after disconnect
    fn info(&self) -> Option<Arc<Info>>;

    /// Current state snapshot, `None` before it is received or after disconnect
    fn state(&self) -> Option<Arc<State>>;

    /// Send one command. Fire and forget.
    async fn send_value(&self, message: Value) -> Result<()>;

    fn info_or_err(&self) -> Result<Arc<Info>> {
        self.info().ok_or(WledError::InfoUnavailable)
    }

    fn state_or_err(&self) -> Result<Arc<State>> {
        self.state().ok_or(WledError::StateUnavailable)
    }
}

/// Serialize and send any command value
pub async fn send_json<T>(session: &dyn DeviceSession, message: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    session.send_value(serde_json::to_value(message)?).await
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::Mutex;

    /// In-memory session that records every command
    #[derive(Default)]
    pub struct FakeSession {
        pub info: Option<Arc<Info>>,
        pub state: Option<Arc<State>>,
        pub sent: Mutex<Vec<Value>>,
    }

    impl FakeSession {
        pub fn with_info(mut self, info: Info) -> Self {
            self.info = Some(Arc::new(info));
            self
        }

        pub fn with_state(mut self, state: State) -> Self {
            self.state = Some(Arc::new(state));
            self
        }

        pub fn sent(&self) -> Vec<Value> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeviceSession for FakeSession {
        fn info(&self) -> Option<Arc<Info>> {
            self.info.clone()
        }

        fn state(&self) -> Option<Arc<State>> {
            self.state.clone()
        }

        async fn send_value(&self, message: Value) -> Result<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    /// Info with the given capacities
    pub fn info(led_count: u32, max_segments: u32, effects: u32, palettes: u32) -> Info {
        let mut info = Info::default();
        info.led_info.count = led_count;
        info.led_info.max_segments = max_segments;
        info.effect_count = effects;
        info.palette_count = palettes;
        info
    }

    /// State whose segments carry the given ids
    pub fn state_with_segments(ids: &[u32], main_segment_id: u32) -> State {
        let mut state = State::default();
        state.main_segment_id = main_segment_id;
        state.segments = ids
            .iter()
            .map(|&id| crate::types::Segment {
                id,
                ..Default::default()
            })
            .collect();
        state
    }
}
