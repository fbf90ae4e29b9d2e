//! In-memory history adapter
//!
//! Implements the `HistoryStore` port. The state serializes to
//! `{ "navigations": [...], "navigationIndex": n }`.

use crate::domain::navigation::{NavigationRecord, NavigationStoreState};
use crate::error::{RouterError, RouterResult};
use crate::ports::outbound::HistoryStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
pub struct InMemoryHistory {
    state: Mutex<NavigationStoreState>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: NavigationStoreState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().navigations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().navigations.is_empty()
    }

    pub fn to_json(&self) -> RouterResult<String> {
        serde_json::to_string(&*self.state.lock()).map_err(|e| RouterError::History {
            reason: e.to_string(),
        })
    }

    pub fn from_json(json: &str) -> RouterResult<Self> {
        let state: NavigationStoreState =
            serde_json::from_str(json).map_err(|e| RouterError::History {
                reason: e.to_string(),
            })?;
        if !state.navigations.is_empty() && state.navigation_index >= state.navigations.len() {
            return Err(RouterError::History {
                reason: format!(
                    "navigation index {} out of range for {} entries",
                    state.navigation_index,
                    state.navigations.len()
                ),
            });
        }
        Ok(Self::with_state(state))
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn push(&self, mut record: NavigationRecord) -> RouterResult<()> {
        let mut state = self.state.lock();
        if !state.navigations.is_empty() {
            let keep = state.navigation_index + 1;
            state.navigations.truncate(keep);
        }
        record.index = state.navigations.len();
        state.navigation_index = record.index;
        debug!(index = record.index, path = %record.path, "History entry pushed");
        state.navigations.push(record);
        Ok(())
    }

    async fn replace(&self, mut record: NavigationRecord) -> RouterResult<()> {
        let mut state = self.state.lock();
        let index = state.navigation_index;
        match state.navigations.get_mut(index) {
            Some(current) => {
                record.index = index;
                *current = record;
            }
            None => {
                record.index = state.navigations.len();
                state.navigation_index = record.index;
                state.navigations.push(record);
            }
        }
        Ok(())
    }

    async fn go(&self, delta: isize) -> RouterResult<Option<NavigationRecord>> {
        let mut state = self.state.lock();
        let target = state.navigation_index as isize + delta;
        if target < 0 || target as usize >= state.navigations.len() {
            return Ok(None);
        }
        state.navigation_index = target as usize;
        Ok(state.navigations.get(target as usize).cloned())
    }

    async fn set_index(&self, index: usize) -> RouterResult<()> {
        let mut state = self.state.lock();
        if index >= state.navigations.len() && !(index == 0 && state.navigations.is_empty()) {
            return Err(RouterError::History {
                reason: format!("index {index} out of range"),
            });
        }
        state.navigation_index = index;
        Ok(())
    }

    fn index(&self) -> usize {
        self.state.lock().navigation_index
    }

    fn current(&self) -> Option<NavigationRecord> {
        let state = self.state.lock();
        state.navigations.get(state.navigation_index).cloned()
    }

    fn state(&self) -> NavigationStoreState {
        self.state.lock().clone()
    }
}
