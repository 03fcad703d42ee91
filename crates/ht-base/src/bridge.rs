//! Named slots one page publishes and other pages read to seed their initial view.
//!
//! Reads are eventually consistent: a reader racing a publish may see the old
//! value. Pages only use the bridge for initial UI state, never for decisions.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::constants::MODE_KEY;

#[derive(Clone, Default)]
pub struct StateBridge {
    slots: Arc<RwLock<HashMap<&'static str, String>>>,
}

impl StateBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, key: &'static str, value: impl Into<String>) {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        slots.insert(key, value.into());
    }

    pub fn read(&self, key: &str) -> Option<String> {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots.get(key).cloned()
    }

    /// Current operating mode, lowercased. None until the status page publishes one.
    pub fn mode(&self) -> Option<String> {
        self.read(MODE_KEY)
    }

    pub fn publish_mode(&self, mode: &str) {
        self.publish(MODE_KEY, mode.to_lowercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpublished_key_reads_none() {
        let bridge = StateBridge::new();
        assert_eq!(bridge.read("missing"), None);
        assert_eq!(bridge.mode(), None);
    }

    #[test]
    fn readers_see_latest_publish() {
        let bridge = StateBridge::new();
        let reader = bridge.clone();
        bridge.publish_mode("Rule");
        assert_eq!(reader.mode().as_deref(), Some("rule"));
        bridge.publish_mode("global");
        assert_eq!(reader.mode().as_deref(), Some("global"));
    }
}
