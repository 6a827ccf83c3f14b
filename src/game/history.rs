use std::collections::VecDeque;

use log::debug;
use serde::{Deserialize, Serialize};

use super::config::GameConfig;
use super::state::GameState;

/// Bounded `{history, redo}` blob written next to the latest snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryPayload {
    pub history: Vec<GameState>,
    #[serde(default)]
    pub redo: Vec<GameState>,
}

/// Linear undo/redo over committed snapshots. The newest entry of
/// `history` is always the live state.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    history: VecDeque<GameState>,
    redo: Vec<GameState>,
    limit: usize,
    persist_limit: usize,
}

impl HistoryManager {
    pub fn new(limit: usize, persist_limit: usize) -> Self {
        Self {
            history: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
            persist_limit,
        }
    }

    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(config.history_limit, config.persist_history_limit)
    }

    /// Replaces both stacks with a single entry for `state`.
    pub fn seed(&mut self, state: &GameState) {
        self.history.clear();
        self.history.push_back(state.clone());
        self.redo.clear();
    }

    /// Pushes a committed snapshot. Returns `false` when it equals the
    /// current top and nothing was recorded.
    pub fn record(&mut self, snapshot: &GameState) -> bool {
        if self.history.back() == Some(snapshot) {
            return false;
        }
        self.history.push_back(snapshot.clone());
        while self.history.len() > self.limit {
            self.history.pop_front();
        }
        self.redo.clear();
        debug!("history: {} entries", self.history.len());
        true
    }

    /// Steps back one entry and returns the state to restore.
    pub fn undo(&mut self) -> Option<GameState> {
        if self.history.len() <= 1 {
            return None;
        }
        let current = self.history.pop_back()?;
        self.redo.push(current);
        self.history.back().cloned()
    }

    pub fn redo(&mut self) -> Option<GameState> {
        let next = self.redo.pop()?;
        self.history.push_back(next.clone());
        while self.history.len() > self.limit {
            self.history.pop_front();
        }
        Some(next)
    }

    pub fn current(&self) -> Option<&GameState> {
        self.history.back()
    }

    pub fn can_undo(&self) -> bool {
        self.history.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// The most recent `persist_limit` entries of each stack.
    pub fn payload(&self) -> HistoryPayload {
        let skip = self.history.len().saturating_sub(self.persist_limit);
        let redo_skip = self.redo.len().saturating_sub(self.persist_limit);
        HistoryPayload {
            history: self.history.iter().skip(skip).cloned().collect(),
            redo: self.redo[redo_skip..].to_vec(),
        }
    }

    /// Loads a persisted payload, trimming each stack to the in-memory cap.
    /// An empty history is rejected so the caller can seed a fresh one.
    pub fn restore(&mut self, payload: HistoryPayload) -> bool {
        if payload.history.is_empty() {
            return false;
        }
        let skip = payload.history.len().saturating_sub(self.limit);
        self.history = payload.history.into_iter().skip(skip).collect();
        let redo_skip = payload.redo.len().saturating_sub(self.limit);
        self.redo = payload.redo.into_iter().skip(redo_skip).collect();
        debug!(
            "restored history: {} entries, {} redo",
            self.history.len(),
            self.redo.len()
        );
        true
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_hp(hp: u32) -> GameState {
        let mut state = GameState::sample();
        state.players[1].chars[0].hp = hp;
        state
    }

    #[test]
    fn identical_snapshots_are_recorded_once() {
        let mut history = HistoryManager::new(200, 5);
        assert!(history.record(&state_with_hp(20)));
        assert!(!history.record(&state_with_hp(20)));
        assert_eq!(history.len(), 1);
        assert!(!history.can_undo());
    }

    #[test]
    fn undo_and_redo_walk_the_stacks() {
        let mut history = HistoryManager::new(200, 5);
        history.seed(&state_with_hp(23));
        history.record(&state_with_hp(20));
        history.record(&state_with_hp(15));

        assert_eq!(history.undo(), Some(state_with_hp(20)));
        assert_eq!(history.undo(), Some(state_with_hp(23)));
        assert_eq!(history.undo(), None, "the last entry is never undone");
        assert_eq!(history.redo_len(), 2);

        assert_eq!(history.redo(), Some(state_with_hp(20)));
        assert_eq!(history.current(), Some(&state_with_hp(20)));
        assert_eq!(history.redo(), Some(state_with_hp(15)));
        assert_eq!(history.redo(), None);
    }

    #[test]
    fn recording_after_undo_drops_the_redo_branch() {
        let mut history = HistoryManager::new(200, 5);
        history.seed(&state_with_hp(23));
        history.record(&state_with_hp(20));
        history.undo();
        assert!(history.can_redo());

        history.record(&state_with_hp(10));
        assert!(!history.can_redo());
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn oldest_entries_fall_off_at_the_cap() {
        let mut history = HistoryManager::new(200, 5);
        for hp in 0..=205 {
            history.record(&state_with_hp(hp));
        }
        assert_eq!(history.len(), 200);
        assert_eq!(
            history.current().map(|s| s.players[1].chars[0].hp),
            Some(205)
        );
        for _ in 0..199 {
            history.undo();
        }
        assert_eq!(
            history.current().map(|s| s.players[1].chars[0].hp),
            Some(6)
        );
    }

    #[test]
    fn payload_keeps_only_recent_entries() {
        let mut history = HistoryManager::new(200, 5);
        for hp in 0..12 {
            history.record(&state_with_hp(hp));
        }
        for _ in 0..7 {
            history.undo();
        }
        let payload = history.payload();
        assert_eq!(payload.history.len(), 5);
        assert_eq!(payload.history[4].players[1].chars[0].hp, 4);
        assert_eq!(payload.redo.len(), 5);

        let json = serde_json::to_string(&payload).expect("payload serializes");
        let decoded: HistoryPayload = serde_json::from_str(&json).expect("payload decodes");

        let mut reloaded = HistoryManager::new(200, 5);
        assert!(reloaded.restore(decoded));
        assert_eq!(reloaded.len(), 5);
        assert!(reloaded.can_undo());
        assert!(reloaded.can_redo());
    }

    #[test]
    fn restore_rejects_empty_history() {
        let mut history = HistoryManager::new(200, 5);
        assert!(!history.restore(HistoryPayload::default()));
        assert!(history.is_empty());
    }
}
