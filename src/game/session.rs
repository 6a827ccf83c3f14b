use log::{info, warn};

use super::{
    config::GameConfig,
    history::{HistoryManager, HistoryPayload},
    rules::{ActionResolution, DonorRequest, PlayOutcome, RuleEngine, RuleError},
    state::{CharIndex, Character, GameEvent, GameState, PendingToken, PlayerIndex, TargetRef},
    storage::{self, KeyValueStore, StorageError},
    turns::{TurnSequencer, TurnSummary},
};

/// One game in progress. Every mutating call runs the rules, then records
/// the result in history, saves the snapshot and persists the history.
/// Storage failures are logged and never surface to the caller.
pub struct GameSession<S: KeyValueStore> {
    state: GameState,
    rules: RuleEngine,
    history: HistoryManager,
    store: S,
    config: GameConfig,
}

impl<S: KeyValueStore> GameSession<S> {
    /// Resumes the game saved in `store`, or opens a new draft.
    pub fn load_or_new(store: S, config: GameConfig) -> Self {
        let mut session = Self {
            state: GameState::new(config.draft_picks_per_player),
            rules: RuleEngine::new(&config),
            history: HistoryManager::from_config(&config),
            store,
            config,
        };

        match session.load_saved_state() {
            Some(state) => {
                session.state = state;
                if !session.load_persisted_history() {
                    session.history.seed(&session.state);
                    session.persist_history();
                } else if session.history.record(&session.state) {
                    // the history write lagged behind the snapshot write
                    session.persist_history();
                }
                info!("resumed saved game");
            }
            None => {
                session.new_game();
            }
        }
        session
    }

    fn load_saved_state(&self) -> Option<GameState> {
        let key = &self.config.storage_key;
        let state: GameState = match storage::load_json(&self.store, key) {
            Ok(state) => state?,
            Err(err) => {
                warn!("ignoring saved state: {err}");
                return None;
            }
        };
        if let Err(err) = state.integrity_check() {
            warn!("ignoring inconsistent saved state: {err:?}");
            return None;
        }
        Some(state)
    }

    fn load_persisted_history(&mut self) -> bool {
        let key = self.config.history_key();
        match storage::load_json::<_, HistoryPayload>(&self.store, &key) {
            Ok(Some(payload)) => {
                let inconsistent = payload
                    .history
                    .iter()
                    .chain(&payload.redo)
                    .find_map(|entry| entry.integrity_check().err());
                if let Some(err) = inconsistent {
                    warn!("ignoring inconsistent saved history: {err:?}");
                    return false;
                }
                self.history.restore(payload)
            }
            Ok(None) => false,
            Err(err) => {
                warn!("ignoring saved history: {err}");
                false
            }
        }
    }

    fn log_storage(result: Result<(), StorageError>) {
        if let Err(err) = result {
            warn!("storage: {err}");
        }
    }

    fn save_state(&mut self) {
        let key = self.config.storage_key.clone();
        Self::log_storage(storage::save_json(&mut self.store, &key, &self.state));
    }

    fn persist_history(&mut self) {
        let key = self.config.history_key();
        let payload = self.history.payload();
        Self::log_storage(storage::save_json(&mut self.store, &key, &payload));
    }

    fn commit(&mut self) {
        self.history.record(&self.state);
        self.save_state();
        self.persist_history();
    }

    /// Starts a fresh draft. Earlier games stay reachable through undo.
    pub fn new_game(&mut self) -> Vec<GameEvent> {
        let events = self.rules.start_draft(&mut self.state);
        self.commit();
        events
    }

    /// Forgets the saved game and its history, then starts a fresh draft.
    pub fn reset(&mut self) -> Vec<GameEvent> {
        let key = self.config.storage_key.clone();
        Self::log_storage(self.store.remove(&key));
        let history_key = self.config.history_key();
        Self::log_storage(self.store.remove(&history_key));
        self.history.clear();
        info!("saved game cleared");
        self.new_game()
    }

    pub fn pick_character(&mut self, pool_idx: usize) -> Result<Vec<GameEvent>, RuleError> {
        let events = self.rules.pick_character(&mut self.state, pool_idx)?;
        self.commit();
        Ok(events)
    }

    pub fn select_card(&mut self, idx: usize) -> Result<(), RuleError> {
        RuleEngine::select_card(&mut self.state, idx)
    }

    pub fn select_target(&mut self, target: TargetRef) -> Result<(), RuleError> {
        RuleEngine::select_target(&mut self.state, target)
    }

    pub fn clear_selection(&mut self) -> Result<(), RuleError> {
        RuleEngine::clear_selection(&mut self.state)
    }

    /// Only completed plays are committed. An absorb plan or a pending
    /// reveal leaves history untouched until it is confirmed.
    pub fn play_selected(&mut self) -> Result<PlayOutcome, RuleError> {
        let outcome = self.rules.play_selected(&mut self.state)?;
        if outcome.is_completed() {
            self.commit();
        }
        Ok(outcome)
    }

    pub fn confirm_absorb(&mut self, requests: &[DonorRequest]) -> Result<PlayOutcome, RuleError> {
        let outcome = self.rules.confirm_absorb(&mut self.state, requests)?;
        self.commit();
        Ok(outcome)
    }

    pub fn complete_pending(&mut self, token: PendingToken) -> Result<PlayOutcome, RuleError> {
        let outcome = self.rules.complete_pending(&mut self.state, token)?;
        self.commit();
        Ok(outcome)
    }

    pub fn skip_action(&mut self) -> Result<ActionResolution, RuleError> {
        let resolution = self.rules.skip_action(&mut self.state)?;
        self.commit();
        Ok(resolution)
    }

    pub fn end_turn(&mut self) -> Result<(TurnSummary, Vec<GameEvent>), RuleError> {
        let result = self.rules.end_turn(&mut self.state)?;
        self.commit();
        Ok(result)
    }

    /// Restores the previous committed snapshot. With a reveal still pending,
    /// the uncommitted first phase is rolled back instead.
    pub fn undo(&mut self) -> bool {
        if self.state.pending.is_some() {
            if let Some(committed) = self.history.current().cloned() {
                self.state = committed;
                info!("rolled back pending action");
                return true;
            }
        }
        match self.history.undo() {
            Some(previous) => {
                self.state = previous;
                self.state.pending = None;
                info!("undo");
                self.save_state();
                self.persist_history();
                true
            }
            None => {
                self.state.status_text = "Nothing to undo".to_string();
                false
            }
        }
    }

    pub fn redo(&mut self) -> bool {
        if self.state.pending.is_some() {
            self.state.status_text = "Wait for the current action to finish.".to_string();
            return false;
        }
        match self.history.redo() {
            Some(next) => {
                self.state = next;
                info!("redo");
                self.save_state();
                self.persist_history();
                true
            }
            None => {
                self.state.status_text = "Nothing to redo".to_string();
                false
            }
        }
    }

    pub fn snapshot(&self) -> &GameState {
        &self.state
    }

    pub fn state_json(&self) -> Result<String, serde_json::Error> {
        self.state.to_json()
    }

    pub fn is_card_playable(
        &self,
        player: PlayerIndex,
        card_idx: usize,
        actor_idx: CharIndex,
    ) -> bool {
        self.state
            .players
            .get(player)
            .and_then(|p| p.hand.get(card_idx))
            .is_some_and(|card| RuleEngine::is_card_playable(&self.state, card, player, actor_idx))
    }

    pub fn playable_cards(&self) -> Vec<usize> {
        RuleEngine::playable_cards(&self.state)
    }

    pub fn current_actor_index(&self) -> Option<CharIndex> {
        TurnSequencer::current_actor_index(&self.state)
    }

    pub fn current_actor(&self) -> Option<&Character> {
        TurnSequencer::current_actor(&self.state)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Card, CardKind};
    use crate::game::storage::MemoryStore;

    /// A store whose every call fails, like a browser with storage disabled.
    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable)
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable)
        }

        fn remove(&mut self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable)
        }
    }

    fn config() -> GameConfig {
        GameConfig::default().with_seed(5)
    }

    fn in_game() -> GameSession<MemoryStore> {
        let mut store = MemoryStore::new();
        storage::save_json(&mut store, &config().storage_key, &GameState::sample())
            .expect("seed store");
        GameSession::load_or_new(store, config())
    }

    #[test]
    fn empty_store_opens_a_draft() {
        let session = GameSession::load_or_new(MemoryStore::new(), config());
        assert!(session.snapshot().is_draft);
        assert_eq!(session.history_len(), 1);
        assert!(!session.can_undo());
        assert!(session.store().get(&config().storage_key).ok().flatten().is_some());
        assert!(session.store().get(&config().history_key()).ok().flatten().is_some());
    }

    #[test]
    fn corrupt_save_is_ignored() {
        let mut store = MemoryStore::new();
        store.set(&config().storage_key, "not json").expect("memory set");
        let session = GameSession::load_or_new(store, config());
        assert!(session.snapshot().is_draft);
    }

    #[test]
    fn saved_game_resumes_with_seeded_history() {
        let session = in_game();
        assert_eq!(session.snapshot(), &GameState::sample());
        assert_eq!(session.history_len(), 1);
        assert_eq!(session.current_actor().map(|c| c.name.as_str()), Some("Vex"));
    }

    #[test]
    fn play_commits_and_undo_restores() {
        let mut session = in_game();
        let before = session.snapshot().clone();
        session.select_card(0).expect("select attack");
        session.select_target(TargetRef::new(1, 1)).expect("target");
        let outcome = session.play_selected().expect("attack");
        assert!(outcome.is_completed());
        assert_eq!(session.snapshot().players[1].chars[1].hp, 19);
        assert!(session.can_undo());

        assert!(session.undo());
        assert_eq!(session.snapshot(), &before);
        assert!(session.can_redo());
        assert!(!session.undo());
        assert_eq!(session.snapshot().status_text, "Nothing to undo");

        assert!(session.redo());
        assert_eq!(session.snapshot().players[1].chars[1].hp, 19);
        assert!(!session.redo());
    }

    #[test]
    fn rejected_play_changes_nothing() {
        let mut session = in_game();
        let before = session.snapshot().clone();
        assert_eq!(session.play_selected(), Err(RuleError::NoCardSelected));
        assert_eq!(session.snapshot(), &before);
        assert_eq!(session.history_len(), 1);
    }

    #[test]
    fn pending_reveal_is_committed_only_when_completed() {
        let mut session = in_game();
        session.state.players[0].hand = vec![Card::new("Steal", CardKind::Steal, 1, "")];
        session.select_card(0).expect("select steal");
        let token = match session.play_selected().expect("phase one") {
            PlayOutcome::RevealPending { token, .. } => token,
            other => panic!("expected reveal, got {other:?}"),
        };
        assert_eq!(session.history_len(), 1);
        assert_eq!(session.end_turn().map(|_| ()), Err(RuleError::ActionPending));

        session.complete_pending(token).expect("phase two");
        assert_eq!(session.history_len(), 2);
        assert_eq!(session.snapshot().players[0].hand.len(), 1);
    }

    #[test]
    fn undo_during_reveal_rolls_back_first_phase() {
        let mut session = in_game();
        let committed = session.snapshot().clone();
        session.state.players[0].hand.push(Card::new("Steal", CardKind::Steal, 1, ""));
        let steal_idx = session.snapshot().players[0].hand.len() - 1;
        session.select_card(steal_idx).expect("select steal");
        session.play_selected().expect("phase one");

        assert!(!session.redo());
        assert!(session.undo());
        assert_eq!(session.snapshot(), &committed);
        assert!(session.snapshot().pending.is_none());
    }

    #[test]
    fn reload_restores_state_and_history() {
        let mut session = in_game();
        session.skip_action().expect("skip");
        session.skip_action().expect("skip");
        session.end_turn().expect("end turn");
        let live = session.snapshot().clone();

        let store = session.into_store();
        let mut resumed = GameSession::load_or_new(store, config());
        assert_eq!(resumed.snapshot(), &live);
        assert_eq!(resumed.history_len(), 4);
        assert!(resumed.undo());
        assert_eq!(resumed.snapshot().current_player, 0);
    }

    #[test]
    fn reset_discards_saved_history() {
        let mut session = in_game();
        session.skip_action().expect("skip");
        session.reset();
        assert!(session.snapshot().is_draft);
        assert_eq!(session.history_len(), 1);
        assert!(!session.can_undo());
    }

    #[test]
    fn playable_query_checks_the_card_slot() {
        let session = in_game();
        assert!(session.is_card_playable(0, 0, 0));
        assert!(!session.is_card_playable(0, 1, 0), "nobody is damaged yet");
        assert!(!session.is_card_playable(0, 9, 0));
        assert_eq!(session.playable_cards(), vec![0, 2]);
    }

    #[test]
    fn inconsistent_saved_history_is_replaced() {
        let mut store = MemoryStore::new();
        storage::save_json(&mut store, &config().storage_key, &GameState::sample())
            .expect("seed state");
        let mut broken = GameState::sample();
        broken.current_player = 5;
        let payload = HistoryPayload {
            history: vec![broken, GameState::sample()],
            redo: Vec::new(),
        };
        storage::save_json(&mut store, &config().history_key(), &payload).expect("seed history");

        let mut session = GameSession::load_or_new(store, config());
        assert_eq!(session.history_len(), 1);
        assert!(!session.undo());
        assert_eq!(session.current_actor_index(), Some(0));
    }

    #[test]
    fn stale_saved_history_gains_the_live_state() {
        let mut store = MemoryStore::new();
        let mut live = GameState::sample();
        live.players[0].mark_used(0);
        live.next_char_index = 1;
        storage::save_json(&mut store, &config().storage_key, &live).expect("seed state");
        let payload = HistoryPayload {
            history: vec![GameState::sample()],
            redo: Vec::new(),
        };
        storage::save_json(&mut store, &config().history_key(), &payload).expect("seed history");

        let mut session = GameSession::load_or_new(store, config());
        assert_eq!(session.history_len(), 2);
        assert!(session.undo());
        assert_eq!(session.snapshot(), &GameState::sample());
    }

    #[test]
    fn play_continues_when_storage_fails() {
        let mut session = GameSession::load_or_new(FailingStore, config());
        assert!(session.snapshot().is_draft);
        for _ in 0..6 {
            session.pick_character(0).expect("draft pick");
        }
        assert!(!session.snapshot().is_draft);

        session.skip_action().expect("skip without storage");
        assert_eq!(session.snapshot().current().used_this_turn, vec![0]);
        assert!(session.undo());
        assert!(session.snapshot().current().used_this_turn.is_empty());
        assert!(session.redo());

        session.reset();
        assert!(session.snapshot().is_draft);
    }
}
