use log::{debug, info};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::state::{CharIndex, Character, GameEvent, GameState, PlayerIndex, VictoryState};

/// What the caller should do after an actor has been consumed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TurnProgress {
    /// Another character of the current player can still act.
    Continue,
    /// Nobody is left to act; the turn should end after the grace delay.
    TurnComplete,
    /// The elimination check ended the game.
    GameOver,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TurnSummary {
    pub ended_player: PlayerIndex,
    pub drawn: usize,
    pub next_player: PlayerIndex,
}

/// Owns actor selection, used/KO bookkeeping and the end-of-turn draw.
pub struct TurnSequencer {
    rng: SmallRng,
    hand_size: usize,
}

impl TurnSequencer {
    pub fn new(hand_size: usize) -> Self {
        Self {
            rng: SmallRng::from_entropy(),
            hand_size,
        }
    }

    pub fn with_seed(hand_size: usize, seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            hand_size,
        }
    }

    pub fn rng_mut(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// First index at or after the cursor whose character is neither KO'd nor
    /// already used this turn.
    pub fn current_actor_index(state: &GameState) -> Option<CharIndex> {
        let player = state.current();
        (state.next_char_index..player.chars.len())
            .find(|&idx| !player.chars[idx].is_ko && !player.has_used(idx))
    }

    pub fn current_actor(state: &GameState) -> Option<&Character> {
        Self::current_actor_index(state).map(|idx| &state.current().chars[idx])
    }

    /// Records `idx` as having acted and moves the cursor past it. Returns
    /// whether anyone is left to act this turn.
    pub fn mark_used(state: &mut GameState, idx: CharIndex) -> TurnProgress {
        state.current_mut().mark_used(idx);
        state.next_char_index = state.next_char_index.max(idx + 1);

        if state.is_finished() {
            TurnProgress::GameOver
        } else if Self::current_actor_index(state).is_none() {
            let name = state.current().name.clone();
            info!("{name} has used all active characters");
            state.status_text = format!("{name}: all active characters used. Ending turn...");
            TurnProgress::TurnComplete
        } else {
            TurnProgress::Continue
        }
    }

    /// Cards to draw at end of turn: one when the hand is already full,
    /// otherwise enough to refill it.
    pub fn draw_count(hand_len: usize, hand_size: usize) -> usize {
        if hand_len >= hand_size {
            1
        } else {
            hand_size - hand_len
        }
    }

    /// Draws from the top of the deck, reshuffling the discard pile into the
    /// deck whenever it runs dry. Returns how many cards were actually drawn.
    pub fn draw_cards(&mut self, state: &mut GameState, player: PlayerIndex, count: usize) -> usize {
        let mut drawn = 0;
        for _ in 0..count {
            if state.deck.is_empty() {
                if state.discard.is_empty() {
                    break;
                }
                state.deck = std::mem::take(&mut state.discard);
                state.deck.shuffle(&mut self.rng);
                debug!("reshuffled {} discarded cards into the deck", state.deck.len());
            }
            let card = state.deck.remove(0);
            state.players[player].hand.push(card);
            drawn += 1;
        }
        drawn
    }

    pub fn end_turn(&mut self, state: &mut GameState) -> (TurnSummary, Vec<GameEvent>) {
        let ended_player = state.current_player;
        let to_draw = Self::draw_count(state.current().hand.len(), self.hand_size);
        let drawn = self.draw_cards(state, ended_player, to_draw);
        info!(
            "{} ends turn and draws {drawn} card(s)",
            state.players[ended_player].name
        );

        let next_player = GameState::opponent_of(ended_player);
        state.current_player = next_player;
        state.next_char_index = 0;
        state.players[next_player].start_turn();
        state.clear_selection();
        state.status_text = format!(
            "{}'s turn. Deck: {} Discard: {}",
            state.players[next_player].name,
            state.deck.len(),
            state.discard.len()
        );

        let events = vec![
            GameEvent::CardsDrawn {
                player: ended_player,
                count: drawn,
            },
            GameEvent::TurnEnded {
                player: ended_player,
                drawn,
            },
        ];
        (
            TurnSummary {
                ended_player,
                drawn,
                next_player,
            },
            events,
        )
    }

    /// Game over once at most one player still has a standing character.
    /// Only meaningful after the draft, when both rosters are populated.
    pub fn check_elimination(state: &GameState) -> Option<VictoryState> {
        if state.is_draft || state.players.iter().any(|p| p.chars.is_empty()) {
            return None;
        }
        let standing: Vec<PlayerIndex> = state
            .players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.has_alive())
            .map(|(idx, _)| idx)
            .collect();
        if standing.len() > 1 {
            return None;
        }
        Some(VictoryState {
            winner: standing.first().copied(),
        })
    }

    /// Runs the elimination check and records the outcome once.
    pub fn evaluate_victory(state: &mut GameState) -> Option<VictoryState> {
        if let Some(outcome) = &state.outcome {
            return Some(outcome.clone());
        }
        let outcome = Self::check_elimination(state)?;
        state.status_text = match outcome.winner {
            Some(winner) => format!("{} wins!", state.players[winner].name),
            None => "Both teams were defeated.".to_string(),
        };
        info!("{}", state.status_text);
        state.outcome = Some(outcome.clone());
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Card, CardKind};

    fn filler(n: usize) -> Vec<Card> {
        (0..n)
            .map(|i| Card::new(format!("Card {i}"), CardKind::Draw, 1, ""))
            .collect()
    }

    #[test]
    fn current_actor_skips_ko_and_used() {
        let mut state = GameState::sample();
        state.players[0].chars.push(Character::new("Sera", 30, 1, 1));
        state.players[0].chars[0].take_damage(99);
        assert_eq!(TurnSequencer::current_actor_index(&state), Some(1));

        state.players[0].mark_used(1);
        assert_eq!(TurnSequencer::current_actor_index(&state), Some(2));
        assert_eq!(
            TurnSequencer::current_actor(&state).map(|c| c.name.as_str()),
            Some("Sera")
        );

        state.next_char_index = 3;
        assert_eq!(TurnSequencer::current_actor_index(&state), None);
    }

    #[test]
    fn mark_used_advances_cursor_and_completes_turn() {
        let mut state = GameState::sample();
        let progress = TurnSequencer::mark_used(&mut state, 0);
        assert_eq!(progress, TurnProgress::Continue);
        assert_eq!(state.next_char_index, 1);

        let progress = TurnSequencer::mark_used(&mut state, 1);
        assert_eq!(progress, TurnProgress::TurnComplete);
        assert_eq!(state.players[0].used_this_turn, vec![0, 1]);

        let progress = TurnSequencer::mark_used(&mut state, 1);
        assert_eq!(progress, TurnProgress::TurnComplete);
        assert_eq!(state.players[0].used_this_turn, vec![0, 1]);
    }

    #[test]
    fn knocked_out_actor_is_still_the_one_marked() {
        let mut state = GameState::sample();
        state.players[0].chars[0].take_damage(99);
        let progress = TurnSequencer::mark_used(&mut state, 0);
        assert_eq!(progress, TurnProgress::Continue);
        assert_eq!(state.players[0].used_this_turn, vec![0]);
        assert_eq!(TurnSequencer::current_actor_index(&state), Some(1));
    }

    #[test]
    fn draw_rule_matches_hand_size() {
        assert_eq!(TurnSequencer::draw_count(0, 5), 5);
        assert_eq!(TurnSequencer::draw_count(4, 5), 1);
        assert_eq!(TurnSequencer::draw_count(5, 5), 1);
        assert_eq!(TurnSequencer::draw_count(6, 5), 1);
        assert_eq!(TurnSequencer::draw_count(2, 5), 3);
    }

    #[test]
    fn draw_reshuffles_discard_when_deck_runs_out() {
        let mut turns = TurnSequencer::with_seed(5, 9);
        let mut state = GameState::sample();
        state.deck = filler(1);
        state.discard = filler(4);
        let before = state.players[0].hand.len();

        let drawn = turns.draw_cards(&mut state, 0, 3);
        assert_eq!(drawn, 3);
        assert_eq!(state.players[0].hand.len(), before + 3);
        assert_eq!(state.deck.len(), 2);
        assert!(state.discard.is_empty());

        state.deck.clear();
        assert_eq!(turns.draw_cards(&mut state, 0, 2), 0);
    }

    #[test]
    fn end_turn_flips_player_and_resets_flags() {
        let mut turns = TurnSequencer::with_seed(5, 1);
        let mut state = GameState::sample();
        state.deck = filler(10);
        state.players[0].chars[0].dodge = true;
        state.players[1].chars[0].dodge = true;
        state.players[1].chars[1].counter = true;
        state.players[1].used_this_turn = vec![0];
        state.next_char_index = 2;
        state.selected_card_idx = Some(0);

        let (summary, events) = turns.end_turn(&mut state);
        assert_eq!(summary.ended_player, 0);
        assert_eq!(summary.drawn, 2);
        assert_eq!(summary.next_player, 1);
        assert_eq!(state.players[0].hand.len(), 5);
        assert_eq!(state.current_player, 1);
        assert_eq!(state.next_char_index, 0);
        assert!(state.players[1].used_this_turn.is_empty());
        assert!(!state.players[1].chars[0].dodge);
        assert!(!state.players[1].chars[1].counter);
        assert!(state.players[0].chars[0].dodge, "owner's flag survives the opponent's turn");
        assert_eq!(state.selected_card_idx, None);
        assert!(events.contains(&GameEvent::TurnEnded { player: 0, drawn: 2 }));
    }

    #[test]
    fn elimination_names_the_standing_player() {
        let mut state = GameState::sample();
        assert_eq!(TurnSequencer::check_elimination(&state), None);

        for ch in &mut state.players[0].chars {
            ch.take_damage(99);
        }
        state.players[1].chars[0].take_damage(99);
        let outcome = TurnSequencer::evaluate_victory(&mut state).expect("game over");
        assert_eq!(outcome.winner, Some(1));
        assert!(state.is_finished());

        for ch in &mut state.players[1].chars {
            ch.take_damage(99);
        }
        assert_eq!(
            TurnSequencer::check_elimination(&state),
            Some(VictoryState { winner: None })
        );
    }

    #[test]
    fn elimination_ignores_draft() {
        let mut state = GameState::new(3);
        state.is_draft = true;
        assert_eq!(TurnSequencer::check_elimination(&state), None);
    }
}
