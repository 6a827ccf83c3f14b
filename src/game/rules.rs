use std::fmt;

use log::info;
use serde::{Deserialize, Serialize};

use super::{
    catalog,
    config::GameConfig,
    effects::{self, AbsorbRequest, DamageOutcome, DamageResolution, EffectError, HealOutcome},
    state::{
        Card, CardKind, CharIndex, Character, DefenseKind, GameEvent, GameState, IntegrityError,
        PendingAction, PendingToken, PlayerIndex, TargetRef, VictoryState,
    },
    turns::{TurnProgress, TurnSequencer, TurnSummary},
};

/// One donor row of the absorb allocation dialog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AbsorbDonor {
    pub side: PlayerIndex,
    pub idx: CharIndex,
    pub name: String,
    pub damage: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AbsorbPlan {
    pub actor: TargetRef,
    pub cap: u32,
    pub donors: Vec<AbsorbDonor>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DonorRequest {
    pub side: PlayerIndex,
    pub idx: CharIndex,
    pub amt: u32,
}

impl DonorRequest {
    pub fn new(side: PlayerIndex, idx: CharIndex, amt: u32) -> Self {
        Self { side, idx, amt }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionResolution {
    pub events: Vec<GameEvent>,
    pub progress: TurnProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub victory: Option<VictoryState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlayOutcome {
    /// The card resolved fully and the actor has been consumed.
    Completed { resolution: ActionResolution },
    /// Absorb needs the player to split the cap across donors before it
    /// can resolve; nothing has been mutated yet.
    #[serde(rename_all = "camelCase")]
    AbsorbAllocation { plan: AbsorbPlan },
    /// First phase committed; call `complete_pending(token)` after the reveal.
    #[serde(rename_all = "camelCase")]
    RevealPending {
        token: PendingToken,
        highlight_idx: usize,
        events: Vec<GameEvent>,
    },
}

impl PlayOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PlayOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleError {
    DraftInProgress,
    DraftClosed,
    #[serde(rename_all = "camelCase")]
    InvalidDraftPick { index: usize },
    GameFinished,
    ActionPending,
    NoPendingAction,
    #[serde(rename_all = "camelCase")]
    PendingTokenMismatch {
        expected: PendingToken,
        actual: PendingToken,
    },
    NoActor,
    NoCardSelected,
    #[serde(rename_all = "camelCase")]
    CardNotFound { index: usize },
    #[serde(rename_all = "camelCase")]
    CardNotPlayable { kind: CardKind },
    TargetRequired,
    #[serde(rename_all = "camelCase")]
    InvalidTarget { target: TargetRef },
    #[serde(rename_all = "camelCase")]
    TargetKnockedOut { target: TargetRef },
    #[serde(rename_all = "camelCase")]
    AlreadyActive { target: TargetRef },
    AbsorbNotSelected,
    #[serde(rename_all = "camelCase")]
    Effect { error: EffectError },
    #[serde(rename_all = "camelCase")]
    IntegrityViolation { error: IntegrityError },
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::DraftInProgress => write!(f, "Finish the draft first."),
            RuleError::DraftClosed => write!(f, "The draft is over."),
            RuleError::InvalidDraftPick { index } => {
                write!(f, "No character at draft slot {index}.")
            }
            RuleError::GameFinished => write!(f, "The game is over."),
            RuleError::ActionPending => write!(f, "Wait for the current action to finish."),
            RuleError::NoPendingAction => write!(f, "There is no action waiting to finish."),
            RuleError::PendingTokenMismatch { expected, actual } => {
                write!(f, "Pending action {actual} does not match {expected}.")
            }
            RuleError::NoActor => write!(
                f,
                "No available actor to perform actions; end your turn or pass."
            ),
            RuleError::NoCardSelected => write!(
                f,
                "No card selected. Choose a card to play or press Skip Action to pass."
            ),
            RuleError::CardNotFound { index } => write!(f, "No card at hand slot {index}."),
            RuleError::CardNotPlayable { kind } => {
                write!(f, "That {kind:?} card has no valid use right now.")
            }
            RuleError::TargetRequired => write!(f, "Select a target first."),
            RuleError::InvalidTarget { target } => write!(
                f,
                "Character {} on side {} is not a valid target.",
                target.idx, target.side
            ),
            RuleError::TargetKnockedOut { target } => write!(
                f,
                "Character {} on side {} is KO'd.",
                target.idx, target.side
            ),
            RuleError::AlreadyActive { .. } => write!(f, "That character is already active."),
            RuleError::AbsorbNotSelected => write!(f, "The selected card is not an Absorb card."),
            RuleError::Effect { error } => write!(f, "Absorb failed: {error}."),
            RuleError::IntegrityViolation { error } => {
                write!(f, "Saved game is inconsistent: {error:?}.")
            }
        }
    }
}

impl std::error::Error for RuleError {}

impl From<EffectError> for RuleError {
    fn from(error: EffectError) -> Self {
        RuleError::Effect { error }
    }
}

/// Validates and commits player actions. Arithmetic is delegated to the
/// pure functions in `effects`; this type decides what gets written back.
pub struct RuleEngine {
    turns: TurnSequencer,
    draft_picks_per_player: usize,
    hand_size: usize,
    next_token: PendingToken,
}

impl RuleEngine {
    pub fn new(config: &GameConfig) -> Self {
        let turns = match config.seed {
            Some(seed) => TurnSequencer::with_seed(config.hand_size, seed),
            None => TurnSequencer::new(config.hand_size),
        };
        Self {
            turns,
            draft_picks_per_player: config.draft_picks_per_player,
            hand_size: config.hand_size,
            next_token: 1,
        }
    }

    fn ensure_in_play(state: &GameState) -> Result<(), RuleError> {
        if state.is_draft {
            return Err(RuleError::DraftInProgress);
        }
        if state.is_finished() {
            return Err(RuleError::GameFinished);
        }
        if state.pending.is_some() {
            return Err(RuleError::ActionPending);
        }
        Ok(())
    }

    fn ensure_integrity(state: &GameState) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    fn issue_token(&mut self) -> PendingToken {
        let token = self.next_token;
        self.next_token += 1;
        token
    }

    pub fn start_draft(&mut self, state: &mut GameState) -> Vec<GameEvent> {
        *state = GameState::new(self.draft_picks_per_player);
        state.draft_pool = catalog::draft_pool();
        state.draft_turn = 0;
        state.is_draft = true;
        state.status_text = format!(
            "Drafting: {} picks first; pick {} each",
            state.players[0].name, state.draft_picks_per_player
        );
        info!("draft started");
        vec![GameEvent::DraftStarted { first_picker: 0 }]
    }

    pub fn pick_character(
        &mut self,
        state: &mut GameState,
        pool_idx: usize,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if !state.is_draft {
            return Err(RuleError::DraftClosed);
        }
        if pool_idx >= state.draft_pool.len() {
            return Err(RuleError::InvalidDraftPick { index: pool_idx });
        }

        let template = state.draft_pool.remove(pool_idx);
        let picked_by = state.draft_turn;
        let character = Character::from_template(&template);
        info!("{} drafted {}", state.players[picked_by].name, character.name);
        let mut events = vec![GameEvent::CharacterDrafted {
            player: picked_by,
            name: character.name.clone(),
        }];
        state.players[picked_by].chars.push(character);
        state.draft_turn = GameState::opponent_of(picked_by);

        if state.total_drafted() >= state.draft_picks_per_player * 2 {
            events.extend(self.start_game(state));
        } else {
            state.status_text = format!("{} picks next", state.players[state.draft_turn].name);
        }
        Ok(events)
    }

    /// Builds and shuffles the deck, deals opening hands one card at a time,
    /// and hands the first turn to the last drafter.
    pub fn start_game(&mut self, state: &mut GameState) -> Vec<GameEvent> {
        state.deck = catalog::build_deck(self.turns.rng_mut());
        state.discard.clear();
        for player in &mut state.players {
            player.hand.clear();
            player.start_turn();
        }
        for _ in 0..self.hand_size {
            for side in 0..state.players.len() {
                self.turns.draw_cards(state, side, 1);
            }
        }

        state.current_player = GameState::opponent_of(state.draft_turn);
        state.next_char_index = 0;
        state.is_draft = false;
        state.pending = None;
        state.outcome = None;
        state.clear_selection();
        state.status_text = format!(
            "{}'s turn. Deck: {} Discard: {}",
            state.current().name,
            state.deck.len(),
            state.discard.len()
        );
        info!("game started; {} moves first", state.current().name);

        vec![GameEvent::GameStarted {
            first_player: state.current_player,
            deck_size: state.deck.len(),
        }]
    }

    /// Selecting a card discards any target picked for a previous card.
    pub fn select_card(state: &mut GameState, idx: usize) -> Result<(), RuleError> {
        Self::ensure_in_play(state)?;
        let kind = state
            .current()
            .hand
            .get(idx)
            .map(|card| card.kind)
            .ok_or(RuleError::CardNotFound { index: idx })?;
        state.selected_card_idx = Some(idx);
        state.selected_target = None;
        state.status_text = match kind {
            CardKind::Attack => "Click an opposing character to target.",
            CardKind::AttackAll => {
                "Attack All will hit all opposing characters. Click End Action to confirm."
            }
            CardKind::Heal | CardKind::Revive => {
                "Click a friendly character to target (or End Action to skip)."
            }
            CardKind::Dodge | CardKind::Counter => "Select a friendly character to protect.",
            CardKind::HealAll
            | CardKind::Absorb
            | CardKind::Draw
            | CardKind::Discard
            | CardKind::Steal => "Card selected. Press End Action to play it (or Pass).",
        }
        .to_string();
        Ok(())
    }

    pub fn select_target(state: &mut GameState, target: TargetRef) -> Result<(), RuleError> {
        Self::ensure_in_play(state)?;
        let name = state
            .character(target)
            .map(|ch| ch.name.clone())
            .ok_or(RuleError::InvalidTarget { target })?;
        state.selected_target = Some(target);
        state.status_text = format!("Target selected: {name}");
        Ok(())
    }

    pub fn clear_selection(state: &mut GameState) -> Result<(), RuleError> {
        Self::ensure_in_play(state)?;
        state.clear_selection();
        Ok(())
    }

    /// Every non-KO character carrying damage, except the actor itself.
    pub fn absorb_donors(state: &GameState, actor: TargetRef) -> Vec<AbsorbDonor> {
        state
            .players
            .iter()
            .enumerate()
            .flat_map(|(side, player)| {
                player
                    .chars
                    .iter()
                    .enumerate()
                    .map(move |(idx, ch)| (TargetRef::new(side, idx), ch))
            })
            .filter(|(at, ch)| *at != actor && ch.is_damaged())
            .map(|(at, ch)| AbsorbDonor {
                side: at.side,
                idx: at.idx,
                name: ch.name.clone(),
                damage: ch.damage_taken(),
            })
            .collect()
    }

    pub fn is_card_playable(
        state: &GameState,
        card: &Card,
        player: PlayerIndex,
        actor_idx: CharIndex,
    ) -> bool {
        let team = &state.players[player];
        let opponent = &state.players[GameState::opponent_of(player)];
        match card.kind {
            CardKind::Attack | CardKind::AttackAll => opponent.has_alive(),
            CardKind::Heal | CardKind::HealAll => team.chars.iter().any(Character::is_damaged),
            CardKind::Revive => team.chars.iter().any(|ch| ch.is_ko),
            CardKind::Draw => true,
            CardKind::Discard | CardKind::Steal => !opponent.hand.is_empty(),
            CardKind::Absorb => {
                !Self::absorb_donors(state, TargetRef::new(player, actor_idx)).is_empty()
            }
            CardKind::Dodge | CardKind::Counter => team.has_alive(),
        }
    }

    /// Hand slots the current actor could legally play.
    pub fn playable_cards(state: &GameState) -> Vec<usize> {
        let Some(actor_idx) = TurnSequencer::current_actor_index(state) else {
            return Vec::new();
        };
        state
            .current()
            .hand
            .iter()
            .enumerate()
            .filter(|(_, card)| Self::is_card_playable(state, card, state.current_player, actor_idx))
            .map(|(idx, _)| idx)
            .collect()
    }

    fn selected_play(state: &GameState) -> Result<(usize, Card, CharIndex), RuleError> {
        Self::ensure_in_play(state)?;
        let card_idx = state.selected_card_idx.ok_or(RuleError::NoCardSelected)?;
        let card = state
            .current()
            .hand
            .get(card_idx)
            .cloned()
            .ok_or(RuleError::CardNotFound { index: card_idx })?;
        let actor_idx = TurnSequencer::current_actor_index(state).ok_or(RuleError::NoActor)?;
        if !Self::is_card_playable(state, &card, state.current_player, actor_idx) {
            return Err(RuleError::CardNotPlayable { kind: card.kind });
        }
        Ok((card_idx, card, actor_idx))
    }

    fn selected_target_on(state: &GameState, side: PlayerIndex) -> Result<TargetRef, RuleError> {
        let target = state.selected_target.ok_or(RuleError::TargetRequired)?;
        if target.side != side || state.character(target).is_none() {
            return Err(RuleError::InvalidTarget { target });
        }
        Ok(target)
    }

    fn standing_target_on(state: &GameState, side: PlayerIndex) -> Result<TargetRef, RuleError> {
        let target = Self::selected_target_on(state, side)?;
        match state.character(target) {
            Some(ch) if !ch.is_ko => Ok(target),
            _ => Err(RuleError::TargetKnockedOut { target }),
        }
    }

    pub fn absorb_plan(state: &GameState) -> Result<AbsorbPlan, RuleError> {
        let (_, card, actor_idx) = Self::selected_play(state)?;
        if card.kind != CardKind::Absorb {
            return Err(RuleError::AbsorbNotSelected);
        }
        let actor = TargetRef::new(state.current_player, actor_idx);
        Ok(AbsorbPlan {
            actor,
            cap: state.current().chars[actor_idx].magic.saturating_mul(card.mult),
            donors: Self::absorb_donors(state, actor),
        })
    }

    /// Resolves the selected card for the current actor.
    pub fn play_selected(&mut self, state: &mut GameState) -> Result<PlayOutcome, RuleError> {
        let (card_idx, card, actor_idx) = Self::selected_play(state)?;
        let player = state.current_player;
        let opponent = GameState::opponent_of(player);
        let actor_ref = TargetRef::new(player, actor_idx);
        let actor = state.current().chars[actor_idx].clone();

        // Validate before anything is written so a rejection leaves no trace.
        let target = match card.kind {
            CardKind::Attack => Some(Self::standing_target_on(state, opponent)?),
            CardKind::Heal | CardKind::Dodge | CardKind::Counter => {
                Some(Self::standing_target_on(state, player)?)
            }
            CardKind::Revive => {
                let target = Self::selected_target_on(state, player)?;
                if state.character(target).is_some_and(|ch| !ch.is_ko) {
                    return Err(RuleError::AlreadyActive { target });
                }
                Some(target)
            }
            CardKind::Absorb => {
                return Ok(PlayOutcome::AbsorbAllocation {
                    plan: Self::absorb_plan(state)?,
                });
            }
            CardKind::AttackAll
            | CardKind::HealAll
            | CardKind::Draw
            | CardKind::Discard
            | CardKind::Steal => None,
        };

        info!("{} uses {}", actor.name, card.name);
        let mut events = vec![GameEvent::CardPlayed {
            player,
            actor: actor.name.clone(),
            card: card.name.clone(),
        }];

        match (card.kind, target) {
            (CardKind::Attack, Some(target)) => {
                if let Some(defender) = state.character(target).cloned() {
                    let resolution = effects::attack(&actor, &defender, card.mult);
                    Self::commit_damage(state, target, actor_ref, &resolution, &mut events);
                }
            }
            (CardKind::AttackAll, _) => {
                let (refs, defenders): (Vec<TargetRef>, Vec<Character>) = state.players[opponent]
                    .chars
                    .iter()
                    .enumerate()
                    .filter(|(_, ch)| !ch.is_ko)
                    .map(|(idx, ch)| (TargetRef::new(opponent, idx), ch.clone()))
                    .unzip();
                let results = effects::attack_all(&actor, &defenders, card.mult);
                for (target, resolution) in refs.into_iter().zip(&results) {
                    Self::commit_damage(state, target, actor_ref, resolution, &mut events);
                }
            }
            (CardKind::Heal, Some(target)) => {
                if let Some(patient) = state.character(target).cloned() {
                    let resolution =
                        effects::apply_heal(&patient, actor.magic.saturating_mul(card.mult));
                    let hp = resolution.target.hp;
                    if let Some(slot) = state.character_mut(target) {
                        *slot = resolution.target;
                    }
                    events.push(GameEvent::Healed {
                        target,
                        amount: resolution.healed,
                        hp,
                    });
                }
            }
            (CardKind::HealAll, _) => {
                let (refs, patients): (Vec<TargetRef>, Vec<Character>) = state.players[player]
                    .chars
                    .iter()
                    .enumerate()
                    .filter(|(_, ch)| !ch.is_ko)
                    .map(|(idx, ch)| (TargetRef::new(player, idx), ch.clone()))
                    .unzip();
                let results = effects::heal_all(&actor, &patients, card.mult);
                for (target, resolution) in refs.into_iter().zip(results) {
                    if resolution.outcome == HealOutcome::Ko {
                        continue;
                    }
                    events.push(GameEvent::Healed {
                        target,
                        amount: resolution.healed,
                        hp: resolution.target.hp,
                    });
                    if let Some(slot) = state.character_mut(target) {
                        *slot = resolution.target;
                    }
                }
            }
            (CardKind::Revive, Some(target)) => {
                if let Some(fallen) = state.character(target).cloned() {
                    let resolution =
                        effects::revive(&fallen, actor.magic.saturating_mul(card.mult));
                    events.push(GameEvent::Revived {
                        target,
                        hp: resolution.target.hp,
                    });
                    if let Some(slot) = state.character_mut(target) {
                        *slot = resolution.target;
                    }
                }
            }
            (CardKind::Draw, _) => {
                let count = self.turns.draw_cards(state, player, card.mult as usize);
                events.push(GameEvent::CardsDrawn { player, count });
            }
            (CardKind::Discard, _) => {
                let resolution =
                    effects::discard_from_hand(&state.players[opponent].hand, card.mult as usize);
                events.push(GameEvent::CardsDiscarded {
                    player: opponent,
                    count: resolution.removed.len(),
                });
                state.players[opponent].hand = resolution.hand;
                state.discard.extend(resolution.removed);
            }
            (CardKind::Steal, _) => {
                let resolution =
                    effects::steal_card(&state.players[opponent].hand, &state.players[player].hand);
                events.push(GameEvent::CardStolen {
                    from: opponent,
                    to: player,
                    card: resolution.stolen.as_ref().map(|c| c.name.clone()),
                });
                if resolution.stolen.is_some() {
                    state.players[opponent].hand = resolution.from;
                    state.players[player].hand = resolution.to;
                    let token = self.issue_token();
                    let highlight_idx = state.players[player].hand.len() - 1;
                    state.pending = Some(PendingAction::StealReveal {
                        token,
                        player,
                        card_idx,
                        highlight_idx,
                    });
                    return Ok(PlayOutcome::RevealPending {
                        token,
                        highlight_idx,
                        events,
                    });
                }
            }
            (CardKind::Dodge, Some(target)) | (CardKind::Counter, Some(target)) => {
                let defense = if card.kind == CardKind::Dodge {
                    DefenseKind::Dodge
                } else {
                    DefenseKind::Counter
                };
                if let Some(ch) = state.character_mut(target) {
                    match defense {
                        DefenseKind::Dodge => ch.dodge = true,
                        DefenseKind::Counter => ch.counter = true,
                    }
                }
                events.push(GameEvent::DefenseSet { target, defense });
            }
            (CardKind::Attack, None)
            | (CardKind::Heal, None)
            | (CardKind::Revive, None)
            | (CardKind::Dodge, None)
            | (CardKind::Counter, None)
            | (CardKind::Absorb, _) => return Err(RuleError::TargetRequired),
        }

        Ok(PlayOutcome::Completed {
            resolution: Self::finish_play(state, card_idx, actor_idx, events),
        })
    }

    /// Writes one attack resolution back. Reflected damage is applied to the
    /// live attacker so several counters in one sweep accumulate.
    fn commit_damage(
        state: &mut GameState,
        target: TargetRef,
        attacker: TargetRef,
        resolution: &DamageResolution,
        events: &mut Vec<GameEvent>,
    ) {
        if let Some(slot) = state.character_mut(target) {
            *slot = resolution.target.clone();
        }
        match resolution.outcome {
            DamageOutcome::Dodged => events.push(GameEvent::Dodged { target }),
            DamageOutcome::Countered => {
                events.push(GameEvent::Countered {
                    target,
                    attacker,
                    amount: resolution.amount,
                });
                if let Some(live) = state.character_mut(attacker) {
                    let was_standing = !live.is_ko;
                    live.take_damage(resolution.amount);
                    if was_standing && live.is_ko {
                        events.push(GameEvent::KnockedOut { target: attacker });
                    }
                }
            }
            DamageOutcome::Damaged => {
                events.push(GameEvent::Damaged {
                    target,
                    amount: resolution.amount,
                    hp: resolution.target.hp,
                });
                if resolution.target.is_ko {
                    events.push(GameEvent::KnockedOut { target });
                }
            }
        }
    }

    /// Applies a confirmed absorb allocation atomically.
    pub fn confirm_absorb(
        &mut self,
        state: &mut GameState,
        requests: &[DonorRequest],
    ) -> Result<PlayOutcome, RuleError> {
        let plan = Self::absorb_plan(state)?;
        let card_idx = state.selected_card_idx.ok_or(RuleError::NoCardSelected)?;
        let actor_ref = plan.actor;

        let mut flat = Vec::with_capacity(requests.len());
        for request in requests.iter().filter(|r| r.amt > 0) {
            let target = TargetRef::new(request.side, request.idx);
            if target == actor_ref || state.character(target).is_none() {
                return Err(RuleError::InvalidTarget { target });
            }
            flat.push(AbsorbRequest::new(state.flat_index(target), request.amt));
        }

        let actor = state.current().chars[actor_ref.idx].clone();
        let donors = state.all_characters();
        let resolution = effects::absorb_transfer(&actor, &donors, &flat, plan.cap)?;

        let mut healed = resolution.donors.into_iter();
        for player in &mut state.players {
            for slot in &mut player.chars {
                if let Some(donor) = healed.next() {
                    *slot = donor;
                }
            }
        }
        let actor_ko = resolution.actor.is_ko;
        state.current_mut().chars[actor_ref.idx] = resolution.actor;
        info!("{} absorbed {} (self-damage)", actor.name, resolution.total);

        let card_name = state.current().hand[card_idx].name.clone();
        let mut events = vec![
            GameEvent::CardPlayed {
                player: actor_ref.side,
                actor: actor.name.clone(),
                card: card_name,
            },
            GameEvent::Absorbed {
                actor: actor_ref,
                total: resolution.total,
            },
        ];
        if actor_ko {
            events.push(GameEvent::KnockedOut { target: actor_ref });
        }

        Ok(PlayOutcome::Completed {
            resolution: Self::finish_play(state, card_idx, actor_ref.idx, events),
        })
    }

    /// Second phase of a two-phase action.
    pub fn complete_pending(
        &mut self,
        state: &mut GameState,
        token: PendingToken,
    ) -> Result<PlayOutcome, RuleError> {
        let pending = state.pending.clone().ok_or(RuleError::NoPendingAction)?;
        if pending.token() != token {
            return Err(RuleError::PendingTokenMismatch {
                expected: pending.token(),
                actual: token,
            });
        }
        let actor_idx = TurnSequencer::current_actor_index(state).ok_or(RuleError::NoActor)?;
        state.pending = None;
        match pending {
            PendingAction::StealReveal { card_idx, .. } => Ok(PlayOutcome::Completed {
                resolution: Self::finish_play(state, card_idx, actor_idx, Vec::new()),
            }),
        }
    }

    /// Shared tail of every completed play: discard the card, clear the
    /// selection, check for a winner, consume the actor.
    fn finish_play(
        state: &mut GameState,
        card_idx: usize,
        actor_idx: CharIndex,
        mut events: Vec<GameEvent>,
    ) -> ActionResolution {
        let player = state.current_player;
        if card_idx < state.players[player].hand.len() {
            let played = state.players[player].hand.remove(card_idx);
            state.discard.push(played);
        }
        state.clear_selection();

        let victory = TurnSequencer::evaluate_victory(state);
        if let Some(outcome) = &victory {
            events.push(GameEvent::GameWon {
                winner: outcome.winner,
            });
        }
        let progress = TurnSequencer::mark_used(state, actor_idx);
        ActionResolution {
            events,
            progress,
            victory,
        }
    }

    pub fn skip_action(&mut self, state: &mut GameState) -> Result<ActionResolution, RuleError> {
        Self::ensure_in_play(state)?;
        let actor_idx = TurnSequencer::current_actor_index(state).ok_or(RuleError::NoActor)?;
        let player = state.current_player;
        info!("{} skipped an action", state.current().name);
        state.clear_selection();
        let progress = TurnSequencer::mark_used(state, actor_idx);
        Ok(ActionResolution {
            events: vec![GameEvent::ActionSkipped { player }],
            progress,
            victory: None,
        })
    }

    pub fn end_turn(
        &mut self,
        state: &mut GameState,
    ) -> Result<(TurnSummary, Vec<GameEvent>), RuleError> {
        Self::ensure_in_play(state)?;
        Self::ensure_integrity(state)?;
        Ok(self.turns.end_turn(state))
    }
}
