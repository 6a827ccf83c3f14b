use serde::{Deserialize, Serialize};

use super::catalog::CharacterTemplate;

/// Seat index of a player (0 or 1).
pub type PlayerIndex = usize;
/// Index into a player's roster.
pub type CharIndex = usize;

pub const PLAYER_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum CardKind {
    Attack,
    AttackAll,
    Heal,
    HealAll,
    Absorb,
    Revive,
    Draw,
    Discard,
    Steal,
    Dodge,
    Counter,
}

/// A card instance. Immutable once built into the deck.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CardKind,
    #[serde(default = "default_mult")]
    pub mult: u32,
    #[serde(default)]
    pub desc: String,
}

fn default_mult() -> u32 {
    1
}

impl Card {
    pub fn new(name: impl Into<String>, kind: CardKind, mult: u32, desc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            mult,
            desc: desc.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Character {
    pub name: String,
    pub hp: u32,
    #[serde(rename = "maxHP")]
    pub max_hp: u32,
    #[serde(rename = "str", default)]
    pub strength: u32,
    #[serde(rename = "mag", default)]
    pub magic: u32,
    #[serde(rename = "isKO", default)]
    pub is_ko: bool,
    #[serde(default)]
    pub dodge: bool,
    #[serde(default)]
    pub counter: bool,
}

impl Character {
    pub fn new(name: impl Into<String>, max_hp: u32, strength: u32, magic: u32) -> Self {
        Self {
            name: name.into(),
            hp: max_hp,
            max_hp,
            strength,
            magic,
            is_ko: max_hp == 0,
            dodge: false,
            counter: false,
        }
    }

    pub fn from_template(template: &CharacterTemplate) -> Self {
        Self::new(template.name.clone(), template.hp, template.strength, template.magic)
    }

    pub fn with_hp(mut self, hp: u32) -> Self {
        self.hp = hp.min(self.max_hp);
        self.is_ko = self.hp == 0;
        self
    }

    /// Damage the character currently carries (`maxHP - hp`).
    pub fn damage_taken(&self) -> u32 {
        self.max_hp.saturating_sub(self.hp)
    }

    pub fn is_damaged(&self) -> bool {
        !self.is_ko && self.hp < self.max_hp
    }

    /// Subtracts `amount`, flooring at zero and flagging KO.
    pub fn take_damage(&mut self, amount: u32) {
        self.hp = self.hp.saturating_sub(amount);
        if self.hp < 1 {
            self.hp = 0;
            self.is_ko = true;
        }
    }

    pub fn clear_defenses(&mut self) {
        self.dodge = false;
        self.counter = false;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: u8,
    pub name: String,
    #[serde(default)]
    pub chars: Vec<Character>,
    #[serde(default)]
    pub hand: Vec<Card>,
    #[serde(default)]
    pub used_this_turn: Vec<CharIndex>,
}

impl Player {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            name: format!("Player {id}"),
            chars: Vec::new(),
            hand: Vec::new(),
            used_this_turn: Vec::new(),
        }
    }

    pub fn has_alive(&self) -> bool {
        self.chars.iter().any(|ch| !ch.is_ko)
    }

    pub fn has_used(&self, idx: CharIndex) -> bool {
        self.used_this_turn.contains(&idx)
    }

    /// Records `idx` as having acted; a repeated index is ignored.
    pub fn mark_used(&mut self, idx: CharIndex) {
        if !self.has_used(idx) {
            self.used_this_turn.push(idx);
        }
    }

    pub fn start_turn(&mut self) {
        self.used_this_turn.clear();
        for ch in &mut self.chars {
            ch.clear_defenses();
        }
    }
}

/// A `{side, idx}` reference to one character on the table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TargetRef {
    pub side: PlayerIndex,
    pub idx: CharIndex,
}

impl TargetRef {
    pub fn new(side: PlayerIndex, idx: CharIndex) -> Self {
        Self { side, idx }
    }
}

/// Opaque completion token handed out by a two-phase action.
pub type PendingToken = u64;

/// Second half of an action whose first phase has already been committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PendingAction {
    #[serde(rename_all = "camelCase")]
    StealReveal {
        token: PendingToken,
        player: PlayerIndex,
        card_idx: usize,
        highlight_idx: usize,
    },
}

impl PendingAction {
    pub fn token(&self) -> PendingToken {
        match self {
            PendingAction::StealReveal { token, .. } => *token,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VictoryState {
    /// `None` when both rosters were wiped out by the same resolution.
    pub winner: Option<PlayerIndex>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DefenseKind {
    Dodge,
    Counter,
}

/// Game event stream, rendered by the page's log panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameEvent {
    #[serde(rename_all = "camelCase")]
    DraftStarted { first_picker: PlayerIndex },
    #[serde(rename_all = "camelCase")]
    CharacterDrafted { player: PlayerIndex, name: String },
    #[serde(rename_all = "camelCase")]
    GameStarted { first_player: PlayerIndex, deck_size: usize },
    #[serde(rename_all = "camelCase")]
    CardPlayed { player: PlayerIndex, actor: String, card: String },
    #[serde(rename_all = "camelCase")]
    Damaged { target: TargetRef, amount: u32, hp: u32 },
    #[serde(rename_all = "camelCase")]
    Dodged { target: TargetRef },
    #[serde(rename_all = "camelCase")]
    Countered { target: TargetRef, attacker: TargetRef, amount: u32 },
    #[serde(rename_all = "camelCase")]
    KnockedOut { target: TargetRef },
    #[serde(rename_all = "camelCase")]
    Healed { target: TargetRef, amount: u32, hp: u32 },
    #[serde(rename_all = "camelCase")]
    Revived { target: TargetRef, hp: u32 },
    #[serde(rename_all = "camelCase")]
    DefenseSet { target: TargetRef, defense: DefenseKind },
    #[serde(rename_all = "camelCase")]
    CardsDrawn { player: PlayerIndex, count: usize },
    #[serde(rename_all = "camelCase")]
    CardsDiscarded { player: PlayerIndex, count: usize },
    #[serde(rename_all = "camelCase")]
    CardStolen { from: PlayerIndex, to: PlayerIndex, card: Option<String> },
    #[serde(rename_all = "camelCase")]
    Absorbed { actor: TargetRef, total: u32 },
    #[serde(rename_all = "camelCase")]
    ActionSkipped { player: PlayerIndex },
    #[serde(rename_all = "camelCase")]
    TurnEnded { player: PlayerIndex, drawn: usize },
    #[serde(rename_all = "camelCase")]
    GameWon { winner: Option<PlayerIndex> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IntegrityError {
    #[serde(rename_all = "camelCase")]
    InvalidPlayerIndex { player: PlayerIndex },
    #[serde(rename_all = "camelCase")]
    HpOutOfRange { player: PlayerIndex, idx: CharIndex, hp: u32, max_hp: u32 },
    #[serde(rename_all = "camelCase")]
    KnockoutMismatch { player: PlayerIndex, idx: CharIndex },
    #[serde(rename_all = "camelCase")]
    DuplicateUsedIndex { player: PlayerIndex, idx: CharIndex },
    #[serde(rename_all = "camelCase")]
    UsedIndexOutOfRange { player: PlayerIndex, idx: CharIndex },
}

/// The live session aggregate. Cloning it yields an independent snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub players: [Player; PLAYER_COUNT],
    #[serde(default)]
    pub deck: Vec<Card>,
    #[serde(default)]
    pub discard: Vec<Card>,
    #[serde(default)]
    pub draft_pool: Vec<CharacterTemplate>,
    #[serde(default)]
    pub draft_turn: PlayerIndex,
    pub draft_picks_per_player: usize,
    pub current_player: PlayerIndex,
    pub next_char_index: CharIndex,
    #[serde(default)]
    pub selected_card_idx: Option<usize>,
    #[serde(default)]
    pub selected_target: Option<TargetRef>,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub status_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<VictoryState>,
}

impl GameState {
    pub fn new(draft_picks_per_player: usize) -> Self {
        Self {
            players: [Player::new(1), Player::new(2)],
            deck: Vec::new(),
            discard: Vec::new(),
            draft_pool: Vec::new(),
            draft_turn: 0,
            draft_picks_per_player,
            current_player: 0,
            next_char_index: 0,
            selected_card_idx: None,
            selected_target: None,
            is_draft: false,
            status_text: String::new(),
            pending: None,
            outcome: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn opponent_of(player: PlayerIndex) -> PlayerIndex {
        1 - player
    }

    pub fn current(&self) -> &Player {
        &self.players[self.current_player]
    }

    pub fn current_mut(&mut self) -> &mut Player {
        &mut self.players[self.current_player]
    }

    pub fn opponent(&self) -> &Player {
        &self.players[Self::opponent_of(self.current_player)]
    }

    pub fn character(&self, target: TargetRef) -> Option<&Character> {
        self.players.get(target.side)?.chars.get(target.idx)
    }

    pub fn character_mut(&mut self, target: TargetRef) -> Option<&mut Character> {
        self.players.get_mut(target.side)?.chars.get_mut(target.idx)
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn clear_selection(&mut self) {
        self.selected_card_idx = None;
        self.selected_target = None;
    }

    pub fn total_drafted(&self) -> usize {
        self.players.iter().map(|p| p.chars.len()).sum()
    }

    /// Flattened roster order used by absorb donor indices: all of player 0's
    /// characters, then all of player 1's.
    pub fn flat_index(&self, target: TargetRef) -> usize {
        self.players[..target.side]
            .iter()
            .map(|p| p.chars.len())
            .sum::<usize>()
            + target.idx
    }

    pub fn all_characters(&self) -> Vec<Character> {
        self.players
            .iter()
            .flat_map(|p| p.chars.iter().cloned())
            .collect()
    }

    /// Structural checks applied to snapshots loaded from storage.
    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        if self.current_player >= PLAYER_COUNT {
            return Err(IntegrityError::InvalidPlayerIndex {
                player: self.current_player,
            });
        }
        if self.draft_turn >= PLAYER_COUNT {
            return Err(IntegrityError::InvalidPlayerIndex {
                player: self.draft_turn,
            });
        }

        for (side, player) in self.players.iter().enumerate() {
            for (idx, ch) in player.chars.iter().enumerate() {
                if ch.hp > ch.max_hp {
                    return Err(IntegrityError::HpOutOfRange {
                        player: side,
                        idx,
                        hp: ch.hp,
                        max_hp: ch.max_hp,
                    });
                }
                if ch.is_ko != (ch.hp == 0) {
                    return Err(IntegrityError::KnockoutMismatch { player: side, idx });
                }
            }
            let mut seen = Vec::with_capacity(player.used_this_turn.len());
            for &idx in &player.used_this_turn {
                if idx >= player.chars.len() {
                    return Err(IntegrityError::UsedIndexOutOfRange { player: side, idx });
                }
                if seen.contains(&idx) {
                    return Err(IntegrityError::DuplicateUsedIndex { player: side, idx });
                }
                seen.push(idx);
            }
        }

        Ok(())
    }

    /// A small mid-game table for tests and page debugging.
    pub fn sample() -> Self {
        let mut state = Self::new(2);
        state.players[0].chars = vec![
            Character::new("Vex", 13, 4, 4),
            Character::new("Kalen", 17, 3, 3),
        ];
        state.players[1].chars = vec![
            Character::new("Anya", 23, 2, 2),
            Character::new("Thorne", 23, 3, 1),
        ];
        state.players[0].hand = vec![
            Card::new("Attack", CardKind::Attack, 1, "Deal STR damage to one character."),
            Card::new("Heal", CardKind::Heal, 1, "Heal MAG HP from one character."),
            Card::new("Dodge", CardKind::Dodge, 1, "Use when attacked to take zero damage."),
        ];
        state.players[1].hand = vec![
            Card::new("Attack II", CardKind::Attack, 2, "Deal STR x2 to one character."),
            Card::new("Counter", CardKind::Counter, 1, "Use when attacked to reverse the attack."),
        ];
        state.deck = vec![
            Card::new("Draw", CardKind::Draw, 1, "You may draw an additional card."),
            Card::new("Steal", CardKind::Steal, 1, "Take a card from opponent hand."),
            Card::new("Attack All", CardKind::AttackAll, 1, "Deal STR to all opposing characters."),
        ];
        state
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(3)
    }
}
