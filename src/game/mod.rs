//! Game core: state model, pure effects, turn order, rules, history and
//! persistence.

pub mod catalog;
pub mod config;
pub mod effects;
pub mod history;
pub mod rules;
pub mod session;
pub mod state;
pub mod storage;
pub mod turns;

pub use catalog::{CardTemplate, CharacterTemplate};
pub use config::GameConfig;
pub use effects::{
    AbsorbRequest, AbsorbResolution, DamageOutcome, DamageResolution, EffectError, HealOutcome,
    HealResolution, ReviveOutcome, ReviveResolution,
};
pub use history::{HistoryManager, HistoryPayload};
pub use rules::{
    AbsorbDonor, AbsorbPlan, ActionResolution, DonorRequest, PlayOutcome, RuleEngine, RuleError,
};
pub use session::GameSession;
pub use state::{
    Card, CardKind, CharIndex, Character, DefenseKind, GameEvent, GameState, IntegrityError,
    PendingAction, PendingToken, Player, PlayerIndex, TargetRef, VictoryState,
};
pub use storage::{BrowserStorage, KeyValueStore, MemoryStore, StorageError};
pub use turns::{TurnProgress, TurnSequencer, TurnSummary};
