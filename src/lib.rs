pub mod game;
pub mod utils;

use gloo_timers::future::TimeoutFuture;
use log::{warn, LevelFilter};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use game::{
    AbsorbPlan, ActionResolution, BrowserStorage, Card, CardKind, Character, DonorRequest,
    EffectError, GameConfig, GameEvent, GameSession, GameState, HistoryManager, IntegrityError,
    KeyValueStore, MemoryStore, PlayOutcome, RuleEngine, RuleError, StorageError, TargetRef,
    TurnProgress, TurnSequencer, TurnSummary, VictoryState,
};
use utils::{init_logging, set_panic_hook};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
    init_logging(LevelFilter::Info);
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(serde_to_js_error)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventsResponse {
    events: Vec<GameEvent>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TurnResponse {
    summary: TurnSummary,
    events: Vec<GameEvent>,
}

fn open_store() -> Box<dyn KeyValueStore> {
    match BrowserStorage::local() {
        Ok(storage) => Box::new(storage),
        Err(err) => {
            warn!("{err}; progress will not survive a reload");
            Box::new(MemoryStore::new())
        }
    }
}

#[wasm_bindgen]
pub struct GameEngine {
    session: GameSession<Box<dyn KeyValueStore>>,
}

#[wasm_bindgen]
impl GameEngine {
    /// Resumes the game saved in `localStorage`, or opens a new draft.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<GameEngine, JsValue> {
        let config = match config_json {
            Some(json) => GameConfig::from_json(&json).map_err(serde_to_js_error)?,
            None => GameConfig::default(),
        };
        Ok(GameEngine {
            session: GameSession::load_or_new(open_store(), config),
        })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        self.session.state_json().map_err(serde_to_js_error)
    }

    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_value(self.session.snapshot()).map_err(JsValue::from)
    }

    pub fn new_game(&mut self) -> Result<String, JsValue> {
        let events = self.session.new_game();
        to_json(&EventsResponse { events })
    }

    pub fn reset(&mut self) -> Result<String, JsValue> {
        let events = self.session.reset();
        to_json(&EventsResponse { events })
    }

    pub fn pick_character(&mut self, pool_idx: usize) -> Result<String, JsValue> {
        let events = self
            .session
            .pick_character(pool_idx)
            .map_err(to_js_error)?;
        to_json(&EventsResponse { events })
    }

    pub fn select_card(&mut self, idx: usize) -> Result<(), JsValue> {
        self.session.select_card(idx).map_err(to_js_error)
    }

    pub fn select_target(&mut self, side: usize, idx: usize) -> Result<(), JsValue> {
        self.session
            .select_target(TargetRef::new(side, idx))
            .map_err(to_js_error)
    }

    pub fn clear_selection(&mut self) -> Result<(), JsValue> {
        self.session.clear_selection().map_err(to_js_error)
    }

    /// Returns a tagged `PlayOutcome`: `completed`, `absorbAllocation` or
    /// `revealPending`.
    pub fn play_selected(&mut self) -> Result<String, JsValue> {
        let outcome = self.session.play_selected().map_err(to_js_error)?;
        to_json(&outcome)
    }

    /// `requests_json` is an array of `{side, idx, amt}`.
    pub fn confirm_absorb_json(&mut self, requests_json: &str) -> Result<String, JsValue> {
        let requests: Vec<DonorRequest> =
            serde_json::from_str(requests_json).map_err(serde_to_js_error)?;
        let outcome = self
            .session
            .confirm_absorb(&requests)
            .map_err(to_js_error)?;
        to_json(&outcome)
    }

    pub fn complete_pending(&mut self, token: u32) -> Result<String, JsValue> {
        let outcome = self
            .session
            .complete_pending(u64::from(token))
            .map_err(to_js_error)?;
        to_json(&outcome)
    }

    pub fn skip_action(&mut self) -> Result<String, JsValue> {
        let resolution = self.session.skip_action().map_err(to_js_error)?;
        to_json(&resolution)
    }

    pub fn end_turn(&mut self) -> Result<String, JsValue> {
        let (summary, events) = self.session.end_turn().map_err(to_js_error)?;
        to_json(&TurnResponse { summary, events })
    }

    pub fn undo(&mut self) -> bool {
        self.session.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.session.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.session.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.session.can_redo()
    }

    pub fn is_card_playable(&self, player: usize, card_idx: usize, actor_idx: usize) -> bool {
        self.session.is_card_playable(player, card_idx, actor_idx)
    }

    pub fn playable_cards(&self) -> Vec<u32> {
        self.session
            .playable_cards()
            .into_iter()
            .filter_map(|idx| u32::try_from(idx).ok())
            .collect()
    }

    pub fn current_actor_index(&self) -> Option<u32> {
        self.session
            .current_actor_index()
            .and_then(|idx| u32::try_from(idx).ok())
    }

    pub fn auto_end_delay_ms(&self) -> u32 {
        self.session.config().auto_end_delay_ms
    }

    pub fn steal_reveal_delay_ms(&self) -> u32 {
        self.session.config().steal_reveal_delay_ms
    }
}

/// Resolves after `ms` milliseconds. The page awaits this before finishing a
/// steal reveal or auto-ending a spent turn.
#[wasm_bindgen]
pub fn delay(ms: u32) -> Promise {
    future_to_promise(async move {
        if ms > 0 {
            TimeoutFuture::new(ms).await;
        }
        Ok(JsValue::UNDEFINED)
    })
}

#[wasm_bindgen(js_name = "isCardPlayable")]
pub fn is_card_playable(
    state: JsValue,
    card: JsValue,
    player: usize,
    actor_idx: usize,
) -> Result<bool, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let card: Card = from_value(card).map_err(JsValue::from)?;
    if player >= state.players.len() {
        return Ok(false);
    }
    Ok(RuleEngine::is_card_playable(&state, &card, player, actor_idx))
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    state
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))?;
    Ok(())
}
