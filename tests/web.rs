//! Browser tests for `localStorage` persistence. Run with
//! `wasm-pack test --headless --firefox`.

#![cfg(target_arch = "wasm32")]

use rpg_battle::{BrowserStorage, GameConfig, GameEngine, GameSession, KeyValueStore};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn config(key: &str) -> GameConfig {
    GameConfig::default().with_storage_key(key).with_seed(3)
}

#[wasm_bindgen_test]
fn local_storage_reads_back_values() {
    let mut storage = BrowserStorage::local().expect("localStorage available");
    storage.set("rpg_battle_test_kv", "42").expect("set item");
    assert_eq!(
        storage.get("rpg_battle_test_kv").expect("get item"),
        Some("42".to_string())
    );
    storage.remove("rpg_battle_test_kv").expect("remove item");
    assert_eq!(storage.get("rpg_battle_test_kv").expect("get item"), None);
}

#[wasm_bindgen_test]
fn session_survives_reload() {
    let key = "rpg_battle_test_reload";
    let storage = BrowserStorage::local().expect("localStorage available");
    let mut session = GameSession::load_or_new(storage, config(key));
    session.reset();
    for _ in 0..6 {
        session.pick_character(0).expect("draft pick");
    }
    let live = session.snapshot().clone();

    let storage = BrowserStorage::local().expect("localStorage available");
    let resumed = GameSession::load_or_new(storage, config(key));
    assert_eq!(resumed.snapshot(), &live);
    assert!(resumed.can_undo());

    let mut storage = resumed.into_store();
    storage.remove(key).expect("cleanup state");
    storage
        .remove(&config(key).history_key())
        .expect("cleanup history");
}

#[wasm_bindgen_test]
fn engine_reports_rejections_as_errors() {
    let mut engine = GameEngine::new(Some(r#"{"storageKey":"rpg_battle_test_engine"}"#.into()))
        .expect("engine builds");
    engine.reset().expect("fresh draft");
    assert!(engine.skip_action().is_err());
    assert!(engine.pick_character(99).is_err());
    assert!(engine.pick_character(0).is_ok());
    assert!(engine.can_undo());
    assert!(engine.undo());
    assert_eq!(engine.steal_reveal_delay_ms(), 500);
    assert_eq!(engine.auto_end_delay_ms(), 600);
}
