//! Static content: the draftable characters and the card list the deck is
//! built from.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::state::{Card, CardKind};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CharacterTemplate {
    pub name: String,
    pub hp: u32,
    #[serde(rename = "str")]
    pub strength: u32,
    #[serde(rename = "mag")]
    pub magic: u32,
}

impl CharacterTemplate {
    fn new(name: &str, hp: u32, strength: u32, magic: u32) -> Self {
        Self {
            name: name.to_string(),
            hp,
            strength,
            magic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardTemplate {
    pub card: Card,
    pub count: usize,
}

impl CardTemplate {
    fn new(name: &str, kind: CardKind, mult: u32, count: usize, desc: &str) -> Self {
        Self {
            card: Card::new(name, kind, mult, desc),
            count,
        }
    }
}

pub static CHARACTER_TEMPLATES: Lazy<Vec<CharacterTemplate>> = Lazy::new(|| {
    vec![
        CharacterTemplate::new("Vex", 13, 4, 4),
        CharacterTemplate::new("Kalen", 17, 3, 3),
        CharacterTemplate::new("Anya", 23, 2, 2),
        CharacterTemplate::new("Sera", 30, 1, 1),
        CharacterTemplate::new("Gideon", 17, 4, 2),
        CharacterTemplate::new("Mystra", 17, 2, 4),
        CharacterTemplate::new("Sybil", 23, 1, 3),
        CharacterTemplate::new("Thorne", 23, 3, 1),
    ]
});

pub static CARD_TEMPLATES: Lazy<Vec<CardTemplate>> = Lazy::new(|| {
    use CardKind::*;
    vec![
        CardTemplate::new("Attack", Attack, 1, 13, "Deal STR damage to one character."),
        CardTemplate::new("Attack II", Attack, 2, 10, "Deal STR x2 to one character."),
        CardTemplate::new("Attack III", Attack, 3, 8, "Deal STR x3 to one character."),
        CardTemplate::new("Attack All", AttackAll, 1, 9, "Deal STR to all opposing characters."),
        CardTemplate::new("Attack All II", AttackAll, 2, 3, "Deal STR x2 to all opposing characters."),
        CardTemplate::new("Heal", Heal, 1, 5, "Heal MAG HP from one character."),
        CardTemplate::new("Heal II", Heal, 2, 3, "Heal MAG x2."),
        CardTemplate::new("Heal III", Heal, 3, 2, "Heal MAG x3."),
        CardTemplate::new("Heal All", HealAll, 1, 2, "Heal MAG from all friendly characters."),
        CardTemplate::new("Heal All II", HealAll, 2, 1, "Heal MAG x2 from all friendly characters."),
        CardTemplate::new("Absorb", Absorb, 1, 4, "Move up to MAG damage from elsewhere to self."),
        CardTemplate::new("Absorb II", Absorb, 2, 3, "Move up to MAG x2."),
        CardTemplate::new("Absorb III", Absorb, 3, 2, "Move up to MAG x3."),
        CardTemplate::new("Revive", Revive, 1, 7, "Revive and heal up to MAG HP."),
        CardTemplate::new("Revive II", Revive, 2, 3, "Revive and heal up to MAG x2."),
        CardTemplate::new("Discard", Discard, 1, 4, "Opponent discards 1 card."),
        CardTemplate::new("Discard II", Discard, 2, 2, "Opponent discards 2 cards."),
        CardTemplate::new("Draw", Draw, 1, 4, "You may draw an additional card."),
        CardTemplate::new("Draw II", Draw, 2, 2, "Draw up to 2 additional cards."),
        CardTemplate::new("Steal", Steal, 1, 3, "Take a card from opponent hand."),
        CardTemplate::new("Dodge", Dodge, 1, 7, "Use when attacked to take zero damage."),
        CardTemplate::new("Counter", Counter, 1, 3, "Use when attacked to reverse the attack."),
    ]
});

pub fn draft_pool() -> Vec<CharacterTemplate> {
    CHARACTER_TEMPLATES.clone()
}

pub fn deck_size() -> usize {
    CARD_TEMPLATES.iter().map(|t| t.count).sum()
}

/// Replicates every template by its count and shuffles the result.
pub fn build_deck<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    let mut deck: Vec<Card> = CARD_TEMPLATES
        .iter()
        .flat_map(|t| std::iter::repeat(t.card.clone()).take(t.count))
        .collect();
    deck.shuffle(rng);
    deck
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn deck_contains_every_copy() {
        let mut rng = SmallRng::seed_from_u64(3);
        let deck = build_deck(&mut rng);
        assert_eq!(deck.len(), 100);
        assert_eq!(deck.len(), deck_size());
        let attacks = deck.iter().filter(|c| c.name == "Attack").count();
        assert_eq!(attacks, 13);
        let counters = deck.iter().filter(|c| c.kind == CardKind::Counter).count();
        assert_eq!(counters, 3);
    }

    #[test]
    fn seeded_decks_are_reproducible() {
        let a = build_deck(&mut SmallRng::seed_from_u64(11));
        let b = build_deck(&mut SmallRng::seed_from_u64(11));
        assert_eq!(a, b);
    }

    #[test]
    fn draft_pool_has_eight_characters() {
        let pool = draft_pool();
        assert_eq!(pool.len(), 8);
        assert_eq!(pool[3].name, "Sera");
        assert_eq!(pool[3].hp, 30);
    }
}
