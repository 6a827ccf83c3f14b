//! Pure combat arithmetic. Every function takes borrowed inputs, works on
//! clones, and returns new values; nothing here touches session state.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::state::Character;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DamageOutcome {
    Dodged,
    Countered,
    Damaged,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DamageResolution {
    pub target: Character,
    pub attacker: Option<Character>,
    pub outcome: DamageOutcome,
    pub amount: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealOutcome {
    Ko,
    Healed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealResolution {
    pub target: Character,
    pub healed: u32,
    pub outcome: HealOutcome,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviveOutcome {
    Already,
    Revived,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviveResolution {
    pub target: Character,
    pub outcome: ReviveOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscardResolution<T> {
    pub hand: Vec<T>,
    /// Last card of the hand first.
    pub removed: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StealResolution<T> {
    pub from: Vec<T>,
    pub to: Vec<T>,
    pub stolen: Option<T>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AbsorbRequest {
    pub donor_index: usize,
    pub amt: u32,
}

impl AbsorbRequest {
    pub fn new(donor_index: usize, amt: u32) -> Self {
        Self { donor_index, amt }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AbsorbResolution {
    pub actor: Character,
    pub donors: Vec<Character>,
    pub total: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EffectError {
    #[serde(rename_all = "camelCase")]
    CapExceeded { requested: u32, cap: u32 },
    #[serde(rename_all = "camelCase")]
    InvalidDonor { donor_index: usize },
    #[serde(rename_all = "camelCase")]
    DonorKnockedOut { donor_index: usize },
    #[serde(rename_all = "camelCase")]
    InsufficientDamage {
        donor_index: usize,
        requested: u32,
        available: u32,
    },
}

impl fmt::Display for EffectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectError::CapExceeded { requested, cap } => {
                write!(f, "absorb total {requested} exceeds cap {cap}")
            }
            EffectError::InvalidDonor { donor_index } => {
                write!(f, "donor {donor_index} does not exist")
            }
            EffectError::DonorKnockedOut { donor_index } => {
                write!(f, "donor {donor_index} is knocked out")
            }
            EffectError::InsufficientDamage {
                donor_index,
                requested,
                available,
            } => write!(
                f,
                "donor {donor_index} carries {available} damage, {requested} requested"
            ),
        }
    }
}

impl std::error::Error for EffectError {}

/// Resolves one hit. Dodge beats counter; counter needs an attacker to
/// reflect onto. At most one branch fires.
pub fn apply_damage(
    target: &Character,
    amount: u32,
    attacker: Option<&Character>,
) -> DamageResolution {
    let mut target = target.clone();
    let mut attacker = attacker.cloned();

    if target.dodge {
        target.dodge = false;
        return DamageResolution {
            target,
            attacker,
            outcome: DamageOutcome::Dodged,
            amount,
        };
    }

    if target.counter {
        if let Some(reflected) = attacker.as_mut() {
            target.counter = false;
            reflected.take_damage(amount);
            return DamageResolution {
                target,
                attacker,
                outcome: DamageOutcome::Countered,
                amount,
            };
        }
    }

    target.take_damage(amount);
    DamageResolution {
        target,
        attacker,
        outcome: DamageOutcome::Damaged,
        amount,
    }
}

pub fn apply_heal(target: &Character, amount: u32) -> HealResolution {
    let mut target = target.clone();
    if target.is_ko {
        return HealResolution {
            target,
            healed: 0,
            outcome: HealOutcome::Ko,
        };
    }
    let before = target.hp;
    target.hp = target.max_hp.min(target.hp.saturating_add(amount));
    HealResolution {
        healed: target.hp - before,
        target,
        outcome: HealOutcome::Healed,
    }
}

/// Brings a KO'd character back with `min(maxHP, amount)` HP. The amount is
/// absolute, not added to zero.
pub fn revive(target: &Character, amount: u32) -> ReviveResolution {
    let mut target = target.clone();
    if !target.is_ko {
        return ReviveResolution {
            target,
            outcome: ReviveOutcome::Already,
        };
    }
    target.hp = target.max_hp.min(amount);
    // a zero-HP revive leaves the character down
    target.is_ko = target.hp == 0;
    ReviveResolution {
        target,
        outcome: ReviveOutcome::Revived,
    }
}

pub fn attack(actor: &Character, target: &Character, mult: u32) -> DamageResolution {
    apply_damage(target, actor.strength.saturating_mul(mult), Some(actor))
}

/// Each target is resolved against the same unmodified actor; a counter on
/// one target does not affect the others.
pub fn attack_all(actor: &Character, targets: &[Character], mult: u32) -> Vec<DamageResolution> {
    targets
        .iter()
        .map(|target| attack(actor, target, mult))
        .collect()
}

pub fn heal_all(healer: &Character, targets: &[Character], mult: u32) -> Vec<HealResolution> {
    let amount = healer.magic.saturating_mul(mult);
    targets
        .iter()
        .map(|target| apply_heal(target, amount))
        .collect()
}

pub fn discard_from_hand<T: Clone>(hand: &[T], count: usize) -> DiscardResolution<T> {
    let keep = hand.len().saturating_sub(count);
    let removed = hand[keep..].iter().rev().cloned().collect();
    DiscardResolution {
        hand: hand[..keep].to_vec(),
        removed,
    }
}

pub fn steal_card<T: Clone>(from: &[T], to: &[T]) -> StealResolution<T> {
    let mut from = from.to_vec();
    let mut to = to.to_vec();
    let stolen = from.pop();
    if let Some(card) = &stolen {
        to.push(card.clone());
    }
    StealResolution { from, to, stolen }
}

/// Moves damage off `donors` onto `actor`.
///
/// All preconditions are checked before anything is copied, so a rejected
/// request leaves no partial transfer behind:
/// - the summed amount may not exceed `cap`;
/// - every donor index must exist;
/// - KO'd donors cannot give;
/// - a donor cannot give more than the damage it carries. Several requests
///   naming the same donor are summed before this check.
pub fn absorb_transfer(
    actor: &Character,
    donors: &[Character],
    requests: &[AbsorbRequest],
    cap: u32,
) -> Result<AbsorbResolution, EffectError> {
    let total = requests
        .iter()
        .fold(0u32, |sum, request| sum.saturating_add(request.amt));
    if total > cap {
        return Err(EffectError::CapExceeded {
            requested: total,
            cap,
        });
    }

    let mut per_donor = vec![0u32; donors.len()];
    for request in requests {
        let donor = donors
            .get(request.donor_index)
            .ok_or(EffectError::InvalidDonor {
                donor_index: request.donor_index,
            })?;
        if donor.is_ko {
            return Err(EffectError::DonorKnockedOut {
                donor_index: request.donor_index,
            });
        }
        let requested = per_donor[request.donor_index].saturating_add(request.amt);
        let available = donor.damage_taken();
        if requested > available {
            return Err(EffectError::InsufficientDamage {
                donor_index: request.donor_index,
                requested,
                available,
            });
        }
        per_donor[request.donor_index] = requested;
    }

    let donors = donors
        .iter()
        .zip(&per_donor)
        .map(|(donor, &amt)| {
            let mut donor = donor.clone();
            donor.hp = donor.max_hp.min(donor.hp + amt);
            donor
        })
        .collect();
    let mut actor = actor.clone();
    actor.take_damage(total);

    Ok(AbsorbResolution {
        actor,
        donors,
        total,
    })
}
