//! Kill-chain stage taxonomy and alert classification
//!
//! Two levels of granularity: the simplified stage assigned by
//! classification, and the fine-grained kill-chain stages used by the lookup
//! index. Both are closed enums; the stage set is fixed, so exhaustive
//! matching replaces any open dispatch.

use super::address::IpAddress;
use rustc_hash::FxHashSet;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Which endpoint of a relation a stage treats as the victim for risk
/// purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Victim {
    Source,
    Destination,
}

/// Fine-grained kill-chain stage. Only used as a lookup-index dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KillChainStage {
    R,
    D1,
    D2,
    C2,
    H,
    L,
    S,
    P,
    E,
    O,
}

impl KillChainStage {
    /// Stages that must already have been observed at the relevant host for
    /// this stage to be a plausible continuation of an attack chain.
    pub fn preconditions(self) -> &'static [KillChainStage] {
        use KillChainStage::*;
        match self {
            R => &[],
            D1 => &[R],
            D2 => &[D1, H],
            C2 => &[D1, D2, C2, L, H],
            L => &[D1, D2, C2, L, E, O, S, H],
            P => &[D1, D2, C2, L, H],
            S => &[D1, D2, C2, L, P, H],
            E => &[D1, D2, C2, L, E, O, H],
            O => &[D1, D2, C2, L, E, O, H],
            H => &[L, C2, D1, D2, H],
        }
    }

    pub fn victim(self) -> Victim {
        use KillChainStage::*;
        match self {
            D1 | D2 | C2 | S | E | O => Victim::Source,
            R | H | L | P => Victim::Destination,
        }
    }
}

impl fmt::Display for KillChainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KillChainStage::R => "R",
            KillChainStage::D1 => "D1",
            KillChainStage::D2 => "D2",
            KillChainStage::C2 => "C2",
            KillChainStage::H => "H",
            KillChainStage::L => "L",
            KillChainStage::S => "S",
            KillChainStage::P => "P",
            KillChainStage::E => "E",
            KillChainStage::O => "O",
        };
        write!(f, "{}", name)
    }
}

/// Simplified stage assigned to every relation by classification.
///
/// `None` marks an address pair that does not fit any kill-chain transition;
/// such relations are discarded before correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum SimplifiedStage {
    Recon = 0,
    Host = 1,
    Lateral = 2,
    Pivot = 3,
    Exfiltration = 4,
    None = 5,
}

impl SimplifiedStage {
    /// The fine-grained stages a relation with this simplified stage may
    /// represent.
    pub fn kill_chain_stages(self) -> &'static [KillChainStage] {
        use KillChainStage::*;
        match self {
            SimplifiedStage::Recon => &[R, D1],
            SimplifiedStage::Host => &[H],
            SimplifiedStage::Lateral => &[L, S, O],
            SimplifiedStage::Pivot => &[L, P, S, O],
            SimplifiedStage::Exfiltration => &[C2, D2, E],
            SimplifiedStage::None => &[],
        }
    }

    pub fn victim(self) -> Victim {
        if self == SimplifiedStage::Exfiltration {
            Victim::Source
        } else {
            Victim::Destination
        }
    }

    /// Fixed relevance weight of this stage.
    pub fn weight(self) -> f32 {
        match self {
            SimplifiedStage::Recon => 0.5,
            SimplifiedStage::Host => 1.0,
            SimplifiedStage::Lateral => 1.25,
            SimplifiedStage::Pivot => 1.5,
            SimplifiedStage::Exfiltration => 2.0,
            SimplifiedStage::None => 0.0,
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SimplifiedStage::Recon),
            1 => Some(SimplifiedStage::Host),
            2 => Some(SimplifiedStage::Lateral),
            3 => Some(SimplifiedStage::Pivot),
            4 => Some(SimplifiedStage::Exfiltration),
            5 => Some(SimplifiedStage::None),
            _ => Option::None,
        }
    }
}

impl fmt::Display for SimplifiedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SimplifiedStage::Recon => "Recon",
            SimplifiedStage::Host => "Host",
            SimplifiedStage::Lateral => "Lateral",
            SimplifiedStage::Pivot => "Pivot",
            SimplifiedStage::Exfiltration => "Exfiltration",
            SimplifiedStage::None => "None",
        };
        write!(f, "{}", name)
    }
}

// The exported JSON carries the stage as its integer discriminant.
impl Serialize for SimplifiedStage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

struct SimplifiedStageVisitor;

impl Visitor<'_> for SimplifiedStageVisitor {
    type Value = SimplifiedStage;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a stage discriminant between 0 and 5")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<SimplifiedStage, E> {
        u8::try_from(value)
            .ok()
            .and_then(SimplifiedStage::from_u8)
            .ok_or_else(|| E::custom(format!("unknown stage discriminant {}", value)))
    }
}

impl<'de> Deserialize<'de> for SimplifiedStage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_u64(SimplifiedStageVisitor)
    }
}

/// Classify an address pair into its simplified stage.
///
/// The rules are evaluated in fixed priority order with a single winner:
/// Recon, Host, Pivot, Lateral, Exfiltration, then None.
pub fn classify(source: IpAddress, destination: IpAddress) -> SimplifiedStage {
    if !source.is_private() && destination.is_private() {
        SimplifiedStage::Recon
    } else if source == destination {
        SimplifiedStage::Host
    } else if source.is_private() && destination.is_private() && !source.is_same_subnet(&destination)
    {
        SimplifiedStage::Pivot
    } else if source.is_private() && destination.is_private() {
        SimplifiedStage::Lateral
    } else if source.is_private() && !destination.is_private() {
        SimplifiedStage::Exfiltration
    } else {
        SimplifiedStage::None
    }
}

/// Union of the preconditions of every fine-grained stage the simplified
/// stage may represent.
pub fn preconditions_of(stage: SimplifiedStage) -> FxHashSet<KillChainStage> {
    let mut result = FxHashSet::default();
    for kc_stage in stage.kill_chain_stages() {
        result.extend(kc_stage.preconditions().iter().copied());
    }
    result
}
