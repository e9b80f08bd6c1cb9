// ── P2P frame types and vendor elements ──
//
// Vendor-specific information elements can be attached per frame type.
// Callers address frame types through a bitmask; the engine keeps one
// optional buffer per type.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, IntoEnumIterator};

/// P2P management frame kinds, in mask-bit order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumCount,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FrameType {
    ProbeReqP2p,
    ProbeRespP2p,
    ProbeRespP2pGo,
    BeaconP2pGo,
    PdReq,
    PdResp,
    GoNegReq,
    GoNegResp,
    GoNegConf,
    InvReq,
    InvResp,
    AssocReq,
    AssocResp,
}

impl FrameType {
    pub fn bit(self) -> u32 {
        // Variants are declared in bit order.
        FrameType::iter()
            .position(|ft| ft == self)
            .map_or(0, |idx| 1u32 << idx)
    }
}

/// Bitmask selecting a set of `FrameType`s. Unknown bits are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameTypeMask(pub u32);

impl FrameTypeMask {
    pub fn all() -> Self {
        Self(FrameType::iter().fold(0, |acc, ft| acc | ft.bit()))
    }

    pub fn contains(self, frame: FrameType) -> bool {
        self.0 & frame.bit() != 0
    }

    pub fn frame_types(self) -> impl Iterator<Item = FrameType> {
        FrameType::iter().filter(move |ft| self.contains(*ft))
    }
}

impl FromIterator<FrameType> for FrameTypeMask {
    fn from_iter<I: IntoIterator<Item = FrameType>>(iter: I) -> Self {
        Self(iter.into_iter().fold(0, |acc, ft| acc | ft.bit()))
    }
}

// ── VendorElementSet ────────────────────────────────────────────────

/// Per-frame-type vendor element buffers.
///
/// An empty value clears the slot; anything else replaces the previous
/// buffer wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorElementSet {
    slots: BTreeMap<FrameType, Bytes>,
}

impl VendorElementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, frame: FrameType, elements: Option<Bytes>) {
        match elements.filter(|b| !b.is_empty()) {
            Some(bytes) => {
                self.slots.insert(frame, bytes);
            }
            None => {
                self.slots.remove(&frame);
            }
        }
    }

    pub fn get(&self, frame: FrameType) -> Option<&Bytes> {
        self.slots.get(&frame)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
