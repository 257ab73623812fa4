//! Deterministic multiplex scheduling.
//!
//! A [`Scheduler`] turns a layout scheme, its configuration and the item
//! lengths into a sequence of [`Turn`]s, drawing every decision from the
//! seeded CSPRNG(s). Writer and reader construct identical schedulers from
//! the same manifest and therefore replay the identical turn sequence —
//! item order, chunk sizes, padding lengths, everything.
//!
//! Turn grammar per scheme:
//! - Simple: `Chunk*` (one full-length chunk per item, permuted order),
//!   then one terminal `Pad`.
//! - Frameshift / Fabric: alternating `Chunk Pad` pairs until every item is
//!   drained; the pad after the final chunk doubles as the terminal pad.
//!   With nothing to transfer at all, a single terminal `Pad` is emitted.

use obscur_crypto::StreamCsprng;
use obscur_proto::{FrameshiftConfig, PayloadLayoutScheme};

/// Pad length range for the Simple scheme's terminal pad, which has no
/// scheme config to draw ranges from.
const SIMPLE_TERMINAL_PAD: (u64, u64) = (0, 255);

/// One multiplexer action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Turn {
    /// Transfer `len` plaintext bytes of item `item` (an index into the
    /// manifest's payload items).
    Chunk {
        /// Item index in the manifest.
        item: usize,
        /// Plaintext bytes this turn.
        len: u64,
    },
    /// A padding stripe of `len` CSPRNG bytes.
    Pad {
        /// Padding length.
        len: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Chunk,
    Pad,
    Done,
}

/// Deterministic turn generator.
pub(crate) struct Scheduler {
    scheme: PayloadLayoutScheme,
    config: FrameshiftConfig,
    /// Item indices in play; Simple consumes this in permuted order.
    order: Vec<usize>,
    /// Remaining plaintext bytes, parallel to `order`.
    remaining: Vec<u64>,
    /// Simple: next position in `order`.
    position: usize,
    phase: Phase,
}

impl Scheduler {
    /// Build a scheduler over items in deterministic identifier order.
    ///
    /// `order` maps slots to manifest item indices; `lengths` are the
    /// corresponding plaintext lengths. For Simple the slot order is
    /// immediately permuted with the primary CSPRNG.
    pub(crate) fn new(
        scheme: PayloadLayoutScheme,
        config: FrameshiftConfig,
        mut order: Vec<usize>,
        lengths: Vec<u64>,
        primary: &mut StreamCsprng,
    ) -> Self {
        debug_assert_eq!(order.len(), lengths.len());
        let mut remaining = lengths;

        if scheme == PayloadLayoutScheme::Simple {
            // Permute slots and their lengths together.
            let mut slots: Vec<usize> = (0..order.len()).collect();
            primary.shuffle(&mut slots);
            order = slots.iter().map(|&slot| order[slot]).collect();
            remaining = slots.iter().map(|&slot| remaining[slot]).collect();
        }

        Self { scheme, config, order, remaining, position: 0, phase: Phase::Chunk }
    }

    /// Draw the next turn, or `None` when the payload region is complete.
    pub(crate) fn next_turn(
        &mut self,
        primary: &mut StreamCsprng,
        secondary: Option<&mut StreamCsprng>,
    ) -> Option<Turn> {
        match self.scheme {
            PayloadLayoutScheme::Simple => self.next_simple(primary),
            PayloadLayoutScheme::Frameshift => self.next_interleaved(primary, None),
            PayloadLayoutScheme::Fabric => self.next_interleaved(primary, secondary),
        }
    }

    fn next_simple(&mut self, primary: &mut StreamCsprng) -> Option<Turn> {
        match self.phase {
            Phase::Chunk => {
                if self.position < self.order.len() {
                    let slot = self.position;
                    self.position += 1;
                    let len = std::mem::take(&mut self.remaining[slot]);
                    Some(Turn::Chunk { item: self.order[slot], len })
                } else {
                    self.phase = Phase::Done;
                    let len =
                        primary.next_in_range(SIMPLE_TERMINAL_PAD.0, SIMPLE_TERMINAL_PAD.1);
                    Some(Turn::Pad { len })
                }
            },
            Phase::Pad | Phase::Done => None,
        }
    }

    fn next_interleaved(
        &mut self,
        primary: &mut StreamCsprng,
        secondary: Option<&mut StreamCsprng>,
    ) -> Option<Turn> {
        match self.phase {
            Phase::Chunk => {
                let active: Vec<usize> = (0..self.order.len())
                    .filter(|&slot| self.remaining[slot] > 0)
                    .collect();

                if active.is_empty() {
                    // Nothing was ever transferred; the terminal pad still
                    // marks the region.
                    self.phase = Phase::Done;
                    return Some(self.pad_turn(primary, secondary));
                }

                let pick = primary.next_in_range(0, active.len() as u64 - 1) as usize;
                let slot = active[pick];
                let drawn = primary
                    .next_in_range(u64::from(self.config.min_chunk), u64::from(self.config.max_chunk));
                let len = drawn.min(self.remaining[slot]);
                self.remaining[slot] -= len;

                self.phase = Phase::Pad;
                Some(Turn::Chunk { item: self.order[slot], len })
            },
            Phase::Pad => {
                let done = self.remaining.iter().all(|&rem| rem == 0);
                let turn = self.pad_turn(primary, secondary);
                self.phase = if done { Phase::Done } else { Phase::Chunk };
                Some(turn)
            },
            Phase::Done => None,
        }
    }

    fn pad_turn(
        &mut self,
        primary: &mut StreamCsprng,
        secondary: Option<&mut StreamCsprng>,
    ) -> Turn {
        // Fabric draws pad lengths (and bytes) from the secondary stream;
        // the other schemes use the primary.
        let rng = match (self.scheme, secondary) {
            (PayloadLayoutScheme::Fabric, Some(secondary)) => secondary,
            _ => primary,
        };
        let len = rng.next_in_range(u64::from(self.config.min_shift), u64::from(self.config.max_shift));
        Turn::Pad { len }
    }

    /// Which CSPRNG fills (or skips) pad bytes for this scheme.
    pub(crate) fn pad_uses_secondary(&self) -> bool {
        self.scheme == PayloadLayoutScheme::Fabric
    }
}
