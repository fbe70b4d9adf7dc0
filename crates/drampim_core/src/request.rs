/*
    DramPIM
    https://github.com/dbalsom/drampim

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    request.rs

    Defines the in-flight memory request type, the handle-based request
    arena, and the bank/bank-group index derivation policies.

*/

use strum_macros::{Display, EnumString};

/// Irreducible polynomials used by the IPOLY bank hash, indexed by
/// log2(banks). From "Pseudo-randomly interleaved memory", Rau, ISCA 1991.
const IPOLY_TABLE: [u32; 7] = [
    0b1,       // 1 bank  (degenerate)
    0b11,      // 2 banks
    0b111,     // 4 banks
    0b1011,    // 8 banks
    0b10011,   // 16 banks
    0b100101,  // 32 banks
    0b1000011, // 64 banks
];

/// How the final bank index is derived from the decoded bank and row bits.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Display, EnumString, serde_derive::Deserialize)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum BankIndexPolicy {
    #[default]
    Linear,
    Xor,
    Ipoly,
    Custom,
}

/// Which bits of the bank index select the bank group.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Display, EnumString, serde_derive::Deserialize)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BankGroupIndexPolicy {
    #[default]
    #[strum(serialize = "HIGHER_BITS", serialize = "HigherBits")]
    HigherBits,
    #[strum(serialize = "LOWER_BITS", serialize = "LowerBits")]
    LowerBits,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AccessDir {
    Read,
    Write,
}

/// Decoded request as delivered by the interconnect. Address decoding is
/// upstream; the row/column/bank/channel split is already done.
#[derive(Copy, Clone, Debug)]
pub struct RequestDesc {
    pub chan: usize,
    pub bk: usize,
    pub row: u32,
    pub col: u32,
    pub is_write: bool,
    pub is_pim: bool,
    pub nbytes: u32,
    /// Opaque token handed back to the interconnect with the reply.
    pub tag: u64,
}

/// An in-flight request owned by one channel. Transfer progress is tracked
/// by two cursors: `txbytes` counts bytes scheduled onto the data bus,
/// `dqbytes` counts bytes that have finished traversing it.
#[derive(Clone, Debug)]
pub struct Req {
    pub bk: usize,
    pub grp: usize,
    pub row: u32,
    pub col: u32,
    pub rw: AccessDir,
    pub is_pim: bool,
    pub nbytes: u32,
    pub txbytes: u32,
    pub dqbytes: u32,
    /// Cycle the request entered the controller. Never re-stamped.
    pub arrival: u64,
    /// Age reference for FR-FCFS ordering; re-stamped when the request is
    /// dispatched to a bank so the service latency can be measured separately
    /// from the queueing latency.
    pub timestamp: u64,
    pub tag: u64,
}

impl Req {
    pub fn new(desc: &RequestDesc, nbk: usize, nbkgrp: usize, bank_policy: BankIndexPolicy, grp_policy: BankGroupIndexPolicy, now: u64) -> Req {
        let bk = match bank_policy {
            BankIndexPolicy::Linear => desc.bk,
            BankIndexPolicy::Xor => bitwise_bank_hash(desc.row, desc.bk, nbk),
            BankIndexPolicy::Ipoly => ipoly_bank_hash(desc.row, desc.bk, nbk),
            // No custom hash is defined; fall back to the raw bank bits.
            BankIndexPolicy::Custom => desc.bk,
        };
        assert!(bk < nbk, "bank index {} out of range ({} banks)", bk, nbk);

        Req {
            bk,
            grp: bankgrp_index(bk, nbk, nbkgrp, grp_policy),
            row: desc.row,
            col: desc.col,
            // PIM collective commands occupy the write path.
            rw: if desc.is_write || desc.is_pim {
                AccessDir::Write
            }
            else {
                AccessDir::Read
            },
            is_pim: desc.is_pim,
            nbytes: desc.nbytes,
            txbytes: 0,
            dqbytes: 0,
            arrival: now,
            timestamp: now,
            tag: desc.tag,
        }
    }

    #[inline]
    pub fn is_write(&self) -> bool {
        self.rw == AccessDir::Write
    }
}

/// XOR the low row bits into the bank bits.
pub fn bitwise_bank_hash(row: u32, bk: usize, nbk: usize) -> usize {
    debug_assert!(nbk.is_power_of_two());
    (bk ^ (row as usize)) & (nbk - 1)
}

/// IPOLY hash: fold the row into the bank bits with a Galois LFSR over the
/// irreducible polynomial for this bank count.
pub fn ipoly_bank_hash(row: u32, bk: usize, nbk: usize) -> usize {
    debug_assert!(nbk.is_power_of_two());
    let bits = nbk.trailing_zeros() as usize;
    if bits == 0 || bits >= IPOLY_TABLE.len() {
        return bk & (nbk.saturating_sub(1));
    }
    let poly = IPOLY_TABLE[bits];
    let mut acc: u32 = 0;
    let mut value = row;
    while value != 0 {
        acc ^= value & (nbk as u32 - 1);
        // One polynomial reduction step per digested chunk.
        let msb = acc >> (bits - 1) & 1;
        acc = ((acc << 1) ^ (msb * poly)) & (nbk as u32 - 1);
        value >>= bits;
    }
    ((acc as usize) ^ bk) & (nbk - 1)
}

pub fn bankgrp_index(bk: usize, nbk: usize, nbkgrp: usize, policy: BankGroupIndexPolicy) -> usize {
    match policy {
        BankGroupIndexPolicy::HigherBits => {
            let banks_per_grp = nbk / nbkgrp;
            bk / banks_per_grp
        }
        BankGroupIndexPolicy::LowerBits => bk & (nbkgrp - 1),
    }
}

/// Handle into the channel's request arena. Banks, queues and the data bus
/// pipeline all refer to requests by handle; a PIM request latched into every
/// bank is the same handle repeated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReqId(u32);

/// Slab-style arena owning every live request of one channel. Slots are
/// recycled through a free list; a handle is valid from `insert` until
/// `remove`.
#[derive(Default)]
pub struct ReqArena {
    slots: Vec<Option<Req>>,
    free: Vec<u32>,
    live: usize,
}

impl ReqArena {
    pub fn new() -> ReqArena {
        ReqArena::default()
    }

    pub fn insert(&mut self, req: Req) -> ReqId {
        self.live += 1;
        if let Some(idx) = self.free.pop() {
            debug_assert!(self.slots[idx as usize].is_none());
            self.slots[idx as usize] = Some(req);
            ReqId(idx)
        }
        else {
            self.slots.push(Some(req));
            ReqId((self.slots.len() - 1) as u32)
        }
    }

    pub fn get(&self, id: ReqId) -> &Req {
        self.slots[id.0 as usize].as_ref().expect("stale request handle")
    }

    pub fn get_mut(&mut self, id: ReqId) -> &mut Req {
        self.slots[id.0 as usize].as_mut().expect("stale request handle")
    }

    pub fn remove(&mut self, id: ReqId) -> Req {
        let req = self.slots[id.0 as usize].take().expect("double free of request handle");
        self.free.push(id.0);
        self.live -= 1;
        req
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(bk: usize, row: u32) -> RequestDesc {
        RequestDesc {
            chan: 0,
            bk,
            row,
            col: 0,
            is_write: false,
            is_pim: false,
            nbytes: 32,
            tag: 0,
        }
    }

    #[test]
    fn test_linear_bank_index() {
        let r = Req::new(&desc(5, 0x1234), 8, 2, BankIndexPolicy::Linear, BankGroupIndexPolicy::HigherBits, 0);
        assert_eq!(r.bk, 5);
        assert_eq!(r.grp, 1);
    }

    #[test]
    fn test_xor_bank_index_in_range() {
        for row in 0..64 {
            for bk in 0..8 {
                let r = Req::new(&desc(bk, row), 8, 2, BankIndexPolicy::Xor, BankGroupIndexPolicy::LowerBits, 0);
                assert!(r.bk < 8);
            }
        }
    }

    #[test]
    fn test_ipoly_bank_index_in_range_and_spreads() {
        let mut seen = [false; 16];
        for row in 0..256 {
            let r = Req::new(&desc(3, row), 16, 4, BankIndexPolicy::Ipoly, BankGroupIndexPolicy::HigherBits, 0);
            assert!(r.bk < 16);
            seen[r.bk] = true;
        }
        // A fixed bank with varying rows should scatter across banks.
        assert!(seen.iter().filter(|&&s| s).count() > 4);
    }

    #[test]
    fn test_bankgrp_bits() {
        assert_eq!(bankgrp_index(13, 16, 4, BankGroupIndexPolicy::HigherBits), 3);
        assert_eq!(bankgrp_index(13, 16, 4, BankGroupIndexPolicy::LowerBits), 1);
    }

    #[test]
    fn test_arena_recycles_slots() {
        let mut arena = ReqArena::new();
        let a = arena.insert(Req::new(&desc(0, 1), 4, 2, BankIndexPolicy::Linear, BankGroupIndexPolicy::HigherBits, 0));
        let b = arena.insert(Req::new(&desc(1, 2), 4, 2, BankIndexPolicy::Linear, BankGroupIndexPolicy::HigherBits, 0));
        assert_eq!(arena.len(), 2);
        let req = arena.remove(a);
        assert_eq!(req.row, 1);
        let c = arena.insert(Req::new(&desc(2, 3), 4, 2, BankIndexPolicy::Linear, BankGroupIndexPolicy::HigherBits, 0));
        // Slot of `a` is reused.
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(b).row, 2);
        assert_eq!(arena.get(c).row, 3);
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn test_arena_double_free_panics() {
        let mut arena = ReqArena::new();
        let a = arena.insert(Req::new(&desc(0, 1), 4, 2, BankIndexPolicy::Linear, BankGroupIndexPolicy::HigherBits, 0));
        arena.remove(a);
        arena.remove(a);
    }
}
