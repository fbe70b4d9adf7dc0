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

    bank.rs

    Per-bank and per-bank-group state: the IDLE/ACTIVE row buffer state
    machine and the DDR timing countdown registers it carries.

*/

use crate::request::ReqId;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BankState {
    #[default]
    Idle,
    Active,
}

/// Saturating countdown used by every timing register. A command is legal
/// only when the relevant counters read zero.
#[inline]
pub fn dec_to_zero(c: &mut u32) {
    if *c > 0 {
        *c -= 1;
    }
}

/// One DRAM bank. `curr_row` is only meaningful while `state` is Active;
/// `mrq` is the request currently latched for service (at most one), which
/// during a PIM window is the same handle in every bank of the channel.
#[derive(Clone, Debug, Default)]
pub struct Bank {
    pub state: BankState,
    pub curr_row: u32,
    pub mrq: Option<ReqId>,

    // Per-bank timing counters, decremented once per channel cycle.
    pub rcd: u32,   // ACT to RD
    pub rcdwr: u32, // ACT to WR
    pub ras: u32,   // ACT to PRE
    pub rp: u32,    // PRE to ACT
    pub rc: u32,    // ACT to ACT
    pub wtp: u32,   // WR to PRE
    pub rtp: u32,   // RD to PRE

    pub n_access: u64,
    pub n_writes: u64,
    pub n_idle: u64,

    pub grp: usize,
}

impl Bank {
    pub fn new(grp: usize) -> Bank {
        Bank {
            grp,
            ..Default::default()
        }
    }

    /// True when every per-bank counter has drained. Used only for the
    /// "still busy" activity statistic.
    #[inline]
    pub fn timers_clear(&self) -> bool {
        self.rcd == 0 && self.rcdwr == 0 && self.ras == 0 && self.rp == 0 && self.rc == 0
    }

    #[inline]
    pub fn tick(&mut self) {
        dec_to_zero(&mut self.rcd);
        dec_to_zero(&mut self.ras);
        dec_to_zero(&mut self.rc);
        dec_to_zero(&mut self.rp);
        dec_to_zero(&mut self.rcdwr);
        dec_to_zero(&mut self.wtp);
        dec_to_zero(&mut self.rtp);
    }
}

/// A bank group has no behavioral identity beyond the two long-CCD timing
/// counters coupling its member banks.
#[derive(Clone, Debug, Default)]
pub struct BankGroup {
    pub ccdl: u32, // column to column, same group
    pub rtpl: u32, // read to precharge, same group
}

impl BankGroup {
    #[inline]
    pub fn tick(&mut self) {
        dec_to_zero(&mut self.ccdl);
        dec_to_zero(&mut self.rtpl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dec_to_zero_saturates() {
        let mut c = 2;
        dec_to_zero(&mut c);
        assert_eq!(c, 1);
        dec_to_zero(&mut c);
        assert_eq!(c, 0);
        dec_to_zero(&mut c);
        assert_eq!(c, 0);
    }

    #[test]
    fn test_bank_tick_drains_all_counters() {
        let mut bank = Bank::new(0);
        bank.rcd = 3;
        bank.ras = 2;
        bank.wtp = 1;
        for _ in 0..3 {
            bank.tick();
        }
        assert!(bank.timers_clear());
        assert_eq!(bank.wtp, 0);
    }
}
