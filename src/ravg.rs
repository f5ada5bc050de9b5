//! Decayed Running Averages
//!
//! A `RavgData` tracks an exponentially decaying average of a value that
//! changes at arbitrary points in time, without a periodic timer. Time is
//! cut into half-life windows. Each window's contribution halves for every
//! window that has since elapsed.
//!
//! ## Representation
//!
//! - `val`: the instantaneous value, limited to `RAVG_VAL_BITS` bits
//! - `val_at`: when `val` was last set
//! - `old`: decayed sum of all fully elapsed windows
//! - `cur`: sum over the elapsed part of the current window
//!
//! `old` and `cur` are fixed point with `RAVG_FRAC_BITS` fractional bits,
//! so a value `v` held for a full window contributes `v << RAVG_FRAC_BITS`.
//!
//! ## Accuracy
//!
//! Fully elapsed middle windows are folded in with a table of precomputed
//! decayed sums instead of a loop. Gaps longer than the table clamp to its
//! last entry. Beyond that point every further term is below the fixed
//! point resolution, so the clamped entry is also the exact continuation.
//! Additions saturate and shifts of 64 or more decay to zero.

/// Bits available to `val`. Larger inputs are clamped.
pub const RAVG_VAL_BITS: u32 = 44;

/// Fractional bits of `old`, `cur` and `read()` results.
pub const RAVG_FRAC_BITS: u32 = 20;

/// 1.0 in fixed point.
pub const RAVG_ONE: u64 = 1 << RAVG_FRAC_BITS;

const RAVG_VAL_MAX: u64 = (1 << RAVG_VAL_BITS) - 1;

/// `RAVG_FULL_SUM[n]` is `sum(1 / 2^i for i in 1..=n+1)` in fixed point:
/// the weight of `n + 1` consecutive full windows ending one window before
/// the current one.
const RAVG_FULL_SUM: [u64; 20] = [
    524288, 786432, 917504, 983040, 1015808, 1032192, 1040384, 1044480, 1046528, 1047552,
    1048064, 1048320, 1048448, 1048512, 1048544, 1048560, 1048568, 1048572, 1048574, 1048575,
];

/// Direction of a `RavgData::transfer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transfer {
    /// Add the donor's history to the base.
    In,
    /// Remove the donor's history from the base.
    Out,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RavgData {
    pub val: u64,
    pub val_at: u64,
    pub old: u64,
    pub cur: u64,
}

#[inline]
fn ravg_add(a: u64, b: u64) -> u64 {
    a.saturating_add(b)
}

#[inline]
fn ravg_decay(v: u64, shift: u64) -> u64 {
    if shift >= 64 {
        0
    } else {
        v >> shift
    }
}

/// `(a * b) >> shift` without intermediate overflow, saturated to u64.
#[inline]
fn mul_rshift(a: u64, b: u64, shift: u64) -> u64 {
    if shift >= 128 {
        return 0;
    }
    let prod = (a as u128 * b as u128) >> shift;
    u64::try_from(prod).unwrap_or(u64::MAX)
}

/// Fraction of a half-life covered by `dur`, rounded up, in fixed point.
#[inline]
fn normalize_dur(dur: u64, half_life: u64) -> u64 {
    if dur >= half_life {
        return RAVG_ONE;
    }
    let scaled = (dur as u128) << RAVG_FRAC_BITS;
    scaled.div_ceil(half_life as u128) as u64
}

impl RavgData {
    pub const fn new() -> Self {
        Self {
            val: 0,
            val_at: 0,
            old: 0,
            cur: 0,
        }
    }

    /// Account for `val` having been held since `val_at` and switch to
    /// `new_val` at `now`.
    ///
    /// A `now` earlier than `val_at` is treated as `val_at`.
    pub fn accumulate(&mut self, new_val: u64, now: u64, half_life: u64) {
        let half_life = half_life.max(1);
        let now = now.max(self.val_at);

        let cur_seq = now / half_life;
        let val_seq = self.val_at / half_life;
        let seq_delta = cur_seq - val_seq;

        if seq_delta > 0 {
            // Bring old up to window cur_seq - 1 and fold the closed window in.
            self.old = ravg_decay(self.old, seq_delta);
            self.old = ravg_add(self.old, ravg_decay(self.cur, seq_delta));
            self.cur = 0;
        }

        if self.val != 0 {
            if seq_delta > 0 {
                // Tail of the window val was set in.
                let tail = (val_seq + 1) * half_life - self.val_at;
                self.old = ravg_add(
                    self.old,
                    mul_rshift(self.val, normalize_dur(tail, half_life), seq_delta),
                );

                // Whole windows in between.
                if seq_delta > 1 {
                    let idx = (seq_delta - 2).min(RAVG_FULL_SUM.len() as u64 - 1) as usize;
                    self.old = ravg_add(self.old, mul_rshift(self.val, RAVG_FULL_SUM[idx], 0));
                }

                let head = now - cur_seq * half_life;
                self.cur = ravg_add(self.cur, mul_rshift(self.val, normalize_dur(head, half_life), 0));
            } else {
                let dur = now - self.val_at;
                self.cur = ravg_add(self.cur, mul_rshift(self.val, normalize_dur(dur, half_life), 0));
            }
        }

        self.val = new_val.min(RAVG_VAL_MAX);
        self.val_at = now;
    }

    /// Current average in fixed point.
    ///
    /// Blends `old` with half of `cur` according to how far the current
    /// window has progressed. Does not modify `self`.
    pub fn read(&self, now: u64, half_life: u64) -> u64 {
        let half_life = half_life.max(1);
        let mut trd = *self;
        trd.accumulate(self.val, now, half_life);

        let elapsed = trd.val_at % half_life;
        if elapsed == 0 {
            return trd.old;
        }

        let progress = normalize_dur(elapsed, half_life);
        let old = mul_rshift(trd.old, RAVG_ONE - progress / 2, RAVG_FRAC_BITS as u64);
        ravg_add(old, trd.cur / 2)
    }

    /// Current average in the units of `val`.
    pub fn read_val(&self, now: u64, half_life: u64) -> u64 {
        self.read(now, half_life) >> RAVG_FRAC_BITS
    }

    /// Move `donor`'s decayed history into or out of `self`.
    ///
    /// The older of the two is first accumulated forward so both share one
    /// `val_at`. Removal saturates at zero. `val` is left to the caller,
    /// which knows the new instantaneous value of the aggregate.
    pub fn transfer(&mut self, donor: &mut RavgData, dir: Transfer, half_life: u64) {
        if self.val_at < donor.val_at {
            self.accumulate(self.val, donor.val_at, half_life);
        } else if donor.val_at < self.val_at {
            donor.accumulate(donor.val, self.val_at, half_life);
        }

        match dir {
            Transfer::In => {
                self.old = ravg_add(self.old, donor.old);
                self.cur = ravg_add(self.cur, donor.cur);
            }
            Transfer::Out => {
                self.old = self.old.saturating_sub(donor.old);
                self.cur = self.cur.saturating_sub(donor.cur);
            }
        }
    }
}
