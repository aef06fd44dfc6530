// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Fixed-period job scheduler.
//!
//! A [`Cron`] is a fixed-capacity table of job slots with an occupancy bitmask. Every timer period
//! the owner calls [`tick`](Cron::tick), which runs each occupied slot in index order, to
//! completion, before moving to the next. Jobs run back-to-back in the timer interrupt and must not
//! block.
//!
//! Jobs are plain `fn(&mut C)` pointers over a shared context `C`. A job never sees the table
//! itself, so it cannot add or remove jobs while the table is being iterated.
//!
//! Registration is a setup-time activity: the table is sealed on the first tick (or explicitly via
//! [`seal`](Cron::seal)) and rejects changes afterwards.

use crate::config::JOB_CAPACITY;

/// A scheduled job over context `C`.
pub type Job<C> = fn(&mut C);

/// Error type for `Cron` operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Every slot is occupied.
    Full,
    /// The scheduler has started; the table no longer accepts changes.
    Sealed,
    /// Slot index beyond the table capacity.
    OutOfRange,
}

/// Job table with `N` slots (at most 32).
pub struct Cron<C, const N: usize = JOB_CAPACITY> {
    jobs: [Option<Job<C>>; N],
    /// Bit `i` set ⇔ `jobs[i]` holds a job.
    occupied: u32,
    sealed: bool,
}

impl<C, const N: usize> Default for Cron<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, const N: usize> Cron<C, N> {
    const FITS_MASK: () = assert!(N <= 32, "job table is limited to 32 slots");

    /// Slot count.
    pub const CAPACITY: usize = N;

    /// Create an empty, unsealed table.
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::FITS_MASK;
        Self {
            jobs: [None; N],
            occupied: 0,
            sealed: false,
        }
    }

    /// Register a job in the lowest free slot and return that slot index.
    pub fn add_job(&mut self, job: Job<C>) -> Result<usize, Error> {
        if self.sealed {
            return Err(Error::Sealed);
        }
        for i in 0..N {
            if self.occupied & (1 << i) == 0 {
                self.jobs[i] = Some(job);
                self.occupied |= 1 << i;
                return Ok(i);
            }
        }
        warn!("job table full ({} slots)", N);
        Err(Error::Full)
    }

    /// Free a slot. Removing an empty slot is a no-op.
    pub fn remove_job(&mut self, index: usize) -> Result<(), Error> {
        if self.sealed {
            return Err(Error::Sealed);
        }
        if index >= N {
            return Err(Error::OutOfRange);
        }
        self.occupied &= !(1 << index);
        self.jobs[index] = None;
        Ok(())
    }

    /// Freeze the table. Further add/remove calls fail with [`Error::Sealed`].
    #[inline]
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    #[inline]
    pub fn is_occupied(&self, index: usize) -> bool {
        index < N && self.occupied & (1 << index) != 0
    }

    /// Number of occupied slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.occupied.count_ones() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Run every occupied slot once, in slot order. Call from the timer period-elapsed interrupt.
    pub fn tick(&mut self, ctx: &mut C) {
        self.sealed = true;
        for i in 0..N {
            if self.occupied & (1 << i) == 0 {
                continue;
            }
            if let Some(job) = self.jobs[i] {
                job(ctx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = std::vec::Vec<u8>;

    fn job_a(log: &mut Log) {
        log.push(b'a');
    }
    fn job_b(log: &mut Log) {
        log.push(b'b');
    }
    fn job_c(log: &mut Log) {
        log.push(b'c');
    }

    #[test]
    fn runs_jobs_in_slot_order() {
        let mut cron: Cron<Log, 4> = Cron::new();
        assert_eq!(cron.add_job(job_b), Ok(0));
        assert_eq!(cron.add_job(job_a), Ok(1));
        assert_eq!(cron.add_job(job_c), Ok(2));

        let mut log = Log::new();
        cron.tick(&mut log);
        cron.tick(&mut log);
        assert_eq!(log, b"bacbac");
    }

    #[test]
    fn full_table_returns_full() {
        let mut cron: Cron<Log> = Cron::new();
        for i in 0..JOB_CAPACITY {
            assert_eq!(cron.add_job(job_a), Ok(i));
        }
        assert_eq!(cron.len(), JOB_CAPACITY);
        assert_eq!(cron.add_job(job_a), Err(Error::Full));
    }

    #[test]
    fn removed_slot_is_reused_lowest_first() {
        let mut cron: Cron<Log, 4> = Cron::new();
        for _ in 0..4 {
            cron.add_job(job_a).unwrap();
        }
        cron.remove_job(2).unwrap();
        cron.remove_job(1).unwrap();
        assert!(!cron.is_occupied(1));
        assert_eq!(cron.add_job(job_b), Ok(1));
        assert_eq!(cron.add_job(job_c), Ok(2));
        assert_eq!(cron.add_job(job_c), Err(Error::Full));

        let mut log = Log::new();
        cron.tick(&mut log);
        assert_eq!(log, b"abca");
    }

    #[test]
    fn removed_job_does_not_run() {
        let mut cron: Cron<Log, 4> = Cron::new();
        cron.add_job(job_a).unwrap();
        let b = cron.add_job(job_b).unwrap();
        cron.remove_job(b).unwrap();
        cron.remove_job(b).unwrap();

        let mut log = Log::new();
        cron.tick(&mut log);
        assert_eq!(log, b"a");
        assert_eq!(cron.len(), 1);
    }

    #[test]
    fn out_of_range_remove_is_rejected() {
        let mut cron: Cron<Log, 4> = Cron::new();
        assert_eq!(cron.remove_job(4), Err(Error::OutOfRange));
        assert!(!cron.is_occupied(40));
    }

    #[test]
    fn table_seals_once_started() {
        let mut cron: Cron<Log, 4> = Cron::new();
        cron.add_job(job_a).unwrap();
        let mut log = Log::new();
        cron.tick(&mut log);

        assert!(cron.is_sealed());
        assert_eq!(cron.add_job(job_b), Err(Error::Sealed));
        assert_eq!(cron.remove_job(0), Err(Error::Sealed));

        cron.tick(&mut log);
        assert_eq!(log, b"aa");
    }

    #[test]
    fn empty_table_ticks_harmlessly() {
        let mut cron: Cron<Log, 4> = Cron::new();
        assert!(cron.is_empty());
        let mut log = Log::new();
        cron.tick(&mut log);
        assert!(log.is_empty());
    }
}
