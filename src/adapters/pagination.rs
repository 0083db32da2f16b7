//! Cutoff-bounded pagination control
//!
//! Every adapter that pages through a listing feeds a `Paginator` one
//! observation per round: how many items are revealed so far and the
//! normalized dates of the most recently revealed ones. The paginator says
//! when to stop, checking in order:
//!
//! 1. **Cutoff** - the tail holds items older than the run's cutoff
//! 2. **Stall** - `stall_limit` consecutive rounds revealed nothing new
//! 3. **Safety ceiling** - `max_attempts` rounds or `max_items` items
//!
//! The ceiling guarantees termination even when items trickle in forever.

use crate::config::PaginationConfig;
use chrono::{DateTime, Utc};
use std::fmt;

/// How far a listing's rendered order can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingAssumption {
    /// Newest first; one old item in the tail means everything after is old too
    ReverseChronological,

    /// Mostly newest first (pinned and bumped threads break the order);
    /// stop only when every dated item in the tail is old
    Loose,
}

/// Why a listing stopped paginating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    CutoffReached,
    Stalled,
    SafetyCeiling,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CutoffReached => "cutoff reached",
            Self::Stalled => "stalled",
            Self::SafetyCeiling => "safety ceiling",
        };
        write!(f, "{}", s)
    }
}

/// Stopping-condition tracker for one listing
#[derive(Debug, Clone)]
pub struct Paginator {
    cutoff: DateTime<Utc>,
    ordering: OrderingAssumption,
    stall_limit: u32,
    max_attempts: u32,
    max_items: usize,
    tail_window: usize,
    attempts: u32,
    stalls: u32,
    last_total: usize,
}

impl Paginator {
    pub fn new(
        cutoff: DateTime<Utc>,
        ordering: OrderingAssumption,
        limits: &PaginationConfig,
    ) -> Self {
        Self {
            cutoff,
            ordering,
            stall_limit: limits.stall_limit.max(1),
            max_attempts: limits.max_attempts.max(1),
            max_items: limits.max_items.max(1),
            tail_window: limits.tail_window.max(1),
            attempts: 0,
            stalls: 0,
            last_total: 0,
        }
    }

    /// Number of items from the end of the listing the cutoff check inspects
    pub fn tail_window(&self) -> usize {
        self.tail_window
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Records one pagination round
    ///
    /// # Arguments
    ///
    /// * `total_items` - Items revealed so far
    /// * `tail_dates` - Normalized dates of the last revealed items, oldest
    ///   position last; only the final `tail_window` entries are inspected
    ///
    /// # Returns
    ///
    /// * `Some(StopReason)` - Stop paginating
    /// * `None` - Paginate again
    pub fn observe(
        &mut self,
        total_items: usize,
        tail_dates: &[Option<DateTime<Utc>>],
    ) -> Option<StopReason> {
        self.attempts += 1;

        if total_items > self.last_total {
            self.stalls = 0;
            self.last_total = total_items;
        } else {
            self.stalls += 1;
        }

        let start = tail_dates.len().saturating_sub(self.tail_window);
        if self.tail_is_past_cutoff(&tail_dates[start..]) {
            return Some(StopReason::CutoffReached);
        }

        if self.stalls >= self.stall_limit {
            return Some(StopReason::Stalled);
        }

        if self.attempts >= self.max_attempts || total_items >= self.max_items {
            return Some(StopReason::SafetyCeiling);
        }

        None
    }

    fn tail_is_past_cutoff(&self, tail: &[Option<DateTime<Utc>>]) -> bool {
        let mut dated = tail.iter().flatten().peekable();
        match self.ordering {
            OrderingAssumption::ReverseChronological => dated.any(|d| *d < self.cutoff),
            OrderingAssumption::Loose => {
                dated.peek().is_some() && dated.all(|d| *d < self.cutoff)
            }
        }
    }
}
