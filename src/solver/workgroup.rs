//! Dispatch geometry for kernels launched over a problem of dimension `n`.
//!
//! The global size is padded up to a multiple of the local (work-group) size.
//! Elements in `[n, global)` are padding that kernels skip.

/// Smallest multiple of `local` that is >= `n`.
///
/// `local` must be non-zero.
pub fn round_up(local: usize, n: usize) -> usize {
    n.div_ceil(local) * local
}

/// Local and global work sizes for one problem dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkSize {
    /// Work items per group.
    pub local: usize,
    /// Total work items, a multiple of `local`.
    pub global: usize,
}

impl WorkSize {
    /// Plan a dispatch for `n` elements on a device whose preferred group
    /// size is `max_group`.
    pub fn plan(n: usize, max_group: usize) -> Self {
        let local = n.min(max_group).max(1);
        Self {
            local,
            global: round_up(local, n),
        }
    }

    /// Number of work groups, one partial sum slot each.
    pub fn groups(&self) -> usize {
        self.global / self.local
    }

    /// Padding elements appended after the `n` valid ones.
    pub fn padding(&self, n: usize) -> usize {
        self.global - n
    }
}
