use std::sync::atomic::{AtomicU64, Ordering};

/// 缓冲池在某一时刻的统计快照。
///
/// 快照各字段分别读取，并发场景下只保证各自单调，不保证彼此严格一致。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// 槽位总数。
    pub slots: usize,
    /// 排队等待租借的槽位数。
    pub available: usize,
    /// 已借出的槽位数。
    pub checked_out: usize,
    /// 累计重新分配次数。
    pub grown: u64,
    /// 累计被忽略的重复归还次数。
    pub duplicate_releases: u64,
}

/// 原子计数器集合，更新与读取均使用 `Relaxed`，仅用于观测。
#[derive(Debug, Default)]
pub(crate) struct PoolMetrics {
    grown: AtomicU64,
    duplicate_releases: AtomicU64,
}

impl PoolMetrics {
    pub(crate) fn record_growth(&self) {
        self.grown.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duplicate_release(&self) {
        self.duplicate_releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn grown(&self) -> u64 {
        self.grown.load(Ordering::Relaxed)
    }

    pub(crate) fn duplicate_releases(&self) -> u64 {
        self.duplicate_releases.load(Ordering::Relaxed)
    }
}
