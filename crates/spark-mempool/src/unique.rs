//! 身份追踪缓冲池。
//!
//! # 模块定位（Why）
//! - 普通自由链表无法容忍重复归还：同一块内存入队两次后可能被两个调用方同时租借，破坏独占性；
//! - 三点锁需要从多条路径（正常回收与超时兜底）无条件归还令牌，因此池必须识别“已经归还过”的缓冲，
//!   并拒绝来自其它池的缓冲。
//!
//! # 设计概要（How）
//! - 缓冲存放在槽位数组（arena）中，每个槽位维护 `generation` 与 `checked_out` 标记；
//! - 租出的缓冲携带 [`Handle`]（池编号 + 槽位下标 + 代数），归还时以句柄核对身份；
//! - 每次租借与每次扩容都会推进代数，旧句柄随即失效，重复归还因此可以被安全识别并忽略；
//! - 可用槽位以下标形式排在容量为 `n` 的 [`Channel`] 中，租借在池耗尽时阻塞（背压）。
//!
//! # 契约说明（What）
//! - 队列中的每个槽位都处于“未借出”状态，`get` 返回前槽位已被标记为“已借出”；
//! - 归还未被追踪的缓冲（其它池、未知槽位、已 `clear` 的池）属于编程错误，直接 `panic!`；
//! - 重复归还为静默空操作，绝不重复入队。

use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::channel::{Channel, TrySendError};
use crate::stats::{PoolMetrics, PoolStats};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// 池内缓冲的身份标识。
///
/// 句柄是 `Copy` 的：防御性清理路径可以只持有句柄，通过 [`UniquePool::release`] 归还。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    pool: u64,
    slot: usize,
    generation: u64,
}

impl Handle {
    /// 所在槽位下标。
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// 身份代数，每次租借或扩容都会递增。
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// 从 [`UniquePool`] 租出的字节缓冲。
///
/// 长度等于租借时请求的大小，内容未定义（池不负责清零）。
/// 缓冲不可克隆，持有者即独占者；使用完毕后通过 [`UniquePool::put`] 归还。
pub struct PoolBuf {
    handle: Handle,
    data: Vec<u8>,
}

impl PoolBuf {
    /// 缓冲的身份句柄。
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// 底层分配的容量。
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// 以切片形式读取缓冲内容。
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// 以可变切片形式写入缓冲内容。
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Deref for PoolBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for PoolBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl AsRef<[u8]> for PoolBuf {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for PoolBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuf")
            .field("handle", &self.handle)
            .field("len", &self.data.len())
            .field("capacity", &self.data.capacity())
            .finish()
    }
}

#[derive(Default)]
struct Slot {
    generation: u64,
    checked_out: bool,
    /// 空闲时保存缓冲本体，借出期间为空 `Vec`。
    data: Vec<u8>,
}

struct Tracker {
    slots: Vec<Slot>,
    cleared: bool,
}

impl Tracker {
    fn resolve(&mut self, pool: u64, handle: Handle, action: &str) -> &mut Slot {
        if self.cleared || handle.pool != pool {
            panic!("cannot {action} untracked memory element (foreign or cleared pool)");
        }
        match self.slots.get_mut(handle.slot) {
            Some(slot) => slot,
            None => panic!("cannot {action} untracked memory element (unknown slot)"),
        }
    }
}

struct PoolInner {
    id: u64,
    min_element_size: usize,
    capacity: usize,
    available: Channel<usize>,
    tracker: Mutex<Tracker>,
    metrics: PoolMetrics,
}

/// 有界、身份追踪、容忍重复归还的字节缓冲池。
///
/// # 契约说明（What）
/// - `new(n, min_element_size)` 预先创建 `n` 个 `min_element_size` 字节的缓冲；
/// - 同一时刻至多 `n` 个缓冲处于借出状态，多余的 `get` 阻塞等待；
/// - 克隆代价低廉，所有克隆共享同一份状态。
#[derive(Clone)]
pub struct UniquePool {
    inner: Arc<PoolInner>,
}

impl UniquePool {
    /// 创建容纳 `n` 个缓冲、每个至少 `min_element_size` 字节的池。
    pub fn new(n: usize, min_element_size: usize) -> Self {
        let available = Channel::bounded(n);
        let mut slots = Vec::with_capacity(n);
        for index in 0..n {
            slots.push(Slot {
                generation: 0,
                checked_out: false,
                data: vec![0; min_element_size],
            });
            // 容量恰为 n，预填充不会阻塞。
            let _ = available.try_send(index);
        }

        Self {
            inner: Arc::new(PoolInner {
                id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
                min_element_size,
                capacity: n,
                available,
                tracker: Mutex::new(Tracker {
                    slots,
                    cleared: false,
                }),
                metrics: PoolMetrics::default(),
            }),
        }
    }

    /// 构造时配置的最小缓冲大小。
    pub fn min_element_size(&self) -> usize {
        self.inner.min_element_size
    }

    /// 槽位总数，即并发租借上限。
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// 租借一个长度恰为 `size` 的缓冲，池耗尽时阻塞。
    ///
    /// 若槽位中的缓冲容量不足，则按 `2 * size` 重新分配以减少后续扩容，旧身份随之作废。
    ///
    /// # Panics
    /// 池已被 [`clear`](Self::clear) 时 panic。
    pub fn get(&self, size: usize) -> PoolBuf {
        let Some(index) = self.inner.available.recv() else {
            panic!("identity-tracking pool used after clear");
        };

        let mut tracker = self.inner.tracker.lock();
        let Some(slot) = tracker.slots.get_mut(index) else {
            panic!("identity-tracking pool used after clear");
        };
        slot.generation += 1;
        slot.checked_out = true;
        let generation = slot.generation;
        let mut data = mem::take(&mut slot.data);
        drop(tracker);

        if data.capacity() < size {
            data = vec![0; size.saturating_mul(2)];
            self.inner.metrics.record_growth();
            debug!(
                slot = index,
                size,
                capacity = data.capacity(),
                "grew pool buffer to satisfy request"
            );
        }
        data.resize(size, 0);

        PoolBuf {
            handle: Handle {
                pool: self.inner.id,
                slot: index,
                generation,
            },
            data,
        }
    }

    /// 归还缓冲并恢复其完整容量。
    ///
    /// 重复归还（身份已空闲或已作废）为静默空操作。
    ///
    /// # Panics
    /// 缓冲不属于本池或池已被清空时 panic。
    pub fn put(&self, buf: PoolBuf) {
        let PoolBuf { handle, mut data } = buf;
        data.resize(data.capacity(), 0);
        self.check_in(handle, Some(data));
    }

    /// 仅凭句柄归还槽位，供无法取回缓冲本体的兜底路径使用。
    ///
    /// 槽位重新入队但不携带字节，下一次租借会重新分配。规则与 [`put`](Self::put) 相同。
    pub fn release(&self, handle: Handle) {
        self.check_in(handle, None);
    }

    fn check_in(&self, handle: Handle, data: Option<Vec<u8>>) {
        let mut tracker = self.inner.tracker.lock();
        let slot = tracker.resolve(self.inner.id, handle, "return");
        if slot.generation != handle.generation || !slot.checked_out {
            drop(tracker);
            self.inner.metrics.record_duplicate_release();
            trace!(
                slot = handle.slot,
                generation = handle.generation,
                "ignored duplicate release of pool buffer"
            );
            return;
        }
        slot.checked_out = false;
        if let Some(data) = data {
            slot.data = data;
        }
        drop(tracker);

        // 队列容量等于槽位数且每个槽位只在“借出 -> 空闲”时入队一次，因此只可能因关闭而失败。
        if let Err(TrySendError::Closed(slot)) = self.inner.available.try_send(handle.slot) {
            debug!(slot, "pool cleared while buffer was checked out");
        }
    }

    /// 将借出中的缓冲调整为 `size` 字节。
    ///
    /// 容量足够时原地调整；否则按 `size` 重新分配、复制原内容并登记新身份，借出状态保持不变。
    ///
    /// 若缓冲的身份已被他处释放（例如请求方超时后按句柄归还了槽位），缓冲视为已脱离池：
    /// 仅在本地调整长度，不再登记身份，之后的归还按重复归还处理。
    ///
    /// # Panics
    /// 缓冲不属于本池、槽位未知或池已被清空时 panic。
    pub fn resize(&self, buf: &mut PoolBuf, size: usize) {
        let mut tracker = self.inner.tracker.lock();
        let slot = tracker.resolve(self.inner.id, buf.handle, "resize");
        if slot.generation != buf.handle.generation || !slot.checked_out {
            drop(tracker);
            buf.data.resize(size, 0);
            trace!(
                slot = buf.handle.slot,
                generation = buf.handle.generation,
                size,
                "resized detached pool buffer"
            );
            return;
        }
        if buf.data.capacity() >= size {
            buf.data.resize(size, 0);
            return;
        }
        slot.generation += 1;
        buf.handle.generation = slot.generation;
        drop(tracker);

        let mut grown = vec![0; size];
        grown[..buf.data.len()].copy_from_slice(&buf.data);
        buf.data = grown;
        self.inner.metrics.record_growth();
        debug!(slot = buf.handle.slot, size, "resized pool buffer");
    }

    /// 丢弃全部槽位与队列，之后该池不可再使用。
    ///
    /// 仅用于拆除阶段：仍在进行中的租借会在归还时 panic。
    pub fn clear(&self) {
        let mut tracker = self.inner.tracker.lock();
        tracker.cleared = true;
        let retired = mem::take(&mut tracker.slots).len();
        drop(tracker);

        self.inner.available.close();
        self.inner.available.drain();
        debug!(retired, "cleared identity-tracking pool");
    }

    /// 读取统计快照。
    pub fn stats(&self) -> PoolStats {
        let tracker = self.inner.tracker.lock();
        let slots = tracker.slots.len();
        let checked_out = tracker.slots.iter().filter(|slot| slot.checked_out).count();
        drop(tracker);

        PoolStats {
            slots,
            available: self.inner.available.len(),
            checked_out,
            grown: self.inner.metrics.grown(),
            duplicate_releases: self.inner.metrics.duplicate_releases(),
        }
    }
}

impl fmt::Debug for UniquePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniquePool")
            .field("id", &self.inner.id)
            .field("capacity", &self.inner.capacity)
            .field("min_element_size", &self.inner.min_element_size)
            .finish()
    }
}
