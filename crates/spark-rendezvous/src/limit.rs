//! 槽位限流器：限制同时进行的任务数量。
//!
//! # 契约（What）
//! - `Semaphore::new(NO_LIMIT)` 不施加任何限制，所有操作立即返回；
//! - `add` 在槽位耗尽时阻塞，`try_add` / `try_add_for` 失败时返回 [`RendezvousError::NoSlotAvailable`]；
//! - `try_add*` 返回的 [`SlotGuard`] 在析构时释放槽位；
//! - 没有对应 `add` 的 `done` 为空操作。

use std::sync::Arc;
use std::time::Duration;

use spark_mempool::channel::Channel;

use crate::error::RendezvousError;

/// 不限制并发。
pub const NO_LIMIT: usize = 0;

/// 基于固定容量通道的计数信号量，克隆共享同一组槽位。
#[derive(Clone, Debug, Default)]
pub struct Semaphore {
    slots: Option<Arc<Channel<()>>>,
}

impl Semaphore {
    /// 创建最多允许 `n` 个并发任务的信号量，`n == NO_LIMIT` 时不限制。
    pub fn new(n: usize) -> Self {
        Self {
            slots: (n > NO_LIMIT).then(|| Arc::new(Channel::bounded(n))),
        }
    }

    /// 槽位总数，不限制时为 [`NO_LIMIT`]。
    pub fn capacity(&self) -> usize {
        self.slots.as_ref().map_or(NO_LIMIT, |slots| slots.capacity())
    }

    /// 当前占用的槽位数。
    pub fn in_use(&self) -> usize {
        self.slots.as_ref().map_or(0, |slots| slots.len())
    }

    /// 占用一个槽位，耗尽时阻塞。
    pub fn add(&self) {
        if let Some(slots) = &self.slots {
            // 通道从不关闭，发送只会在有空位时返回。
            let _ = slots.send(());
        }
    }

    /// 释放一个槽位。
    pub fn done(&self) {
        if let Some(slots) = &self.slots {
            slots.try_recv();
        }
    }

    /// 尝试立即占用一个槽位。
    pub fn try_add(&self) -> Result<SlotGuard, RendezvousError> {
        let Some(slots) = &self.slots else {
            return Ok(SlotGuard { slots: None });
        };
        slots
            .try_send(())
            .map_err(|_| RendezvousError::NoSlotAvailable)?;
        Ok(SlotGuard {
            slots: Some(Arc::clone(slots)),
        })
    }

    /// 在 `timeout` 内尝试占用一个槽位。
    pub fn try_add_for(&self, timeout: Duration) -> Result<SlotGuard, RendezvousError> {
        let Some(slots) = &self.slots else {
            return Ok(SlotGuard { slots: None });
        };
        slots
            .send_timeout((), timeout)
            .map_err(|_| RendezvousError::NoSlotAvailable)?;
        Ok(SlotGuard {
            slots: Some(Arc::clone(slots)),
        })
    }
}

/// 已占用的槽位，析构时归还。
#[must_use = "dropping the guard releases the slot immediately"]
#[derive(Debug)]
pub struct SlotGuard {
    slots: Option<Arc<Channel<()>>>,
}

impl SlotGuard {
    /// 显式释放槽位，等价于析构。
    pub fn release(self) {}
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Some(slots) = self.slots.take() {
            slots.try_recv();
        }
    }
}
