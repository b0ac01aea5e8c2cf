//! 三点锁：让高吞吐的工作循环以一次原子读取的代价接受偶发的外部加锁。
//!
//! # 设计初衷（Why）
//! - 工作线程（例如抓包循环）不能在每次迭代获取互斥锁，但外部偶尔需要让它暂停并独占共享状态；
//! - 把“请求 → 确认 → 完成”拆成三个交接点后，工作线程只需在热循环里检查一次请求队列长度。
//!
//! # 执行逻辑（How）
//! 1. 请求方从 [`UniquePool`] 租借令牌（池耗尽即背压），连同周期编号写入容量为 1 的请求通道，
//!    再执行可选的加锁前钩子；
//! 2. 工作线程发现请求后取走令牌，调用 [`ThreePointLock::confirm_lock_request`] 送达确认并暂停处理；
//! 3. 请求方完成独占操作后调用 [`ThreePointLock::unlock`] 发出完成信号，工作线程消费信号后归还令牌、恢复循环。
//!
//! # 契约（What）
//! - 确认按周期编号关联：请求方放弃（超时、钩子失败、关闭）后，迟到的确认返回
//!   [`RendezvousError::Abandoned`]，工作线程此时不得等待完成信号；
//! - 放弃时尚未被取走的请求会被撤回并归还令牌；已被取走的则按句柄释放，工作线程之后的归还自然成为重复归还；
//! - [`ThreePointLock::close`] 唤醒所有等待者，之后的加锁返回 [`RendezvousError::Closed`]。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use spark_mempool::channel::{Channel, SendError};
use spark_mempool::{Handle, PoolBuf, UniquePool};
use tracing::{debug, trace, warn};

use crate::config::{LockHook, ThreePointLockConfig};
use crate::confirm::{Confirmations, WaitError};
use crate::error::RendezvousError;

/// 代表一次在途加锁的令牌。
///
/// 令牌内的缓冲由请求方与工作线程共享语义使用（例如携带少量控制数据），
/// 工作线程处理完毕后应通过 [`ThreePointLock::release`] 归还。
#[derive(Debug)]
pub struct Token {
    cycle: u64,
    buf: PoolBuf,
}

impl Token {
    /// 本次加锁周期的编号。
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// 令牌携带的池化缓冲，长度为令牌池的最小元素尺寸。
    pub fn buffer(&self) -> &PoolBuf {
        &self.buf
    }

    /// 可写访问令牌缓冲；需要更大空间时配合 [`UniquePool::resize`] 使用。
    pub fn buffer_mut(&mut self) -> &mut PoolBuf {
        &mut self.buf
    }

    /// 拆出缓冲本体，调用方负责将其归还到令牌池。
    pub fn into_buffer(self) -> PoolBuf {
        self.buf
    }
}

/// 三点锁。
///
/// 所有方法均为 `&self`，通常放入 `Arc` 在请求方与工作线程之间共享。
pub struct ThreePointLock {
    request: Channel<Token>,
    confirm: Confirmations,
    done: Channel<()>,
    on_lock: Option<LockHook>,
    on_unlock: Option<LockHook>,
    timeout: Option<Duration>,
    pool: UniquePool,
    next_cycle: AtomicU64,
}

impl ThreePointLock {
    /// 按配置创建三点锁。
    ///
    /// 未提供令牌池时私有一个仅容纳单个持有者的池，同一时刻至多一个在途加锁。
    pub fn new(config: ThreePointLockConfig) -> Self {
        let ThreePointLockConfig {
            pool,
            on_lock,
            on_unlock,
            timeout,
            min_element_size,
        } = config;
        let pool = pool.unwrap_or_else(|| UniquePool::new(1, min_element_size));

        Self {
            request: Channel::bounded(1),
            confirm: Confirmations::default(),
            done: Channel::bounded(1),
            on_lock,
            on_unlock,
            timeout,
            pool,
            next_cycle: AtomicU64::new(1),
        }
    }

    /// 令牌池。
    pub fn pool(&self) -> &UniquePool {
        &self.pool
    }

    /// 确认超时，`None` 表示无限等待。
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// 请求加锁，直到工作线程确认、超时、钩子失败或锁关闭。
    ///
    /// 令牌池耗尽时先阻塞等待令牌，这段时间不计入确认超时。
    pub fn lock(&self) -> Result<(), RendezvousError> {
        let buf = self.pool.get(self.pool.min_element_size());
        let handle = buf.handle();
        let cycle = self.next_cycle.fetch_add(1, Ordering::Relaxed);

        if let Err(SendError(token)) = self.request.send(Token { cycle, buf }) {
            self.pool.put(token.buf);
            return Err(RendezvousError::Closed);
        }
        trace!(cycle, "published lock request");

        if let Some(hook) = &self.on_lock {
            if let Err(err) = hook() {
                self.confirm.abandon(cycle);
                self.reclaim(cycle, handle);
                debug!(cycle, error = %err, "pre-lock hook failed, lock request withdrawn");
                return Err(RendezvousError::LockHook(err));
            }
        }

        match self.confirm.wait(cycle, self.timeout) {
            Ok(()) => {
                trace!(cycle, "lock request confirmed");
                Ok(())
            }
            Err(WaitError::Timeout) => {
                self.reclaim(cycle, handle);
                let waited = self.timeout.unwrap_or_default();
                warn!(cycle, ?waited, "timed out waiting for lock confirmation");
                Err(RendezvousError::ConfirmTimeout { waited })
            }
            Err(WaitError::Closed) => {
                self.reclaim(cycle, handle);
                Err(RendezvousError::Closed)
            }
        }
    }

    /// 加锁，失败时 panic。
    pub fn must_lock(&self) {
        if let Err(err) = self.lock() {
            panic!("failed to establish three-point lock: {err}");
        }
    }

    /// 发出完成信号并执行解锁后钩子。
    ///
    /// 完成信号通道容量为 1，若上一次信号尚未被工作线程消费则阻塞。
    pub fn unlock(&self) -> Result<(), RendezvousError> {
        self.done.send(()).map_err(|_| RendezvousError::Closed)?;
        trace!("published unlock request");

        if let Some(hook) = &self.on_unlock {
            hook().map_err(RendezvousError::UnlockHook)?;
        }
        Ok(())
    }

    /// 解锁，失败时 panic。
    pub fn must_unlock(&self) {
        if let Err(err) = self.unlock() {
            panic!("failed to release three-point lock: {err}");
        }
    }

    /// 是否有待处理的加锁请求；只读取一次原子量，可放在热循环中。
    #[inline]
    pub fn has_lock_request(&self) -> bool {
        !self.request.is_empty()
    }

    /// 取走待处理的加锁请求。
    ///
    /// 请求可能在检查之后被其它工作线程取走或被请求方撤回，此时返回 `None`。
    pub fn consume_lock_request(&self) -> Option<Token> {
        let token = self.request.try_recv()?;
        trace!(cycle = token.cycle, "consumed lock request");
        Some(token)
    }

    /// 向令牌对应的请求方送达确认，阻塞直到请求方取走确认。
    ///
    /// 返回 [`RendezvousError::Abandoned`] 时请求方已离开：工作线程应直接归还令牌并继续循环，
    /// 不得等待完成信号。
    pub fn confirm_lock_request(&self, token: &Token) -> Result<(), RendezvousError> {
        let result = self.confirm.confirm(token.cycle);
        if let Err(RendezvousError::Abandoned { cycle }) = &result {
            debug!(cycle, "lock request abandoned before confirmation");
        }
        result
    }

    /// 是否有待处理的完成信号。
    #[inline]
    pub fn has_unlock_request(&self) -> bool {
        !self.done.is_empty()
    }

    /// 消费一个完成信号，返回是否确实消费到。
    pub fn consume_unlock_request(&self) -> bool {
        self.done.try_recv().is_some()
    }

    /// 归还令牌；重复归还（例如请求方已按句柄释放）为空操作。
    pub fn release(&self, token: Token) {
        self.pool.put(token.buf);
    }

    /// 关闭锁并唤醒所有等待者，重复调用无副作用。
    pub fn close(&self) {
        self.request.close();
        self.confirm.close();
        self.done.close();
        debug!("closed three-point lock");
    }

    /// 放弃周期后回收令牌：请求仍在队列中则撤回并整体归还，否则仅凭句柄释放槽位。
    ///
    /// 后一种情况下字节仍在工作线程手中，槽位以空缓冲重新入队，
    /// 因此下一次租借会重新分配（计入 `PoolStats::grown`）；工作线程随后的归还是重复归还。
    fn reclaim(&self, cycle: u64, handle: Handle) {
        match self.request.withdraw(|token| token.cycle == cycle) {
            Some(token) => {
                self.confirm.forget(cycle);
                self.pool.put(token.buf);
            }
            None => self.pool.release(handle),
        }
    }
}

impl Default for ThreePointLock {
    fn default() -> Self {
        Self::new(ThreePointLockConfig::default())
    }
}

impl fmt::Debug for ThreePointLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreePointLock")
            .field("pool", &self.pool)
            .field("timeout", &self.timeout)
            .field("pending_requests", &self.request.len())
            .field("pending_unlocks", &self.done.len())
            .finish()
    }
}
