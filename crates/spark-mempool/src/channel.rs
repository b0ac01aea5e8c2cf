//! 带容量语义的阻塞通道。
//!
//! # 模块定位（Why）
//! - 身份追踪池的“可用队列”与三点锁的请求/完成信号都需要“容量为 N 的队列 + 阻塞收发”语义，
//!   标准库的 `mpsc` 无法查询长度、也无法撤回已发送的元素；
//! - 三点锁的热循环依赖一次廉价的长度检查判断是否有外部请求，因此长度需要以原子量镜像维护。
//!
//! # 设计概要（How）
//! - 内部使用 `parking_lot::Mutex<VecDeque<T>>` 存放元素，配合两个 `Condvar` 分别唤醒接收方与发送方；
//! - 容量至少为 1，请求的容量为 0 时按 1 处理；
//! - `len` 读取 `AtomicUsize` 镜像，不获取互斥锁。
//!
//! # 契约说明（What）
//! - `close` 幂等，唤醒所有等待者；关闭后 `send` 返回原值，`recv` 在队列排空后返回 `None`；
//! - `withdraw` 视为一次接收，用于请求方撤回尚未被消费的元素。

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// 向已关闭通道发送时返回的错误，携带未能送达的值。
#[derive(Error)]
#[error("sending on a closed channel")]
pub struct SendError<T>(pub T);

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SendError(..)")
    }
}

/// 非阻塞发送失败的原因。
#[derive(Error)]
pub enum TrySendError<T> {
    /// 通道已满（同步通道则表示当前没有接收方完成交接）。
    #[error("channel is full")]
    Full(T),
    /// 通道已关闭。
    #[error("sending on a closed channel")]
    Closed(T),
}

impl<T> TrySendError<T> {
    /// 取回未能送达的值。
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(value) | Self::Closed(value) => value,
        }
    }
}

impl<T> fmt::Debug for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("Full(..)"),
            Self::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

/// 限时发送失败的原因。
#[derive(Error)]
pub enum SendTimeoutError<T> {
    /// 截止时间前未能完成发送。
    #[error("timed out waiting to send on channel")]
    Timeout(T),
    /// 通道已关闭。
    #[error("sending on a closed channel")]
    Closed(T),
}

impl<T> SendTimeoutError<T> {
    /// 取回未能送达的值。
    pub fn into_inner(self) -> T {
        match self {
            Self::Timeout(value) | Self::Closed(value) => value,
        }
    }
}

impl<T> fmt::Debug for SendTimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(_) => f.write_str("Timeout(..)"),
            Self::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
}

/// 固定容量的阻塞通道。
///
/// # 契约说明（What）
/// - 最多缓存 `capacity` 个元素，队列满时 `send` 阻塞；
/// - 所有方法均为 `&self`，可放入 `Arc` 在线程间共享。
pub struct Channel<T> {
    state: Mutex<State<T>>,
    capacity: usize,
    len_hint: AtomicUsize,
    readable: Condvar,
    writable: Condvar,
}

impl<T> Channel<T> {
    /// 创建容量为 `capacity` 的通道，`0` 按 `1` 处理。
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            capacity,
            len_hint: AtomicUsize::new(0),
            readable: Condvar::new(),
            writable: Condvar::new(),
        }
    }

    /// 通道容量。
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前缓存的元素数量，仅读取一次原子量。
    pub fn len(&self) -> usize {
        self.len_hint.load(Ordering::Acquire)
    }

    /// 是否没有待接收的元素。
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 通道是否已关闭。
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// 阻塞发送，直到写入成功（同步通道则直到被接收）或通道关闭。
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        match self.send_until(value, None) {
            Ok(()) => Ok(()),
            Err(err) => Err(SendError(err.into_inner())),
        }
    }

    /// 非阻塞发送。
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        match self.send_until(value, Some(Instant::now())) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(value)) => Err(TrySendError::Full(value)),
            Err(SendTimeoutError::Closed(value)) => Err(TrySendError::Closed(value)),
        }
    }

    /// 最多等待 `timeout` 的发送。
    pub fn send_timeout(&self, value: T, timeout: Duration) -> Result<(), SendTimeoutError<T>> {
        self.send_until(value, Some(Instant::now() + timeout))
    }

    fn send_until(&self, value: T, deadline: Option<Instant>) -> Result<(), SendTimeoutError<T>> {
        let mut state = self.state.lock();
        while !state.closed && state.queue.len() >= self.capacity {
            if self.wait_writable(&mut state, deadline) {
                if state.closed || state.queue.len() < self.capacity {
                    break;
                }
                return Err(SendTimeoutError::Timeout(value));
            }
        }
        if state.closed {
            return Err(SendTimeoutError::Closed(value));
        }

        state.queue.push_back(value);
        self.len_hint.store(state.queue.len(), Ordering::Release);
        self.readable.notify_all();
        Ok(())
    }

    /// 阻塞接收；通道关闭且排空后返回 `None`。
    pub fn recv(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(value) = self.take_front(&mut state) {
                return Some(value);
            }
            if state.closed {
                return None;
            }
            self.readable.wait(&mut state);
        }
    }

    /// 非阻塞接收。
    pub fn try_recv(&self) -> Option<T> {
        let mut state = self.state.lock();
        self.take_front(&mut state)
    }

    /// 撤回第一个满足 `predicate` 的缓存元素。
    pub fn withdraw<F>(&self, mut predicate: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut state = self.state.lock();
        let index = state.queue.iter().position(|value| predicate(value))?;
        let value = state.queue.remove(index)?;
        self.len_hint.store(state.queue.len(), Ordering::Release);
        self.writable.notify_all();
        Some(value)
    }

    /// 关闭通道并唤醒所有等待者，重复调用无副作用。
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        drop(state);
        self.readable.notify_all();
        self.writable.notify_all();
    }

    /// 丢弃所有缓存元素，返回丢弃数量。
    pub fn drain(&self) -> usize {
        let mut state = self.state.lock();
        let drained = state.queue.len();
        state.queue.clear();
        self.len_hint.store(0, Ordering::Release);
        self.writable.notify_all();
        drained
    }

    fn take_front(&self, state: &mut State<T>) -> Option<T> {
        let value = state.queue.pop_front()?;
        self.len_hint.store(state.queue.len(), Ordering::Release);
        self.writable.notify_all();
        Some(value)
    }

    /// 等待可写事件，返回是否已过截止时间。
    fn wait_writable(
        &self,
        state: &mut parking_lot::MutexGuard<'_, State<T>>,
        deadline: Option<Instant>,
    ) -> bool {
        match deadline {
            None => {
                self.writable.wait(state);
                false
            }
            Some(deadline) => self.writable.wait_until(state, deadline).timed_out(),
        }
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
