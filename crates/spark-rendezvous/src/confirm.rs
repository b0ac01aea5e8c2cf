//! 按周期编号关联的同步确认点（三点握手的第二点）。
//!
//! # 设计初衷（Why）
//! - 匿名的同步确认信号存在隐患：请求方超时离开后，工作线程迟到的确认会一直阻塞，
//!   直到某个无关的后续加锁恰好接收它，而该调用方拿到的并不是自己的确认；
//! - 为每个周期分配编号并让确认携带编号，可以把“迟到的确认”精确地识别为已放弃的周期。
//!
//! # 执行逻辑（How）
//! - `delivered`：工作线程已送达、尚未被请求方取走的周期；
//! - `abandoned`：请求方已放弃（超时、钩子失败、锁关闭）的周期；
//! - 工作线程送达后等待请求方取走，与无缓冲通道的交接语义一致；若周期被放弃则立即返回。
//!
//! # 契约（What）
//! - 同一周期的确认至多被取走一次；
//! - 请求方超时与工作线程送达在同一把锁下裁决：送达先发生则视为成功，否则标记放弃。

use std::collections::HashSet;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::RendezvousError;

/// 请求方等待确认失败的原因。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WaitError {
    Timeout,
    Closed,
}

#[derive(Default)]
struct State {
    delivered: HashSet<u64>,
    abandoned: HashSet<u64>,
    closed: bool,
}

#[derive(Default)]
pub(crate) struct Confirmations {
    state: Mutex<State>,
    changed: Condvar,
}

impl Confirmations {
    /// 工作线程送达确认，并等待请求方取走。
    pub(crate) fn confirm(&self, cycle: u64) -> Result<(), RendezvousError> {
        let mut state = self.state.lock();
        if state.abandoned.remove(&cycle) {
            return Err(RendezvousError::Abandoned { cycle });
        }
        if state.closed {
            return Err(RendezvousError::Closed);
        }
        state.delivered.insert(cycle);
        self.changed.notify_all();

        loop {
            if state.abandoned.remove(&cycle) {
                state.delivered.remove(&cycle);
                return Err(RendezvousError::Abandoned { cycle });
            }
            if !state.delivered.contains(&cycle) {
                return Ok(());
            }
            if state.closed {
                state.delivered.remove(&cycle);
                return Err(RendezvousError::Closed);
            }
            self.changed.wait(&mut state);
        }
    }

    /// 请求方等待本周期的确认；`timeout` 为空时无限等待。
    pub(crate) fn wait(&self, cycle: u64, timeout: Option<Duration>) -> Result<(), WaitError> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut state = self.state.lock();
        loop {
            if state.delivered.remove(&cycle) {
                self.changed.notify_all();
                return Ok(());
            }
            if state.closed {
                state.abandoned.insert(cycle);
                self.changed.notify_all();
                return Err(WaitError::Closed);
            }
            match deadline {
                None => self.changed.wait(&mut state),
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out() {
                        if state.delivered.remove(&cycle) {
                            self.changed.notify_all();
                            return Ok(());
                        }
                        state.abandoned.insert(cycle);
                        self.changed.notify_all();
                        return Err(WaitError::Timeout);
                    }
                }
            }
        }
    }

    /// 请求方主动放弃周期，已送达但未取走的确认一并作废。
    pub(crate) fn abandon(&self, cycle: u64) {
        let mut state = self.state.lock();
        state.delivered.remove(&cycle);
        state.abandoned.insert(cycle);
        self.changed.notify_all();
    }

    /// 撤销放弃标记，用于请求在被消费前已成功撤回的情形。
    pub(crate) fn forget(&self, cycle: u64) {
        self.state.lock().abandoned.remove(&cycle);
    }

    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.changed.notify_all();
    }
}
