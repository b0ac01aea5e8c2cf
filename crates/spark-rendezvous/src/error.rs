//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义三点锁与槽位限流器对外暴露的可恢复错误；
//! - 池协议违规（归还外来缓冲等）属于编程错误，直接 `panic!`，不在此枚举之列。
//!
//! ## 设计要求（What）
//! - 所有错误实现 `thiserror::Error`，钩子错误原样保留在 `source()` 链中；
//! - 变体均为 `Send + Sync + 'static`，可跨线程传播。

use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

/// 钩子返回的错误类型。
pub type HookError = Box<dyn StdError + Send + Sync + 'static>;

/// 三点锁与限流器的错误域。
#[derive(Debug, Error)]
pub enum RendezvousError {
    /// 在配置的超时时间内未收到工作线程的确认，令牌已归还到池中。
    #[error("timeout waiting for lock confirmation after {waited:?}")]
    ConfirmTimeout { waited: Duration },

    /// 加锁前钩子失败，请求已撤回、令牌已归还。
    #[error("pre-lock hook failed: {0}")]
    LockHook(#[source] HookError),

    /// 解锁后钩子失败；完成信号此时已经发出。
    #[error("post-unlock hook failed: {0}")]
    UnlockHook(#[source] HookError),

    /// 锁已关闭，不再接受新的周期。
    #[error("three-point lock has been closed")]
    Closed,

    /// 工作线程确认时发现请求方已放弃该周期，工作线程不应再等待解锁信号。
    #[error("lock request for cycle {cycle} was abandoned by its locker")]
    Abandoned { cycle: u64 },

    /// 限流器当前没有空闲槽位。
    #[error("no semaphore slot available")]
    NoSlotAvailable,
}

impl RendezvousError {
    /// 是否为确认超时。
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConfirmTimeout { .. })
    }
}
