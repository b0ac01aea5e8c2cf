//! 三点锁的构造配置。
//!
//! # 设计初衷（Why）
//! - 运行期构造需要注入钩子与外部令牌池，这些值无法序列化，因此以 [`ThreePointLockConfig`] 的构建器方法表达；
//! - 超时、最小令牌尺寸与并发持有者数量属于部署参数，由 [`LockSettings`] 从配置文件载入，再转换为运行期配置。
//!
//! # 契约（What）
//! - 超时为零等价于“无限等待”；
//! - 未提供令牌池时，锁私有一个仅容纳单个持有者、元素至少 `min_element_size` 字节的池；
//! - `min_element_size` 默认为 `1`。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spark_mempool::UniquePool;

use crate::error::HookError;

/// 默认的最小令牌尺寸。
pub const DEFAULT_MIN_ELEMENT_SIZE: usize = 1;

/// 加锁前 / 解锁后执行的钩子，通常用于唤醒阻塞在系统调用中的工作线程。
pub type LockHook = Arc<dyn Fn() -> Result<(), HookError> + Send + Sync>;

/// [`ThreePointLock`](crate::ThreePointLock) 的运行期配置。
#[derive(Clone)]
pub struct ThreePointLockConfig {
    /// 外部提供的令牌池，其容量即允许同时在途的加锁请求数。
    pub pool: Option<UniquePool>,
    /// 加锁前钩子，在请求发布之后执行。
    pub on_lock: Option<LockHook>,
    /// 解锁后钩子，在完成信号发出之后执行。
    pub on_unlock: Option<LockHook>,
    /// 等待工作线程确认的最长时间；`None` 表示无限等待。
    pub timeout: Option<Duration>,
    /// 私有令牌池的元素尺寸，仅在未提供 `pool` 时生效。
    pub min_element_size: usize,
}

impl Default for ThreePointLockConfig {
    fn default() -> Self {
        Self {
            pool: None,
            on_lock: None,
            on_unlock: None,
            timeout: None,
            min_element_size: DEFAULT_MIN_ELEMENT_SIZE,
        }
    }
}

impl ThreePointLockConfig {
    /// 使用外部令牌池，其容量决定并发持有上限。
    pub fn with_pool(mut self, pool: UniquePool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// 设置加锁前钩子，在请求发布之后、等待确认之前执行。
    pub fn with_lock_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.on_lock = Some(Arc::new(hook));
        self
    }

    /// 设置解锁后钩子，在完成信号发出之后执行。
    pub fn with_unlock_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.on_unlock = Some(Arc::new(hook));
        self
    }

    /// 设置确认超时；传入零表示无限等待。
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// 设置私有令牌池的元素尺寸。
    pub fn with_min_element_size(mut self, size: usize) -> Self {
        self.min_element_size = size;
        self
    }
}

impl fmt::Debug for ThreePointLockConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreePointLockConfig")
            .field("pool", &self.pool)
            .field("on_lock", &self.on_lock.is_some())
            .field("on_unlock", &self.on_unlock.is_some())
            .field("timeout", &self.timeout)
            .field("min_element_size", &self.min_element_size)
            .finish()
    }
}

/// 可从配置文件载入的三点锁参数。
///
/// ```toml
/// timeout_ms = 250
/// min_element_size = 64
/// concurrent_holders = 4
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockSettings {
    /// 确认超时（毫秒），`0` 表示无限等待。
    pub timeout_ms: u64,
    /// 令牌的最小字节数。
    pub min_element_size: usize,
    /// 允许同时在途的加锁请求数，`0` 按 `1` 处理。
    pub concurrent_holders: usize,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 0,
            min_element_size: DEFAULT_MIN_ELEMENT_SIZE,
            concurrent_holders: 1,
        }
    }
}

impl LockSettings {
    /// 换算后的确认超时，`timeout_ms == 0` 时为 `None`。
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// 转换为运行期配置，并按 `concurrent_holders` 创建专属令牌池。
    pub fn into_config(self) -> ThreePointLockConfig {
        let pool = UniquePool::new(self.concurrent_holders.max(1), self.min_element_size);
        ThreePointLockConfig {
            pool: Some(pool),
            timeout: self.timeout(),
            min_element_size: self.min_element_size,
            ..ThreePointLockConfig::default()
        }
    }
}

impl From<LockSettings> for ThreePointLockConfig {
    fn from(settings: LockSettings) -> Self {
        settings.into_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_means_wait_forever() {
        let config = ThreePointLockConfig::default().with_timeout(Duration::ZERO);
        assert_eq!(config.timeout, None);
        assert_eq!(LockSettings::default().timeout(), None);
    }

    #[test]
    fn settings_parse_from_toml() {
        let settings: LockSettings = toml::from_str(
            r#"
            timeout_ms = 250
            concurrent_holders = 4
            "#,
        )
        .expect("配置应能解析");
        assert_eq!(settings.timeout(), Some(Duration::from_millis(250)));
        assert_eq!(settings.min_element_size, DEFAULT_MIN_ELEMENT_SIZE);

        let config = settings.into_config();
        let pool = config.pool.as_ref().expect("应创建专属令牌池");
        assert_eq!(pool.capacity(), 4);
        assert_eq!(config.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn unknown_settings_are_rejected() {
        let parsed = toml::from_str::<LockSettings>("timeout = 5");
        assert!(parsed.is_err());
    }

    #[test]
    fn zero_holders_fall_back_to_one() {
        let settings = LockSettings {
            concurrent_holders: 0,
            ..LockSettings::default()
        };
        let config = settings.into_config();
        assert_eq!(config.pool.map(|pool| pool.capacity()), Some(1));
    }
}
