//! `spark-rendezvous` 提供三点锁与槽位限流器。
//!
//! # 模块定位（Why）
//! - 高吞吐的工作循环（抓包、解码等）需要偶尔被外部线程暂停，但不能为此在每次迭代上加锁；
//! - 三点锁把一次外部加锁拆为“请求、确认、完成”三个交接点，工作线程的常规开销只有一次原子读取。
//!
//! # 设计概要（How）
//! - `lock` 模块实现 [`ThreePointLock`]，令牌来自 `spark-mempool` 的身份追踪池，池容量即并发持有上限；
//! - `confirm` 模块按周期编号关联确认，迟到的确认不会阻塞工作线程；
//! - `config` 模块提供运行期构建器与可序列化的部署参数；
//! - `limit` 模块实现独立的计数信号量 [`Semaphore`]。
//!
//! # 使用约定（What）
//! ```ignore
//! let lock = Arc::new(ThreePointLock::default());
//! // 工作线程
//! if lock.has_lock_request() {
//!     if let Some(token) = lock.consume_lock_request() {
//!         if lock.confirm_lock_request(&token).is_ok() {
//!             while !lock.consume_unlock_request() {
//!                 thread::sleep(Duration::from_millis(1));
//!             }
//!         }
//!         lock.release(token);
//!     }
//! }
//! // 请求方
//! lock.lock()?;
//! // 独占访问共享状态
//! lock.unlock()?;
//! ```

mod config;
mod confirm;
mod error;
mod limit;
mod lock;

pub use config::{DEFAULT_MIN_ELEMENT_SIZE, LockHook, LockSettings, ThreePointLockConfig};
pub use error::{HookError, RendezvousError};
pub use limit::{NO_LIMIT, Semaphore, SlotGuard};
pub use lock::{ThreePointLock, Token};
