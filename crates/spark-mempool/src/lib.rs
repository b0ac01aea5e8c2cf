//! `spark-mempool` 提供三点锁与编解码链路共用的字节缓冲池。
//!
//! # 模块定位（Why）
//! - 三点锁需要一个“有界、可追踪身份、容忍重复归还”的池来产出代表持锁状态的令牌；
//! - 流式编解码等组件只需要普通的租借 / 归还语义，因此同时提供有界与无界两种通用池。
//!
//! # 设计概要（How）
//! - `channel` 模块实现带容量语义的阻塞通道，是有界池与三点锁信号的共同底座；
//! - `unique` 模块实现 [`UniquePool`]：槽位数组 + 代数句柄，归还时核对身份；
//! - `pool` 模块定义 [`MemPool`] 契约及 [`BoundedPool`] / [`UnboundedPool`] 两种实现；
//! - `read_writer` 模块把池化缓冲包装为 `io::Read + io::Write + bytes::Buf` 的流；
//! - `mem_file` 模块把整个文件读入池化缓冲，提供固定大小、可定位的 [`MemFile`]。
//!
//! # 使用约定（What）
//! - 池实例在调用点显式构造并注入，crate 不提供进程级全局默认池；
//! - 所有池类型均为 `Clone + Send + Sync`，克隆共享同一份状态。

pub mod channel;
mod mem_file;
mod pool;
mod read_writer;
mod stats;
mod unique;

pub use mem_file::{MemFile, MemFileStat};
pub use pool::{BoundedPool, MemPool, UnboundedPool};
pub use read_writer::ReadWriter;
pub use stats::PoolStats;
pub use unique::{Handle, PoolBuf, UniquePool};
