use std::sync::Arc;

use spin::Mutex;
use tracing::debug;

use crate::channel::Channel;
use crate::read_writer::ReadWriter;

/// 通用字节缓冲池契约。
///
/// # 设计初衷（Why）
/// - 编解码、流式读写等组件只需要“按大小租借 / 归还”两个动作，不关心池是否有界；
/// - 以 trait 抽象后，调用方在构造时显式注入池实例，而不是依赖进程级全局默认池。
///
/// # 契约定义（What）
/// - `get(size)` 返回长度恰为 `size` 的缓冲，内容未定义；
/// - `put` 接收任意来源的缓冲，池不做身份校验（需要身份追踪请使用 [`UniquePool`](crate::UniquePool)）；
/// - 实现必须线程安全。
pub trait MemPool: Send + Sync {
    /// 租借长度为 `size` 的缓冲。
    fn get(&self, size: usize) -> Vec<u8>;

    /// 归还缓冲。
    fn put(&self, buf: Vec<u8>);

    /// 以流的形式租借缓冲。
    fn get_read_writer(&self, size: usize) -> ReadWriter {
        ReadWriter::from_vec(self.get(size))
    }

    /// 归还流所持有的缓冲。
    fn put_read_writer(&self, rw: ReadWriter) {
        self.put(rw.into_inner());
    }
}

/// 将缓冲调整为 `size` 字节，容量不足时按 `2 * size` 重新分配。
fn fit(mut buf: Vec<u8>, size: usize) -> Vec<u8> {
    if buf.capacity() < size {
        buf = vec![0; size.saturating_mul(2)];
    }
    buf.resize(size, 0);
    buf
}

/// 基于有界通道的缓冲池，最多同时借出 `n` 个缓冲。
///
/// # 核心机制（How）
/// - 构造时向容量为 `n` 的通道预填充 `n` 个空缓冲；
/// - `get` 在通道为空时阻塞，形成背压；`put` 将缓冲放回通道。
///
/// # 风险提示（Trade-offs）
/// - 池不追踪身份：重复归还同一缓冲会使池内缓冲数量膨胀，
///   甚至在通道已满时阻塞归还方。需要幂等归还时请改用 [`UniquePool`](crate::UniquePool)。
#[derive(Clone)]
pub struct BoundedPool {
    elements: Arc<Channel<Vec<u8>>>,
}

impl BoundedPool {
    /// 创建容纳 `n` 个缓冲的有界池。
    pub fn new(n: usize) -> Self {
        let elements = Channel::bounded(n);
        for _ in 0..n {
            let _ = elements.try_send(Vec::new());
        }
        Self {
            elements: Arc::new(elements),
        }
    }

    /// 当前可立即租借的缓冲数量。
    pub fn available(&self) -> usize {
        self.elements.len()
    }

    /// 释放池内全部缓冲，之后阻塞中的与后续的 `get` 都会 panic。
    pub fn clear(&self) {
        self.elements.close();
        let released = self.elements.drain();
        debug!(released, "cleared bounded memory pool");
    }
}

impl MemPool for BoundedPool {
    /// # Panics
    /// 池已被 [`clear`](BoundedPool::clear) 时 panic。
    fn get(&self, size: usize) -> Vec<u8> {
        match self.elements.recv() {
            Some(buf) => fit(buf, size),
            None => panic!("bounded memory pool used after clear"),
        }
    }

    fn put(&self, mut buf: Vec<u8>) {
        buf.resize(buf.capacity(), 0);
        if self.elements.send(buf).is_err() {
            debug!("dropped buffer returned to a cleared bounded pool");
        }
    }
}

/// 无上限的自由链表缓冲池。
///
/// # 核心机制（How）
/// - 内部维护 `spin::Mutex<Vec<Vec<u8>>>` 作为自由链表，租借时优先复用容量足够的块；
/// - 链表中没有合适的块时直接在堆上按 `2 * size` 分配，从不阻塞。
#[derive(Clone, Default)]
pub struct UnboundedPool {
    free_list: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl UnboundedPool {
    /// 创建自由链表为空的无界池。
    pub fn new() -> Self {
        Self::default()
    }

    /// 自由链表中缓存的缓冲数量。
    pub fn cached(&self) -> usize {
        self.free_list.lock().len()
    }

    /// 清空自由链表，返回释放的字节容量。
    pub fn shrink_to_fit(&self) -> usize {
        let mut list = self.free_list.lock();
        let reclaimed = list.iter().map(Vec::capacity).sum();
        list.clear();
        reclaimed
    }
}

impl MemPool for UnboundedPool {
    fn get(&self, size: usize) -> Vec<u8> {
        let reused = {
            let mut list = self.free_list.lock();
            list.iter()
                .position(|buf| buf.capacity() >= size)
                .map(|index| list.swap_remove(index))
        };
        fit(reused.unwrap_or_default(), size)
    }

    fn put(&self, mut buf: Vec<u8>) {
        buf.resize(buf.capacity(), 0);
        self.free_list.lock().push(buf);
    }
}
