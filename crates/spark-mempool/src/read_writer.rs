//! 基于池化缓冲的读写流。
//!
//! `ReadWriter` 把一块从 [`MemPool`](crate::MemPool) 租来的 `Vec<u8>` 包装成先进先出的字节流：
//! 写入追加到尾部，读取从游标处消费。它同时实现 `std::io::{Read, Write}` 与 `bytes::Buf`，
//! 可以直接套在压缩、编码等链式读写器的两端。

use std::io;

use bytes::Buf;

/// 池化缓冲上的读写流。
///
/// # 契约说明（What）
/// - 未读部分为 `data[offset..]`；
/// - 全部读完后的下一次写入会复用整块缓冲，而不是继续向后追加；
/// - [`into_inner`](Self::into_inner) 交还底层缓冲，用于归还到池中。
#[derive(Debug, Default)]
pub struct ReadWriter {
    data: Vec<u8>,
    offset: usize,
}

impl ReadWriter {
    /// 创建不持有池化缓冲的空流。
    pub fn new() -> Self {
        Self::default()
    }

    /// 以已有缓冲构造流，缓冲的当前内容视为未读数据。
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data, offset: 0 }
    }

    /// 未读部分的只读视图，下一次读写前有效。
    pub fn unread(&self) -> &[u8] {
        &self.data[self.offset..]
    }

    /// 未读部分的拷贝。
    pub fn to_vec(&self) -> Vec<u8> {
        self.unread().to_vec()
    }

    /// 未读字节数。
    pub fn len(&self) -> usize {
        self.data.len() - self.offset
    }

    /// 是否没有未读数据。
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清空内容但保留底层容量。
    pub fn reset(&mut self) {
        self.data.clear();
        self.offset = 0;
    }

    /// 交还底层缓冲。
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// 为追加 `additional` 字节腾出空间。
    fn grow(&mut self, additional: usize) {
        if self.offset == 0 {
            return;
        }
        if self.is_empty() {
            self.reset();
            return;
        }
        // 已读前缀浪费了过半容量时，将未读数据前移而不是扩容。
        let unread = self.len();
        let capacity = self.data.capacity();
        if self.data.len() + additional > capacity && unread + additional <= capacity / 2 {
            self.data.drain(..self.offset);
            self.offset = 0;
        }
    }
}

impl io::Read for ReadWriter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let unread = self.unread();
        let n = unread.len().min(buf.len());
        buf[..n].copy_from_slice(&unread[..n]);
        self.offset += n;
        Ok(n)
    }
}

impl io::Write for ReadWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.grow(buf.len());
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Buf for ReadWriter {
    fn remaining(&self) -> usize {
        self.len()
    }

    fn chunk(&self) -> &[u8] {
        self.unread()
    }

    fn advance(&mut self, cnt: usize) {
        assert!(
            cnt <= self.len(),
            "cannot advance past the unread portion ({cnt} > {})",
            self.len()
        );
        self.offset += cnt;
    }
}
