//! 池化内存文件。
//!
//! # 模块定位（Why）
//! - 解码器等组件常需要把整个小文件读入内存后随机访问，逐次分配会让短生命周期的大缓冲反复进出堆；
//! - `MemFile` 从 [`MemPool`] 租借恰好等于文件大小的缓冲，关闭时归还，使这类读取复用同一批内存。
//!
//! # 设计概要（How）
//! - 构造时一次性读满缓冲，之后的读写都在内存中完成，不再触碰底层文件；
//! - 实现 `io::Read + io::Write + io::Seek`，可直接交给面向流的解析器；
//! - 缓冲在 [`MemFile::close`] 或析构时归还到池中。
//!
//! # 契约说明（What）
//! - 文件大小在构造后固定：写入不会扩展缓冲，写满后 `write` 返回 `0`；
//! - 只支持 `SeekFrom::Start`，且目标位置必须落在数据范围之内；
//! - 构造时读到的字节数少于声明大小属于错误，缓冲会立即归还。

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::mem;
use std::path::Path;

use tracing::debug;

use crate::pool::MemPool;

/// 内存文件的元信息。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemFileStat {
    size: u64,
}

impl MemFileStat {
    /// 数据长度（字节）。
    pub fn size(&self) -> u64 {
        self.size
    }

    /// 内存文件永远不是目录。
    pub fn is_dir(&self) -> bool {
        false
    }
}

/// 从 [`MemPool`] 租借缓冲承载的内存文件。
pub struct MemFile<P: MemPool> {
    data: Vec<u8>,
    pos: usize,
    pool: P,
}

impl<P: MemPool> MemFile<P> {
    /// 打开 `path` 并将其完整内容读入池化缓冲。
    pub fn open<Q: AsRef<Path>>(path: Q, pool: P) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        let size = usize::try_from(file.metadata()?.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "file too large for memory buffer")
        })?;
        let mem_file = Self::load(file, size, pool)?;
        debug!(path = %path.as_ref().display(), size, "loaded file into pooled memory");
        Ok(mem_file)
    }

    /// 从 `reader` 读取恰好 `size` 字节构造内存文件。
    ///
    /// 读取不足 `size` 字节时返回 `UnexpectedEof`，已租借的缓冲随错误一同归还。
    pub fn load<R: Read>(mut reader: R, size: usize, pool: P) -> io::Result<Self> {
        let mut mem_file = Self {
            data: pool.get(size),
            pos: 0,
            pool,
        };
        let mut filled = 0;
        while filled < size {
            match reader.read(&mut mem_file.data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        if filled != size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("unexpected number of bytes read (want {size}, have {filled})"),
            ));
        }
        Ok(mem_file)
    }

    /// 零拷贝访问全部数据。
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 零拷贝修改全部数据，长度不可变。
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// 当前读写位置。
    pub fn position(&self) -> usize {
        self.pos
    }

    /// 数据长度，构造后固定。
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空文件。
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 读取元信息。
    pub fn stat(&self) -> MemFileStat {
        MemFileStat {
            size: self.data.len() as u64,
        }
    }

    /// 关闭文件并将缓冲归还到池中，等价于析构。
    pub fn close(self) {}
}

impl<P: MemPool> Read for MemFile<P> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl<P: MemPool> Write for MemFile<P> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let remaining = &mut self.data[self.pos..];
        let n = remaining.len().min(buf.len());
        remaining[..n].copy_from_slice(&buf[..n]);
        self.pos += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<P: MemPool> Seek for MemFile<P> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let SeekFrom::Start(offset) = pos else {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "only seeking from the start of the buffer is supported",
            ));
        };
        match usize::try_from(offset) {
            Ok(offset) if offset < self.data.len() => {
                self.pos = offset;
                Ok(offset as u64)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("seek offset {offset} beyond end of buffer"),
            )),
        }
    }
}

impl<P: MemPool> Drop for MemFile<P> {
    fn drop(&mut self) {
        self.pool.put(mem::take(&mut self.data));
    }
}

impl<P: MemPool> std::fmt::Debug for MemFile<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemFile")
            .field("len", &self.data.len())
            .field("pos", &self.pos)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::UnboundedPool;

    #[test]
    fn write_is_bounded_by_file_size() {
        let mut file = MemFile::load(&b"abcd"[..], 4, UnboundedPool::new()).expect("读取不应失败");
        file.seek(SeekFrom::Start(2)).expect("定位应成功");
        assert_eq!(file.write(b"XYZ").expect("写入不应失败"), 2);
        assert_eq!(file.data(), b"abXY");
        assert!(file.write_all(b"!").is_err(), "写满后继续写入应失败");
    }

    #[test]
    fn seek_rejects_relative_and_out_of_range() {
        let mut file = MemFile::load(&b"abc"[..], 3, UnboundedPool::new()).expect("读取不应失败");
        assert_eq!(
            file.seek(SeekFrom::Current(1)).expect_err("不支持相对定位").kind(),
            io::ErrorKind::Unsupported
        );
        assert_eq!(
            file.seek(SeekFrom::Start(3)).expect_err("越界定位应失败").kind(),
            io::ErrorKind::UnexpectedEof
        );
        assert_eq!(file.position(), 0);
    }
}
