//! `mem_file_contract` 集成测试：验证 `MemFile` 在公开 API 下与两种通用池的协作。
//!
//! # 测试目标（Why）
//! - 保障文件内容完整进入池化缓冲，读、写、定位都停留在固定大小之内；
//! - 缓冲无论经由 `close`、析构还是构造失败，都必须回到池中。

use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::process;

use spark_mempool::{BoundedPool, MemFile, UnboundedPool};

const CONTENT: &[u8] = b"Lorem ipsum dolor sit amet, consectetur adipiscing elit.";

/// 在系统临时目录下生成本进程独占的文件路径。
fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("spark-mempool-{}-{name}", process::id()))
}

#[test]
fn open_loads_whole_file_and_close_returns_buffer() {
    let path = scratch_path("open");
    fs::write(&path, CONTENT).expect("写入临时文件不应失败");

    let pool = UnboundedPool::new();
    let mut file = MemFile::open(&path, pool.clone()).expect("打开文件不应失败");
    fs::remove_file(&path).expect("删除临时文件不应失败");

    assert_eq!(file.data(), CONTENT);
    assert_eq!(file.stat().size(), CONTENT.len() as u64);
    assert!(!file.stat().is_dir());

    let mut text = String::new();
    file.read_to_string(&mut text).expect("读取不应失败");
    assert_eq!(text.as_bytes(), CONTENT);
    assert_eq!(file.position(), CONTENT.len());

    assert_eq!(pool.cached(), 0);
    file.close();
    assert_eq!(pool.cached(), 1, "关闭后缓冲应回到空闲链表");
}

#[test]
fn open_missing_file_reports_not_found() {
    let err = MemFile::open(scratch_path("missing"), UnboundedPool::new())
        .expect_err("不存在的文件应打开失败");
    assert_eq!(err.kind(), io::ErrorKind::NotFound);
}

#[test]
fn seek_then_read_through_bounded_pool() {
    let pool = BoundedPool::new(1);
    let mut file = MemFile::load(CONTENT, CONTENT.len(), pool.clone()).expect("读取不应失败");
    assert_eq!(pool.available(), 0, "缓冲应处于借出状态");

    file.seek(SeekFrom::Start(6)).expect("定位应成功");
    let mut word = [0u8; 5];
    file.read_exact(&mut word).expect("读取不应失败");
    assert_eq!(&word, b"ipsum");

    file.data_mut()[0] = b'l';
    assert_eq!(&file.data()[..5], b"lorem");

    drop(file);
    assert_eq!(pool.available(), 1, "析构后缓冲应归还");
}

#[test]
fn short_source_fails_and_returns_buffer() {
    let pool = BoundedPool::new(1);
    let err = MemFile::load(&CONTENT[..10], CONTENT.len(), pool.clone())
        .expect_err("数据不足时应失败");
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    assert!(err.to_string().contains("want"));
    assert_eq!(pool.available(), 1, "失败时缓冲应随错误归还");
}

#[test]
fn reading_past_end_yields_zero() {
    let mut file = MemFile::load(&b"ab"[..], 2, UnboundedPool::new()).expect("读取不应失败");
    let mut buf = [0u8; 8];
    assert_eq!(file.read(&mut buf).expect("读取不应失败"), 2);
    assert_eq!(file.read(&mut buf).expect("读到末尾不应报错"), 0);
}

#[test]
fn empty_file_is_supported() {
    let file = MemFile::load(io::empty(), 0, UnboundedPool::new()).expect("空文件不应失败");
    assert!(file.is_empty());
    assert_eq!(file.len(), 0);
    assert_eq!(file.stat().size(), 0);
}
