//! # 打开文件表
//!
//! 每次成功的 `open` 占用表中的一个槽位，槽位的索引就是返回给调用者的句柄。
//! 多个句柄可以指向同一个 inode，各自拥有独立的偏移量。

use std::sync::Arc;

use enumflags2::{BitFlags, bitflags};
use spin::Mutex;
use vfs::{Error, Resource, Result};

use crate::block_store::BlockStore;
use crate::collections::SlotVec;
use crate::inode_table::Inode;

/// 打开文件的句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fd(pub usize);

#[rustfmt::skip]
#[allow(clippy::upper_case_acronyms)]
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFlag {
    /// 文件不存在时创建
    CREATE = 0b001,
    /// 先清空文件，再交给用户
    TRUNC  = 0b010,
    /// 偏移量从文件末尾开始
    APPEND = 0b100,
}

/// 表示一次打开的会话
#[derive(Debug)]
pub struct OpenFile {
    inode: Arc<Inode>,
    /// **文件**内的偏移量；锁住它也就锁住了整个句柄，
    /// 共用同一句柄的线程因此不会争抢偏移量
    offset: Mutex<usize>,
}

#[derive(Debug)]
pub struct OpenFileTable {
    files: SlotVec<Arc<OpenFile>>,
}

impl OpenFile {
    #[inline]
    pub fn inode(&self) -> &Arc<Inode> {
        &self.inode
    }

    pub fn offset(&self) -> usize {
        *self.offset.lock()
    }

    /// 按打开标志整理新会话：`TRUNC`独占 inode 并清空，
    /// `APPEND`只共享地读取文件大小，两者都没有时不碰 inode 的锁
    pub fn apply_flags(&self, flags: BitFlags<OpenFlag>, blocks: &BlockStore) {
        let mut offset = self.offset.lock();
        if flags.contains(OpenFlag::TRUNC) {
            self.inode.content().write().clear(blocks);
            *offset = 0;
        } else if flags.contains(OpenFlag::APPEND) {
            *offset = self.inode.content().read().size;
        }
    }

    /// 先锁句柄，再以共享方式锁 inode
    pub fn read(&self, buf: &mut [u8], blocks: &BlockStore) -> usize {
        let mut offset = self.offset.lock();
        let content = self.inode.content().read();

        let read = content.read_at(*offset, buf, blocks);
        *offset += read;
        log::trace!(
            "read {read} bytes from inode {} (offset now {})",
            self.inode.id(),
            *offset
        );
        read
    }

    /// 先锁句柄，再独占 inode
    pub fn write(&self, buf: &[u8], blocks: &BlockStore) -> Result<usize> {
        let mut offset = self.offset.lock();
        let mut content = self.inode.content().write();

        let written = content.write_at(*offset, buf, blocks)?;
        *offset += written;
        log::trace!(
            "wrote {written} bytes to inode {} (size now {})",
            self.inode.id(),
            content.size
        );
        Ok(written)
    }
}

impl OpenFileTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            files: SlotVec::with_capacity(capacity),
        }
    }

    /// 为 inode 开启新的会话，返回句柄
    pub fn acquire(&mut self, inode: Arc<Inode>, offset: usize) -> Result<Fd> {
        let file = Arc::new(OpenFile {
            inode,
            offset: Mutex::new(offset),
        });
        self.files
            .insert(file)
            .map(Fd)
            .map_err(|_| Error::Exhausted(Resource::OpenFiles))
    }

    pub fn get(&self, fd: Fd) -> Result<Arc<OpenFile>> {
        self.files.get(fd.0).cloned().ok_or(Error::BadHandle)
    }

    pub fn release(&mut self, fd: Fd) -> Result<Arc<OpenFile>> {
        self.files.remove(fd.0).ok_or(Error::BadHandle)
    }

    /// 是否有句柄指向该 inode
    pub fn is_open(&self, inode_id: u32) -> bool {
        self.files
            .occupied()
            .any(|(_, file)| file.inode.id() == inode_id)
    }

    /// 正在使用的句柄个数
    pub fn len(&self) -> usize {
        self.files.occupied().count()
    }
}
