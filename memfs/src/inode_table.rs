//! # inode 表
//!
//! 定长的 inode 记录数组加上分配位图。
//!
//! 每个存活的 inode 自带一把读写锁，保护它的大小、数据块编号以及块内数据；
//! 锁随 inode 的分配而创建，随 inode 的回收而销毁，
//! 已打开的句柄通过 [`Arc`] 持有 inode，因此不会拿到悬垂的锁。

use std::sync::Arc;

use spin::RwLock;
use vfs::{Error, InodeKind, Resource, Result, Stat};

use crate::block_store::BlockStore;
use crate::collections::SlotVec;
use crate::layout::Bitmap;

#[derive(Debug)]
pub struct Inode {
    id: u32,
    kind: InodeKind,
    content: RwLock<InodeContent>,
}

/// 受 inode 读写锁保护的部分
#[derive(Debug, Default)]
pub struct InodeContent {
    /// 文件当前的字节数
    pub size: usize,
    /// 存放内容的唯一数据块，空文件没有数据块
    pub data_block: Option<u32>,
}

/// inode 表中的一条记录，链接计数只在元数据锁下修改
#[derive(Debug)]
struct InodeSlot {
    /// 硬链接个数
    links: u32,
    inode: Arc<Inode>,
}

#[derive(Debug)]
pub struct InodeTable {
    bitmap: Bitmap,
    slots: SlotVec<InodeSlot>,
}

impl Inode {
    fn new(id: u32, kind: InodeKind) -> Self {
        Self {
            id,
            kind,
            content: RwLock::new(InodeContent::default()),
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> InodeKind {
        self.kind
    }

    #[inline]
    pub fn content(&self) -> &RwLock<InodeContent> {
        &self.content
    }

    /// 共享地读取内容锁，链接计数由调用者在元数据锁下取得
    pub fn stat(&self, links: u32) -> Stat {
        let content = self.content.read();
        Stat {
            inode: self.id,
            kind: self.kind,
            size: content.size,
            links,
            blocks: usize::from(content.data_block.is_some()),
        }
    }
}

impl InodeContent {
    /// 从指定位置(字节偏移)读出数据填充`buf`，位于文件末尾时返回0
    pub fn read_at(&self, offset: usize, buf: &mut [u8], blocks: &BlockStore) -> usize {
        if offset >= self.size {
            return 0;
        }
        let len = buf.len().min(self.size - offset);
        let block_id = self
            .data_block
            .expect("non-empty inode without a data block");

        blocks.get(block_id).read().read_at(offset, &mut buf[..len])
    }

    /// 从指定位置写入`buf`，写入量以数据块容量为限；
    /// 空文件会在第一次写入时分配数据块。
    pub fn write_at(&mut self, offset: usize, buf: &[u8], blocks: &BlockStore) -> Result<usize> {
        let len = buf.len().min(blocks.block_size().saturating_sub(offset));
        if len == 0 {
            return Ok(0);
        }

        let block_id = match self.data_block {
            Some(block_id) => block_id,
            None => *self.data_block.insert(blocks.alloc()?),
        };
        let written = blocks.get(block_id).write().write_at(offset, &buf[..len]);
        debug_assert_eq!(written, len);

        self.size = self.size.max(offset + written);
        Ok(written)
    }

    /// 清空内容并归还数据块
    pub fn clear(&mut self, blocks: &BlockStore) {
        if let Some(block_id) = self.data_block.take() {
            blocks.dealloc(block_id);
        }
        self.size = 0;
    }

    /// 以字节序列读出全部内容
    pub fn to_vec(&self, blocks: &BlockStore) -> Vec<u8> {
        let mut bytes = vec![0; self.size];
        let read = self.read_at(0, &mut bytes, blocks);
        debug_assert_eq!(read, self.size);
        bytes
    }
}

impl InodeTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            bitmap: Bitmap::new(capacity),
            slots: SlotVec::with_capacity(capacity),
        }
    }

    /// 分配新的 inode 并返回其ID，链接计数从1开始
    pub fn alloc(&mut self, kind: InodeKind) -> Result<u32> {
        let id = self
            .bitmap
            .alloc()
            .ok_or(Error::Exhausted(Resource::Inodes))?;
        let slot = InodeSlot {
            links: 1,
            inode: Arc::new(Inode::new(id, kind)),
        };
        let stale = self.slots.insert_at(id as usize, slot);
        debug_assert!(stale.is_none());

        log::debug!("alloc inode {id} ({kind:?})");
        Ok(id)
    }

    pub fn get(&self, id: u32) -> Option<Arc<Inode>> {
        self.slots.get(id as usize).map(|slot| slot.inode.clone())
    }

    pub fn links(&self, id: u32) -> Option<u32> {
        self.slots.get(id as usize).map(|slot| slot.links)
    }

    /// 增加一个硬链接
    pub fn link(&mut self, id: u32) {
        self.slot_mut(id).links += 1;
    }

    /// 减少一个硬链接，返回剩余的链接数
    pub fn unlink(&mut self, id: u32) -> u32 {
        let slot = self.slot_mut(id);
        assert!(slot.links > 0, "inode {id} has no links left");
        slot.links -= 1;
        slot.links
    }

    /// 回收 inode 及其数据块
    pub fn dealloc(&mut self, id: u32, blocks: &BlockStore) {
        let slot = self
            .slots
            .remove(id as usize)
            .unwrap_or_else(|| panic!("dealloc of free inode {id}"));
        slot.inode.content.write().clear(blocks);
        self.bitmap.dealloc(id);
        log::debug!("dealloc inode {id}");
    }

    /// 存活的 inode 个数
    pub fn len(&self) -> usize {
        self.bitmap.allocated()
    }

    fn slot_mut(&mut self, id: u32) -> &mut InodeSlot {
        self.slots
            .get_mut(id as usize)
            .unwrap_or_else(|| panic!("inode {id} is not allocated"))
    }
}
