//! # 数据块池
//!
//! 一组定长的数据块常驻内存，由位图记录分配情况。
//! 每个文件至多拥有一个数据块，块与 inode 一一对应、互不共享。
//!
//! 块内数据的访问都经过带边界检查的切片，
//! 持有块的 inode 的读写锁决定了谁能读写该块，
//! 块自身的锁只用来满足借用规则，不会发生争用。

use spin::{Mutex, RwLock};
use vfs::{Error, Resource, Result};

use crate::layout::Bitmap;

/// 内存中的数据块
#[derive(Debug)]
pub struct DataBlock {
    data: Box<[u8]>,
}

impl DataBlock {
    fn new(block_size: usize) -> Self {
        Self {
            data: vec![0; block_size].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn map<V>(&self, f: impl FnOnce(&[u8]) -> V) -> V {
        f(&self.data)
    }

    #[inline]
    pub fn map_mut<V>(&mut self, f: impl FnOnce(&mut [u8]) -> V) -> V {
        f(&mut self.data)
    }

    /// 从块内偏移`offset`处读出数据填充`buf`，返回读取的字节数
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        let Some(src) = self.data.get(offset..) else {
            return 0;
        };
        let len = buf.len().min(src.len());
        buf[..len].copy_from_slice(&src[..len]);
        len
    }

    /// 从块内偏移`offset`处写入`buf`，超出块末尾的部分被截断
    pub fn write_at(&mut self, offset: usize, buf: &[u8]) -> usize {
        let Some(dest) = self.data.get_mut(offset..) else {
            return 0;
        };
        let len = buf.len().min(dest.len());
        dest[..len].copy_from_slice(&buf[..len]);
        len
    }
}

#[derive(Debug)]
pub struct BlockStore {
    block_size: usize,
    bitmap: Mutex<Bitmap>,
    blocks: Box<[RwLock<DataBlock>]>,
}

impl BlockStore {
    pub fn new(block_count: usize, block_size: usize) -> Self {
        Self {
            block_size,
            bitmap: Mutex::new(Bitmap::new(block_count)),
            blocks: (0..block_count)
                .map(|_| RwLock::new(DataBlock::new(block_size)))
                .collect(),
        }
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// 分配新的数据块并返回其ID
    pub fn alloc(&self) -> Result<u32> {
        let block_id = self
            .bitmap
            .lock()
            .alloc()
            .ok_or(Error::Exhausted(Resource::Blocks))?;
        log::debug!("alloc data block {block_id}");
        Ok(block_id)
    }

    /// 清零并归还数据块
    pub fn dealloc(&self, block_id: u32) {
        self.get(block_id).write().map_mut(|data| data.fill(0));
        self.bitmap.lock().dealloc(block_id);
        log::debug!("dealloc data block {block_id}");
    }

    /// # Panics
    ///
    /// 数据块未被分配时panic：这意味着某个 inode 引用了已归还的块。
    pub fn get(&self, block_id: u32) -> &RwLock<DataBlock> {
        assert!(
            self.bitmap.lock().is_allocated(block_id),
            "data block {block_id} is not allocated"
        );
        &self.blocks[block_id as usize]
    }

    pub fn free_blocks(&self) -> usize {
        let bitmap = self.bitmap.lock();
        bitmap.capacity() - bitmap.allocated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaust_and_reuse() {
        let store = BlockStore::new(2, 16);
        assert_eq!(store.alloc(), Ok(0));
        assert_eq!(store.alloc(), Ok(1));
        assert_eq!(store.alloc(), Err(Error::Exhausted(Resource::Blocks)));
        assert_eq!(store.free_blocks(), 0);

        store.dealloc(0);
        assert_eq!(store.free_blocks(), 1);
        assert_eq!(store.alloc(), Ok(0));
    }

    #[test]
    fn writes_are_clipped_to_the_block() {
        let store = BlockStore::new(1, 8);
        let id = store.alloc().unwrap();

        let mut block = store.get(id).write();
        assert_eq!(block.write_at(5, b"abcdef"), 3);
        assert_eq!(block.write_at(8, b"x"), 0);
        assert_eq!(block.write_at(9, b"x"), 0);

        let mut buf = [0; 8];
        assert_eq!(block.read_at(4, &mut buf), 4);
        assert_eq!(&buf[..4], b"\0abc");
    }

    #[test]
    fn dealloc_zeroes() {
        let store = BlockStore::new(1, 4);
        let id = store.alloc().unwrap();
        store.get(id).write().write_at(0, b"data");
        store.dealloc(id);

        let id = store.alloc().unwrap();
        assert!(store.get(id).read().map(|data| data.iter().all(|&b| b == 0)));
    }

    #[test]
    #[should_panic]
    fn get_unallocated() {
        let store = BlockStore::new(1, 4);
        store.get(0);
    }
}
