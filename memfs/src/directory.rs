//! # 根目录
//!
//! 根 inode 的数据块被视为一串定长的 [`DirEntry`] 槽位。
//! 目录只有一层，路径去掉开头的`/`后整体作为目录项的名字。
//!
//! 目录的修改只发生在元数据锁之下。

use core::ops::{Deref, DerefMut};

use vfs::{Error, Resource, Result};

use crate::block_store::DataBlock;
use crate::layout::DirEntry;

/// 根目录数据块上的目录视图，`B`是该数据块的锁守卫
pub struct Directory<B> {
    block: B,
}

impl<B: Deref<Target = DataBlock>> Directory<B> {
    #[inline]
    pub fn new(block: B) -> Self {
        Self { block }
    }

    /// 根据文件名获取 inode ID
    pub fn find(&self, name: &str) -> Result<u32> {
        self.block.map(|data| {
            slots(data)
                .map(DirEntry::decode)
                .find(|dirent| !dirent.is_free() && dirent.name() == name)
                .map(|dirent| dirent.inode_id())
                .ok_or(Error::NotFound)
        })
    }

    /// 按槽位顺序列出所有目录项
    pub fn entries(&self) -> Vec<DirEntry> {
        self.block.map(|data| {
            slots(data)
                .map(DirEntry::decode)
                .filter(|dirent| !dirent.is_free())
                .collect()
        })
    }
}

impl<B: DerefMut<Target = DataBlock>> Directory<B> {
    /// 在第一个空槽位中加入目录项
    pub fn add(&mut self, name: &str, inode_id: u32) -> Result<()> {
        let dirent = DirEntry::new(name, inode_id)?;
        if self.find(name).is_ok() {
            return Err(Error::AlreadyExists);
        }

        self.block.map_mut(|data| -> Result<()> {
            let slot = slots_mut(data)
                .find(|slot| DirEntry::decode(slot).is_free())
                .ok_or(Error::Exhausted(Resource::DirEntries))?;
            dirent.encode(slot);
            Ok(())
        })?;

        log::debug!("add dir entry {name:?} -> inode {inode_id}");
        Ok(())
    }

    /// 通过名字删除目录项并返回其 inode ID
    pub fn remove(&mut self, name: &str) -> Result<u32> {
        let inode_id = self.block.map_mut(|data| -> Result<u32> {
            let slot = slots_mut(data)
                .find(|slot| {
                    let dirent = DirEntry::decode(slot);
                    !dirent.is_free() && dirent.name() == name
                })
                .ok_or(Error::NotFound)?;
            let inode_id = DirEntry::decode(slot).inode_id();
            slot.fill(0);
            Ok(inode_id)
        })?;

        log::debug!("remove dir entry {name:?} -> inode {inode_id}");
        Ok(inode_id)
    }
}

#[inline]
fn slots(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.chunks_exact(DirEntry::SIZE)
}

#[inline]
fn slots_mut(data: &mut [u8]) -> impl Iterator<Item = &mut [u8]> {
    data.chunks_exact_mut(DirEntry::SIZE)
}
