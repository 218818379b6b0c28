//! # 操作层
//!
//! 对外提供文件的打开、读写、链接与删除等操作，并规定加锁顺序：
//!
//! 1. 句柄锁：以句柄为参数的操作最先获取；
//! 2. 元数据锁：保护 inode 表、链接计数与根目录，绝不在拷贝文件数据时持有，
//!    也不在等待普通文件的读写锁时持有；
//! 3. 打开文件表的锁；
//! 4. inode 的读写锁：读取时共享，写入与截断时独占；
//! 5. 数据块位图与块自身的锁。
//!
//! 资源耗尽时操作立即失败，不会等待其它线程释放资源。

use std::fs::File;
use std::io::{self, Read};
use std::sync::Arc;

use enumflags2::BitFlags;
use spin::{Mutex, RwLockReadGuard, RwLockWriteGuard};
use vfs::{DirEntry, Error, InodeKind, Result, Stat};

use crate::block_store::{BlockStore, DataBlock};
use crate::config::{COPY_CHUNK_SIZE, FsParams, MAX_SYMLINK_DEPTH, ROOT_INUM};
use crate::directory::Directory;
use crate::inode_table::{Inode, InodeTable};
use crate::open_file::{Fd, OpenFileTable, OpenFlag};
use crate::path::Path;

/// 文件系统引擎，由 [`MemFs::new`] 构建，由 [`MemFs::destroy`] 拆除。
///
/// 所有操作都只需要`&self`，多线程共享时用 [`Arc`] 包装即可。
#[derive(Debug)]
pub struct MemFs {
    params: FsParams,
    /// 元数据锁
    meta: Mutex<Meta>,
    blocks: BlockStore,
    open_files: Mutex<OpenFileTable>,
}

/// 受元数据锁保护的部分
#[derive(Debug)]
struct Meta {
    inodes: InodeTable,
    /// 根目录的数据块
    root_block: u32,
}

impl MemFs {
    /// 按给定容量建立文件系统，根目录占用 0 号 inode
    pub fn new(params: FsParams) -> Result<Self> {
        if !params.is_valid() {
            return Err(Error::InvalidParams);
        }

        let blocks = BlockStore::new(params.max_block_count, params.block_size);
        let mut inodes = InodeTable::new(params.max_inode_count);

        let root = inodes.alloc(InodeKind::Directory)?;
        assert_eq!(root, ROOT_INUM, "root directory must be inode {ROOT_INUM}");
        let root_block = blocks.alloc()?;
        {
            let root = inodes.get(root).expect("root inode was just allocated");
            let mut content = root.content().write();
            content.data_block = Some(root_block);
            content.size = params.block_size;
        }

        log::info!("memfs initialized with {params:?}");
        Ok(Self {
            params,
            meta: Mutex::new(Meta { inodes, root_block }),
            blocks,
            open_files: Mutex::new(OpenFileTable::new(params.max_open_files)),
        })
    }

    /// 释放全部存储；仍未关闭的句柄随之失效
    pub fn destroy(self) -> Result<()> {
        let open = self.open_files.lock().len();
        if open > 0 {
            log::warn!("memfs destroyed with {open} open file(s)");
        }
        log::info!(
            "memfs destroyed, {} inode(s) and {} data block(s) released",
            self.meta.lock().inodes.len(),
            self.params.max_block_count - self.blocks.free_blocks()
        );
        Ok(())
    }

    #[inline]
    pub fn params(&self) -> &FsParams {
        &self.params
    }

    pub fn open(&self, path: &str, flags: BitFlags<OpenFlag>) -> Result<Fd> {
        let mut path = path.to_owned();
        let mut meta = self.meta.lock();

        // 逐层解析符号链接，层数有上限
        for _ in 0..=MAX_SYMLINK_DEPTH {
            let name = path.root_relative().ok_or(Error::InvalidPath)?;
            let inode = match meta.find(name, &self.blocks) {
                Ok(inode) => inode,
                Err(Error::NotFound) if flags.contains(OpenFlag::CREATE) => {
                    meta.create(name, InodeKind::File, &self.blocks)?
                }
                Err(err) => return Err(err),
            };

            match inode.kind() {
                InodeKind::SymLink => {
                    let target = inode.content().read().to_vec(&self.blocks);
                    let target = String::from_utf8(target).expect("symlink target is not UTF-8");
                    log::debug!("follow symlink /{name} -> {target}");
                    path = target;
                    continue;
                }
                InodeKind::File => {}
                InodeKind::Directory => unreachable!("the root directory has no entry"),
            }

            // 在元数据锁释放之前登记句柄，`unlink`才不会错过正在打开的文件
            let (fd, file) = {
                let mut open_files = self.open_files.lock();
                let fd = open_files.acquire(inode, 0)?;
                (fd, open_files.get(fd)?)
            };
            drop(meta);

            // 截断与定位只涉及这个 inode，不再占用元数据锁
            file.apply_flags(flags, &self.blocks);
            log::debug!("open {path:?} as {fd:?} at offset {}", file.offset());
            return Ok(fd);
        }

        log::warn!("too many levels of symbolic links while opening {path:?}");
        Err(Error::SymlinkLoop)
    }

    /// 从句柄的偏移量处读取，位于文件末尾时返回0
    pub fn read(&self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        let file = self.open_files.lock().get(fd)?;
        Ok(file.read(buf, &self.blocks))
    }

    /// 从句柄的偏移量处写入，写入量以一个数据块的容量为限
    pub fn write(&self, fd: Fd, buf: &[u8]) -> Result<usize> {
        let file = self.open_files.lock().get(fd)?;
        file.write(buf, &self.blocks)
    }

    pub fn close(&self, fd: Fd) -> Result<()> {
        let file = self.open_files.lock().release(fd)?;
        log::debug!("close {fd:?} at offset {}", file.offset());
        Ok(())
    }

    /// 为`target`所指的文件建立新的硬链接`link_name`
    pub fn link(&self, target: &str, link_name: &str) -> Result<()> {
        let target_name = target.root_relative().ok_or(Error::InvalidPath)?;
        let link_name = link_name.root_relative().ok_or(Error::InvalidPath)?;

        let mut meta = self.meta.lock();
        let inode = meta.find(target_name, &self.blocks)?;
        if inode.kind() == InodeKind::SymLink {
            return Err(Error::LinkToSymlink);
        }

        meta.dir_mut(&self.blocks).add(link_name, inode.id())?;
        meta.inodes.link(inode.id());
        log::debug!(
            "link /{link_name} -> inode {} ({:?} links)",
            inode.id(),
            meta.inodes.links(inode.id())
        );
        Ok(())
    }

    /// 建立指向`target`的符号链接`link_name`，`target`可以尚不存在
    pub fn symlink(&self, target: &str, link_name: &str) -> Result<()> {
        if target == link_name {
            return Err(Error::SelfLink);
        }
        target.root_relative().ok_or(Error::InvalidPath)?;
        let name = link_name.root_relative().ok_or(Error::InvalidPath)?;
        if target.len() > self.blocks.block_size() {
            return Err(Error::Truncated);
        }

        let mut meta = self.meta.lock();
        let inode = meta.create(name, InodeKind::SymLink, &self.blocks)?;
        let stored = inode
            .content()
            .write()
            .write_at(0, target.as_bytes(), &self.blocks);
        if let Err(err) = stored {
            meta.dir_mut(&self.blocks).remove(name)?;
            meta.inodes.dealloc(inode.id(), &self.blocks);
            return Err(err);
        }

        log::debug!("symlink {link_name:?} -> {target:?}");
        Ok(())
    }

    /// 删除目录项；最后一个硬链接被删除时回收 inode
    pub fn unlink(&self, path: &str) -> Result<()> {
        if path.is_absolute() && path.root_relative().is_none() {
            return Err(Error::RootUnlink);
        }
        let name = path.root_relative().ok_or(Error::InvalidPath)?;

        let mut meta = self.meta.lock();
        let inode = meta.find(name, &self.blocks)?;
        let id = inode.id();
        if id == ROOT_INUM {
            return Err(Error::RootUnlink);
        }

        match inode.kind() {
            InodeKind::SymLink => {
                meta.dir_mut(&self.blocks).remove(name)?;
                meta.inodes.dealloc(id, &self.blocks);
            }
            InodeKind::File => {
                if self.open_files.lock().is_open(id) {
                    log::warn!("refuse to unlink {path:?}: inode {id} is open");
                    return Err(Error::Busy);
                }
                meta.dir_mut(&self.blocks).remove(name)?;
                if meta.inodes.unlink(id) == 0 {
                    meta.inodes.dealloc(id, &self.blocks);
                }
            }
            InodeKind::Directory => return Err(Error::RootUnlink),
        }

        Ok(())
    }

    /// 把外部文件系统中的文件导入为`dest`
    pub fn copy_in(&self, source: impl AsRef<std::path::Path>, dest: &str) -> Result<()> {
        let source = File::open(source)?;
        self.copy_from_reader(source, dest)
    }

    /// 把`reader`的全部内容导入为`dest`。
    ///
    /// 内容超出一个数据块时失败，此时`dest`被清空，不会留下导入了一半的文件。
    pub fn copy_from_reader(&self, mut reader: impl Read, dest: &str) -> Result<()> {
        let fd = self.open(dest, OpenFlag::CREATE | OpenFlag::TRUNC)?;
        let copied = self.copy_chunks(&mut reader, fd);

        if copied.is_err() {
            let file = self.open_files.lock().get(fd)?;
            file.inode().content().write().clear(&self.blocks);
        }
        self.close(fd)?;

        let copied = copied?;
        log::debug!("copied {copied} bytes into {dest:?}");
        Ok(())
    }

    /// 根目录下某一项的元信息，不跟随符号链接
    pub fn stat(&self, path: &str) -> Result<Stat> {
        let name = path.root_relative().ok_or(Error::InvalidPath)?;
        let (inode, links) = {
            let meta = self.meta.lock();
            let inode = meta.find(name, &self.blocks)?;
            let links = meta.links(inode.id());
            (inode, links)
        };
        Ok(inode.stat(links))
    }

    pub fn fstat(&self, fd: Fd) -> Result<Stat> {
        let file = self.open_files.lock().get(fd)?;
        let links = self.meta.lock().links(file.inode().id());
        Ok(file.inode().stat(links))
    }

    /// 按槽位顺序列出根目录
    pub fn read_dir(&self) -> Vec<DirEntry> {
        let meta = self.meta.lock();
        let dirents = meta.dir(&self.blocks).entries();
        dirents
            .into_iter()
            .map(|dirent| DirEntry {
                inode: dirent.inode_id(),
                kind: meta.inode(dirent.inode_id()).kind(),
                name: dirent.name().to_owned(),
            })
            .collect()
    }

    /// 读出符号链接中保存的目标路径
    pub fn read_link(&self, path: &str) -> Result<String> {
        let name = path.root_relative().ok_or(Error::InvalidPath)?;
        let inode = self.meta.lock().find(name, &self.blocks)?;
        if inode.kind() != InodeKind::SymLink {
            return Err(Error::NotSymlink);
        }

        let target = inode.content().read().to_vec(&self.blocks);
        Ok(String::from_utf8(target).expect("symlink target is not UTF-8"))
    }
}

impl MemFs {
    fn copy_chunks(&self, reader: &mut impl Read, fd: Fd) -> Result<usize> {
        let mut buffer = [0u8; COPY_CHUNK_SIZE];
        let mut total = 0;

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };

            let written = self.write(fd, &buffer[..read])?;
            total += written;
            if written != read {
                log::warn!(
                    "import into {fd:?} exceeds the block size of {} bytes",
                    self.blocks.block_size()
                );
                return Err(Error::Truncated);
            }
        }

        Ok(total)
    }
}

impl Meta {
    fn dir<'a>(&self, blocks: &'a BlockStore) -> Directory<RwLockReadGuard<'a, DataBlock>> {
        Directory::new(blocks.get(self.root_block).read())
    }

    fn dir_mut<'a>(&self, blocks: &'a BlockStore) -> Directory<RwLockWriteGuard<'a, DataBlock>> {
        Directory::new(blocks.get(self.root_block).write())
    }

    /// 凭借ID获取 inode，目录项所指的 inode 必须存在
    fn inode(&self, id: u32) -> Arc<Inode> {
        self.inodes
            .get(id)
            .unwrap_or_else(|| panic!("directory entry refers to free inode {id}"))
    }

    fn find(&self, name: &str, blocks: &BlockStore) -> Result<Arc<Inode>> {
        let id = self.dir(blocks).find(name)?;
        Ok(self.inode(id))
    }

    /// 分配 inode 并登记到根目录；登记失败时撤销分配
    fn create(&mut self, name: &str, kind: InodeKind, blocks: &BlockStore) -> Result<Arc<Inode>> {
        let id = self.inodes.alloc(kind)?;
        let added = self.dir_mut(blocks).add(name, id);
        if let Err(err) = added {
            self.inodes.dealloc(id, blocks);
            return Err(err);
        }
        Ok(self.inode(id))
    }

    fn links(&self, id: u32) -> u32 {
        self.inodes
            .links(id)
            .unwrap_or_else(|| panic!("inode {id} was freed while in use"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn inode_of(fs: &MemFs, name: &str) -> Arc<Inode> {
        fs.meta.lock().find(name, &fs.blocks).unwrap()
    }

    #[test]
    fn open_does_not_wait_for_busy_inode() {
        let fs = MemFs::new(FsParams::default()).unwrap();
        let fd = fs.open("/a", OpenFlag::CREATE.into()).unwrap();
        fs.write(fd, b"busy").unwrap();
        fs.close(fd).unwrap();
        let inode = inode_of(&fs, "a");

        thread::scope(|s| {
            // 模拟另一个线程正在写 `/a`
            let writing = inode.content().write();
            let (tx, rx) = mpsc::channel();
            let fs = &fs;
            s.spawn(move || {
                let a = fs.open("/a", BitFlags::empty()).unwrap();
                let b = fs.open("/b", OpenFlag::CREATE.into()).unwrap();
                let linked = fs.link("/b", "/c");
                tx.send((a, b, linked)).unwrap();
            });

            let opened = rx.recv_timeout(Duration::from_secs(5));
            drop(writing);
            let (a, b, linked) = opened.expect("metadata lock held while waiting for /a");
            assert_eq!(linked, Ok(()));
            assert_eq!(fs.stat("/a").unwrap().size, 4);
            fs.close(a).unwrap();
            fs.close(b).unwrap();
        });
    }

    #[test]
    fn stat_does_not_hold_metadata_lock_on_busy_inode() {
        let fs = MemFs::new(FsParams::default()).unwrap();
        let fd = fs.open("/a", OpenFlag::CREATE.into()).unwrap();
        fs.close(fd).unwrap();
        let inode = inode_of(&fs, "a");

        thread::scope(|s| {
            let writing = inode.content().write();
            let (tx, rx) = mpsc::channel();
            let fs = &fs;
            // `stat` 需要等待，但不能拖住其它文件的创建
            let stat = s.spawn(move || fs.stat("/a"));
            thread::sleep(Duration::from_millis(50));
            s.spawn(move || tx.send(fs.open("/b", OpenFlag::CREATE.into())).unwrap());

            let opened = rx.recv_timeout(Duration::from_secs(5));
            drop(writing);
            assert!(opened.is_ok_and(|fd| fd.is_ok()));
            assert_eq!(stat.join().unwrap().map(|stat| stat.links), Ok(1));
        });
    }

    #[test]
    fn truncate_and_append_on_open() {
        let fs = MemFs::new(FsParams::default()).unwrap();
        let fd = fs.open("/a", OpenFlag::CREATE.into()).unwrap();
        fs.write(fd, b"data").unwrap();
        fs.close(fd).unwrap();

        let fd = fs.open("/a", OpenFlag::TRUNC | OpenFlag::APPEND).unwrap();
        assert_eq!(fs.fstat(fd).unwrap().size, 0);
        assert_eq!(fs.write(fd, b"x"), Ok(1));
        fs.close(fd).unwrap();
        assert_eq!(fs.stat("/a").unwrap().size, 1);
    }
}
