//! # memfs
//!
//! 完全驻留于内存的文件系统引擎，只有一层根目录，每个文件至多占用一个数据块。
//! 多个线程可以通过同一个 [`MemFs`] 并发地打开、读写、链接与删除文件。

/* memfs 的整体架构，自上而下 */

// 操作层：对外的文件操作接口与加锁规则
mod fs;
pub use fs::MemFs;

// 打开文件表：句柄、游标与句柄锁
mod open_file;
pub use open_file::{Fd, OpenFlag};

// 根目录：根 inode 数据块上的目录项视图
mod directory;

// inode 表：inode 分配器与每个 inode 的读写锁
mod inode_table;

// 数据块池：数据块分配器与块内数据
mod block_store;

// 内存数据结构层：位图与目录项的布局
mod layout;
pub use layout::NAME_MAX_LEN;

mod collections;
mod path;

pub mod config;
pub use config::FsParams;

pub use enumflags2::BitFlags;
pub use vfs::{DirEntry, Error, InodeKind, Resource, Result, Stat};
