//! # 内存数据结构层
//!
//! memfs 的存储布局：
//! inode 位图 | inode 表 | 数据块位图 | 数据块池
//!
//! 根目录的数据块被解释为一串定长的 [`DirEntry`] 槽位。

mod bitmap;
pub use bitmap::Bitmap;

/// 目录项，存放于根目录的数据块中
mod dir_entry;
pub use dir_entry::{DirEntry, NAME_MAX_LEN};
