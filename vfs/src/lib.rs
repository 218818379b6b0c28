//! # vfs
//!
//! 文件系统引擎与其使用者之间交换的值类型：错误、元信息与目录项。

mod dirent;
mod error;
mod stat;

pub use self::{
    dirent::{DirEntry, InodeKind},
    error::{Error, Resource, Result},
    stat::Stat,
};
