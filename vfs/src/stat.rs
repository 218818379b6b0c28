use crate::InodeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Inode number
    pub inode: u32,
    pub kind: InodeKind,
    /// File size
    pub size: usize,
    /// 硬链接个数
    pub links: u32,
    /// Occupying blocks
    pub blocks: usize,
}
