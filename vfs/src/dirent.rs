/// 根目录中一项的快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Inode number
    pub inode: u32,
    pub kind: InodeKind,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum InodeKind {
    #[default]
    File,
    Directory,
    SymLink,
}
