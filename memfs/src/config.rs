//! Constants and capacity parameters used in memfs

/// 根目录的 inode 编号
pub const ROOT_INUM: u32 = 0;

/// 打开文件时最多跟随的符号链接层数
pub const MAX_SYMLINK_DEPTH: usize = 8;

/// 从外部文件系统导入时每次搬运的字节数
pub const COPY_CHUNK_SIZE: usize = 200;

/// 文件系统的容量参数，在 [`MemFs::new`](crate::MemFs::new) 时固定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsParams {
    pub max_inode_count: usize,
    pub max_block_count: usize,
    pub max_open_files: usize,
    /// 数据块大小(字节)，也是单个文件的容量上限
    pub block_size: usize,
}

impl Default for FsParams {
    fn default() -> Self {
        Self {
            max_inode_count: 64,
            max_block_count: 1024,
            max_open_files: 16,
            block_size: 1024,
        }
    }
}

impl FsParams {
    /// 根目录要占用一个 inode 与一个数据块，数据块还要至少容纳一个目录项
    pub fn is_valid(&self) -> bool {
        self.max_inode_count >= 1
            && self.max_block_count >= 1
            && self.max_open_files >= 1
            && self.block_size >= crate::layout::DirEntry::SIZE
            && u32::try_from(self.max_inode_count).is_ok()
            && u32::try_from(self.max_block_count).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params() {
        let params = FsParams::default();
        assert!(params.is_valid());
        assert_eq!(params.block_size, 1024);
    }

    #[test]
    fn block_must_hold_a_dir_entry() {
        let params = FsParams {
            block_size: crate::layout::DirEntry::SIZE - 1,
            ..Default::default()
        };
        assert!(!params.is_valid());

        let params = FsParams {
            max_open_files: 0,
            ..Default::default()
        };
        assert!(!params.is_valid());
    }
}
