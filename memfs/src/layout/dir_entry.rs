use vfs::{Error, Result};

/// 文件名的最大字节数
pub const NAME_MAX_LEN: usize = 43;

/// 文件系统项的元信息
#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct DirEntry {
    // 最后一字节留给 \0
    name: [u8; NAME_MAX_LEN + 1],
    inode_id: u32,
}

impl DirEntry {
    /// 元信息大小恒为48字节
    pub const SIZE: usize = 48;

    pub fn new(name: &str, inode_id: u32) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > NAME_MAX_LEN || bytes.contains(&0) {
            return Err(Error::InvalidPath);
        }

        let mut name = [0; NAME_MAX_LEN + 1];
        name[..bytes.len()].copy_from_slice(bytes);

        Ok(Self { name, inode_id })
    }

    /// 从目录数据块中的一个槽位解码
    pub fn decode(slot: &[u8]) -> Self {
        assert_eq!(slot.len(), Self::SIZE);
        let (name_bytes, id_bytes) = slot.split_at(NAME_MAX_LEN + 1);

        let mut name = [0; NAME_MAX_LEN + 1];
        name.copy_from_slice(name_bytes);
        let mut id = [0; 4];
        id.copy_from_slice(id_bytes);

        Self {
            name,
            inode_id: u32::from_le_bytes(id),
        }
    }

    /// 编码写入目录数据块中的一个槽位
    pub fn encode(&self, slot: &mut [u8]) {
        assert_eq!(slot.len(), Self::SIZE);
        let (name, id) = slot.split_at_mut(NAME_MAX_LEN + 1);
        name.copy_from_slice(&self.name);
        id.copy_from_slice(&self.inode_id.to_le_bytes());
    }

    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&c| c == 0).unwrap_or(NAME_MAX_LEN);
        // 名字只会由 `&str` 写入
        core::str::from_utf8(&self.name[..len]).unwrap_or_default()
    }

    /// 名字为空的槽位是空闲的
    #[inline]
    pub fn is_free(&self) -> bool {
        self.name[0] == 0
    }

    #[inline]
    pub fn inode_id(&self) -> u32 {
        self.inode_id
    }
}
