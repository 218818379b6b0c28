/// 位图按 64 位分组
type BitGroup = u64;

const GROUP_BITS: usize = BitGroup::BITS as usize;

/// 位图，记录其指示区域内各单元(inode 或数据块)的分配情况
#[derive(Debug)]
pub struct Bitmap {
    groups: Vec<BitGroup>,
    /// 位图所指示区域的总单元数
    capacity: usize,
}

impl Bitmap {
    pub fn new(capacity: usize) -> Self {
        Self {
            groups: vec![0; capacity.div_ceil(GROUP_BITS)],
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 已分配的单元数
    pub fn allocated(&self) -> usize {
        self.groups
            .iter()
            .map(|bits| bits.count_ones() as usize)
            .sum()
    }

    /// 分配编号最小的空闲单元，返回其编号。
    /// 若位图的空间用尽，则返回空。
    pub fn alloc(&mut self) -> Option<u32> {
        let (group_index, ingroup_index) =
            self.groups
                .iter()
                .enumerate()
                .find_map(|(group_index, &bits)| {
                    (bits != BitGroup::MAX).then_some((group_index, bits.trailing_ones() as usize))
                })?;

        // 末组中超出容量的位永远不会被置位
        let id = group_index * GROUP_BITS + ingroup_index;
        if id >= self.capacity {
            return None;
        }

        self.groups[group_index] |= 1 << ingroup_index;
        Some(id as u32)
    }

    pub fn dealloc(&mut self, id: u32) {
        let (group_index, ingroup_index) = Self::locate(id);

        // 编号一定得有对应的位
        assert_ne!(
            self.groups[group_index] & (1 << ingroup_index),
            0,
            "double free of unit {id}"
        );

        self.groups[group_index] &= !(1 << ingroup_index);
    }

    pub fn is_allocated(&self, id: u32) -> bool {
        if id as usize >= self.capacity {
            return false;
        }
        let (group_index, ingroup_index) = Self::locate(id);
        self.groups[group_index] & (1 << ingroup_index) != 0
    }

    #[inline]
    fn locate(id: u32) -> (usize, usize) {
        let id = id as usize;
        (id / GROUP_BITS, id % GROUP_BITS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fit() {
        let mut bitmap = Bitmap::new(3);
        assert_eq!(bitmap.alloc(), Some(0));
        assert_eq!(bitmap.alloc(), Some(1));
        assert_eq!(bitmap.alloc(), Some(2));
        assert_eq!(bitmap.alloc(), None);

        bitmap.dealloc(1);
        assert!(!bitmap.is_allocated(1));
        assert_eq!(bitmap.alloc(), Some(1));
        assert_eq!(bitmap.allocated(), 3);
    }

    #[test]
    fn crosses_group_boundary() {
        let mut bitmap = Bitmap::new(GROUP_BITS + 1);
        for id in 0..=GROUP_BITS as u32 {
            assert_eq!(bitmap.alloc(), Some(id));
        }
        assert_eq!(bitmap.alloc(), None);
        assert!(!bitmap.is_allocated(GROUP_BITS as u32 + 1));
    }

    #[test]
    #[should_panic]
    fn double_free() {
        let mut bitmap = Bitmap::new(4);
        let id = bitmap.alloc().unwrap();
        bitmap.dealloc(id);
        bitmap.dealloc(id);
    }
}
