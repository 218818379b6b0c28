/// 定长槽位数组，槽位数量在创建时确定
#[derive(Debug, Clone)]
pub struct SlotVec<T>(Vec<Option<T>>);

impl<T> SlotVec<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self((0..capacity).map(|_| None).collect())
    }

    /// 插入新元素至编号最小的空槽位，并返回槽位的索引；
    /// 没有空槽位时原样退回元素
    pub fn insert(&mut self, element: T) -> Result<usize, T> {
        let Some(index) = self.0.iter().position(Option::is_none) else {
            return Err(element);
        };
        self.0[index] = Some(element);
        Ok(index)
    }

    /// 插入元素至指定槽位，返回槽位中原有的元素
    ///
    /// # Panics
    ///
    /// 当索引超出容量时panic。
    pub fn insert_at(&mut self, index: usize, element: T) -> Option<T> {
        self.0[index].replace(element)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.0.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.0.get_mut(index)?.as_mut()
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        self.0.get_mut(index)?.take()
    }

    /// 已占用的槽位及其索引
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &T)> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|element| (index, element)))
    }
}
