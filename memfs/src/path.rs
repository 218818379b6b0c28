pub trait Path {
    fn is_absolute(&self) -> bool;

    /// 返回根目录下的名字：去掉开头的一个`/`，其余部分整体作为名字。
    /// 若不是绝对路径，或者就是根目录本身，则返回`None`。
    fn root_relative(&self) -> Option<&Self>;
}

impl Path for str {
    fn is_absolute(&self) -> bool {
        self.starts_with('/')
    }

    fn root_relative(&self) -> Option<&Self> {
        self.strip_prefix('/').filter(|name| !name.is_empty())
    }
}
