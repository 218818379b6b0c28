use std::io;

use derive_more::Display;

pub type Result<T> = core::result::Result<T, Error>;

/// 文件系统操作的全部失败原因，均可由调用者恢复
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 路径为空、过长或不以`/`开头
    #[display(fmt = "invalid path")]
    InvalidPath,
    #[display(fmt = "no such file")]
    NotFound,
    /// 目录中已有同名项
    #[display(fmt = "file exists")]
    AlreadyExists,
    /// 固定容量的表已用尽
    #[display(fmt = "{} exhausted", _0)]
    Exhausted(Resource),
    #[display(fmt = "cannot hard link a symbolic link")]
    LinkToSymlink,
    #[display(fmt = "symbolic link cannot point to itself")]
    SelfLink,
    #[display(fmt = "cannot unlink the root directory")]
    RootUnlink,
    /// 仍有打开的句柄指向该文件
    #[display(fmt = "file is open")]
    Busy,
    #[display(fmt = "bad file handle")]
    BadHandle,
    #[display(fmt = "not a symbolic link")]
    NotSymlink,
    /// 符号链接解析层数超出上限
    #[display(fmt = "too many levels of symbolic links")]
    SymlinkLoop,
    /// 数据超出单个数据块的容量
    #[display(fmt = "data truncated to block capacity")]
    Truncated,
    #[display(fmt = "invalid filesystem parameters")]
    InvalidParams,
    /// 外部文件系统的 I/O 错误
    #[display(fmt = "external I/O error: {:?}", _0)]
    Io(io::ErrorKind),
}

/// 可能被耗尽的资源
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    #[display(fmt = "inode table")]
    Inodes,
    #[display(fmt = "data block pool")]
    Blocks,
    #[display(fmt = "open file table")]
    OpenFiles,
    #[display(fmt = "directory")]
    DirEntries,
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            kind => Self::Io(kind),
        }
    }
}
