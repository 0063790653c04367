use crate::drive::DriveError;

/// アクセラレータ公開面のエラー
///
/// カーネルブリッジは `errno()` で負のPOSIXコードに変換する。
#[derive(Debug, Clone, thiserror::Error)]
pub enum AccelError {
    #[error("path not found: {0}")]
    NotFound(String),

    #[error("path already exists: {0}")]
    Exists(String),

    #[error("is a directory: {0}")]
    IsDirectory(String),

    #[error("not a directory: {0}")]
    NotDirectory(String),

    #[error("directory not empty: {0}")]
    NotEmpty(String),

    #[error("drive is busy")]
    Busy,

    #[error("operation timed out")]
    TimedOut,

    #[error("I/O error: {0}")]
    Io(String),
}

pub type AccelResult<T> = Result<T, AccelError>;

impl AccelError {
    /// 対応するerrno値 (正の値、ブリッジ側で符号反転して使う)
    pub fn errno(&self) -> i32 {
        match self {
            AccelError::NotFound(_) => libc::ENOENT,
            AccelError::Exists(_) => libc::EEXIST,
            AccelError::IsDirectory(_) => libc::EISDIR,
            AccelError::NotDirectory(_) => libc::ENOTDIR,
            AccelError::NotEmpty(_) => libc::ENOTEMPTY,
            AccelError::Busy => libc::EBUSY,
            AccelError::TimedOut => libc::ETIMEDOUT,
            AccelError::Io(_) => libc::EIO,
        }
    }
}

impl From<DriveError> for AccelError {
    fn from(error: DriveError) -> Self {
        match error {
            DriveError::NotFound(path) => AccelError::NotFound(path),
            DriveError::Busy => AccelError::Busy,
            DriveError::TimedOut => AccelError::TimedOut,
            DriveError::Io(message) => AccelError::Io(message),
        }
    }
}
