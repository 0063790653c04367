use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// エントリ種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Regular,
    Directory,
}

/// ファイルメタデータレコード (パスごとに1つ)
///
/// `mode` は種別ビットとパーミッションビットを `libc` の慣例どおりに
/// 保持する。タイムスタンプは秒精度のUNIX時刻。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// 種別ビット | パーミッションビット
    pub mode: u32,

    /// リンクカウント (ディレクトリは2、通常ファイルは1)
    pub nlink: u32,

    /// 所有ユーザーID
    pub uid: u32,

    /// 所有グループID
    pub gid: u32,

    /// ファイルサイズ (バイト、ディレクトリは常に0)
    pub size: u64,

    /// 最終アクセス時刻 (秒)
    pub atime: i64,

    /// 最終更新時刻 (秒)
    pub mtime: i64,

    /// メタデータ変更時刻 (秒)
    pub ctime: i64,
}

impl FileRecord {
    /// 通常ファイルのレコードを作成
    ///
    /// パーミッションは `mode & 0o7777`、所有者はプロセスの実UID/GID、
    /// タイムスタンプはすべて現在時刻。
    pub fn regular(mode: u32) -> Self {
        let now = now_secs();
        Self {
            mode: libc::S_IFREG | (mode & 0o7777),
            nlink: 1,
            uid: process_uid(),
            gid: process_gid(),
            size: 0,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    /// ディレクトリのレコードを作成
    ///
    /// リンクカウントは "." と ".." の分で2。
    pub fn directory(mode: u32) -> Self {
        let now = now_secs();
        Self {
            mode: libc::S_IFDIR | (mode & 0o7777),
            nlink: 2,
            uid: process_uid(),
            gid: process_gid(),
            size: 0,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    /// エントリ種別を取得
    pub fn kind(&self) -> FileKind {
        if self.mode & libc::S_IFMT == libc::S_IFDIR {
            FileKind::Directory
        } else {
            FileKind::Regular
        }
    }

    /// 通常ファイルかどうか
    pub fn is_regular(&self) -> bool {
        self.mode & libc::S_IFMT == libc::S_IFREG
    }

    /// ディレクトリかどうか
    pub fn is_directory(&self) -> bool {
        self.mode & libc::S_IFMT == libc::S_IFDIR
    }

    /// パーミッションビットを取得
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }

    /// パーミッションビットを差し替え (種別ビットは保持)
    pub fn set_permissions(&mut self, mode: u32) {
        self.mode = (self.mode & libc::S_IFMT) | (mode & 0o7777);
    }
}

/// 現在時刻を秒精度のUNIX時刻で取得
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn process_uid() -> u32 {
    // SAFETY: getuid は常に成功する
    unsafe { libc::getuid() }
}

fn process_gid() -> u32 {
    // SAFETY: getgid は常に成功する
    unsafe { libc::getgid() }
}
