use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

use crate::constants::{
    LATENCY_METADATA, LATENCY_READ, LATENCY_RENAME, LATENCY_TRUNCATE, LATENCY_WRITE,
};

/// ドライブレイヤのエラー
#[derive(Debug, Clone, thiserror::Error)]
pub enum DriveError {
    #[error("path not found on drive: {0}")]
    NotFound(String),

    #[error("drive queue is full")]
    Busy,

    #[error("operation timed out")]
    TimedOut,

    #[error("drive I/O error: {0}")]
    Io(String),
}

/// I/O要求の種別とペイロード
///
/// READ/WRITE/TRUNCATE/DELETE はストアを変更する。それ以外は
/// レイテンシ計上のためだけにパイプラインを通過するノーオペレーション。
#[derive(Debug)]
pub enum IoKind {
    Create,
    Read { offset: u64, len: usize },
    Write { offset: u64, data: Vec<u8> },
    Truncate { len: u64 },
    Delete,
    Mkdir,
    Rmdir,
    Rename { new_path: String },
    Chmod,
    Chown,
    Utimens,
}

impl IoKind {
    /// 種別ごとのシミュレートレイテンシ
    pub fn latency(&self) -> Duration {
        match self {
            IoKind::Create
            | IoKind::Delete
            | IoKind::Mkdir
            | IoKind::Rmdir
            | IoKind::Chmod
            | IoKind::Chown
            | IoKind::Utimens => LATENCY_METADATA,
            IoKind::Read { .. } => LATENCY_READ,
            IoKind::Write { .. } => LATENCY_WRITE,
            IoKind::Truncate { .. } => LATENCY_TRUNCATE,
            IoKind::Rename { .. } => LATENCY_RENAME,
        }
    }

    /// ログ用の種別名
    pub fn name(&self) -> &'static str {
        match self {
            IoKind::Create => "CREATE",
            IoKind::Read { .. } => "READ",
            IoKind::Write { .. } => "WRITE",
            IoKind::Truncate { .. } => "TRUNCATE",
            IoKind::Delete => "DELETE",
            IoKind::Mkdir => "MKDIR",
            IoKind::Rmdir => "RMDIR",
            IoKind::Rename { .. } => "RENAME",
            IoKind::Chmod => "CHMOD",
            IoKind::Chown => "CHOWN",
            IoKind::Utimens => "UTIMENS",
        }
    }
}

/// ワーカーが要求ごとに1回だけ解決する完了値
#[derive(Debug)]
pub enum IoCompletion {
    /// 処理済みバイト数 (WRITEは書き込みサイズ、その他は0)
    Done(usize),

    /// READが返すデータ (要求より短いことがある)
    Data(Vec<u8>),
}

/// ドライブへの1件のI/O要求
///
/// 完了チャネルの送信側を抱えており、ワーカー (またはキュー満杯時の
/// 投入側) がちょうど1回だけ解決する。WRITEのバッファは要求自身が
/// 所有するため、呼び出し側のバッファ寿命に依存しない。
pub struct IoRequest {
    pub path: String,
    pub kind: IoKind,
    done: SyncSender<Result<IoCompletion, DriveError>>,
}

/// 完了ハンドル
///
/// 単一生産者・単一消費者の一回限りの結果チャネル。投入側はこれで
/// タイムアウト付きの完了待ちを行う。
pub struct CompletionHandle {
    result: Receiver<Result<IoCompletion, DriveError>>,
}

impl IoRequest {
    /// 要求と対応する完了ハンドルのペアを作成
    pub fn new(path: String, kind: IoKind) -> (Self, CompletionHandle) {
        let (done, result) = mpsc::sync_channel(1);
        (Self { path, kind, done }, CompletionHandle { result })
    }

    /// 要求を成功またはエラーで解決
    ///
    /// 受信側がタイムアウトで去った後でも送信自体は失敗しない
    /// (バッファ1のチャネルに書き捨てられる)。
    pub fn resolve(self, result: Result<IoCompletion, DriveError>) {
        let _ = self.done.send(result);
    }
}

impl CompletionHandle {
    /// 完了をタイムアウト付きで待つ
    ///
    /// タイムアウトした場合、処理中の要求はキューから取り除かれず、
    /// 後で誰も聞いていないハンドルに対して解決されることがある。
    pub fn wait(self, timeout: Duration) -> Result<IoCompletion, DriveError> {
        match self.result.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(DriveError::TimedOut),
            Err(RecvTimeoutError::Disconnected) => {
                Err(DriveError::Io("completion channel closed".to_string()))
            }
        }
    }
}
