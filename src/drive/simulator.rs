use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::{self, JoinHandle};

use super::request::{CompletionHandle, DriveError, IoCompletion, IoKind, IoRequest};
use crate::constants::DRIVE_QUEUE_CAPACITY;

/// キューの共有状態 (リクエスト列 + 停止/一時停止フラグ)
struct QueueState {
    items: VecDeque<IoRequest>,
    stop: bool,
    suspended: bool,
}

struct DriveQueue {
    state: Mutex<QueueState>,
    cond: Condvar,
}

/// SSDドライブシミュレータ
///
/// パスをキーとするインメモリのバイト列ストアと、容量制限付きFIFO
/// キュー、専用ワーカースレッドを1つずつ所有する。投入は決して
/// ブロックせず、キュー満杯時は完了ハンドルを即座にbusyで解決する。
/// ワーカーは種別ごとのレイテンシをスリープでシミュレートしてから
/// ストアを操作し、結果を完了ハンドルに報告する。
pub struct DriveSimulator {
    drive_id: usize,
    queue: Arc<DriveQueue>,
    store: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    worker: Option<JoinHandle<()>>,
}

impl DriveSimulator {
    /// ドライブを初期化しワーカーを起動
    pub fn new(drive_id: usize) -> Self {
        tracing::info!("Initializing SSD simulator drive {}", drive_id);

        let queue = Arc::new(DriveQueue {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                stop: false,
                suspended: false,
            }),
            cond: Condvar::new(),
        });
        let store = Arc::new(RwLock::new(HashMap::new()));

        let worker = {
            let queue = Arc::clone(&queue);
            let store = Arc::clone(&store);
            thread::Builder::new()
                .name(format!("flashfs-drive-{}", drive_id))
                .spawn(move || run_worker(drive_id, queue, store))
                .expect("failed to spawn drive worker")
        };

        Self {
            drive_id,
            queue,
            store,
            worker: Some(worker),
        }
    }

    /// ドライブIDを取得
    pub fn drive_id(&self) -> usize {
        self.drive_id
    }

    /// I/O要求を投入し完了ハンドルを返す
    ///
    /// キューが容量上限に達している場合はブロックせず、ハンドルを
    /// 即座にbusyで解決して返す。
    pub fn submit(&self, path: String, kind: IoKind) -> CompletionHandle {
        let (request, handle) = IoRequest::new(path, kind);

        let mut state = self.queue.state.lock().unwrap();
        if state.items.len() >= DRIVE_QUEUE_CAPACITY {
            drop(state);
            tracing::warn!(
                "Drive {} queue is full, rejecting {} for {}",
                self.drive_id,
                request.kind.name(),
                request.path
            );
            request.resolve(Err(DriveError::Busy));
            return handle;
        }

        state.items.push_back(request);
        drop(state);
        self.queue.cond.notify_one();

        handle
    }

    /// キュー内の未処理要求数を取得
    pub fn queue_len(&self) -> usize {
        self.queue.state.lock().unwrap().items.len()
    }

    /// ワーカーの処理を一時停止 (テスト計装)
    ///
    /// 処理中の要求には影響せず、以降のデキューだけが止まる。
    /// キュー飽和を決定的に再現するために使用する。
    pub fn suspend(&self) {
        let mut state = self.queue.state.lock().unwrap();
        state.suspended = true;
    }

    /// 一時停止したワーカーを再開 (テスト計装)
    pub fn resume(&self) {
        let mut state = self.queue.state.lock().unwrap();
        state.suspended = false;
        drop(state);
        self.queue.cond.notify_all();
    }
}

impl Drop for DriveSimulator {
    fn drop(&mut self) {
        {
            let mut state = self.queue.state.lock().unwrap();
            state.stop = true;
            state.suspended = false;
        }
        self.queue.cond.notify_all();

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        tracing::info!("Shut down SSD simulator drive {}", self.drive_id);
    }
}

/// ワーカーループ
///
/// 要求を1件ずつ取り出し、キューのロックを手放してからレイテンシを
/// スリープし、ストアを操作して完了ハンドルを解決する。停止フラグが
/// 立ったら残りの要求をすべて処理し切ってから終了する。
fn run_worker(
    drive_id: usize,
    queue: Arc<DriveQueue>,
    store: Arc<RwLock<HashMap<String, Vec<u8>>>>,
) {
    loop {
        let request = {
            let mut state = queue.state.lock().unwrap();
            loop {
                if state.stop {
                    break;
                }
                if !state.suspended && !state.items.is_empty() {
                    break;
                }
                state = queue.cond.wait(state).unwrap();
            }

            if state.stop && state.items.is_empty() {
                return;
            }
            match state.items.pop_front() {
                Some(request) => request,
                // 停止中で空になった場合のみ到達する
                None => return,
            }
        };

        thread::sleep(request.kind.latency());

        let result = execute(drive_id, &store, &request);
        if let Err(error) = &result {
            tracing::error!(
                "Drive {} {} failed for {}: {}",
                drive_id,
                request.kind.name(),
                request.path,
                error
            );
        }
        request.resolve(result);
    }
}

/// 1件の要求をストアに適用
fn execute(
    drive_id: usize,
    store: &RwLock<HashMap<String, Vec<u8>>>,
    request: &IoRequest,
) -> Result<IoCompletion, DriveError> {
    match &request.kind {
        IoKind::Read { offset, len } => {
            let store = store.read().unwrap();
            let entry = store
                .get(&request.path)
                .ok_or_else(|| DriveError::NotFound(request.path.clone()))?;

            let offset = *offset as usize;
            let available = entry.len().saturating_sub(offset);
            let to_read = available.min(*len);
            let data = if to_read > 0 {
                entry[offset..offset + to_read].to_vec()
            } else {
                Vec::new()
            };

            tracing::info!(
                "Drive {} read {} bytes from {}",
                drive_id,
                data.len(),
                request.path
            );
            Ok(IoCompletion::Data(data))
        }
        IoKind::Write { offset, data } => {
            let mut store = store.write().unwrap();
            let entry = store.entry(request.path.clone()).or_default();

            let offset = *offset as usize;
            let end = offset + data.len();
            if entry.len() < end {
                entry.resize(end, 0);
            }
            entry[offset..end].copy_from_slice(data);

            tracing::info!(
                "Drive {} wrote {} bytes to {}",
                drive_id,
                data.len(),
                request.path
            );
            Ok(IoCompletion::Done(data.len()))
        }
        IoKind::Truncate { len } => {
            let mut store = store.write().unwrap();
            let entry = store
                .get_mut(&request.path)
                .ok_or_else(|| DriveError::NotFound(request.path.clone()))?;

            entry.resize(*len as usize, 0);
            tracing::info!(
                "Drive {} truncated {} to {} bytes",
                drive_id,
                request.path,
                len
            );
            Ok(IoCompletion::Done(0))
        }
        IoKind::Delete => {
            let mut store = store.write().unwrap();
            let removed = store.remove(&request.path).is_some();
            tracing::info!(
                "Drive {} deleted {} (present: {})",
                drive_id,
                request.path,
                removed
            );
            Ok(IoCompletion::Done(0))
        }
        // ストアを変更しない種別はレイテンシ計上のみ
        IoKind::Create
        | IoKind::Mkdir
        | IoKind::Rmdir
        | IoKind::Rename { .. }
        | IoKind::Chmod
        | IoKind::Chown
        | IoKind::Utimens => {
            tracing::info!(
                "Drive {} {} for {}",
                drive_id,
                request.kind.name(),
                request.path
            );
            Ok(IoCompletion::Done(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::OPERATION_TIMEOUT;

    fn wait_done(handle: CompletionHandle) -> usize {
        match handle.wait(OPERATION_TIMEOUT) {
            Ok(IoCompletion::Done(n)) => n,
            other => panic!("unexpected completion: {:?}", other),
        }
    }

    fn wait_data(handle: CompletionHandle) -> Vec<u8> {
        match handle.wait(OPERATION_TIMEOUT) {
            Ok(IoCompletion::Data(data)) => data,
            other => panic!("unexpected completion: {:?}", other),
        }
    }

    #[test]
    fn test_write_then_read() {
        let drive = DriveSimulator::new(0);

        let n = wait_done(drive.submit(
            "/a".to_string(),
            IoKind::Write {
                offset: 0,
                data: b"hello".to_vec(),
            },
        ));
        assert_eq!(n, 5);

        let data = wait_data(drive.submit("/a".to_string(), IoKind::Read { offset: 0, len: 5 }));
        assert_eq!(data, b"hello");
    }

    #[test]
    fn test_read_missing_path() {
        let drive = DriveSimulator::new(0);

        match drive
            .submit("/none".to_string(), IoKind::Read { offset: 0, len: 4 })
            .wait(OPERATION_TIMEOUT)
        {
            Err(DriveError::NotFound(_)) => {}
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[test]
    fn test_read_past_end_returns_empty() {
        let drive = DriveSimulator::new(0);

        wait_done(drive.submit(
            "/a".to_string(),
            IoKind::Write {
                offset: 0,
                data: b"abc".to_vec(),
            },
        ));

        let data = wait_data(drive.submit("/a".to_string(), IoKind::Read { offset: 10, len: 4 }));
        assert!(data.is_empty());
    }

    #[test]
    fn test_write_past_end_zero_fills() {
        let drive = DriveSimulator::new(0);

        wait_done(drive.submit(
            "/a".to_string(),
            IoKind::Write {
                offset: 4,
                data: b"xy".to_vec(),
            },
        ));

        let data = wait_data(drive.submit("/a".to_string(), IoKind::Read { offset: 0, len: 6 }));
        assert_eq!(data, b"\0\0\0\0xy");
    }

    #[test]
    fn test_truncate_shrinks_and_extends() {
        let drive = DriveSimulator::new(0);

        wait_done(drive.submit(
            "/a".to_string(),
            IoKind::Write {
                offset: 0,
                data: b"abcdef".to_vec(),
            },
        ));
        wait_done(drive.submit("/a".to_string(), IoKind::Truncate { len: 3 }));

        let data = wait_data(drive.submit("/a".to_string(), IoKind::Read { offset: 0, len: 6 }));
        assert_eq!(data, b"abc");

        wait_done(drive.submit("/a".to_string(), IoKind::Truncate { len: 5 }));
        let data = wait_data(drive.submit("/a".to_string(), IoKind::Read { offset: 0, len: 6 }));
        assert_eq!(data, b"abc\0\0");
    }

    #[test]
    fn test_truncate_missing_path() {
        let drive = DriveSimulator::new(0);

        match drive
            .submit("/none".to_string(), IoKind::Truncate { len: 8 })
            .wait(OPERATION_TIMEOUT)
        {
            Err(DriveError::NotFound(_)) => {}
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_is_idempotent() {
        let drive = DriveSimulator::new(0);

        wait_done(drive.submit(
            "/a".to_string(),
            IoKind::Write {
                offset: 0,
                data: b"abc".to_vec(),
            },
        ));

        assert_eq!(wait_done(drive.submit("/a".to_string(), IoKind::Delete)), 0);
        // 既に存在しなくても成功する
        assert_eq!(wait_done(drive.submit("/a".to_string(), IoKind::Delete)), 0);

        match drive
            .submit("/a".to_string(), IoKind::Read { offset: 0, len: 3 })
            .wait(OPERATION_TIMEOUT)
        {
            Err(DriveError::NotFound(_)) => {}
            other => panic!("expected not found after delete, got {:?}", other),
        }
    }

    #[test]
    fn test_noop_kinds_resolve_zero() {
        let drive = DriveSimulator::new(0);

        assert_eq!(wait_done(drive.submit("/a".to_string(), IoKind::Create)), 0);
        assert_eq!(wait_done(drive.submit("/d".to_string(), IoKind::Mkdir)), 0);
        assert_eq!(wait_done(drive.submit("/d".to_string(), IoKind::Rmdir)), 0);
        assert_eq!(wait_done(drive.submit("/a".to_string(), IoKind::Chmod)), 0);
        assert_eq!(wait_done(drive.submit("/a".to_string(), IoKind::Chown)), 0);
        assert_eq!(wait_done(drive.submit("/a".to_string(), IoKind::Utimens)), 0);
        assert_eq!(
            wait_done(drive.submit(
                "/a".to_string(),
                IoKind::Rename {
                    new_path: "/b".to_string()
                }
            )),
            0
        );
    }

    #[test]
    fn test_fifo_ordering() {
        let drive = DriveSimulator::new(0);

        // 同一領域への書き込みを順に投入し、最後の値が残ることを確認
        let mut handles = Vec::new();
        for i in 0..5u8 {
            handles.push(drive.submit(
                "/a".to_string(),
                IoKind::Write {
                    offset: 0,
                    data: vec![i],
                },
            ));
        }
        for handle in handles {
            wait_done(handle);
        }

        let data = wait_data(drive.submit("/a".to_string(), IoKind::Read { offset: 0, len: 1 }));
        assert_eq!(data, vec![4]);
    }

    #[test]
    fn test_queue_saturation_rejects_with_busy() {
        let drive = DriveSimulator::new(0);
        drive.suspend();

        let mut handles = Vec::new();
        for i in 0..DRIVE_QUEUE_CAPACITY {
            handles.push(drive.submit(
                "/sat".to_string(),
                IoKind::Write {
                    offset: 0,
                    data: vec![(i % 256) as u8],
                },
            ));
        }
        assert_eq!(drive.queue_len(), DRIVE_QUEUE_CAPACITY);

        // 1001件目はブロックせずbusyで即座に解決される
        let overflow = drive.submit(
            "/sat".to_string(),
            IoKind::Write {
                offset: 0,
                data: vec![0],
            },
        );
        match overflow.wait(std::time::Duration::from_millis(100)) {
            Err(DriveError::Busy) => {}
            other => panic!("expected busy, got {:?}", other),
        }

        drive.resume();
        for handle in handles {
            wait_done(handle);
        }
    }

    #[test]
    fn test_drop_drains_pending_requests() {
        let drive = DriveSimulator::new(0);

        let handle = drive.submit(
            "/a".to_string(),
            IoKind::Write {
                offset: 0,
                data: b"z".to_vec(),
            },
        );
        drop(drive);

        // 停止時も残った要求は処理され、ハンドルは解決される
        assert!(matches!(
            handle.wait(OPERATION_TIMEOUT),
            Ok(IoCompletion::Done(1))
        ));
    }
}
