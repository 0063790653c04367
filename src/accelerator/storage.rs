use std::time::Instant;

use super::balancer::{DriveLoadSnapshot, LoadBalancer};
use super::error::{AccelError, AccelResult};
use crate::constants::{BLOCK_SIZE, OPERATION_TIMEOUT};
use crate::drive::{DriveError, DriveSimulator, IoCompletion, IoKind};
use crate::metadata::types::now_secs;
use crate::metadata::{FileRecord, MetadataCatalog};
use crate::placement::{BlockLocations, DrivePlacer};

/// ストレージアクセラレータ
///
/// 公開ファイルシステム動詞の実装本体。配置器・ロードバランサ・
/// メタデータカタログ・ドライブ群を合成する。カタログのみの操作は
/// ロックを本体全体で保持し、データ操作はロックを手放してから
/// ドライブI/Oを発行する (完了待ち中にカタログロックを握らない)。
///
/// ブロックの初回書き込みだけがロードバランサの実効ドライブ選択を
/// 受け、結果は配置テーブルに記録される。以後の同一ブロックへの
/// 読み書きは記録されたドライブに固定され、リダイレクトされた
/// データが迷子にならない。
pub struct StorageAccelerator {
    placer: DrivePlacer,
    balancer: LoadBalancer,
    catalog: MetadataCatalog,
    locations: BlockLocations,
    drives: Vec<DriveSimulator>,
}

impl StorageAccelerator {
    /// 指定したドライブ数とハッシュシードでアクセラレータを構築
    pub fn new(num_drives: usize, hash_seed: &str) -> Self {
        tracing::info!(
            "Initializing storage accelerator with {} drives",
            num_drives
        );

        let drives = (0..num_drives).map(DriveSimulator::new).collect();

        Self {
            placer: DrivePlacer::new(hash_seed, num_drives),
            balancer: LoadBalancer::new(num_drives),
            catalog: MetadataCatalog::new(),
            locations: BlockLocations::new(),
            drives,
        }
    }

    /// コンパイル時定数の構成でアクセラレータを構築
    pub fn with_defaults() -> Self {
        Self::new(crate::constants::NUM_DRIVES, crate::constants::HASH_SEED)
    }

    /// ドライブ数を取得
    pub fn drive_count(&self) -> usize {
        self.drives.len()
    }

    /// パス全体キーのプライマリドライブを取得
    pub fn place_path(&self, path: &str) -> usize {
        self.placer.place(path)
    }

    /// 全ドライブの負荷スナップショットを取得
    pub fn drive_load(&self) -> Vec<DriveLoadSnapshot> {
        self.balancer.snapshot()
    }

    /// ドライブへの参照を取得
    pub fn drive(&self, drive_id: usize) -> &DriveSimulator {
        &self.drives[drive_id]
    }

    // ------------------------------------------------------------------
    // カタログのみの操作 (本体全体でカタログロックを保持、ドライブI/O無し)
    // ------------------------------------------------------------------

    /// メタデータレコードのコピーを取得
    pub fn get_metadata(&self, path: &str) -> Option<FileRecord> {
        self.catalog.get(path)
    }

    /// ディレクトリ直下のエントリ名を取得
    pub fn list_directory(&self, path: &str) -> Vec<String> {
        self.catalog.list_directory(path)
    }

    /// 通常ファイルを作成
    pub fn create_file(&self, path: &str, mode: u32) -> AccelResult<()> {
        let mut guard = self.catalog.lock();

        if guard.contains(path) {
            tracing::error!("Create file failed: {} already exists", path);
            return Err(AccelError::Exists(path.to_string()));
        }

        guard.insert(path.to_string(), FileRecord::regular(mode & 0o777));
        tracing::info!("File created: {}", path);
        Ok(())
    }

    /// ディレクトリを作成
    pub fn create_directory(&self, path: &str, mode: u32) -> AccelResult<()> {
        let mut guard = self.catalog.lock();

        if guard.contains(path) {
            tracing::error!("Create directory failed: {} already exists", path);
            return Err(AccelError::Exists(path.to_string()));
        }

        guard.insert(path.to_string(), FileRecord::directory(mode & 0o777));
        tracing::info!("Directory created: {}", path);
        Ok(())
    }

    /// 空ディレクトリを削除
    pub fn remove_directory(&self, path: &str) -> AccelResult<()> {
        let mut guard = self.catalog.lock();

        let record = guard
            .get(path)
            .ok_or_else(|| {
                tracing::error!("Remove directory failed: {} does not exist", path);
                AccelError::NotFound(path.to_string())
            })?
            .clone();

        if !record.is_directory() {
            tracing::error!("Remove directory failed: {} is not a directory", path);
            return Err(AccelError::NotDirectory(path.to_string()));
        }

        if !guard.children(path).is_empty() {
            tracing::error!("Remove directory failed: {} is not empty", path);
            return Err(AccelError::NotEmpty(path.to_string()));
        }

        guard.remove(path);
        tracing::info!("Directory removed: {}", path);
        Ok(())
    }

    /// パーミッションビットを変更
    pub fn chmod_file(&self, path: &str, mode: u32) -> AccelResult<()> {
        let mut guard = self.catalog.lock();

        let record = guard.get_mut(path).ok_or_else(|| {
            tracing::error!("Chmod failed: {} does not exist", path);
            AccelError::NotFound(path.to_string())
        })?;

        record.set_permissions(mode);
        record.ctime = now_secs();

        tracing::info!("Changed mode of {} to {:o}", path, mode & 0o7777);
        Ok(())
    }

    /// 所有者を変更
    pub fn chown_file(&self, path: &str, uid: u32, gid: u32) -> AccelResult<()> {
        let mut guard = self.catalog.lock();

        let record = guard.get_mut(path).ok_or_else(|| {
            tracing::error!("Chown failed: {} does not exist", path);
            AccelError::NotFound(path.to_string())
        })?;

        record.uid = uid;
        record.gid = gid;
        record.ctime = now_secs();

        tracing::info!("Changed owner of {} to uid={} gid={}", path, uid, gid);
        Ok(())
    }

    /// アクセス時刻と更新時刻を設定
    pub fn utimens_file(&self, path: &str, atime: i64, mtime: i64) -> AccelResult<()> {
        let mut guard = self.catalog.lock();

        let record = guard.get_mut(path).ok_or_else(|| {
            tracing::error!("Utimens failed: {} does not exist", path);
            AccelError::NotFound(path.to_string())
        })?;

        record.atime = atime;
        record.mtime = mtime;

        tracing::info!("Updated timestamps of {}", path);
        Ok(())
    }

    // ------------------------------------------------------------------
    // データ操作 (カタログロックはドライブI/Oの前に必ず手放す)
    // ------------------------------------------------------------------

    /// 通常ファイルを削除
    ///
    /// ドライブ上のデータ削除が完了してからカタログレコードを消す。
    /// 両者の間に割り込んだ読者は「カタログには在るが中身は空」を
    /// 観測しうるが、これはunlinkのセマンティクスとして許容される。
    pub fn delete_file(&self, path: &str) -> AccelResult<()> {
        {
            let guard = self.catalog.lock();
            let record = guard.get(path).ok_or_else(|| {
                tracing::error!("Delete file failed: {} does not exist", path);
                AccelError::NotFound(path.to_string())
            })?;

            if !record.is_regular() {
                tracing::error!("Delete file failed: {} is not a regular file", path);
                return Err(AccelError::IsDirectory(path.to_string()));
            }
        }

        tracing::debug!(
            "Path {} mapped to primary drive {}",
            path,
            self.placer.place(path)
        );
        self.purge_data(path)?;

        self.catalog.lock().remove(path);
        tracing::info!("File deleted: {}", path);
        Ok(())
    }

    /// ファイルを指定サイズに切り詰め (または零拡張)
    pub fn truncate_file(&self, path: &str, new_size: u64) -> AccelResult<()> {
        {
            let guard = self.catalog.lock();
            let record = guard.get(path).ok_or_else(|| {
                tracing::error!("Truncate failed: {} does not exist", path);
                AccelError::NotFound(path.to_string())
            })?;

            if !record.is_regular() {
                tracing::error!("Truncate failed: {} is not a regular file", path);
                return Err(AccelError::IsDirectory(path.to_string()));
            }
        }

        // ブロックはバンク全体に散らばるため、全ドライブへ発行する。
        // エントリを持たないドライブのnot-foundは切るものが無いだけ。
        let handles: Vec<_> = self
            .drives
            .iter()
            .map(|drive| drive.submit(path.to_string(), IoKind::Truncate { len: new_size }))
            .collect();
        for handle in handles {
            match handle.wait(OPERATION_TIMEOUT) {
                Ok(_) | Err(DriveError::NotFound(_)) => {}
                Err(error) => {
                    tracing::error!("Truncate failed for {}: {}", path, error);
                    return Err(error.into());
                }
            }
        }

        // 新サイズより先のブロックはもう存在しない
        self.locations.retain_below(path, new_size);

        {
            let mut guard = self.catalog.lock();
            if let Some(record) = guard.get_mut(path) {
                record.size = new_size;
                let now = now_secs();
                record.mtime = now;
                record.ctime = now;
            }
        }

        tracing::info!("Truncated {} to size {}", path, new_size);
        Ok(())
    }

    /// ファイルからの読み出し
    ///
    /// 読み出し範囲をカタログサイズで切り詰めてから、ブロック境界で
    /// 分割して投入・完了待ちを行う。各ブロックは記録済みの実効
    /// ドライブ (無ければプライマリ) から読む。ブロックを持たない
    /// ドライブや短いエントリはゼロ埋めとして扱う (疎ファイル)。
    pub fn read_file(&self, path: &str, buf: &mut [u8], offset: u64) -> AccelResult<usize> {
        let record = self.catalog.get(path).ok_or_else(|| {
            tracing::error!("Read failed: {} does not exist", path);
            AccelError::NotFound(path.to_string())
        })?;

        if offset >= record.size {
            return Ok(0);
        }

        let len = buf.len().min((record.size - offset) as usize);
        let mut progress = 0usize;

        while progress < len {
            let block_offset = offset + progress as u64;
            let block_start = DrivePlacer::block_start(block_offset);
            let within = (block_offset - block_start) as usize;
            let chunk = (len - progress).min(BLOCK_SIZE - within);

            let key = DrivePlacer::block_key(path, block_start);
            let primary = self.placer.place(&key);
            let drive_id = self.locations.get(path, block_start).unwrap_or(primary);
            tracing::debug!(
                "Block {}@{} mapped to drive {} (primary {})",
                path,
                block_start,
                drive_id,
                primary
            );

            self.balancer.start_operation(drive_id);
            let started = Instant::now();
            let handle = self.drives[drive_id].submit(
                path.to_string(),
                IoKind::Read {
                    offset: block_offset,
                    len: chunk,
                },
            );

            match handle.wait(OPERATION_TIMEOUT) {
                Ok(IoCompletion::Data(data)) => {
                    self.balancer
                        .record_operation(drive_id, data.len(), started.elapsed());
                    let dest = &mut buf[progress..progress + chunk];
                    dest[..data.len()].copy_from_slice(&data);
                    dest[data.len()..].fill(0);
                    progress += chunk;
                }
                Err(DriveError::NotFound(_)) => {
                    self.balancer.record_operation(drive_id, 0, started.elapsed());
                    buf[progress..progress + chunk].fill(0);
                    progress += chunk;
                }
                Ok(completion) => {
                    self.balancer.record_operation(drive_id, 0, started.elapsed());
                    tracing::error!(
                        "Read failed: unexpected completion for {}: {:?}",
                        path,
                        completion
                    );
                    return Err(AccelError::Io(format!(
                        "unexpected read completion for {}",
                        path
                    )));
                }
                Err(error) => {
                    self.balancer.record_operation(drive_id, 0, started.elapsed());
                    tracing::error!("Read failed for {}: {}", path, error);
                    return Err(error.into());
                }
            }
        }

        {
            let mut guard = self.catalog.lock();
            if let Some(record) = guard.get_mut(path) {
                record.atime = now_secs();
            }
        }

        tracing::info!("Read {} bytes from {}", progress, path);
        Ok(progress)
    }

    /// ファイルへの書き込み
    ///
    /// 全ブロックが成功した場合のみカタログ (mtime、必要ならsize) を
    /// 更新する。途中で失敗した書き込みはロールバックされず、カタログ
    /// も更新されない。
    pub fn write_file(&self, path: &str, data: &[u8], offset: u64) -> AccelResult<usize> {
        {
            let guard = self.catalog.lock();
            if !guard.contains(path) {
                tracing::error!("Write failed: {} does not exist", path);
                return Err(AccelError::NotFound(path.to_string()));
            }
        }

        if data.is_empty() {
            return Ok(0);
        }

        let mut progress = 0usize;
        while progress < data.len() {
            let block_offset = offset + progress as u64;
            let block_start = DrivePlacer::block_start(block_offset);
            let within = (block_offset - block_start) as usize;
            let chunk = (data.len() - progress).min(BLOCK_SIZE - within);

            let key = DrivePlacer::block_key(path, block_start);
            let primary = self.placer.place(&key);
            // 既に書かれたブロックは記録済みドライブに固定し、未記録の
            // ブロックだけが実効ドライブ選択を受ける
            let recorded = self.locations.get(path, block_start);
            let drive_id =
                recorded.unwrap_or_else(|| self.balancer.select_drive(primary, chunk));
            tracing::debug!(
                "Block {}@{} mapped to drive {} (primary {})",
                path,
                block_start,
                drive_id,
                primary
            );

            self.balancer.start_operation(drive_id);
            let started = Instant::now();
            let handle = self.drives[drive_id].submit(
                path.to_string(),
                IoKind::Write {
                    offset: block_offset,
                    data: data[progress..progress + chunk].to_vec(),
                },
            );

            match handle.wait(OPERATION_TIMEOUT) {
                Ok(IoCompletion::Done(written)) => {
                    self.balancer
                        .record_operation(drive_id, written, started.elapsed());
                    if recorded.is_none() {
                        self.locations.record(path, block_start, drive_id);
                    }
                    progress += written;
                }
                Ok(completion) => {
                    self.balancer.record_operation(drive_id, 0, started.elapsed());
                    tracing::error!(
                        "Write failed: unexpected completion for {}: {:?}",
                        path,
                        completion
                    );
                    return Err(AccelError::Io(format!(
                        "unexpected write completion for {}",
                        path
                    )));
                }
                Err(error) => {
                    self.balancer.record_operation(drive_id, 0, started.elapsed());
                    tracing::error!("Write failed for {}: {}", path, error);
                    return Err(error.into());
                }
            }
        }

        {
            let mut guard = self.catalog.lock();
            if let Some(record) = guard.get_mut(path) {
                record.mtime = now_secs();
                let end = offset + progress as u64;
                if end > record.size {
                    record.size = end;
                }
            }
        }

        tracing::info!("Wrote {} bytes to {}", progress, path);
        Ok(progress)
    }

    /// リネーム
    ///
    /// 名前空間の入れ替えを外部から不可分に見せるため、カタログロック
    /// を操作全体 (データ移行を含む) で保持する。大きなファイルの
    /// リネームはその間カタログを停滞させるが、これは意図した
    /// トレードオフ。移行途中で失敗した場合、コピー済みの宛先バイトは
    /// 残留する (許容された制限)。
    pub fn rename_file(&self, from: &str, to: &str, _flags: u32) -> AccelResult<()> {
        let mut guard = self.catalog.lock();

        let record = guard
            .get(from)
            .ok_or_else(|| {
                tracing::error!("Rename failed: source {} does not exist", from);
                AccelError::NotFound(from.to_string())
            })?
            .clone();

        if guard.contains(to) {
            tracing::error!("Rename failed: destination {} already exists", to);
            return Err(AccelError::Exists(to.to_string()));
        }

        tracing::debug!(
            "Rename endpoints: {} on primary drive {}, {} on primary drive {}",
            from,
            self.placer.place(from),
            to,
            self.placer.place(to)
        );

        // ブロックキーがパスを含むため、通常ファイルのデータは宛先の
        // キー配置へ移し替える必要がある
        let migrated = if record.is_regular() && record.size > 0 {
            self.migrate_data(from, to, record.size)?
        } else {
            false
        };

        guard.insert(to.to_string(), record);
        guard.remove(from);

        if migrated {
            self.purge_data(from)?;
        }

        tracing::info!("Renamed {} to {}", from, to);
        Ok(())
    }

    /// ブロック単位のクロスドライブデータ移行
    ///
    /// ブロック境界に整列して、各ブロックを元パスの実効ドライブ
    /// (無ければプライマリ) から読み、宛先パスのブロックキーが指す
    /// ドライブへ書いて配置を記録する。読み書きはそれぞれ自前の完了
    /// ハンドルを持ち、どちらかが失敗すればリネーム全体がI/Oエラーに
    /// なる。
    fn migrate_data(&self, from: &str, to: &str, size: u64) -> AccelResult<bool> {
        let mut migrated = false;
        let mut progress = 0u64;

        while progress < size {
            let chunk = ((size - progress) as usize).min(BLOCK_SIZE);
            let src_primary = self.placer.place(&DrivePlacer::block_key(from, progress));
            let src_drive = self.locations.get(from, progress).unwrap_or(src_primary);
            let dst_drive = self.placer.place(&DrivePlacer::block_key(to, progress));

            let read_handle = self.drives[src_drive].submit(
                from.to_string(),
                IoKind::Read {
                    offset: progress,
                    len: chunk,
                },
            );
            let block = match read_handle.wait(OPERATION_TIMEOUT) {
                Ok(IoCompletion::Data(data)) => data,
                // 書かれていないブロックは移すものが無い
                Err(DriveError::NotFound(_)) => Vec::new(),
                other => {
                    tracing::error!(
                        "Rename failed: error reading {} at {}: {:?}",
                        from,
                        progress,
                        other
                    );
                    return Err(AccelError::Io(format!(
                        "rename migration read failed for {}",
                        from
                    )));
                }
            };

            if !block.is_empty() {
                let write_handle = self.drives[dst_drive].submit(
                    to.to_string(),
                    IoKind::Write {
                        offset: progress,
                        data: block,
                    },
                );
                match write_handle.wait(OPERATION_TIMEOUT) {
                    Ok(IoCompletion::Done(_)) => {
                        self.locations.record(to, progress, dst_drive);
                        migrated = true;
                    }
                    other => {
                        tracing::error!(
                            "Rename failed: error writing {} at {}: {:?}",
                            to,
                            progress,
                            other
                        );
                        return Err(AccelError::Io(format!(
                            "rename migration write failed for {}",
                            to
                        )));
                    }
                }
            }

            progress += chunk as u64;
        }

        Ok(migrated)
    }

    /// パスのデータを全ドライブから削除
    ///
    /// ブロックはバンク全体に散らばるため、DELETEを全ドライブへ並行
    /// 投入してから順に完了を待つ。ドライブ層のDELETEは冪等。
    /// ブロック配置の記録も併せて破棄する。
    fn purge_data(&self, path: &str) -> AccelResult<()> {
        self.locations.forget_path(path);

        let handles: Vec<_> = self
            .drives
            .iter()
            .map(|drive| drive.submit(path.to_string(), IoKind::Delete))
            .collect();

        for handle in handles {
            match handle.wait(OPERATION_TIMEOUT) {
                Ok(_) | Err(DriveError::NotFound(_)) => {}
                Err(error) => {
                    tracing::error!("Delete failed for {}: {}", path, error);
                    return Err(error.into());
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DRIVE_QUEUE_CAPACITY;
    use crate::metadata::FileKind;
    use std::time::Duration;

    fn accel() -> StorageAccelerator {
        StorageAccelerator::new(4, "test_seed")
    }

    #[test]
    fn test_create_and_delete_file() {
        let accel = accel();

        assert!(accel.create_file("/testfile", 0o644).is_ok());

        let metadata = accel.get_metadata("/testfile").expect("metadata exists");
        assert_eq!(metadata.permissions(), 0o644);
        assert_eq!(metadata.kind(), FileKind::Regular);

        assert!(accel.delete_file("/testfile").is_ok());
        assert!(accel.get_metadata("/testfile").is_none());
    }

    #[test]
    fn test_create_existing_file_fails() {
        let accel = accel();

        accel.create_file("/dup", 0o644).unwrap();
        assert!(matches!(
            accel.create_file("/dup", 0o644),
            Err(AccelError::Exists(_))
        ));
    }

    #[test]
    fn test_delete_missing_file_fails() {
        let accel = accel();
        assert!(matches!(
            accel.delete_file("/none"),
            Err(AccelError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_directory_via_delete_file_fails() {
        let accel = accel();
        accel.create_directory("/d", 0o755).unwrap();
        assert!(matches!(
            accel.delete_file("/d"),
            Err(AccelError::IsDirectory(_))
        ));
    }

    #[test]
    fn test_remove_directory_semantics() {
        let accel = accel();

        assert!(matches!(
            accel.remove_directory("/missing"),
            Err(AccelError::NotFound(_))
        ));

        accel.create_file("/plain", 0o644).unwrap();
        assert!(matches!(
            accel.remove_directory("/plain"),
            Err(AccelError::NotDirectory(_))
        ));

        accel.create_directory("/d", 0o755).unwrap();
        accel.create_file("/d/child", 0o644).unwrap();
        assert!(matches!(
            accel.remove_directory("/d"),
            Err(AccelError::NotEmpty(_))
        ));

        accel.delete_file("/d/child").unwrap();
        assert!(accel.remove_directory("/d").is_ok());
        assert!(accel.get_metadata("/d").is_none());
    }

    #[test]
    fn test_chmod_preserves_kind() {
        let accel = accel();
        accel.create_file("/f", 0o644).unwrap();

        accel.chmod_file("/f", 0o600).unwrap();
        let metadata = accel.get_metadata("/f").unwrap();
        assert!(metadata.is_regular());
        assert_eq!(metadata.permissions(), 0o600);
    }

    #[test]
    fn test_chown_updates_owner() {
        let accel = accel();
        accel.create_file("/f", 0o644).unwrap();

        accel.chown_file("/f", 1234, 5678).unwrap();
        let metadata = accel.get_metadata("/f").unwrap();
        assert_eq!(metadata.uid, 1234);
        assert_eq!(metadata.gid, 5678);
    }

    #[test]
    fn test_utimens_sets_times() {
        let accel = accel();
        accel.create_file("/f", 0o644).unwrap();

        accel.utimens_file("/f", 1_000_000, 2_000_000).unwrap();
        let metadata = accel.get_metadata("/f").unwrap();
        assert_eq!(metadata.atime, 1_000_000);
        assert_eq!(metadata.mtime, 2_000_000);
    }

    #[test]
    fn test_write_updates_size_and_read_roundtrips() {
        let accel = accel();
        accel.create_file("/f", 0o644).unwrap();

        let n = accel.write_file("/f", b"hello world", 0).unwrap();
        assert_eq!(n, 11);
        assert_eq!(accel.get_metadata("/f").unwrap().size, 11);

        let mut buf = [0u8; 11];
        let n = accel.read_file("/f", &mut buf, 0).unwrap();
        assert_eq!(n, 11);
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn test_read_clamps_to_size() {
        let accel = accel();
        accel.create_file("/f", 0o644).unwrap();
        accel.write_file("/f", b"abc", 0).unwrap();

        let mut buf = [0xffu8; 16];
        let n = accel.read_file("/f", &mut buf, 0).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], b"abc");

        // オフセットがサイズ以上なら0バイト
        let n = accel.read_file("/f", &mut buf, 3).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_read_missing_file_fails() {
        let accel = accel();
        let mut buf = [0u8; 4];
        assert!(matches!(
            accel.read_file("/none", &mut buf, 0),
            Err(AccelError::NotFound(_))
        ));
    }

    #[test]
    fn test_write_missing_file_fails() {
        let accel = accel();
        assert!(matches!(
            accel.write_file("/none", b"x", 0),
            Err(AccelError::NotFound(_))
        ));
    }

    #[test]
    fn test_sparse_write_reads_zero_gaps() {
        let accel = accel();
        accel.create_file("/sparse", 0o644).unwrap();

        // ブロック境界をまたいだ先にだけ書く
        accel.write_file("/sparse", b"tail", 8192).unwrap();
        assert_eq!(accel.get_metadata("/sparse").unwrap().size, 8196);

        let mut buf = vec![0xffu8; 8196];
        let n = accel.read_file("/sparse", &mut buf, 0).unwrap();
        assert_eq!(n, 8196);
        assert!(buf[..8192].iter().all(|&b| b == 0));
        assert_eq!(&buf[8192..], b"tail");
    }

    #[test]
    fn test_multi_block_roundtrip() {
        let accel = accel();
        accel.create_file("/big", 0o644).unwrap();

        let pattern: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let n = accel.write_file("/big", &pattern, 0).unwrap();
        assert_eq!(n, pattern.len());

        let mut buf = vec![0u8; pattern.len()];
        let n = accel.read_file("/big", &mut buf, 0).unwrap();
        assert_eq!(n, pattern.len());
        assert_eq!(buf, pattern);
    }

    #[test]
    fn test_write_read_alignment_independence() {
        let accel = accel();
        accel.create_file("/align", 0o644).unwrap();
        accel.write_file("/align", b"0123456789", 0).unwrap();

        // 書き込みと異なる開始位置から読んでも同じブロックに当たる
        let mut buf = [0u8; 4];
        assert_eq!(accel.read_file("/align", &mut buf, 3).unwrap(), 4);
        assert_eq!(&buf, b"3456");

        // 途中オフセットからの書き込みも同じブロックに落ちる
        accel.write_file("/align", b"XY", 5).unwrap();
        let mut buf = [0u8; 10];
        assert_eq!(accel.read_file("/align", &mut buf, 0).unwrap(), 10);
        assert_eq!(&buf, b"01234XY789");
    }

    #[test]
    fn test_unaligned_write_crossing_block_boundary() {
        let accel = accel();
        accel.create_file("/cross", 0o644).unwrap();

        // ブロック境界をまたぐ書き込みは境界で分割される
        let payload: Vec<u8> = (0..1000u32).map(|i| (i % 199) as u8).collect();
        accel.write_file("/cross", &payload, 4000).unwrap();

        let mut buf = vec![0u8; 5000];
        assert_eq!(accel.read_file("/cross", &mut buf, 0).unwrap(), 5000);
        assert!(buf[..4000].iter().all(|&b| b == 0));
        assert_eq!(&buf[4000..], &payload[..]);
    }

    #[test]
    fn test_redirected_write_is_found_by_read() {
        let accel = accel();
        accel.create_file("/hot", 0o644).unwrap();

        // プライマリを飽和させて初回書き込みをリダイレクトさせる
        let primary = accel.placer.place(&DrivePlacer::block_key("/hot", 0));
        for _ in 0..DRIVE_QUEUE_CAPACITY {
            accel.balancer.start_operation(primary);
        }
        accel.write_file("/hot", b"displaced", 0).unwrap();
        for _ in 0..DRIVE_QUEUE_CAPACITY {
            accel
                .balancer
                .record_operation(primary, 0, Duration::from_millis(1));
        }

        let effective = accel.locations.get("/hot", 0).expect("block recorded");
        assert_ne!(effective, primary);

        // 読み出しは記録された実効ドライブからデータを見つける
        let mut buf = [0u8; 9];
        assert_eq!(accel.read_file("/hot", &mut buf, 0).unwrap(), 9);
        assert_eq!(&buf, b"displaced");
    }

    #[test]
    fn test_rename_moves_metadata_and_data() {
        let accel = accel();
        accel.create_file("/old", 0o640).unwrap();
        accel.write_file("/old", b"payload", 0).unwrap();

        accel.rename_file("/old", "/new", 0).unwrap();

        assert!(accel.get_metadata("/old").is_none());
        let metadata = accel.get_metadata("/new").unwrap();
        assert_eq!(metadata.size, 7);
        assert_eq!(metadata.permissions(), 0o640);

        let mut buf = [0u8; 7];
        let n = accel.read_file("/new", &mut buf, 0).unwrap();
        assert_eq!(n, 7);
        assert_eq!(&buf, b"payload");
    }

    #[test]
    fn test_rename_rejects_existing_destination() {
        let accel = accel();
        accel.create_file("/a", 0o644).unwrap();
        accel.create_file("/b", 0o644).unwrap();

        assert!(matches!(
            accel.rename_file("/a", "/b", 0),
            Err(AccelError::Exists(_))
        ));
    }

    #[test]
    fn test_rename_missing_source_fails() {
        let accel = accel();
        assert!(matches!(
            accel.rename_file("/none", "/dest", 0),
            Err(AccelError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_clears_data_for_recreated_path() {
        let accel = accel();
        accel.create_file("/f", 0o644).unwrap();
        accel.write_file("/f", b"old content", 0).unwrap();
        accel.delete_file("/f").unwrap();

        // 同じパスを作り直して零拡張した場合、古い中身が見えてはならない
        accel.create_file("/f", 0o644).unwrap();
        accel.truncate_file("/f", 8).unwrap();

        let mut buf = [0xffu8; 8];
        let n = accel.read_file("/f", &mut buf, 0).unwrap();
        assert_eq!(n, 8);
        assert_eq!(buf, [0u8; 8]);
    }
}
