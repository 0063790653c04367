use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::constants::{DRIVE_QUEUE_CAPACITY, HIGH_LATENCY_THRESHOLD_MS};

/// ドライブごとの負荷カウンタ
///
/// すべてアトミックで、ロックは一切取らない。平均レイテンシは
/// `f64` のビット表現を `AtomicU64` に格納する。
struct DriveStats {
    pending_ops: AtomicUsize,
    total_bytes: AtomicU64,
    avg_latency_bits: AtomicU64,
}

impl DriveStats {
    fn new() -> Self {
        Self {
            pending_ops: AtomicUsize::new(0),
            total_bytes: AtomicU64::new(0),
            avg_latency_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    fn avg_latency_ms(&self) -> f64 {
        f64::from_bits(self.avg_latency_bits.load(Ordering::Relaxed))
    }
}

/// モニタ向けの負荷スナップショット
#[derive(Debug, Clone, Serialize)]
pub struct DriveLoadSnapshot {
    pub drive_id: usize,
    pub pending_ops: usize,
    pub total_bytes: u64,
    pub avg_latency_ms: f64,
}

/// ブロック単位のロードバランサ
///
/// プライマリドライブが飽和している場合に、最も空いているドライブへ
/// リダイレクトする。公平性の仕組みは持たない。pending数の上限と
/// least-loadedリダイレクトの組で自然なバックプレッシャが働き、
/// 単一ドライブのキューが深くなりすぎることを防ぐ。
pub struct LoadBalancer {
    stats: Vec<DriveStats>,
}

impl LoadBalancer {
    /// 指定ドライブ数でバランサを作成
    pub fn new(num_drives: usize) -> Self {
        Self {
            stats: (0..num_drives).map(|_| DriveStats::new()).collect(),
        }
    }

    /// 実効ドライブを選択
    ///
    /// プライマリが範囲外の場合はログに残してドライブ0を返す。
    /// プライマリのpendingが上限未満ならプライマリをそのまま返し、
    /// 飽和していれば全ドライブを走査して最小pendingのドライブを返す
    /// (同値なら最小インデックス)。
    pub fn select_drive(&self, primary: usize, _size: usize) -> usize {
        if primary >= self.stats.len() {
            tracing::error!("Invalid primary drive index: {}", primary);
            return 0;
        }

        let primary_pending = self.stats[primary].pending_ops.load(Ordering::Relaxed);
        if primary_pending < DRIVE_QUEUE_CAPACITY {
            return primary;
        }

        let mut selected = primary;
        let mut min_ops = primary_pending;
        for (drive_id, stats) in self.stats.iter().enumerate() {
            let pending = stats.pending_ops.load(Ordering::Relaxed);
            if pending < min_ops {
                min_ops = pending;
                selected = drive_id;
            }
        }

        if selected != primary {
            tracing::debug!(
                "Load balanced: redirecting from drive {} to {}",
                primary,
                selected
            );
        }

        selected
    }

    /// 投入直前にpendingカウンタを増やす
    pub fn start_operation(&self, drive_id: usize) {
        if drive_id >= self.stats.len() {
            tracing::error!("Invalid drive ID in start_operation: {}", drive_id);
            return;
        }

        self.stats[drive_id].pending_ops.fetch_add(1, Ordering::Relaxed);
    }

    /// 完了した操作を記録
    ///
    /// 転送バイト数を加算し、平均レイテンシを `(old + sample) / 2` の
    /// 指数平均で更新してからpendingを減らす。減算前の値が0なら
    /// 不変条件違反としてログに残す。
    pub fn record_operation(&self, drive_id: usize, size: usize, duration: Duration) {
        if drive_id >= self.stats.len() {
            tracing::error!("Invalid drive ID in record_operation: {}", drive_id);
            return;
        }

        let stats = &self.stats[drive_id];
        stats.total_bytes.fetch_add(size as u64, Ordering::Relaxed);

        let duration_ms = duration.as_secs_f64() * 1e3;
        let old_latency = stats.avg_latency_ms();
        stats.avg_latency_bits.store(
            ((old_latency + duration_ms) / 2.0).to_bits(),
            Ordering::Relaxed,
        );

        let old_pending = stats.pending_ops.fetch_sub(1, Ordering::Relaxed);
        if old_pending == 0 {
            tracing::error!("Pending ops underflow for drive {}", drive_id);
            // 巻き戻してカウンタを非負に保つ
            stats.pending_ops.fetch_add(1, Ordering::Relaxed);
        }

        if duration_ms > HIGH_LATENCY_THRESHOLD_MS {
            tracing::info!(
                "High latency operation on drive {}: {:.2}ms",
                drive_id,
                duration_ms
            );
        }
    }

    /// ドライブのpending数を取得
    pub fn pending_ops(&self, drive_id: usize) -> usize {
        self.stats
            .get(drive_id)
            .map(|s| s.pending_ops.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// 全ドライブの負荷スナップショットを取得
    pub fn snapshot(&self) -> Vec<DriveLoadSnapshot> {
        self.stats
            .iter()
            .enumerate()
            .map(|(drive_id, stats)| DriveLoadSnapshot {
                drive_id,
                pending_ops: stats.pending_ops.load(Ordering::Relaxed),
                total_bytes: stats.total_bytes.load(Ordering::Relaxed),
                avg_latency_ms: stats.avg_latency_ms(),
            })
            .collect()
    }
}
