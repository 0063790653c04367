use std::collections::HashMap;
use std::sync::Mutex;

/// ブロック実効配置テーブル
///
/// ロードバランサはプライマリが飽和したブロックを別のドライブへ
/// リダイレクトする。書き込まれたブロックを後から確実に見つけるため、
/// パスとブロック先頭オフセットごとに実際にデータを受け取った
/// ドライブを記録する。記録が無いブロックはプライマリ配置に従う。
pub struct BlockLocations {
    blocks: Mutex<HashMap<String, HashMap<u64, usize>>>,
}

impl BlockLocations {
    pub fn new() -> Self {
        Self {
            blocks: Mutex::new(HashMap::new()),
        }
    }

    /// 記録済みの実効ドライブを取得
    pub fn get(&self, path: &str, block_start: u64) -> Option<usize> {
        self.blocks
            .lock()
            .unwrap()
            .get(path)
            .and_then(|blocks| blocks.get(&block_start).copied())
    }

    /// ブロックの実効ドライブを記録 (既存の記録は上書き)
    pub fn record(&self, path: &str, block_start: u64, drive_id: usize) {
        self.blocks
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .insert(block_start, drive_id);
    }

    /// パスの全ブロック記録を破棄 (削除・リネーム元の後始末)
    pub fn forget_path(&self, path: &str) {
        self.blocks.lock().unwrap().remove(path);
    }

    /// 指定サイズ以降のブロック記録を破棄 (切り詰めの後始末)
    pub fn retain_below(&self, path: &str, size: u64) {
        let mut blocks = self.blocks.lock().unwrap();
        if let Some(entries) = blocks.get_mut(path) {
            entries.retain(|&block_start, _| block_start < size);
            if entries.is_empty() {
                blocks.remove(path);
            }
        }
    }
}

impl Default for BlockLocations {
    fn default() -> Self {
        Self::new()
    }
}
