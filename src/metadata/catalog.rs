use super::types::FileRecord;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// メタデータカタログ
///
/// 絶対パスからメタデータレコードへの権威あるマッピング。すべての
/// 変更は単一のミューテックスで直列化される。読み出しはレコードの
/// コピーを返すため、呼び出し側がロックを保持し続ける必要はなく、
/// 中途半端な更新が観測されることもない。
pub struct MetadataCatalog {
    records: Mutex<HashMap<String, FileRecord>>,
}

/// カタログロックのガード
///
/// アクセラレータが複数ステップの操作を1回のロック取得で合成し、
/// ドライブI/Oの前後でロックを手放すタイミングを正確に制御するために
/// 使用する。ガードが生きている間、カタログは排他的に保持される。
pub struct CatalogGuard<'a> {
    records: MutexGuard<'a, HashMap<String, FileRecord>>,
}

impl MetadataCatalog {
    /// ルートディレクトリ `/` 入りのカタログを作成
    ///
    /// ルートは directory|0755、nlink=2、所有者はプロセスの実UID/GID、
    /// 全タイムスタンプは構築時刻。
    pub fn new() -> Self {
        let mut records = HashMap::new();
        records.insert("/".to_string(), FileRecord::directory(0o755));

        Self {
            records: Mutex::new(records),
        }
    }

    /// カタログを排他ロックしてガードを取得
    pub fn lock(&self) -> CatalogGuard<'_> {
        CatalogGuard {
            records: self.records.lock().unwrap(),
        }
    }

    /// レコードのコピーを取得
    pub fn get(&self, path: &str) -> Option<FileRecord> {
        self.lock().get(path).cloned()
    }

    /// パスが存在するか確認
    pub fn exists(&self, path: &str) -> bool {
        self.lock().contains(path)
    }

    /// ディレクトリ直下のエントリ名を取得
    pub fn list_directory(&self, path: &str) -> Vec<String> {
        self.lock().children(path)
    }
}

impl Default for MetadataCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogGuard<'_> {
    /// レコードへの参照を取得
    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.records.get(path)
    }

    /// レコードへの可変参照を取得
    pub fn get_mut(&mut self, path: &str) -> Option<&mut FileRecord> {
        self.records.get_mut(path)
    }

    /// レコードを挿入 (既存なら上書き、呼び出し側が事前に存在確認する)
    pub fn insert(&mut self, path: String, record: FileRecord) {
        self.records.insert(path, record);
    }

    /// レコードを削除
    pub fn remove(&mut self, path: &str) -> Option<FileRecord> {
        self.records.remove(path)
    }

    /// パスが存在するか確認
    pub fn contains(&self, path: &str) -> bool {
        self.records.contains_key(path)
    }

    /// ディレクトリ直下のエントリ名を取得
    ///
    /// パスを末尾 `/` に正規化し、プレフィックス一致する各キーから
    /// 次の `/` までの部分を取り出して重複を除く。順序は未規定だが
    /// 1回の呼び出し内では安定。
    pub fn children(&self, path: &str) -> Vec<String> {
        let mut prefix = path.to_string();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }

        let mut entries: Vec<String> = Vec::new();
        for key in self.records.keys() {
            if key.starts_with(&prefix) && key != &prefix {
                let remaining = &key[prefix.len()..];
                let name = match remaining.find('/') {
                    Some(pos) => &remaining[..pos],
                    None => remaining,
                };
                if !name.is_empty() && !entries.iter().any(|e| e == name) {
                    entries.push(name.to_string());
                }
            }
        }

        entries
    }
}
