use xxhash_rust::xxh64::xxh64;

/// ハッシュベースのドライブ配置器
///
/// xxHash64を使用してキー (パスまたはパス+ブロックオフセット) を
/// プライマリドライブにマッピングする。シード文字列が同じであれば
/// 実行をまたいで配置は安定する。
pub struct DrivePlacer {
    /// シード文字列から導出した64ビットシード
    seed: u64,

    /// バンク内のドライブ数
    num_drives: usize,
}

impl DrivePlacer {
    /// シード文字列とドライブ数から配置器を作成
    ///
    /// シード文字列はまず `xxh64(seed_str, 0)` で64ビット値に変換され、
    /// 以後のキーハッシュのシードとして使用される。
    ///
    /// # Arguments
    /// * `seed_str` - シード文字列
    /// * `num_drives` - ドライブ数 (1以上)
    pub fn new(seed_str: &str, num_drives: usize) -> Self {
        assert!(num_drives > 0, "drive bank must not be empty");

        let seed = xxh64(seed_str.as_bytes(), 0);
        Self { seed, num_drives }
    }

    /// キーに対応するプライマリドライブを取得
    ///
    /// # Arguments
    /// * `key` - 配置キー (パス、またはブロックキー)
    ///
    /// # Returns
    /// `[0, num_drives)` のドライブインデックス
    pub fn place(&self, key: &str) -> usize {
        let hash = xxh64(key.as_bytes(), self.seed);
        (hash % self.num_drives as u64) as usize
    }

    /// ブロックI/O用の配置キーを生成
    ///
    /// ブロック先頭の絶対オフセットをパスに連結した `"<path>:<offset>"`
    /// 形式。呼び出し側は必ず [`Self::block_start`] で整列した
    /// オフセットを渡す。同じバイトアドレスはアクセス開始位置に
    /// かかわらず常に同じキーに落ちる。
    pub fn block_key(path: &str, block_start: u64) -> String {
        format!("{}:{}", path, block_start)
    }

    /// 絶対オフセットが属するブロックの先頭オフセットを計算
    pub fn block_start(offset: u64) -> u64 {
        offset - offset % crate::constants::BLOCK_SIZE as u64
    }

    /// ドライブ数を取得
    pub fn num_drives(&self) -> usize {
        self.num_drives
    }
}
