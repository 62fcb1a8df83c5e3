//! LoopConfig - event loop の設定

use std::path::Path;

use serde::{Deserialize, Serialize};

/// event loop と resolution procedure の上限値
///
/// 全フィールドにデフォルトがあるので、設定ファイルには上書きしたいキーだけ書けばよい。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// adoption chain（`a` が `b` を、`b` が `c` を ...）の循環チェックで辿る最大リンク数
    pub max_adoption_depth: usize,

    /// thenable が同期的に別の thenable で resolve する入れ子の最大深さ
    pub max_resolution_depth: usize,

    /// `run_until_idle` で実行する turn 数の上限（`None` ならキューを空にするまで）
    pub turn_budget: Option<usize>,
}

/// `LoopConfig` 読み込みのエラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl LoopConfig {
    /// v1 のデフォルト: 上限は緩め、turn budget なし
    pub fn default_v1() -> Self {
        Self {
            max_adoption_depth: 1024,
            max_resolution_depth: 256,
            turn_budget: None,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::default_v1()
    }
}
