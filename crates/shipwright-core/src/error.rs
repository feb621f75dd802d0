use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("YAMLパースエラー: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("チェーン定義の読み込みに失敗しました: {path}\n理由: {message}")]
    ChainsLoad { path: PathBuf, message: String },

    #[error(
        "チェーン定義が見つかりません。以下の場所を確認してください:\n\
        - SHIPWRIGHT_CHAINS 環境変数\n\
        - カレントディレクトリ: chains.yaml\n\
        - ./chains/ ディレクトリ (*.yaml, *.yml)"
    )]
    ChainsNotFound,

    #[error("チェーンが見つかりません: {0}")]
    ChainNotFound(String),

    #[error("go.mod のパースに失敗しました (line {line}): {message}")]
    GoModParse { line: usize, message: String },

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
