use crate::shared::errors::{AppError, AppResult};
use log::info;
use rusqlite::Connection;
use std::path::Path;

/// データベース接続を開き、マイグレーションを実行する
///
/// # 引数
/// * `database_path` - データベースファイルのパス
///
/// # 戻り値
/// データベース接続、または失敗時はエラー
///
/// # 処理内容
/// 1. データベース接続を開く（ファイルが存在しない場合は自動作成される）
/// 2. マイグレーションを実行してテーブルを作成
pub fn open_database(database_path: &Path) -> AppResult<Connection> {
    let conn = Connection::open(database_path)
        .map_err(|e| AppError::Database(format!("データベースのオープンに失敗しました: {e}")))?;

    super::migrations::run_migrations(&conn)?;

    info!("データベース接続を確立しました: {database_path:?}");

    Ok(conn)
}
