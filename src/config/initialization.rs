use crate::shared::config::{get_database_filename, get_environment, Environment};
use crate::shared::errors::{AppError, AppResult};
use log::{info, warn};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

/// アプリケーション初期化の結果を表す構造体
#[derive(Debug)]
pub struct InitializationResult {
    /// 初回起動かどうか
    pub is_first_run: bool,
    /// アプリケーションデータディレクトリのパス
    pub app_data_dir: PathBuf,
    /// データベースファイルのパス
    pub database_path: PathBuf,
    /// 実行環境
    pub environment: Environment,
}

/// アプリケーションの初期化を実行する
///
/// # 戻り値
/// 初期化結果、または失敗時はエラー
///
/// # 処理内容
/// 1. 環境変数の読み込み（.envファイルがある場合）
/// 2. アプリケーションデータディレクトリの作成
/// 3. 初回起動の判定
/// 4. データベースファイルの初期化
pub fn initialize_application() -> AppResult<InitializationResult> {
    // 環境変数を読み込み（.envファイルがある場合）
    if dotenv::dotenv().is_err() {
        // .envファイルがない場合は無視（本番環境では環境変数が直接設定される）
        warn!(".envファイルが見つかりません。環境変数が直接設定されていることを確認してください。");
    } else {
        info!(".envファイルを読み込みました");
    }

    // 現在の実行環境を取得
    let environment = get_environment();

    // アプリケーションデータディレクトリを取得・作成
    let app_data_dir = ensure_app_data_directory()?;

    // データベースファイルパスを構築
    let db_filename = get_database_filename(environment.clone());
    let database_path = app_data_dir.join(db_filename);

    // 初回起動かどうかを判定（データベースファイルの存在で判定）
    let is_first_run = !database_path.exists();

    if is_first_run {
        info!("初回起動を検出しました: 環境={environment:?}, データベース={database_path:?}");
    }

    // データベースを初期化
    initialize_database_file(&database_path)?;

    Ok(InitializationResult {
        is_first_run,
        app_data_dir,
        database_path,
        environment,
    })
}

/// アプリケーションデータディレクトリを確実に作成する
///
/// # 戻り値
/// アプリケーションデータディレクトリのパス、または失敗時はエラー
fn ensure_app_data_directory() -> AppResult<PathBuf> {
    let base_dir = dirs::data_dir().ok_or_else(|| {
        AppError::configuration("アプリデータディレクトリの取得に失敗しました")
    })?;

    let app_data_dir = base_dir.join("tokuten-memo");

    // ディレクトリが存在しない場合は作成
    if !app_data_dir.exists() {
        fs::create_dir_all(&app_data_dir)?;
        info!("アプリケーションデータディレクトリを作成しました: {app_data_dir:?}");
    }

    Ok(app_data_dir)
}

/// データベースファイルを初期化する
///
/// # 引数
/// * `database_path` - データベースファイルのパス
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
fn initialize_database_file(database_path: &Path) -> AppResult<()> {
    // データベース接続を開く（ファイルが存在しない場合は自動作成される）
    let conn = Connection::open(database_path)
        .map_err(|e| AppError::Database(format!("データベースファイルの作成に失敗しました: {e}")))?;

    // マイグレーションを実行してテーブルを作成
    crate::db::migrations::run_migrations(&conn).map_err(|e| {
        AppError::Database(format!("データベースマイグレーションの実行に失敗しました: {e}"))
    })?;

    info!("データベースファイルを初期化しました: {database_path:?}");

    Ok(())
}

/// ログシステムを初期化する
///
/// # 動作
/// LOG_LEVEL環境変数（未設定時は環境に応じたデフォルト）からログレベルを決定し、
/// env_loggerを初期化する。二重初期化は無視される。
pub fn initialize_logging_system() {
    // 環境設定を取得
    let env_config = crate::shared::config::EnvironmentConfig::from_env();

    // ログレベルを設定
    let log_level = match env_config.log_level.to_lowercase().as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };

    // env_loggerを初期化（テスト等での二重初期化はtry_initで無視）
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(false)
        .try_init();

    info!(
        "ログシステムを初期化しました: level={}, environment={}",
        env_config.log_level, env_config.environment
    );
}

/// 初期化完了ログを出力する
///
/// # 引数
/// * `result` - 初期化結果
pub fn log_initialization_complete(result: &InitializationResult) {
    if result.is_first_run {
        info!("初回起動の初期化が正常に完了しました");
    } else {
        info!("アプリケーション起動完了（既存データベースを使用）");
    }
    info!("環境: {:?}", result.environment);
    info!("データベース: {:?}", result.database_path);
}
