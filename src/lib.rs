pub mod config;
pub mod db;
pub mod features;
pub mod shared;

use chrono::DateTime;
use chrono_tz::Tz;
use log::info;
use rusqlite::Connection;
use shared::errors::{AppError, AppResult};
use std::sync::{Mutex, MutexGuard};

/// アプリケーション状態（データベース接続を保持）
///
/// ライフサイクル操作は共有エンティティを直接書き換えるため、
/// 同一アイテムへの変更は必ずこのロックを通して直列化する。
pub struct AppState {
    pub db: Mutex<Connection>,
}

impl AppState {
    /// データベース接続のロックを取得する
    ///
    /// # 戻り値
    /// 接続ガード、またはロックが汚染されている場合は並行処理エラー
    pub fn db(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| AppError::concurrency(format!("データベースロックエラー: {e}")))
    }
}

/// 定期スイープの実行結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    /// 期限切れにした特典の件数
    pub expired_benefits: usize,
    /// 新しい期間に進めた特典の件数
    pub reset_benefits: usize,
    /// 期限切れにしたクーポンの件数
    pub expired_coupons: usize,
    /// 更新日を進めたサブスクリプションの件数
    pub advanced_subscriptions: usize,
}

/// アプリケーションを初期化する
///
/// # 戻り値
/// アプリケーション状態、または失敗時はエラー
///
/// # 処理内容
/// 1. ログシステムを初期化
/// 2. データディレクトリとデータベースファイルを初期化
/// 3. アプリケーション設定を読み込み、プロセス全体に登録
/// 4. データベース接続を開く
pub fn initialize() -> AppResult<AppState> {
    // ログシステムを初期化
    config::initialization::initialize_logging_system();

    info!("アプリケーション初期化を開始します...");

    let init_result = config::initialization::initialize_application()?;

    // アプリケーション設定を読み込んで登録
    let preferences_path = init_result.app_data_dir.join("preferences.json");
    let prefs = config::preferences::load_or_default(&preferences_path)?;
    if config::preferences::init(prefs).is_err() {
        // すでに登録済み（再初期化時）の場合はそのまま続行
        info!("アプリケーション設定はすでに登録されています");
    }

    // データベース接続を開く
    let conn = db::open_database(&init_result.database_path)?;

    config::initialization::log_initialization_complete(&init_result);

    info!("アプリケーション初期化が完了しました");

    Ok(AppState {
        db: Mutex::new(conn),
    })
}

/// すべての定期スイープを実行する
///
/// # 引数
/// * `conn` - データベース接続
/// * `now` - 現在時刻
///
/// # 戻り値
/// スイープの実行結果、または失敗時はエラー
///
/// # 備考
/// アプリ起動時やフォアグラウンド復帰時など、呼び出し側の決めた
/// タイミングで実行する。このコアはタイマーを持たない。
/// 期限切れの判定をリセットより先に行う。
pub fn run_sweeps(conn: &Connection, now: &DateTime<Tz>) -> AppResult<SweepSummary> {
    let expired_benefits = features::benefits::repository::expire_overdue(conn, now)?;
    let reset_benefits = features::benefits::repository::sweep_resets(conn, now)?;
    let expired_coupons = features::coupons::repository::expire_overdue(conn, now)?;
    let advanced_subscriptions = features::subscriptions::repository::sweep_renewals(conn, now)?;

    Ok(SweepSummary {
        expired_benefits,
        reset_benefits,
        expired_coupons,
        advanced_subscriptions,
    })
}
