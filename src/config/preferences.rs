use crate::shared::errors::AppResult;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// アプリケーション設定データモデル
///
/// プロセス全体で一つだけ保持される設定。データベースの行ではなく、
/// アプリデータディレクトリ内のJSONファイルとして永続化される。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppPreferences {
    /// リマインダーのデフォルト日数（期限の何日前に通知するか）
    pub default_reminder_days_before: i64,
    /// 新規アイテムのリマインダーをデフォルトで有効にするか
    pub reminders_enabled_by_default: bool,
    /// 金額表示に使用する通貨コード
    pub currency: String,
}

impl Default for AppPreferences {
    fn default() -> Self {
        Self {
            default_reminder_days_before: 3,
            reminders_enabled_by_default: true,
            currency: "JPY".to_string(),
        }
    }
}

/// プロセス全体で共有される設定インスタンス
static PREFERENCES: OnceCell<AppPreferences> = OnceCell::new();

/// 設定ファイルから設定を読み込む（ファイルがない場合はデフォルト値）
///
/// # 引数
/// * `path` - 設定ファイルのパス
///
/// # 戻り値
/// 読み込まれた設定、または失敗時はエラー
pub fn load_or_default(path: &Path) -> AppResult<AppPreferences> {
    if !path.exists() {
        return Ok(AppPreferences::default());
    }

    let contents = fs::read_to_string(path)?;
    let prefs: AppPreferences = serde_json::from_str(&contents)?;
    Ok(prefs)
}

/// 設定をファイルに保存する
///
/// # 引数
/// * `path` - 設定ファイルのパス
/// * `prefs` - 保存する設定
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
pub fn save(path: &Path, prefs: &AppPreferences) -> AppResult<()> {
    let contents = serde_json::to_string_pretty(prefs)?;
    fs::write(path, contents)?;
    Ok(())
}

/// 読み込んだ設定をプロセス全体の設定として登録する
///
/// # 引数
/// * `prefs` - 登録する設定
///
/// # 戻り値
/// すでに登録済みの場合はErr（先勝ち）
pub fn init(prefs: AppPreferences) -> Result<(), AppPreferences> {
    PREFERENCES.set(prefs)
}

/// プロセス全体の設定を取得する
///
/// # 戻り値
/// 登録済みの設定。未登録の場合はデフォルト値で初期化して返す。
pub fn preferences() -> &'static AppPreferences {
    PREFERENCES.get_or_init(AppPreferences::default)
}
