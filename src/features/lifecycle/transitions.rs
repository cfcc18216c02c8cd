use super::models::ItemStatus;
use crate::shared::errors::{AppError, AppResult};
use chrono::NaiveDate;

/// 状態遷移を引き起こす操作の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// 使用済みにする
    MarkUsed,
    /// 使用済みを取り消す
    UndoMarkUsed,
    /// 期限切れにする（定期スイープから呼ばれる）
    MarkExpired,
    /// 期間をリセットして新しい期間を開始する
    ResetPeriod,
}

impl Operation {
    /// ログ・エラーメッセージ用の文字列表現を取得
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::MarkUsed => "mark_used",
            Operation::UndoMarkUsed => "undo_mark_used",
            Operation::MarkExpired => "mark_expired",
            Operation::ResetPeriod => "reset_period",
        }
    }
}

/// 操作後の状態を決定する
///
/// # 引数
/// * `current` - 現在の状態
/// * `operation` - 実行する操作
///
/// # 戻り値
/// 遷移後の状態、または許可されない遷移の場合はInvalidTransitionエラー
///
/// # 遷移表
/// | 現在の状態 | mark_used | undo_mark_used | mark_expired | reset_period |
/// |---|---|---|---|---|
/// | available | used | エラー | expired | available |
/// | used      | エラー | available | エラー | available |
/// | expired   | エラー | エラー | エラー | available |
///
/// reset_periodはどの状態からも許可される（強制リセット）。
/// 無効な遷移は黙って無視せずエラーとして返す。呼び出し側は
/// 必要に応じてエラーを無視してよい。
pub fn next_status(current: ItemStatus, operation: Operation) -> AppResult<ItemStatus> {
    match (current, operation) {
        (ItemStatus::Available, Operation::MarkUsed) => Ok(ItemStatus::Used),
        (ItemStatus::Used, Operation::UndoMarkUsed) => Ok(ItemStatus::Available),
        (ItemStatus::Available, Operation::MarkExpired) => Ok(ItemStatus::Expired),
        (_, Operation::ResetPeriod) => Ok(ItemStatus::Available),
        (from, op) => Err(AppError::invalid_transition(format!(
            "{} は {} の状態では実行できません",
            op.as_str(),
            from.as_str()
        ))),
    }
}

/// スヌーズ日付を検証する
///
/// # 引数
/// * `today` - 基準日
/// * `until` - スヌーズ解除日
///
/// # 戻り値
/// 成功時はOk(())、解除日が基準日より後でない場合はバリデーションエラー
pub fn validate_snooze(today: NaiveDate, until: NaiveDate) -> AppResult<()> {
    if until <= today {
        return Err(AppError::validation(format!(
            "スヌーズ解除日は本日より後の日付である必要があります: {until}"
        )));
    }

    Ok(())
}
