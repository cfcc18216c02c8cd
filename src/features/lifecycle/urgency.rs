use super::models::{ItemStatus, UrgencyTier};
use chrono::NaiveDate;

/// 基準日から期限日までの残り日数を計算する
///
/// # 引数
/// * `today` - 基準日（呼び出し側が明示的に渡す。システム時刻には依存しない）
/// * `period_end` - 期限日
///
/// # 戻り値
/// 暦日単位の符号付き残り日数。期限超過の場合は負の値。
///
/// # 備考
/// 比較は常に暦日単位で行う。時刻の差は考慮しないため、
/// 同じ日のうちに分類が変わることはない。
pub fn days_remaining(today: NaiveDate, period_end: NaiveDate) -> i64 {
    period_end.signed_duration_since(today).num_days()
}

/// 表示用の残り日数を計算する（0未満にはならない）
///
/// # 引数
/// * `today` - 基準日
/// * `period_end` - 期限日
///
/// # 戻り値
/// 0以上の残り日数
pub fn days_remaining_display(today: NaiveDate, period_end: NaiveDate) -> i64 {
    days_remaining(today, period_end).max(0)
}

/// 残り日数から緊急度を分類する
///
/// # 引数
/// * `days` - 符号付き残り日数
///
/// # 戻り値
/// 緊急度の区分
///
/// # 分類規則（先頭から順に評価）
/// 1. 負の値      -> PastDue（期限超過）
/// 2. 0           -> DueToday（本日期限）
/// 3. 1〜3        -> Urgent（緊急）
/// 4. 4〜7        -> ExpiringSoon（まもなく期限）
/// 5. 8以上       -> Safe（余裕あり）
///
/// この境界値（0 / 1〜3 / 4〜7 / 8以上）は表示色とリマインダーの
/// デフォルト値が依存する固定の契約である。変更する場合は通知タイミングの
/// 意味も変わるため、分類はこの関数に集約し、エンティティ種別ごとに
/// 再実装してはならない。
pub fn classify_days(days: i64) -> UrgencyTier {
    match days {
        d if d < 0 => UrgencyTier::PastDue,
        0 => UrgencyTier::DueToday,
        1..=3 => UrgencyTier::Urgent,
        4..=7 => UrgencyTier::ExpiringSoon,
        _ => UrgencyTier::Safe,
    }
}

/// アイテムの状態と期限日から緊急度を分類する
///
/// # 引数
/// * `status` - アイテムの状態
/// * `today` - 基準日
/// * `period_end` - 期限日
///
/// # 戻り値
/// 緊急度。終端状態（使用済み・期限切れ）のアイテムは再分類しないためNone。
pub fn classify(status: ItemStatus, today: NaiveDate, period_end: NaiveDate) -> Option<UrgencyTier> {
    if status.is_terminal() {
        return None;
    }

    Some(classify_days(days_remaining(today, period_end)))
}
