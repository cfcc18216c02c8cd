use super::models::{Frequency, PeriodWindow};
use chrono::{Months, NaiveDate};

/// 現在の期間終了日から次の期間ウィンドウを計算する
///
/// # 引数
/// * `frequency` - 繰り返し周期
/// * `current_end` - 現在の期間終了日
///
/// # 戻り値
/// 次の期間ウィンドウ。一回限りのアイテムの場合はNone。
///
/// # 計算規則
/// - 新しい開始日は現在の終了日の翌日（期間は重ならず、隙間もできない）
/// - 新しい終了日は開始日 + 周期の月数 - 1日。月末をまたぐ加算は
///   有効な月末日に丸められる（1月31日 + 1ヶ月 -> 2月28/29日）
/// - 次回リセット日は新しい終了日と同じ
///
/// 結果は `(frequency, current_end)` のみから決まり、現在時刻には依存しない。
pub fn advance(frequency: Frequency, current_end: NaiveDate) -> Option<PeriodWindow> {
    let months = frequency.months()?;

    let start = current_end.succ_opt()?;
    let end = start.checked_add_months(Months::new(months))?.pred_opt()?;

    Some(PeriodWindow {
        start,
        end,
        next_reset: end,
    })
}

/// アイテム作成時の最初の期間ウィンドウを計算する
///
/// # 引数
/// * `frequency` - 繰り返し周期
/// * `today` - 作成日
///
/// # 戻り値
/// 最初の期間ウィンドウ。一回限りのアイテムの場合はNone
/// （期限日は呼び出し側が明示的に指定する）。
///
/// # 備考
/// 作成時のみ「今日」に依存する。以降のリセットはすべてadvanceで計算される。
pub fn initial_window(frequency: Frequency, today: NaiveDate) -> Option<PeriodWindow> {
    let months = frequency.months()?;

    let end = today.checked_add_months(Months::new(months))?.pred_opt()?;

    Some(PeriodWindow {
        start: today,
        end,
        next_reset: end,
    })
}
