use crate::features::lifecycle::{
    advance, classify, days_remaining, next_status, validate_snooze, Frequency, ItemStatus,
    Operation, UrgencyTier,
};
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 特典データモデル
///
/// card_name は作成時点のスナップショット。カードが後から削除・改名
/// されても追従しない。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Benefit {
    pub id: i64,
    pub card_id: Option<i64>,
    pub card_name: String,
    pub name: String,
    pub category: String,
    pub value: Decimal,
    pub frequency: Frequency,
    pub status: ItemStatus,
    pub current_period_start: NaiveDate,
    pub current_period_end: NaiveDate,
    pub next_reset_date: NaiveDate,
    pub reminder_enabled: bool,
    pub reminder_days_before: i64,
    pub last_reminder_date: Option<NaiveDate>,
    pub reminder_id: Option<String>,
    pub snoozed_until: Option<NaiveDate>,
    pub created_at: String,
    pub updated_at: String,
}

/// 特典利用履歴データモデル
///
/// benefit_name / card_name / value は利用時点のスナップショット。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BenefitUsage {
    pub id: i64,
    pub benefit_id: Option<i64>,
    pub benefit_name: String,
    pub card_name: String,
    pub value: Decimal,
    pub used_on: NaiveDate,
    pub created_at: String,
}

/// 特典作成用DTO
#[derive(Debug, Deserialize)]
pub struct CreateBenefitDto {
    pub card_id: i64,
    pub name: String,
    pub category: String,
    pub value: Decimal,
    pub frequency: Frequency,
    /// 一回限りの特典の期限日（frequencyがone_timeの場合は必須）
    pub expiration_date: Option<NaiveDate>,
    pub reminder_enabled: Option<bool>,
    pub reminder_days_before: Option<i64>,
}

/// 特典更新用DTO
#[derive(Debug, Deserialize)]
pub struct UpdateBenefitDto {
    pub name: Option<String>,
    pub category: Option<String>,
    pub value: Option<Decimal>,
    pub frequency: Option<Frequency>,
    pub reminder_enabled: Option<bool>,
    pub reminder_days_before: Option<i64>,
}

/// 特典の金額集計結果
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ValueTotals {
    /// 利用可能な特典の合計金額
    pub total_available: Decimal,
    /// 使用済みの特典の合計金額
    pub total_used: Decimal,
}

impl Benefit {
    /// 特典を使用済みにした新しいコピーを返す
    ///
    /// # 引数
    /// * `now` - 現在時刻（呼び出し側が明示的に渡す）
    ///
    /// # 戻り値
    /// 使用済みになった特典、または利用可能でない場合はInvalidTransition
    ///
    /// # 備考
    /// スケジュール済みリマインダーのハンドルはクリアされる。外部の通知
    /// スケジューラはハンドルが消えたことをもって通知のキャンセルを行う。
    /// この関数自体はI/Oを行わない。
    pub fn mark_used(&self, now: &DateTime<Tz>) -> AppResult<Benefit> {
        let status = next_status(self.status, Operation::MarkUsed)?;

        Ok(Benefit {
            status,
            reminder_id: None,
            updated_at: now.to_rfc3339(),
            ..self.clone()
        })
    }

    /// 使用済みを取り消した新しいコピーを返す
    ///
    /// # 引数
    /// * `now` - 現在時刻
    ///
    /// # 戻り値
    /// 利用可能に戻った特典、または使用済みでない場合はInvalidTransition
    ///
    /// # 備考
    /// mark_usedでクリアされたリマインダースケジュールは復元しない。
    /// 再スケジュールするかどうかは外部の通知スケジューラの判断に委ねる。
    pub fn undo_mark_used(&self, now: &DateTime<Tz>) -> AppResult<Benefit> {
        let status = next_status(self.status, Operation::UndoMarkUsed)?;

        Ok(Benefit {
            status,
            updated_at: now.to_rfc3339(),
            ..self.clone()
        })
    }

    /// 特典を期限切れにした新しいコピーを返す
    ///
    /// # 引数
    /// * `now` - 現在時刻
    ///
    /// # 戻り値
    /// 期限切れになった特典、または利用可能でない場合はInvalidTransition
    ///
    /// # 備考
    /// ユーザー操作ではなく、期限日と現在日を比較する定期スイープから
    /// 呼ばれることを想定している。
    pub fn mark_expired(&self, now: &DateTime<Tz>) -> AppResult<Benefit> {
        let status = next_status(self.status, Operation::MarkExpired)?;

        Ok(Benefit {
            status,
            reminder_id: None,
            updated_at: now.to_rfc3339(),
            ..self.clone()
        })
    }

    /// リマインダーをスヌーズした新しいコピーを返す
    ///
    /// # 引数
    /// * `until` - スヌーズ解除日
    /// * `now` - 現在時刻
    ///
    /// # 戻り値
    /// スヌーズされた特典、または解除日が本日以前の場合はValidationエラー。
    /// 状態は変化しない。
    pub fn snooze(&self, until: NaiveDate, now: &DateTime<Tz>) -> AppResult<Benefit> {
        validate_snooze(now.date_naive(), until)?;

        Ok(Benefit {
            snoozed_until: Some(until),
            updated_at: now.to_rfc3339(),
            ..self.clone()
        })
    }

    /// 新しい期間にリセットした新しいコピーを返す
    ///
    /// # 引数
    /// * `now` - 現在時刻
    ///
    /// # 戻り値
    /// 新しい期間で利用可能になった特典、または一回限りの特典の場合はエラー
    ///
    /// # 備考
    /// どの状態（利用可能・使用済み・期限切れ）からも実行できる強制リセット。
    /// 期間ウィンドウはPeriod Advancerで再計算され、リマインダー関連の
    /// フィールドはすべてクリアされる。
    pub fn reset_to_new_period(&self, now: &DateTime<Tz>) -> AppResult<Benefit> {
        let status = next_status(self.status, Operation::ResetPeriod)?;

        let window = advance(self.frequency, self.current_period_end).ok_or_else(|| {
            AppError::invalid_transition("一回限りの特典は期間をリセットできません")
        })?;

        Ok(Benefit {
            status,
            current_period_start: window.start,
            current_period_end: window.end,
            next_reset_date: window.next_reset,
            last_reminder_date: None,
            reminder_id: None,
            snoozed_until: None,
            updated_at: now.to_rfc3339(),
            ..self.clone()
        })
    }

    /// 基準日から見た残り日数を取得
    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        days_remaining(today, self.current_period_end)
    }

    /// 基準日から見た緊急度を取得（終端状態の場合はNone）
    pub fn urgency(&self, today: NaiveDate) -> Option<UrgencyTier> {
        classify(self.status, today, self.current_period_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Asia::Tokyo;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_now() -> DateTime<Tz> {
        Tokyo.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
    }

    fn sample_benefit() -> Benefit {
        Benefit {
            id: 1,
            card_id: Some(1),
            card_name: "ゴールドカード".to_string(),
            name: "レストランクレジット".to_string(),
            category: "ダイニング".to_string(),
            value: Decimal::new(1000, 0),
            frequency: Frequency::Monthly,
            status: ItemStatus::Available,
            current_period_start: date(2025, 1, 1),
            current_period_end: date(2025, 1, 31),
            next_reset_date: date(2025, 1, 31),
            reminder_enabled: true,
            reminder_days_before: 3,
            last_reminder_date: None,
            reminder_id: Some("handle-1".to_string()),
            snoozed_until: None,
            created_at: "2025-01-01T00:00:00+09:00".to_string(),
            updated_at: "2025-01-01T00:00:00+09:00".to_string(),
        }
    }

    #[test]
    fn test_mark_used_clears_reminder_handle() {
        let benefit = sample_benefit();
        let used = benefit.mark_used(&test_now()).unwrap();

        assert_eq!(used.status, ItemStatus::Used);
        assert_eq!(used.reminder_id, None);

        // 元のコピーは変更されない
        assert_eq!(benefit.status, ItemStatus::Available);
        assert_eq!(benefit.reminder_id, Some("handle-1".to_string()));
    }

    #[test]
    fn test_mark_used_twice_is_invalid() {
        let used = sample_benefit().mark_used(&test_now()).unwrap();
        let err = used.mark_used(&test_now()).unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn test_undo_mark_used_roundtrip() {
        let benefit = sample_benefit();
        let used = benefit.mark_used(&test_now()).unwrap();
        let restored = used.undo_mark_used(&test_now()).unwrap();

        assert_eq!(restored.status, ItemStatus::Available);

        // リマインダースケジュールは復元されない
        assert_eq!(restored.reminder_id, None);

        // 取り消しの繰り返しはエラーで、状態は壊れない
        assert!(restored.undo_mark_used(&test_now()).is_err());
        assert_eq!(restored.status, ItemStatus::Available);
    }

    #[test]
    fn test_mark_expired_only_from_available() {
        let benefit = sample_benefit();
        let expired = benefit.mark_expired(&test_now()).unwrap();
        assert_eq!(expired.status, ItemStatus::Expired);

        let used = sample_benefit().mark_used(&test_now()).unwrap();
        assert!(used.mark_expired(&test_now()).is_err());
    }

    #[test]
    fn test_reset_always_yields_available() {
        let now = test_now();
        let available = sample_benefit();
        let used = available.mark_used(&now).unwrap();
        let expired = available.mark_expired(&now).unwrap();

        for benefit in [&available, &used, &expired] {
            let reset = benefit.reset_to_new_period(&now).unwrap();
            assert_eq!(reset.status, ItemStatus::Available);
            assert_eq!(reset.last_reminder_date, None);
            assert_eq!(reset.reminder_id, None);
            assert_eq!(reset.snoozed_until, None);
        }
    }

    #[test]
    fn test_reset_advances_period_with_clamping() {
        let now = test_now();

        // 1月31日終了 -> 2月28日終了 -> 3月31日終了
        let benefit = sample_benefit();
        let reset = benefit.reset_to_new_period(&now).unwrap();
        assert_eq!(reset.current_period_start, date(2025, 2, 1));
        assert_eq!(reset.current_period_end, date(2025, 2, 28));
        assert_eq!(reset.next_reset_date, date(2025, 2, 28));

        let reset = reset.reset_to_new_period(&now).unwrap();
        assert_eq!(reset.current_period_end, date(2025, 3, 31));
    }

    #[test]
    fn test_reset_one_time_benefit_fails() {
        let mut benefit = sample_benefit();
        benefit.frequency = Frequency::OneTime;

        assert!(benefit.reset_to_new_period(&test_now()).is_err());
    }

    #[test]
    fn test_snooze_validation() {
        let benefit = sample_benefit();
        let now = test_now();

        // 翌日以降へのスヌーズはOK、状態は変化しない
        let snoozed = benefit.snooze(date(2025, 1, 20), &now).unwrap();
        assert_eq!(snoozed.snoozed_until, Some(date(2025, 1, 20)));
        assert_eq!(snoozed.status, ItemStatus::Available);

        // 過去へのスヌーズはエラーで、元の状態は変化しない
        let err = benefit.snooze(date(2025, 1, 14), &now).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(benefit.snoozed_until, None);
    }

    #[test]
    fn test_urgency_derivation() {
        let mut benefit = sample_benefit();

        // 残り3日 -> 緊急
        benefit.current_period_end = date(2025, 1, 18);
        assert_eq!(
            benefit.urgency(date(2025, 1, 15)),
            Some(UrgencyTier::Urgent)
        );

        // 使用済みのアイテムは分類されない
        let used = benefit.mark_used(&test_now()).unwrap();
        assert_eq!(used.urgency(date(2025, 1, 15)), None);
    }
}
