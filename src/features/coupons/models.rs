use crate::features::lifecycle::{
    classify, days_remaining, next_status, validate_snooze, ItemStatus, Operation, UrgencyTier,
};
use crate::shared::errors::AppResult;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// クーポンデータモデル
///
/// 繰り返しのない一回限りの割引。単一の期限日だけを追跡し、
/// 期間のリセットは存在しない。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Coupon {
    pub id: i64,
    pub name: String,
    pub merchant: String,
    pub value: Decimal,
    pub expiration_date: NaiveDate,
    pub status: ItemStatus,
    pub reminder_enabled: bool,
    pub reminder_days_before: i64,
    pub last_reminder_date: Option<NaiveDate>,
    pub reminder_id: Option<String>,
    pub snoozed_until: Option<NaiveDate>,
    pub created_at: String,
    pub updated_at: String,
}

/// クーポン作成用DTO
#[derive(Debug, Deserialize)]
pub struct CreateCouponDto {
    pub name: String,
    pub merchant: String,
    pub value: Decimal,
    pub expiration_date: NaiveDate,
    pub reminder_enabled: Option<bool>,
    pub reminder_days_before: Option<i64>,
}

/// クーポン更新用DTO
#[derive(Debug, Deserialize)]
pub struct UpdateCouponDto {
    pub name: Option<String>,
    pub merchant: Option<String>,
    pub value: Option<Decimal>,
    pub expiration_date: Option<NaiveDate>,
    pub reminder_enabled: Option<bool>,
    pub reminder_days_before: Option<i64>,
}

impl Coupon {
    /// クーポンを使用済みにした新しいコピーを返す
    ///
    /// # 引数
    /// * `now` - 現在時刻
    ///
    /// # 戻り値
    /// 使用済みになったクーポン、または利用可能でない場合はInvalidTransition
    pub fn mark_used(&self, now: &DateTime<Tz>) -> AppResult<Coupon> {
        let status = next_status(self.status, Operation::MarkUsed)?;

        Ok(Coupon {
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
    /// 利用可能に戻ったクーポン、または使用済みでない場合はInvalidTransition
    pub fn undo_mark_used(&self, now: &DateTime<Tz>) -> AppResult<Coupon> {
        let status = next_status(self.status, Operation::UndoMarkUsed)?;

        Ok(Coupon {
            status,
            updated_at: now.to_rfc3339(),
            ..self.clone()
        })
    }

    /// クーポンを期限切れにした新しいコピーを返す
    ///
    /// # 引数
    /// * `now` - 現在時刻
    ///
    /// # 戻り値
    /// 期限切れになったクーポン、または利用可能でない場合はInvalidTransition
    pub fn mark_expired(&self, now: &DateTime<Tz>) -> AppResult<Coupon> {
        let status = next_status(self.status, Operation::MarkExpired)?;

        Ok(Coupon {
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
    /// スヌーズされたクーポン、または解除日が本日以前の場合はValidationエラー
    pub fn snooze(&self, until: NaiveDate, now: &DateTime<Tz>) -> AppResult<Coupon> {
        validate_snooze(now.date_naive(), until)?;

        Ok(Coupon {
            snoozed_until: Some(until),
            updated_at: now.to_rfc3339(),
            ..self.clone()
        })
    }

    /// 基準日から見た残り日数を取得
    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        days_remaining(today, self.expiration_date)
    }

    /// 基準日から見た緊急度を取得（終端状態の場合はNone）
    pub fn urgency(&self, today: NaiveDate) -> Option<UrgencyTier> {
        classify(self.status, today, self.expiration_date)
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

    fn sample_coupon() -> Coupon {
        Coupon {
            id: 1,
            name: "初回注文500円引き".to_string(),
            merchant: "デリバリーサービス".to_string(),
            value: Decimal::new(500, 0),
            expiration_date: date(2025, 1, 31),
            status: ItemStatus::Available,
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
    fn test_mark_used_and_undo_roundtrip() {
        let coupon = sample_coupon();
        let used = coupon.mark_used(&test_now()).unwrap();

        assert_eq!(used.status, ItemStatus::Used);
        assert_eq!(used.reminder_id, None);

        let restored = used.undo_mark_used(&test_now()).unwrap();
        assert_eq!(restored.status, ItemStatus::Available);

        // 取り消しの繰り返しはエラー
        assert!(restored.undo_mark_used(&test_now()).is_err());
    }

    #[test]
    fn test_used_coupon_is_not_reclassified_as_expired() {
        let used = sample_coupon().mark_used(&test_now()).unwrap();

        // 期限を過ぎていても使用済みのまま
        assert!(used.mark_expired(&test_now()).is_err());
        assert_eq!(used.urgency(date(2025, 2, 15)), None);
    }

    #[test]
    fn test_urgency_from_expiration_date() {
        let coupon = sample_coupon();

        assert_eq!(
            coupon.urgency(date(2025, 1, 31)),
            Some(UrgencyTier::DueToday)
        );
        assert_eq!(coupon.urgency(date(2025, 1, 29)), Some(UrgencyTier::Urgent));
        assert_eq!(
            coupon.urgency(date(2025, 1, 26)),
            Some(UrgencyTier::ExpiringSoon)
        );
        assert_eq!(coupon.urgency(date(2025, 1, 1)), Some(UrgencyTier::Safe));
        assert_eq!(coupon.urgency(date(2025, 2, 1)), Some(UrgencyTier::PastDue));
    }

    #[test]
    fn test_snooze_rejects_past_dates() {
        let coupon = sample_coupon();

        assert!(coupon.snooze(date(2025, 1, 10), &test_now()).is_err());

        let snoozed = coupon.snooze(date(2025, 1, 20), &test_now()).unwrap();
        assert_eq!(snoozed.snoozed_until, Some(date(2025, 1, 20)));
    }
}
