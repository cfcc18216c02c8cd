use crate::features::lifecycle::{
    classify_days, days_remaining, validate_snooze, Frequency, UrgencyTier,
};
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Months, NaiveDate};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// サブスクリプションデータモデル
///
/// 期間の概念は持たず、次回更新日だけを追跡する。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Subscription {
    pub id: i64,
    pub name: String,
    pub amount: Decimal,
    pub frequency: Frequency,
    pub next_renewal_date: NaiveDate,
    pub category: String,
    pub is_active: bool,
    pub reminder_enabled: bool,
    pub reminder_days_before: i64,
    pub last_reminder_date: Option<NaiveDate>,
    pub reminder_id: Option<String>,
    pub snoozed_until: Option<NaiveDate>,
    pub created_at: String,
    pub updated_at: String,
}

/// サブスクリプション作成用DTO
#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionDto {
    pub name: String,
    pub amount: Decimal,
    pub frequency: Frequency,
    pub next_renewal_date: NaiveDate,
    pub category: String,
    pub reminder_enabled: Option<bool>,
    pub reminder_days_before: Option<i64>,
}

/// サブスクリプション更新用DTO
#[derive(Debug, Deserialize)]
pub struct UpdateSubscriptionDto {
    pub name: Option<String>,
    pub amount: Option<Decimal>,
    pub frequency: Option<Frequency>,
    pub next_renewal_date: Option<NaiveDate>,
    pub category: Option<String>,
    pub reminder_enabled: Option<bool>,
    pub reminder_days_before: Option<i64>,
}

impl Subscription {
    /// サブスクリプションを解約した新しいコピーを返す
    ///
    /// # 引数
    /// * `now` - 現在時刻
    ///
    /// # 戻り値
    /// 解約されたサブスクリプション、またはすでに解約済みの場合はInvalidTransition
    ///
    /// # 備考
    /// next_renewal_date は保持される。再開時に中断したところから
    /// 再開できるようにするため。
    pub fn cancel(&self, now: &DateTime<Tz>) -> AppResult<Subscription> {
        if !self.is_active {
            return Err(AppError::invalid_transition(
                "すでに解約済みのサブスクリプションです",
            ));
        }

        Ok(Subscription {
            is_active: false,
            reminder_id: None,
            updated_at: now.to_rfc3339(),
            ..self.clone()
        })
    }

    /// サブスクリプションを再開した新しいコピーを返す
    ///
    /// # 引数
    /// * `next_renewal_override` - 次回更新日の明示指定（省略時は既存の日付を維持）
    /// * `now` - 現在時刻
    ///
    /// # 戻り値
    /// 再開されたサブスクリプション、またはすでに有効な場合はInvalidTransition
    ///
    /// # 備考
    /// 明示指定がない場合、既存の next_renewal_date が過去であっても
    /// そのまま維持される。その場合は即座に期限超過として扱われ、
    /// 更新日を進めるのは呼び出し側（またはスイープ）の責務となる。
    pub fn reactivate(
        &self,
        next_renewal_override: Option<NaiveDate>,
        now: &DateTime<Tz>,
    ) -> AppResult<Subscription> {
        if self.is_active {
            return Err(AppError::invalid_transition(
                "すでに有効なサブスクリプションです",
            ));
        }

        Ok(Subscription {
            is_active: true,
            next_renewal_date: next_renewal_override.unwrap_or(self.next_renewal_date),
            updated_at: now.to_rfc3339(),
            ..self.clone()
        })
    }

    /// 次回更新日を1周期先に進めた新しいコピーを返す
    ///
    /// # 引数
    /// * `now` - 現在時刻
    ///
    /// # 戻り値
    /// 更新日が進んだサブスクリプション、または失敗時はエラー
    ///
    /// # 備考
    /// 月をまたぐ加算は有効な月末日に丸められる。
    pub fn advance_renewal(&self, now: &DateTime<Tz>) -> AppResult<Subscription> {
        let months = self.frequency.months().ok_or_else(|| {
            AppError::validation("サブスクリプションには繰り返し周期が必要です")
        })?;

        let next = self
            .next_renewal_date
            .checked_add_months(Months::new(months))
            .ok_or_else(|| AppError::validation("更新日の計算に失敗しました"))?;

        Ok(Subscription {
            next_renewal_date: next,
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
    /// スヌーズされたサブスクリプション、または解除日が本日以前の場合はValidationエラー
    pub fn snooze(&self, until: NaiveDate, now: &DateTime<Tz>) -> AppResult<Subscription> {
        validate_snooze(now.date_naive(), until)?;

        Ok(Subscription {
            snoozed_until: Some(until),
            updated_at: now.to_rfc3339(),
            ..self.clone()
        })
    }

    /// 1ヶ月あたりの金額に換算する
    pub fn monthly_amount(&self) -> Decimal {
        match self.frequency {
            Frequency::Monthly => self.amount,
            Frequency::Quarterly => self.amount / Decimal::from(3),
            Frequency::Semiannual => self.amount / Decimal::from(6),
            Frequency::Annual => self.amount / Decimal::from(12),
            Frequency::OneTime => Decimal::ZERO,
        }
    }

    /// 基準日から見た更新日までの残り日数を取得
    pub fn days_until_renewal(&self, today: NaiveDate) -> i64 {
        days_remaining(today, self.next_renewal_date)
    }

    /// 基準日から見た緊急度を取得（解約済みの場合はNone）
    pub fn urgency(&self, today: NaiveDate) -> Option<UrgencyTier> {
        if !self.is_active {
            return None;
        }

        Some(classify_days(self.days_until_renewal(today)))
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

    fn sample_subscription() -> Subscription {
        Subscription {
            id: 1,
            name: "動画配信サービス".to_string(),
            amount: Decimal::new(1980, 0),
            frequency: Frequency::Monthly,
            next_renewal_date: date(2025, 2, 1),
            category: "エンタメ".to_string(),
            is_active: true,
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
    fn test_cancel_preserves_renewal_date() {
        let sub = sample_subscription();
        let canceled = sub.cancel(&test_now()).unwrap();

        assert!(!canceled.is_active);
        assert_eq!(canceled.next_renewal_date, date(2025, 2, 1));
        assert_eq!(canceled.reminder_id, None);

        // 二重解約はエラー
        assert!(canceled.cancel(&test_now()).is_err());
    }

    #[test]
    fn test_reactivate_without_override_keeps_date() {
        let canceled = sample_subscription().cancel(&test_now()).unwrap();
        let reactivated = canceled.reactivate(None, &test_now()).unwrap();

        assert!(reactivated.is_active);
        assert_eq!(reactivated.next_renewal_date, date(2025, 2, 1));

        // すでに有効なものを再開するのはエラー
        assert!(reactivated.reactivate(None, &test_now()).is_err());
    }

    #[test]
    fn test_reactivate_with_override() {
        let canceled = sample_subscription().cancel(&test_now()).unwrap();
        let reactivated = canceled
            .reactivate(Some(date(2025, 3, 1)), &test_now())
            .unwrap();

        assert_eq!(reactivated.next_renewal_date, date(2025, 3, 1));
    }

    #[test]
    fn test_reactivate_with_past_date_reads_past_due() {
        // 更新日が過去のまま再開した場合、即座に期限超過として扱われる
        let mut sub = sample_subscription();
        sub.next_renewal_date = date(2024, 12, 1);
        let canceled = sub.cancel(&test_now()).unwrap();
        let reactivated = canceled.reactivate(None, &test_now()).unwrap();

        assert_eq!(
            reactivated.urgency(date(2025, 1, 15)),
            Some(UrgencyTier::PastDue)
        );
    }

    #[test]
    fn test_advance_renewal_clamps_month_end() {
        let mut sub = sample_subscription();
        sub.next_renewal_date = date(2025, 1, 31);

        let advanced = sub.advance_renewal(&test_now()).unwrap();
        assert_eq!(advanced.next_renewal_date, date(2025, 2, 28));
    }

    #[test]
    fn test_monthly_amount_normalization() {
        let mut sub = sample_subscription();

        sub.amount = Decimal::new(1200, 0);
        sub.frequency = Frequency::Annual;
        assert_eq!(sub.monthly_amount(), Decimal::new(100, 0));

        sub.frequency = Frequency::Quarterly;
        sub.amount = Decimal::new(300, 0);
        assert_eq!(sub.monthly_amount(), Decimal::new(100, 0));
    }

    #[test]
    fn test_urgency_for_canceled_is_none() {
        let canceled = sample_subscription().cancel(&test_now()).unwrap();
        assert_eq!(canceled.urgency(date(2025, 1, 15)), None);

        let active = sample_subscription();
        assert_eq!(
            active.urgency(date(2025, 1, 30)),
            Some(UrgencyTier::Urgent)
        );
    }
}
