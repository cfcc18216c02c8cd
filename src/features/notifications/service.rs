use super::models::{ItemKind, ReminderRequest};
use crate::features::benefits::models::Benefit;
use crate::features::coupons::models::Coupon;
use crate::features::lifecycle::days_remaining;
use crate::features::subscriptions::models::Subscription;
use chrono::NaiveDate;
use uuid::Uuid;

/// リマインダーを発火すべきかどうかを判定する
///
/// # 引数
/// * `enabled` - リマインダーが有効か
/// * `days_before` - 期限の何日前から通知するか
/// * `last_reminder_date` - 最後に通知した日
/// * `snoozed_until` - スヌーズ解除日
/// * `days_left` - 期限までの残り日数
/// * `today` - 基準日
///
/// # 判定規則
/// - リマインダーが無効なら発火しない
/// - 期限超過（残り日数が負）のアイテムには発火しない。期限切れへの
///   遷移はスイープの責務で、通知の対象ではない
/// - 残り日数が days_before を超えていれば発火しない
/// - 同じ日に二重に発火しない
/// - スヌーズ解除日が未来の間は発火しない
fn reminder_due(
    enabled: bool,
    days_before: i64,
    last_reminder_date: Option<NaiveDate>,
    snoozed_until: Option<NaiveDate>,
    days_left: i64,
    today: NaiveDate,
) -> bool {
    if !enabled {
        return false;
    }
    if days_left < 0 || days_left > days_before {
        return false;
    }
    if last_reminder_date == Some(today) {
        return false;
    }
    if let Some(until) = snoozed_until {
        if until > today {
            return false;
        }
    }

    true
}

/// 本日発火すべきリマインダー要求の一覧を計画する
///
/// # 引数
/// * `benefits` - 特典の一覧
/// * `subscriptions` - サブスクリプションの一覧
/// * `coupons` - クーポンの一覧
/// * `today` - 基準日
///
/// # 戻り値
/// リマインダー要求のリスト
///
/// # 備考
/// 純粋な計画関数であり、I/Oは行わない。スケジュールに成功した要求は
/// 各リポジトリの record_reminder_scheduled で記録すること。
/// 終端状態のアイテム（使用済み・期限切れ・解約済み）は対象外。
pub fn plan_reminders(
    benefits: &[Benefit],
    subscriptions: &[Subscription],
    coupons: &[Coupon],
    today: NaiveDate,
) -> Vec<ReminderRequest> {
    let mut requests = Vec::new();

    for benefit in benefits {
        if benefit.status.is_terminal() {
            continue;
        }
        let days_left = days_remaining(today, benefit.current_period_end);
        if reminder_due(
            benefit.reminder_enabled,
            benefit.reminder_days_before,
            benefit.last_reminder_date,
            benefit.snoozed_until,
            days_left,
            today,
        ) {
            requests.push(ReminderRequest {
                kind: ItemKind::Benefit,
                item_id: benefit.id,
                title: format!(
                    "{}の特典「{}」の期限まであと{}日です",
                    benefit.card_name, benefit.name, days_left
                ),
                fire_on: today,
                reminder_id: Uuid::new_v4().to_string(),
            });
        }
    }

    for sub in subscriptions {
        if !sub.is_active {
            continue;
        }
        let days_left = days_remaining(today, sub.next_renewal_date);
        if reminder_due(
            sub.reminder_enabled,
            sub.reminder_days_before,
            sub.last_reminder_date,
            sub.snoozed_until,
            days_left,
            today,
        ) {
            requests.push(ReminderRequest {
                kind: ItemKind::Subscription,
                item_id: sub.id,
                title: format!("「{}」の更新まであと{}日です", sub.name, days_left),
                fire_on: today,
                reminder_id: Uuid::new_v4().to_string(),
            });
        }
    }

    for coupon in coupons {
        if coupon.status.is_terminal() {
            continue;
        }
        let days_left = days_remaining(today, coupon.expiration_date);
        if reminder_due(
            coupon.reminder_enabled,
            coupon.reminder_days_before,
            coupon.last_reminder_date,
            coupon.snoozed_until,
            days_left,
            today,
        ) {
            requests.push(ReminderRequest {
                kind: ItemKind::Coupon,
                item_id: coupon.id,
                title: format!(
                    "{}のクーポン「{}」の期限まであと{}日です",
                    coupon.merchant, coupon.name, days_left
                ),
                fire_on: today,
                reminder_id: Uuid::new_v4().to_string(),
            });
        }
    }

    requests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::lifecycle::{Frequency, ItemStatus};
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_benefit(end: NaiveDate) -> Benefit {
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
            current_period_end: end,
            next_reset_date: end,
            reminder_enabled: true,
            reminder_days_before: 3,
            last_reminder_date: None,
            reminder_id: None,
            snoozed_until: None,
            created_at: "2025-01-01T00:00:00+09:00".to_string(),
            updated_at: "2025-01-01T00:00:00+09:00".to_string(),
        }
    }

    #[test]
    fn test_reminder_due_within_window() {
        let today = date(2025, 1, 15);

        // 残り3日・3日前通知 -> 発火
        let benefit = sample_benefit(date(2025, 1, 18));
        let requests = plan_reminders(&[benefit], &[], &[], today);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].kind, ItemKind::Benefit);
        assert_eq!(requests[0].fire_on, today);
        assert!(requests[0].title.contains("レストランクレジット"));
    }

    #[test]
    fn test_reminder_not_due_outside_window() {
        let today = date(2025, 1, 15);

        // 残り10日・3日前通知 -> 発火しない
        let benefit = sample_benefit(date(2025, 1, 25));
        assert!(plan_reminders(&[benefit], &[], &[], today).is_empty());
    }

    #[test]
    fn test_reminder_not_due_for_past_due_items() {
        let today = date(2025, 1, 15);

        // 期限超過のアイテムには発火しない（スイープの対象）
        let benefit = sample_benefit(date(2025, 1, 10));
        assert!(plan_reminders(&[benefit], &[], &[], today).is_empty());
    }

    #[test]
    fn test_reminder_suppressed_same_day() {
        let today = date(2025, 1, 15);

        // 本日すでに通知済み -> 発火しない
        let mut benefit = sample_benefit(date(2025, 1, 18));
        benefit.last_reminder_date = Some(today);
        assert!(plan_reminders(&[benefit], &[], &[], today).is_empty());

        // 昨日の通知なら今日も発火する
        let mut benefit = sample_benefit(date(2025, 1, 18));
        benefit.last_reminder_date = Some(date(2025, 1, 14));
        assert_eq!(plan_reminders(&[benefit], &[], &[], today).len(), 1);
    }

    #[test]
    fn test_reminder_suppressed_while_snoozed() {
        let today = date(2025, 1, 15);

        // スヌーズ解除日が未来 -> 発火しない
        let mut benefit = sample_benefit(date(2025, 1, 18));
        benefit.snoozed_until = Some(date(2025, 1, 17));
        assert!(plan_reminders(&[benefit.clone()], &[], &[], today).is_empty());

        // スヌーズ解除日を迎えたら発火する
        assert_eq!(
            plan_reminders(&[benefit], &[], &[], date(2025, 1, 17)).len(),
            1
        );
    }

    #[test]
    fn test_reminder_skips_terminal_and_disabled_items() {
        let today = date(2025, 1, 15);

        // 使用済みのアイテムには発火しない
        let mut used = sample_benefit(date(2025, 1, 18));
        used.status = ItemStatus::Used;
        assert!(plan_reminders(&[used], &[], &[], today).is_empty());

        // リマインダー無効のアイテムには発火しない
        let mut disabled = sample_benefit(date(2025, 1, 18));
        disabled.reminder_enabled = false;
        assert!(plan_reminders(&[disabled], &[], &[], today).is_empty());
    }

    #[test]
    fn test_reminder_due_today_fires() {
        let today = date(2025, 1, 15);

        // 期限日当日も発火する
        let benefit = sample_benefit(today);
        let requests = plan_reminders(&[benefit], &[], &[], today);
        assert_eq!(requests.len(), 1);
        assert!(requests[0].title.contains("あと0日"));
    }

    #[test]
    fn test_unique_reminder_handles() {
        let today = date(2025, 1, 15);

        let mut benefit2 = sample_benefit(date(2025, 1, 18));
        benefit2.id = 2;
        let requests = plan_reminders(
            &[sample_benefit(date(2025, 1, 18)), benefit2],
            &[],
            &[],
            today,
        );

        assert_eq!(requests.len(), 2);
        assert_ne!(requests[0].reminder_id, requests[1].reminder_id);
    }
}
