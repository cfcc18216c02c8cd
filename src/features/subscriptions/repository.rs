use super::models::{CreateSubscriptionDto, Subscription, UpdateSubscriptionDto};
use crate::config::preferences::preferences;
use crate::db::decimal_column;
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Asia::Tokyo;
use chrono_tz::Tz;
use log::info;
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;

const SUBSCRIPTION_COLUMNS: &str = "id, name, amount, frequency, next_renewal_date, category,
             is_active, reminder_enabled, reminder_days_before, last_reminder_date,
             reminder_id, snoozed_until, created_at, updated_at";

/// 行からサブスクリプションを復元する
fn map_subscription(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        name: row.get(1)?,
        amount: decimal_column(row, 2)?,
        frequency: row.get(3)?,
        next_renewal_date: row.get(4)?,
        category: row.get(5)?,
        is_active: row.get::<_, i64>(6)? != 0,
        reminder_enabled: row.get::<_, i64>(7)? != 0,
        reminder_days_before: row.get(8)?,
        last_reminder_date: row.get(9)?,
        reminder_id: row.get(10)?,
        snoozed_until: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// サブスクリプションの可変フィールドをすべて書き戻す
fn persist(conn: &Connection, sub: &Subscription) -> AppResult<()> {
    conn.execute(
        "UPDATE subscriptions
         SET name = ?1, amount = ?2, frequency = ?3, next_renewal_date = ?4, category = ?5,
             is_active = ?6, reminder_enabled = ?7, reminder_days_before = ?8,
             last_reminder_date = ?9, reminder_id = ?10, snoozed_until = ?11, updated_at = ?12
         WHERE id = ?13",
        params![
            sub.name,
            sub.amount.to_string(),
            sub.frequency,
            sub.next_renewal_date,
            sub.category,
            sub.is_active as i64,
            sub.reminder_enabled as i64,
            sub.reminder_days_before,
            sub.last_reminder_date,
            sub.reminder_id,
            sub.snoozed_until,
            sub.updated_at,
            sub.id,
        ],
    )?;

    Ok(())
}

/// サブスクリプションを作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `dto` - サブスクリプション作成用DTO
///
/// # 戻り値
/// 作成されたサブスクリプション、または失敗時はエラー
pub fn create(conn: &Connection, dto: CreateSubscriptionDto) -> AppResult<Subscription> {
    // バリデーション: 金額は正の数値
    if dto.amount <= Decimal::ZERO {
        return Err(AppError::validation("金額は正の数値である必要があります"));
    }
    if dto.name.trim().is_empty() {
        return Err(AppError::validation("サービス名は必須です"));
    }
    // 一回限りはサブスクリプションとして意味を持たない
    if !dto.frequency.is_recurring() {
        return Err(AppError::validation(
            "サブスクリプションには繰り返し周期が必要です",
        ));
    }

    // リマインダー設定のデフォルト値を適用
    let prefs = preferences();
    let reminder_enabled = dto
        .reminder_enabled
        .unwrap_or(prefs.reminders_enabled_by_default);
    let reminder_days_before = dto
        .reminder_days_before
        .unwrap_or(prefs.default_reminder_days_before);

    // JSTで現在時刻を取得
    let now = Utc::now().with_timezone(&Tokyo).to_rfc3339();

    conn.execute(
        "INSERT INTO subscriptions (name, amount, frequency, next_renewal_date, category,
             is_active, reminder_enabled, reminder_days_before, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8, ?9)",
        params![
            dto.name,
            dto.amount.to_string(),
            dto.frequency,
            dto.next_renewal_date,
            dto.category,
            reminder_enabled as i64,
            reminder_days_before,
            now,
            now
        ],
    )?;

    let id = conn.last_insert_rowid();
    find_by_id(conn, id)
}

/// IDでサブスクリプションを取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
///
/// # 戻り値
/// サブスクリプション、または失敗時はエラー
pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Subscription> {
    conn.query_row(
        &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?1"),
        params![id],
        map_subscription,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found("サブスクリプション"),
        _ => AppError::Database(e.to_string()),
    })
}

/// サブスクリプション一覧を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `active_only` - 有効なサブスクリプションのみを取得するか
///
/// # 戻り値
/// サブスクリプションのリスト、または失敗時はエラー
pub fn find_all(conn: &Connection, active_only: bool) -> AppResult<Vec<Subscription>> {
    let query = if active_only {
        format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE is_active = 1 ORDER BY name"
        )
    } else {
        format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions ORDER BY name")
    };

    let mut stmt = conn.prepare(&query)?;
    let subscriptions = stmt.query_map([], map_subscription)?;

    subscriptions
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// サブスクリプションを更新する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
/// * `dto` - サブスクリプション更新用DTO
///
/// # 戻り値
/// 更新されたサブスクリプション、または失敗時はエラー
pub fn update(conn: &Connection, id: i64, dto: UpdateSubscriptionDto) -> AppResult<Subscription> {
    // バリデーション: 金額が指定されている場合は正の数値
    if let Some(amount) = dto.amount {
        if amount <= Decimal::ZERO {
            return Err(AppError::validation("金額は正の数値である必要があります"));
        }
    }
    if let Some(frequency) = dto.frequency {
        if !frequency.is_recurring() {
            return Err(AppError::validation(
                "サブスクリプションには繰り返し周期が必要です",
            ));
        }
    }

    // JSTで現在時刻を取得
    let now = Utc::now().with_timezone(&Tokyo).to_rfc3339();

    // 既存のサブスクリプションを取得
    let existing = find_by_id(conn, id)?;

    // 更新するフィールドを決定
    let name = dto.name.unwrap_or(existing.name);
    let amount = dto.amount.unwrap_or(existing.amount);
    let frequency = dto.frequency.unwrap_or(existing.frequency);
    let next_renewal_date = dto.next_renewal_date.unwrap_or(existing.next_renewal_date);
    let category = dto.category.unwrap_or(existing.category);
    let reminder_enabled = dto.reminder_enabled.unwrap_or(existing.reminder_enabled);
    let reminder_days_before = dto
        .reminder_days_before
        .unwrap_or(existing.reminder_days_before);

    conn.execute(
        "UPDATE subscriptions
         SET name = ?1, amount = ?2, frequency = ?3, next_renewal_date = ?4, category = ?5,
             reminder_enabled = ?6, reminder_days_before = ?7, updated_at = ?8
         WHERE id = ?9",
        params![
            name,
            amount.to_string(),
            frequency,
            next_renewal_date,
            category,
            reminder_enabled as i64,
            reminder_days_before,
            now,
            id
        ],
    )?;

    find_by_id(conn, id)
}

/// サブスクリプションを解約する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
/// * `now` - 現在時刻
///
/// # 戻り値
/// 解約されたサブスクリプション、または失敗時はエラー
pub fn cancel(conn: &Connection, id: i64, now: &DateTime<Tz>) -> AppResult<Subscription> {
    let sub = find_by_id(conn, id)?;
    let canceled = sub.cancel(now)?;

    persist(conn, &canceled)?;

    info!("サブスクリプションを解約しました: id={id}");

    Ok(canceled)
}

/// サブスクリプションを再開する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
/// * `next_renewal_override` - 次回更新日の明示指定（省略時は既存の日付を維持）
/// * `now` - 現在時刻
///
/// # 戻り値
/// 再開されたサブスクリプション、または失敗時はエラー
pub fn reactivate(
    conn: &Connection,
    id: i64,
    next_renewal_override: Option<NaiveDate>,
    now: &DateTime<Tz>,
) -> AppResult<Subscription> {
    let sub = find_by_id(conn, id)?;
    let reactivated = sub.reactivate(next_renewal_override, now)?;

    persist(conn, &reactivated)?;

    info!("サブスクリプションを再開しました: id={id}");

    Ok(reactivated)
}

/// サブスクリプションのリマインダーをスヌーズする
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
/// * `until` - スヌーズ解除日
/// * `now` - 現在時刻
///
/// # 戻り値
/// スヌーズされたサブスクリプション、または失敗時はエラー
pub fn snooze(
    conn: &Connection,
    id: i64,
    until: NaiveDate,
    now: &DateTime<Tz>,
) -> AppResult<Subscription> {
    let sub = find_by_id(conn, id)?;
    let snoozed = sub.snooze(until, now)?;

    persist(conn, &snoozed)?;

    Ok(snoozed)
}

/// 更新日を過ぎた有効なサブスクリプションの更新日を進める（定期スイープ）
///
/// # 引数
/// * `conn` - データベース接続
/// * `now` - 現在時刻
///
/// # 戻り値
/// 更新日を進めた件数、または失敗時はエラー
pub fn sweep_renewals(conn: &Connection, now: &DateTime<Tz>) -> AppResult<usize> {
    let today = now.date_naive();

    let mut stmt = conn.prepare(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
         WHERE is_active = 1 AND next_renewal_date < ?1"
    ))?;
    let due: Vec<Subscription> = stmt
        .query_map(params![today], map_subscription)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))?;

    let mut count = 0;
    for mut sub in due {
        while sub.next_renewal_date < today {
            sub = sub.advance_renewal(now)?;
        }
        persist(conn, &sub)?;
        count += 1;
    }

    if count > 0 {
        info!("更新日スイープ: {count}件のサブスクリプションの更新日を進めました");
    }

    Ok(count)
}

/// リマインダーのスケジュール結果を記録する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
/// * `reminder_id` - 外部スケジューラが発行したリマインダーハンドル
/// * `today` - 基準日
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
pub fn record_reminder_scheduled(
    conn: &Connection,
    id: i64,
    reminder_id: &str,
    today: NaiveDate,
) -> AppResult<()> {
    let rows_affected = conn.execute(
        "UPDATE subscriptions SET reminder_id = ?1, last_reminder_date = ?2 WHERE id = ?3",
        params![reminder_id, today, id],
    )?;

    if rows_affected == 0 {
        return Err(AppError::not_found("サブスクリプション"));
    }

    Ok(())
}

/// サブスクリプションを削除する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    let rows_affected = conn.execute("DELETE FROM subscriptions WHERE id = ?1", params![id])?;

    if rows_affected == 0 {
        return Err(AppError::not_found("サブスクリプション"));
    }

    Ok(())
}

/// 有効なサブスクリプションの月額合計を計算する
///
/// # 引数
/// * `conn` - データベース接続
///
/// # 戻り値
/// 月額換算の合計金額、または失敗時はエラー
pub fn calculate_monthly_total(conn: &Connection) -> AppResult<Decimal> {
    let subscriptions = find_all(conn, true)?;

    let total = subscriptions
        .iter()
        .fold(Decimal::ZERO, |acc, sub| acc + sub.monthly_amount());

    Ok(total)
}

/// 指定日数以内に更新を迎える有効なサブスクリプションを取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `within_days` - 何日以内の更新を対象とするか
/// * `today` - 基準日
///
/// # 戻り値
/// 更新日の昇順に並んだサブスクリプションのリスト、または失敗時はエラー
pub fn find_due_within(
    conn: &Connection,
    within_days: i64,
    today: NaiveDate,
) -> AppResult<Vec<Subscription>> {
    let subscriptions = find_all(conn, true)?;

    let mut due: Vec<Subscription> = subscriptions
        .into_iter()
        .filter(|sub| sub.days_until_renewal(today) <= within_days)
        .collect();

    due.sort_by_key(|sub| sub.next_renewal_date);

    Ok(due)
}
