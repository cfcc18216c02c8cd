use super::models::{Benefit, BenefitUsage, CreateBenefitDto, UpdateBenefitDto, ValueTotals};
use crate::config::preferences::preferences;
use crate::db::decimal_column;
use crate::features::cards;
use crate::features::lifecycle::{initial_window, ItemStatus};
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Asia::Tokyo;
use chrono_tz::Tz;
use log::info;
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;

const BENEFIT_COLUMNS: &str = "id, card_id, card_name, name, category, value, frequency, status,
             current_period_start, current_period_end, next_reset_date,
             reminder_enabled, reminder_days_before, last_reminder_date, reminder_id,
             snoozed_until, created_at, updated_at";

/// 行から特典を復元する
fn map_benefit(row: &Row<'_>) -> rusqlite::Result<Benefit> {
    Ok(Benefit {
        id: row.get(0)?,
        card_id: row.get(1)?,
        card_name: row.get(2)?,
        name: row.get(3)?,
        category: row.get(4)?,
        value: decimal_column(row, 5)?,
        frequency: row.get(6)?,
        status: row.get(7)?,
        current_period_start: row.get(8)?,
        current_period_end: row.get(9)?,
        next_reset_date: row.get(10)?,
        reminder_enabled: row.get::<_, i64>(11)? != 0,
        reminder_days_before: row.get(12)?,
        last_reminder_date: row.get(13)?,
        reminder_id: row.get(14)?,
        snoozed_until: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

/// 特典の可変フィールドをすべて書き戻す
fn persist(conn: &Connection, benefit: &Benefit) -> AppResult<()> {
    conn.execute(
        "UPDATE benefits
         SET card_id = ?1, card_name = ?2, name = ?3, category = ?4, value = ?5,
             frequency = ?6, status = ?7, current_period_start = ?8,
             current_period_end = ?9, next_reset_date = ?10, reminder_enabled = ?11,
             reminder_days_before = ?12, last_reminder_date = ?13, reminder_id = ?14,
             snoozed_until = ?15, updated_at = ?16
         WHERE id = ?17",
        params![
            benefit.card_id,
            benefit.card_name,
            benefit.name,
            benefit.category,
            benefit.value.to_string(),
            benefit.frequency,
            benefit.status,
            benefit.current_period_start,
            benefit.current_period_end,
            benefit.next_reset_date,
            benefit.reminder_enabled as i64,
            benefit.reminder_days_before,
            benefit.last_reminder_date,
            benefit.reminder_id,
            benefit.snoozed_until,
            benefit.updated_at,
            benefit.id,
        ],
    )?;

    Ok(())
}

/// 特典を作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `dto` - 特典作成用DTO
/// * `today` - 作成日（最初の期間ウィンドウの計算に使用）
///
/// # 戻り値
/// 作成された特典、または失敗時はエラー
///
/// # 備考
/// カード名はこの時点でスナップショットとしてコピーされる。
/// リマインダー設定が未指定の場合はアプリ設定のデフォルト値を使う。
pub fn create(conn: &Connection, dto: CreateBenefitDto, today: NaiveDate) -> AppResult<Benefit> {
    // バリデーション
    if dto.name.trim().is_empty() {
        return Err(AppError::validation("特典名は必須です"));
    }
    if dto.value <= Decimal::ZERO {
        return Err(AppError::validation("金額は正の数値である必要があります"));
    }

    // 期間ウィンドウを決定
    let (start, end, next_reset) = match initial_window(dto.frequency, today) {
        Some(window) => (window.start, window.end, window.next_reset),
        None => {
            // 一回限りの特典は期限日の明示指定が必須
            let end = dto.expiration_date.ok_or_else(|| {
                AppError::validation("一回限りの特典には期限日の指定が必要です")
            })?;
            if end < today {
                return Err(AppError::validation(
                    "期限日は本日以降の日付である必要があります",
                ));
            }
            (today, end, end)
        }
    };

    // カード名をスナップショットとしてコピー
    let card = cards::repository::find_by_id(conn, dto.card_id)?;

    // リマインダー設定のデフォルト値を適用
    let prefs = preferences();
    let reminder_enabled = dto
        .reminder_enabled
        .unwrap_or(prefs.reminders_enabled_by_default);
    let reminder_days_before = dto
        .reminder_days_before
        .unwrap_or(prefs.default_reminder_days_before);

    if reminder_days_before < 0 {
        return Err(AppError::validation(
            "リマインダー日数は0以上である必要があります",
        ));
    }

    // JSTで現在時刻を取得
    let now = Utc::now().with_timezone(&Tokyo).to_rfc3339();

    conn.execute(
        "INSERT INTO benefits (card_id, card_name, name, category, value, frequency, status,
             current_period_start, current_period_end, next_reset_date,
             reminder_enabled, reminder_days_before, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'available', ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            dto.card_id,
            card.name,
            dto.name,
            dto.category,
            dto.value.to_string(),
            dto.frequency,
            start,
            end,
            next_reset,
            reminder_enabled as i64,
            reminder_days_before,
            now,
            now
        ],
    )?;

    let id = conn.last_insert_rowid();
    find_by_id(conn, id)
}

/// IDで特典を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 特典ID
///
/// # 戻り値
/// 特典、または失敗時はエラー
pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Benefit> {
    conn.query_row(
        &format!("SELECT {BENEFIT_COLUMNS} FROM benefits WHERE id = ?1"),
        params![id],
        map_benefit,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found("特典"),
        _ => AppError::Database(e.to_string()),
    })
}

/// 特典一覧を取得する（カードと状態でフィルタリング可能）
///
/// # 引数
/// * `conn` - データベース接続
/// * `card_id` - カードフィルター（オプション）
/// * `status` - 状態フィルター（オプション）
///
/// # 戻り値
/// 期限日の昇順に並んだ特典のリスト、または失敗時はエラー
pub fn find_all(
    conn: &Connection,
    card_id: Option<i64>,
    status: Option<ItemStatus>,
) -> AppResult<Vec<Benefit>> {
    let mut query = format!("SELECT {BENEFIT_COLUMNS} FROM benefits WHERE 1=1");

    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    // カードフィルター
    if let Some(c) = card_id {
        query.push_str(" AND card_id = ?");
        params.push(Box::new(c));
    }

    // 状態フィルター
    if let Some(s) = status {
        query.push_str(" AND status = ?");
        params.push(Box::new(s));
    }

    query.push_str(" ORDER BY current_period_end, name");

    let mut stmt = conn.prepare(&query)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let benefits = stmt.query_map(param_refs.as_slice(), map_benefit)?;

    benefits
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// 特典を更新する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 特典ID
/// * `dto` - 特典更新用DTO
///
/// # 戻り値
/// 更新された特典、または失敗時はエラー
///
/// # 備考
/// 状態と期間ウィンドウはここでは変更できない。状態遷移は専用の
/// 操作（mark_used / undo_mark_used / reset_period など）を使う。
/// 周期を変更した場合、現在の期間はそのまま維持され、次回リセット
/// から新しい周期が適用される。
pub fn update(conn: &Connection, id: i64, dto: UpdateBenefitDto) -> AppResult<Benefit> {
    // JSTで現在時刻を取得
    let now = Utc::now().with_timezone(&Tokyo).to_rfc3339();

    // 既存の特典を取得
    let existing = find_by_id(conn, id)?;

    // 更新するフィールドを決定
    let name = dto.name.unwrap_or(existing.name);
    let category = dto.category.unwrap_or(existing.category);
    let value = dto.value.unwrap_or(existing.value);
    let frequency = dto.frequency.unwrap_or(existing.frequency);
    let reminder_enabled = dto.reminder_enabled.unwrap_or(existing.reminder_enabled);
    let reminder_days_before = dto
        .reminder_days_before
        .unwrap_or(existing.reminder_days_before);

    if name.trim().is_empty() {
        return Err(AppError::validation("特典名は必須です"));
    }
    if value <= Decimal::ZERO {
        return Err(AppError::validation("金額は正の数値である必要があります"));
    }
    if reminder_days_before < 0 {
        return Err(AppError::validation(
            "リマインダー日数は0以上である必要があります",
        ));
    }

    conn.execute(
        "UPDATE benefits
         SET name = ?1, category = ?2, value = ?3, frequency = ?4,
             reminder_enabled = ?5, reminder_days_before = ?6, updated_at = ?7
         WHERE id = ?8",
        params![
            name,
            category,
            value.to_string(),
            frequency,
            reminder_enabled as i64,
            reminder_days_before,
            now,
            id
        ],
    )?;

    find_by_id(conn, id)
}

/// 特典を使用済みにする
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 特典ID
/// * `now` - 現在時刻
///
/// # 戻り値
/// 使用済みになった特典、または失敗時はエラー
///
/// # 備考
/// 利用時点のスナップショット（特典名・カード名・金額）を持つ
/// 利用履歴レコードを同時に作成する。
pub fn mark_used(conn: &Connection, id: i64, now: &DateTime<Tz>) -> AppResult<Benefit> {
    let benefit = find_by_id(conn, id)?;
    let used = benefit.mark_used(now)?;

    persist(conn, &used)?;

    // 利用履歴をスナップショット付きで記録
    conn.execute(
        "INSERT INTO benefit_usages (benefit_id, benefit_name, card_name, value, used_on, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            used.id,
            used.name,
            used.card_name,
            used.value.to_string(),
            now.date_naive(),
            now.to_rfc3339()
        ],
    )?;

    info!("特典を使用済みにしました: id={id}");

    Ok(used)
}

/// 特典の使用済みを取り消す
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 特典ID
/// * `now` - 現在時刻
///
/// # 戻り値
/// 利用可能に戻った特典、または失敗時はエラー
///
/// # 備考
/// 直近の利用履歴レコードは削除される。クリア済みのリマインダー
/// スケジュールは復元しない。
pub fn undo_mark_used(conn: &Connection, id: i64, now: &DateTime<Tz>) -> AppResult<Benefit> {
    let benefit = find_by_id(conn, id)?;
    let restored = benefit.undo_mark_used(now)?;

    persist(conn, &restored)?;

    // 直近の利用履歴を取り消す
    conn.execute(
        "DELETE FROM benefit_usages WHERE id = (
             SELECT id FROM benefit_usages WHERE benefit_id = ?1 ORDER BY id DESC LIMIT 1
         )",
        params![id],
    )?;

    Ok(restored)
}

/// 特典の期間をリセットして新しい期間を開始する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 特典ID
/// * `now` - 現在時刻
///
/// # 戻り値
/// 新しい期間で利用可能になった特典、または失敗時はエラー
pub fn reset_period(conn: &Connection, id: i64, now: &DateTime<Tz>) -> AppResult<Benefit> {
    let benefit = find_by_id(conn, id)?;
    let reset = benefit.reset_to_new_period(now)?;

    persist(conn, &reset)?;

    info!(
        "特典の期間をリセットしました: id={id}, 新しい期間 {} 〜 {}",
        reset.current_period_start, reset.current_period_end
    );

    Ok(reset)
}

/// 特典のリマインダーをスヌーズする
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 特典ID
/// * `until` - スヌーズ解除日
/// * `now` - 現在時刻
///
/// # 戻り値
/// スヌーズされた特典、または失敗時はエラー
pub fn snooze(
    conn: &Connection,
    id: i64,
    until: NaiveDate,
    now: &DateTime<Tz>,
) -> AppResult<Benefit> {
    let benefit = find_by_id(conn, id)?;
    let snoozed = benefit.snooze(until, now)?;

    persist(conn, &snoozed)?;

    Ok(snoozed)
}

/// 期限を過ぎた利用可能な特典を期限切れにする（定期スイープ）
///
/// # 引数
/// * `conn` - データベース接続
/// * `now` - 現在時刻
///
/// # 戻り値
/// 期限切れにした件数、または失敗時はエラー
pub fn expire_overdue(conn: &Connection, now: &DateTime<Tz>) -> AppResult<usize> {
    let today = now.date_naive();

    let mut stmt = conn.prepare(&format!(
        "SELECT {BENEFIT_COLUMNS} FROM benefits
         WHERE status = 'available' AND current_period_end < ?1"
    ))?;
    let overdue: Vec<Benefit> = stmt
        .query_map(params![today], map_benefit)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))?;

    let mut count = 0;
    for benefit in overdue {
        let expired = benefit.mark_expired(now)?;
        persist(conn, &expired)?;
        count += 1;
    }

    if count > 0 {
        info!("期限切れスイープ: {count}件の特典を期限切れにしました");
    }

    Ok(count)
}

/// リセット日を過ぎた繰り返し特典を新しい期間に進める（定期スイープ）
///
/// # 引数
/// * `conn` - データベース接続
/// * `now` - 現在時刻
///
/// # 戻り値
/// リセットした件数、または失敗時はエラー
///
/// # 備考
/// 長期間起動されなかった場合に備え、リセット日が本日より前である間は
/// 期間を繰り返し進める。expire_overdueの後に実行すること。
pub fn sweep_resets(conn: &Connection, now: &DateTime<Tz>) -> AppResult<usize> {
    let today = now.date_naive();

    let mut stmt = conn.prepare(&format!(
        "SELECT {BENEFIT_COLUMNS} FROM benefits
         WHERE frequency != 'one_time' AND next_reset_date < ?1"
    ))?;
    let due: Vec<Benefit> = stmt
        .query_map(params![today], map_benefit)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))?;

    let mut count = 0;
    for mut benefit in due {
        while benefit.next_reset_date < today {
            benefit = benefit.reset_to_new_period(now)?;
        }
        persist(conn, &benefit)?;
        count += 1;
    }

    if count > 0 {
        info!("期間リセットスイープ: {count}件の特典を新しい期間に進めました");
    }

    Ok(count)
}

/// リマインダーのスケジュール結果を記録する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 特典ID
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
        "UPDATE benefits SET reminder_id = ?1, last_reminder_date = ?2 WHERE id = ?3",
        params![reminder_id, today, id],
    )?;

    if rows_affected == 0 {
        return Err(AppError::not_found("特典"));
    }

    Ok(())
}

/// 特典を削除する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 特典ID
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
///
/// # 備考
/// 利用履歴はスナップショットを保持したまま残り、表示可能であり続ける。
pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    // 履歴側の参照だけ外す（スナップショットはそのまま）
    conn.execute(
        "UPDATE benefit_usages SET benefit_id = NULL WHERE benefit_id = ?1",
        params![id],
    )?;

    let rows_affected = conn.execute("DELETE FROM benefits WHERE id = ?1", params![id])?;

    if rows_affected == 0 {
        return Err(AppError::not_found("特典"));
    }

    Ok(())
}

/// 特典の金額を状態別に集計する
///
/// # 引数
/// * `conn` - データベース接続
///
/// # 戻り値
/// 利用可能・使用済みそれぞれの合計金額、または失敗時はエラー
pub fn value_totals(conn: &Connection) -> AppResult<ValueTotals> {
    let benefits = find_all(conn, None, None)?;

    let totals = benefits.iter().fold(
        ValueTotals {
            total_available: Decimal::ZERO,
            total_used: Decimal::ZERO,
        },
        |mut acc, benefit| {
            match benefit.status {
                ItemStatus::Available => acc.total_available += benefit.value,
                ItemStatus::Used => acc.total_used += benefit.value,
                ItemStatus::Expired => {}
            }
            acc
        },
    );

    Ok(totals)
}

/// 特典の利用履歴を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `benefit_id` - 特典ID
///
/// # 戻り値
/// 利用日の降順に並んだ利用履歴のリスト、または失敗時はエラー
pub fn find_usages(conn: &Connection, benefit_id: i64) -> AppResult<Vec<BenefitUsage>> {
    let mut stmt = conn.prepare(
        "SELECT id, benefit_id, benefit_name, card_name, value, used_on, created_at
         FROM benefit_usages WHERE benefit_id = ?1 ORDER BY used_on DESC, id DESC",
    )?;

    let usages = stmt.query_map(params![benefit_id], map_usage)?;

    usages
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// すべての利用履歴を取得する
///
/// # 引数
/// * `conn` - データベース接続
///
/// # 戻り値
/// 利用日の降順に並んだ利用履歴のリスト、または失敗時はエラー
pub fn find_all_usages(conn: &Connection) -> AppResult<Vec<BenefitUsage>> {
    let mut stmt = conn.prepare(
        "SELECT id, benefit_id, benefit_name, card_name, value, used_on, created_at
         FROM benefit_usages ORDER BY used_on DESC, id DESC",
    )?;

    let usages = stmt.query_map([], map_usage)?;

    usages
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// 行から利用履歴を復元する
fn map_usage(row: &Row<'_>) -> rusqlite::Result<BenefitUsage> {
    Ok(BenefitUsage {
        id: row.get(0)?,
        benefit_id: row.get(1)?,
        benefit_name: row.get(2)?,
        card_name: row.get(3)?,
        value: decimal_column(row, 4)?,
        used_on: row.get(5)?,
        created_at: row.get(6)?,
    })
}
