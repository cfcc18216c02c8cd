use super::models::{Coupon, CreateCouponDto, UpdateCouponDto};
use crate::config::preferences::preferences;
use crate::db::decimal_column;
use crate::features::lifecycle::ItemStatus;
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Asia::Tokyo;
use chrono_tz::Tz;
use log::info;
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;

const COUPON_COLUMNS: &str = "id, name, merchant, value, expiration_date, status,
             reminder_enabled, reminder_days_before, last_reminder_date, reminder_id,
             snoozed_until, created_at, updated_at";

/// 行からクーポンを復元する
fn map_coupon(row: &Row<'_>) -> rusqlite::Result<Coupon> {
    Ok(Coupon {
        id: row.get(0)?,
        name: row.get(1)?,
        merchant: row.get(2)?,
        value: decimal_column(row, 3)?,
        expiration_date: row.get(4)?,
        status: row.get(5)?,
        reminder_enabled: row.get::<_, i64>(6)? != 0,
        reminder_days_before: row.get(7)?,
        last_reminder_date: row.get(8)?,
        reminder_id: row.get(9)?,
        snoozed_until: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// クーポンの可変フィールドをすべて書き戻す
fn persist(conn: &Connection, coupon: &Coupon) -> AppResult<()> {
    conn.execute(
        "UPDATE coupons
         SET name = ?1, merchant = ?2, value = ?3, expiration_date = ?4, status = ?5,
             reminder_enabled = ?6, reminder_days_before = ?7, last_reminder_date = ?8,
             reminder_id = ?9, snoozed_until = ?10, updated_at = ?11
         WHERE id = ?12",
        params![
            coupon.name,
            coupon.merchant,
            coupon.value.to_string(),
            coupon.expiration_date,
            coupon.status,
            coupon.reminder_enabled as i64,
            coupon.reminder_days_before,
            coupon.last_reminder_date,
            coupon.reminder_id,
            coupon.snoozed_until,
            coupon.updated_at,
            coupon.id,
        ],
    )?;

    Ok(())
}

/// クーポンを作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `dto` - クーポン作成用DTO
/// * `today` - 作成日（期限日のバリデーションに使用）
///
/// # 戻り値
/// 作成されたクーポン、または失敗時はエラー
pub fn create(conn: &Connection, dto: CreateCouponDto, today: NaiveDate) -> AppResult<Coupon> {
    // バリデーション
    if dto.name.trim().is_empty() {
        return Err(AppError::validation("クーポン名は必須です"));
    }
    if dto.value <= Decimal::ZERO {
        return Err(AppError::validation("金額は正の数値である必要があります"));
    }
    if dto.expiration_date < today {
        return Err(AppError::validation(
            "期限日は本日以降の日付である必要があります",
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
        "INSERT INTO coupons (name, merchant, value, expiration_date, status,
             reminder_enabled, reminder_days_before, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'available', ?5, ?6, ?7, ?8)",
        params![
            dto.name,
            dto.merchant,
            dto.value.to_string(),
            dto.expiration_date,
            reminder_enabled as i64,
            reminder_days_before,
            now,
            now
        ],
    )?;

    let id = conn.last_insert_rowid();
    find_by_id(conn, id)
}

/// IDでクーポンを取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - クーポンID
///
/// # 戻り値
/// クーポン、または失敗時はエラー
pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Coupon> {
    conn.query_row(
        &format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE id = ?1"),
        params![id],
        map_coupon,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found("クーポン"),
        _ => AppError::Database(e.to_string()),
    })
}

/// クーポン一覧を取得する（状態でフィルタリング可能）
///
/// # 引数
/// * `conn` - データベース接続
/// * `status` - 状態フィルター（オプション）
///
/// # 戻り値
/// 期限日の昇順に並んだクーポンのリスト、または失敗時はエラー
pub fn find_all(conn: &Connection, status: Option<ItemStatus>) -> AppResult<Vec<Coupon>> {
    let mut query = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE 1=1");

    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    // 状態フィルター
    if let Some(s) = status {
        query.push_str(" AND status = ?");
        params.push(Box::new(s));
    }

    query.push_str(" ORDER BY expiration_date, name");

    let mut stmt = conn.prepare(&query)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let coupons = stmt.query_map(param_refs.as_slice(), map_coupon)?;

    coupons
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// クーポンを更新する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - クーポンID
/// * `dto` - クーポン更新用DTO
///
/// # 戻り値
/// 更新されたクーポン、または失敗時はエラー
pub fn update(conn: &Connection, id: i64, dto: UpdateCouponDto) -> AppResult<Coupon> {
    // JSTで現在時刻を取得
    let now = Utc::now().with_timezone(&Tokyo).to_rfc3339();

    // 既存のクーポンを取得
    let existing = find_by_id(conn, id)?;

    // 更新するフィールドを決定
    let name = dto.name.unwrap_or(existing.name);
    let merchant = dto.merchant.unwrap_or(existing.merchant);
    let value = dto.value.unwrap_or(existing.value);
    let expiration_date = dto.expiration_date.unwrap_or(existing.expiration_date);
    let reminder_enabled = dto.reminder_enabled.unwrap_or(existing.reminder_enabled);
    let reminder_days_before = dto
        .reminder_days_before
        .unwrap_or(existing.reminder_days_before);

    if name.trim().is_empty() {
        return Err(AppError::validation("クーポン名は必須です"));
    }
    if value <= Decimal::ZERO {
        return Err(AppError::validation("金額は正の数値である必要があります"));
    }

    conn.execute(
        "UPDATE coupons
         SET name = ?1, merchant = ?2, value = ?3, expiration_date = ?4,
             reminder_enabled = ?5, reminder_days_before = ?6, updated_at = ?7
         WHERE id = ?8",
        params![
            name,
            merchant,
            value.to_string(),
            expiration_date,
            reminder_enabled as i64,
            reminder_days_before,
            now,
            id
        ],
    )?;

    find_by_id(conn, id)
}

/// クーポンを使用済みにする
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - クーポンID
/// * `now` - 現在時刻
///
/// # 戻り値
/// 使用済みになったクーポン、または失敗時はエラー
pub fn mark_used(conn: &Connection, id: i64, now: &DateTime<Tz>) -> AppResult<Coupon> {
    let coupon = find_by_id(conn, id)?;
    let used = coupon.mark_used(now)?;

    persist(conn, &used)?;

    info!("クーポンを使用済みにしました: id={id}");

    Ok(used)
}

/// クーポンの使用済みを取り消す
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - クーポンID
/// * `now` - 現在時刻
///
/// # 戻り値
/// 利用可能に戻ったクーポン、または失敗時はエラー
pub fn undo_mark_used(conn: &Connection, id: i64, now: &DateTime<Tz>) -> AppResult<Coupon> {
    let coupon = find_by_id(conn, id)?;
    let restored = coupon.undo_mark_used(now)?;

    persist(conn, &restored)?;

    Ok(restored)
}

/// クーポンのリマインダーをスヌーズする
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - クーポンID
/// * `until` - スヌーズ解除日
/// * `now` - 現在時刻
///
/// # 戻り値
/// スヌーズされたクーポン、または失敗時はエラー
pub fn snooze(
    conn: &Connection,
    id: i64,
    until: NaiveDate,
    now: &DateTime<Tz>,
) -> AppResult<Coupon> {
    let coupon = find_by_id(conn, id)?;
    let snoozed = coupon.snooze(until, now)?;

    persist(conn, &snoozed)?;

    Ok(snoozed)
}

/// 期限を過ぎた利用可能なクーポンを期限切れにする（定期スイープ）
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
        "SELECT {COUPON_COLUMNS} FROM coupons
         WHERE status = 'available' AND expiration_date < ?1"
    ))?;
    let overdue: Vec<Coupon> = stmt
        .query_map(params![today], map_coupon)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))?;

    let mut count = 0;
    for coupon in overdue {
        let expired = coupon.mark_expired(now)?;
        persist(conn, &expired)?;
        count += 1;
    }

    if count > 0 {
        info!("期限切れスイープ: {count}件のクーポンを期限切れにしました");
    }

    Ok(count)
}

/// リマインダーのスケジュール結果を記録する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - クーポンID
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
        "UPDATE coupons SET reminder_id = ?1, last_reminder_date = ?2 WHERE id = ?3",
        params![reminder_id, today, id],
    )?;

    if rows_affected == 0 {
        return Err(AppError::not_found("クーポン"));
    }

    Ok(())
}

/// クーポンを削除する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - クーポンID
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    let rows_affected = conn.execute("DELETE FROM coupons WHERE id = ?1", params![id])?;

    if rows_affected == 0 {
        return Err(AppError::not_found("クーポン"));
    }

    Ok(())
}

/// 利用可能なクーポンの合計金額を計算する
///
/// # 引数
/// * `conn` - データベース接続
///
/// # 戻り値
/// 利用可能なクーポンの合計金額、または失敗時はエラー
pub fn total_available_value(conn: &Connection) -> AppResult<Decimal> {
    let coupons = find_all(conn, Some(ItemStatus::Available))?;

    let total = coupons
        .iter()
        .fold(Decimal::ZERO, |acc, coupon| acc + coupon.value);

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_now() -> DateTime<Tz> {
        Tokyo.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
    }

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn sample_dto() -> CreateCouponDto {
        CreateCouponDto {
            name: "初回注文500円引き".to_string(),
            merchant: "デリバリーサービス".to_string(),
            value: Decimal::new(500, 0),
            expiration_date: date(2025, 1, 31),
            reminder_enabled: None,
            reminder_days_before: None,
        }
    }

    #[test]
    fn test_coupon_crud_operations() {
        let conn = create_test_db();

        let coupon = create(&conn, sample_dto(), date(2025, 1, 15)).unwrap();
        assert_eq!(coupon.status, ItemStatus::Available);

        let retrieved = find_by_id(&conn, coupon.id).unwrap();
        assert_eq!(retrieved.merchant, "デリバリーサービス");

        let updated = update(
            &conn,
            coupon.id,
            UpdateCouponDto {
                name: None,
                merchant: None,
                value: Some(Decimal::new(800, 0)),
                expiration_date: None,
                reminder_enabled: None,
                reminder_days_before: None,
            },
        )
        .unwrap();
        assert_eq!(updated.value, Decimal::new(800, 0));

        delete(&conn, coupon.id).unwrap();
        assert!(find_by_id(&conn, coupon.id).is_err());
    }

    #[test]
    fn test_create_rejects_past_expiration() {
        let conn = create_test_db();

        let mut dto = sample_dto();
        dto.expiration_date = date(2025, 1, 1);
        assert!(matches!(
            create(&conn, dto, date(2025, 1, 15)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_mark_used_and_undo() {
        let conn = create_test_db();
        let coupon = create(&conn, sample_dto(), date(2025, 1, 15)).unwrap();

        let used = mark_used(&conn, coupon.id, &test_now()).unwrap();
        assert_eq!(used.status, ItemStatus::Used);

        // 二重使用はエラー
        assert!(matches!(
            mark_used(&conn, coupon.id, &test_now()),
            Err(AppError::InvalidTransition(_))
        ));

        let restored = undo_mark_used(&conn, coupon.id, &test_now()).unwrap();
        assert_eq!(restored.status, ItemStatus::Available);
    }

    #[test]
    fn test_expire_overdue_skips_used_coupons() {
        let conn = create_test_db();

        let to_use = create(&conn, sample_dto(), date(2025, 1, 15)).unwrap();
        mark_used(&conn, to_use.id, &test_now()).unwrap();

        let mut dto = sample_dto();
        dto.name = "未使用クーポン".to_string();
        let unused = create(&conn, dto, date(2025, 1, 15)).unwrap();

        // 期限後のスイープ: 未使用のものだけ期限切れになる
        let after = Tokyo.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap();
        assert_eq!(expire_overdue(&conn, &after).unwrap(), 1);

        assert_eq!(find_by_id(&conn, to_use.id).unwrap().status, ItemStatus::Used);
        assert_eq!(
            find_by_id(&conn, unused.id).unwrap().status,
            ItemStatus::Expired
        );
    }

    #[test]
    fn test_total_available_value() {
        let conn = create_test_db();

        let coupon = create(&conn, sample_dto(), date(2025, 1, 15)).unwrap();

        let mut dto = sample_dto();
        dto.name = "もう1枚".to_string();
        dto.value = Decimal::new(300, 0);
        create(&conn, dto, date(2025, 1, 15)).unwrap();

        assert_eq!(total_available_value(&conn).unwrap(), Decimal::new(800, 0));

        // 使用済みは合計に含まれない
        mark_used(&conn, coupon.id, &test_now()).unwrap();
        assert_eq!(total_available_value(&conn).unwrap(), Decimal::new(300, 0));
    }
}
