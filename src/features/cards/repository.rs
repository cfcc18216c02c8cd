use super::models::{CreateCardDto, UpdateCardDto, UserCard};
use crate::db::decimal_column;
use crate::shared::errors::{AppError, AppResult};
use chrono::Utc;
use chrono_tz::Asia::Tokyo;
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;

/// 行からカードを復元する
fn map_card(row: &Row<'_>) -> rusqlite::Result<UserCard> {
    Ok(UserCard {
        id: row.get(0)?,
        name: row.get(1)?,
        issuer: row.get(2)?,
        last_four: row.get(3)?,
        annual_fee: decimal_column(row, 4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

const CARD_COLUMNS: &str = "id, name, issuer, last_four, annual_fee, created_at, updated_at";

/// カードを作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `dto` - カード作成用DTO
///
/// # 戻り値
/// 作成されたカード、または失敗時はエラー
pub fn create(conn: &Connection, dto: CreateCardDto) -> AppResult<UserCard> {
    // バリデーション: 名称と発行会社は必須
    if dto.name.trim().is_empty() {
        return Err(AppError::validation("カード名は必須です"));
    }
    if dto.issuer.trim().is_empty() {
        return Err(AppError::validation("発行会社は必須です"));
    }
    if dto.annual_fee < Decimal::ZERO {
        return Err(AppError::validation("年会費は0以上である必要があります"));
    }

    // JSTで現在時刻を取得
    let now = Utc::now().with_timezone(&Tokyo).to_rfc3339();

    conn.execute(
        "INSERT INTO cards (name, issuer, last_four, annual_fee, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            dto.name,
            dto.issuer,
            dto.last_four,
            dto.annual_fee.to_string(),
            now,
            now
        ],
    )?;

    let id = conn.last_insert_rowid();
    find_by_id(conn, id)
}

/// IDでカードを取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - カードID
///
/// # 戻り値
/// カード、または失敗時はエラー
pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<UserCard> {
    conn.query_row(
        &format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1"),
        params![id],
        map_card,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found("カード"),
        _ => AppError::Database(e.to_string()),
    })
}

/// カード一覧を取得する
///
/// # 引数
/// * `conn` - データベース接続
///
/// # 戻り値
/// カードのリスト、または失敗時はエラー
pub fn find_all(conn: &Connection) -> AppResult<Vec<UserCard>> {
    let mut stmt = conn.prepare(&format!("SELECT {CARD_COLUMNS} FROM cards ORDER BY name"))?;
    let cards = stmt.query_map([], map_card)?;

    cards
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// カードを更新する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - カードID
/// * `dto` - カード更新用DTO
///
/// # 戻り値
/// 更新されたカード、または失敗時はエラー
///
/// # 備考
/// 特典側の card_name スナップショットは更新しない。スナップショットは
/// 作成時点の値のコピーであり、自動的に追従させない。
pub fn update(conn: &Connection, id: i64, dto: UpdateCardDto) -> AppResult<UserCard> {
    // JSTで現在時刻を取得
    let now = Utc::now().with_timezone(&Tokyo).to_rfc3339();

    // 既存のカードを取得
    let existing = find_by_id(conn, id)?;

    // 更新するフィールドを決定
    let name = dto.name.unwrap_or(existing.name);
    let issuer = dto.issuer.unwrap_or(existing.issuer);
    let last_four = dto.last_four.or(existing.last_four);
    let annual_fee = dto.annual_fee.unwrap_or(existing.annual_fee);

    if name.trim().is_empty() {
        return Err(AppError::validation("カード名は必須です"));
    }
    if annual_fee < Decimal::ZERO {
        return Err(AppError::validation("年会費は0以上である必要があります"));
    }

    conn.execute(
        "UPDATE cards
         SET name = ?1, issuer = ?2, last_four = ?3, annual_fee = ?4, updated_at = ?5
         WHERE id = ?6",
        params![name, issuer, last_four, annual_fee.to_string(), now, id],
    )?;

    find_by_id(conn, id)
}

/// カードを削除する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - カードID
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
///
/// # 備考
/// 紐づく特典は削除されず、card_id の参照だけ外れる。特典は作成時の
/// card_name スナップショットで引き続き表示できる。利用履歴も残る。
pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    // JSTで現在時刻を取得
    let now = Utc::now().with_timezone(&Tokyo).to_rfc3339();

    // 紐づく特典の参照を外す（スナップショットはそのまま）
    conn.execute(
        "UPDATE benefits SET card_id = NULL, updated_at = ?1 WHERE card_id = ?2",
        params![now, id],
    )?;

    let rows_affected = conn.execute("DELETE FROM cards WHERE id = ?1", params![id])?;

    if rows_affected == 0 {
        return Err(AppError::not_found("カード"));
    }

    Ok(())
}
