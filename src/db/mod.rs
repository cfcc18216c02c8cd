pub mod connection;
pub mod migrations;

pub use connection::open_database;
pub use migrations::run_migrations;

use rust_decimal::Decimal;
use std::str::FromStr;

/// TEXT列として格納された金額をDecimalとして読み出す
///
/// # 引数
/// * `row` - 行
/// * `idx` - 列インデックス
///
/// # 戻り値
/// 金額、または解析失敗時は変換エラー
///
/// 金額は浮動小数点誤差を避けるためTEXT列に十進文字列で格納される。
pub(crate) fn decimal_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = row.get(idx)?;
    Decimal::from_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
