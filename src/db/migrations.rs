use rusqlite::{Connection, Result};

/// すべてのデータベースマイグレーションを実行する
///
/// # 引数
/// * `conn` - データベース接続
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // カードテーブルを作成
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            issuer TEXT NOT NULL,
            last_four TEXT,
            annual_fee TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // 特典テーブルを作成
    // card_name は作成時点のスナップショット。カード削除後も表示に使われる。
    conn.execute(
        "CREATE TABLE IF NOT EXISTS benefits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            card_id INTEGER,
            card_name TEXT NOT NULL,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            value TEXT NOT NULL,
            frequency TEXT NOT NULL CHECK(frequency IN ('monthly', 'quarterly', 'semiannual', 'annual', 'one_time')),
            status TEXT NOT NULL DEFAULT 'available' CHECK(status IN ('available', 'used', 'expired')),
            current_period_start TEXT NOT NULL,
            current_period_end TEXT NOT NULL,
            next_reset_date TEXT NOT NULL,
            reminder_enabled INTEGER NOT NULL DEFAULT 1,
            reminder_days_before INTEGER NOT NULL DEFAULT 3,
            last_reminder_date TEXT,
            reminder_id TEXT,
            snoozed_until TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // 特典テーブルのインデックスを作成
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_benefits_status ON benefits(status)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_benefits_card_id ON benefits(card_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_benefits_next_reset_date ON benefits(next_reset_date)",
        [],
    )?;

    // 特典利用履歴テーブルを作成
    // benefit_name / card_name / value は利用時点のスナップショット。
    // 元の特典やカードが削除されても履歴は表示可能なまま残る。
    conn.execute(
        "CREATE TABLE IF NOT EXISTS benefit_usages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            benefit_id INTEGER,
            benefit_name TEXT NOT NULL,
            card_name TEXT NOT NULL,
            value TEXT NOT NULL,
            used_on TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_benefit_usages_benefit_id ON benefit_usages(benefit_id)",
        [],
    )?;

    // サブスクリプションテーブルを作成
    conn.execute(
        "CREATE TABLE IF NOT EXISTS subscriptions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            amount TEXT NOT NULL,
            frequency TEXT NOT NULL CHECK(frequency IN ('monthly', 'quarterly', 'semiannual', 'annual')),
            next_renewal_date TEXT NOT NULL,
            category TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            reminder_enabled INTEGER NOT NULL DEFAULT 1,
            reminder_days_before INTEGER NOT NULL DEFAULT 3,
            last_reminder_date TEXT,
            reminder_id TEXT,
            snoozed_until TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // サブスクリプションテーブルのインデックスを作成
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subscriptions_active ON subscriptions(is_active)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subscriptions_next_renewal_date ON subscriptions(next_renewal_date)",
        [],
    )?;

    // クーポンテーブルを作成
    conn.execute(
        "CREATE TABLE IF NOT EXISTS coupons (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            merchant TEXT NOT NULL,
            value TEXT NOT NULL,
            expiration_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'available' CHECK(status IN ('available', 'used', 'expired')),
            reminder_enabled INTEGER NOT NULL DEFAULT 1,
            reminder_days_before INTEGER NOT NULL DEFAULT 3,
            last_reminder_date TEXT,
            reminder_id TEXT,
            snoozed_until TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_coupons_status ON coupons(status)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_coupons_expiration_date ON coupons(expiration_date)",
        [],
    )?;

    // カテゴリテーブルを作成
    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            color TEXT NOT NULL,
            icon TEXT
        )",
        [],
    )?;

    // テーブルが空の場合、初期カテゴリデータを挿入
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?;

    if count == 0 {
        let categories = [
            ("ダイニング", "#EF4444", "🍽️"),
            ("トラベル", "#3B82F6", "✈️"),
            ("ショッピング", "#F59E0B", "🛍️"),
            ("エンタメ", "#8B5CF6", "🎬"),
            ("サブスク", "#10B981", "🔁"),
            ("その他", "#6B7280", "📋"),
        ];

        for (name, color, icon) in categories.iter() {
            conn.execute(
                "INSERT INTO categories (name, color, icon) VALUES (?1, ?2, ?3)",
                [name, color, icon],
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_run_migrations_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        // すべてのテーブルが作成されることを確認
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();

        for expected in [
            "benefit_usages",
            "benefits",
            "cards",
            "categories",
            "coupons",
            "subscriptions",
        ] {
            assert!(tables.iter().any(|t| t == expected), "{expected} がない");
        }
    }

    #[test]
    fn test_run_migrations_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // 2回実行してもエラーにならない
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        // 初期カテゴリが重複しないことを確認
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 6);
    }

    #[test]
    fn test_benefit_status_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        // CHECK制約により未知の状態は拒否される
        let result = conn.execute(
            "INSERT INTO benefits (card_name, name, category, value, frequency, status,
             current_period_start, current_period_end, next_reset_date, created_at, updated_at)
             VALUES ('テストカード', 'テスト特典', 'その他', '1000', 'monthly', 'unknown',
             '2025-01-01', '2025-01-31', '2025-01-31', '2025-01-01', '2025-01-01')",
            [],
        );

        assert!(result.is_err());
    }
}
