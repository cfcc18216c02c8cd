use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// カードデータモデル
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserCard {
    pub id: i64,
    pub name: String,
    pub issuer: String,
    pub last_four: Option<String>,
    pub annual_fee: Decimal,
    pub created_at: String,
    pub updated_at: String,
}

/// カード作成用DTO
#[derive(Debug, Deserialize)]
pub struct CreateCardDto {
    pub name: String,
    pub issuer: String,
    pub last_four: Option<String>,
    pub annual_fee: Decimal,
}

/// カード更新用DTO
#[derive(Debug, Deserialize)]
pub struct UpdateCardDto {
    pub name: Option<String>,
    pub issuer: Option<String>,
    pub last_four: Option<String>,
    pub annual_fee: Option<Decimal>,
}
