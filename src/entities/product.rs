use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Product entity for the storefront catalog.
///
/// Products are soft-deleted via `is_active`; rows are never removed so that
/// order item snapshots keep a resolvable reference.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub category: ProductCategory,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub original_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub sale_price: Option<Decimal>,
    #[sea_orm(nullable)]
    pub sale_starts_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub sale_ends_at: Option<DateTime<Utc>>,
    pub stock_quantity: i32,
    pub in_stock: bool,
    pub is_active: bool,
    #[sea_orm(nullable)]
    pub image_url: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((3, 1)))")]
    pub rating_average: Decimal,
    pub rating_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_review::Entity")]
    Reviews,
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::product_review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Product category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    #[sea_orm(string_value = "black_tea")]
    BlackTea,
    #[sea_orm(string_value = "green_tea")]
    GreenTea,
    #[sea_orm(string_value = "herbal_tea")]
    HerbalTea,
    #[sea_orm(string_value = "oolong_tea")]
    OolongTea,
    #[sea_orm(string_value = "accessory")]
    Accessory,
    #[sea_orm(string_value = "grocery")]
    Grocery,
}

impl Model {
    /// Price actually charged right now: the sale price when the sale window
    /// contains `now`, the regular price otherwise.
    pub fn effective_price(&self, now: DateTime<Utc>) -> Decimal {
        if let Some(sale_price) = self.sale_price {
            let started = self.sale_starts_at.map_or(false, |start| start <= now);
            let not_ended = self.sale_ends_at.map_or(false, |end| now <= end);
            if started && not_ended {
                return sale_price;
            }
        }
        self.price
    }

    /// Whether the product can currently be sold in the given quantity.
    pub fn can_fulfill(&self, quantity: i32) -> bool {
        self.is_active && self.in_stock && self.stock_quantity >= quantity
    }
}
