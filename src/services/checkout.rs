use crate::{
    entities::{
        cart,
        order::{self, OrderStatus, OrderType, PaymentMethod, PaymentStatus},
        order_item, product, Cart, CartItem, Order, OrderItemModel, OrderModel, Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::cart::CartService,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    ModelTrait, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Order number formatting: `YYYYMMDD` date prefix plus a zero-padded daily
/// sequence starting at 0001.
const ORDER_NUMBER_SEQ_WIDTH: usize = 4;

/// Checkout service: converts a non-empty cart into an order.
///
/// The whole conversion — stock re-validation, order insert, item snapshots,
/// stock decrement, cart clear — runs inside a single transaction. Order
/// number collisions under concurrent checkout are resolved by the unique
/// index plus a bounded retry of the transaction.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    currency: String,
    max_retries: u32,
}

/// An order together with its item snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        currency: String,
        max_retries: u32,
    ) -> Self {
        Self {
            db,
            event_sender,
            currency,
            max_retries,
        }
    }

    /// Create an order from the user's cart.
    #[instrument(skip(self, input))]
    pub async fn checkout(
        &self,
        user_id: Uuid,
        input: CheckoutInput,
    ) -> Result<OrderWithItems, ServiceError> {
        if input.order_type == OrderType::DineIn && input.table_number.is_none() {
            return Err(ServiceError::ValidationError(
                "Dine-in orders require a table number".to_string(),
            ));
        }

        let mut attempt = 0;
        loop {
            match self.try_checkout(user_id, &input).await {
                Err(ServiceError::DatabaseError(err))
                    if is_unique_violation(&err) && attempt < self.max_retries =>
                {
                    attempt += 1;
                    warn!(
                        "Order number collision during checkout (attempt {}), retrying",
                        attempt
                    );
                }
                Ok(result) => {
                    self.event_sender
                        .send_or_log(Event::OrderCreated {
                            order_id: result.order.id,
                            order_number: result.order.order_number.clone(),
                        })
                        .await;
                    info!(
                        "Order {} created from cart of user {}",
                        result.order.order_number, user_id
                    );
                    return Ok(result);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One checkout attempt: everything inside a single transaction so the
    /// four effects (order insert, item snapshots, stock decrement, cart
    /// clear) land together or not at all.
    async fn try_checkout(
        &self,
        user_id: Uuid,
        input: &CheckoutInput,
    ) -> Result<OrderWithItems, ServiceError> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::ValidationError("Cart is empty".to_string()))?;

        let cart_items = cart.find_related(CartItem).all(&txn).await?;
        if cart_items.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }

        // Re-validate every line against the live product; cart-captured
        // availability can be stale.
        let mut products = Vec::with_capacity(cart_items.len());
        for item in &cart_items {
            let product = Product::find_by_id(item.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;

            if !product.is_active {
                return Err(ServiceError::Unavailable(format!(
                    "{} is no longer available",
                    product.name
                )));
            }
            if !product.in_stock || product.stock_quantity < item.quantity {
                return Err(ServiceError::OutOfStock(format!(
                    "Insufficient stock for {}",
                    product.name
                )));
            }
            products.push(product);
        }

        let order_number = next_order_number(&txn, now).await?;
        let order_id = Uuid::new_v4();

        let payment_status = match input.payment_method {
            PaymentMethod::Online => PaymentStatus::Paid,
            PaymentMethod::Cash | PaymentMethod::Card => PaymentStatus::Pending,
        };

        // Pricing block copied verbatim from the cart
        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            user_id: Set(user_id),
            status: Set(OrderStatus::Pending),
            order_type: Set(input.order_type),
            table_number: Set(input.table_number),
            customer_name: Set(input.customer_info.name.clone()),
            customer_phone: Set(input.customer_info.phone.clone()),
            customer_email: Set(input.customer_info.email.clone()),
            special_instructions: Set(input.special_instructions.clone()),
            subtotal: Set(cart.total_price),
            discount_amount: Set(cart.discount_amount),
            tax_amount: Set(cart.tax_amount),
            delivery_fee: Set(cart.delivery_fee),
            total: Set(cart.final_total),
            currency: Set(self.currency.clone()),
            payment_method: Set(input.payment_method),
            payment_status: Set(payment_status),
            cancellation_reason: Set(None),
            rating_score: Set(None),
            rating_comment: Set(None),
            ordered_at: Set(now),
            confirmed_at: Set(None),
            preparing_at: Set(None),
            ready_at: Set(None),
            completed_at: Set(None),
            cancelled_at: Set(None),
            actual_prep_minutes: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order = order.insert(&txn).await?;

        // Snapshot current product name/price/image into the order items and
        // decrement stock, line by line.
        let mut order_items = Vec::with_capacity(cart_items.len());
        for (item, product) in cart_items.iter().zip(products) {
            let unit_price = product.effective_price(now);
            let line_total = (unit_price + item.customizations.extras_total())
                * rust_decimal::Decimal::from(item.quantity);

            let snapshot = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                name: Set(product.name.clone()),
                image_url: Set(product.image_url.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(unit_price),
                customizations: Set(item.customizations.clone()),
                notes: Set(item.notes.clone()),
                line_total: Set(line_total),
                created_at: Set(now),
            };
            order_items.push(snapshot.insert(&txn).await?);

            let remaining = product.stock_quantity - item.quantity;
            let mut product: product::ActiveModel = product.into();
            product.stock_quantity = Set(remaining);
            product.in_stock = Set(remaining > 0);
            product.updated_at = Set(now);
            product.update(&txn).await?;
        }

        CartService::clear_cart_in_txn(&txn, cart).await?;

        txn.commit().await?;
        Ok(OrderWithItems {
            order,
            items: order_items,
        })
    }
}

/// Next order number for the day: date prefix + (last sequence + 1), first of
/// the day is 0001. The caller retries on unique-index conflicts.
pub(crate) async fn next_order_number(
    txn: &DatabaseTransaction,
    now: DateTime<Utc>,
) -> Result<String, ServiceError> {
    let prefix = now.format("%Y%m%d").to_string();

    let last = Order::find()
        .filter(order::Column::OrderNumber.starts_with(prefix.as_str()))
        .order_by_desc(order::Column::OrderNumber)
        .one(txn)
        .await?;

    let next_seq = match last {
        Some(order) => order
            .order_number
            .get(prefix.len()..)
            .and_then(|seq| seq.parse::<u32>().ok())
            .map(|seq| seq + 1)
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Malformed order number '{}'",
                    order.order_number
                ))
            })?,
        None => 1,
    };

    Ok(format!(
        "{}{:0width$}",
        prefix,
        next_seq,
        width = ORDER_NUMBER_SEQ_WIDTH
    ))
}

fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Customer contact details captured on the order
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

/// Input for checkout
#[derive(Debug, Deserialize)]
pub struct CheckoutInput {
    pub order_type: OrderType,
    pub payment_method: PaymentMethod,
    pub customer_info: CustomerInfo,
    pub table_number: Option<i32>,
    pub special_instructions: Option<String>,
}
