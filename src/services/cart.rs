use crate::{
    entities::{
        cart,
        cart_item::{self, Customization, CustomizationList},
        Cart, CartItem, CartItemModel, CartModel, Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::pricing::{self, Discount},
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Cart behavior knobs sourced from application configuration.
#[derive(Debug, Clone)]
pub struct CartSettings {
    /// Tax rate in percent applied to newly created carts
    pub default_tax_rate: Decimal,
    /// Delivery fee applied to newly created carts
    pub default_delivery_fee: Decimal,
    /// Inactivity window before an untouched cart expires
    pub expiry: Duration,
}

impl Default for CartSettings {
    fn default() -> Self {
        Self {
            default_tax_rate: Decimal::ZERO,
            default_delivery_fee: Decimal::ZERO,
            expiry: Duration::days(7),
        }
    }
}

/// A cart together with its line items, as returned to the API layer.
#[derive(Debug, Clone, Serialize)]
pub struct CartWithItems {
    pub cart: CartModel,
    pub items: Vec<CartItemModel>,
}

/// Shopping cart service: one mutable cart per user, lazily created.
///
/// Every mutation runs in a transaction and ends with a single recalculation
/// path that rewrites the derived totals, so persisted totals always agree
/// with the line items. Writes refresh the cart's expiry window.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    settings: CartSettings,
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        settings: CartSettings,
    ) -> Self {
        Self {
            db,
            event_sender,
            settings,
        }
    }

    /// Fetch the user's cart, creating an empty one on first access.
    #[instrument(skip(self))]
    pub async fn get_or_create_cart(&self, user_id: Uuid) -> Result<CartWithItems, ServiceError> {
        if let Some(cart) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
        {
            let items = cart.find_related(CartItem).all(&*self.db).await?;
            return Ok(CartWithItems { cart, items });
        }

        let cart = self.insert_empty_cart(&*self.db, user_id).await?;
        self.event_sender
            .send_or_log(Event::CartCreated(cart.id))
            .await;
        Ok(CartWithItems {
            cart,
            items: vec![],
        })
    }

    /// Add a product to the cart, merging into an existing line when product
    /// and customizations match exactly. The live product is re-validated and
    /// its current effective price captured on the new line.
    #[instrument(skip(self, input))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddItemInput,
    ) -> Result<CartWithItems, ServiceError> {
        if input.quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }
        let customizations = CustomizationList(input.customizations.unwrap_or_default());

        let txn = self.db.begin().await?;

        let cart = self.load_or_create_cart(&txn, user_id).await?;

        let product = Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        if !product.is_active {
            return Err(ServiceError::Unavailable(format!(
                "{} is no longer available",
                product.name
            )));
        }
        if !product.in_stock {
            return Err(ServiceError::OutOfStock(format!(
                "{} is out of stock",
                product.name
            )));
        }

        let items = cart.find_related(CartItem).all(&txn).await?;
        let existing = items
            .iter()
            .find(|i| i.product_id == input.product_id && i.customizations == customizations);

        let requested_total = existing.map_or(0, |i| i.quantity) + input.quantity;
        if product.stock_quantity < requested_total {
            return Err(ServiceError::OutOfStock(format!(
                "Only {} of {} in stock",
                product.stock_quantity, product.name
            )));
        }

        let now = Utc::now();
        match existing {
            Some(line) => {
                let mut line: cart_item::ActiveModel = line.clone().into();
                line.quantity = Set(requested_total);
                // Keep the originally captured price; refresh notes only when
                // the caller supplied non-empty replacement text.
                if let Some(notes) = input.notes.filter(|n| !n.trim().is_empty()) {
                    line.notes = Set(Some(notes));
                }
                line.updated_at = Set(now);
                line.update(&txn).await?;
            }
            None => {
                let line = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(input.product_id),
                    quantity: Set(input.quantity),
                    unit_price: Set(product.effective_price(now)),
                    customizations: Set(customizations),
                    notes: Set(input.notes.filter(|n| !n.trim().is_empty())),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                line.insert(&txn).await?;
            }
        }

        let cart = self.recalculate(&txn, cart).await?;
        let items = cart.find_related(CartItem).all(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                product_id: input.product_id,
                quantity: input.quantity,
            })
            .await;
        Ok(CartWithItems { cart, items })
    }

    /// Set a line's quantity; zero or below removes the line.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        customizations: Option<Vec<Customization>>,
    ) -> Result<CartWithItems, ServiceError> {
        let customizations = CustomizationList(customizations.unwrap_or_default());
        let txn = self.db.begin().await?;

        let cart = self.find_cart(&txn, user_id).await?;
        let items = cart.find_related(CartItem).all(&txn).await?;
        let line = items
            .iter()
            .find(|i| i.product_id == product_id && i.customizations == customizations)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound("Item not found in cart".to_string()))?;

        if quantity <= 0 {
            line.delete(&txn).await?;
        } else {
            let mut line: cart_item::ActiveModel = line.into();
            line.quantity = Set(quantity);
            line.updated_at = Set(Utc::now());
            line.update(&txn).await?;
        }

        let cart = self.recalculate(&txn, cart).await?;
        let items = cart.find_related(CartItem).all(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                cart_id: cart.id,
                product_id,
            })
            .await;
        Ok(CartWithItems { cart, items })
    }

    /// Remove a line entirely.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        customizations: Option<Vec<Customization>>,
    ) -> Result<CartWithItems, ServiceError> {
        let customizations = CustomizationList(customizations.unwrap_or_default());
        let txn = self.db.begin().await?;

        let cart = self.find_cart(&txn, user_id).await?;
        let items = cart.find_related(CartItem).all(&txn).await?;
        let line = items
            .iter()
            .find(|i| i.product_id == product_id && i.customizations == customizations)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound("Item not found in cart".to_string()))?;

        line.delete(&txn).await?;

        let cart = self.recalculate(&txn, cart).await?;
        let items = cart.find_related(CartItem).all(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                product_id,
            })
            .await;
        Ok(CartWithItems { cart, items })
    }

    /// Apply a discount. A positive percentage wins over a flat amount and is
    /// re-derived from the total price on every recalculation.
    #[instrument(skip(self))]
    pub async fn apply_discount(
        &self,
        user_id: Uuid,
        code: String,
        amount: Decimal,
        percentage: Decimal,
    ) -> Result<CartWithItems, ServiceError> {
        if amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Discount amount cannot be negative".to_string(),
            ));
        }
        if percentage < Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
            return Err(ServiceError::ValidationError(
                "Discount percentage must be between 0 and 100".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let cart = self.load_or_create_cart(&txn, user_id).await?;

        let mut active: cart::ActiveModel = cart.into();
        active.discount_code = Set(Some(code.clone()));
        active.discount_amount = Set(amount);
        active.discount_percentage = Set(percentage);
        let cart = active.update(&txn).await?;

        let cart = self.recalculate(&txn, cart).await?;
        let items = cart.find_related(CartItem).all(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartDiscountApplied {
                cart_id: cart.id,
                code,
            })
            .await;
        Ok(CartWithItems { cart, items })
    }

    #[instrument(skip(self))]
    pub async fn set_tax_rate(
        &self,
        user_id: Uuid,
        rate: Decimal,
    ) -> Result<CartWithItems, ServiceError> {
        if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
            return Err(ServiceError::ValidationError(
                "Tax rate must be between 0 and 100".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let cart = self.load_or_create_cart(&txn, user_id).await?;

        let mut active: cart::ActiveModel = cart.into();
        active.tax_rate = Set(rate);
        let cart = active.update(&txn).await?;

        let cart = self.recalculate(&txn, cart).await?;
        let items = cart.find_related(CartItem).all(&txn).await?;
        txn.commit().await?;
        Ok(CartWithItems { cart, items })
    }

    #[instrument(skip(self))]
    pub async fn set_delivery_fee(
        &self,
        user_id: Uuid,
        fee: Decimal,
    ) -> Result<CartWithItems, ServiceError> {
        if fee < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Delivery fee cannot be negative".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let cart = self.load_or_create_cart(&txn, user_id).await?;

        let mut active: cart::ActiveModel = cart.into();
        active.delivery_fee = Set(fee);
        let cart = active.update(&txn).await?;

        let cart = self.recalculate(&txn, cart).await?;
        let items = cart.find_related(CartItem).all(&txn).await?;
        txn.commit().await?;
        Ok(CartWithItems { cart, items })
    }

    /// Empty the cart and zero every derived, discount, tax, and delivery
    /// field.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: Uuid) -> Result<CartWithItems, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = self.load_or_create_cart(&txn, user_id).await?;
        let cart = Self::clear_cart_in_txn(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartCleared(cart.id))
            .await;
        Ok(CartWithItems {
            cart,
            items: vec![],
        })
    }

    /// Shared with checkout, which clears the cart inside its own transaction.
    pub(crate) async fn clear_cart_in_txn<C: ConnectionTrait>(
        conn: &C,
        cart: CartModel,
    ) -> Result<CartModel, ServiceError> {
        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(conn)
            .await?;

        let mut active: cart::ActiveModel = cart.into();
        active.total_items = Set(0);
        active.total_price = Set(Decimal::ZERO);
        active.discount_code = Set(None);
        active.discount_amount = Set(Decimal::ZERO);
        active.discount_percentage = Set(Decimal::ZERO);
        active.tax_rate = Set(Decimal::ZERO);
        active.tax_amount = Set(Decimal::ZERO);
        active.delivery_fee = Set(Decimal::ZERO);
        active.final_total = Set(Decimal::ZERO);
        active.updated_at = Set(Utc::now());
        active.update(conn).await.map_err(Into::into)
    }

    /// Delete carts whose expiry window elapsed. Returns the number removed.
    #[instrument(skip(self))]
    pub async fn remove_expired_carts(&self) -> Result<u64, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let expired = Cart::find()
            .filter(cart::Column::ExpiresAt.lt(now))
            .all(&txn)
            .await?;

        let mut removed = 0u64;
        for cart in expired {
            CartItem::delete_many()
                .filter(cart_item::Column::CartId.eq(cart.id))
                .exec(&txn)
                .await?;
            cart.delete(&txn).await?;
            removed += 1;
        }

        txn.commit().await?;

        if removed > 0 {
            info!("Removed {} expired carts", removed);
            self.event_sender
                .send_or_log(Event::CartsExpired(removed))
                .await;
        }
        Ok(removed)
    }

    async fn find_cart<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
    ) -> Result<CartModel, ServiceError> {
        Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart not found".to_string()))
    }

    async fn load_or_create_cart<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
    ) -> Result<CartModel, ServiceError> {
        if let Some(cart) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(conn)
            .await?
        {
            return Ok(cart);
        }
        self.insert_empty_cart(conn, user_id).await
    }

    async fn insert_empty_cart<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
    ) -> Result<CartModel, ServiceError> {
        let now = Utc::now();
        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            total_items: Set(0),
            total_price: Set(Decimal::ZERO),
            discount_code: Set(None),
            discount_amount: Set(Decimal::ZERO),
            discount_percentage: Set(Decimal::ZERO),
            tax_rate: Set(self.settings.default_tax_rate),
            tax_amount: Set(Decimal::ZERO),
            delivery_fee: Set(self.settings.default_delivery_fee),
            final_total: Set(Decimal::ZERO),
            expires_at: Set(now + self.settings.expiry),
            created_at: Set(now),
            updated_at: Set(now),
        };
        cart.insert(conn).await.map_err(Into::into)
    }

    /// The single recalculation path: every mutation funnels through here
    /// before its transaction commits, and every write pushes the expiry
    /// window out.
    async fn recalculate<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart: CartModel,
    ) -> Result<CartModel, ServiceError> {
        let items = cart.find_related(CartItem).all(conn).await?;
        let totals = pricing::compute_totals(
            &items,
            Discount {
                amount: cart.discount_amount,
                percentage: cart.discount_percentage,
            },
            cart.tax_rate,
            cart.delivery_fee,
        );

        let now = Utc::now();
        let mut active: cart::ActiveModel = cart.into();
        active.total_items = Set(totals.total_items);
        active.total_price = Set(totals.total_price);
        active.discount_amount = Set(totals.discount_amount);
        active.tax_amount = Set(totals.tax_amount);
        active.final_total = Set(totals.final_total);
        active.expires_at = Set(now + self.settings.expiry);
        active.updated_at = Set(now);
        active.update(conn).await.map_err(Into::into)
    }
}

/// Input for adding an item to the cart
#[derive(Debug, Deserialize)]
pub struct AddItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub customizations: Option<Vec<Customization>>,
    pub notes: Option<String>,
}
