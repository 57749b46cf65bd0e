use crate::{
    entities::{
        order::{self, OrderStatus},
        order_item, order_note, product, Order, OrderItem, OrderModel, OrderNote, OrderNoteModel,
        Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        checkout::OrderWithItems,
        order_status::{self, CancelPolicy},
    },
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Order lifecycle service: status transitions, cancellation with stock
/// restoration, ratings, and staff notes.
///
/// Status changes and their compensating stock effects share one transaction.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    cancel_policy: CancelPolicy,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        cancel_policy: CancelPolicy,
    ) -> Self {
        Self {
            db,
            event_sender,
            cancel_policy,
        }
    }

    /// Fetch an order with its item snapshots. Customers see only their own
    /// orders; admins see everything.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
        requester_id: Uuid,
        is_admin: bool,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = self.find_order(&*self.db, order_id).await?;
        if !is_admin && order.user_id != requester_id {
            return Err(ServiceError::Forbidden(
                "You do not have access to this order".to_string(),
            ));
        }
        let items = order.find_related(OrderItem).all(&*self.db).await?;
        Ok(OrderWithItems { order, items })
    }

    /// A customer's order history, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders_for_user(
        &self,
        user_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let paginator = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::OrderedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Admin order board: all orders, optionally filtered by status.
    #[instrument(skip(self))]
    pub async fn list_all_orders(
        &self,
        status: Option<OrderStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let mut query = Order::find().order_by_desc(order::Column::OrderedAt);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }
        let paginator = query.paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Advance the order through the state machine, stamping the timestamp
    /// that belongs to the new status. Transitioning into `completed` records
    /// the actual preparation time when a `preparing` timestamp exists, and
    /// settles cash/card payment. Transitioning into `cancelled` restores
    /// stock.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let order = self.find_order(&txn, order_id).await?;
        let old_status = order.status;

        if !order_status::can_transition(old_status, new_status) {
            return Err(ServiceError::InvalidTransition {
                from: old_status.to_string(),
                to: new_status.to_string(),
            });
        }

        let now = Utc::now();
        let preparing_at = order.preparing_at;
        let payment_status = order.payment_status;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        match new_status {
            OrderStatus::Confirmed => active.confirmed_at = Set(Some(now)),
            OrderStatus::Preparing => active.preparing_at = Set(Some(now)),
            OrderStatus::Ready => active.ready_at = Set(Some(now)),
            OrderStatus::Completed => {
                active.completed_at = Set(Some(now));
                if let Some(started) = preparing_at {
                    let minutes = (now - started).num_minutes();
                    active.actual_prep_minutes = Set(Some(minutes.max(0) as i32));
                }
                // Counter payments settle when the order is handed over
                if payment_status == order::PaymentStatus::Pending {
                    active.payment_status = Set(order::PaymentStatus::Paid);
                }
            }
            OrderStatus::Cancelled => active.cancelled_at = Set(Some(now)),
            OrderStatus::Pending => {}
        }
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        if new_status == OrderStatus::Cancelled {
            self.restock_items(&txn, order_id).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            })
            .await;
        info!(
            "Order {} status updated from '{}' to '{}'",
            order_id, old_status, new_status
        );
        Ok(updated)
    }

    /// Customer-facing cancellation. Gated by the cancel policy (stricter
    /// than the raw transition table unless ready-cancellation is enabled);
    /// restores each ordered item's quantity to product stock in the same
    /// transaction.
    #[instrument(skip(self, reason))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        requester_id: Uuid,
        is_admin: bool,
        reason: String,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let order = self.find_order(&txn, order_id).await?;
        if !is_admin && order.user_id != requester_id {
            return Err(ServiceError::Forbidden(
                "You do not have access to this order".to_string(),
            ));
        }

        if !self.cancel_policy.permits(order.status) {
            return Err(ServiceError::InvalidState(format!(
                "Order cannot be cancelled while '{}'",
                order.status
            )));
        }

        let now = Utc::now();
        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Cancelled);
        active.cancelled_at = Set(Some(now));
        active.cancellation_reason = Set(Some(reason.clone()));
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        self.restock_items(&txn, order_id).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCancelled { order_id, reason })
            .await;
        info!("Order {} cancelled", order_id);
        Ok(updated)
    }

    /// Rate a completed order.
    #[instrument(skip(self, comment))]
    pub async fn add_rating(
        &self,
        order_id: Uuid,
        requester_id: Uuid,
        score: i16,
        comment: Option<String>,
    ) -> Result<OrderModel, ServiceError> {
        if !(1..=5).contains(&score) {
            return Err(ServiceError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        let order = self.find_order(&*self.db, order_id).await?;
        if order.user_id != requester_id {
            return Err(ServiceError::Forbidden(
                "Only the order's owner may rate it".to_string(),
            ));
        }
        if order.status != OrderStatus::Completed {
            return Err(ServiceError::InvalidState(
                "Only completed orders can be rated".to_string(),
            ));
        }

        let mut active: order::ActiveModel = order.into();
        active.rating_score = Set(Some(score));
        active.rating_comment = Set(comment);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderRated { order_id, score })
            .await;
        Ok(updated)
    }

    /// Append a staff note. Notes are append-only; there is no edit or delete.
    #[instrument(skip(self, body))]
    pub async fn add_note(
        &self,
        order_id: Uuid,
        author_id: Option<Uuid>,
        body: String,
    ) -> Result<OrderNoteModel, ServiceError> {
        if body.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Note body cannot be empty".to_string(),
            ));
        }

        // Ensure the order exists before attaching
        self.find_order(&*self.db, order_id).await?;

        let note = order_note::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            author_id: Set(author_id),
            body: Set(body),
            created_at: Set(Utc::now()),
        };
        note.insert(&*self.db).await.map_err(Into::into)
    }

    pub async fn list_notes(&self, order_id: Uuid) -> Result<Vec<OrderNoteModel>, ServiceError> {
        self.find_order(&*self.db, order_id).await?;

        OrderNote::find()
            .filter(order_note::Column::OrderId.eq(order_id))
            .order_by_asc(order_note::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    async fn find_order<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Return each ordered quantity to product stock. Products archived since
    /// the order was placed still get their stock back.
    async fn restock_items(
        &self,
        txn: &DatabaseTransaction,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(txn)
            .await?;

        let now = Utc::now();
        for item in items {
            if let Some(product) = Product::find_by_id(item.product_id).one(txn).await? {
                let restored = product.stock_quantity + item.quantity;
                let mut product: product::ActiveModel = product.into();
                product.stock_quantity = Set(restored);
                product.in_stock = Set(restored > 0);
                product.updated_at = Set(now);
                product.update(txn).await?;
            }
        }
        Ok(())
    }
}
