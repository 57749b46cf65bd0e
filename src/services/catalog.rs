use crate::{
    entities::{
        product::{self, ProductCategory},
        product_review, Product, ProductModel, ProductReview, ProductReviewModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Catalog service: product CRUD, stock mutation, and review aggregation.
///
/// Products are soft-deleted (`is_active = false`) so order history keeps a
/// resolvable product reference. Stock quantity is owned here and by checkout;
/// both keep `in_stock` consistent with `stock_quantity > 0`.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        if input.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }

        let now = Utc::now();
        let stock_quantity = input.stock_quantity.unwrap_or(0);
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            description: Set(input.description),
            category: Set(input.category),
            price: Set(input.price),
            original_price: Set(input.original_price),
            sale_price: Set(input.sale_price),
            sale_starts_at: Set(input.sale_starts_at),
            sale_ends_at: Set(input.sale_ends_at),
            stock_quantity: Set(stock_quantity),
            in_stock: Set(stock_quantity > 0),
            is_active: Set(true),
            image_url: Set(input.image_url),
            rating_average: Set(Decimal::ZERO),
            rating_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let product = product.insert(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::ProductCreated(product.id))
            .await;
        info!("Created product: {}", product.id);
        Ok(product)
    }

    /// Fetch a product regardless of active flag (admin views, internal use).
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// Fetch a product for the public catalog: archived products read as missing.
    pub async fn get_active_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        let product = self.get_product(product_id).await?;
        if !product.is_active {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }
        Ok(product)
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        let product = self.get_product(product_id).await?;
        let mut product: product::ActiveModel = product.into();

        if let Some(name) = input.name {
            product.name = Set(name);
        }
        if let Some(description) = input.description {
            product.description = Set(description);
        }
        if let Some(category) = input.category {
            product.category = Set(category);
        }
        if let Some(price) = input.price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Price cannot be negative".to_string(),
                ));
            }
            product.price = Set(price);
        }
        if let Some(original_price) = input.original_price {
            product.original_price = Set(original_price);
        }
        if let Some(sale_price) = input.sale_price {
            product.sale_price = Set(sale_price);
        }
        if let Some(sale_starts_at) = input.sale_starts_at {
            product.sale_starts_at = Set(sale_starts_at);
        }
        if let Some(sale_ends_at) = input.sale_ends_at {
            product.sale_ends_at = Set(sale_ends_at);
        }
        if let Some(image_url) = input.image_url {
            product.image_url = Set(image_url);
        }
        if let Some(stock_quantity) = input.stock_quantity {
            if stock_quantity < 0 {
                return Err(ServiceError::ValidationError(
                    "Stock quantity cannot be negative".to_string(),
                ));
            }
            product.stock_quantity = Set(stock_quantity);
            product.in_stock = Set(stock_quantity > 0);
        }

        product.updated_at = Set(Utc::now());
        let product = product.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;
        Ok(product)
    }

    /// Soft delete: the product disappears from the public catalog but stays
    /// referenced by carts and order history.
    #[instrument(skip(self))]
    pub async fn archive_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        let product = self.get_product(product_id).await?;
        let mut product: product::ActiveModel = product.into();
        product.is_active = Set(false);
        product.updated_at = Set(Utc::now());
        let product = product.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductArchived(product_id))
            .await;
        info!("Archived product: {}", product_id);
        Ok(product)
    }

    /// Admin stock adjustment to an absolute quantity.
    #[instrument(skip(self))]
    pub async fn set_stock(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<ProductModel, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Stock quantity cannot be negative".to_string(),
            ));
        }

        let product = self.get_product(product_id).await?;
        let old_quantity = product.stock_quantity;
        let mut product: product::ActiveModel = product.into();
        product.stock_quantity = Set(quantity);
        product.in_stock = Set(quantity > 0);
        product.updated_at = Set(Utc::now());
        let product = product.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::StockAdjusted {
                product_id,
                old_quantity,
                new_quantity: quantity,
            })
            .await;
        Ok(product)
    }

    /// Public catalog listing: active products only, filtered and paginated.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: ProductListFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<ProductModel>, u64), ServiceError> {
        let mut query = Product::find().filter(product::Column::IsActive.eq(true));

        if let Some(category) = filter.category {
            query = query.filter(product::Column::Category.eq(category));
        }
        if let Some(min_price) = filter.min_price {
            query = query.filter(product::Column::Price.gte(min_price));
        }
        if let Some(max_price) = filter.max_price {
            query = query.filter(product::Column::Price.lte(max_price));
        }
        if let Some(in_stock) = filter.in_stock {
            query = query.filter(product::Column::InStock.eq(in_stock));
        }
        if let Some(search) = filter.search.filter(|s| !s.trim().is_empty()) {
            query = query.filter(product::Column::Name.contains(search.trim()));
        }

        query = match filter.sort.unwrap_or(ProductSort::Newest) {
            ProductSort::PriceAsc => query.order_by_asc(product::Column::Price),
            ProductSort::PriceDesc => query.order_by_desc(product::Column::Price),
            ProductSort::Rating => query.order_by_desc(product::Column::RatingAverage),
            ProductSort::Newest => query.order_by_desc(product::Column::CreatedAt),
        };

        let paginator = query.paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((products, total))
    }

    /// Add (or replace) a user's review and refresh the product's rating
    /// aggregate. A user has at most one review per product; posting again
    /// replaces the earlier one. The whole mutation runs in one transaction so
    /// the aggregate never drifts from the review rows.
    #[instrument(skip(self, comment))]
    pub async fn add_review(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        rating: i16,
        comment: Option<String>,
    ) -> Result<ProductModel, ServiceError> {
        if !(1..=5).contains(&rating) {
            return Err(ServiceError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let product = Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        // At most one review per user per product
        ProductReview::delete_many()
            .filter(product_review::Column::ProductId.eq(product_id))
            .filter(product_review::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        let review = product_review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            user_id: Set(user_id),
            rating: Set(rating),
            comment: Set(comment),
            created_at: Set(Utc::now()),
        };
        review.insert(&txn).await?;

        let reviews = ProductReview::find()
            .filter(product_review::Column::ProductId.eq(product_id))
            .all(&txn)
            .await?;

        let count = reviews.len() as i32;
        let average = if count == 0 {
            Decimal::ZERO
        } else {
            let sum: Decimal = reviews.iter().map(|r| Decimal::from(r.rating)).sum();
            (sum / Decimal::from(count)).round_dp(1)
        };

        let mut product: product::ActiveModel = product.into();
        product.rating_average = Set(average);
        product.rating_count = Set(count);
        product.updated_at = Set(Utc::now());
        let product = product.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ReviewAdded {
                product_id,
                user_id,
                rating,
            })
            .await;
        Ok(product)
    }

    pub async fn list_reviews(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<ProductReviewModel>, ServiceError> {
        // Surface NotFound for unknown products rather than an empty list
        self.get_product(product_id).await?;

        ProductReview::find()
            .filter(product_review::Column::ProductId.eq(product_id))
            .order_by_desc(product_review::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }
}

/// Input for creating a product
#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub description: String,
    pub category: ProductCategory,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub sale_starts_at: Option<chrono::DateTime<chrono::Utc>>,
    pub sale_ends_at: Option<chrono::DateTime<chrono::Utc>>,
    pub stock_quantity: Option<i32>,
    pub image_url: Option<String>,
}

/// Input for updating a product. Double-option fields distinguish "leave
/// unchanged" (outer None) from "clear" (inner None).
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ProductCategory>,
    pub price: Option<Decimal>,
    pub original_price: Option<Option<Decimal>>,
    pub sale_price: Option<Option<Decimal>>,
    pub sale_starts_at: Option<Option<chrono::DateTime<chrono::Utc>>>,
    pub sale_ends_at: Option<Option<chrono::DateTime<chrono::Utc>>>,
    pub stock_quantity: Option<i32>,
    pub image_url: Option<Option<String>>,
}

/// Catalog list filters
#[derive(Debug, Default, Deserialize)]
pub struct ProductListFilter {
    pub category: Option<ProductCategory>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    pub search: Option<String>,
    pub sort: Option<ProductSort>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    PriceAsc,
    PriceDesc,
    Rating,
    Newest,
}
