pub mod cart;
pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod order_note;
pub mod product;
pub mod product_review;
pub mod user;

pub use cart::Entity as Cart;
pub use cart_item::Entity as CartItem;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use order_note::Entity as OrderNote;
pub use product::Entity as Product;
pub use product_review::Entity as ProductReview;
pub use user::Entity as User;

pub type CartModel = cart::Model;
pub type CartItemModel = cart_item::Model;
pub type OrderModel = order::Model;
pub type OrderItemModel = order_item::Model;
pub type OrderNoteModel = order_note::Model;
pub type ProductModel = product::Model;
pub type ProductReviewModel = product_review::Model;
pub type UserModel = user::Model;
