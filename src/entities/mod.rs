//! Entity module - Contains all SeaORM entity definitions for the database.
//! Each table has its own module with a Model struct for data and an Entity
//! struct for queries. Tables are grouped below by feature area.

// Accounts
pub mod activity_log;
pub mod auth_token;
pub mod user;

// Farm records
pub mod crop;
pub mod crop_plan;
pub mod expense;
pub mod expense_category;
pub mod income;
pub mod livestock;
pub mod livestock_type;
pub mod loan;

// Marketplace
pub mod cart_item;
pub mod coupon;
pub mod delivery_address;
pub mod notification;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_category;
pub mod review;
pub mod wishlist_item;

// Assistants
pub mod chat_feedback;
pub mod chat_message;
pub mod conversation;
pub mod crop_diagnosis;
pub mod soil_feedback;
pub mod soil_sample;

// Re-export specific types to avoid conflicts
pub use activity_log::{Entity as ActivityLog, Model as ActivityLogModel};
pub use auth_token::{Entity as AuthToken, Model as AuthTokenModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use chat_feedback::{Entity as ChatFeedback, Model as ChatFeedbackModel};
pub use chat_message::{ChatRole, Entity as ChatMessage, Model as ChatMessageModel};
pub use conversation::{Entity as Conversation, Model as ConversationModel};
pub use coupon::{DiscountType, Entity as Coupon, Model as CouponModel};
pub use crop::{Entity as Crop, Model as CropModel, Season};
pub use crop_diagnosis::{Entity as CropDiagnosis, Model as CropDiagnosisModel, UploadStatus};
pub use crop_plan::{CropPlanStatus, Entity as CropPlan, Model as CropPlanModel};
pub use delivery_address::{Entity as DeliveryAddress, Model as DeliveryAddressModel};
pub use expense::{Entity as Expense, Model as ExpenseModel};
pub use expense_category::{Entity as ExpenseCategory, Model as ExpenseCategoryModel};
pub use income::{Entity as Income, IncomePaymentStatus, Model as IncomeModel};
pub use livestock::{Entity as Livestock, HealthStatus, Model as LivestockModel};
pub use livestock_type::{Entity as LivestockType, Model as LivestockTypeModel};
pub use loan::{Entity as Loan, LoanStatus, LoanType, Model as LoanModel};
pub use notification::{Entity as Notification, Model as NotificationModel, NotificationKind};
pub use order::{
    Entity as Order, Model as OrderModel, OrderPaymentStatus, OrderStatus, PaymentMethod,
};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use product::{Entity as Product, ListingStatus, Model as ProductModel};
pub use product_category::{Entity as ProductCategory, Model as ProductCategoryModel};
pub use review::{Entity as Review, Model as ReviewModel};
pub use soil_feedback::{Entity as SoilFeedback, Model as SoilFeedbackModel};
pub use soil_sample::{Entity as SoilSample, Model as SoilSampleModel};
pub use user::{Entity as User, Model as UserModel, UserRole};
pub use wishlist_item::{Entity as WishlistItem, Model as WishlistItemModel};
