//! Business logic services for ProfitBox

pub mod analytics;
pub mod bulk_upload;
pub mod catalog;
pub mod ledger;
pub mod saga;

pub use analytics::AnalyticsService;
pub use bulk_upload::BulkUploadService;
pub use catalog::CatalogService;
pub use ledger::LedgerService;
