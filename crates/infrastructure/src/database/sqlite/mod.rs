pub mod sqlite_branch_directory;
pub mod sqlite_order_repository;

pub use sqlite_branch_directory::SqliteBranchDirectory;
pub use sqlite_order_repository::SqliteOrderRepository;
