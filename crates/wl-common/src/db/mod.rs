pub mod commission;
pub mod escrow;
pub mod migrations;
pub mod pool;

// Keep re-exports unique so downstream crates see a single symbol per helper.
pub use commission::{
    fetch_commission_summary, get_user_level, insert_commission_log, CommissionLogInsert,
    CommissionStorageError,
};
pub use escrow::PgEscrowStore;
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool_from_url, DbPoolError, PgPool};
