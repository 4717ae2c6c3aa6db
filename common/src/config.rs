use crate::static_assert;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ===== REVENUE SPLIT =====

// Percent of every harvest deposit credited to the grove farmer
// The remainder is the investor pool, so farmer + investors always equals the deposit
pub const DEFAULT_FARMER_SHARE_PERCENT: u8 = 30;
pub const PERCENT_DENOMINATOR: u64 = 100;

// ===== MARKETPLACE FEES =====

// Marketplace fee charged on every trade, in basis points (250 = 2.5%)
pub const DEFAULT_MARKETPLACE_FEE_BPS: u16 = 250;
pub const BPS_DENOMINATOR: u64 = 10_000;
// Fees above 50% are rejected by the configuration layer
pub const MAX_FEE_BPS: u16 = 5_000;

// ===== LISTINGS =====

pub const MIN_LISTING_DURATION_DAYS: u32 = 1;
pub const MAX_LISTING_DURATION_DAYS: u32 = 365;
pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

// ===== HARVESTS =====

// Quality grade reported with a harvest, inclusive bounds
pub const MIN_QUALITY_GRADE: u8 = 1;
pub const MAX_QUALITY_GRADE: u8 = 100;

// ===== PAYOUTS =====

// Number of payout requests emitted concurrently before waiting on the batch
pub const DEFAULT_PAYOUT_BATCH_SIZE: usize = 25;

// ===== ACCOUNTS =====

// Account receiving marketplace fees
pub const DEFAULT_FEE_ACCOUNT: &str = "platform-fees";
// Account holding deposited harvest revenue until it is paid out
pub const DEFAULT_RESERVE_ACCOUNT: &str = "revenue-reserve";
// Settlement currency used for payouts and trade payments
pub const DEFAULT_PAYMENT_ASSET: &str = "USDC";

// ===== QUERIES =====

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

// Static checks
static_assert!(
    (DEFAULT_FARMER_SHARE_PERCENT as u64) <= PERCENT_DENOMINATOR,
    "Farmer share must be a percentage"
);
static_assert!(
    DEFAULT_MARKETPLACE_FEE_BPS <= MAX_FEE_BPS,
    "Default marketplace fee must not exceed the maximum fee"
);
static_assert!(
    MIN_LISTING_DURATION_DAYS <= MAX_LISTING_DURATION_DAYS,
    "Listing duration bounds are inverted"
);
static_assert!(
    DEFAULT_PAGE_SIZE <= MAX_PAGE_SIZE,
    "Default page size must be less than or equal to max page size"
);
