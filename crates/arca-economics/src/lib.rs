pub mod balance;
pub mod error;
pub mod guard;
pub mod sink;
pub mod totals;
pub mod types;

pub use balance::{PayoutKind, PayoutLedger};
pub use error::{EconomicsError, Result};
pub use guard::ReentrancyGuard;
pub use sink::{MemorySink, TransferRecord, ValueSink};
pub use totals::MarketTotals;
pub use types::{Amount, BPS_DENOMINATOR};
