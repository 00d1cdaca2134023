pub mod checkpoint;
pub mod edges;
pub mod harvester;
pub mod ledger;
pub mod merge;
pub mod pool;
pub mod report;
pub mod schema;
pub mod source;
pub mod table;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod walker;

pub use harvester::{Harvester, RunOptions};
pub use merge::MergeOutcome;
pub use report::RunReport;
pub use traits::ListingApi;
pub use walker::{UnitFailure, WalkOutcome, Walker};
