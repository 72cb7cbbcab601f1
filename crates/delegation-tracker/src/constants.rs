//! Constants used by the delegation tracker.

use std::time::Duration;

/// The name of the cursor that records the last tip height swept by the expiry scanner.
pub const EXPIRY_SCANNER_CURSOR: &str = "btc_expiry_scanner";

/// The default interval between two expiry scans.
pub const DEFAULT_EXPIRY_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// The default maximum number of markers handled in a single expiry scan.
pub const DEFAULT_EXPIRY_PAGE_SIZE: usize = 100;
