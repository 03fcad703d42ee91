use std::time::Duration;

// =============================================================================
// SYNCHRONIZER TIMING
// =============================================================================

/// Interval between two polls of a request-bound endpoint
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Wait before reopening a push stream that failed or was closed
pub const STREAM_BACKOFF: Duration = Duration::from_secs(5);

/// Upper bound for request-bound API calls
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest a single push-stream read blocks before re-checking cancellation.
/// Also bounds the wait for stream response headers.
pub const STREAM_IDLE: Duration = Duration::from_secs(1);

/// How often a blocked stream reader re-checks its cancellation handle
pub const CANCEL_CHECK: Duration = Duration::from_millis(50);

/// Grace period given to background threads when tearing pages down
pub const TEARDOWN_GRACE: Duration = Duration::from_millis(1500);

/// Pause between a whole-group delay test and the providers refetch
pub const GROUP_TEST_SETTLE: Duration = Duration::from_secs(1);

/// Pause between closing a connection and the connections refetch
pub const CLOSE_SETTLE: Duration = Duration::from_millis(500);

// =============================================================================
// CONTROL COMMANDS
// =============================================================================

/// Target URL used by delay tests
pub const DELAY_TEST_URL: &str = "http://www.gstatic.com/generate_204";

/// Timeout passed to a whole-group delay test (milliseconds)
pub const GROUP_DELAY_TIMEOUT_MS: u32 = 3000;

/// Timeout passed to a single-node delay test (milliseconds)
pub const NODE_DELAY_TIMEOUT_MS: u32 = 5000;

/// Delay history entries kept per node after a local delay test
pub const MAX_DELAY_HISTORY: usize = 10;

// =============================================================================
// PAGES
// =============================================================================

/// How long a command's status line stays visible
pub const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// Lines kept by the log page ring
pub const LOG_RING_LINES: usize = 1000;

/// Bridge slot holding the proxy-core operating mode (rule / global / direct)
pub const MODE_KEY: &str = "mode";

/// Provider entry that mirrors every group's current selection
pub const DEFAULT_PROVIDER: &str = "default";

// =============================================================================
// EVENT LOOP
// =============================================================================

/// Longest the event loop blocks on the mutation queue before checking input again
pub const EVENT_POLL: Duration = Duration::from_millis(16);

/// Minimum time between two frames (~28fps)
pub const RENDER_THROTTLE: Duration = Duration::from_millis(36);
