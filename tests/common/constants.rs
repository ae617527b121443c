//! Shared constants for end-to-end tests
//!
//! When routes, fixture payloads or timing change, update only this file.

// ============================================================================
// Request Data
// ============================================================================

/// A post URL the server accepts
pub const VALID_URL: &str = "https://www.instagram.com/p/ABC123/";

/// A reel URL the server accepts
pub const VALID_REEL_URL: &str = "https://instagram.com/reel/XYZ789/";

/// A URL on a host the server rejects
pub const FOREIGN_URL: &str = "https://example.com/p/ABC123/";

/// API key configured on servers that require one
pub const TEST_API_KEY: &str = "e2e-secret-key";

/// Bytes written by the scripted extractor as the produced media
pub const PRODUCED_MEDIA_BYTES: &[u8] = b"not really an mp4, but close enough";

/// Base name of the file the scripted extractor produces
pub const PRODUCED_MEDIA_ID: &str = "ABC123";

// ============================================================================
// Timing
// ============================================================================

/// Maximum time to wait for the server to accept connections
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Polling interval while waiting for the server
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// How often the events stream re-reads a job on test servers
pub const EVENTS_POLL_INTERVAL_MS: u64 = 20;

/// Request timeout for the test client
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Upper bound when waiting for a job to reach a terminal state
pub const JOB_SETTLE_TIMEOUT_MS: u64 = 5000;
