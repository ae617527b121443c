//! Common test infrastructure for end-to-end tests
//!
//! This module provides the test server, the HTTP client and the shared
//! constants used across the e2e suite.
//!
//! # Example
//!
//! ```rust,ignore
//! mod common;
//! use common::{TestClient, TestServer, VALID_URL};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.start(VALID_URL).await;
//!     assert_eq!(response.status(), reqwest::StatusCode::OK);
//! }
//! ```

#![allow(dead_code)]

mod client;
mod constants;
mod extractor;
mod server;

pub use client::TestClient;
pub use constants::*;
pub use extractor::{ExtractorScript, ScriptedExtractor};
pub use server::{TestServer, TestServerOptions};
