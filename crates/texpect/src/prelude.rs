//! Convenient re-exports for common texpect usage.
//!
//! # Example
//!
//! ```ignore
//! use texpect::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut driver = Driver::from_config(&Config::default());
//!     driver.spawn("shell", "bash").await?;
//!     driver.send("shell", "echo hello").await?;
//!     assert!(driver.expect("hello", None).await.is_matched());
//!     Ok(())
//! }
//! ```

// Configuration
pub use crate::config::{Config, LogFormat, LoggingConfig, SessionConfig, TimeoutConfig, WatchConfig};

// Error handling
pub use crate::error::{ExpectError, Result, SessionError};

// Lines and the aggregate stream
pub use crate::aggregator::Aggregator;
pub use crate::line::Line;

// Waiting
pub use crate::pattern::{Pattern, PatternSet};
pub use crate::wait::{ExpectOutcome, WaitOutcome, Waiter};

// Sessions
pub use crate::host::Driver;
pub use crate::session::{Multiplexer, Tmux};
pub use crate::sync::SyncDriver;
