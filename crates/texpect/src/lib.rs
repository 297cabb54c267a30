//! texpect: expect-style waits across many terminal sessions at once
//!
//! This crate drives several long-lived terminal sessions (shells, remote
//! logins) through a terminal multiplexer and blocks until expected output
//! shows up in any of them.
//!
//! # Features
//!
//! - **Log tailing** of each session's append-only output log, driven by
//!   filesystem notifications (`notify`)
//! - **Fan-in** of every session's lines into one stream, FIFO per source
//! - **Pattern waits** with substring or regex targets and optional timeouts
//! - **tmux sessions** created, fed and torn down through [`Multiplexer`]
//! - **Blocking facade** ([`SyncDriver`]) for synchronous script runtimes
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use texpect::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ExpectError> {
//!     let mut driver = Driver::from_config(&Config::from_env()?);
//!     driver.spawn("backup", "ssh backup01").await?;
//!     driver.send("backup", "./run-backup.sh").await?;
//!
//!     let outcome = driver
//!         .expect_any(["backup1 completed", "backup failed"], Some(Duration::from_secs(600)))
//!         .await;
//!     println!("status: {}", outcome.status_code());
//!
//!     driver.exit().await?;
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod config;
pub mod encoding;
pub mod error;
pub mod host;
pub mod line;
pub mod logging;
pub mod pattern;
pub mod prelude;
pub mod session;
pub mod sync;
pub mod tailer;
pub mod wait;

pub use aggregator::Aggregator;
pub use config::{
    Config, EnvConfig, LogFormat, LoggingConfig, SessionConfig, TimeoutConfig, WatchConfig,
};
pub use encoding::{clean_line, strip_ansi};
pub use error::{ExpectError, Result, SessionError};
pub use host::Driver;
pub use line::{Line, LineSplitter};
pub use pattern::{CompiledRegex, Pattern, PatternSet};
pub use session::{Multiplexer, SessionRegistry, Tmux, Window, log_file_name};
pub use sync::SyncDriver;
pub use tailer::{Tailer, TailerHandle};
pub use wait::{Deadline, ExpectOutcome, STATUS_SHUTDOWN, STATUS_TIMED_OUT, WaitOutcome, Waiter};
