//! Multi-session example.
//!
//! Opens two tmux windows, starts a slow job in each and waits for whichever
//! finishes first. Must be run from inside a tmux session.
//!
//! Run with: `cargo run --example multi_session`
//!
//! Settings come from `TEXPECT_*` environment variables, e.g.
//! `TEXPECT_LOG_DIR=/tmp/texpect TEXPECT_LOG_LEVEL=texpect=debug`.

use std::time::Duration;

use texpect::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    texpect::logging::init(&config.logging)?;

    let mut driver = Driver::from_config(&config);

    println!("texpect Multi-Session Example");
    println!("=============================\n");

    let fast = driver.spawn("backup1", "sh").await?;
    let slow = driver.spawn("backup2", "sh").await?;
    println!("Logging to {} and {}", fast.display(), slow.display());

    // The pane echoes typed keys, so the quotes keep the command line itself
    // from matching.
    driver.sleep(Duration::from_secs(1)).await;
    driver.send("backup1", r#"sleep 2; echo backup1 "completed""#).await?;
    driver.send("backup2", r#"sleep 4; echo backup2 "completed""#).await?;

    let outcome = driver
        .expect_any(
            ["backup1 completed", "backup2 completed"],
            Some(Duration::from_secs(10)),
        )
        .await;
    match &outcome {
        WaitOutcome::Matched { index, line } => {
            println!("Pattern {index} matched in {}: {line}", line.source().display());
        }
        WaitOutcome::TimedOut => println!("Nothing finished in time"),
        WaitOutcome::Shutdown => println!("Stopped"),
    }

    // The other job is still running; wait for it with a regex.
    let rest = driver
        .expect(Pattern::regex(r"backup\d completed")?, Some(Duration::from_secs(10)))
        .await;
    println!("Second job: status {}", rest.status_code());

    driver.exit().await?;
    driver.shutdown();
    Ok(())
}
