//! # Example: restart_loop
//!
//! A minimal restart loop built on top of [`ChildProcess`]: the record only stores
//! `delay_start` and `retry_times`; this loop reads them, waits, starts the command and
//! clones the record for the next attempt whenever the run fails.
//!
//! The command fails on its first two runs (it counts attempts in a marker file) and
//! succeeds on the third.
//!
//! ## Flow
//! ```text
//! loop
//!   ├─► policy = child.start_policy()
//!   ├─► sleep(policy.delay)
//!   ├─► child.start(); status = child.wait()
//!   ├─► succeeded?           ─► done
//!   ├─► !allows_retry(n)?    ─► give up
//!   └─► child = child.clone_child(); n += 1
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=childvisor=debug cargo run --example restart_loop
//! ```

use childvisor::{ChildProcess, Phase};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let marker = std::env::temp_dir().join(format!("childvisor-demo-{}", std::process::id()));
    let script = format!(
        "n=$(cat {m} 2>/dev/null || echo 0); n=$((n+1)); echo $n > {m}; \
         echo attempt $n; [ $n -ge 3 ]",
        m = marker.display()
    );

    let mut child = ChildProcess::new("sh", ["-c", script.as_str()]);
    child.set_delay_start(200);
    child.set_retry_times(5);

    let mut restarts = 0;
    loop {
        let policy = child.start_policy();
        tokio::time::sleep(policy.delay).await;

        let mut output = child.subscribe_output();
        child.start()?;
        child.wait().await;
        while let Ok(line) = output.try_recv() {
            println!("[child] {}", line.text);
        }

        let snap = child.to_json();
        println!("{}", snap.to_json_string()?);

        if child.phase() == Phase::Succeeded {
            println!("succeeded after {restarts} restart(s)");
            break;
        }
        if !policy.allows_retry(restarts) {
            println!("giving up after {restarts} restart(s)");
            break;
        }
        restarts += 1;
        child = child.clone_child();
    }

    let _ = std::fs::remove_file(&marker);
    Ok(())
}
