//! Progress feedback for dqmctl
//!
//! Spinners are suppressed when:
//! - `--quiet` is passed
//! - `DQMCTL_QUIET=1` is set
//! - stderr is not a TTY (piped output)

use std::io::IsTerminal;
use std::sync::OnceLock;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

static QUIET_MODE: OnceLock<bool> = OnceLock::new();

/// Call once at startup with the --quiet flag value.
pub fn init_quiet_mode(quiet_flag: bool) {
    let env_quiet = std::env::var("DQMCTL_QUIET").map(|v| v == "1").unwrap_or(false);
    QUIET_MODE
        .set(resolve_quiet(quiet_flag, env_quiet, std::io::stderr().is_terminal()))
        .ok();
}

fn resolve_quiet(flag: bool, env: bool, stderr_is_tty: bool) -> bool {
    flag || env || !stderr_is_tty
}

pub fn is_quiet() -> bool {
    *QUIET_MODE.get().unwrap_or(&false)
}

fn plain_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// A spinner on stderr, or `None` in quiet mode.
pub fn spinner(msg: impl Into<String>) -> Option<ProgressBar> {
    if is_quiet() {
        return None;
    }

    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .map(|s| s.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "))
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let pb = ProgressBar::new_spinner();
    pb.set_style(style);
    pb.set_message(msg.into());
    pb.enable_steady_tick(Duration::from_millis(80));
    Some(pb)
}

pub fn finish_success(pb: Option<ProgressBar>, msg: impl Into<String>) {
    if let Some(pb) = pb {
        pb.set_style(plain_style());
        pb.finish_with_message(format!("✓ {}", msg.into()));
    }
}

pub fn finish_error(pb: Option<ProgressBar>, msg: impl Into<String>) {
    if let Some(pb) = pb {
        pb.set_style(plain_style());
        pb.finish_with_message(format!("✗ {}", msg.into()));
    }
}

/// Await `f` behind a spinner, finishing with `success_msg` or the error.
pub async fn with_spinner_async<T, E: std::fmt::Display>(
    msg: impl Into<String>,
    success_msg: impl FnOnce(&T) -> String,
    f: impl std::future::Future<Output = Result<T, E>>,
) -> Result<T, E> {
    let msg = msg.into();
    let pb = spinner(&msg);

    match f.await {
        Ok(result) => {
            finish_success(pb, success_msg(&result));
            Ok(result)
        }
        Err(e) => {
            finish_error(pb, format!("{}: {}", msg, e));
            Err(e)
        }
    }
}
