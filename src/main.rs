mod cli;
mod error;
mod link;

use std::{io, mem, ptr, sync::Arc, thread};

use anyhow::Context;
use clap::Parser as _;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::{
    cli::Cli,
    link::{LinkMonitor, ShutdownEventFd},
};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    info!(
        event.name = "link_monitor.daemon_started",
        "link monitor daemon is now running"
    );

    let mut monitor = LinkMonitor::new().context("initialization failed")?;
    spawn_signal_thread(monitor.shutdown_handle()).context("failed to start signal handling")?;

    if let Err(e) = monitor.run() {
        error!(
            event.name = "link_monitor.fatal",
            error = %e,
            "terminating due to an error"
        );
        return Err(e.into());
    }
    Ok(())
}

fn init_tracing(log_level: Level) {
    let mut fmt_layer = fmt::layer().with_ansi(std::env::var("NO_COLOR").is_err());

    match log_level {
        Level::DEBUG => fmt_layer = fmt_layer.with_file(true).with_line_number(true),
        Level::TRACE => {
            fmt_layer = fmt_layer
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
        }
        _ => {}
    }

    let filter = EnvFilter::new(format!("warn,linkwatch={log_level}"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Route SIGINT and SIGTERM to the shutdown eventfd.
///
/// The signals are blocked in the calling thread before the handler thread
/// starts, so delivery always lands in the `sigwait` below; threads spawned
/// afterwards inherit the mask. The monitor loop keeps running until the
/// eventfd wakes its poll.
fn spawn_signal_thread(shutdown: Arc<ShutdownEventFd>) -> io::Result<thread::JoinHandle<()>> {
    // SAFETY: sigset_t is a C-compatible struct that is safe to
    // zero-initialize; the sigset calls only touch the set handed to them
    // and pthread_sigmask's result is checked.
    let set = unsafe {
        let mut set: libc::sigset_t = mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGINT);
        libc::sigaddset(&mut set, libc::SIGTERM);
        if libc::pthread_sigmask(libc::SIG_BLOCK, &set, ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
        set
    };

    thread::Builder::new()
        .name("linkwatch-signals".to_string())
        .spawn(move || {
            let mut sig: libc::c_int = 0;
            // SAFETY: set holds the signals blocked above; sig receives the
            // delivered signal number.
            let ret = unsafe { libc::sigwait(&set, &mut sig) };
            if ret != 0 {
                error!(
                    event.name = "link_monitor.sigwait_failed",
                    code = ret,
                    "sigwait failed, termination signals will not be handled"
                );
                return;
            }
            info!(
                event.name = "link_monitor.signal_received",
                signal = sig,
                "termination signal received, requesting shutdown"
            );
            if let Err(e) = shutdown.signal() {
                error!(
                    event.name = "link_monitor.shutdown_wake_failed",
                    error = %e,
                    "failed to wake the monitor loop"
                );
            }
        })
}
