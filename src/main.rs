// Copyright (c) 2022 Huawei Technologies Co.,Ltd. All rights reserved.
//
// sysMaster is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan
// PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//         http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY
// KIND, EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO
// NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! kqwatch: watch descriptors, signals and timers and print what occurs

mod config;

use clap::Parser;
use config::{KqwatchConfig, WatchMode};
use kqueue::{Event, Kqueue, Occurrence, Status};
use std::process::exit;
use std::rc::Rc;

/// parse program arguments
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[clap(short, long)]
    config: Option<String>,

    /// Wait timeout in milliseconds, zero or less blocks
    #[clap(short, long)]
    timeout: Option<i64>,

    /// Exit after this many events, 0 runs until nothing is watched
    #[clap(short = 'n', long, default_value_t = 0)]
    count: u64,

    /// Watch edge-triggered
    #[clap(long, conflicts_with = "oneshot")]
    edge: bool,

    /// Watch oneshot
    #[clap(long)]
    oneshot: bool,

    /// Descriptor to watch for reading
    #[clap(long, value_name = "FD")]
    read: Vec<i32>,

    /// Descriptor to watch for writing
    #[clap(long, value_name = "FD")]
    write: Vec<i32>,

    /// Signal number to watch
    #[clap(long, value_name = "SIGNO")]
    signal: Vec<i32>,

    /// Timer period in seconds
    #[clap(long, value_name = "SECONDS")]
    timer: Vec<f64>,
}

impl Args {
    fn mode(&self, config: &KqwatchConfig) -> WatchMode {
        if self.edge {
            WatchMode::Edge
        } else if self.oneshot {
            WatchMode::Oneshot
        } else {
            config.Poll.mode()
        }
    }
}

/* watched signals must not terminate us, the queue still counts them */
fn ignore_signals(signals: &[i32]) {
    for &sig in signals {
        let mut sig_action: libc::sigaction = unsafe { std::mem::zeroed() };
        sig_action.sa_flags = libc::SA_RESTART;
        sig_action.sa_sigaction = libc::SIG_IGN;
        let r = unsafe { libc::sigaction(sig, &sig_action, std::ptr::null_mut()) };
        if r < 0 {
            log::warn!("Failed to ignore signal {}: {}", sig, nix::Error::last());
        }
    }
}

fn new_watch<F>(kq: &Rc<Kqueue<String>>, mode: WatchMode, f: F) -> kqueue::Result<Rc<Event<String>>>
where
    F: FnOnce(&Rc<Event<String>>) -> kqueue::Result<Status>,
{
    let ev = kq.new_event();
    match mode {
        WatchMode::Level => ev.as_level()?,
        WatchMode::Edge => ev.as_edge()?,
        WatchMode::Oneshot => ev.as_oneshot()?,
    };
    f(&ev)?;
    log::debug!("{} watched", ev);
    Ok(ev)
}

fn print_occurrence(occ: &Occurrence<String>) {
    let info = &occ.info;
    let mut markers = String::new();
    if info.edge {
        markers.push_str(" edge");
    }
    if info.oneshot {
        markers.push_str(" oneshot");
    }
    if info.eof {
        markers.push_str(" eof");
    }
    if let Some(errno) = info.error {
        markers.push_str(&format!(" error={}", nix::errno::Errno::from_i32(errno)));
    }

    println!(
        "{} ident={} filter={} flags={:#x} fflags={:#x} data={}{}",
        info.udata.as_deref().unwrap_or("-"),
        info.ident,
        info.filter,
        info.flags.bits(),
        info.fflags,
        info.data,
        markers
    );
}

fn run(args: &Args, config: &KqwatchConfig) -> kqueue::Result<()> {
    let kq: Rc<Kqueue<String>> = Kqueue::new()?;
    let mode = args.mode(config);
    ignore_signals(&args.signal);

    let mut watches = Vec::new();
    for &fd in &args.read {
        watches.push(new_watch(&kq, mode, |ev| {
            ev.as_read(fd, Some(format!("read:{}", fd)))
        })?);
    }
    for &fd in &args.write {
        watches.push(new_watch(&kq, mode, |ev| {
            ev.as_write(fd, Some(format!("write:{}", fd)))
        })?);
    }
    for &signo in &args.signal {
        watches.push(new_watch(&kq, mode, |ev| {
            ev.as_signal(signo, Some(format!("signal:{}", signo)))
        })?);
    }
    for (ident, &sec) in args.timer.iter().enumerate() {
        watches.push(new_watch(&kq, mode, |ev| {
            ev.as_timer(ident, sec, Some(format!("timer:{}", ident)))
        })?);
    }

    let timeout = args.timeout.unwrap_or(config.Poll.TimeoutMsec);
    log::info!("{} watching {} interests, timeout: {}ms", kq, kq.len(), timeout);

    let mut seen = 0;
    while !kq.is_empty() {
        if kq.wait(timeout)? == 0 {
            log::debug!("{}: no event within {}ms", kq, timeout);
            continue;
        }

        while let Some(occ) = kq.consume()? {
            print_occurrence(&occ);
            seen += 1;
            if args.count > 0 && seen >= args.count {
                return Ok(());
            }
        }
    }

    log::info!("nothing left to watch, {} events seen", seen);
    Ok(())
}

fn main() {
    let args = Args::parse();
    let config = KqwatchConfig::new(args.config.as_deref());
    log::init_log_with_target("kqwatch", config.Log.level(), &config.Log.Target);

    if let Err(e) = run(&args, &config) {
        log::error!("kqwatch failed: {}", e);
        exit(1);
    }
}
