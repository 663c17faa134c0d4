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

//!
use log::{Level, Log};
use std::{io::Write, os::unix::net::UnixDatagram, sync::Mutex};

const SYSLOG_PATH: &str = "/dev/log";

fn write_msg_common(writer: &mut impl Write, level: Level, module: &str, msg: String) {
    let time: libc::time_t = unsafe { libc::time(std::ptr::null_mut()) };
    let mut tm = std::mem::MaybeUninit::<libc::tm>::zeroed();
    let now = unsafe {
        libc::localtime_r(&time, tm.as_mut_ptr());
        tm.assume_init()
    };
    let line = format!(
        "{:0>4}-{:0>2}-{:0>2} {:0>2}:{:0>2}:{:0>2} {} {} {}\n",
        now.tm_year + 1900, /* tm_year is years since 1900 */
        now.tm_mon + 1,     /* tm_mon is months since Jan: [0, 11] */
        now.tm_mday,
        now.tm_hour,
        now.tm_min,
        now.tm_sec,
        level,
        module,
        msg
    );

    if let Err(e) = writer.write_all(line.as_bytes()) {
        eprintln!("Failed to log message: {}", e);
    }
}

fn module_of<'a>(record: &'a log::Record) -> &'a str {
    match record.module_path() {
        None => "unknown",
        Some(v) => v,
    }
}

struct SysLogger {
    dgram: Mutex<UnixDatagram>,
}

impl SysLogger {
    fn new() -> Result<Self, std::io::Error> {
        let sock = UnixDatagram::unbound()?;
        sock.connect(SYSLOG_PATH)?;
        Ok(Self {
            dgram: Mutex::new(sock),
        })
    }
}

/* Only the very basic syslog function, no priority or facility. */
impl Log for SysLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let msg = format!("{} {}", module_of(record), record.args());
        let dgram = match self.dgram.lock() {
            Err(_) => return,
            Ok(v) => v,
        };
        if let Err(e) = dgram.send(msg.as_bytes()) {
            eprintln!("Failed to send message to syslogger: {}", e);
        }
    }

    fn flush(&self) {}
}

struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let mut stderr = std::io::stderr();
        write_msg_common(
            &mut stderr,
            record.level(),
            module_of(record),
            record.args().to_string(),
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Collect different kinds of loggers together.
///
/// Include: SysLogger, ConsoleLogger
struct CombinedLogger {
    loggers: Vec<Box<dyn Log>>,
}

impl Log for CombinedLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        for logger in &self.loggers {
            logger.log(record);
        }
    }

    fn flush(&self) {
        for logger in &self.loggers {
            logger.flush();
        }
    }
}

impl CombinedLogger {
    fn new() -> Self {
        Self {
            loggers: Vec::new(),
        }
    }

    fn push(&mut self, logger: Box<dyn Log>) {
        self.loggers.push(logger)
    }

    fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

/// Initialize the global static logger instance.
/// Available log `targets` include `syslog`, `console`.
///
/// The logger can be installed only once per process, later calls only
/// change the level.
///
/// # Arguments
///
/// * `name` - The application name that initializes the logger. Just used for debugging.
/// * `level` - Log message level.
/// * `targets` - A set of log targets.
pub fn init_log(name: &str, level: Level, targets: Vec<&str>) {
    log::set_max_level(level.to_level_filter());

    let mut combined_loggers = CombinedLogger::new();

    for target in targets {
        let logger = match target {
            "console" => Box::new(ConsoleLogger) as Box<dyn Log>,
            "syslog" => match SysLogger::new() {
                Ok(logger) => Box::new(logger) as Box<dyn Log>,
                Err(e) => {
                    eprintln!("{} failed to create syslogger: {:?}", name, e);
                    continue;
                }
            },
            _ => {
                eprintln!("{}: log target '{}' is strange, ignoring.", name, target);
                continue;
            }
        };

        combined_loggers.push(logger);
    }

    if combined_loggers.is_empty() {
        eprintln!("{}: no available log targets.", name);
        return;
    }

    if log::set_boxed_logger(Box::new(combined_loggers)).is_err() {
        log::debug!("{}: global logger is already set, only the level changed", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_msg_common() {
        let mut buf: Vec<u8> = Vec::new();
        write_msg_common(&mut buf, Level::Warn, "kqueue", "hello".to_string());
        let line = String::from_utf8(buf).unwrap();
        assert!(line.ends_with(" WARN kqueue hello\n"));
    }

    #[test]
    fn test_init_log_twice() {
        init_log("test", Level::Debug, vec!["console"]);
        log::info!("hello, info!");
        init_log("test", Level::Trace, vec!["console", "strange"]);
        log::trace!("hello, trace!");
    }
}
