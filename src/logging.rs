use std::{path::PathBuf, sync::OnceLock};

pub const COLOR_VAR: &str = "COLOR";
pub const LOG_SPEC_VAR: &str = "HYPRSTAT_LOG";
pub const LOG_FILE_VAR: &str = "HYPRSTAT_LOG_FILE";
const KITTY_FD_VAR: &str = "KITTY_STDIO_FORWARDED";
const DEFAULT_LOG_FILE: &str = "hyprstat.log";

static COLOR: OnceLock<bool> = OnceLock::new();

pub fn should_color() -> bool {
    COLOR.get().is_some_and(|it| *it)
}

fn parse_color(val: Option<&str>, is_terminal: impl FnOnce() -> bool) -> bool {
    match val.unwrap_or("auto") {
        "never" | "no" | "off" | "false" => false,
        "always" | "yes" | "on" | "true" => true,
        _ => is_terminal(),
    }
}

fn format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    let color = should_color();

    let line_display = record.line();
    let line_display = if let Some(line) = &line_display {
        format_args!("{}", *line)
    } else {
        format_args!("?")
    };

    let now_display = now.format("%Y-%m-%d %H:%M:%S");
    let now_display = if color {
        format_args!("\x1b[35m{now_display}\x1b[0m")
    } else {
        format_args!("{now_display}")
    };

    let level = record.level();
    let level_colored;
    let level_display = if color {
        level_colored = flexi_logger::style(level).paint(level.to_string());
        format_args!("{level_colored}")
    } else {
        format_args!("{level}")
    };

    write!(
        w,
        "[{now_display}] {} ({}) {level_display} [{}:{line_display}] {}",
        env!("CARGO_PKG_NAME"),
        std::process::id(),
        record.file().unwrap_or("<unknown>"),
        record.args(),
    )
}

#[derive(Debug, PartialEq, Eq)]
enum LogSink {
    File(PathBuf),
    Stderr,
}

/// Stderr is only used when it is not a terminal, since the bar takes over the
/// terminal and log lines would be drawn over it.
fn log_sink(lookup: impl Fn(&str) -> Option<String>, stderr_is_terminal: bool) -> LogSink {
    let lookup = |var: &str| lookup(var).filter(|val| !val.is_empty());
    if let Some(path) = lookup(LOG_FILE_VAR) {
        return LogSink::File(path.into());
    }
    if let Some(fd) = lookup(KITTY_FD_VAR).and_then(|fd| fd.parse::<std::os::fd::RawFd>().ok()) {
        return LogSink::File(format!("/proc/self/fd/{fd}").into());
    }
    if !stderr_is_terminal {
        return LogSink::Stderr;
    }
    let dir = lookup("XDG_RUNTIME_DIR").map_or_else(std::env::temp_dir, PathBuf::from);
    LogSink::File(dir.join(DEFAULT_LOG_FILE))
}

pub fn init_logger() {
    let doit = || -> anyhow::Result<()> {
        use flexi_logger::*;

        let log_spec = match std::env::var(LOG_SPEC_VAR) {
            Ok(spec) => LogSpecification::parse(&spec)?,
            Err(_) if cfg!(debug_assertions) => LevelFilter::Debug.into(),
            Err(_) => LevelFilter::Info.into(),
        };

        let stderr_is_terminal = std::io::IsTerminal::is_terminal(&std::io::stderr());
        let sink = log_sink(|var| std::env::var(var).ok(), stderr_is_terminal);

        let logger = Logger::with(log_spec).o_append(true).format(format);
        let logger = match &sink {
            LogSink::File(path) => logger.log_to_file(FileSpec::try_from(path.clone())?),
            LogSink::Stderr => logger.log_to_stderr(),
        };
        std::mem::forget(logger.start()?);

        let hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            log::error!("{info}");
            hook(info);
        }));

        let color = std::env::var(COLOR_VAR).ok();
        _ = COLOR.set(parse_color(color.as_deref(), || {
            sink == LogSink::Stderr && stderr_is_terminal
        }));

        Ok(())
    };
    match doit() {
        Ok(()) => log::info!("Started logger"),
        Err(err) => eprintln!("Failed to start logger: {err}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_setting() {
        assert!(!parse_color(Some("never"), || true));
        assert!(parse_color(Some("always"), || false));
        assert!(parse_color(None, || true));
        assert!(!parse_color(Some("auto"), || false));
    }

    fn env<'a>(vars: &'a [(&str, &str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |var| {
            vars.iter()
                .find(|(k, _)| *k == var)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn terminal_stderr_logs_to_runtime_dir() {
        let vars = [("XDG_RUNTIME_DIR", "/run/user/1000")];
        assert_eq!(
            log_sink(env(&vars), true),
            LogSink::File("/run/user/1000/hyprstat.log".into())
        );
        assert_eq!(log_sink(env(&vars), false), LogSink::Stderr);
    }

    #[test]
    fn configured_sinks_win_over_default() {
        let vars = [
            (LOG_FILE_VAR, "/tmp/bar.log"),
            (KITTY_FD_VAR, "3"),
            ("XDG_RUNTIME_DIR", "/run/user/1000"),
        ];
        assert_eq!(log_sink(env(&vars), true), LogSink::File("/tmp/bar.log".into()));
        assert_eq!(log_sink(env(&vars[1..]), true), LogSink::File("/proc/self/fd/3".into()));
        assert_eq!(
            log_sink(env(&[(KITTY_FD_VAR, "not-a-fd")]), false),
            LogSink::Stderr
        );
        assert_eq!(log_sink(env(&[(LOG_FILE_VAR, "")]), false), LogSink::Stderr);
    }
}
