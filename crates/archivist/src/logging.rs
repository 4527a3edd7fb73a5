//! Tracing setup: terminal output plus the local system log.
//!
//! Messages the pipeline sends to its log sink arrive as `tracing` events on
//! [`SINK_TARGET`]. Those are also written to `/dev/log` as RFC 3164
//! datagrams tagged `archivist[<pid>]:`.

use std::io::{self, Write};
use std::os::unix::net::UnixDatagram;
use std::path::Path;
use tracing::{Level, Metadata};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Target used by `archivist_core::TracingSink`
pub const SINK_TARGET: &str = "archivist::sink";

/// Local syslog socket
pub const SYSLOG_SOCKET: &str = "/dev/log";

/// syslog facility `user`
const FACILITY_USER: u8 = 1;

/// Largest datagram sent to the system log; longer messages are cut.
pub const MAX_DATAGRAM_LEN: usize = 8192;

/// Appended to a message that was cut to fit [`MAX_DATAGRAM_LEN`]
pub const TRUNCATION_MARKER: &str = " [truncated]";

/// Initialize tracing with appropriate verbosity
pub fn init(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let syslog = Syslog::connect(Path::new(SYSLOG_SOCKET), env!("CARGO_BIN_NAME")).ok();
    let syslog_available = syslog.is_some();
    let syslog_layer = syslog.map(|writer| {
        fmt::layer()
            .without_time()
            .with_target(false)
            .with_level(false)
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(Targets::new().with_target(SINK_TARGET, Level::INFO))
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(io::stderr)
                .with_filter(filter),
        )
        .with(syslog_layer)
        .init();

    if !syslog_available {
        tracing::debug!("{} unavailable; system log output disabled", SYSLOG_SOCKET);
    }
}

/// Writer factory producing one syslog datagram per event.
#[derive(Debug)]
pub struct Syslog {
    socket: UnixDatagram,
    tag: String,
}

impl Syslog {
    /// Connects to a datagram syslog socket.
    pub fn connect(socket_path: &Path, program: &str) -> io::Result<Self> {
        let socket = UnixDatagram::unbound()?;
        socket.connect(socket_path)?;
        Ok(Self::with_socket(socket, program))
    }

    fn with_socket(socket: UnixDatagram, program: &str) -> Self {
        Self {
            socket,
            tag: format!("{}[{}]", program, std::process::id()),
        }
    }

    fn message(&self, severity: u8) -> SyslogMessage<'_> {
        SyslogMessage {
            syslog: self,
            severity,
            buf: Vec::new(),
        }
    }
}

/// Maps a tracing level onto a syslog severity.
fn severity(level: &Level) -> u8 {
    match *level {
        Level::ERROR => 3,
        Level::WARN => 4,
        Level::INFO => 6,
        _ => 7,
    }
}

impl<'a> MakeWriter<'a> for Syslog {
    type Writer = SyslogMessage<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        self.message(severity(&Level::INFO))
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        self.message(severity(meta.level()))
    }
}

/// Buffers one formatted event and sends it when dropped.
pub struct SyslogMessage<'a> {
    syslog: &'a Syslog,
    severity: u8,
    buf: Vec<u8>,
}

impl SyslogMessage<'_> {
    fn datagram(&self) -> Option<Vec<u8>> {
        let text = String::from_utf8_lossy(&self.buf);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let priority = FACILITY_USER * 8 + self.severity;
        let header = format!("<{}>{}: ", priority, self.syslog.tag);

        let budget = MAX_DATAGRAM_LEN.saturating_sub(header.len());
        let mut datagram = header;
        if text.len() <= budget {
            datagram.push_str(text);
        } else {
            let mut end = budget.saturating_sub(TRUNCATION_MARKER.len());
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            datagram.push_str(&text[..end]);
            datagram.push_str(TRUNCATION_MARKER);
        }
        Some(datagram.into_bytes())
    }
}

impl Write for SyslogMessage<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SyslogMessage<'_> {
    fn drop(&mut self) {
        if let Some(datagram) = self.datagram() {
            // The system log is best effort; a full or vanished socket drops the message.
            let _ = self.syslog.socket.send(&datagram);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(program: &str) -> (Syslog, UnixDatagram) {
        let (ours, theirs) = UnixDatagram::pair().unwrap();
        (Syslog::with_socket(ours, program), theirs)
    }

    fn receive(socket: &UnixDatagram) -> String {
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN * 2];
        let n = socket.recv(&mut buf).unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[test]
    fn test_info_datagram_format() {
        let (syslog, receiver) = pair("archivist");
        {
            let mut writer = syslog.make_writer();
            writer.write_all(b"error creating backup: boom\n").unwrap();
        }

        let expected = format!("<14>archivist[{}]: error creating backup: boom", std::process::id());
        assert_eq!(receive(&receiver), expected);
    }

    #[test]
    fn test_multiline_message_is_one_datagram() {
        let (syslog, receiver) = pair("archivist");
        {
            let mut writer = syslog.make_writer();
            writer
                .write_all(b"error output during execution: one\ntwo\n")
                .unwrap();
        }

        assert!(receive(&receiver).ends_with("error output during execution: one\ntwo"));
    }

    #[test]
    fn test_oversize_message_is_truncated() {
        let (syslog, receiver) = pair("archivist");
        let line = "cpio: data/missing: Cannot stat: No such file or directory\n";
        let message = format!("error output during execution: {}", line.repeat(5000));
        assert!(message.len() > 256 * 1024);
        {
            let mut writer = syslog.make_writer();
            writer.write_all(message.as_bytes()).unwrap();
        }

        let received = receive(&receiver);
        assert!(received.len() <= MAX_DATAGRAM_LEN);
        assert!(received.starts_with("<14>archivist["));
        assert!(received.contains("error output during execution: cpio: data/missing"));
        assert!(received.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let (syslog, receiver) = pair("archivist");
        {
            let mut writer = syslog.make_writer();
            writer.write_all("é".repeat(MAX_DATAGRAM_LEN).as_bytes()).unwrap();
        }

        let received = receive(&receiver);
        assert!(received.len() <= MAX_DATAGRAM_LEN);
        assert!(received.ends_with(TRUNCATION_MARKER));
        assert!(!received.contains('\u{fffd}'));
    }

    #[test]
    fn test_empty_event_sends_nothing() {
        let (syslog, receiver) = pair("archivist");
        drop(syslog.make_writer());

        receiver.set_nonblocking(true).unwrap();
        let mut buf = [0u8; 16];
        assert!(receiver.recv(&mut buf).is_err());
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(severity(&Level::ERROR), 3);
        assert_eq!(severity(&Level::WARN), 4);
        assert_eq!(severity(&Level::INFO), 6);
        assert_eq!(severity(&Level::DEBUG), 7);
        assert_eq!(severity(&Level::TRACE), 7);
    }

    #[test]
    fn test_connect_to_missing_socket_fails() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        assert!(Syslog::connect(&temp_dir.path().join("no-log"), "archivist").is_err());
    }
}
