//! Fire-and-forget blink notification.
//!
//! The worker thread calls [`Notifier::signal`] once per counted blink. It
//! must never block frame processing, so the serial implementation hands
//! each signal to a dedicated writer thread through a small bounded queue.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Sender, TrySendError};
use nix::errno::Errno;
use nix::sys::termios::{self, BaudRate, ControlFlags, SetArg};
use thiserror::Error;

/// Byte written to the serial line for each blink.
pub const BLINK_BYTE: u8 = b'B';
/// Line speed the blink receiver expects.
pub const SERIAL_BAUD: BaudRate = BaudRate::B115200;
/// Signals that may wait for the writer thread before new ones are refused.
const QUEUE_CAPACITY: usize = 8;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("failed to open notifier device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to configure serial line {path}: {source}")]
    Configure {
        path: PathBuf,
        #[source]
        source: Errno,
    },
    #[error("failed to spawn notifier thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("notifier queue full, signal dropped")]
    QueueFull,
    #[error("notifier writer has stopped")]
    Disconnected,
}

/// External signal raised on each detected blink.
pub trait Notifier: Send + Sync {
    fn signal(&self) -> Result<(), NotifyError>;
}

/// Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn signal(&self) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Counts signals. Useful in tests and for diagnostics.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    count: AtomicU64,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingNotifier {
    fn signal(&self) -> Result<(), NotifyError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Writes [`BLINK_BYTE`] to a serial device (e.g. a microcontroller driving
/// an LED) from a background thread.
///
/// A terminal device is switched to raw 115200 8N1 with hang-up on close
/// disabled; DTR stays asserted when the daemon exits.
/// Non-terminal paths (a FIFO, a plain file) are written as-is. Dropping the
/// notifier flushes queued signals and joins the writer.
pub struct SerialNotifier {
    path: PathBuf,
    tx: Option<Sender<()>>,
    writer: Option<JoinHandle<()>>,
}

impl SerialNotifier {
    pub fn open(path: &Path) -> Result<Self, NotifyError> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|source| NotifyError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        configure_line(&file, path)?;
        Self::spawn(path.to_path_buf(), file)
    }

    fn spawn(path: PathBuf, mut file: File) -> Result<Self, NotifyError> {
        let (tx, rx) = bounded::<()>(QUEUE_CAPACITY);
        let label = path.display().to_string();
        let writer = std::thread::Builder::new()
            .name("irisgate-notifier".into())
            .spawn(move || {
                for () in rx.iter() {
                    if let Err(e) = file.write_all(&[BLINK_BYTE]).and_then(|_| file.flush()) {
                        tracing::warn!(device = %label, error = %e, "notifier write failed");
                    }
                }
            })
            .map_err(NotifyError::Spawn)?;

        tracing::info!(device = %path.display(), "serial notifier ready");
        Ok(Self {
            path,
            tx: Some(tx),
            writer: Some(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn configure_line(file: &File, path: &Path) -> Result<(), NotifyError> {
    let configure = || -> nix::Result<()> {
        let mut tio = termios::tcgetattr(file)?;
        termios::cfmakeraw(&mut tio);
        termios::cfsetspeed(&mut tio, SERIAL_BAUD)?;
        tio.control_flags.remove(ControlFlags::HUPCL);
        tio.control_flags.insert(ControlFlags::CLOCAL);
        termios::tcsetattr(file, SetArg::TCSANOW, &tio)
    };
    match configure() {
        Ok(()) => {
            tracing::debug!(device = %path.display(), "serial line set to 115200 raw");
            Ok(())
        }
        Err(Errno::ENOTTY) => {
            tracing::debug!(device = %path.display(), "not a terminal, skipping line setup");
            Ok(())
        }
        Err(source) => Err(NotifyError::Configure {
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl Notifier for SerialNotifier {
    fn signal(&self) -> Result<(), NotifyError> {
        let Some(tx) = &self.tx else {
            return Err(NotifyError::Disconnected);
        };
        tx.try_send(()).map_err(|e| match e {
            TrySendError::Full(_) => NotifyError::QueueFull,
            TrySendError::Disconnected(_) => NotifyError::Disconnected,
        })
    }
}

impl Drop for SerialNotifier {
    fn drop(&mut self) {
        // Closing the channel ends the writer loop once the queue drains.
        self.tx.take();
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "irisgate-notifier-test-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn test_noop_always_succeeds() {
        assert!(NoopNotifier.signal().is_ok());
    }

    #[test]
    fn test_recording_counts() {
        let n = RecordingNotifier::new();
        n.signal().unwrap();
        n.signal().unwrap();
        assert_eq!(n.count(), 2);
    }

    #[test]
    fn test_serial_writes_one_byte_per_signal() {
        let path = temp_path("write");
        fs::write(&path, b"").unwrap();

        let notifier = SerialNotifier::open(&path).unwrap();
        notifier.signal().unwrap();
        notifier.signal().unwrap();
        notifier.signal().unwrap();
        drop(notifier);

        assert_eq!(fs::read(&path).unwrap(), b"BBB");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_line_setup_skips_non_terminals() {
        let path = temp_path("plain");
        fs::write(&path, b"").unwrap();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        assert!(configure_line(&file, &path).is_ok());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_serial_open_missing_device_fails() {
        let path = temp_path("missing").join("ttyUSB0");
        let err = SerialNotifier::open(&path).err().unwrap();
        assert!(matches!(err, NotifyError::Open { .. }));
    }

    #[test]
    fn test_usable_as_trait_object() {
        let notifiers: Vec<Box<dyn Notifier>> =
            vec![Box::new(NoopNotifier), Box::new(RecordingNotifier::new())];
        for n in &notifiers {
            n.signal().unwrap();
        }
    }
}
