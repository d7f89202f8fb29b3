use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, ReadBuf};

/// Callback receiving whole percentages (0..=100).
#[derive(Clone)]
pub struct ProgressSink(Arc<dyn Fn(u8) + Send + Sync>);

impl ProgressSink {
    pub fn new(f: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn report(&self, percent: u8) {
        (self.0)(percent.min(100));
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressSink(..)")
    }
}

/// Reader adapter that reports how much of `total` bytes has been read.
///
/// Percentages are only reported when they grow, and EOF always reports 100,
/// so a sink sees a non-decreasing sequence ending at 100.
pub struct ProgressReader<R> {
    inner: R,
    sink: ProgressSink,
    read: u64,
    total: u64,
    last: Option<u8>,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, total: u64, sink: ProgressSink) -> Self {
        Self {
            inner,
            sink,
            read: 0,
            total,
            last: None,
        }
    }

    fn emit(&mut self, percent: u8) {
        if self.last.is_none_or(|last| percent > last) {
            self.last = Some(percent);
            self.sink.report(percent);
        }
    }
}

fn percent_of(read: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (read.saturating_mul(100) / total).min(100) as u8
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        let n = buf.filled().len() - before;

        if n == 0 {
            this.emit(100);
        } else {
            this.read += n as u64;
            let percent = percent_of(this.read, this.total);
            this.emit(percent);
        }
        Poll::Ready(Ok(()))
    }
}
