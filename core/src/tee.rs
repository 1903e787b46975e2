use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;

use crate::error::WrapError;
use crate::queue::QueueProducer;

/// Longest run of bytes without a newline that is buffered before it is
/// forced out as a line of its own.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStream {
    Stdout,
    Stderr,
}

impl LineStream {
    pub fn label(self) -> &'static str {
        match self {
            LineStream::Stdout => "stdout",
            LineStream::Stderr => "stderr",
        }
    }
}

/// One line of child output, without its line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub text: String,
    pub stream: LineStream,
}

impl LogLine {
    pub fn new(text: impl Into<String>, stream: LineStream) -> Self {
        Self {
            text: text.into(),
            stream,
        }
    }
}

pub fn tee_stdout<R>(rd: R, queue: QueueProducer) -> JoinHandle<Result<u64, WrapError>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tee(rd, tokio::io::stdout(), queue, LineStream::Stdout)
}

pub fn tee_stderr<R>(rd: R, queue: QueueProducer) -> JoinHandle<Result<u64, WrapError>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tee(rd, tokio::io::stderr(), queue, LineStream::Stderr)
}

/// Reads `rd` to EOF, echoing every line to `wr` before enqueueing it.
///
/// Resolves to the number of lines read. Echo failures silence the echo but
/// keep forwarding; a closed queue keeps the echo but stops forwarding.
pub fn tee<R, W>(
    rd: R,
    wr: W,
    queue: QueueProducer,
    stream: LineStream,
) -> JoinHandle<Result<u64, WrapError>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(run_tee(rd, wr, queue, stream))
}

async fn run_tee<R, W>(
    mut rd: R,
    wr: W,
    queue: QueueProducer,
    stream: LineStream,
) -> Result<u64, WrapError>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let mut sink = LineSink {
        wr: Some(wr),
        queue: Some(queue),
        stream,
        lines: 0,
    };
    let mut buf = vec![0u8; 16 * 1024];
    let mut line_buf: Vec<u8> = Vec::with_capacity(8 * 1024);
    // Bytes of `line_buf` already known to hold no '\n'.
    let mut scanned = 0;

    loop {
        let n = rd.read(&mut buf).await.map_err(|e| WrapError::StreamIo {
            stream: stream.label(),
            source: e,
        })?;
        if n == 0 {
            break;
        }

        line_buf.extend_from_slice(&buf[..n]);
        while let Some(pos) = line_buf[scanned..].iter().position(|&b| b == b'\n') {
            let mut one = line_buf.drain(..=scanned + pos).collect::<Vec<u8>>();
            scanned = 0;
            trim_newline(&mut one);
            sink.emit(String::from_utf8_lossy(&one).into_owned()).await;
        }

        while line_buf.len() > MAX_LINE_BYTES {
            let cut = char_boundary_before(&line_buf, MAX_LINE_BYTES);
            let one = line_buf.drain(..cut).collect::<Vec<u8>>();
            sink.emit(String::from_utf8_lossy(&one).into_owned()).await;
        }
        scanned = line_buf.len();
    }

    // EOF flush: deliver the last partial line if it doesn't end with '\n'.
    if !line_buf.is_empty() {
        trim_newline(&mut line_buf);
        if !line_buf.is_empty() {
            sink.emit(String::from_utf8_lossy(&line_buf).into_owned()).await;
        }
    }

    tracing::debug!(stream = stream.label(), lines = sink.lines, "stream closed");
    Ok(sink.lines)
}

struct LineSink<W> {
    wr: Option<W>,
    queue: Option<QueueProducer>,
    stream: LineStream,
    lines: u64,
}

impl<W> LineSink<W>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    async fn emit(&mut self, text: String) {
        self.lines += 1;

        // The local echo must not wait on the queue.
        if let Some(wr) = self.wr.as_mut() {
            let mut echoed = Vec::with_capacity(text.len() + 1);
            echoed.extend_from_slice(text.as_bytes());
            echoed.push(b'\n');
            let res = match wr.write_all(&echoed).await {
                Ok(()) => wr.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = res {
                tracing::warn!(
                    error.kind = "tee.echo_failed",
                    stream = self.stream.label(),
                    error.message = %e,
                    "local echo disabled"
                );
                self.wr = None;
            }
        }

        if let Some(queue) = self.queue.as_ref() {
            if queue.enqueue(LogLine::new(text, self.stream)).await.is_err() {
                tracing::debug!(
                    stream = self.stream.label(),
                    "delivery stopped; further lines are echoed only"
                );
                self.queue = None;
            }
        }
    }
}

/// Largest index `<= max` that does not split a UTF-8 sequence. Needs `buf.len() > max`.
fn char_boundary_before(buf: &[u8], max: usize) -> usize {
    let mut cut = max;
    while cut > 0 && (buf[cut] & 0xC0) == 0x80 {
        cut -= 1;
    }
    if cut == 0 {
        max
    } else {
        cut
    }
}

fn trim_newline(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::queue::BoundedQueue;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn echoes_and_enqueues_each_line_in_order() {
        let (mut child_out, rd) = tokio::io::duplex(1024);
        let (echo_wr, mut echo_rd) = tokio::io::duplex(1024);
        let (tx, mut rx) = BoundedQueue::new(8).unwrap().split();

        let task = tee(rd, echo_wr, tx, LineStream::Stdout);
        child_out.write_all(b"alpha\r\nbeta\n\ngamma").await.unwrap();
        drop(child_out);

        assert_eq!(task.await.unwrap().unwrap(), 4);

        let mut echoed = String::new();
        echo_rd.read_to_string(&mut echoed).await.unwrap();
        assert_eq!(echoed, "alpha\nbeta\n\ngamma\n");

        let mut got = Vec::new();
        while let Some(line) = rx.dequeue().await {
            assert_eq!(line.stream, LineStream::Stdout);
            got.push(line.text);
        }
        assert_eq!(got, vec!["alpha", "beta", "", "gamma"]);
    }

    #[tokio::test]
    async fn echo_happens_before_blocking_on_full_queue() {
        let (mut child_out, rd) = tokio::io::duplex(1024);
        let (echo_wr, mut echo_rd) = tokio::io::duplex(1024);
        let (tx, mut rx) = BoundedQueue::new(1).unwrap().split();

        let task = tee(rd, echo_wr, tx, LineStream::Stderr);
        child_out.write_all(b"one\ntwo\n").await.unwrap();

        // Both lines reach the terminal while the second is still waiting for a slot.
        let mut echoed = vec![0u8; 8];
        tokio::time::timeout(Duration::from_secs(1), echo_rd.read_exact(&mut echoed))
            .await
            .expect("echo stalled behind the queue")
            .unwrap();
        assert_eq!(&echoed, b"one\ntwo\n");
        assert!(!task.is_finished());

        assert_eq!(rx.dequeue().await.unwrap().text, "one");
        assert_eq!(rx.dequeue().await.unwrap().text, "two");
        drop(child_out);
        assert_eq!(task.await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn keeps_echoing_after_queue_closes() {
        let (mut child_out, rd) = tokio::io::duplex(1024);
        let (echo_wr, mut echo_rd) = tokio::io::duplex(1024);
        let (tx, rx) = BoundedQueue::new(4).unwrap().split();
        drop(rx);

        let task = tee(rd, echo_wr, tx, LineStream::Stdout);
        child_out.write_all(b"still\nvisible\n").await.unwrap();
        drop(child_out);

        assert_eq!(task.await.unwrap().unwrap(), 2);
        let mut echoed = String::new();
        echo_rd.read_to_string(&mut echoed).await.unwrap();
        assert_eq!(echoed, "still\nvisible\n");
    }

    #[tokio::test]
    async fn flushes_last_line_without_newline_on_eof() {
        let (mut wr, rd) = tokio::io::duplex(1024);
        let (tx, mut rx) = BoundedQueue::new(8).unwrap().split();

        let task = tee(rd, tokio::io::sink(), tx, LineStream::Stdout);

        wr.write_all(b"hello").await.unwrap();
        drop(wr);

        let line = rx.dequeue().await.expect("expected one line");
        assert_eq!(line.text, "hello");
        assert_eq!(line.stream, LineStream::Stdout);

        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn splits_runaway_line_at_limit() {
        let (mut wr, rd) = tokio::io::duplex(4096);
        let (tx, mut rx) = BoundedQueue::new(8).unwrap().split();

        let task = tee(rd, tokio::io::sink(), tx, LineStream::Stdout);

        let writer = tokio::spawn(async move {
            wr.write_all(&vec![b'a'; 150_000]).await.unwrap();
            wr.write_all(b"\nend\n").await.unwrap();
        });

        let mut lens = Vec::new();
        while let Some(line) = rx.dequeue().await {
            lens.push(line.text.len());
            if line.text == "end" {
                break;
            }
        }
        writer.await.unwrap();
        assert_eq!(
            lens,
            vec![MAX_LINE_BYTES, MAX_LINE_BYTES, 150_000 - 2 * MAX_LINE_BYTES, 3]
        );
        assert_eq!(task.await.unwrap().unwrap(), 4);
    }

    #[test]
    fn forced_split_keeps_multibyte_chars_whole() {
        // 'é' is two bytes; the limit falls on its second byte.
        let mut buf = vec![b'a'; 3];
        buf.extend_from_slice("é".as_bytes());
        buf.push(b'b');
        assert_eq!(char_boundary_before(&buf, 4), 3);
        assert_eq!(char_boundary_before(&buf, 3), 3);
        assert_eq!(char_boundary_before(&buf, 2), 2);
    }
}
