//! log capture for asserting on emitted tracing events

use std::io;
use std::sync::{Arc, Mutex};

use tracing::subscriber::{DefaultGuard, set_default, with_default};
use tracing_subscriber::{Registry, fmt, layer::SubscriberExt};

/// Collects every formatted log line; one entry per event.
#[derive(Clone, Default)]
pub struct LogSink {
    lines: Arc<Mutex<Vec<String>>>,
}

struct SinkWriter(Arc<Mutex<Vec<String>>>);

impl io::Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogSink {
    /// Routes this thread's events into the sink until the guard drops.
    pub fn install(&self) -> DefaultGuard {
        set_default(self.subscriber())
    }

    /// Runs `f` with the sink installed and hands both back.
    pub fn scoped<F, T>(f: F) -> (Self, T)
    where
        F: FnOnce() -> T,
    {
        let sink = Self::default();
        let result = with_default(sink.subscriber(), f);
        (sink, result)
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// First line carrying the named event.
    pub fn find(&self, event: &str) -> Option<String> {
        self.lines().into_iter().find(|line| line.contains(event))
    }

    pub fn count(&self, event: &str) -> usize {
        self.lines()
            .iter()
            .filter(|line| line.contains(event))
            .count()
    }

    fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let lines = Arc::clone(&self.lines);
        Registry::default().with(
            fmt::Layer::default()
                .with_writer(move || SinkWriter(Arc::clone(&lines)))
                .with_target(false)
                .with_level(true)
                .with_ansi(false),
        )
    }
}
