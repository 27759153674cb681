//! Progress reporting for long-running operations.

use std::fmt;

/// One progress update. `pct` runs from 0 to 100 over the whole operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub pct: f64,
    pub msg: String,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:3.0}% {}", self.pct, self.msg)
    }
}

pub type ProgressFn<'a> = Box<dyn FnMut(&Progress) + 'a>;

/// Forwards updates to an optional callback.
pub(crate) struct Reporter<'a> {
    sink: Option<ProgressFn<'a>>,
}

impl<'a> Reporter<'a> {
    pub(crate) fn new(sink: Option<ProgressFn<'a>>) -> Self {
        Self { sink }
    }

    pub(crate) fn report(&mut self, pct: f64, msg: impl Into<String>) {
        if let Some(sink) = self.sink.as_mut() {
            sink(&Progress { pct, msg: msg.into() });
        }
    }

    /// A callback for remote progress text that maps the remote's own
    /// percentage into `start..start + 100 * fraction` of this operation.
    pub(crate) fn chunk(&mut self, start: f64, fraction: f64) -> Box<dyn FnMut(&str) + '_> {
        Box::new(move |text: &str| {
            let inner = remote_percent(text).unwrap_or(0.0);
            self.report(start + inner * fraction, text);
        })
    }
}

/// The last `NN%` in a line such as `Receiving objects:  45% (9/20)`.
fn remote_percent(text: &str) -> Option<f64> {
    let end = text.rfind('%')?;
    let digits = text[..end]
        .bytes()
        .rev()
        .take_while(u8::is_ascii_digit)
        .count();
    text[end - digits..end].parse::<f64>().ok().map(|p| p.min(100.0))
}
