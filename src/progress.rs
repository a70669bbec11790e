/// Caller-supplied progress predicate: receives completion in `[0, 1]`, returns
/// `false` to abandon the run.
pub type ProgressFn<'a> = dyn FnMut(f32) -> bool + Send + 'a;

/// Marker returned by [`CancelToken::checkpoint`] once the predicate asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Cooperative cancellation token polled at batch and iteration boundaries.
///
/// Each stage maps its local completion onto a sub-span of the overall `[0, 1]`
/// range before the predicate sees it. Once cancelled, the token stays cancelled
/// and every later checkpoint fails without calling the predicate again.
pub struct CancelToken<'a> {
    predicate: Option<&'a mut ProgressFn<'a>>,
    span_start: f32,
    span_end: f32,
    cancelled: bool,
}

impl<'a> CancelToken<'a> {
    pub fn new(predicate: Option<&'a mut ProgressFn<'a>>) -> Self {
        Self {
            predicate,
            span_start: 0.0,
            span_end: 1.0,
            cancelled: false,
        }
    }

    /// A token that never cancels.
    pub fn never() -> Self {
        Self::new(None)
    }

    /// Restrict subsequent checkpoints to `[start, end]` of the overall progress.
    pub fn set_span(&mut self, start: f32, end: f32) {
        self.span_start = start.clamp(0.0, 1.0);
        self.span_end = end.clamp(self.span_start, 1.0);
    }

    /// Report `local` completion of the current span and poll for cancellation.
    pub fn checkpoint(&mut self, local: f32) -> Result<(), Cancelled> {
        if self.cancelled {
            return Err(Cancelled);
        }
        let Some(predicate) = self.predicate.as_mut() else {
            return Ok(());
        };

        let local = if local.is_finite() { local.clamp(0.0, 1.0) } else { 0.0 };
        let overall = self.span_start + local * (self.span_end - self.span_start);
        if predicate(overall) {
            Ok(())
        } else {
            self.cancelled = true;
            Err(Cancelled)
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}
