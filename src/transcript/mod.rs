//! Transcript accumulation across recognition task lifetimes.
//!
//! One accumulator serves a whole session: `finalized` only grows until
//! the next session resets it, while `hypothesis` is local to the
//! current recognition task. The exposed text is always
//! `finalized + hypothesis`, concatenated with no separator.

use crate::recognize::RecognitionEvent;

type ChangeCallback = Box<dyn Fn(&str) + Send + Sync>;

pub struct TranscriptAccumulator {
    finalized: String,
    hypothesis: String,
    on_change: ChangeCallback,
}

impl TranscriptAccumulator {
    /// `on_change` receives the merged text on every emission.
    pub fn new(on_change: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            finalized: String::new(),
            hypothesis: String::new(),
            on_change: Box::new(on_change),
        }
    }

    /// The merged text: finalized followed by the live hypothesis.
    pub fn text(&self) -> String {
        let mut merged = String::with_capacity(self.finalized.len() + self.hypothesis.len());
        merged.push_str(&self.finalized);
        merged.push_str(&self.hypothesis);
        merged
    }

    pub fn finalized(&self) -> &str {
        &self.finalized
    }

    pub fn hypothesis(&self) -> &str {
        &self.hypothesis
    }

    /// Dispatch one engine event to its handler.
    pub fn apply(&mut self, event: &RecognitionEvent) {
        match event {
            RecognitionEvent::Hypothesis(text) => self.on_hypothesis(text),
            RecognitionEvent::Final(text) => self.on_final(text),
            RecognitionEvent::Cancelled => self.on_cancelled(),
            RecognitionEvent::Drained => self.on_drained(),
        }
    }

    /// Replace the live hypothesis wholesale. Identical consecutive
    /// hypotheses are suppressed and emit nothing.
    pub fn on_hypothesis(&mut self, text: &str) {
        if self.hypothesis != text {
            self.hypothesis.clear();
            self.hypothesis.push_str(text);
            let merged = self.text();
            (self.on_change)(&merged);
        }
    }

    /// Append settled text unconditionally (no dedup) and emit the
    /// finalized text. The settled text supersedes the hypothesis it
    /// grew from; leaving it in place would repeat it in the drained
    /// snapshot.
    pub fn on_final(&mut self, text: &str) {
        if !text.is_empty() {
            self.finalized.push_str(text);
            self.hypothesis.clear();
            (self.on_change)(&self.finalized);
        }
    }

    /// Merge the live hypothesis into the finalized text without
    /// emitting; the merged value becomes visible on the next emission.
    /// Idempotent.
    pub fn on_cancelled(&mut self) {
        self.merge_hypothesis();
    }

    /// Emit the definitive snapshot for a task that consumed all its
    /// input. Idempotent.
    pub fn on_drained(&mut self) {
        let merged = self.text();
        (self.on_change)(&merged);
    }

    /// Bookkeeping at the start of a recognition task: the hypothesis
    /// is task-local, so any text left over from the previous task is
    /// merged rather than discarded. A no-op when the previous task's
    /// cancellation already merged it.
    pub fn begin_task(&mut self) {
        self.merge_hypothesis();
    }

    /// Clear everything for a brand-new session and emit the now-empty
    /// text.
    pub fn reset(&mut self) {
        self.finalized.clear();
        self.hypothesis.clear();
        (self.on_change)("");
    }

    fn merge_hypothesis(&mut self) {
        let hypothesis = std::mem::take(&mut self.hypothesis);
        self.finalized.push_str(&hypothesis);
    }
}
