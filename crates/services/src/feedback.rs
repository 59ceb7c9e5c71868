use quiz_core::grading::Verdict;

/// Receives the correct/incorrect signal right after each validation.
///
/// Called synchronously from the validation path, so implementations must
/// not block.
pub trait FeedbackSink: Send + Sync {
    fn play(&self, verdict: Verdict);
}

/// Writes the signal to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFeedback;

impl FeedbackSink for LogFeedback {
    fn play(&self, verdict: Verdict) {
        if verdict.is_correct() {
            log::info!("answer correct");
        } else {
            log::info!("answer incorrect");
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SilentFeedback;

impl FeedbackSink for SilentFeedback {
    fn play(&self, _verdict: Verdict) {}
}
