mod loader;
mod progress;
mod review;
mod service;
mod timer;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use loader::QuestionLoader;
pub use progress::SessionProgress;
pub use review::{AnswerMark, MarkedAnswer, ReviewItem, TrailReviewService, review_items};
pub use service::{Advance, QuizSession, SessionPhase};
pub use timer::SessionTimer;
pub use workflow::{ABANDONED_CHALLENGE_SCORE, SessionLoopService, SessionStep};
