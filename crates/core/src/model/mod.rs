mod answer;
mod ids;
mod question;
mod selection;
mod session;
mod trail;

pub use answer::{Answer, AnswerSet, AnswerSetError, ExpectedAnswer, MAX_CHOICES, QuestionKind};
pub use ids::{AnswerId, CourseId, ParseIdError, QuestionId, TopicId, UserId};
pub use question::{ModerationState, Question};
pub use selection::{Selection, SelectionError};
pub use session::{SessionSummary, SessionTarget};
pub use trail::{SessionTrail, TRAIL_SCHEMA_VERSION, TrailEntry, TrailRecord, TrailSelection};
