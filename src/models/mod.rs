pub mod outcome;
pub mod quiz;

pub use outcome::{ChainOutcome, StepReport, StepStatus, TerminalReason};
pub use quiz::{
    AnswerFormat, AnswerValue, DownloadedFile, FormatHint, QuizRecord, QuizTask, RawQuizRecord,
    RenderedPage, Submission, SubmissionResponse, SubmissionResult,
};
