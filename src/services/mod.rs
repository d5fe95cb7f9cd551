pub mod file_fetcher;
pub mod llm_service;
pub mod submitter;
pub mod warn_writer;

pub use file_fetcher::HttpFileFetcher;
pub use llm_service::LlmService;
pub use submitter::HttpSubmitter;
pub use warn_writer::WarnWriter;
