//! Incremental scraper for the weekly NEJM Image Challenge.
//!
//! Ids are generated on a weekly schedule, every challenge that isn't fully
//! resolved yet is fetched and extracted, and the result is reconciled into a
//! JSON store without ever losing a recorded answer or image.

pub mod cli;
pub mod config;
mod error;
pub mod export;
pub mod ident;
mod macros;
pub mod merge;
pub mod parse;
pub mod process;
pub mod record;
pub mod request;
pub mod store;
pub mod telemetry;

pub use error::{Error, Result};

/// Id of the first published challenge.
pub const ORIGIN_ID: &str = "20051013";
/// Challenges are published once a week. Not configurable.
const WEEK_DAYS: u64 = 7;
pub const DEFAULT_STORE_PATH: &str = "nejm_questions.json";
pub const DEFAULT_EXPORT_PATH: &str = "nejm_questions.tex";
const STORE_INDENT: &[u8] = b"    ";
const MIN_QUESTION_LEN: usize = 5;
/// Option texts must be longer than this to count.
const MIN_OPTION_LEN: usize = 5;
