//! # toml-compliance
//!
//! Engine for checking TOML decoders and encoders against a fixed corpus of
//! test cases. Subjects are opaque programs speaking a stdin/stdout protocol:
//!
//! - a **decoder** reads TOML on stdin and prints its typed-value JSON
//!   encoding, or exits non-zero to reject the document;
//! - an **encoder** reads typed-value JSON on stdin and prints TOML, or exits
//!   non-zero to reject the input.
//!
//! ## Quick start
//!
//! ```rust
//! use toml_compliance::{compare_tables, parse_document};
//!
//! let expected = parse_document(br#"{"answer":{"type":"integer","value":"42"}}"#, "fixture").unwrap();
//! let actual = parse_document(br#"{"answer":{"type":"integer","value":"+42"}}"#, "decoder").unwrap();
//! assert!(compare_tables(&expected, &actual).is_ok());
//!
//! let missing = parse_document(b"{}", "decoder").unwrap();
//! let mismatch = compare_tables(&expected, &missing).unwrap_err();
//! assert_eq!(mismatch.path.to_string(), "answer");
//! ```
//!
//! ## Modules
//!
//! - [`value`]: typed-value JSON ↔ [`Table`] / [`TypedValue`]
//! - [`compare`]: TOML-semantic equality with path-annotated mismatches
//! - [`process`]: run one subject with stdin input, timeout and cancellation
//! - [`loader`]: discover `valid/` and `invalid/` fixtures as [`TestCase`]s
//! - [`marker`]: select cases by category, subcategory and name
//! - [`executor`]: per-case state machine and bounded worker pool
//! - [`report`]: results, the shared sink and the summary
//! - [`cancel`]: run-wide cancellation token
//! - [`error`]: error types

pub mod cancel;
pub mod compare;
pub mod error;
pub mod executor;
pub mod loader;
pub mod marker;
pub mod process;
pub mod report;
pub mod value;

pub use cancel::CancelToken;
pub use compare::{compare_items, compare_tables, tables_equal, Mismatch};
pub use error::{ErrorKind, HarnessError};
pub use executor::{Executor, RunConfig};
pub use loader::{load_cases, Category, Kind, TestCase};
pub use marker::MarkerFilter;
pub use process::{Invocation, ProcessOutput};
pub use report::{FailureReason, Report, ResultSink, Summary, TestOutcome, TestResult};
pub use value::{parse_document, Item, KeyPath, Table, Tag, TypedValue};
