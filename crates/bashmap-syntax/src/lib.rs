//! bashmap-syntax — static analysis of bash utility functions.
//!
//! Shared by the `bashmap` CLI and usable on its own:
//! - `extract` — function definitions with their comment blocks and line spans
//! - `duplicates` — names defined more than once, per file or repository-wide
//! - `deps` — which utility files and functions a script calls
//!
//! Everything here is a pure function of the text it is given; reading files
//! is left to the caller.

pub mod deps;
pub mod duplicates;
pub mod error;
pub mod extract;
pub mod model;
pub mod scan;

pub use deps::{map_dependencies, Catalog};
pub use duplicates::{duplicate_locations, find_duplicates, DuplicateGroup, DuplicateScope};
pub use error::{CatalogError, Error, ParseError};
pub use extract::{extract_functions, summarize};
pub use model::{BashFunction, FileDependencies, FunctionSummary};
