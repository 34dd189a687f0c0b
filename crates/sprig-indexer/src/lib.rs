//! Source parsing, declaration extraction and graph derivation

pub mod config;
pub mod derive;
pub mod edges;
pub mod error;
pub mod extractor;
pub mod normalizer;
pub mod parser;
pub mod resolver;


pub use config::{CONFIG_FILE, ConfigError, SprigConfig};
pub use derive::{Frame, compute_frames, derive_module_graph, import_handles, validate_nesting};
pub use edges::{ImportLink, call_edges, import_export_edges, link_import, link_imports};
pub use error::DeriveError;
pub use extractor::{extract, extract_with, is_captured};
pub use normalizer::{
    OwnStatements, extract_own_statements, find_function_node, reconstruct_wrapper,
    splice_function_body, splice_root_code,
};
pub use parser::{Dialect, ParseFailure, ParsedSource, TreeParser};
pub use resolver::{FileLookup, RESOLVE_SUFFIXES, resolve, resolve_import, resolve_imports};
