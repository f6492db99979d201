//! Bank statement importers.
//!
//! Every source implements [`Importer`]: it turns one raw payload into
//! [`ImportItem`]s, each carrying the keys that identify it across imports.
//! The [`ImportService`] routes payloads to the right importer and hands the
//! result to the engine, which skips rows it has already seen.

use std::collections::HashMap;

use engine::ImportItem;

pub use account_map::AccountMap;
pub use error::ImportError;
pub use service::{ImportRequest, ImportService};

pub mod account_map;
pub mod bnp;
mod error;
pub mod firefly;
pub mod monobank;
pub mod privat24;
pub mod revolut;
mod service;
mod util;

pub type ResultImport<T> = Result<T, ImportError>;

/// Everything a parser may look at besides the payload itself.
#[derive(Clone, Copy, Debug)]
pub struct ParseRequest<'a> {
    pub data: &'a [u8],
    pub accounts: &'a AccountMap,
    /// Tag name to id.
    pub tags: &'a HashMap<String, i32>,
    /// Category name to id.
    pub categories: &'a HashMap<String, i32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParseResponse {
    pub items: Vec<ImportItem>,
    /// Rows folded into another row by a merge pass.
    pub merged: usize,
}

pub trait Importer: Send + Sync {
    /// Tag stored with the deduplication keys.
    fn source(&self) -> &'static str;

    fn parse(&self, request: &ParseRequest<'_>) -> ResultImport<ParseResponse>;
}
