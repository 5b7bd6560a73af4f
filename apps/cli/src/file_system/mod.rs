//! Everything that touches the mounted tree: metadata classification, enumeration and
//! file transfer.

pub mod classifier;
pub mod enumerator;
pub mod transfer;

pub use classifier::is_hidden;
pub use enumerator::{EnumerationSummary, Listing, TreeEnumerator, collect_listing};
pub use transfer::{DownloadFailure, DownloadSummary, TransferError, download, download_many, upload};

#[cfg(test)]
mod transfer_test;
