//! Two-stage license ingest pipeline with a durable queue boundary between
//! the stages, so ingestion can retry independently under at-least-once
//! delivery. Preprocessing resolves the provider identity from the SSN and
//! strips it from the message; ingestion diffs the normalized license
//! against stored state and applies the cascading updates.

pub mod changelog;
pub mod ingest;
pub mod preprocess;

#[cfg(test)]
mod tests;

pub use changelog::{diff_license, LicenseDiff};
pub use ingest::{IngestOutcome, IngestPlan, IngestService};
pub use preprocess::{NormalizedLicense, PreprocessService, RawLicenseUpload, UploadBatchItem};
