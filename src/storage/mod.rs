//! Persistence boundary for requests and their evaluation records.
//!
//! Stores must give every request row a version token and support a
//! compare-and-swap write of the record, its denormalized status, and the
//! acted-upon flag of a linked incident as one atomic unit.

mod sqlite_store;

pub use sqlite_store::{SqliteStore, STORE_SCHEMA_VERSION};

use crate::entity::{
    EvaluationRecord, FiledRequest, Incident, ParticipantId, RequestFilter, RequestId,
};
use crate::error::Result;

/// A request about to be filed.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub request_path: String,
    pub applicant_id: ParticipantId,
    pub incident_id: Option<i64>,
    pub record: EvaluationRecord,
}

pub trait RecordStore {
    /// Insert the request row and its record in one transaction. A linked
    /// incident is flagged as acted upon in the same transaction.
    fn insert_request(&self, request: &NewRequest) -> Result<FiledRequest>;

    fn load_request(&self, id: RequestId) -> Result<Option<FiledRequest>>;

    /// Replace the record and its derived status if the row still carries
    /// `expected_version`.
    ///
    /// Returns the new version, or `None` when another writer got there
    /// first.
    fn update_record(
        &self,
        id: RequestId,
        expected_version: i64,
        record: &EvaluationRecord,
    ) -> Result<Option<i64>>;

    fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<FiledRequest>>;

    /// Soft delete. Returns false when the request was already archived.
    fn archive_request(&self, id: RequestId) -> Result<bool>;

    fn insert_incident(&self, employee_id: &ParticipantId, description: &str) -> Result<Incident>;

    fn load_incident(&self, id: i64) -> Result<Option<Incident>>;
}
