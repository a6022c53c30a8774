mod audit;
mod lineman;
mod request;

pub use audit::{AuditRecord, NotResolved};
pub use lineman::{Assignment, Contact, GeoPoint, Lineman, LinemanRow, LinemanStatus};
pub use request::{AppliedUpdate, ClearanceRequest};
