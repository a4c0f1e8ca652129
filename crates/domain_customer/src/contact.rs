//! Last-contact tracking
//!
//! A customer's `last_contact_date` mirrors the newest live communication.
//! The same rule serves every kind of log write:
//!
//! - create / update: recompute over all live logs
//! - hard delete: recompute over the logs that remain
//! - soft delete: recompute excluding the log being deleted, since its row
//!   may still read as live inside the writing transaction

use chrono::{DateTime, Utc};

use core_kernel::CommunicationLogId;

use crate::communication::CommunicationLog;

/// Newest `communication_date` among non-deleted logs, skipping `excluding`
pub fn latest_contact_date<'a, I>(
    logs: I,
    excluding: Option<CommunicationLogId>,
) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = &'a CommunicationLog>,
{
    logs.into_iter()
        .filter(|log| !log.is_deleted)
        .filter(|log| Some(log.id) != excluding)
        .map(|log| log.communication_date)
        .max()
}
