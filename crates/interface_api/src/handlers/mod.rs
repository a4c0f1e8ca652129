//! Request handlers, one module per resource

pub mod health;
pub mod customers;
pub mod communications;
pub mod policies;
pub mod claims;
pub mod renewals;
pub mod payments;
pub mod dashboard;
pub mod hierarchy;
pub mod providers;
pub mod campaigns;
pub mod insights;
