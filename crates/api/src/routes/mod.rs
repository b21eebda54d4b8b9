//! Route handlers

pub mod dashboard;
pub mod drowsiness;
pub mod monitoring;
pub mod sos;
