//! Run journal subsystem: JSONL records, the sink thread, and run reports.

pub mod jsonl;
pub mod report;
pub mod sink;
