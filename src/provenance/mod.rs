//! Provenance: BLAKE3 fingerprints and the JSONL execution log.

pub mod eventlog;
pub mod hasher;
