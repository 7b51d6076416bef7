//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces.
//!
//! Use cases:
//! - `ExposureLedger`: Per-bucket limit checks, blocks and reservations
//! - `BetAdmission`: All-or-nothing ticket admission over the ledger

pub mod bet_admission;
pub mod exposure_ledger;

pub use bet_admission::{AdmissionOutcome, AdmittedTicket, BetAdmission, Ticket};
pub use exposure_ledger::{ExposureDecision, ExposureLedger, ExposureQuery, LedgerSettings, Reservation};
