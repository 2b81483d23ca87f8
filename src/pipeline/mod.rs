//! Pipeline stages for document intake.
//!
//! Each submodule implements exactly one step. Keeping stages separate makes
//! each independently testable and lets us swap implementations (e.g. a
//! different object store or inference backend) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ extract ──▶ parse ──▶ score        reconcile
//! (S3/sim)   (Bedrock)   (JSON)   (0–100)      (into form, caller-driven)
//! ```
//!
//! 1. [`upload`]:    persist the raw bytes; falls back to a simulated upload
//!    and never fails
//! 2. [`extract`]:   one inference call returning the model's raw text; the
//!    only stage besides upload with network I/O
//! 3. [`parse`]:     recover the JSON payload from free-form text
//! 4. [`score`]:     weighted completeness of the extracted fields
//! 5. [`reconcile`]: non-destructive merge into a [`reconcile::MatterForm`];
//!    called by the caller, not by the orchestrator
//!
//! [`heuristics`] is a standalone regex scan over plain text. No stage calls
//! it.

pub mod extract;
pub mod heuristics;
pub mod parse;
pub mod reconcile;
pub mod score;
pub mod upload;
