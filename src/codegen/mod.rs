//! Code Generation Module
//!
//! Builds generated source text and writes it back without disturbing files
//! that have not really changed.
//!
//! ## Workflow
//!
//! ```text
//! EmitBuffer → render → WriteRequest → Validator (compare → checkout → write) → Outcome
//! ```
//!
//! ## Modules
//!
//! - **buffer**: `EmitBuffer`, an indentation-aware text accumulator
//! - **compare**: exact and whitespace-insensitive comparison
//! - **checkout**: collaborators that make an existing file writable
//! - **writeback**: `Validator`, blocking and cooperative write-back
//! - **session**: `WriteBackSession` and `BatchReport` for many files
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use codegen_writeback::codegen::{EmitBuffer, NoCheckout, Validator, WriteRequest};
//!
//! # fn example() -> anyhow::Result<()> {
//! let mut buf = EmitBuffer::new();
//! buf.write_line("public static class Ids");
//! buf.begin_block();
//! buf.write_line("public const int Player = 1;");
//! buf.end_block()?;
//!
//! let validator = Validator::new(NoCheckout);
//! let outcome = validator.validate(&WriteRequest::new(buf.into_string(), "Generated/Ids.cs"))?;
//! println!("Ids.cs: {outcome}");
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod checkout;
pub mod compare;
pub mod session;
pub mod writeback;

pub use buffer::{EmitBuffer, INDENT_WIDTH};
pub use checkout::{
    AsyncCheckout, Checkout, CheckoutStrategy, ClearReadOnly, CommandCheckout, NoCheckout,
};
pub use compare::{Comparison, Outcome, equal_ignoring_whitespace};
pub use session::{BatchReport, EntryStatus, ReportEntry, WriteBackSession, compute_string_hash};
pub use writeback::{Validator, WriteRequest};
