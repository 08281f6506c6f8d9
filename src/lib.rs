pub mod codegen;
pub mod config;
pub mod error;
pub mod logging;
pub mod mirror;

pub use codegen::{
    AsyncCheckout, BatchReport, Checkout, CheckoutStrategy, EmitBuffer, Outcome, Validator,
    WriteBackSession, WriteRequest,
};
pub use config::{CliArgs, MirrorConfig, WriteBackConfig};
pub use error::{CheckoutError, EmitError, WriteBackError, WriteBackResult};
pub use logging::{LoggingConfig, init_logging};
pub use mirror::{mirror_tree, mirror_tree_async, write_report};
