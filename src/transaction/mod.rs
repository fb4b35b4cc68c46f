//! Transaction buffer and commit results

mod buffer;
mod result;

pub use buffer::TransactionBuffer;
pub use result::{TransactionResult, TransactionStatus};
