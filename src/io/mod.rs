// Import/export of ledger data
mod export;

pub use export::*;
