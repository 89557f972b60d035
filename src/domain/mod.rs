mod account;
mod address;
mod customer;
mod fee;
mod integrity;
mod ledger;
mod money;
mod transaction;

pub use account::*;
pub use address::*;
pub use customer::*;
pub use fee::*;
pub use integrity::*;
pub use ledger::*;
pub use money::*;
pub use transaction::*;
