pub mod clock;
pub mod correction;
pub mod ledger;
pub mod records;
pub mod users;
