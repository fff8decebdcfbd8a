pub mod categories;
pub mod check;
pub mod expiry;
pub mod sweep;
