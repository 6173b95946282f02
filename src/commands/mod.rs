pub mod inventory;
pub mod outline;
pub mod parse;
pub mod status;
