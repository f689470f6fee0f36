pub mod accounts;
pub mod checkout;
pub mod events;
pub mod hold_sweeper;
pub mod slug;
pub mod venue_suggestions;

pub use hold_sweeper::HoldSweeper;
