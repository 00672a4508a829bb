pub mod drafts;
pub mod inbound;
pub mod orders;
pub mod outbound;
pub mod reconciliation;
pub mod returns;
pub mod splitter;
pub mod stock;
