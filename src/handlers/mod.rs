pub mod common;
pub mod drafts;
pub mod orders;
pub mod outbound;
pub mod returns;
pub mod supplier_callbacks;
