pub mod batch;
pub mod order;
pub mod order_draft;
pub mod order_draft_item;
pub mod order_item;
pub mod outbound_tx;
pub mod product;
pub mod rejected_order_line;
pub mod return_order;
pub mod supplier_contact;
