/// Shareboard core: board model, mutations, drag reordering and the
/// optimistic sync session shared by every client.
pub mod config;
pub mod draft;
pub mod gateway;
pub mod ids;
pub mod landing;
pub mod ledger;
pub mod reorder;
pub mod storage;
pub mod store;
pub mod sync;
pub mod template;
pub mod types;
