pub mod bridge_collect;
pub mod identity;

pub use bridge_collect::BridgeCollect;
