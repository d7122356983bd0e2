pub mod notifier;
pub mod snapshot_store;
pub mod tab_driver;
pub mod target_url;

pub use notifier::{BroadcastNotifier, Delivery, EventNotifier};
pub use snapshot_store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use tab_driver::{ChromeTabDriver, TabDriver};
pub use target_url::{build_target_url, identifier_from_url};
