use std::{path::PathBuf, sync::Arc};

use tokio::sync::{broadcast, Mutex};

use crate::relay::Relay;

/// Single fan-out channel; every live connection subscribes. All subscribers
/// observe events in the order they were sent here.
pub type Tx = broadcast::Sender<String>;

/// The relay behind one lock. Each connection's events pass through it
/// sequentially, which keeps registry reads/writes linearizable per
/// connection and broadcast emission totally ordered.
pub type SharedRelay = Arc<Mutex<Relay>>;

/// Root directory of the date-partitioned file store.
pub type StorageRoot = Arc<PathBuf>;
