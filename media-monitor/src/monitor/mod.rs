//! Media server monitor.
//!
//! The monitor is responsible for:
//! - Running the background loop that refreshes servers as they become due
//! - Refreshing a single server's stats through its kind's client
//! - Publishing server and enabled-count events to observers
//! - Waking the loop when servers are added, edited, or removed

mod events;
mod refresher;
mod service;

pub use events::{MonitorEvent, MonitorEventBus, MonitorObserver, SubscriptionId};
pub use refresher::{RefreshOutcome, StateRefresher};
pub use service::{MonitorConfig, MonitorRun, MonitorService, MonitorState};
