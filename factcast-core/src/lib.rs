//! factcast-core: local notification scheduling engine for the facts feed.
//!
//! The engine keeps the OS pending-notification queue and the on-device
//! content store in agreement across app restarts, permission changes, and
//! the platform's 64-entry pending cap. Everything stateful flows through
//! [`Scheduler`]; the pure pieces (slot generation, schedule validation) are
//! usable on their own.

pub mod batch;
pub mod delivery;
pub mod events;
pub mod fact;
pub mod orchestrator;
pub mod prefs;
pub mod queue;
pub mod slots;
pub mod store;
pub mod time;
pub mod validate;

pub use batch::run_bounded;
pub use delivery::mark_past_due_delivered;
pub use events::{FeedEvent, FeedEvents, SubscriptionId};
pub use fact::{Fact, FactState, ScheduledSlot};
pub use orchestrator::{classify, Branch, ScheduleOutcome, Scheduler, OS_PENDING_LIMIT};
pub use prefs::{PreferenceSource, StaticPrefs};
pub use queue::{NotificationContent, NotificationQueue, PendingNotification, PermissionStatus};
pub use slots::{generate_slots, Slot};
pub use store::{ContentStore, MemoryStore};
pub use time::{canonicalize, parse_tz, resolve_local, PreferredTime};
pub use validate::is_valid_schedule;
