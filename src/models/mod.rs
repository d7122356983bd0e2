pub mod batch;
pub mod loaders;
pub mod messages;
pub mod profile;
pub mod snapshot;

pub use batch::{BatchJob, BatchStatus, BatchSummary, TabAssignment, TabHandle};
pub use messages::{AgentOutcome, AgentSignal, Command, Event, OrchestratorInput};
pub use loaders::{load_profile, load_usernames};
pub use profile::{parse_usernames, ParsedBatch, Profile};
pub use snapshot::{now_millis, PersistedProgress};
