pub mod dispatcher;
pub mod model;
pub mod registry;
pub mod scheduler;

pub use dispatcher::JobDispatcher;
pub use model::{Job, JobId, JobResult, JobStatus, NewJob};
pub use registry::{JobEvent, JobRegistry};
pub use scheduler::{JobScheduler, ValueSet, sample_value_sets};
