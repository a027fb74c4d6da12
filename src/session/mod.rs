//! Session - correlation, dispatch, and the order workflow

pub mod correlation;
pub mod dispatcher;
pub mod policy;
pub mod workflow;

pub use correlation::{CorrelationTable, Purpose};
pub use dispatcher::{Dispatcher, Outcome};
pub use policy::{Classification, ErrorPolicy};
pub use workflow::{OrderWorkflow, Phase};
