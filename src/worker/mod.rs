//! Worker versions, their lifecycle and the registry hosting them

pub mod clients;
pub mod message;
pub mod policy;
pub mod proxy;
pub mod registry;
pub mod report;
pub mod state;

pub use clients::{ClientRecord, Clients};
pub use message::ControlMessage;
pub use policy::{RoutePolicy, Strategy};
pub use proxy::{CacheProxy, EventResponse, ProxyEvent};
pub use registry::{MessageTarget, Registry};
pub use report::{
    ActivationReport, CacheAppReport, InstallReport, MessageOutcome, UncacheReport, UncacheStatus,
};
pub use state::{Registration, WorkerRecord, WorkerState};
