#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod aggregator;
pub mod classify;
pub mod clock;
pub mod measurement;
pub mod scenario;
pub mod transport;

pub(crate) mod executor;
pub(crate) mod pool;
pub(crate) mod request;
pub(crate) mod timer;
pub(crate) mod vu;

pub use scenario::Scenario;
pub use transport::{HttpTransport, RpcTransport, Transport, TransportError};

pub mod prelude {
    pub use crate::scenario::Scenario;
    pub use crate::transport::{HttpTransport, RpcTransport, Transport};

    pub use stampede_core::{
        ConfigurationError, ExecutorKind, RequestTemplate, RunStatistics, ScenarioConfig, Stage,
    };
}
