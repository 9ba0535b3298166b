//! Finalize-and-forward path to the downstream core service.

mod forwarder;
mod trust;

pub use forwarder::{
    strip_hop_by_hop, ForwardRequest, ForwardResponse, HttpForwarder, UpstreamForwarder,
};
pub use trust::TrustProxy;
