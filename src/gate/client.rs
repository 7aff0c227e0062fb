//! Outbound HTTP client wrapped in the request gate.

use axum::body::Body;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tower::Layer;

use crate::gate::layer::{BusyLayer, BusyService};
use crate::gate::tracker::RequestGate;

/// Plain upstream client.
pub type UpstreamClient = Client<HttpConnector, Body>;

/// Upstream client whose every request passes through a [`RequestGate`].
pub type GatedClient = BusyService<UpstreamClient>;

/// Build an HTTP/1.1 client counted by `gate`.
pub fn gated_client(gate: &RequestGate) -> GatedClient {
    let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
    BusyLayer::new(gate.clone()).layer(client)
}
