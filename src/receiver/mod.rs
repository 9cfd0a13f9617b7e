//! OpenTelemetry receiver implementation.
//!
//! This module exposes the OTLP/gRPC metrics service in front of the
//! delta translator.

pub mod metrics;

use crate::core::{DeltaError, Result};
use std::future::Future;
use std::net::SocketAddr;
use tonic::transport::Server;

pub use metrics::{create_metrics_service_server, DecodedBatch, DeltaMetricsReceiver};

/// Serve the OTLP metrics service on `addr` until `shutdown` resolves.
pub async fn serve<F>(receiver: DeltaMetricsReceiver, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    tracing::info!("GRPC metrics receiver binding to {}", addr);

    match Server::builder()
        .add_service(create_metrics_service_server(receiver))
        .serve_with_shutdown(addr, shutdown)
        .await
    {
        Ok(()) => {
            tracing::info!("GRPC metrics receiver stopped gracefully");
            Ok(())
        },
        Err(e) => {
            tracing::error!("GRPC server error: {} (binding to {})", e, addr);
            if e.to_string().contains("Address already in use") {
                Err(DeltaError::protocol(format!("Port {} already in use", addr.port())))
            } else {
                Err(DeltaError::Transport(e))
            }
        },
    }
}
