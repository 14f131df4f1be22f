use std::collections::HashMap;
use std::fmt::Display;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};
use tonic::service::Interceptor;
use tonic::transport::ClientTlsConfig;
use yellowstone_grpc_client::GeyserGrpcClient;
use yellowstone_grpc_proto::geyser::subscribe_update::UpdateOneof;
use yellowstone_grpc_proto::geyser::{CommitmentLevel, SubscribeRequest, SubscribeRequestPing};

use super::types::*;
use crate::core::SubscriptionError;
use crate::normalizer::RawNotification;

/// Why one connection's stream loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    Shutdown,
    Closed,
}

#[derive(Clone)]
pub struct YellowstoneGrpc {
    endpoint: String,
    token: Option<String>,
    config: ClientConfig,
}

fn connect_err(e: impl Display) -> SubscriptionError {
    SubscriptionError::Connect(e.to_string())
}

fn ping(id: i32) -> SubscribeRequest {
    SubscribeRequest { ping: Some(SubscribeRequestPing { id }), ..Default::default() }
}

impl YellowstoneGrpc {
    pub fn new(endpoint: String, token: Option<String>) -> Self {
        Self { endpoint, token, config: ClientConfig::default() }
    }

    pub fn new_with_config(endpoint: String, token: Option<String>, config: ClientConfig) -> Self {
        Self { endpoint, token, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn build_request(&self, filter: &TransactionFilter) -> SubscribeRequest {
        let mut transactions = HashMap::new();
        transactions.insert("swap_programs".to_string(), filter.to_proto());
        SubscribeRequest {
            transactions,
            commitment: Some(CommitmentLevel::from(self.config.commitment) as i32),
            ..Default::default()
        }
    }

    async fn connect(&self) -> Result<GeyserGrpcClient<impl Interceptor>, SubscriptionError> {
        let mut builder = GeyserGrpcClient::build_from_shared(self.endpoint.clone())
            .map_err(connect_err)?
            .x_token(self.token.clone())
            .map_err(connect_err)?
            .max_decoding_message_size(self.config.max_decoding_message_size);

        if self.config.connection_timeout_ms > 0 {
            builder = builder.connect_timeout(Duration::from_millis(self.config.connection_timeout_ms));
        }

        if self.config.enable_tls {
            let tls_config = ClientTlsConfig::new().with_native_roots();
            builder = builder.tls_config(tls_config).map_err(connect_err)?;
        }

        builder.connect().await.map_err(connect_err)
    }

    /// Stream transactions into `sink` until `shutdown` flips to `true` or the
    /// receiving side goes away. Disconnects and transport errors never end the
    /// loop; they trigger a reconnect after `reconnect_delay_ms` with the same
    /// request.
    pub async fn subscribe_transactions(
        &self,
        filter: TransactionFilter,
        sink: mpsc::Sender<RawNotification>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let reconnect_delay = Duration::from_millis(self.config.reconnect_delay_ms);
        let mut connections = 0u64;

        loop {
            if *shutdown.borrow() {
                break;
            }
            connections += 1;
            match self.stream_once(&filter, &sink, &mut shutdown).await {
                Ok(StreamEnd::Shutdown) => break,
                Ok(StreamEnd::Closed) => warn!("gRPC stream closed by server"),
                Err(e) => warn!("gRPC subscription error: {}", e),
            }

            info!("reconnecting in {:?} (attempt {})", reconnect_delay, connections + 1);
            tokio::select! {
                _ = tokio::time::sleep(reconnect_delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("gRPC subscription stopped");
    }

    async fn stream_once(
        &self,
        filter: &TransactionFilter,
        sink: &mpsc::Sender<RawNotification>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<StreamEnd, SubscriptionError> {
        info!("connecting to gRPC endpoint {}", self.endpoint);
        let mut client = self.connect().await?;

        let request = self.build_request(filter);
        let (mut subscribe_tx, mut stream) = client
            .subscribe_with_request(Some(request))
            .await
            .map_err(|e| SubscriptionError::Subscribe(e.to_string()))?;
        info!(
            "subscribed to {} programs ({:?} commitment)",
            filter.account_include.len(),
            self.config.commitment
        );

        let keep_alive_period = Duration::from_millis(self.config.keep_alive_interval_ms.max(1));
        let mut keep_alive =
            tokio::time::interval_at(tokio::time::Instant::now() + keep_alive_period, keep_alive_period);
        let mut ping_id = 0i32;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(StreamEnd::Shutdown);
                    }
                }
                _ = keep_alive.tick() => {
                    ping_id = ping_id.wrapping_add(1);
                    subscribe_tx
                        .send(ping(ping_id))
                        .await
                        .map_err(|e| SubscriptionError::KeepAlive(e.to_string()))?;
                    debug!("keep-alive ping {} sent", ping_id);
                }
                message = stream.next() => match message {
                    Some(Ok(update)) => match update.update_oneof {
                        Some(UpdateOneof::Transaction(transaction)) => {
                            if sink.send(RawNotification::Grpc(transaction)).await.is_err() {
                                return Ok(StreamEnd::Shutdown);
                            }
                        }
                        Some(UpdateOneof::Ping(_)) => {
                            subscribe_tx
                                .send(ping(ping_id))
                                .await
                                .map_err(|e| SubscriptionError::KeepAlive(e.to_string()))?;
                        }
                        _ => {}
                    },
                    Some(Err(status)) => return Err(SubscriptionError::Stream(status.to_string())),
                    None => return Ok(StreamEnd::Closed),
                },
            }
        }
    }
}
