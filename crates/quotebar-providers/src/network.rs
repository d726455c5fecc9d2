//! Network information: addresses and interface traffic.

use async_trait::async_trait;
use quotebar_core::error::{ConfigError, FetchError};
use quotebar_core::traits::Provider;
use quotebar_core::types::QuoteRecord;
use reqwest::Client;
use std::net::IpAddr;
use std::time::Duration;
use sysinfo::Networks;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::http::{build_client, check_status, transport_error};
use crate::settings::NetworkSettings;

const MIB: f64 = 1024.0 * 1024.0;

/// Any routable address works; no packet is sent.
const ROUTE_PROBE: &str = "8.8.8.8:80";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reading {
    LocalIp,
    PublicIp,
    TrafficIn,
    TrafficOut,
}

impl Reading {
    fn parse(id: &str) -> Option<Self> {
        match id.to_lowercase().as_str() {
            "local_ip" => Some(Reading::LocalIp),
            "public_ip" => Some(Reading::PublicIp),
            "traffic_in" => Some(Reading::TrafficIn),
            "traffic_out" => Some(Reading::TrafficOut),
            _ => None,
        }
    }
}

/// Textual readings carry NaN as their value and the text in `detail`.
fn address_record(id: &str, name: &str, addr: IpAddr) -> QuoteRecord {
    QuoteRecord::new(id, name, f64::NAN, 0.0).with_detail(addr.to_string())
}

fn parse_address(body: &str) -> Result<IpAddr, FetchError> {
    body.trim()
        .parse::<IpAddr>()
        .map_err(|_| FetchError::Parse(format!("not an IP address: '{}'", body.trim())))
}

/// Network provider.
pub struct NetworkProvider {
    settings: NetworkSettings,
    client: Client,
}

impl NetworkProvider {
    pub fn new(settings: NetworkSettings) -> Result<Self, ConfigError> {
        let client = build_client(&[])?;
        Ok(Self { settings, client })
    }

    async fn local_ip(&self) -> Result<IpAddr, FetchError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        socket
            .connect(ROUTE_PROBE)
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let addr = socket
            .local_addr()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(addr.ip())
    }

    async fn public_ip(&self, timeout: Duration) -> Result<IpAddr, FetchError> {
        let mut last_error = FetchError::Network("no address endpoints configured".to_string());

        for endpoint in &self.settings.ip_endpoints {
            let attempt = async {
                let resp = self
                    .client
                    .get(endpoint)
                    .timeout(timeout)
                    .send()
                    .await
                    .map_err(|e| transport_error(e, timeout))?;
                let body = check_status(resp, endpoint)
                    .await?
                    .text()
                    .await
                    .map_err(|e| transport_error(e, timeout))?;
                parse_address(&body)
            };

            match attempt.await {
                Ok(addr) => return Ok(addr),
                Err(e) => {
                    debug!(endpoint = %endpoint, error = %e, "address endpoint failed");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn traffic(&self, id: &str, reading: Reading, timeout: Duration) -> Result<QuoteRecord, FetchError> {
        let id = id.to_string();
        let task = tokio::task::spawn_blocking(move || traffic_record(&id, reading));
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(record)) => Ok(record),
            Ok(Err(e)) => Err(FetchError::Network(format!("traffic task failed: {}", e))),
            Err(_) => Err(FetchError::Timeout(timeout)),
        }
    }
}

/// Cumulative interface totals. Enumerating interfaces is blocking.
fn traffic_record(id: &str, reading: Reading) -> QuoteRecord {
    let networks = Networks::new_with_refreshed_list();
    let (received, transmitted) = networks.iter().fold((0u64, 0u64), |(rx, tx), (_, data)| {
        (rx + data.total_received(), tx + data.total_transmitted())
    });

    let (name, bytes) = match reading {
        Reading::TrafficIn => ("Download", received),
        _ => ("Upload", transmitted),
    };
    QuoteRecord::new(id, name, bytes as f64 / MIB, 0.0).with_unit("MB")
}

#[async_trait]
impl Provider for NetworkProvider {
    async fn fetch(&self, instrument_id: &str, timeout: Duration) -> Result<QuoteRecord, FetchError> {
        let reading = Reading::parse(instrument_id)
            .ok_or_else(|| FetchError::NotFound(instrument_id.to_string()))?;

        match reading {
            Reading::LocalIp => {
                let addr = tokio::time::timeout(timeout, self.local_ip())
                    .await
                    .map_err(|_| FetchError::Timeout(timeout))??;
                Ok(address_record(instrument_id, "Local IP", addr))
            }
            Reading::PublicIp => {
                let addr = self.public_ip(timeout).await?;
                Ok(address_record(instrument_id, "Public IP", addr))
            }
            Reading::TrafficIn | Reading::TrafficOut => self.traffic(instrument_id, reading, timeout).await,
        }
    }

    fn name(&self) -> &str {
        "network"
    }

    fn description(&self) -> &str {
        "Local and public address, cumulative interface traffic"
    }

    fn examples(&self) -> &[&'static str] {
        &["local_ip", "public_ip", "traffic_in", "traffic_out"]
    }
}
