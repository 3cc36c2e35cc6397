//! MQTT broker session over embassy-net
//!
//! The rust-mqtt client is built once and owns a [`SharedSocket`]. When the
//! session drops, [`BrokerLink::connect`] resolves the broker again, aborts
//! and reopens the TCP socket, then repeats the MQTT handshake on the same
//! client.

use core::net::Ipv4Addr;

use co2ring_core::config::MqttConfig;
use co2ring_core::connectivity::MqttLink;
use embassy_net::dns::{self, DnsQueryType};
use embassy_net::tcp::{ConnectError, TcpSocket};
use embassy_net::{IpAddress, Stack};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Instant};
use log::{debug, info, warn};
use rust_mqtt::client::client::MqttClient;
use rust_mqtt::client::client_config::{ClientConfig, MqttVersion};
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::packet::v5::reason_codes::ReasonCode;
use rust_mqtt::utils::rng_generator::CountingRng;
use thiserror_no_std::Error;

use crate::shared_socket::SharedSocket;

const MAX_PROPERTIES: usize = 5;
/// Keep-alive negotiated with the broker, in seconds
const KEEP_ALIVE_S: u16 = 60;
/// Ping well inside the keep-alive window
const PING_INTERVAL: Duration = Duration::from_secs(KEEP_ALIVE_S as u64 / 2);
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("could not resolve broker: {0:?}")]
    Dns(dns::Error),
    #[error("broker resolved to no address")]
    NoAddress,
    #[error("TCP connect failed: {0:?}")]
    Tcp(ConnectError),
    #[error("broker replied {0:?}")]
    Mqtt(ReasonCode),
}

pub struct BrokerLink<'a, M: RawMutex> {
    client: MqttClient<'a, SharedSocket<'a, M>, MAX_PROPERTIES, CountingRng>,
    socket: &'a Mutex<M, TcpSocket<'a>>,
    stack: Stack<'a>,
    host: &'a str,
    port: u16,
    connected: bool,
    last_activity: Instant,
}

impl<'a, M: RawMutex> BrokerLink<'a, M> {
    /// `write_buffer` bounds the largest packet the client can send.
    pub fn new(
        stack: Stack<'a>,
        socket: &'a Mutex<M, TcpSocket<'a>>,
        config: &MqttConfig<'a>,
        write_buffer: &'a mut [u8],
        recv_buffer: &'a mut [u8],
    ) -> Self {
        let mut client_config = ClientConfig::new(MqttVersion::MQTTv5, CountingRng(20_000));
        client_config.add_client_id(config.client_id);
        client_config.keep_alive = KEEP_ALIVE_S;
        client_config.max_packet_size = write_buffer.len() as u32;

        let write_len = write_buffer.len();
        let recv_len = recv_buffer.len();
        let client = MqttClient::new(
            SharedSocket::new(socket),
            write_buffer,
            write_len,
            recv_buffer,
            recv_len,
            client_config,
        );

        Self {
            client,
            socket,
            stack,
            host: config.host,
            port: config.port,
            connected: false,
            last_activity: Instant::now(),
        }
    }

    async fn resolve(&self) -> Result<IpAddress, BrokerError> {
        if let Ok(address) = self.host.parse::<Ipv4Addr>() {
            return Ok(IpAddress::Ipv4(address));
        }

        let addresses = self
            .stack
            .dns_query(self.host, DnsQueryType::A)
            .await
            .map_err(BrokerError::Dns)?;
        addresses.first().copied().ok_or(BrokerError::NoAddress)
    }

    async fn open_socket(&self, address: IpAddress) -> Result<(), BrokerError> {
        let mut socket = self.socket.lock().await;
        // Drop whatever is left of the previous session.
        socket.abort();
        let _ = socket.flush().await;

        socket.set_timeout(Some(SOCKET_TIMEOUT));
        socket
            .connect((address, self.port))
            .await
            .map_err(BrokerError::Tcp)
    }

    fn session_lost(&mut self, code: ReasonCode) -> BrokerError {
        self.connected = false;
        BrokerError::Mqtt(code)
    }
}

impl<M: RawMutex> MqttLink for BrokerLink<'_, M> {
    type Error = BrokerError;

    fn is_connected(&self) -> bool {
        // A held lock means a transfer is in flight on a live socket.
        self.connected
            && self
                .socket
                .try_lock()
                .map_or(true, |socket| socket.may_send())
    }

    async fn connect(&mut self) -> Result<(), Self::Error> {
        self.connected = false;

        let address = self.resolve().await?;
        debug!("Broker {} resolved to {}", self.host, address);
        self.open_socket(address).await?;

        if let Err(code) = self.client.connect_to_broker().await {
            return Err(self.session_lost(code));
        }

        info!("MQTT session open with {}:{}", self.host, self.port);
        self.connected = true;
        self.last_activity = Instant::now();
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        if let Err(code) = self
            .client
            .send_message(topic, payload, QualityOfService::QoS0, false)
            .await
        {
            return Err(self.session_lost(code));
        }

        self.last_activity = Instant::now();
        Ok(())
    }

    async fn poll(&mut self) -> Result<(), Self::Error> {
        if !self.connected || self.last_activity.elapsed() < PING_INTERVAL {
            return Ok(());
        }

        if let Err(code) = self.client.send_ping().await {
            warn!("MQTT keep-alive ping failed");
            return Err(self.session_lost(code));
        }

        self.last_activity = Instant::now();
        Ok(())
    }
}
