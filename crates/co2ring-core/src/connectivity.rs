//! WiFi and MQTT connection upkeep
//!
//! Both links are retried with a fixed delay and a bounded attempt count.
//! There is no partial-failure handling: once a link exhausts its budget the
//! caller is expected to restart the device.

use core::fmt::{self, Debug, Display};
use core::time::Duration;

use embedded_hal_async::delay::DelayNs;
use log::{info, warn};
use thiserror_no_std::Error;

/// WiFi station association.
///
/// `is_connected` means associated *and* addressed, ready to open sockets.
pub trait WifiLink {
    type Error: Debug;

    fn is_connected(&mut self) -> bool;

    /// Start association. Completion is observed through `is_connected`.
    fn begin(&mut self) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Session with the MQTT broker.
///
/// Any failed operation must leave the link reporting disconnected so the
/// next loop iteration reconnects it.
pub trait MqttLink {
    type Error: Debug;

    fn is_connected(&self) -> bool;

    fn connect(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Service the session (keep-alive and inbound traffic).
    fn poll(&mut self) -> impl Future<Output = Result<(), Self::Error>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Wifi,
    Mqtt,
}

impl Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wifi => f.write_str("WiFi"),
            Self::Mqtt => f.write_str("MQTT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub wifi: LinkState,
    pub mqtt: LinkState,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    #[error("{link} still down after {attempts} attempts")]
    RetryBudgetExhausted { link: Link, attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    fn delay_ms(&self) -> u32 {
        u32::try_from(self.delay.as_millis()).unwrap_or(u32::MAX)
    }

    fn exhausted(&self, link: Link, attempts: u32) -> Result<(), ConnectivityError> {
        if attempts >= self.max_attempts {
            Err(ConnectivityError::RetryBudgetExhausted { link, attempts })
        } else {
            Ok(())
        }
    }
}

pub struct ConnectivityManager {
    policy: RetryPolicy,
    state: ConnectionState,
}

impl ConnectivityManager {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState {
                wifi: LinkState::Disconnected,
                mqtt: LinkState::Disconnected,
            },
        }
    }

    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Bring both links up, WiFi first. Links that are already up are left
    /// alone.
    pub async fn ensure<W, M, D>(
        &mut self,
        wifi: &mut W,
        mqtt: &mut M,
        delay: &mut D,
    ) -> Result<(), ConnectivityError>
    where
        W: WifiLink,
        M: MqttLink,
        D: DelayNs,
    {
        self.ensure_wifi(wifi, delay).await?;
        self.ensure_mqtt(mqtt, delay).await
    }

    pub async fn ensure_wifi<W, D>(
        &mut self,
        wifi: &mut W,
        delay: &mut D,
    ) -> Result<(), ConnectivityError>
    where
        W: WifiLink,
        D: DelayNs,
    {
        if wifi.is_connected() {
            self.state.wifi = LinkState::Connected;
            return Ok(());
        }

        self.state.wifi = LinkState::Disconnected;
        info!("Connecting to WiFi...");

        if let Err(e) = wifi.begin().await {
            warn!("WiFi association could not be started: {:?}", e);
        }

        let mut attempts = 0;
        while !wifi.is_connected() {
            delay.delay_ms(self.policy.delay_ms()).await;
            attempts += 1;
            self.policy.exhausted(Link::Wifi, attempts)?;
        }

        info!("WiFi connected after {} polls", attempts);
        self.state.wifi = LinkState::Connected;
        Ok(())
    }

    pub async fn ensure_mqtt<M, D>(
        &mut self,
        mqtt: &mut M,
        delay: &mut D,
    ) -> Result<(), ConnectivityError>
    where
        M: MqttLink,
        D: DelayNs,
    {
        if mqtt.is_connected() {
            self.state.mqtt = LinkState::Connected;
            return Ok(());
        }

        self.state.mqtt = LinkState::Disconnected;
        info!("Attempting MQTT connection...");

        let mut attempts = 0;
        loop {
            match mqtt.connect().await {
                Ok(()) => break,
                Err(e) => {
                    warn!("MQTT connection attempt {} failed: {:?}", attempts + 1, e);
                    delay.delay_ms(self.policy.delay_ms()).await;
                    attempts += 1;
                }
            }
            self.policy.exhausted(Link::Mqtt, attempts)?;
        }

        info!("Connected to MQTT broker");
        self.state.mqtt = LinkState::Connected;
        Ok(())
    }

    /// Record that the broker session dropped outside of `ensure`.
    pub fn mark_mqtt_down(&mut self) {
        self.state.mqtt = LinkState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingDelay, ScriptedMqtt, ScriptedWifi};
    use embassy_futures::block_on;

    fn manager() -> ConnectivityManager {
        ConnectivityManager::new(RetryPolicy {
            max_attempts: 50,
            delay: Duration::from_millis(500),
        })
    }

    #[test]
    fn connected_links_are_left_alone() {
        let mut wifi = ScriptedWifi::connected();
        let mut mqtt = ScriptedMqtt::connected();
        let mut delay = RecordingDelay::default();
        let mut manager = manager();

        block_on(manager.ensure(&mut wifi, &mut mqtt, &mut delay)).unwrap();

        assert_eq!(wifi.begin_calls, 0);
        assert_eq!(mqtt.connect_calls, 0);
        assert_eq!(delay.total_ms(), 0);
        assert_eq!(
            manager.state(),
            ConnectionState {
                wifi: LinkState::Connected,
                mqtt: LinkState::Connected,
            }
        );
    }

    #[test]
    fn wifi_polls_until_associated() {
        let mut wifi = ScriptedWifi::connects_after(3);
        let mut delay = RecordingDelay::default();
        let mut manager = manager();

        block_on(manager.ensure_wifi(&mut wifi, &mut delay)).unwrap();

        assert_eq!(wifi.begin_calls, 1);
        assert_eq!(delay.total_ms(), 3 * 500);
        assert_eq!(manager.state().wifi, LinkState::Connected);
    }

    #[test]
    fn wifi_gives_up_after_budget() {
        let mut wifi = ScriptedWifi::never();
        let mut delay = RecordingDelay::default();
        let mut manager = manager();

        let err = block_on(manager.ensure_wifi(&mut wifi, &mut delay)).unwrap_err();

        assert_eq!(
            err,
            ConnectivityError::RetryBudgetExhausted {
                link: Link::Wifi,
                attempts: 50,
            }
        );
        assert_eq!(delay.total_ms(), 50 * 500);
        assert_eq!(manager.state().wifi, LinkState::Disconnected);
    }

    #[test]
    fn failed_begin_still_polls_until_budget() {
        let mut wifi = ScriptedWifi::never();
        wifi.fail_begin = true;
        let mut delay = RecordingDelay::default();
        let mut manager = manager();

        let err = block_on(manager.ensure_wifi(&mut wifi, &mut delay)).unwrap_err();

        assert_eq!(wifi.begin_calls, 1);
        assert_eq!(
            err,
            ConnectivityError::RetryBudgetExhausted {
                link: Link::Wifi,
                attempts: 50,
            }
        );
        assert_eq!(delay.total_ms(), 50 * 500);
    }

    #[test]
    fn failed_begin_can_still_associate() {
        let mut wifi = ScriptedWifi::connects_after(4);
        wifi.fail_begin = true;
        let mut delay = RecordingDelay::default();
        let mut manager = manager();

        block_on(manager.ensure_wifi(&mut wifi, &mut delay)).unwrap();

        assert_eq!(delay.total_ms(), 4 * 500);
        assert_eq!(manager.state().wifi, LinkState::Connected);
    }

    #[test]
    fn oversized_delay_saturates() {
        let policy = RetryPolicy {
            max_attempts: 1,
            delay: Duration::from_secs(u64::MAX),
        };

        assert_eq!(policy.delay_ms(), u32::MAX);
    }

    #[test]
    fn mqtt_retries_failed_connects() {
        let mut mqtt = ScriptedMqtt::connects_after(2);
        let mut delay = RecordingDelay::default();
        let mut manager = manager();

        block_on(manager.ensure_mqtt(&mut mqtt, &mut delay)).unwrap();

        assert_eq!(mqtt.connect_calls, 3);
        assert_eq!(delay.total_ms(), 2 * 500);
        assert!(mqtt.is_connected());
    }

    #[test]
    fn mqtt_gives_up_after_exactly_max_attempts() {
        let mut mqtt = ScriptedMqtt::never();
        let mut delay = RecordingDelay::default();
        let mut manager = manager();

        let err = block_on(manager.ensure_mqtt(&mut mqtt, &mut delay)).unwrap_err();

        assert_eq!(mqtt.connect_calls, 50);
        assert_eq!(
            err,
            ConnectivityError::RetryBudgetExhausted {
                link: Link::Mqtt,
                attempts: 50,
            }
        );
    }

    #[test]
    fn mqtt_is_not_attempted_without_wifi() {
        let mut wifi = ScriptedWifi::never();
        let mut mqtt = ScriptedMqtt::connects_after(0);
        let mut delay = RecordingDelay::default();
        let mut manager = manager();

        assert!(block_on(manager.ensure(&mut wifi, &mut mqtt, &mut delay)).is_err());
        assert_eq!(mqtt.connect_calls, 0);
    }

    #[test]
    fn exhaustion_message_names_the_link() {
        let err = ConnectivityError::RetryBudgetExhausted {
            link: Link::Mqtt,
            attempts: 50,
        };

        assert_eq!(
            alloc::format!("{err}"),
            "MQTT still down after 50 attempts"
        );
    }
}
