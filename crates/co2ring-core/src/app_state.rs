//! Application state and the main polling loop for co2ring
//!
//! [`App`] owns every component and runs one loop iteration per
//! [`App::tick`]: ensure connectivity, service the broker session, poll the
//! sensor, update the alert state, render, and publish when due. It is
//! generic over the hardware traits so the same loop runs on the device, in
//! the simulator and in tests.

use core::fmt::Debug;

use embedded_hal_async::delay::DelayNs;
use log::{debug, error, info, warn};
use smart_leds::{RGB8, SmartLedsWriteAsync};
use thiserror_no_std::Error;

use crate::alert::{AlertLevel, AlertStateMachine};
use crate::config::Config;
use crate::connectivity::{
    ConnectionState, ConnectivityError, ConnectivityManager, MqttLink, WifiLink,
};
use crate::publisher::Publisher;
use crate::reading::Reading;
use crate::ring::{LedRing, RingPattern};
use crate::sensors::{Sensor, SensorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    Uninitialized,
    Starting,
    WifiConnecting,
    MqttConnecting,
    Running,
    SensorFault,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppError {
    #[error("sensor unavailable: {0}")]
    SensorNotFound(SensorError),
    #[error("restart required: {0}")]
    RestartRequired(ConnectivityError),
}

/// What a single loop iteration did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// No measurement was available
    Idle,
    Measured {
        reading: Reading,
        rendered: Option<RingPattern>,
        published: bool,
    },
}

pub struct App<'a, S, W, M, L, D, const N: usize> {
    sensor: S,
    wifi: W,
    mqtt: M,
    ring: LedRing<L, D, N>,
    delay: D,
    connectivity: ConnectivityManager,
    alerts: AlertStateMachine,
    publisher: Publisher<'a>,
    run_state: AppRunState,
}

impl<'a, S, W, M, L, D, const N: usize> App<'a, S, W, M, L, D, N>
where
    S: Sensor,
    W: WifiLink,
    M: MqttLink,
    L: SmartLedsWriteAsync<Color = RGB8>,
    L::Error: Debug,
    D: DelayNs,
{
    pub fn new(
        config: &Config<'a>,
        sensor: S,
        wifi: W,
        mqtt: M,
        ring: LedRing<L, D, N>,
        delay: D,
    ) -> Self {
        Self {
            sensor,
            wifi,
            mqtt,
            ring,
            delay,
            connectivity: ConnectivityManager::new(config.device.retry_policy()),
            alerts: AlertStateMachine::new(),
            publisher: Publisher::from_config(&config.device, &config.mqtt),
            run_state: AppRunState::Uninitialized,
        }
    }

    pub fn run_state(&self) -> AppRunState {
        self.run_state
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connectivity.state()
    }

    pub fn ring(&self) -> &LedRing<L, D, N> {
        &self.ring
    }

    pub fn mqtt(&self) -> &M {
        &self.mqtt
    }

    pub fn mqtt_mut(&mut self) -> &mut M {
        &mut self.mqtt
    }

    /// Show the boot pattern and bring up the sensor.
    ///
    /// A missing sensor is fatal; the caller should follow up with
    /// [`App::halt`].
    pub async fn start(&mut self) -> Result<(), AppError> {
        self.run_state = AppRunState::Starting;
        self.ring.startup().await;

        if let Err(e) = self.sensor.begin().await {
            error!("Air sensor not detected. Please check wiring. Freezing... ({})", e);
            self.run_state = AppRunState::SensorFault;
            return Err(AppError::SensorNotFound(e));
        }

        info!("CO2 sensor ready");
        Ok(())
    }

    /// Blink the fault pattern forever.
    pub async fn halt(&mut self) -> ! {
        self.run_state = AppRunState::SensorFault;
        self.ring.halt_with_fault().await
    }

    /// Run one loop iteration at device time `now_ms`.
    ///
    /// Only an exhausted connection budget is returned as an error; it
    /// means the device has to restart. Everything else is logged and the
    /// iteration carries on.
    pub async fn tick(&mut self, now_ms: u32) -> Result<TickOutcome, AppError> {
        self.ensure_connected().await?;

        if let Err(e) = self.mqtt.poll().await {
            warn!("MQTT session lost: {:?}", e);
            self.connectivity.mark_mqtt_down();
        }

        let reading = match self.poll_sensor().await {
            Some(reading) => reading,
            None => return Ok(TickOutcome::Idle),
        };

        let rendered = self.alerts.update(reading.co2_ppm);
        if let Some(pattern) = rendered {
            if let Some(level) = AlertLevel::classify(reading.co2_ppm) {
                debug!("CO2 level now {} ({} ppm)", level.label(), reading.co2_ppm);
            }
            self.ring.render(pattern).await;
        }

        let published = match self
            .publisher
            .maybe_publish(&reading, now_ms, &mut self.mqtt)
            .await
        {
            Ok(published) => published,
            Err(e) => {
                warn!("Publishing failed: {}", e);
                self.connectivity.mark_mqtt_down();
                false
            }
        };

        Ok(TickOutcome::Measured {
            reading,
            rendered,
            published,
        })
    }

    async fn ensure_connected(&mut self) -> Result<(), AppError> {
        if !self.wifi.is_connected() {
            self.run_state = AppRunState::WifiConnecting;
        }
        self.connectivity
            .ensure_wifi(&mut self.wifi, &mut self.delay)
            .await
            .map_err(AppError::RestartRequired)?;

        if !self.mqtt.is_connected() {
            self.run_state = AppRunState::MqttConnecting;
        }
        self.connectivity
            .ensure_mqtt(&mut self.mqtt, &mut self.delay)
            .await
            .map_err(AppError::RestartRequired)?;

        self.run_state = AppRunState::Running;
        Ok(())
    }

    async fn poll_sensor(&mut self) -> Option<Reading> {
        match self.sensor.data_ready().await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!("Sensor status check failed: {}", e);
                return None;
            }
        }

        match self.sensor.read().await {
            Ok(reading) => Some(reading),
            Err(e) => {
                warn!("Sensor read failed: {}", e);
                None
            }
        }
    }
}
