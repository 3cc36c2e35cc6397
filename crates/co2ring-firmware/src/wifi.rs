//! WiFi station on the ESP32-S3 radio
//!
//! Association is handled by the esp-radio controller; addressing by the
//! embassy-net DHCP client. The link only counts as connected once both are
//! up, since sockets cannot be opened before an address is leased.

use alloc::string::String;

use co2ring_core::connectivity::WifiLink;
use co2ring_core::config::InternetConfig;
use embassy_net::Stack;
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiError};
use log::{debug, info};

pub struct StationLink<'d> {
    controller: WifiController<'d>,
    stack: Stack<'d>,
    ssid: &'d str,
    password: &'d str,
    configured: bool,
    online: bool,
}

impl<'d> StationLink<'d> {
    pub fn new(
        controller: WifiController<'d>,
        stack: Stack<'d>,
        credentials: &InternetConfig<'d>,
    ) -> Self {
        Self {
            controller,
            stack,
            ssid: credentials.ssid,
            password: credentials.password,
            configured: false,
            online: false,
        }
    }

    async fn configure(&mut self) -> Result<(), WifiError> {
        let client = ClientConfig::default()
            .with_ssid(String::from(self.ssid))
            .with_password(String::from(self.password));
        self.controller.set_config(&ModeConfig::Client(client))?;

        if !self.controller.is_started()? {
            self.controller.start_async().await?;
            info!("WiFi station started");
        }

        self.configured = true;
        Ok(())
    }
}

impl WifiLink for StationLink<'_> {
    type Error = WifiError;

    fn is_connected(&mut self) -> bool {
        let up = self.controller.is_connected().unwrap_or(false) && self.stack.is_config_up();

        if up && !self.online {
            if let Some(config) = self.stack.config_v4() {
                info!("WiFi connected to {}, address {}", self.ssid, config.address);
            }
        }
        self.online = up;
        up
    }

    async fn begin(&mut self) -> Result<(), Self::Error> {
        if !self.configured {
            self.configure().await?;
        }

        info!("Associating with {}", self.ssid);
        self.controller.connect_async().await?;
        debug!("Associated, waiting for DHCP lease");
        Ok(())
    }
}
