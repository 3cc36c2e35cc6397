#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use alloc::boxed::Box;
use co2ring_core::app_state::{App, AppError};
use co2ring_core::config::{Config, LED_COUNT};
use co2ring_core::ring::LedRing;
use co2ring_core::sensors::Scd30Sensor;
use co2ring_firmware::hardware::{create_i2c_bus, create_ring_writer};
use co2ring_firmware::mqtt::BrokerLink;
use co2ring_firmware::wifi::StationLink;
use co2ring_firmware::wifi_secrets::{WIFI_PASSWORD, WIFI_SSID};
use embassy_executor::Spawner;
use embassy_net::tcp::TcpSocket;
use embassy_net::{DhcpConfig, Runner, StackResources};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Delay, Duration, Instant, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use esp_radio::wifi::WifiDevice;
use log::{error, info};
use static_cell::StaticCell;

/// Pause between loop iterations
const LOOP_IDLE: Duration = Duration::from_millis(100);

static CONFIG: Config<'static> = Config::with_credentials(WIFI_SSID, WIFI_PASSWORD);

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!(CONFIG.device.log_level);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!(
        "{} firmware {} booting",
        CONFIG.device.hostname, CONFIG.device.firmware
    );

    // LED ring and sensor
    let ring_writer = create_ring_writer(peripherals.RMT, peripherals.GPIO5)
        .expect("Failed to initialize RMT for the LED ring");
    let ring = LedRing::<_, _, LED_COUNT>::new(ring_writer, Delay, CONFIG.device.brightness);

    let i2c = create_i2c_bus(peripherals.I2C0, peripherals.GPIO8, peripherals.GPIO9)
        .expect("Failed to initialize sensor I2C bus");
    let sensor = Scd30Sensor::new(i2c, Delay);

    // Radio and network stack
    let radio_init = esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller");
    let radio_init: &'static _ = Box::leak(Box::new(radio_init));
    let (wifi_controller, interfaces) =
        esp_radio::wifi::new(radio_init, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi controller");

    let mut dhcp = DhcpConfig::default();
    dhcp.hostname = CONFIG.device.hostname.try_into().ok();

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    static RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(dhcp),
        RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.spawn(net_task(runner)).ok();

    // Broker session
    static RX_BUFFER: StaticCell<[u8; 1024]> = StaticCell::new();
    static TX_BUFFER: StaticCell<[u8; 1024]> = StaticCell::new();
    static MQTT_WRITE: StaticCell<[u8; 512]> = StaticCell::new();
    static MQTT_RECV: StaticCell<[u8; 512]> = StaticCell::new();

    let socket = Mutex::<NoopRawMutex, _>::new(TcpSocket::new(
        stack,
        RX_BUFFER.init([0; 1024]),
        TX_BUFFER.init([0; 1024]),
    ));
    let mqtt = BrokerLink::new(
        stack,
        &socket,
        &CONFIG.mqtt,
        MQTT_WRITE.init([0; 512]),
        MQTT_RECV.init([0; 512]),
    );
    let wifi = StationLink::new(wifi_controller, stack, &CONFIG.internet);

    let mut app = App::new(&CONFIG, sensor, wifi, mqtt, ring, Delay);

    if let Err(e) = app.start().await {
        error!("{}", e);
        app.halt().await;
    }

    loop {
        let now_ms = Instant::now().as_millis() as u32;

        match app.tick(now_ms).await {
            Ok(_) => {}
            Err(AppError::RestartRequired(e)) => {
                error!("{}, restarting", e);
                Timer::after(LOOP_IDLE).await;
                esp_hal::system::software_reset();
            }
            Err(e) => error!("{}", e),
        }

        Timer::after(LOOP_IDLE).await;
    }
}
