//! Desktop simulator for the co2ring CO2 monitor.
//!
//! Runs the co2ring-core application loop against a synthetic CO2 source and
//! in-process WiFi/MQTT links, drawing the LED ring in an SDL2 window via
//! `embedded-graphics-simulator`. The synthetic concentration sweeps through
//! every alert band in about five minutes.
//!
//! # Key bindings
//!
//! | Key  | Action                              |
//! |------|-------------------------------------|
//! | Up   | Raise CO₂ by 100 ppm                |
//! | Down | Lower CO₂ by 100 ppm                |
//! | W    | Drop the WiFi link                  |
//! | M    | Drop the MQTT session               |
//! | R    | Toggle broker refusing connections  |
//! | Q    | Quit                                |

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::f64::consts::{PI, TAU};
use std::rc::Rc;
use std::time::{Duration, Instant};

use co2ring_core::app_state::{App, AppError, TickOutcome};
use co2ring_core::config::{Config, LED_COUNT};
use co2ring_core::connectivity::{LinkState, MqttLink, WifiLink};
use co2ring_core::reading::Reading;
use co2ring_core::ring::LedRing;
use co2ring_core::sensors::{Sensor, SensorError};
use embassy_futures::block_on;
use embedded_graphics::mono_font::{MonoTextStyle, ascii::FONT_6X10};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Circle, PrimitiveStyle, Rectangle};
use embedded_graphics::text::Text;
use embedded_graphics_simulator::{
    OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window, sdl2::Keycode,
};
use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};
use smart_leds::{RGB8, SmartLedsWriteAsync};

// ---------------------------------------------------------------------------
// Window layout
// ---------------------------------------------------------------------------

const WINDOW_SCALE: u32 = 2;
const PANEL_WIDTH: u32 = 200;
const PANEL_HEIGHT: u32 = 230;
const RING_CENTER: Point = Point::new(100, 100);
const RING_RADIUS: f64 = 75.0;
const PIXEL_DIAMETER: u32 = 14;
const STATUS_ORIGIN: Point = Point::new(6, 220);

/// Pause between loop iterations, matching the firmware
const LOOP_IDLE: Duration = Duration::from_millis(100);

/// The SCD30 produces a measurement every two seconds.
const MEASUREMENT_INTERVAL: Duration = Duration::from_secs(2);

const CO2_STEP_PPM: i32 = 100;

static CONFIG: Config<'static> = Config::with_credentials("simulator", "");

type SimApp = App<'static, SyntheticSensor, SimWifi, SimBroker, RingWriter, StdDelay, LED_COUNT>;

// ---------------------------------------------------------------------------
// SDL panel
// ---------------------------------------------------------------------------

struct Panel {
    display: SimulatorDisplay<Rgb888>,
    window: Window,
}

impl Panel {
    fn new() -> Self {
        let display = SimulatorDisplay::<Rgb888>::new(Size::new(PANEL_WIDTH, PANEL_HEIGHT));
        let output_settings = OutputSettingsBuilder::new().scale(WINDOW_SCALE).build();
        let mut panel = Self {
            display,
            window: Window::new("co2ring Simulator", &output_settings),
        };

        // The SDL window is created on the first `update()`; `events()` panics
        // before that.
        panel.present();
        panel
    }

    /// Centre of pixel `index`. The last pixel sits at twelve o'clock so
    /// the four cardinal pixels land on the compass points.
    fn pixel_center(index: usize) -> Point {
        let angle = TAU * (index + 1) as f64 / LED_COUNT as f64 - PI / 2.0;
        Point::new(
            RING_CENTER.x + (RING_RADIUS * angle.cos()).round() as i32,
            RING_CENTER.y + (RING_RADIUS * angle.sin()).round() as i32,
        )
    }

    fn draw_ring(&mut self, pixels: &[RGB8]) {
        for (index, pixel) in pixels.iter().enumerate() {
            let style = if *pixel == RGB8::default() {
                PrimitiveStyle::with_stroke(Rgb888::new(60, 60, 60), 1)
            } else {
                PrimitiveStyle::with_fill(Rgb888::new(pixel.r, pixel.g, pixel.b))
            };

            let circle = Circle::with_center(Self::pixel_center(index), PIXEL_DIAMETER);
            // Clear first so an outline does not keep the old fill.
            let _ = circle
                .into_styled(PrimitiveStyle::with_fill(Rgb888::BLACK))
                .draw(&mut self.display);
            let _ = circle.into_styled(style).draw(&mut self.display);
        }
    }

    fn draw_status(&mut self, line: &str) {
        let _ = Rectangle::new(Point::new(0, 205), Size::new(PANEL_WIDTH, 25))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::BLACK))
            .draw(&mut self.display);

        let style = MonoTextStyle::new(&FONT_6X10, Rgb888::WHITE);
        let _ = Text::new(line, STATUS_ORIGIN, style).draw(&mut self.display);
    }

    fn present(&mut self) {
        self.window.update(&self.display);
    }

    fn events(&mut self) -> Vec<SimulatorEvent> {
        self.window.events().collect()
    }
}

/// Smart-LED writer that paints frames onto the panel.
struct RingWriter {
    panel: Rc<RefCell<Panel>>,
}

impl SmartLedsWriteAsync for RingWriter {
    type Error = Infallible;
    type Color = RGB8;

    async fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        let pixels: Vec<RGB8> = iterator.into_iter().map(Into::into).collect();
        let mut panel = self.panel.borrow_mut();
        panel.draw_ring(&pixels);
        panel.present();
        Ok(())
    }
}

/// Blocking delay; the simulator drives futures with `block_on`.
#[derive(Clone, Copy)]
struct StdDelay;

impl DelayNs for StdDelay {
    async fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(ns as u64));
    }

    async fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }
}

// ---------------------------------------------------------------------------
// Synthetic sensor and links
// ---------------------------------------------------------------------------

/// Knobs shared between the key handler and the simulated devices.
#[derive(Default)]
struct Controls {
    co2_offset: Cell<i32>,
    wifi_up: Cell<bool>,
    mqtt_up: Cell<bool>,
    broker_refusing: Cell<bool>,
}

struct SyntheticSensor {
    started: Instant,
    last_read: Option<Instant>,
    controls: Rc<Controls>,
}

impl SyntheticSensor {
    fn co2_ppm(&self) -> u16 {
        let t = self.started.elapsed().as_secs_f64();

        // 200–2100 ppm sweep, floored at outdoor air
        let sweep = 1150.0 + 950.0 * (t / 45.0).sin() + 20.0 * (t / 7.0).cos();
        let ppm = sweep as i32 + self.controls.co2_offset.get();
        ppm.clamp(400, u16::MAX as i32) as u16
    }
}

impl Sensor for SyntheticSensor {
    async fn begin(&mut self) -> Result<(), SensorError> {
        info!("Synthetic CO2 source ready");
        Ok(())
    }

    async fn data_ready(&mut self) -> Result<bool, SensorError> {
        Ok(self
            .last_read
            .is_none_or(|last| last.elapsed() >= MEASUREMENT_INTERVAL))
    }

    async fn read(&mut self) -> Result<Reading, SensorError> {
        self.last_read = Some(Instant::now());
        let t = self.started.elapsed().as_secs_f64();

        let temperature = 22.0 + 1.5 * (t / 120.0).sin();
        let humidity = 45.0 + 8.0 * (t / 180.0).cos();
        Ok(Reading::new(
            self.co2_ppm(),
            temperature as f32,
            humidity as f32,
        ))
    }
}

#[derive(Debug)]
struct SimLinkError(&'static str);

struct SimWifi {
    controls: Rc<Controls>,
}

impl WifiLink for SimWifi {
    type Error = SimLinkError;

    fn is_connected(&mut self) -> bool {
        self.controls.wifi_up.get()
    }

    async fn begin(&mut self) -> Result<(), Self::Error> {
        info!("Associating with {}", CONFIG.internet.ssid);
        self.controls.wifi_up.set(true);
        Ok(())
    }
}

struct SimBroker {
    controls: Rc<Controls>,
}

impl MqttLink for SimBroker {
    type Error = SimLinkError;

    fn is_connected(&self) -> bool {
        self.controls.mqtt_up.get()
    }

    async fn connect(&mut self) -> Result<(), Self::Error> {
        if self.controls.broker_refusing.get() {
            return Err(SimLinkError("connection refused"));
        }
        self.controls.mqtt_up.set(true);
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        if !self.controls.mqtt_up.get() {
            return Err(SimLinkError("not connected"));
        }
        info!("{} <- {}", topic, String::from_utf8_lossy(payload));
        Ok(())
    }

    async fn poll(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

fn build_app(panel: &Rc<RefCell<Panel>>, controls: &Rc<Controls>) -> SimApp {
    let writer = RingWriter {
        panel: Rc::clone(panel),
    };
    let ring = LedRing::new(writer, StdDelay, CONFIG.device.brightness);
    let sensor = SyntheticSensor {
        started: Instant::now(),
        last_read: None,
        controls: Rc::clone(controls),
    };
    let wifi = SimWifi {
        controls: Rc::clone(controls),
    };
    let mqtt = SimBroker {
        controls: Rc::clone(controls),
    };

    App::new(&CONFIG, sensor, wifi, mqtt, ring, StdDelay)
}

fn link_label(state: LinkState) -> &'static str {
    match state {
        LinkState::Connected => "up",
        LinkState::Disconnected => "down",
    }
}

/// Apply a key press. Returns `false` when the simulator should exit.
fn handle_key(keycode: Keycode, controls: &Controls) -> bool {
    match keycode {
        Keycode::Q | Keycode::Escape => return false,
        Keycode::Up => {
            controls
                .co2_offset
                .set(controls.co2_offset.get() + CO2_STEP_PPM);
            info!("CO2 offset {:+} ppm", controls.co2_offset.get());
        }
        Keycode::Down => {
            controls
                .co2_offset
                .set(controls.co2_offset.get() - CO2_STEP_PPM);
            info!("CO2 offset {:+} ppm", controls.co2_offset.get());
        }
        Keycode::W => {
            warn!("WiFi link dropped");
            controls.wifi_up.set(false);
            controls.mqtt_up.set(false);
        }
        Keycode::M => {
            warn!("MQTT session dropped");
            controls.mqtt_up.set(false);
        }
        Keycode::R => {
            let refusing = !controls.broker_refusing.get();
            controls.broker_refusing.set(refusing);
            warn!(
                "Broker {} connections",
                if refusing { "refusing" } else { "accepting" }
            );
        }
        _ => {}
    }
    true
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::Builder::new()
        .filter_level(CONFIG.device.log_level)
        .parse_default_env()
        .init();
    info!("Starting co2ring simulator");
    info!(
        "Keys: Up/Down=CO₂ ±{}  W=drop WiFi  M=drop MQTT  R=refuse broker  Q=Quit",
        CO2_STEP_PPM
    );

    let panel = Rc::new(RefCell::new(Panel::new()));
    let controls = Rc::new(Controls::default());
    let booted = Instant::now();

    let mut app = build_app(&panel, &controls);
    if let Err(e) = block_on(app.start()) {
        error!("{}", e);
        return;
    }

    'running: loop {
        for event in panel.borrow_mut().events() {
            match event {
                SimulatorEvent::Quit => break 'running,
                SimulatorEvent::KeyDown { keycode, .. } => {
                    if !handle_key(keycode, &controls) {
                        break 'running;
                    }
                }
                _ => {}
            }
        }

        let now_ms = booted.elapsed().as_millis() as u32;
        match block_on(app.tick(now_ms)) {
            Ok(TickOutcome::Measured { reading, .. }) => {
                let state = app.connection_state();
                let status = format!(
                    "CO2 {:>4} ppm  WiFi {}  MQTT {}",
                    reading.co2_ppm,
                    link_label(state.wifi),
                    link_label(state.mqtt)
                );
                let mut panel = panel.borrow_mut();
                panel.draw_status(&status);
                panel.present();
            }
            Ok(TickOutcome::Idle) => {}
            Err(AppError::RestartRequired(e)) => {
                error!("{}, simulating restart", e);
                app = build_app(&panel, &controls);
                if let Err(e) = block_on(app.start()) {
                    error!("{}", e);
                    break 'running;
                }
            }
            Err(e) => error!("{}", e),
        }

        std::thread::sleep(LOOP_IDLE);
    }

    info!("Simulator exiting");
}
