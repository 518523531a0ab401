//! PCB Conveyor - Board Transport Controller Firmware
//!
//! Main firmware binary for RP2040-based conveyor controllers. Boards are
//! loaded, parked, unloaded and buffered in response to G-code/M-code lines
//! arriving over serial; a stepper-driven width axis is homed against a
//! limit switch and positioned in millimeters.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::i2c::{self, I2c};
use embassy_rp::peripherals::UART0;
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embassy_time::Delay;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use conveyor_core::config::ConveyorConfig;
use conveyor_core::sequencer::Sequencer;
use conveyor_drivers::motor::HBridgeMotor;
use conveyor_drivers::sensor::LimitInput;
use conveyor_drivers::stepper::{FourPhaseConfig, FourPhaseStepper};

mod channels;
mod tasks;

/// Configuration validated and encoded by build.rs from conveyor.toml
const EMBEDDED_CONFIG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/conveyor.bin"));

/// PWM counter top for a 5 kHz motor PWM at 125 MHz
const MOTOR_PWM_TOP: u16 = 24_999;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Conveyor firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = load_config();

    // Serial command link (115200 baud default)
    // Pin assignments are board-specific: TX=GPIO0, RX=GPIO1
    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);

    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, UartConfig::default());
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();

    info!("UART initialized for command link");

    // Board sensors: I2C1 SDA=GPIO2, SCL=GPIO3, XSHUT=GPIO4..6 (left, middle, right)
    let i2c = I2c::new_blocking(p.I2C1, p.PIN_3, p.PIN_2, i2c::Config::default());
    let xshut = [
        Output::new(p.PIN_4, Level::Low),
        Output::new(p.PIN_5, Level::Low),
        Output::new(p.PIN_6, Level::Low),
    ];

    info!("I2C initialized for board sensors");

    // Transport motor H-bridge: IN1=GPIO14 (right), IN2=GPIO15 (left)
    let mut pwm_config = PwmConfig::default();
    pwm_config.top = MOTOR_PWM_TOP;
    let pwm = Pwm::new_output_ab(p.PWM_SLICE7, p.PIN_14, p.PIN_15, pwm_config);
    let (Some(in1), Some(in2)) = pwm.split() else {
        defmt::panic!("Motor PWM slice has no outputs");
    };
    let motor = HBridgeMotor::new(in1, in2, config.speed.pwm_full_scale);

    info!("Motor PWM initialized");

    // Width axis: ULN2003 IN1..IN4=GPIO10..13, limit switch GPIO16 (high at the limit)
    let coils = [
        Output::new(p.PIN_10, Level::Low),
        Output::new(p.PIN_11, Level::Low),
        Output::new(p.PIN_12, Level::Low),
        Output::new(p.PIN_13, Level::Low),
    ];
    let stepper = FourPhaseStepper::new(coils, Delay, FourPhaseConfig::default());
    let limit = LimitInput::active_high(Input::new(p.PIN_16, Pull::Down));

    info!("Width axis initialized");

    // Ready lines: in from GPIO18 (upstream), GPIO19 (downstream); out on GPIO20, GPIO21
    let handshake = tasks::HandshakePins {
        upstream_ready: Input::new(p.PIN_18, Pull::Down),
        downstream_ready: Input::new(p.PIN_19, Pull::Down),
        accepting_board: Output::new(p.PIN_20, Level::Low),
        board_available: Output::new(p.PIN_21, Level::Low),
    };

    let sequencer: tasks::ConveyorSequencer = Sequencer::new(config, stepper, limit, motor);

    // Spawn tasks
    spawner.spawn(tasks::serial_rx_task(rx)).unwrap();
    spawner.spawn(tasks::status_tx_task(tx)).unwrap();
    spawner.spawn(tasks::sensor_task(i2c, xshut)).unwrap();
    spawner
        .spawn(tasks::controller_task(sequencer, handshake))
        .unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}

/// Decode the embedded configuration
///
/// build.rs has already validated it, so the fallback only guards against a
/// mismatched build.
fn load_config() -> ConveyorConfig {
    match ConveyorConfig::from_postcard(EMBEDDED_CONFIG) {
        Ok(config) => {
            info!("Loaded embedded configuration");
            config
        }
        Err(e) => {
            error!("Failed to decode embedded config: {:?}", e);
            error!("Using default configuration");
            ConveyorConfig::default()
        }
    }
}
