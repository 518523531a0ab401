//! Board sensor task
//!
//! Brings up the three VL53L0X sensors on the shared I2C bus and publishes
//! one [`RawReadings`] per sample period. A sensor that failed to come up or
//! errors while ranging reads as out of range, so the controller keeps
//! getting ticks either way.

use core::cell::RefCell;

use defmt::*;
use embassy_rp::gpio::Output;
use embassy_rp::i2c::{Blocking, I2c};
use embassy_rp::peripherals::I2C1;
use embassy_time::{Duration, Ticker, Timer};
use embedded_hal_bus::i2c::RefCellDevice;

use conveyor_core::sensor::{RangeReading, RawReadings};
use conveyor_core::traits::{RangeSensor, RangeSensorError};
use conveyor_drivers::sensor::Vl53l0x;

use crate::channels::SENSOR_READINGS;

/// Sample period in milliseconds
pub const SAMPLE_PERIOD_MS: u64 = 50;

/// Time allowed for one single-shot measurement
const MEASUREMENT_MS: u64 = 35;

/// Bus addresses assigned at bring-up, left/middle/right
const SENSOR_ADDRESSES: [u8; 3] = [0x30, 0x31, 0x32];

const SENSOR_NAMES: [&str; 3] = ["left", "middle", "right"];

/// XSHUT (reset) lines, left/middle/right
pub type XshutPins = [Output<'static>; 3];

type Bus = I2c<'static, I2C1, Blocking>;
type Sensor<'a> = Vl53l0x<RefCellDevice<'a, Bus>>;

/// Sensor task - samples all three range sensors
#[embassy_executor::task]
pub async fn sensor_task(i2c: Bus, mut xshut: XshutPins) {
    info!("Sensor task started");

    let bus = RefCell::new(i2c);

    // Hold everything in reset, then wake and readdress one at a time
    for pin in xshut.iter_mut() {
        pin.set_low();
    }
    Timer::after_millis(10).await;

    let mut sensors: [Option<Sensor<'_>>; 3] = [None, None, None];
    for (i, pin) in xshut.iter_mut().enumerate() {
        pin.set_high();
        Timer::after_millis(10).await;

        let mut sensor = Vl53l0x::new(RefCellDevice::new(&bus));
        match bring_up(&mut sensor, SENSOR_ADDRESSES[i]) {
            Ok(()) => {
                info!(
                    "Initialised {} board sensor at {:#x}",
                    SENSOR_NAMES[i],
                    sensor.address()
                );
                sensors[i] = Some(sensor);
            }
            Err(e) => {
                error!("Failed to initialise {} board sensor: {:?}", SENSOR_NAMES[i], e);
            }
        }
    }

    let mut ticker = Ticker::every(Duration::from_millis(SAMPLE_PERIOD_MS));

    loop {
        for (i, slot) in sensors.iter_mut().enumerate() {
            if let Some(sensor) = slot {
                if let Err(e) = sensor.start() {
                    warn!("{} sensor start failed: {:?}", SENSOR_NAMES[i], e);
                }
            }
        }

        Timer::after_millis(MEASUREMENT_MS).await;

        let mut samples = [RangeReading::OutOfRange; 3];
        for (i, slot) in sensors.iter_mut().enumerate() {
            if let Some(sensor) = slot {
                samples[i] = read(sensor, SENSOR_NAMES[i]);
            }
        }

        let readings = RawReadings {
            left: samples[0],
            middle: samples[1],
            right: samples[2],
        };
        trace!("Readings: {:?}", readings);
        SENSOR_READINGS.signal(readings);

        ticker.next().await;
    }
}

fn bring_up(sensor: &mut Sensor<'_>, address: u8) -> Result<(), RangeSensorError> {
    sensor.set_address(address)?;
    sensor.init()
}

fn read(sensor: &mut Sensor<'_>, name: &str) -> RangeReading {
    match sensor.poll() {
        Ok(Some(reading)) => reading,
        Ok(None) => {
            debug!("{} sensor not ready", name);
            RangeReading::OutOfRange
        }
        Err(e) => {
            warn!("{} sensor read failed: {:?}", name, e);
            RangeReading::OutOfRange
        }
    }
}
