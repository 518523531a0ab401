//! Controller task
//!
//! Owns the sequencer. Commands are handled as they arrive and every fresh
//! sensor sample set drives one control tick, so the debounce counts real
//! samples. After each step the ready-out lines are refreshed and queued
//! status events go out to the serial link.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_rp::gpio::{Input, Level, Output};
use embassy_rp::pwm::PwmOutput;
use embassy_time::{Delay, Instant};

use conveyor_core::sequencer::{ControlInputs, HandshakeOutputs, ReadySignals, Sequencer};
use conveyor_drivers::motor::HBridgeMotor;
use conveyor_drivers::sensor::LimitInput;
use conveyor_drivers::stepper::FourPhaseStepper;

use crate::channels::{COMMAND_CHANNEL, SENSOR_READINGS, STATUS_CHANNEL};

/// Sequencer wired to this board's drivers
pub type ConveyorSequencer = Sequencer<
    FourPhaseStepper<Output<'static>, Delay>,
    LimitInput<Input<'static>>,
    HBridgeMotor<PwmOutput<'static>, PwmOutput<'static>>,
>;

/// Ready lines shared with neighbouring machines
pub struct HandshakePins {
    pub upstream_ready: Input<'static>,
    pub downstream_ready: Input<'static>,
    pub accepting_board: Output<'static>,
    pub board_available: Output<'static>,
}

impl HandshakePins {
    fn read(&self) -> ReadySignals {
        ReadySignals {
            upstream_ready: self.upstream_ready.is_high(),
            downstream_ready: self.downstream_ready.is_high(),
        }
    }

    fn drive(&mut self, outputs: HandshakeOutputs) {
        self.accepting_board
            .set_level(Level::from(outputs.accepting_board));
        self.board_available
            .set_level(Level::from(outputs.board_available));
    }
}

/// Controller task - runs the sequencer
#[embassy_executor::task]
pub async fn controller_task(mut sequencer: ConveyorSequencer, mut handshake: HandshakePins) {
    info!("Controller task started");

    let start = Instant::now();
    handshake.drive(sequencer.handshake_outputs());

    loop {
        match select(COMMAND_CHANNEL.receive(), SENSOR_READINGS.wait()).await {
            Either::First(command) => {
                let now_ms = start.elapsed().as_millis() as u32;
                debug!("Command: {}", Display2Format(&command));
                sequencer.handle_command(command, now_ms);
            }
            Either::Second(readings) => {
                let now_ms = start.elapsed().as_millis() as u32;
                let inputs = ControlInputs {
                    readings,
                    ready: handshake.read(),
                };
                sequencer.tick(now_ms, &inputs);
            }
        }

        handshake.drive(sequencer.handshake_outputs());
        forward_status(&mut sequencer);
    }
}

/// Move queued status events to the serial link
fn forward_status(sequencer: &mut ConveyorSequencer) {
    while let Some(event) = sequencer.pop_status() {
        if STATUS_CHANNEL.try_send(event).is_err() {
            warn!("Status channel full, dropping event");
        }
    }
}
