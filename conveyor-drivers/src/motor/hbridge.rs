//! Dual PWM H-bridge transport motor
//!
//! The belt motor sits on an H-bridge with one PWM input per leg. Driving
//! `IN1` runs the belt right, driving `IN2` runs it left; both at zero
//! coasts the motor. The idle leg is always released before the active one
//! is driven so the bridge never sees both inputs high.

use conveyor_core::traits::{Direction, MotorError, MotorOutput, TransportMotor};
use embedded_hal::pwm::SetDutyCycle;

/// H-bridge transport motor
pub struct HBridgeMotor<A, B> {
    /// Leg that runs the belt right
    in1: A,
    /// Leg that runs the belt left
    in2: B,
    /// Duty value that maps to 100% on the PWM channels
    full_scale: u16,
}

impl<A: SetDutyCycle, B: SetDutyCycle> HBridgeMotor<A, B> {
    /// Create a motor driver
    ///
    /// `full_scale` is the duty value the core uses for 100%
    /// (`SpeedConfig::pwm_full_scale`).
    pub fn new(in1: A, in2: B, full_scale: u16) -> Self {
        Self {
            in1,
            in2,
            full_scale: full_scale.max(1),
        }
    }

    /// Release both legs
    pub fn coast(&mut self) -> Result<(), MotorError> {
        self.in1
            .set_duty_cycle_fully_off()
            .map_err(|_| MotorError::Pwm)?;
        self.in2
            .set_duty_cycle_fully_off()
            .map_err(|_| MotorError::Pwm)
    }

    /// Rescale a core duty value to a channel's native range
    fn scale(&self, duty: u16, max: u16) -> u16 {
        let duty = u32::from(duty.min(self.full_scale));
        (duty * u32::from(max) / u32::from(self.full_scale)) as u16
    }

    /// Release the PWM channels
    pub fn release(self) -> (A, B) {
        (self.in1, self.in2)
    }
}

impl<A: SetDutyCycle, B: SetDutyCycle> TransportMotor for HBridgeMotor<A, B> {
    fn drive(&mut self, output: MotorOutput) -> Result<(), MotorError> {
        if !output.is_running() {
            return self.coast();
        }

        match output.direction {
            Direction::Right => {
                let duty = self.scale(output.duty, self.in1.max_duty_cycle());
                self.in2
                    .set_duty_cycle_fully_off()
                    .map_err(|_| MotorError::Pwm)?;
                self.in1.set_duty_cycle(duty).map_err(|_| MotorError::Pwm)
            }
            Direction::Left => {
                let duty = self.scale(output.duty, self.in2.max_duty_cycle());
                self.in1
                    .set_duty_cycle_fully_off()
                    .map_err(|_| MotorError::Pwm)?;
                self.in2.set_duty_cycle(duty).map_err(|_| MotorError::Pwm)
            }
            Direction::Stop => self.coast(),
        }
    }
}
