//! Limit switch on a digital input

use conveyor_core::traits::{LimitSwitch, StepperError};
use embedded_hal::digital::InputPin;

/// Limit switch input
pub struct LimitInput<P> {
    pin: P,
    /// Input level that means "at the limit"
    active_high: bool,
}

impl<P: InputPin> LimitInput<P> {
    /// Switch that reads high when asserted
    pub fn active_high(pin: P) -> Self {
        Self {
            pin,
            active_high: true,
        }
    }

    /// Switch that reads low when asserted
    pub fn active_low(pin: P) -> Self {
        Self {
            pin,
            active_high: false,
        }
    }
}

impl<P: InputPin> LimitSwitch for LimitInput<P> {
    fn is_triggered(&mut self) -> Result<bool, StepperError> {
        let high = self.pin.is_high().map_err(|_| StepperError::LimitInput)?;
        Ok(high == self.active_high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    struct MockInput(bool);

    impl ErrorType for MockInput {
        type Error = Infallible;
    }

    impl InputPin for MockInput {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(self.0)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.0)
        }
    }

    #[test]
    fn test_active_high() {
        assert_eq!(LimitInput::active_high(MockInput(true)).is_triggered(), Ok(true));
        assert_eq!(LimitInput::active_high(MockInput(false)).is_triggered(), Ok(false));
    }

    #[test]
    fn test_active_low() {
        assert_eq!(LimitInput::active_low(MockInput(false)).is_triggered(), Ok(true));
        assert_eq!(LimitInput::active_low(MockInput(true)).is_triggered(), Ok(false));
    }
}
