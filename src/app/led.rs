//! Status LED

use embassy_time::Duration;
use embedded_hal::digital::OutputPin;

use crate::core::transport::Hold;

/// Single LED on a push-pull output. Starts off.
pub struct Led<P: OutputPin> {
    pin: P,
    lit: bool,
}

impl<P: OutputPin> Led<P> {
    /// Takes ownership of `pin` and drives it low
    pub fn new(mut pin: P) -> Result<Self, P::Error> {
        pin.set_low()?;
        Ok(Self { pin, lit: false })
    }

    pub fn on(&mut self) -> Result<(), P::Error> {
        self.pin.set_high()?;
        self.lit = true;
        Ok(())
    }

    pub fn off(&mut self) -> Result<(), P::Error> {
        self.pin.set_low()?;
        self.lit = false;
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<(), P::Error> {
        if self.lit {
            self.off()
        } else {
            self.on()
        }
    }

    pub fn is_on(&self) -> bool {
        self.lit
    }

    /// Light the LED for `duration`
    pub async fn flash<H: Hold>(&mut self, duration: Duration, hold: &mut H) -> Result<(), P::Error> {
        self.on()?;
        hold.hold(duration).await;
        self.off()
    }

    pub fn release(self) -> P {
        self.pin
    }
}
