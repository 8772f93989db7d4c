//! Frequency type.

use core::fmt;
use core::ops;

/// A frequency in hertz.
///
/// Resolved clock frequencies are not always integral (a fractional PLL
/// ratio produces fractional hertz), so the value is kept as `f64`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Hertz(pub f64);

impl Hertz {
    pub fn hz(hertz: u32) -> Self {
        Self(hertz as f64)
    }

    pub fn khz(kilohertz: u32) -> Self {
        Self(kilohertz as f64 * 1_000.0)
    }

    pub fn mhz(megahertz: u32) -> Self {
        Self(megahertz as f64 * 1_000_000.0)
    }

    pub const fn to_hz(self) -> f64 {
        self.0
    }
}

impl ops::Div<u32> for Hertz {
    type Output = Hertz;
    fn div(self, rhs: u32) -> Self::Output {
        // Dividers are normalized to >= 1 before they get here.
        Hertz(self.0 / rhs.max(1) as f64)
    }
}

impl ops::Mul<f64> for Hertz {
    type Output = Hertz;
    fn mul(self, rhs: f64) -> Self::Output {
        Hertz(self.0 * rhs)
    }
}

impl fmt::Display for Hertz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (value, unit) = if self.0.abs() >= 1_000_000.0 {
            (self.0 / 1_000_000.0, "MHz")
        } else if self.0.abs() >= 1_000.0 {
            (self.0 / 1_000.0, "kHz")
        } else {
            (self.0, "Hz")
        };

        if value.fract() == 0.0 {
            write!(f, "{} {}", value, unit)
        } else {
            let text = format!("{:.6}", value);
            write!(f, "{} {}", text.trim_end_matches('0').trim_end_matches('.'), unit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Hertz;

    #[test]
    fn display_picks_unit() {
        assert_eq!(Hertz::mhz(48).to_string(), "48 MHz");
        assert_eq!(Hertz::hz(32_768).to_string(), "32.768 kHz");
        assert_eq!(Hertz::hz(1).to_string(), "1 Hz");
        assert_eq!(Hertz(750_000_000.0).to_string(), "750 MHz");
    }

    #[test]
    fn divide_by_zero_is_identity() {
        assert_eq!(Hertz::mhz(48) / 0, Hertz::mhz(48));
        assert_eq!(Hertz::mhz(48) / 4, Hertz::mhz(12));
    }
}
