use std::{fmt, str::FromStr, time::Duration};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Unit of a clock rate.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Magnitude {
    Hz = 1,
    KHz = 1_000,
    MHz = 1_000_000,
    GHz = 1_000_000_000,
}

impl Magnitude {
    fn suffix(self) -> &'static str {
        match self {
            Self::Hz => "Hz",
            Self::KHz => "kHz",
            Self::MHz => "MHz",
            Self::GHz => "GHz",
        }
    }
}

/// Wall-clock rate used to pace execution. Pacing never changes what a program computes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Clock {
    speed: u64,
    magnitude: Magnitude,
}

impl Clock {
    /// `None` for a zero rate.
    pub fn new(speed: u64, magnitude: Magnitude) -> Option<Self> {
        (speed > 0).then_some(Clock { speed, magnitude })
    }

    /// Cycles per second
    pub fn hertz(&self) -> u64 {
        self.speed.saturating_mul(self.magnitude as u64)
    }

    /// Time between two steps. Rates above 1 GHz round down to zero.
    pub fn tick(&self) -> Duration {
        Duration::from_nanos(NANOS_PER_SEC / self.hertz())
    }
}

impl FromStr for Clock {
    type Err = String;

    /// Parse a rate like `4hz` or `2 MHz`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);
        let speed = digits
            .parse::<u64>()
            .map_err(|_| format!("`{s}` does not start with a whole number"))?;
        let magnitude = match unit.trim().to_ascii_lowercase().as_str() {
            "hz" => Magnitude::Hz,
            "khz" => Magnitude::KHz,
            "mhz" => Magnitude::MHz,
            "ghz" => Magnitude::GHz,
            other => return Err(format!("unknown unit `{other}`, expected hz, khz, mhz or ghz")),
        };
        Clock::new(speed, magnitude).ok_or_else(|| "clock rate must be above zero".to_string())
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.speed, self.magnitude.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rates() {
        assert_eq!("4hz".parse::<Clock>(), Ok(Clock::new(4, Magnitude::Hz).unwrap()));
        assert_eq!("2 MHz".parse::<Clock>(), Ok(Clock::new(2, Magnitude::MHz).unwrap()));
        assert_eq!("10KHZ".parse::<Clock>(), Ok(Clock::new(10, Magnitude::KHz).unwrap()));
        assert_eq!("1ghz".parse::<Clock>(), Ok(Clock::new(1, Magnitude::GHz).unwrap()));
        for bad in ["", "hz", "0hz", "4", "4 thz", "-1hz", "1.5hz"] {
            assert!(bad.parse::<Clock>().is_err(), "{bad}");
        }
    }

    #[test]
    fn tick_length() {
        let clock: Clock = "4hz".parse().unwrap();
        assert_eq!(clock.tick(), Duration::from_millis(250));
        assert_eq!(clock.hertz(), 4);
        let clock: Clock = "3khz".parse().unwrap();
        assert_eq!(clock.tick(), Duration::from_nanos(333_333));
        let clock: Clock = "5ghz".parse().unwrap();
        assert_eq!(clock.tick(), Duration::ZERO);
    }

    #[test]
    fn display() {
        assert_eq!(Clock::new(4, Magnitude::Hz).unwrap().to_string(), "4 Hz");
        assert_eq!(Clock::new(16, Magnitude::MHz).unwrap().to_string(), "16 MHz");
    }
}
