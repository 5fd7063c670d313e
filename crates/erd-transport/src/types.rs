use core::fmt;
use core::str::FromStr;

/// 16-bit ERD identifier addressing one register on an appliance
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Erd(u16);

impl Erd {
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u16 {
        self.0
    }

    /// Identifier `n` places after this one, or `None` past `0xFFFF`.
    pub fn offset(&self, n: usize) -> Option<Self> {
        let n = u16::try_from(n).ok()?;
        self.0.checked_add(n).map(Self)
    }

    /// Accepts `0x`-prefixed hex or plain decimal.
    pub fn parse(s: &str) -> Option<Self> {
        let t = s.trim();
        let val = if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            t.parse::<u32>().ok()?
        };
        u16::try_from(val).ok().map(Self)
    }
}

impl From<u16> for Erd {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl FromStr for Erd {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid ERD: {s}"))
    }
}

impl fmt::Display for Erd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{raw:04X}", raw = self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_and_decimal() {
        assert_eq!(Erd::parse("0x2000"), Some(Erd::new(0x2000)));
        assert_eq!(Erd::parse(" 8192 "), Some(Erd::new(0x2000)));
        assert_eq!(Erd::parse("0X00ff"), Some(Erd::new(0xFF)));
        assert_eq!(Erd::parse("0x10000"), None);
        assert_eq!(Erd::parse("laundry"), None);
    }

    #[test]
    fn test_offset_stops_at_u16_max() {
        let erd = Erd::new(0xFFFE);
        assert_eq!(erd.offset(1), Some(Erd::new(0xFFFF)));
        assert_eq!(erd.offset(2), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Erd::new(0x2003).to_string(), "0x2003");
    }
}
