//! The disposition of a processed packet.
use core::fmt;

/// The final disposition chosen for one packet.
///
/// The numeric codes are those expected by the hook that invokes the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Verdict {
    /// An internal fault occurred, the packet is dropped and the fault is reported.
    Aborted = 0,
    /// Silently discard the packet.
    Drop = 1,
    /// Hand the packet to the regular network stack.
    Pass = 2,
    /// Send the (possibly rewritten) packet back out of the ingress interface.
    Transmit = 3,
    /// Send the packet to another interface or queue.
    Redirect = 4,
}

/// A numeric code that does not name a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[error("invalid verdict code {0}")]
pub struct InvalidVerdict(pub u32);

impl From<Verdict> for u32 {
    fn from(verdict: Verdict) -> u32 {
        verdict as u32
    }
}

impl TryFrom<u32> for Verdict {
    type Error = InvalidVerdict;

    fn try_from(code: u32) -> Result<Self, InvalidVerdict> {
        match code {
            0 => Ok(Verdict::Aborted),
            1 => Ok(Verdict::Drop),
            2 => Ok(Verdict::Pass),
            3 => Ok(Verdict::Transmit),
            4 => Ok(Verdict::Redirect),
            other => Err(InvalidVerdict(other)),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Verdict::Aborted => write!(f, "aborted"),
            Verdict::Drop => write!(f, "drop"),
            Verdict::Pass => write!(f, "pass"),
            Verdict::Transmit => write!(f, "transmit"),
            Verdict::Redirect => write!(f, "redirect"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn codes() {
        assert_eq!(u32::from(Verdict::Aborted), 0);
        assert_eq!(u32::from(Verdict::Drop), 1);
        assert_eq!(u32::from(Verdict::Pass), 2);
        assert_eq!(u32::from(Verdict::Transmit), 3);
        assert_eq!(u32::from(Verdict::Redirect), 4);
    }

    #[test]
    fn from_code() {
        for code in 0..5 {
            let verdict = Verdict::try_from(code).unwrap();
            assert_eq!(u32::from(verdict), code);
        }
        assert_eq!(Verdict::try_from(5), Err(InvalidVerdict(5)));
        assert_eq!(Verdict::try_from(u32::MAX), Err(InvalidVerdict(u32::MAX)));
    }
}
