/// Plain-vanilla option side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum OptionType {
    /// Call option payoff profile.
    Call,
    /// Put option payoff profile.
    Put,
}

impl OptionType {
    /// Returns +1.0 for calls and -1.0 for puts.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Self::Call => 1.0,
            Self::Put => -1.0,
        }
    }

    /// Exercise value `max(sign * (spot - strike), 0)`.
    #[inline]
    pub fn intrinsic(self, spot: f64, strike: f64) -> f64 {
        (self.sign() * (spot - strike)).max(0.0)
    }
}

/// Exercise rights for an option contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ExerciseStyle {
    /// Exercise only at expiry.
    European,
    /// Exercise at any time up to expiry.
    American,
}

impl ExerciseStyle {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::European => "european",
            Self::American => "american",
        }
    }
}

/// Barrier crossing direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BarrierDirection {
    /// Barrier is breached when spot trades at or above the level.
    Up,
    /// Barrier is breached when spot trades at or below the level.
    Down,
}

/// Barrier knock behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BarrierStyle {
    /// Option activates once the barrier is hit.
    In,
    /// Option deactivates once the barrier is hit.
    Out,
}

/// Barrier contract parameters.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BarrierSpec {
    /// Barrier direction.
    pub direction: BarrierDirection,
    /// Knock-in or knock-out.
    pub style: BarrierStyle,
    /// Barrier level in spot units.
    pub level: f64,
    /// Cash paid at expiry when a knock-out triggers or a knock-in never does.
    pub rebate: f64,
}

impl BarrierSpec {
    /// Whether `spot` is on or beyond the barrier.
    #[inline]
    pub fn is_breached(&self, spot: f64) -> bool {
        match self.direction {
            BarrierDirection::Up => spot >= self.level,
            BarrierDirection::Down => spot <= self.level,
        }
    }
}

/// Averaging method for Asian options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Averaging {
    /// Arithmetic averaging.
    Arithmetic,
    /// Geometric averaging.
    Geometric,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intrinsic_value_is_floored_at_zero() {
        assert_eq!(OptionType::Call.intrinsic(110.0, 100.0), 10.0);
        assert_eq!(OptionType::Call.intrinsic(90.0, 100.0), 0.0);
        assert_eq!(OptionType::Put.intrinsic(90.0, 100.0), 10.0);
        assert_eq!(OptionType::Put.intrinsic(110.0, 100.0), 0.0);
    }

    #[test]
    fn barrier_breach_includes_the_level() {
        let up = BarrierSpec {
            direction: BarrierDirection::Up,
            style: BarrierStyle::Out,
            level: 120.0,
            rebate: 0.0,
        };
        assert!(up.is_breached(120.0));
        assert!(!up.is_breached(119.99));
        let down = BarrierSpec {
            direction: BarrierDirection::Down,
            ..up
        };
        assert!(down.is_breached(80.0));
        assert!(!down.is_breached(120.01));
    }
}
