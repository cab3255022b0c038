//! Canonical plain-vanilla option contract used by every pricing engine.
//!
//! [`OptionContract`] stores side, strike, expiry and exercise rights
//! ([`ExerciseStyle`]: European/American). Fields are private; a contract is
//! immutable once built. References: Hull (2018), Ch. 10-13 for payoff and
//! exercise conventions. Validation accepts `expiry == 0` (intrinsic-value edge case).

use serde::{Deserialize, Serialize};

use crate::core::{ensure_non_negative, ensure_positive, ExerciseStyle, OptionType, Result};

/// Vanilla option contract.
///
/// # Examples
/// ```
/// use sierra::core::{ExerciseStyle, OptionType};
/// use sierra::instruments::OptionContract;
///
/// let option = OptionContract::new(OptionType::Call, 100.0, 1.0, ExerciseStyle::European).unwrap();
/// assert_eq!(option.strike(), 100.0);
/// assert!(OptionContract::new(OptionType::Put, -1.0, 1.0, ExerciseStyle::European).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    option_type: OptionType,
    strike: f64,
    expiry: f64,
    exercise: ExerciseStyle,
}

impl OptionContract {
    /// Builds and validates a contract.
    pub fn new(
        option_type: OptionType,
        strike: f64,
        expiry: f64,
        exercise: ExerciseStyle,
    ) -> Result<Self> {
        let contract = Self {
            option_type,
            strike,
            expiry,
            exercise,
        };
        contract.validate()?;
        Ok(contract)
    }

    pub fn european_call(strike: f64, expiry: f64) -> Result<Self> {
        Self::new(OptionType::Call, strike, expiry, ExerciseStyle::European)
    }

    pub fn european_put(strike: f64, expiry: f64) -> Result<Self> {
        Self::new(OptionType::Put, strike, expiry, ExerciseStyle::European)
    }

    pub fn american_call(strike: f64, expiry: f64) -> Result<Self> {
        Self::new(OptionType::Call, strike, expiry, ExerciseStyle::American)
    }

    pub fn american_put(strike: f64, expiry: f64) -> Result<Self> {
        Self::new(OptionType::Put, strike, expiry, ExerciseStyle::American)
    }

    #[inline]
    pub fn option_type(&self) -> OptionType {
        self.option_type
    }

    #[inline]
    pub fn strike(&self) -> f64 {
        self.strike
    }

    /// Time to expiry in years.
    #[inline]
    pub fn expiry(&self) -> f64 {
        self.expiry
    }

    #[inline]
    pub fn exercise(&self) -> ExerciseStyle {
        self.exercise
    }

    /// Same terms with the other exercise style.
    pub fn with_exercise(&self, exercise: ExerciseStyle) -> Self {
        Self { exercise, ..*self }
    }

    /// Same terms on the opposite side (call ↔ put).
    pub fn flipped(&self) -> Self {
        let option_type = match self.option_type {
            OptionType::Call => OptionType::Put,
            OptionType::Put => OptionType::Call,
        };
        Self {
            option_type,
            ..*self
        }
    }

    #[inline]
    pub fn intrinsic(&self, spot: f64) -> f64 {
        self.option_type.intrinsic(spot, self.strike)
    }

    /// Validates instrument fields.
    ///
    /// # Errors
    /// [`crate::core::QuantError::InvalidParameter`] when `strike <= 0`, `expiry < 0`
    /// or either is non-finite. Deserialized contracts are re-checked by every engine.
    pub fn validate(&self) -> Result<()> {
        ensure_positive("strike", self.strike)?;
        ensure_non_negative("expiry", self.expiry)
    }
}
