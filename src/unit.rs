//! Fixed-precision real arithmetic (spec §4.1).
//!
//! `Unit` wraps an `f64` with epsilon-equality, an undefined state, and a
//! process-wide "imprecise mode" toggle: inner simulation loops want native
//! float speed, but deterministic tests want rounded, reproducible scores.

use std::{
    fmt,
    ops::{Add, Div, Mul, Neg, Sub},
    str::FromStr,
    sync::atomic::{AtomicBool, AtomicU32, Ordering},
};

/// Equality/comparison epsilon, per spec §4.1.
pub const EPSILON: f64 = 1e-10;

static IMPRECISE: AtomicBool = AtomicBool::new(false);
static PRECISION: AtomicU32 = AtomicU32::new(10);

/// Enter imprecise mode for the duration of plan execution; native-precision
/// multiply/divide instead of rounding to [`precision`] decimal places.
///
/// This is process-wide rather than thread-local because the engine is
/// single-threaded cooperative (spec §5).
pub fn set_imprecise(imprecise: bool) {
    IMPRECISE.store(imprecise, Ordering::Relaxed);
}
pub fn is_imprecise() -> bool {
    IMPRECISE.load(Ordering::Relaxed)
}
pub fn set_precision(decimal_places: u32) {
    PRECISION.store(decimal_places, Ordering::Relaxed);
}
pub fn precision() -> u32 {
    PRECISION.load(Ordering::Relaxed)
}

/// A scope guard that restores the previous imprecise-mode flag on drop.
pub struct ImpreciseScope {
    previous: bool,
}
impl ImpreciseScope {
    pub fn enter() -> Self {
        let previous = is_imprecise();
        set_imprecise(true);
        Self { previous }
    }
}
impl Drop for ImpreciseScope {
    fn drop(&mut self) {
        set_imprecise(self.previous);
    }
}

/// A single real value, or the distinguished undefined value.
#[derive(Debug, Clone, Copy)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Unit(Option<f64>);

impl Unit {
    pub const UNDEFINED: Self = Self(None);

    pub const fn new(v: f64) -> Self {
        Self(Some(v))
    }
    pub fn is_defined(self) -> bool {
        self.0.is_some()
    }
    pub fn is_undefined(self) -> bool {
        self.0.is_none()
    }
    pub fn get(self) -> Option<f64> {
        self.0
    }
    #[track_caller]
    pub fn value(self) -> f64 {
        self.0.expect("Unit is undefined")
    }
    pub fn or(self, fallback: Unit) -> Unit {
        if self.is_defined() { self } else { fallback }
    }

    fn round(v: f64) -> f64 {
        if is_imprecise() {
            v
        } else {
            let scale = 10f64.powi(precision() as i32);
            (v * scale).round() / scale
        }
    }

    pub fn approx_eq(self, other: Self) -> bool {
        match (self.0, other.0) {
            (None, None) => true,
            (Some(a), Some(b)) => (a - b).abs() <= EPSILON,
            _ => false,
        }
    }
    pub fn is_zero(self) -> bool {
        self.0.is_some_and(|v| v.abs() <= EPSILON)
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.approx_eq(*other)
    }
}

impl Default for Unit {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{v}"),
            None => f.write_str("undefined"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid Unit literal: {0:?}")]
pub struct UnitParseError(String);

impl FromStr for Unit {
    type Err = UnitParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("undefined") {
            return Ok(Self::UNDEFINED);
        }
        s.parse::<f64>()
            .map(Self::new)
            .map_err(|_| UnitParseError(s.to_owned()))
    }
}

macro_rules! binop {
    ($trait:ident, $method:ident, $op:tt, $round:expr) => {
        impl $trait for Unit {
            type Output = Unit;
            fn $method(self, rhs: Unit) -> Unit {
                match (self.0, rhs.0) {
                    (Some(a), Some(b)) => {
                        let v = a $op b;
                        Unit(Some(if $round { Self::round(v) } else { v }))
                    }
                    _ => Unit::UNDEFINED,
                }
            }
        }
    };
}
binop!(Add, add, +, false);
binop!(Sub, sub, -, false);
binop!(Mul, mul, *, true);
binop!(Div, div, /, true);

impl Neg for Unit {
    type Output = Unit;
    fn neg(self) -> Unit {
        Unit(self.0.map(|v| -v))
    }
}

impl From<f64> for Unit {
    fn from(v: f64) -> Self {
        Self::new(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_propagates() {
        let a = Unit::new(1.0);
        let u = Unit::UNDEFINED;
        assert!((a + u).is_undefined());
        assert!((a * u).is_undefined());
    }

    #[test]
    fn epsilon_equality() {
        let a = Unit::new(1.0);
        let b = Unit::new(1.0 + EPSILON / 2.0);
        assert_eq!(a, b);
        let c = Unit::new(1.0 + EPSILON * 100.0);
        assert_ne!(a, c);
    }

    #[test]
    fn precise_mode_rounds_multiply() {
        set_imprecise(false);
        set_precision(4);
        let a = Unit::new(1.0 / 3.0);
        let b = Unit::new(1.0);
        let product = a * b;
        assert_eq!(product.value(), 0.3333);
    }

    #[test]
    fn imprecise_scope_restores_previous_flag() {
        set_imprecise(false);
        {
            let _scope = ImpreciseScope::enter();
            assert!(is_imprecise());
        }
        assert!(!is_imprecise());
    }

    #[test]
    fn parse_roundtrip() {
        let u: Unit = "3.5".parse().unwrap();
        assert_eq!(u, Unit::new(3.5));
        let u: Unit = "undefined".parse().unwrap();
        assert!(u.is_undefined());
    }

    proptest::proptest! {
        /// Formatting a defined `Unit` and parsing it back always recovers
        /// the same value (spec §4.1 "Parsing from decimal text").
        #[test]
        fn defined_unit_round_trips_through_text(v in proptest::num::f64::NORMAL) {
            let unit = Unit::new(v);
            let parsed: Unit = unit.to_string().parse().unwrap();
            proptest::prop_assert_eq!(parsed.value(), v);
        }
    }
}
