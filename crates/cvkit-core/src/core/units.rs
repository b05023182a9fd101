use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Div, Mul};

/// Integer exponents of the base dimensions a collective variable can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub mass: i8,
    pub length: i8,
    pub time: i8,
    pub angle: i8,
}

impl Dimensions {
    pub const NONE: Self = Self {
        mass: 0,
        length: 0,
        time: 0,
        angle: 0,
    };

    fn combine(self, other: Self, sign: i8) -> Self {
        Self {
            mass: self.mass + sign * other.mass,
            length: self.length + sign * other.length,
            time: self.time + sign * other.time,
            angle: self.angle + sign * other.angle,
        }
    }

    fn scale(self, exponent: i8) -> Self {
        Self {
            mass: self.mass * exponent,
            length: self.length * exponent,
            time: self.time * exponent,
            angle: self.angle * exponent,
        }
    }

    pub fn is_dimensionless(&self) -> bool {
        *self == Self::NONE
    }
}

/// A physical unit expressed relative to the canonical MD unit system
/// (dalton, nanometer, picosecond, radian).
///
/// `factor` is the number of canonical units in one of this unit, so a unit
/// that belongs to the canonical system has a factor of exactly `1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    symbol: String,
    factor: f64,
    dimensions: Dimensions,
}

impl Unit {
    pub fn new(symbol: &str, factor: f64, dimensions: Dimensions) -> Self {
        Self {
            symbol: symbol.to_string(),
            factor,
            dimensions,
        }
    }

    pub fn dimensionless() -> Self {
        Self::new("dimensionless", 1.0, Dimensions::NONE)
    }

    pub fn nanometer() -> Self {
        Self::new(
            "nm",
            1.0,
            Dimensions {
                length: 1,
                ..Dimensions::NONE
            },
        )
    }

    pub fn angstrom() -> Self {
        Self::new(
            "A",
            0.1,
            Dimensions {
                length: 1,
                ..Dimensions::NONE
            },
        )
    }

    pub fn radian() -> Self {
        Self::new(
            "rad",
            1.0,
            Dimensions {
                angle: 1,
                ..Dimensions::NONE
            },
        )
    }

    pub fn degree() -> Self {
        Self::new(
            "deg",
            std::f64::consts::PI / 180.0,
            Dimensions {
                angle: 1,
                ..Dimensions::NONE
            },
        )
    }

    pub fn dalton() -> Self {
        Self::new(
            "Da",
            1.0,
            Dimensions {
                mass: 1,
                ..Dimensions::NONE
            },
        )
    }

    pub fn picosecond() -> Self {
        Self::new(
            "ps",
            1.0,
            Dimensions {
                time: 1,
                ..Dimensions::NONE
            },
        )
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Number of canonical MD units in one of this unit.
    pub fn conversion_factor(&self) -> f64 {
        self.factor
    }

    pub fn is_md_unit(&self) -> bool {
        self.factor == 1.0
    }

    pub fn powi(&self, exponent: i8) -> Self {
        let dimensions = self.dimensions.scale(exponent);
        let factor = self.factor.powi(exponent as i32);
        let symbol = match exponent {
            0 => "dimensionless".to_string(),
            1 => self.symbol.clone(),
            _ if self.dimensions.is_dimensionless() => self.symbol.clone(),
            _ => format!("{}**{}", self.symbol, exponent),
        };
        Self::compose(symbol, factor, dimensions)
    }

    /// Effective-mass unit conjugate to a collective variable measured in this unit.
    pub fn effective_mass_unit(&self) -> Self {
        Unit::dalton() * Unit::nanometer().powi(2) / self.powi(2)
    }

    fn compose(symbol: String, factor: f64, dimensions: Dimensions) -> Self {
        if factor == 1.0 {
            Self {
                symbol: canonical_symbol(dimensions),
                factor,
                dimensions,
            }
        } else {
            Self {
                symbol,
                factor,
                dimensions,
            }
        }
    }
}

fn canonical_symbol(dimensions: Dimensions) -> String {
    let parts: Vec<String> = [
        ("Da", dimensions.mass),
        ("nm", dimensions.length),
        ("ps", dimensions.time),
        ("rad", dimensions.angle),
    ]
    .iter()
    .filter(|(_, exponent)| *exponent != 0)
    .map(|(symbol, exponent)| match exponent {
        1 => symbol.to_string(),
        _ => format!("{}**{}", symbol, exponent),
    })
    .collect();
    if parts.is_empty() {
        "dimensionless".to_string()
    } else {
        parts.join("*")
    }
}

impl Mul for Unit {
    type Output = Unit;

    fn mul(self, rhs: Unit) -> Unit {
        let symbol = format!("{}*{}", self.symbol, rhs.symbol);
        Unit::compose(
            symbol,
            self.factor * rhs.factor,
            self.dimensions.combine(rhs.dimensions, 1),
        )
    }
}

impl Div for Unit {
    type Output = Unit;

    fn div(self, rhs: Unit) -> Unit {
        let symbol = format!("{}/({})", self.symbol, rhs.symbol);
        Unit::compose(
            symbol,
            self.factor / rhs.factor,
            self.dimensions.combine(rhs.dimensions, -1),
        )
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}

/// A scalar value tagged with its unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn value_in_md_units(&self) -> f64 {
        self.value * self.unit.conversion_factor()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}
