//! SQL type system: type tags, parameterized types and the common-type
//! promotion rules used by the analyzer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag of a SQL type. `Null` is the wildcard tag carried by untyped null
/// literals until analysis binds them to a context type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Boolean,
    Char,
    Varchar,
    Text,
    Numeric,
    Decimal,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Time,
    Timestamp,
    Null,
}

/// A fully parameterized SQL type.
///
/// `dimension` is the precision of an exact numeric or the declared length of
/// a string type; `scale` is the number of fractional digits of an exact
/// numeric. Two types are equal iff all four components match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlType {
    pub kind: TypeKind,
    pub dimension: i32,
    pub scale: i32,
    pub notnull: bool,
}

impl SqlType {
    /// Creates a type with no parameters.
    pub fn new(kind: TypeKind) -> Self {
        SqlType {
            kind,
            dimension: 0,
            scale: 0,
            notnull: false,
        }
    }

    /// Creates a `VARCHAR(len)` type.
    pub fn varchar(len: i32) -> Self {
        SqlType {
            kind: TypeKind::Varchar,
            dimension: len,
            scale: 0,
            notnull: false,
        }
    }

    /// Creates a `NUMERIC(dimension, scale)` type.
    pub fn numeric(dimension: i32, scale: i32) -> Self {
        SqlType {
            kind: TypeKind::Numeric,
            dimension,
            scale,
            notnull: false,
        }
    }

    /// Returns a copy of this type with the given nullability.
    pub fn with_notnull(mut self, notnull: bool) -> Self {
        self.notnull = notnull;
        self
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::SmallInt
                | TypeKind::Int
                | TypeKind::BigInt
                | TypeKind::Numeric
                | TypeKind::Decimal
                | TypeKind::Float
                | TypeKind::Double
        )
    }

    pub fn is_string(&self) -> bool {
        matches!(self.kind, TypeKind::Char | TypeKind::Varchar | TypeKind::Text)
    }

    pub fn is_null(&self) -> bool {
        self.kind == TypeKind::Null
    }

    /// Widening rank along the numeric promotion chain.
    /// `Numeric` and `Decimal` share a rank; they only differ in name.
    fn numeric_rank(&self) -> u8 {
        match self.kind {
            TypeKind::SmallInt => 0,
            TypeKind::Int => 1,
            TypeKind::BigInt => 2,
            TypeKind::Numeric | TypeKind::Decimal => 3,
            TypeKind::Float => 4,
            TypeKind::Double => 5,
            _ => unreachable!("numeric_rank on non-numeric type"),
        }
    }

    fn string_rank(&self) -> u8 {
        match self.kind {
            TypeKind::Char => 0,
            TypeKind::Varchar => 1,
            TypeKind::Text => 2,
            _ => unreachable!("string_rank on non-string type"),
        }
    }

    /// Precision and scale a type contributes when it meets an exact
    /// decimal: decimals keep their declared shape, integers contribute the
    /// digit count of their value range.
    fn decimal_shape(&self) -> (i32, i32) {
        match self.kind {
            TypeKind::Numeric | TypeKind::Decimal => (self.dimension, self.scale),
            TypeKind::SmallInt => (5, 0),
            TypeKind::Int => (10, 0),
            TypeKind::BigInt => (19, 0),
            _ => (self.dimension, self.scale),
        }
    }

    /// Common type of two numeric types under SQL numeric promotion.
    ///
    /// Widens along `SMALLINT < INT < BIGINT < NUMERIC/DECIMAL < FLOAT <
    /// DOUBLE`. When the result is an exact decimal its precision
    /// accommodates both operands: the wider integral part plus the wider
    /// fractional part.
    pub fn common_numeric(a: &SqlType, b: &SqlType) -> SqlType {
        let notnull = a.notnull && b.notnull;
        let wide = if a.numeric_rank() >= b.numeric_rank() { a } else { b };
        let mut common = *wide;
        if matches!(common.kind, TypeKind::Numeric | TypeKind::Decimal) {
            let (da, sa) = a.decimal_shape();
            let (db, sb) = b.decimal_shape();
            let scale = sa.max(sb);
            let integral = (da - sa).max(db - sb);
            common.dimension = integral + scale;
            common.scale = scale;
        }
        common.notnull = notnull;
        common
    }

    /// Common type of two string types: widens along `CHAR < VARCHAR < TEXT`
    /// and keeps the maximum declared length.
    pub fn common_string(a: &SqlType, b: &SqlType) -> SqlType {
        let wide = if a.string_rank() >= b.string_rank() { a } else { b };
        let mut common = *wide;
        common.dimension = a.dimension.max(b.dimension);
        common.notnull = a.notnull && b.notnull;
        common
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TypeKind::Boolean => write!(f, "BOOLEAN"),
            TypeKind::Char => write!(f, "CHAR({})", self.dimension),
            TypeKind::Varchar => write!(f, "VARCHAR({})", self.dimension),
            TypeKind::Text => write!(f, "TEXT"),
            TypeKind::Numeric => {
                if self.scale > 0 {
                    write!(f, "NUMERIC({}, {})", self.dimension, self.scale)
                } else {
                    write!(f, "NUMERIC({})", self.dimension)
                }
            }
            TypeKind::Decimal => {
                if self.scale > 0 {
                    write!(f, "DECIMAL({}, {})", self.dimension, self.scale)
                } else {
                    write!(f, "DECIMAL({})", self.dimension)
                }
            }
            TypeKind::SmallInt => write!(f, "SMALLINT"),
            TypeKind::Int => write!(f, "INT"),
            TypeKind::BigInt => write!(f, "BIGINT"),
            TypeKind::Float => write!(f, "FLOAT"),
            TypeKind::Double => write!(f, "DOUBLE"),
            TypeKind::Time => write!(f, "TIME"),
            TypeKind::Timestamp => write!(f, "TIMESTAMP"),
            TypeKind::Null => write!(f, "NULL"),
        }
    }
}

/// Column compression scheme recorded on a column descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    /// No compression.
    None,
    /// Fixed-bits encoding; the parameter is the bit width.
    Fixed,
    /// Run-length encoding.
    RL,
    /// Differential encoding.
    Diff,
    /// Dictionary encoding.
    Dict,
    /// Sparse-column encoding for mostly-null columns; the parameter is the
    /// bit width.
    Sparse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_type_equality_is_componentwise() {
        // given two varchar types that differ only in dimension
        let a = SqlType::varchar(10);
        let b = SqlType::varchar(20);

        // then they are not equal, but identical components are
        assert_ne!(a, b);
        assert_eq!(a, SqlType::varchar(10));
        assert_ne!(a, SqlType::varchar(10).with_notnull(true));
    }

    #[test]
    fn common_numeric_widens_along_promotion_chain() {
        // given a smallint and a double
        let small = SqlType::new(TypeKind::SmallInt);
        let double = SqlType::new(TypeKind::Double);

        // when computing the common type in either order
        let c1 = SqlType::common_numeric(&small, &double);
        let c2 = SqlType::common_numeric(&double, &small);

        // then both widen to double
        assert_eq!(c1.kind, TypeKind::Double);
        assert_eq!(c2.kind, TypeKind::Double);
    }

    #[test]
    fn common_numeric_combines_decimal_precision() {
        // given NUMERIC(6, 2) and NUMERIC(5, 4)
        let a = SqlType::numeric(6, 2);
        let b = SqlType::numeric(5, 4);

        // when computing the common type
        let c = SqlType::common_numeric(&a, &b);

        // then it accommodates four integral digits and four fractional ones
        assert_eq!(c.kind, TypeKind::Numeric);
        assert_eq!(c.scale, 4);
        assert_eq!(c.dimension, 8);
    }

    #[test]
    fn common_numeric_is_nullable_when_either_side_is() {
        let a = SqlType::new(TypeKind::Int).with_notnull(true);
        let b = SqlType::new(TypeKind::BigInt);
        assert!(!SqlType::common_numeric(&a, &b).notnull);

        let b = b.with_notnull(true);
        assert!(SqlType::common_numeric(&a, &b).notnull);
    }

    #[test]
    fn common_string_widens_and_keeps_max_length() {
        // given CHAR(5) and VARCHAR(3)
        let a = SqlType {
            kind: TypeKind::Char,
            dimension: 5,
            scale: 0,
            notnull: false,
        };
        let b = SqlType::varchar(3);

        // when computing the common type
        let c = SqlType::common_string(&a, &b);

        // then it is VARCHAR(5)
        assert_eq!(c.kind, TypeKind::Varchar);
        assert_eq!(c.dimension, 5);
    }

    #[test]
    fn display_renders_canonical_sql() {
        assert_eq!(SqlType::varchar(10).to_string(), "VARCHAR(10)");
        assert_eq!(SqlType::numeric(7, 2).to_string(), "NUMERIC(7, 2)");
        assert_eq!(SqlType::numeric(7, 0).to_string(), "NUMERIC(7)");
        assert_eq!(SqlType::new(TypeKind::BigInt).to_string(), "BIGINT");
    }
}
