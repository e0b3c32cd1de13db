use std::fmt;

/// Operator kinds appearing in expressions, both in the parse tree and in
/// resolved expressions. `IsNull` and `Cast` never appear in the parse tree;
/// the analyzer introduces them while rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Not,
    UMinus,
    Plus,
    Minus,
    Multiply,
    Divide,
    IsNull,
    Cast,
}

impl OpType {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            OpType::Eq | OpType::Ne | OpType::Lt | OpType::Gt | OpType::Le | OpType::Ge
        )
    }

    pub fn is_logic(&self) -> bool {
        matches!(self, OpType::And | OpType::Or)
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            OpType::Plus | OpType::Minus | OpType::Multiply | OpType::Divide
        )
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpType::Eq => "=",
            OpType::Ne => "<>",
            OpType::Lt => "<",
            OpType::Gt => ">",
            OpType::Le => "<=",
            OpType::Ge => ">=",
            OpType::And => "AND",
            OpType::Or => "OR",
            OpType::Not => "NOT",
            OpType::UMinus => "-",
            OpType::Plus => "+",
            OpType::Minus => "-",
            OpType::Multiply => "*",
            OpType::Divide => "/",
            OpType::IsNull => "IS NULL",
            OpType::Cast => "CAST",
        };
        write!(f, "{s}")
    }
}

/// Comparison qualifier of a binary operator whose right side is a subquery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    One,
    Any,
    All,
}

/// The supported aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggKind {
    Count,
    Min,
    Max,
    Avg,
    Sum,
}

impl fmt::Display for AggKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggKind::Count => "COUNT",
            AggKind::Min => "MIN",
            AggKind::Max => "MAX",
            AggKind::Avg => "AVG",
            AggKind::Sum => "SUM",
        };
        write!(f, "{s}")
    }
}
