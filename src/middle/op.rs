//! Go operator tokens as they appear in SSA instructions.

use std::str::FromStr;

use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter, Display)]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Rem,
    #[strum(serialize = "&")]
    And,
    #[strum(serialize = "|")]
    Or,
    #[strum(serialize = "^")]
    Xor,
    #[strum(serialize = "<<")]
    Shl,
    #[strum(serialize = ">>")]
    Shr,
    #[strum(serialize = "&^")]
    AndNot,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    /// Recovers the operator from the SSA text `x <op> y`.
    pub fn from_comment(comment: &str, x: &str, y: &str) -> Option<Self> {
        let exact = comment
            .strip_prefix(x)
            .and_then(|rest| rest.strip_suffix(y))
            .map(str::trim)
            .and_then(|op| BinaryOp::from_str(op).ok());
        if exact.is_some() {
            return exact;
        }

        // Operand spellings in comments may be package-relative; fall back
        // to the single spaced operator token.
        let mut found = comment
            .split(' ')
            .filter_map(|token| BinaryOp::from_str(token).ok());
        match (found.next(), found.next()) {
            (Some(op), None) => Some(op),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter, Display)]
pub enum UnaryOp {
    #[strum(serialize = "-")]
    Neg,
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "^")]
    Complement,
    #[strum(serialize = "*")]
    Deref,
    #[strum(serialize = "<-")]
    Recv,
}

impl UnaryOp {
    /// Recovers the operator from the SSA text `<op>x` or `<op>x,ok`.
    pub fn from_comment(comment: &str, x: &str) -> Option<Self> {
        let operand = comment.strip_suffix(",ok").unwrap_or(comment);
        UnaryOp::iter().find(|op| {
            operand
                .strip_prefix(op.to_string().as_str())
                .is_some_and(|rest| rest == x)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_from_comment() {
        assert_eq!(BinaryOp::from_comment("t0 + 1:int", "t0", "1:int"), Some(BinaryOp::Add));
        assert_eq!(BinaryOp::from_comment("x &^ y", "x", "y"), Some(BinaryOp::AndNot));
        assert_eq!(BinaryOp::from_comment("t1 <= t2", "t1", "t2"), Some(BinaryOp::Le));
        assert_eq!(
            BinaryOp::from_comment("main.limit < t3", "limit", "t3"),
            Some(BinaryOp::Lt)
        );
        assert_eq!(BinaryOp::from_comment("garbage", "a", "b"), None);
    }

    #[test]
    fn unary_from_comment() {
        assert_eq!(UnaryOp::from_comment("*t0", "t0"), Some(UnaryOp::Deref));
        assert_eq!(UnaryOp::from_comment("<-t3,ok", "t3"), Some(UnaryOp::Recv));
        assert_eq!(UnaryOp::from_comment("^t1", "t1"), Some(UnaryOp::Complement));
        assert_eq!(UnaryOp::from_comment("-x", "x"), Some(UnaryOp::Neg));
        assert_eq!(UnaryOp::from_comment("!t2", "t9"), None);
    }
}
