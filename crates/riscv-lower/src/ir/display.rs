//! Human-readable rendering of expressions for logs, diagnostics and the
//! operand printer.

use std::fmt;

use super::expr::{BinaryOp, CompareOp, Expr, Mode, Reg};

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 64 {
            write!(f, "{}", self.name())
        } else if self.0 == crate::abi::FRAME_POINTER.0 {
            write!(f, "<frame>")
        } else if self.0 == crate::abi::ARG_POINTER.0 {
            write!(f, "<args>")
        } else {
            write!(f, "%{}", self.0)
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::QI => "qi",
            Mode::HI => "hi",
            Mode::SI => "si",
            Mode::DI => "di",
            Mode::TI => "ti",
            Mode::SF => "sf",
            Mode::DF => "df",
            Mode::CSF => "csf",
            Mode::CDF => "cdf",
            Mode::BLK => "blk",
        };
        f.write_str(name)
    }
}

impl BinaryOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Mult => "*",
            BinaryOp::Div | BinaryOp::UDiv => "/",
            BinaryOp::Mod | BinaryOp::UMod => "%",
            BinaryOp::And => "&",
            BinaryOp::Ior => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Ashift => "<<",
            BinaryOp::Ashiftrt => ">>",
            BinaryOp::Lshiftrt => ">>>",
        }
    }
}

impl CompareOp {
    /// The assembler spelling of the integer condition.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Lt => "lt",
            CompareOp::Ltu => "ltu",
            CompareOp::Le => "le",
            CompareOp::Leu => "leu",
            CompareOp::Gt => "gt",
            CompareOp::Gtu => "gtu",
            CompareOp::Ge => "ge",
            CompareOp::Geu => "geu",
            CompareOp::Unordered => "unordered",
            CompareOp::Ltgt => "ltgt",
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Reg(reg) => write!(f, "{reg}"),
            Expr::Const(value) => write!(f, "{value}"),
            Expr::FloatConst { bits, mode } => write!(f, "fconst:{mode}({bits:#x})"),
            Expr::Symbol(sym) => f.write_str(&sym.name),
            Expr::Label(n) => write!(f, ".L{n}"),
            Expr::Wrapped { ty, base } => write!(f, "{ty:?}[{base}]"),
            Expr::High(inner) => write!(f, "high({inner})"),
            Expr::LoSum { base, addend } => write!(f, "losum({base},{addend})"),
            Expr::Binary { op, lhs, rhs, .. } => {
                write!(f, "({lhs}{}{rhs})", op.symbol())
            }
            Expr::Unary { op, arg, .. } => write!(f, "{op:?}({arg})"),
            Expr::Extend {
                signed, to, arg, ..
            } => {
                let kind = if *signed { "sext" } else { "zext" };
                write!(f, "{kind}:{to}({arg})")
            }
            Expr::Compare { op, lhs, rhs, .. } => write!(f, "({lhs} {} {rhs})", op.name()),
            Expr::Mem { mode, addr } => write!(f, "mem:{mode}[{addr}]"),
        }
    }
}
