//! Expression trees: a closed, self-contained representation of the
//! operations, addresses and constants the lowering core works on.
//!
//! Every consumer pattern-matches exhaustively, so adding a variant forces
//! each legalizer and the cost oracle to take a position on it. Structural
//! equality and hashing are derived; the reorg pass keys its tables on them.

use crate::codegen::symbol::SymbolType;

/// A register reference. Numbers below [`crate::abi::FIRST_PSEUDO`] are hard
/// registers (0-31 general, 32-63 floating, then the two eliminable
/// pointers); anything above is a pseudo created during lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(pub u32);

impl Reg {
    #[must_use]
    pub const fn is_gpr(self) -> bool {
        self.0 < 32
    }

    #[must_use]
    pub const fn is_fpr(self) -> bool {
        self.0 >= 32 && self.0 < 64
    }

    #[must_use]
    pub const fn is_pseudo(self) -> bool {
        self.0 >= crate::abi::FIRST_PSEUDO
    }

    /// The ABI name of a hard register.
    ///
    /// # Panics
    /// Panics on pseudo registers and the eliminable pointers; only real
    /// registers reach the assembly printer.
    #[must_use]
    pub fn name(self) -> &'static str {
        assert!(self.0 < 64, "internal error: no name for register {}", self.0);
        crate::abi::REG_NAMES[self.0 as usize]
    }
}

/// Thread-local storage access models, from the most flexible (supports
/// dynamic loading) to the fastest (static executables only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlsModel {
    GlobalDynamic,
    LocalDynamic,
    InitialExec,
    LocalExec,
}

/// A symbolic reference to an object or function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolRef {
    pub name: String,
    /// `Some` for thread-local symbols.
    pub tls_model: Option<TlsModel>,
    /// Declared alignment of the underlying object in bytes.
    pub align: u64,
    /// Size of the containing object block, when known. Offsets added to
    /// the symbol must stay inside this block on 64-bit targets.
    pub block_size: Option<u64>,
    /// True for symbols with local binding.
    pub local: bool,
    /// True if the symbol may only be accessed through the literal pool.
    pub force_to_mem: bool,
}

impl SymbolRef {
    /// An ordinary global symbol with no special properties.
    #[must_use]
    pub fn global(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            tls_model: None,
            align: 1,
            block_size: None,
            local: false,
            force_to_mem: false,
        }
    }

    /// A local (file-scope) symbol.
    #[must_use]
    pub fn local(name: &str) -> Self {
        Self {
            local: true,
            ..Self::global(name)
        }
    }

    /// A thread-local symbol with the given access model.
    #[must_use]
    pub fn tls(name: &str, model: TlsModel) -> Self {
        Self {
            tls_model: Some(model),
            ..Self::global(name)
        }
    }
}

/// Machine modes. Integer modes QI/HI/SI/DI/TI, scalar floats SF/DF,
/// complex floats CSF/CDF, and BLK for aggregates and unaligned accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    QI,
    HI,
    SI,
    DI,
    TI,
    SF,
    DF,
    CSF,
    CDF,
    BLK,
}

/// Broad classification of a machine mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeClass {
    Int,
    Float,
    ComplexFloat,
    Blk,
}

impl Mode {
    /// Size of the mode in bytes (zero for BLK).
    #[must_use]
    pub const fn size(self) -> u64 {
        match self {
            Mode::QI => 1,
            Mode::HI => 2,
            Mode::SI | Mode::SF => 4,
            Mode::DI | Mode::DF | Mode::CSF => 8,
            Mode::TI | Mode::CDF => 16,
            Mode::BLK => 0,
        }
    }

    #[must_use]
    pub const fn bitsize(self) -> u64 {
        self.size() * 8
    }

    #[must_use]
    pub const fn class(self) -> ModeClass {
        match self {
            Mode::QI | Mode::HI | Mode::SI | Mode::DI | Mode::TI => ModeClass::Int,
            Mode::SF | Mode::DF => ModeClass::Float,
            Mode::CSF | Mode::CDF => ModeClass::ComplexFloat,
            Mode::BLK => ModeClass::Blk,
        }
    }

    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self.class(), ModeClass::Float | ModeClass::ComplexFloat)
    }

    /// Size of one unit: the component size for complex modes, the full
    /// size otherwise.
    #[must_use]
    pub const fn unit_size(self) -> u64 {
        match self {
            Mode::CSF => 4,
            Mode::CDF => 8,
            other => other.size(),
        }
    }

    /// The component mode of a complex mode, or the mode itself.
    #[must_use]
    pub const fn inner(self) -> Mode {
        match self {
            Mode::CSF => Mode::SF,
            Mode::CDF => Mode::DF,
            other => other,
        }
    }

    /// Natural alignment in bits. 128-bit values are only guaranteed
    /// 64-bit alignment, which is what the multiword LO_SUM check relies on.
    #[must_use]
    pub const fn alignment_bits(self) -> u64 {
        match self {
            Mode::QI => 8,
            Mode::HI => 16,
            Mode::SI | Mode::SF | Mode::CSF => 32,
            Mode::DI | Mode::DF | Mode::TI | Mode::CDF => 64,
            Mode::BLK => 8,
        }
    }

    /// The integer mode with exactly `bytes` bytes, if there is one.
    #[must_use]
    pub const fn int_with_size(bytes: u64) -> Option<Mode> {
        match bytes {
            1 => Some(Mode::QI),
            2 => Some(Mode::HI),
            4 => Some(Mode::SI),
            8 => Some(Mode::DI),
            16 => Some(Mode::TI),
            _ => None,
        }
    }
}

/// Binary operators that can appear in lowered expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Plus,
    Minus,
    Mult,
    Div,
    UDiv,
    Mod,
    UMod,
    And,
    Ior,
    Xor,
    Ashift,
    Ashiftrt,
    Lshiftrt,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    Abs,
    Ffs,
    Sqrt,
    Float,
    UnsignedFloat,
    Fix,
    FloatExtend,
    FloatTruncate,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Ltu,
    Le,
    Leu,
    Gt,
    Gtu,
    Ge,
    Geu,
    Unordered,
    Ltgt,
}

impl CompareOp {
    /// The condition that holds exactly when `self` does not.
    ///
    /// # Panics
    /// Panics on the unordered float conditions, which have no integer
    /// branch encoding.
    #[must_use]
    pub fn inverse(self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Ltu => CompareOp::Geu,
            CompareOp::Le => CompareOp::Gt,
            CompareOp::Leu => CompareOp::Gtu,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Gtu => CompareOp::Leu,
            CompareOp::Ge => CompareOp::Lt,
            CompareOp::Geu => CompareOp::Ltu,
            CompareOp::Unordered | CompareOp::Ltgt => {
                panic!("internal error: no inverse branch condition for {self:?}")
            }
        }
    }
}

/// The expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Reg(Reg),
    Const(i64),
    /// A floating-point literal, stored as its bit pattern.
    FloatConst { bits: u64, mode: Mode },
    Symbol(SymbolRef),
    Label(u32),
    /// A symbolic address annotated with the relocation type it must be
    /// emitted with. Wrapping fixes the classification of the inner
    /// address regardless of context.
    Wrapped { ty: SymbolType, base: Box<Expr> },
    /// The high part of a symbolic address (the LUI half of a split).
    High(Box<Expr>),
    /// `base + %lo(addend)`: the low half of a split address.
    LoSum { base: Box<Expr>, addend: Box<Expr> },
    Binary {
        op: BinaryOp,
        mode: Mode,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        mode: Mode,
        arg: Box<Expr>,
    },
    /// Sign or zero extension from `from` to `to`.
    Extend {
        signed: bool,
        to: Mode,
        from: Mode,
        arg: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        /// Mode of the operands; the comparison itself has none.
        mode: Mode,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Mem { mode: Mode, addr: Box<Expr> },
}

impl Expr {
    #[must_use]
    pub fn plus(mode: Mode, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op: BinaryOp::Plus,
            mode,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// `expr + constant`, folding the zero and constant-operand cases.
    #[must_use]
    pub fn plus_constant(self, mode: Mode, value: i64) -> Expr {
        if value == 0 {
            return self;
        }
        match self {
            Expr::Const(c) => Expr::Const(c.wrapping_add(value)),
            Expr::Binary {
                op: BinaryOp::Plus,
                mode,
                lhs,
                rhs,
            } if matches!(*rhs, Expr::Const(_)) => {
                let Expr::Const(c) = *rhs else { unreachable!() };
                Expr::plus_constant(*lhs, mode, c.wrapping_add(value))
            }
            base => Expr::plus(mode, base, Expr::Const(value)),
        }
    }

    #[must_use]
    pub fn mem(mode: Mode, addr: Expr) -> Expr {
        Expr::Mem {
            mode,
            addr: Box::new(addr),
        }
    }

    #[must_use]
    pub fn lo_sum(base: Expr, addend: Expr) -> Expr {
        Expr::LoSum {
            base: Box::new(base),
            addend: Box::new(addend),
        }
    }

    #[must_use]
    pub fn high(inner: Expr) -> Expr {
        Expr::High(Box::new(inner))
    }

    #[must_use]
    pub fn wrapped(ty: SymbolType, base: Expr) -> Expr {
        Expr::Wrapped {
            ty,
            base: Box::new(base),
        }
    }

    /// Split a constant expression into a base and an integer offset.
    /// Non-sums split as `(self, 0)`.
    #[must_use]
    pub fn split_const(&self) -> (&Expr, i64) {
        if let Expr::Binary {
            op: BinaryOp::Plus,
            lhs,
            rhs,
            ..
        } = self
            && let Expr::Const(offset) = **rhs
        {
            return (&**lhs, offset);
        }
        (self, 0)
    }

    /// True for expressions that are constant at compile or link time.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Const(_)
            | Expr::FloatConst { .. }
            | Expr::Symbol(_)
            | Expr::Label(_)
            | Expr::Wrapped { .. }
            | Expr::High(_) => true,
            Expr::Binary {
                op: BinaryOp::Plus,
                lhs,
                rhs,
                ..
            } => lhs.is_constant() && matches!(**rhs, Expr::Const(_)),
            _ => false,
        }
    }

    /// Visit `self` and every subexpression, outermost first.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Reg(_)
            | Expr::Const(_)
            | Expr::FloatConst { .. }
            | Expr::Symbol(_)
            | Expr::Label(_) => {}
            Expr::Wrapped { base, .. } => base.walk(f),
            Expr::High(inner) => inner.walk(f),
            Expr::LoSum { base, addend } => {
                base.walk(f);
                addend.walk(f);
            }
            Expr::Binary { lhs, rhs, .. } | Expr::Compare { lhs, rhs, .. } => {
                lhs.walk(f);
                rhs.walk(f);
            }
            Expr::Unary { arg, .. } | Expr::Extend { arg, .. } => arg.walk(f),
            Expr::Mem { addr, .. } => addr.walk(f),
        }
    }

    /// True if any subexpression mentions register `reg`.
    #[must_use]
    pub fn mentions_reg(&self, reg: Reg) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if matches!(e, Expr::Reg(r) if *r == reg) {
                found = true;
            }
        });
        found
    }

    /// True if any subexpression is a thread-local symbol.
    #[must_use]
    pub fn references_tls(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if matches!(e, Expr::Symbol(s) if s.tls_model.is_some()) {
                found = true;
            }
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus_constant_folds() {
        let reg = Expr::Reg(Reg(10));
        assert_eq!(reg.clone().plus_constant(Mode::DI, 0), reg);
        assert_eq!(Expr::Const(3).plus_constant(Mode::DI, 4), Expr::Const(7));

        let nested = Expr::plus(Mode::DI, Expr::Reg(Reg(10)), Expr::Const(8));
        assert_eq!(
            nested.plus_constant(Mode::DI, -8),
            Expr::Reg(Reg(10)),
            "offsets cancel back to the bare register"
        );
    }

    #[test]
    fn split_const_on_symbol_sum() {
        let sum = Expr::plus(
            Mode::DI,
            Expr::Symbol(SymbolRef::global("x")),
            Expr::Const(12),
        );
        let (base, offset) = sum.split_const();
        assert_eq!(*base, Expr::Symbol(SymbolRef::global("x")));
        assert_eq!(offset, 12);
    }

    #[test]
    fn tls_walk() {
        let e = Expr::mem(
            Mode::DI,
            Expr::plus(
                Mode::DI,
                Expr::Reg(Reg(2)),
                Expr::Symbol(SymbolRef::tls("v", TlsModel::LocalExec)),
            ),
        );
        assert!(e.references_tls());
        assert!(e.mentions_reg(Reg(2)));
        assert!(!e.mentions_reg(Reg(3)));
    }
}
