//! Symbol classification: which access mechanism a symbolic address uses,
//! whether it may carry an offset, and how many instructions it costs to
//! materialize.

use crate::ir::{Expr, Mode, SymbolRef};
use crate::target::TargetConfig;

/// The access mechanism for a symbolic address. Exactly one type applies to
/// a given reference in a given context; the type decides whether the
/// address may be split into a HIGH/LO_SUM pair and which relocations front
/// each half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolType {
    /// The symbol's value is used directly.
    Absolute,
    /// The symbol is loaded from the GOT as a displacement from the global
    /// pointer.
    GotDisp,
    /// GOT displacement for data, split form.
    GotoffDisp,
    /// GOT displacement for call targets.
    GotoffCall,
    /// The GP-relative offset of the current function, used to set up the
    /// global pointer on entry.
    GotoffLoadgp,
    /// The high 32 bits of a 64-bit symbol value.
    High32,
    /// TLS global-dynamic descriptor argument.
    TlsGd,
    /// TLS local-dynamic module anchor.
    TlsLdm,
    /// Offset from the local-dynamic module anchor.
    Dtprel,
    /// GOT entry holding a thread-pointer offset (initial-exec).
    Gottprel,
    /// Direct thread-pointer offset (local-exec).
    Tprel,
    /// A bare thread-local symbol; never a legitimate constant by itself.
    Tls,
    /// The symbol may only be accessed through the literal pool.
    ForceToMem,
}

/// Number of symbol types; sizes the relocation tables.
pub const NUM_SYMBOL_TYPES: usize = 13;

impl SymbolType {
    /// Index into the relocation tables.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            SymbolType::Absolute => 0,
            SymbolType::GotDisp => 1,
            SymbolType::GotoffDisp => 2,
            SymbolType::GotoffCall => 3,
            SymbolType::GotoffLoadgp => 4,
            SymbolType::High32 => 5,
            SymbolType::TlsGd => 6,
            SymbolType::TlsLdm => 7,
            SymbolType::Dtprel => 8,
            SymbolType::Gottprel => 9,
            SymbolType::Tprel => 10,
            SymbolType::Tls => 11,
            SymbolType::ForceToMem => 12,
        }
    }
}

/// True if `x` is a thread-local symbol reference.
#[must_use]
pub fn tls_symbol_p(x: &Expr) -> bool {
    matches!(x, Expr::Symbol(sym) if sym.tls_model.is_some())
}

/// The method that should be used to access symbol or label `x`.
#[must_use]
pub fn classify_symbol(target: &TargetConfig, x: &Expr) -> SymbolType {
    if tls_symbol_p(x) {
        return SymbolType::Tls;
    }

    if let Expr::Symbol(sym) = x
        && sym.force_to_mem
    {
        return SymbolType::ForceToMem;
    }

    // Don't use GOT accesses for non-PIC code.
    if target.use_got() && target.options().pic {
        return SymbolType::GotDisp;
    }

    SymbolType::Absolute
}

/// Classify the base of symbolic expression `x`, honoring a relocation
/// wrapper if one is present.
#[must_use]
pub fn classify_symbolic_expression(target: &TargetConfig, x: &Expr) -> SymbolType {
    let (base, _offset) = x.split_const();
    if let Expr::Wrapped { ty, .. } = base {
        return *ty;
    }
    classify_symbol(target, base)
}

/// Return true if `offset` lies within the alignment of symbol `x`; there
/// is no carry between the HI and LO relocations, so larger offsets could
/// change the high part.
fn offset_within_alignment(x: &Expr, offset: i64) -> bool {
    let align = match x {
        Expr::Symbol(sym) => sym.align,
        _ => 1,
    };
    offset >= 0 && (offset as u64) < align
}

/// Return true if `offset` keeps `base + offset` inside the object block
/// containing `base`. Symbols without size information admit no offset.
fn offset_within_block(x: &Expr, offset: i64) -> bool {
    match x {
        Expr::Symbol(SymbolRef {
            block_size: Some(size),
            ..
        }) => offset >= 0 && (offset as u64) < *size,
        _ => false,
    }
}

/// If `x` is a symbolic constant usable as a move or address operand,
/// return its symbol type; otherwise `None`. A nonzero offset is only
/// accepted when the underlying relocations can absorb it.
#[must_use]
pub fn symbolic_constant_p(target: &TargetConfig, x: &Expr) -> Option<SymbolType> {
    let (base, offset) = x.split_const();

    let (ty, bare) = match base {
        Expr::Wrapped { ty, base: inner } => (*ty, &**inner),
        Expr::Symbol(_) | Expr::Label(_) => {
            let ty = classify_symbol(target, base);
            if ty == SymbolType::Tls {
                return None;
            }
            (ty, base)
        }
        _ => return None,
    };

    if offset == 0 {
        return Some(ty);
    }

    match ty {
        SymbolType::Absolute | SymbolType::ForceToMem | SymbolType::High32 => {
            // With 64-bit pointers and 32-bit symbol values, X + OFFSET
            // could sign-extend differently from X unless it stays inside
            // the same object block.
            if target.is_64bit() {
                offset_within_block(bare, offset).then_some(ty)
            } else {
                Some(ty)
            }
        }

        SymbolType::Tprel | SymbolType::Dtprel => {
            offset_within_alignment(bare, offset).then_some(ty)
        }

        SymbolType::GotDisp
        | SymbolType::GotoffDisp
        | SymbolType::GotoffCall
        | SymbolType::GotoffLoadgp
        | SymbolType::TlsGd
        | SymbolType::TlsLdm
        | SymbolType::Gottprel
        | SymbolType::Tls => None,
    }
}

/// Number of instructions needed to materialize a symbol of type `ty`.
/// `mode` is `None` when the symbol appears as a move operand and `Some`
/// when it appears inside a memory reference of that mode. Zero means the
/// symbol cannot be used in that context.
#[must_use]
pub fn symbol_insns(target: &TargetConfig, ty: SymbolType, mode: Option<Mode>) -> u32 {
    match ty {
        SymbolType::Absolute => 2,

        SymbolType::ForceToMem => {
            // As a move operand this is a single LEA whose constant lands
            // in the pool; it cannot appear inside an address.
            if mode.is_none() { 1 } else { 0 }
        }

        SymbolType::GotDisp => {
            // The GOT entry has to be loaded before the value can appear
            // in an address.
            if mode.is_some() {
                0
            } else if target.split_p(ty) {
                2
            } else {
                1
            }
        }

        SymbolType::GotoffDisp
        | SymbolType::GotoffCall
        | SymbolType::GotoffLoadgp
        | SymbolType::High32
        | SymbolType::TlsGd
        | SymbolType::TlsLdm
        | SymbolType::Dtprel
        | SymbolType::Gottprel
        | SymbolType::Tprel => {
            // One relocated instruction, or a high/low pair when split.
            if target.split_p(ty) { 2 } else { 1 }
        }

        // A bare TLS symbol is never a constant.
        SymbolType::Tls => 0,
    }
}
