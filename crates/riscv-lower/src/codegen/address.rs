//! Address classification and instruction-count queries.
//!
//! `classify_address` is the single gatekeeper: an address is legal exactly
//! when it classifies, and the returned descriptor is only ever built from
//! a successful classification.

use super::constant::build_integer;
use super::symbol::{SymbolType, classify_symbolic_expression, symbol_insns, symbolic_constant_p};
use crate::abi::{ARG_POINTER, FRAME_POINTER, small_operand};
use crate::ir::{BinaryOp, Expr, Mode, Reg};
use crate::target::TargetConfig;

/// A classified, known-legal address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressInfo {
    /// A bare base register.
    Reg { reg: Reg },
    /// Base register plus a small constant offset.
    RegOffset { reg: Reg, offset: i64 },
    /// Base register plus the low part of a split symbol.
    LoSum {
        reg: Reg,
        addend: Expr,
        symbol_type: SymbolType,
    },
    /// A small constant used directly as an address.
    ConstInt { value: i64 },
    /// A bare symbolic reference.
    Symbolic { symbol_type: SymbolType },
}

/// True if `regno` can serve as a base register. The eliminable pointers
/// qualify: they resolve to the stack or hard frame pointer, and reload
/// patches the cases where the eliminated form is out of range.
pub(crate) fn valid_base_register_p(reg: Reg, strict: bool) -> bool {
    if reg.is_pseudo() {
        return !strict;
    }
    if reg == ARG_POINTER || reg == FRAME_POINTER {
        return true;
    }
    reg.is_gpr()
}

/// True if every base register can address `offset` in mode `mode`.
/// Multiword accesses get split into word accesses, so the last word's
/// offset has to stay in range too.
fn valid_offset_p(target: &TargetConfig, offset: i64, mode: Mode) -> bool {
    if !small_operand(offset) {
        return false;
    }
    let size = mode.size();
    if size > target.units_per_word()
        && !small_operand(offset + size as i64 - target.units_per_word() as i64)
    {
        return false;
    }
    true
}

/// True if a LO_SUM with a symbol of type `symbol_type` can address a value
/// of mode `mode`.
fn valid_lo_sum_p(target: &TargetConfig, symbol_type: SymbolType, mode: Mode) -> bool {
    if symbol_insns(target, symbol_type, Some(mode)) == 0 {
        return false;
    }
    if target.lo_reloc(symbol_type).is_none() {
        return false;
    }
    // Multiword accesses get split into word accesses, and each word must
    // be reachable without a carry into the high part. Values aligned
    // more coarsely than their size cannot guarantee that.
    if mode.size() > target.units_per_word() && mode.bitsize() > mode.alignment_bits() {
        return false;
    }
    true
}

/// Classify `x` as an address for an access of mode `mode`. Returns the
/// descriptor on success, `None` if the address is not legal. `strict`
/// disallows not-yet-allocated pseudo base registers.
#[must_use]
pub fn classify_address(
    target: &TargetConfig,
    x: &Expr,
    mode: Mode,
    strict: bool,
) -> Option<AddressInfo> {
    match x {
        Expr::Reg(reg) => {
            valid_base_register_p(*reg, strict).then(|| AddressInfo::Reg { reg: *reg })
        }

        Expr::Binary {
            op: BinaryOp::Plus,
            lhs,
            rhs,
            ..
        } if matches!(**lhs, Expr::Reg(_)) => {
            let Expr::Reg(reg) = **lhs else {
                return None;
            };
            let Expr::Const(offset) = **rhs else {
                return None;
            };
            (valid_base_register_p(reg, strict) && valid_offset_p(target, offset, mode))
                .then_some(AddressInfo::RegOffset { reg, offset })
        }

        Expr::LoSum { base, addend } => {
            let Expr::Reg(reg) = **base else {
                return None;
            };
            // The creator of the LO_SUM is trusted to have emitted the
            // matching HIGH; we only re-derive the symbol type here.
            let symbol_type = classify_symbolic_expression(target, addend);
            (valid_base_register_p(reg, strict) && valid_lo_sum_p(target, symbol_type, mode))
                .then(|| AddressInfo::LoSum {
                    reg,
                    addend: (**addend).clone(),
                    symbol_type,
                })
        }

        // Small-integer addresses are rare but legitimate: x0 is a valid
        // base.
        Expr::Const(value) => {
            small_operand(*value).then_some(AddressInfo::ConstInt { value: *value })
        }

        Expr::Symbol(_) | Expr::Label(_) | Expr::Wrapped { .. } | Expr::Binary { .. } => {
            let symbol_type = symbolic_constant_p(target, x)?;
            (symbol_insns(target, symbol_type, Some(mode)) > 0 && !target.split_p(symbol_type))
                .then_some(AddressInfo::Symbolic { symbol_type })
        }

        _ => None,
    }
}

/// True if `x` is a legal address for mode `mode`.
#[must_use]
pub fn legitimate_address_p(target: &TargetConfig, x: &Expr, mode: Mode, strict: bool) -> bool {
    classify_address(target, x, mode, strict).is_some()
}

/// Number of instructions needed to load or store a value of mode `mode`
/// at address `x`; zero if the address is illegal. `might_split` says
/// whether a multiword access may be split into word accesses.
#[must_use]
pub fn address_insns(target: &TargetConfig, x: &Expr, mode: Mode, might_split: bool) -> u32 {
    let Some(addr) = classify_address(target, x, mode, false) else {
        return 0;
    };

    // BLK is used for single unaligned accesses and never splits.
    let mut factor = if mode != Mode::BLK && might_split {
        u32::try_from(mode.size().div_ceil(target.units_per_word())).unwrap_or(1)
    } else {
        1
    };

    if let AddressInfo::Symbolic { symbol_type } = addr {
        factor *= symbol_insns(target, symbol_type, Some(mode));
    }

    factor
}

/// Number of instructions needed to load constant `x` into a register;
/// zero if `x` is not a valid constant.
#[must_use]
pub fn const_insns(target: &TargetConfig, x: &Expr) -> u32 {
    match x {
        Expr::High(inner) => {
            // A bare high part is a single LUI, when the type splits.
            match symbolic_constant_p(target, inner) {
                Some(ty) if target.split_p(ty) => 1,
                _ => 0,
            }
        }

        Expr::Const(value) => u32::try_from(build_integer(*value).len()).unwrap_or(0),

        // Zeros can come straight from x0.
        Expr::FloatConst { bits, .. } => u32::from(*bits == 0),

        Expr::Symbol(_) | Expr::Label(_) | Expr::Wrapped { .. } | Expr::Binary { .. } => {
            if let Some(ty) = symbolic_constant_p(target, x) {
                return symbol_insns(target, ty, None);
            }

            // Try splitting into base and offset: load the base and add
            // the offset, either directly or via a second constant build.
            let (base, offset) = x.split_const();
            if offset != 0 {
                let n = const_insns(target, base);
                if n != 0 {
                    if small_operand(offset) {
                        return n + 1;
                    } else if !cannot_force_const_mem(target, x) {
                        return n + 1 + u32::try_from(build_integer(offset).len()).unwrap_or(0);
                    }
                }
            }
            0
        }

        _ => 0,
    }
}

/// Implement the target's cannot-force-into-constant-pool test.
#[must_use]
pub fn cannot_force_const_mem(target: &TargetConfig, x: &Expr) -> bool {
    // There is no assembler syntax for an address-sized high part.
    if matches!(x, Expr::High(_)) {
        return true;
    }

    // Reject constants the move expanders synthesize inline; spilling
    // them to memory would trade a register-only sequence for a load.
    if matches!(x, Expr::Const(_)) {
        return true;
    }

    let (base, offset) = x.split_const();
    if let Some(ty) = symbolic_constant_p(target, base)
        && ty != SymbolType::ForceToMem
        && small_operand(offset)
        && symbol_insns(target, ty, None) > 0
    {
        return true;
    }

    // TLS symbols must go through the TLS access sequences.
    if x.references_tls() {
        return true;
    }

    false
}

/// One word of the double-word value `op`. `high_p` selects the
/// most-significant half, honoring byte order.
#[must_use]
pub fn subword(target: &TargetConfig, op: &Expr, high_p: bool) -> Expr {
    let word = target.units_per_word();
    let byte = if target.options().big_endian == high_p {
        0
    } else {
        word
    };

    match op {
        // FPR halves are always ordered little-endian, whatever the
        // memory byte order.
        Expr::Reg(reg) if reg.is_fpr() => Expr::Reg(Reg(reg.0 + u32::from(high_p))),
        Expr::Reg(reg) => Expr::Reg(Reg(reg.0 + u32::from(byte != 0))),
        Expr::Mem { addr, .. } => Expr::mem(
            target.word_mode(),
            (**addr)
                .clone()
                .plus_constant(target.pointer_mode(), byte as i64),
        ),
        Expr::Const(value) => {
            let half = if high_p { value >> 32 } else { *value };
            Expr::Const((half as i32) as i64)
        }
        Expr::FloatConst { bits, .. } => {
            let half = if high_p { bits >> 32 } else { *bits };
            Expr::Const((half as u32) as i32 as i64)
        }
        other => panic!("internal error: no subword of {other}"),
    }
}

/// Number of instructions to load a double-word constant by loading each
/// word separately.
///
/// # Panics
/// Panics when either half is not a valid constant; the caller must have
/// checked the whole constant first.
#[must_use]
pub fn split_const_insns(target: &TargetConfig, x: &Expr) -> u32 {
    let low = const_insns(target, &subword(target, x, false));
    let high = const_insns(target, &subword(target, x, true));
    assert!(
        low > 0 && high > 0,
        "internal error: unsplittable double-word constant {x}"
    );
    low + high
}

/// True if a 64-bit move between `dest` and `src` has to be split into two
/// word moves. FPR-to-FPR and FPR-to-memory moves stay whole even on the
/// 32-bit target.
#[must_use]
pub fn split_64bit_move_p(target: &TargetConfig, dest: &Expr, src: &Expr) -> bool {
    if target.is_64bit() {
        return false;
    }
    let fpr = |e: &Expr| matches!(e, Expr::Reg(r) if r.is_fpr());
    let mem = |e: &Expr| matches!(e, Expr::Mem { .. });
    !((fpr(dest) && fpr(src)) || (fpr(dest) && mem(src)) || (mem(dest) && fpr(src)))
}

/// Number of instructions needed for a load or store whose memory operand
/// is `mem` and whose other operand is `other`.
///
/// # Panics
/// Panics if `mem` is not a memory reference.
#[must_use]
pub fn load_store_insns(target: &TargetConfig, mem: &Expr, other: &Expr) -> u32 {
    let Expr::Mem { mode, addr } = mem else {
        panic!("internal error: load_store_insns on non-memory operand {mem}");
    };

    // Try to prove the access will not be split.
    let mut might_split = true;
    if mode.bitsize() == 64 && !split_64bit_move_p(target, other, mem) {
        might_split = false;
    }

    address_insns(target, addr, *mode, might_split)
}
