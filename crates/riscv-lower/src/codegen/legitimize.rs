//! Move and address legitimization: rewriting moves and addresses that no
//! single instruction can express into sequences that are legal, including
//! the TLS access sequences.

use super::address::{
    cannot_force_const_mem, legitimate_address_p, valid_base_register_p,
};
use super::constant::move_integer;
use super::symbol::{SymbolType, symbol_insns, symbolic_constant_p, tls_symbol_p};
use crate::abi::{
    GP_ARG_FIRST, GP_RETURN, THREAD_POINTER, const_high_part, const_low_part, lui_operand,
    small_operand,
};
use crate::insn::{FunctionContext, Insn};
use crate::ir::{BinaryOp, Expr, Mode, Reg, SymbolRef, TlsModel};
use crate::target::TargetConfig;

/// True if `x` is a plain register operand.
#[must_use]
pub fn register_operand(x: &Expr) -> bool {
    matches!(x, Expr::Reg(_))
}

/// True if `x` is a register or a zero that x0 can stand in for.
#[must_use]
pub fn reg_or_0_operand(x: &Expr) -> bool {
    match x {
        Expr::Reg(_) | Expr::Const(0) => true,
        Expr::FloatConst { bits, .. } => *bits == 0,
        _ => false,
    }
}

/// True if `x` is something a single move instruction can take as its
/// source: registers, legal memory, single-instruction immediates, and
/// single-instruction unsplit symbols.
#[must_use]
pub fn move_operand(target: &TargetConfig, x: &Expr, mode: Mode) -> bool {
    match x {
        Expr::Reg(_) => true,
        Expr::Const(v) => small_operand(*v) || lui_operand(*v),
        Expr::FloatConst { bits, .. } => *bits == 0,
        Expr::Mem { mode: m, addr } => *m == mode && legitimate_address_p(target, addr, *m, false),
        Expr::High(_) | Expr::LoSum { .. } => false,
        Expr::Symbol(_) | Expr::Label(_) | Expr::Wrapped { .. } | Expr::Binary { .. } => {
            match symbolic_constant_p(target, x) {
                Some(ty) => symbol_insns(target, ty, None) == 1 && !target.split_p(ty),
                None => false,
            }
        }
        _ => false,
    }
}

/// Wrap the base of `addr` with relocation type `ty`, keeping any constant
/// offset outside the wrapper.
#[must_use]
pub fn unspec_address(target: &TargetConfig, addr: &Expr, ty: SymbolType) -> Expr {
    let (base, offset) = addr.split_const();
    Expr::wrapped(ty, base.clone()).plus_constant(target.pointer_mode(), offset)
}

/// The inverse of [`unspec_address`]: recover the plain address under a
/// relocation wrapper, if there is one.
#[must_use]
pub fn strip_unspec_address(target: &TargetConfig, x: &Expr) -> Expr {
    let (base, offset) = x.split_const();
    if let Expr::Wrapped { base: inner, .. } = base {
        (**inner)
            .clone()
            .plus_constant(target.pointer_mode(), offset)
    } else {
        x.clone()
    }
}

/// If symbols of type `ty` are split, load the high part of `addr` and add
/// it to `base`, returning the register holding the sum; otherwise return
/// `base` untouched. The result is a valid first operand for a LO_SUM.
fn unspec_offset_high(
    ctx: &mut FunctionContext<'_>,
    temp: Option<Reg>,
    base: Expr,
    addr: &Expr,
    ty: SymbolType,
) -> Expr {
    let target = ctx.target;
    if target.split_p(ty) {
        let high = Expr::high(unspec_address(target, addr, ty));
        let high = ctx.force_temporary(temp, high);
        let sum = Expr::plus(target.pointer_mode(), Expr::Reg(high), base);
        Expr::Reg(ctx.force_temporary(temp, sum))
    } else {
        base
    }
}

/// Emit a GOT load for `addr` with relocation type `ty` and return the
/// loaded value: a load from the GOT slot addressed relative to the global
/// pointer.
pub fn got_load(
    ctx: &mut FunctionContext<'_>,
    temp: Option<Reg>,
    addr: &Expr,
    ty: SymbolType,
) -> Expr {
    let target = ctx.target;
    let pic = ctx.pic_reg();

    // If the temporary is the GOT base itself we must not clobber it with
    // the high part.
    let temp = match temp {
        Some(t) if t == pic => None,
        other => other,
    };

    let high = unspec_offset_high(ctx, temp, Expr::Reg(pic), addr, ty);
    let lo_sum_symbol = unspec_address(target, addr, ty);
    Expr::mem(
        target.pointer_mode(),
        Expr::lo_sum(high, lo_sum_symbol),
    )
}

/// If `addr` is a splittable symbolic constant in the given context,
/// emit its high part and return the low part: a LO_SUM usable either as a
/// move source (`mode == None`) or as an address of that mode.
///
/// GOT-displacement symbols split differently: their "high part" is a GOT
/// table load, not address high bits, so they route through [`got_load`].
pub fn split_symbol(
    ctx: &mut FunctionContext<'_>,
    temp: Option<Reg>,
    addr: &Expr,
    mode: Option<Mode>,
) -> Option<Expr> {
    let target = ctx.target;

    if matches!(addr, Expr::High(_)) && mode.is_none() {
        return None;
    }

    let ty = symbolic_constant_p(target, addr)?;
    if symbol_insns(target, ty, mode) == 0 || !target.split_p(ty) {
        return None;
    }

    Some(match ty {
        SymbolType::GotDisp => got_load(ctx, temp, addr, SymbolType::GotoffDisp),
        _ => {
            let high = ctx.force_temporary(temp, Expr::high(addr.clone()));
            Expr::lo_sum(Expr::Reg(high), addr.clone())
        }
    })
}

/// A legal address for `reg + offset`. `temp` is only needed when the
/// offset does not fit a small immediate.
pub fn add_offset(
    ctx: &mut FunctionContext<'_>,
    temp: Option<Reg>,
    reg: Expr,
    offset: i64,
) -> Expr {
    let pmode = ctx.target.pointer_mode();
    if small_operand(offset) {
        return reg.plus_constant(pmode, offset);
    }

    // Keep a small low offset and put the excess in a register. The high
    // part is rounded so the remainder stays sign-safe.
    let high = Expr::Const(const_high_part(offset));
    let low = const_low_part(offset);
    let high = ctx.force_temporary(temp, high);
    let base = ctx.force_temporary(temp, Expr::plus(pmode, Expr::Reg(high), reg));
    Expr::Reg(base).plus_constant(pmode, low)
}

/// Force `x` into a register if it is not a legal address for `mode`.
pub fn force_address(ctx: &mut FunctionContext<'_>, x: Expr, mode: Mode) -> Expr {
    if legitimate_address_p(ctx.target, &x, mode, false) {
        x
    } else {
        Expr::Reg(ctx.force_reg(x))
    }
}

/// Rewrite address `x` for an access of mode `mode` into a legal form the
/// generic machinery would not find on its own. Returns `x` unchanged when
/// nothing applies.
pub fn legitimize_address(ctx: &mut FunctionContext<'_>, x: Expr, mode: Mode) -> Expr {
    if tls_symbol_p(&x) {
        return legitimize_tls_address(ctx, &x);
    }

    // See if the address can split into a high part and a LO_SUM.
    if let Some(addr) = split_symbol(ctx, None, &x, Some(mode)) {
        return force_address(ctx, addr, mode);
    }

    // Handle BASE + OFFSET via add_offset.
    if let Expr::Binary {
        op: BinaryOp::Plus,
        lhs,
        rhs,
        ..
    } = &x
        && let Expr::Const(offset) = **rhs
        && offset != 0
    {
        let base = match &**lhs {
            Expr::Reg(r) if valid_base_register_p(*r, false) => *r,
            other => ctx.force_reg(other.clone()),
        };
        let addr = add_offset(ctx, None, Expr::Reg(base), offset);
        return force_address(ctx, addr, mode);
    }

    x
}

/// Move constant `src` into register `dest`, given that `src` satisfies
/// the general immediate-operand test but not the move-operand test.
pub fn legitimize_const_move(ctx: &mut FunctionContext<'_>, mode: Mode, dest: Expr, src: Expr) {
    let target = ctx.target;
    let dest_reg = match &dest {
        Expr::Reg(reg) => *reg,
        other => panic!("internal error: constant move into non-register {other}"),
    };

    // Split moves of big integers into smaller pieces.
    if let Expr::Const(value) = src {
        move_integer(ctx, Some(dest_reg), dest_reg, mode, value);
        return;
    }

    // Split moves of symbolic constants into high/low pairs.
    if let Some(new_src) = split_symbol(ctx, Some(dest_reg), &src, None) {
        ctx.emit(Insn::set(dest, new_src));
        return;
    }

    // Generate the appropriate access sequences for TLS symbols.
    if tls_symbol_p(&src) {
        let addr = legitimize_tls_address(ctx, &src);
        ctx.emit_move(dest, addr);
        return;
    }

    // If we have (symbol + offset) and the sum cannot or should not be
    // forced into the pool, load the symbol first and add the offset in;
    // this usually produces better code than a pool load.
    let (base, offset) = src.split_const();
    let base = base.clone();
    if offset != 0 && (cannot_force_const_mem(target, &src) || ctx.can_create_pseudo) {
        let base = ctx.force_temporary(Some(dest_reg), base);
        let addr = add_offset(ctx, None, Expr::Reg(base), offset);
        ctx.emit_move(dest, addr);
        return;
    }

    // Last resort: the literal pool. The pool address itself may need
    // splitting before it is a legal address.
    let pooled = ctx.pool.force_const_mem(mode, src);
    let Expr::Mem {
        mode: mem_mode,
        addr,
    } = pooled
    else {
        panic!("internal error: pool returned a non-memory operand");
    };
    let addr = match split_symbol(ctx, Some(dest_reg), &addr, Some(mem_mode)) {
        Some(split) => split,
        None => *addr,
    };
    ctx.emit_move(dest, Expr::Mem {
        mode: mem_mode,
        addr: Box::new(addr),
    });
}

/// If `dest = src` is not a valid move instruction, emit an equivalent
/// legal sequence and return true. Returning false means the original move
/// was fine as-is.
pub fn legitimize_move(ctx: &mut FunctionContext<'_>, mode: Mode, dest: Expr, src: Expr) -> bool {
    let target = ctx.target;

    // Both operands in memory, or a source that is not trivially usable:
    // go through a register.
    if !register_operand(&dest) && !reg_or_0_operand(&src) {
        let reg = ctx.force_reg(src);
        ctx.emit_move(dest, Expr::Reg(reg));
        return true;
    }

    // Constants that are legitimate immediate operands but not legitimate
    // move operands need to be synthesized.
    if src.is_constant() && !move_operand(target, &src, mode) {
        legitimize_const_move(ctx, mode, dest, src.clone());
        ctx.set_last_equal(src);
        return true;
    }

    false
}

/// Emit a call to `__tls_get_addr` with the descriptor for `sym` (built
/// with relocation type `ty`) in the first argument register. The call is
/// marked constant and keyed on `equiv`, so equal accesses can be shared.
fn call_tls_get_addr(
    ctx: &mut FunctionContext<'_>,
    sym: &Expr,
    ty: SymbolType,
    v0: Reg,
    equiv: Expr,
) {
    let target = ctx.target;
    let a0 = GP_ARG_FIRST;

    let temp = if ctx.can_create_pseudo {
        Some(ctx.new_pseudo())
    } else {
        None
    };
    let pic = Expr::Reg(ctx.pic_reg());
    let loc = unspec_offset_high(ctx, temp, pic, sym, ty);
    let loc = Expr::lo_sum(loc, unspec_address(target, sym, ty));

    ctx.emit_move(Expr::Reg(a0), loc);
    ctx.emit(Insn::Call {
        dest: Some(v0),
        target: Expr::Symbol(SymbolRef::global("__tls_get_addr")),
        uses: vec![a0],
        const_call: true,
        equiv: Some(equiv),
    });
}

/// Generate code to compute the address of thread-local symbol `loc` and
/// return it; the result is both a valid address and a valid move source.
///
/// # Panics
/// Panics if `loc` is not a thread-local symbol.
pub fn legitimize_tls_address(ctx: &mut FunctionContext<'_>, loc: &Expr) -> Expr {
    let target = ctx.target;
    let Expr::Symbol(sym) = loc else {
        panic!("internal error: TLS expansion of non-symbol {loc}");
    };
    let Some(declared) = sym.tls_model else {
        panic!("internal error: TLS expansion of non-TLS symbol {}", sym.name);
    };

    // Only GOT-using code can span multiple link modules; everything else
    // is static and reduces to local exec.
    let model = if target.options().abicalls {
        declared
    } else {
        TlsModel::LocalExec
    };
    let pmode = target.pointer_mode();

    match model {
        TlsModel::GlobalDynamic => {
            let v0 = GP_RETURN;
            call_tls_get_addr(ctx, loc, SymbolType::TlsGd, v0, loc.clone());
            let dest = ctx.new_pseudo();
            ctx.emit(Insn::Set {
                dest: Expr::Reg(dest),
                src: Expr::Reg(v0),
                frame_related: false,
                equal: Some(loc.clone()),
            });
            Expr::Reg(dest)
        }

        TlsModel::LocalDynamic => {
            let v0 = GP_RETURN;
            // All local-dynamic accesses share one module anchor; the
            // equivalence is keyed on the anchor, not the symbol, so the
            // call can be shared between them.
            let eqv = Expr::wrapped(SymbolType::TlsLdm, Expr::Const(0));
            call_tls_get_addr(ctx, loc, SymbolType::TlsLdm, v0, eqv.clone());
            let tmp1 = ctx.new_pseudo();
            ctx.emit(Insn::Set {
                dest: Expr::Reg(tmp1),
                src: Expr::Reg(v0),
                frame_related: false,
                equal: Some(eqv),
            });

            let tmp2 = unspec_offset_high(ctx, None, Expr::Reg(tmp1), loc, SymbolType::Dtprel);
            Expr::lo_sum(tmp2, unspec_address(target, loc, SymbolType::Dtprel))
        }

        TlsModel::InitialExec => {
            let tmp1 = ctx.new_pseudo();
            let tmp2 = got_load(ctx, Some(tmp1), loc, SymbolType::Gottprel);
            ctx.emit_move(Expr::Reg(tmp1), tmp2);
            let dest = ctx.new_pseudo();
            ctx.emit_move(
                Expr::Reg(dest),
                Expr::plus(pmode, Expr::Reg(tmp1), Expr::Reg(THREAD_POINTER)),
            );
            Expr::Reg(dest)
        }

        TlsModel::LocalExec => {
            let tmp1 = unspec_offset_high(
                ctx,
                None,
                Expr::Reg(THREAD_POINTER),
                loc,
                SymbolType::Tprel,
            );
            Expr::lo_sum(tmp1, unspec_address(target, loc, SymbolType::Tprel))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insn::FunctionFacts;
    use crate::target::TargetOptions;

    fn target(options: TargetOptions) -> TargetConfig {
        TargetConfig::new(options)
    }

    fn ctx(t: &TargetConfig) -> FunctionContext<'_> {
        FunctionContext::new(t, SymbolRef::global("f"), FunctionFacts::default())
    }

    #[test]
    fn legal_moves_are_left_alone() {
        let t = target(TargetOptions::default());
        let mut c = ctx(&t);
        assert!(!legitimize_move(
            &mut c,
            Mode::DI,
            Expr::Reg(Reg(10)),
            Expr::Const(42)
        ));
        assert!(c.stream.is_empty());
    }

    #[test]
    fn memory_to_memory_goes_through_a_register() {
        let t = target(TargetOptions::default());
        let mut c = ctx(&t);
        let src = Expr::mem(Mode::DI, Expr::Reg(Reg(10)));
        let dest = Expr::mem(Mode::DI, Expr::Reg(Reg(11)));
        assert!(legitimize_move(&mut c, Mode::DI, dest, src));
        assert_eq!(c.stream.len(), 2);
    }

    #[test]
    fn large_constant_becomes_build_sequence() {
        let t = target(TargetOptions::default());
        let mut c = ctx(&t);
        assert!(legitimize_move(
            &mut c,
            Mode::DI,
            Expr::Reg(Reg(10)),
            Expr::Const(0x12345678)
        ));
        // LUI part forced into a register, then the ADD emitted with a
        // REG_EQUAL note for the whole constant.
        assert_eq!(c.stream.len(), 2);
        let Insn::Set { equal, .. } = &c.stream.insns()[1] else {
            panic!("expected a set");
        };
        assert_eq!(equal.as_ref(), Some(&Expr::Const(0x12345678)));
    }

    #[test]
    fn absolute_symbol_splits_into_high_low() {
        let t = target(TargetOptions::default());
        let mut c = ctx(&t);
        let sym = Expr::Symbol(SymbolRef::global("x"));
        assert!(legitimize_move(&mut c, Mode::DI, Expr::Reg(Reg(10)), sym));
        // One insn loads the HIGH, the second sets dest = LO_SUM.
        assert_eq!(c.stream.len(), 2);
        let Insn::Set { src, .. } = &c.stream.insns()[0] else {
            panic!("expected a set");
        };
        assert!(matches!(src, Expr::High(_)));
        let Insn::Set { src, .. } = &c.stream.insns()[1] else {
            panic!("expected a set");
        };
        assert!(matches!(src, Expr::LoSum { .. }));
    }

    #[test]
    fn got_symbol_is_a_plain_move_without_xgot() {
        // A single %got_disp load is matched directly by the move
        // patterns; no rewrite is needed.
        let t = target(TargetOptions {
            abicalls: true,
            pic: true,
            ..TargetOptions::default()
        });
        let mut c = ctx(&t);
        let sym = Expr::Symbol(SymbolRef::global("x"));
        assert!(!legitimize_move(&mut c, Mode::DI, Expr::Reg(Reg(10)), sym));
        assert!(c.stream.is_empty());
    }

    #[test]
    fn xgot_symbol_loads_through_the_got() {
        let t = target(TargetOptions {
            abicalls: true,
            pic: true,
            xgot: true,
            ..TargetOptions::default()
        });
        let mut c = ctx(&t);
        let sym = Expr::Symbol(SymbolRef::global("x"));
        assert!(legitimize_move(&mut c, Mode::DI, Expr::Reg(Reg(10)), sym));
        let Insn::Set { src, .. } = c.stream.insns().last().unwrap() else {
            panic!("expected a set");
        };
        // The move source is a load from the GOT slot.
        assert!(matches!(src, Expr::Mem { .. }));
    }

    #[test]
    fn local_exec_downgrade_without_abicalls() {
        let t = target(TargetOptions::default());
        let mut c = ctx(&t);
        let sym = Expr::Symbol(SymbolRef::tls("v", TlsModel::GlobalDynamic));
        let addr = legitimize_tls_address(&mut c, &sym);
        // No call was emitted; the address is a thread-pointer LO_SUM.
        assert!(matches!(addr, Expr::LoSum { .. }));
        assert!(
            !c.stream
                .insns()
                .iter()
                .any(|i| matches!(i, Insn::Call { .. }))
        );
    }

    #[test]
    fn global_dynamic_emits_const_call() {
        let t = target(TargetOptions {
            abicalls: true,
            pic: true,
            ..TargetOptions::default()
        });
        let mut c = ctx(&t);
        let sym = Expr::Symbol(SymbolRef::tls("v", TlsModel::GlobalDynamic));
        let addr = legitimize_tls_address(&mut c, &sym);
        assert!(matches!(addr, Expr::Reg(_)));
        let call = c
            .stream
            .insns()
            .iter()
            .find_map(|i| match i {
                Insn::Call {
                    const_call, equiv, ..
                } => Some((*const_call, equiv.clone())),
                _ => None,
            })
            .expect("a call to __tls_get_addr");
        assert!(call.0);
        assert_eq!(call.1, Some(sym));
    }

    #[test]
    fn local_dynamic_keys_on_module_anchor() {
        let t = target(TargetOptions {
            abicalls: true,
            pic: true,
            ..TargetOptions::default()
        });
        let mut c = ctx(&t);
        let sym = Expr::Symbol(SymbolRef::tls("v", TlsModel::LocalDynamic));
        let addr = legitimize_tls_address(&mut c, &sym);
        // The final address applies the DTPREL pair to the anchor value.
        assert!(matches!(addr, Expr::LoSum { .. }));
        let anchor = Expr::wrapped(SymbolType::TlsLdm, Expr::Const(0));
        assert!(c.stream.insns().iter().any(|i| matches!(
            i,
            Insn::Call { equiv: Some(e), .. } if *e == anchor
        )));
    }

    #[test]
    fn add_offset_splits_large_offsets() {
        let t = target(TargetOptions::default());
        let mut c = ctx(&t);
        let small = add_offset(&mut c, None, Expr::Reg(Reg(10)), 64);
        assert!(matches!(small, Expr::Binary { .. }));
        assert!(c.stream.is_empty());

        let large = add_offset(&mut c, None, Expr::Reg(Reg(10)), 0x12345);
        // High part materialized and added; remainder stays small.
        assert!(!c.stream.is_empty());
        let (_, low) = large.split_const();
        assert!(small_operand(low));
    }

    #[test]
    fn in_block_offset_is_absorbed_by_the_split() {
        let t = target(TargetOptions::default());
        let mut c = ctx(&t);
        let mut sym = SymbolRef::global("arr");
        sym.block_size = Some(1 << 20);
        let src = Expr::Symbol(sym).plus_constant(Mode::DI, 0x10000);
        assert!(legitimize_move(&mut c, Mode::DI, Expr::Reg(Reg(10)), src));
        // The offset rides inside the HIGH/LO_SUM relocations.
        let Insn::Set { src, .. } = c.stream.insns().last().unwrap() else {
            panic!("expected a set");
        };
        assert!(matches!(src, Expr::LoSum { .. }));
    }

    #[test]
    fn rejected_offset_is_added_after_loading() {
        // GOT symbols tolerate no offset, so the symbol is materialized
        // first and the offset added separately.
        let t = target(TargetOptions {
            abicalls: true,
            pic: true,
            ..TargetOptions::default()
        });
        let mut c = ctx(&t);
        let src = Expr::Symbol(SymbolRef::global("g")).plus_constant(Mode::DI, 24);
        assert!(legitimize_move(&mut c, Mode::DI, Expr::Reg(Reg(10)), src));
        assert!(c.pool.entries().is_empty());
        let Insn::Set { src, .. } = c.stream.insns().last().unwrap() else {
            panic!("expected a set");
        };
        assert!(matches!(
            src,
            Expr::Binary {
                op: BinaryOp::Plus,
                ..
            }
        ));
    }

    #[test]
    fn unsplittable_constant_lands_in_the_pool() {
        let t = target(TargetOptions::default());
        let mut c = ctx(&t);
        let fp = Expr::FloatConst {
            bits: 0x3ff0_0000_0000_0000,
            mode: Mode::DF,
        };
        assert!(legitimize_move(&mut c, Mode::DF, Expr::Reg(Reg(42)), fp));
        assert_eq!(c.pool.entries().len(), 1);
    }
}
