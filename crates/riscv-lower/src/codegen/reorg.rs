//! The late cleanup pass: delete high-part relocation instructions whose
//! paired low-part uses were optimized away.
//!
//! Earlier passes may delete a LO_SUM use while leaving the HIGH that fed
//! it. Once instruction splitting and branch shortening are final, those
//! orphans can simply be deleted; no length-dependent decision follows.

use std::collections::HashMap;

use super::symbol::{SymbolType, symbolic_constant_p};
use crate::insn::{FunctionContext, Insn};
use crate::ir::Expr;

/// The largest LO_SUM offset seen for each distinct symbolic base, keyed
/// by structural equality of the stripped base expression.
type LoSumOffsets = HashMap<Expr, i64>;

/// Split `x` into its bare base (relocation wrappers stripped) and offset.
fn stripped_base(x: &Expr) -> (Expr, i64) {
    let (base, offset) = x.split_const();
    let base = if let Expr::Wrapped { base: inner, .. } = base {
        (**inner).clone()
    } else {
        base.clone()
    };
    (base, offset)
}

/// Record the LO_SUM addend `x` in the table.
fn record(offsets: &mut LoSumOffsets, x: &Expr) {
    let (base, offset) = stripped_base(x);
    let entry = offsets.entry(base).or_insert(offset);
    if offset > *entry {
        *entry = offset;
    }
}

/// True if `x` is covered by some recorded LO_SUM: its base was seen, and
/// with an offset at least as large.
fn covered(offsets: &LoSumOffsets, x: &Expr) -> bool {
    let (base, offset) = stripped_base(x);
    offsets.get(&base).is_some_and(|max| offset <= *max)
}

/// True if `insn` sets a register to an orphaned high part: a HIGH of an
/// absolute symbol with no matching LO_SUM anywhere in the function.
fn orphaned_high_part_p(
    ctx: &FunctionContext<'_>,
    offsets: &LoSumOffsets,
    insn: &Insn,
) -> bool {
    let Insn::Set { src: Expr::High(inner), .. } = insn else {
        return false;
    };
    if symbolic_constant_p(ctx.target, inner) != Some(SymbolType::Absolute) {
        return false;
    }
    !covered(offsets, inner)
}

/// Run the cleanup over the function's finalized instruction stream.
/// Returns the number of instructions deleted.
pub fn reorg(ctx: &mut FunctionContext<'_>) -> usize {
    // First pass: record every LO_SUM.
    let mut offsets = LoSumOffsets::new();
    for insn in ctx.stream.insns() {
        insn.walk_exprs(&mut |e| {
            if let Expr::LoSum { addend, .. } = e {
                record(&mut offsets, addend);
            }
        });
    }

    // Second pass: delete the orphans outright. Deletion is safe this
    // late; nothing after this pass depends on instruction counts.
    let before = ctx.stream.len();
    let mut orphans = Vec::new();
    for (idx, insn) in ctx.stream.insns().iter().enumerate() {
        if orphaned_high_part_p(ctx, &offsets, insn) {
            orphans.push(idx);
        }
    }
    let mut idx = 0;
    let orphan_set: std::collections::HashSet<usize> = orphans.into_iter().collect();
    ctx.stream.retain(|_| {
        let keep = !orphan_set.contains(&idx);
        idx += 1;
        keep
    });

    let deleted = before - ctx.stream.len();
    if deleted > 0 {
        tracing::debug!(deleted, "deleted orphaned high-part relocations");
    }
    deleted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insn::FunctionFacts;
    use crate::ir::{Mode, Reg, SymbolRef};
    use crate::target::{TargetConfig, TargetOptions};

    fn rv64() -> TargetConfig {
        TargetConfig::new(TargetOptions::default())
    }

    fn ctx(t: &TargetConfig) -> FunctionContext<'_> {
        FunctionContext::new(t, SymbolRef::global("f"), FunctionFacts::default())
    }

    fn sym(name: &str) -> Expr {
        Expr::Symbol(SymbolRef::global(name))
    }

    fn high_load(reg: u32, addr: Expr) -> Insn {
        Insn::set(Expr::Reg(Reg(reg)), Expr::high(addr))
    }

    fn lo_use(reg: u32, base: u32, addr: Expr) -> Insn {
        Insn::set(
            Expr::Reg(Reg(reg)),
            Expr::mem(Mode::DI, Expr::lo_sum(Expr::Reg(Reg(base)), addr)),
        )
    }

    #[test]
    fn orphaned_high_is_deleted() {
        let t = rv64();
        let mut c = ctx(&t);
        c.emit(high_load(70, sym("a")));
        c.emit(Insn::set(Expr::Reg(Reg(71)), Expr::Const(1)));
        assert_eq!(reorg(&mut c), 1);
        assert_eq!(c.stream.len(), 1);
        assert!(matches!(
            c.stream.insns()[0],
            Insn::Set { src: Expr::Const(1), .. }
        ));
    }

    #[test]
    fn paired_high_survives() {
        let t = rv64();
        let mut c = ctx(&t);
        c.emit(high_load(70, sym("a")));
        c.emit(lo_use(72, 70, sym("a")));
        assert_eq!(reorg(&mut c), 0);
        assert_eq!(c.stream.len(), 2);
    }

    #[test]
    fn offset_must_be_covered() {
        let t = rv64();
        let mut block = SymbolRef::global("arr");
        block.block_size = Some(4096);
        let base = Expr::Symbol(block);

        let mut c = ctx(&t);
        // The HIGH at offset 16 pairs with a LO_SUM at offset 16.
        c.emit(high_load(70, base.clone().plus_constant(Mode::DI, 16)));
        c.emit(lo_use(72, 70, base.clone().plus_constant(Mode::DI, 16)));
        // A HIGH at a larger offset than any recorded LO_SUM is dead.
        c.emit(high_load(71, base.clone().plus_constant(Mode::DI, 32)));
        assert_eq!(reorg(&mut c), 1);
        assert_eq!(c.stream.len(), 2);
    }

    #[test]
    fn only_absolute_highs_are_candidates() {
        let t = rv64();
        let mut c = ctx(&t);
        // A TPREL high part is handled by the TLS sequences, not here.
        c.emit(high_load(
            70,
            Expr::wrapped(
                SymbolType::Tprel,
                Expr::Symbol(SymbolRef::tls("v", crate::ir::TlsModel::LocalExec)),
            ),
        ));
        assert_eq!(reorg(&mut c), 0);
    }

    #[test]
    fn distinct_bases_do_not_cover_each_other() {
        let t = rv64();
        let mut c = ctx(&t);
        c.emit(high_load(70, sym("a")));
        c.emit(lo_use(72, 70, sym("b")));
        assert_eq!(reorg(&mut c), 1);
        // The survivor is the LO_SUM user of "b".
        assert_eq!(c.stream.len(), 1);
    }
}
