//! The cost oracle: relative execution/size costs of candidate
//! expressions, consumed by instruction selection and CSE heuristics.

use super::address::{address_insns, const_insns};
use super::symbol::{SymbolType, symbolic_constant_p};
use crate::abi::small_operand;
use crate::ir::{BinaryOp, Expr, Mode, UnaryOp};
use crate::target::{TargetConfig, costs_n_insns};

/// The cost of loading a value from the constant pool. Kept above the
/// cost of anything we are willing to synthesize inline.
pub const CONSTANT_POOL_COST: u32 = costs_n_insns(8);

/// The context an expression is being costed in: the surrounding
/// operation, as far as immediate legality depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OuterCode {
    Set,
    Compare,
    Bin(BinaryOp),
    Cmp(crate::ir::CompareOp),
    Sqrt,
}

/// The oracle's verdict for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostVerdict {
    /// Final cost, operands included.
    Total(u32),
    /// Cost of this node alone; the caller adds operand costs.
    Base(u32),
    /// Not handled here; the generic fallback applies.
    Unhandled,
}

/// True if some instruction implementing `outer` accepts `x` as an
/// immediate operand.
#[must_use]
pub fn immediate_operand_p(outer: OuterCode, x: i64) -> bool {
    use crate::ir::CompareOp::{Ge, Geu, Le, Leu, Lt, Ltu};
    match outer {
        // Shift counts are truncated to a valid constant.
        OuterCode::Bin(BinaryOp::Ashift | BinaryOp::Ashiftrt | BinaryOp::Lshiftrt) => true,

        // 12-bit signed immediate fields.
        OuterCode::Bin(BinaryOp::And | BinaryOp::Ior | BinaryOp::Xor | BinaryOp::Plus)
        | OuterCode::Cmp(Lt | Ltu) => small_operand(x),

        // LE becomes SLT against x + 1.
        OuterCode::Cmp(Le) => small_operand(x.wrapping_add(1)),

        // Likewise SLTU, but the always-true case has no encoding.
        OuterCode::Cmp(Leu) => small_operand(x.wrapping_add(1)) && x.wrapping_add(1) != 0,

        // GE/GEU of 1 becomes GT/GTU against x0.
        OuterCode::Cmp(Ge | Geu) => x == 1,

        // x0 provides zero everywhere else.
        _ => x == 0,
    }
}

/// True if `x` is a symbolic constant that must live in the pool.
fn force_to_mem_operand(target: &TargetConfig, x: &Expr) -> bool {
    symbolic_constant_p(target, x) == Some(SymbolType::ForceToMem)
}

fn fp_mult_cost(target: &TargetConfig, mode: Mode) -> u32 {
    if mode == Mode::DF {
        target.cost_data().fp_mult_df
    } else {
        target.cost_data().fp_mult_sf
    }
}

fn fp_div_cost(target: &TargetConfig, mode: Mode) -> u32 {
    if mode == Mode::DF {
        target.cost_data().fp_div_df
    } else {
        target.cost_data().fp_div_sf
    }
}

/// Cost of sign-extending `arg` to `to`, excluding the cost of `arg`.
fn sign_extend_cost(target: &TargetConfig, to: Mode, from: Mode, arg: &Expr) -> u32 {
    if matches!(arg, Expr::Mem { .. }) {
        // Extending loads cost the same as unextended ones.
        return 0;
    }
    if target.is_64bit() && to == Mode::DI && from == Mode::SI {
        // Word arithmetic keeps results sign-extended already.
        return 0;
    }
    // Shift left, then shift right.
    costs_n_insns(2)
}

/// Cost of zero-extending `arg` to `to`, excluding the cost of `arg`.
fn zero_extend_cost(target: &TargetConfig, to: Mode, from: Mode, arg: &Expr) -> u32 {
    if matches!(arg, Expr::Mem { .. }) {
        return 0;
    }
    if (target.is_64bit() && to == Mode::DI && from == Mode::SI)
        || ((to == Mode::DI || to == Mode::SI) && from == Mode::HI)
    {
        // A shift pair; there is no single-instruction form.
        return costs_n_insns(2);
    }
    // ANDI does it.
    costs_n_insns(1)
}

/// The context the operands of `x` are costed in during generic fallback.
fn outer_of(x: &Expr) -> OuterCode {
    match x {
        Expr::Binary { op, .. } => OuterCode::Bin(*op),
        Expr::Compare { op, .. } => OuterCode::Cmp(*op),
        Expr::Unary {
            op: UnaryOp::Sqrt, ..
        } => OuterCode::Sqrt,
        _ => OuterCode::Set,
    }
}

fn children<'a>(x: &'a Expr) -> Vec<&'a Expr> {
    match x {
        Expr::Binary { lhs, rhs, .. } | Expr::Compare { lhs, rhs, .. } => vec![&**lhs, &**rhs],
        Expr::LoSum { base, addend } => vec![&**base, &**addend],
        Expr::Unary { arg, .. } | Expr::Extend { arg, .. } | Expr::High(arg) => vec![&**arg],
        Expr::Mem { addr, .. } => vec![&**addr],
        _ => Vec::new(),
    }
}

fn mode_of(x: &Expr) -> Option<Mode> {
    match x {
        Expr::Binary { mode, .. } | Expr::Unary { mode, .. } | Expr::Mem { mode, .. } => {
            Some(*mode)
        }
        Expr::FloatConst { mode, .. } => Some(*mode),
        Expr::Extend { to, .. } => Some(*to),
        _ => None,
    }
}

/// Full recursive cost of `x` in context `outer`.
#[must_use]
pub fn expr_cost(target: &TargetConfig, x: &Expr, outer: OuterCode, speed: bool) -> u32 {
    if matches!(x, Expr::Reg(_)) {
        return 0;
    }
    match rtx_costs(target, x, outer, speed) {
        CostVerdict::Total(c) => c,
        CostVerdict::Base(c) => c + children_cost(target, x, speed),
        CostVerdict::Unhandled => {
            let factor = mode_of(x)
                .map_or(1, |m| m.size().div_ceil(target.units_per_word()).max(1));
            costs_n_insns(u32::try_from(factor).unwrap_or(1)) + children_cost(target, x, speed)
        }
    }
}

fn children_cost(target: &TargetConfig, x: &Expr, speed: bool) -> u32 {
    let outer = outer_of(x);
    children(x)
        .into_iter()
        .map(|c| expr_cost(target, c, outer, speed))
        .sum()
}

/// Cost of binary operation `x` with word cost `single` and double-word
/// cost `double`, operands included. The second operand is costed in the
/// context of the operation itself, so operator-specific immediates come
/// out free.
fn binary_cost(target: &TargetConfig, x: &Expr, single: u32, double: u32, speed: bool) -> u32 {
    let (mode, lhs, rhs, rhs_outer) = match x {
        Expr::Binary { op, mode, lhs, rhs } => (*mode, &**lhs, &**rhs, OuterCode::Bin(*op)),
        Expr::Compare { op, mode, lhs, rhs } => (*mode, &**lhs, &**rhs, OuterCode::Cmp(*op)),
        other => panic!("internal error: binary cost of {other}"),
    };
    let base = if mode.size() == target.units_per_word() * 2 {
        double
    } else {
        single
    };
    base + expr_cost(target, lhs, OuterCode::Set, speed)
        + expr_cost(target, rhs, rhs_outer, speed)
}

fn is_float_one(x: &Expr) -> bool {
    matches!(
        x,
        Expr::FloatConst {
            bits: 0x3f80_0000,
            mode: Mode::SF
        } | Expr::FloatConst {
            bits: 0x3ff0_0000_0000_0000,
            mode: Mode::DF
        }
    )
}

/// The oracle proper. Returns the verdict for `x` in context `outer`;
/// [`CostVerdict::Unhandled`] defers to the caller's generic model.
///
/// # Panics
/// Panics if a non-constant is costed in a COMPARE context; comparisons
/// only reach the oracle while testing whether a constant operand is
/// expensive enough to force into a register.
#[must_use]
pub fn rtx_costs(target: &TargetConfig, x: &Expr, outer: OuterCode, speed: bool) -> CostVerdict {
    use CostVerdict::{Base, Total, Unhandled};

    // COMPAREs have no representation of their own; their cost lives in
    // the branch. Constants compared against must never look expensive
    // enough to hoist.
    if outer == OuterCode::Compare {
        assert!(
            x.is_constant(),
            "internal error: non-constant {x} costed in a COMPARE context"
        );
        return Total(0);
    }

    match x {
        Expr::Const(value) => {
            // The second operand of a clear-upper-32 AND is free: the
            // operation is really a zero extension, and CSE-ing the mask
            // would block turning the AND into a memory operation later.
            if target.is_64bit()
                && outer == OuterCode::Bin(BinaryOp::And)
                && *value as u64 == 0xffff_ffff
            {
                return Total(0);
            }

            // When optimizing for speed, constant loads can usually be
            // hoisted out of the loops that use them, so they should not
            // make the operation look expensive.
            if speed || immediate_operand_p(outer, *value) {
                return Total(0);
            }

            constant_cost(target, x, outer)
        }

        _ if x.is_constant() && !matches!(x, Expr::High(_)) => constant_cost(target, x, outer),

        Expr::Mem { mode, addr } => {
            let insns = address_insns(target, addr, *mode, true);
            if insns > 0 {
                Total(costs_n_insns(insns + 1))
            } else {
                // Illegal address; let the generic model price it.
                Unhandled
            }
        }

        Expr::Unary {
            op: UnaryOp::Ffs, ..
        } => Base(costs_n_insns(6)),

        Expr::Unary {
            op: UnaryOp::Not,
            mode,
            ..
        } => Base(costs_n_insns(
            if mode.size() > target.units_per_word() { 2 } else { 1 },
        )),

        Expr::Binary {
            op: BinaryOp::And,
            mode: Mode::DI,
            lhs,
            rhs,
        } if target.is_64bit() && matches!(**rhs, Expr::Const(v) if v as u64 == 0xffff_ffff) => {
            // Priced as the zero extension it will become.
            Total(
                zero_extend_cost(target, Mode::DI, Mode::DI, lhs)
                    + expr_cost(target, lhs, OuterCode::Set, speed),
            )
        }

        Expr::Binary {
            op: BinaryOp::And | BinaryOp::Ior | BinaryOp::Xor,
            ..
        } => Total(binary_cost(
            target,
            x,
            costs_n_insns(1),
            costs_n_insns(2),
            speed,
        )),

        Expr::Binary {
            op: BinaryOp::Ashift | BinaryOp::Ashiftrt | BinaryOp::Lshiftrt,
            rhs,
            ..
        } => {
            let double = if rhs.is_constant() {
                costs_n_insns(4)
            } else {
                costs_n_insns(12)
            };
            Total(binary_cost(target, x, costs_n_insns(1), double, speed))
        }

        Expr::Unary {
            op: UnaryOp::Abs,
            mode,
            ..
        } => {
            if mode.is_float() {
                Base(target.cost_data().fp_add)
            } else {
                Base(costs_n_insns(4))
            }
        }

        Expr::LoSum { base, .. } => Total(
            costs_n_insns(1) + expr_cost(target, base, OuterCode::Set, speed),
        ),

        Expr::Compare { mode, .. } => {
            if mode.is_float() {
                Base(target.cost_data().fp_add)
            } else {
                Total(binary_cost(
                    target,
                    x,
                    costs_n_insns(1),
                    costs_n_insns(4),
                    speed,
                ))
            }
        }

        Expr::Binary {
            op: BinaryOp::Minus,
            mode,
            lhs,
            rhs,
        } if mode.is_float() && !target.honor_nans() && !target.honor_signed_zeros() => {
            // Fused negate-multiply-subtract forms.
            if let Expr::Binary {
                op: BinaryOp::Mult,
                lhs: mul_lhs,
                rhs: mul_rhs,
                ..
            } = &**lhs
                && let Expr::Unary {
                    op: UnaryOp::Neg,
                    arg,
                    ..
                } = &**mul_lhs
            {
                return Total(
                    fp_mult_cost(target, *mode)
                        + expr_cost(target, arg, OuterCode::Set, speed)
                        + expr_cost(target, mul_rhs, OuterCode::Set, speed)
                        + expr_cost(target, rhs, OuterCode::Set, speed),
                );
            }
            if let Expr::Binary {
                op: BinaryOp::Mult,
                lhs: mul_lhs,
                rhs: mul_rhs,
                ..
            } = &**rhs
            {
                return Total(
                    fp_mult_cost(target, *mode)
                        + expr_cost(target, lhs, OuterCode::Set, speed)
                        + expr_cost(target, mul_lhs, OuterCode::Set, speed)
                        + expr_cost(target, mul_rhs, OuterCode::Set, speed),
                );
            }
            plus_minus_cost(target, x, speed)
        }

        Expr::Binary {
            op: BinaryOp::Minus | BinaryOp::Plus,
            ..
        } => plus_minus_cost(target, x, speed),

        Expr::Unary {
            op: UnaryOp::Neg,
            mode,
            arg,
        } => {
            if mode.is_float() && !target.honor_nans() && target.honor_signed_zeros() {
                // Fused negate-multiply-add forms.
                if let Expr::Binary {
                    op: BinaryOp::Plus | BinaryOp::Minus,
                    lhs,
                    rhs,
                    ..
                } = &**arg
                    && let Expr::Binary {
                        op: BinaryOp::Mult,
                        lhs: mul_lhs,
                        rhs: mul_rhs,
                        ..
                    } = &**lhs
                {
                    return Total(
                        fp_mult_cost(target, *mode)
                            + expr_cost(target, mul_lhs, OuterCode::Set, speed)
                            + expr_cost(target, mul_rhs, OuterCode::Set, speed)
                            + expr_cost(target, rhs, OuterCode::Set, speed),
                    );
                }
            }

            if mode.is_float() {
                Base(target.cost_data().fp_add)
            } else {
                Base(costs_n_insns(
                    if mode.size() > target.units_per_word() { 4 } else { 1 },
                ))
            }
        }

        Expr::Binary {
            op: BinaryOp::Mult,
            mode,
            ..
        } => {
            if mode.is_float() {
                Base(fp_mult_cost(target, *mode))
            } else if *mode == Mode::DI && !target.is_64bit() {
                // One MUL plus one MULH.
                Base(target.cost_data().int_mult_si * 2)
            } else if !speed {
                Base(1)
            } else if *mode == Mode::DI {
                Base(target.cost_data().int_mult_di)
            } else {
                Base(target.cost_data().int_mult_si)
            }
        }

        Expr::Binary {
            op: BinaryOp::Div,
            mode,
            lhs,
            rhs,
        } if mode.is_float() => {
            // Reciprocal forms under unsafe math.
            if target.options().unsafe_math && is_float_one(lhs) {
                if outer == OuterCode::Sqrt
                    || matches!(
                        &**rhs,
                        Expr::Unary {
                            op: UnaryOp::Sqrt,
                            ..
                        }
                    )
                {
                    // rsqrt patterns absorb the division.
                    return Total(expr_cost(target, rhs, OuterCode::Set, speed));
                }
                return Total(
                    fp_div_cost(target, *mode) + expr_cost(target, rhs, OuterCode::Set, speed),
                );
            }
            Base(fp_div_cost(target, *mode))
        }

        Expr::Unary {
            op: UnaryOp::Sqrt,
            mode,
            ..
        } if mode.is_float() => Base(fp_div_cost(target, *mode)),

        Expr::Binary {
            op: BinaryOp::Mod,
            mode,
            ..
        } if mode.is_float() => Base(fp_div_cost(target, *mode)),

        Expr::Binary {
            op: BinaryOp::Div | BinaryOp::Mod | BinaryOp::UDiv | BinaryOp::UMod,
            mode,
            ..
        } => {
            if !speed {
                Base(1)
            } else if *mode == Mode::DI {
                Base(target.cost_data().int_div_di)
            } else {
                Base(target.cost_data().int_div_si)
            }
        }

        Expr::Extend {
            signed: true,
            to,
            from,
            arg,
        } => Base(sign_extend_cost(target, *to, *from, arg)),

        Expr::Extend {
            signed: false,
            to,
            from,
            arg,
        } => Base(zero_extend_cost(target, *to, *from, arg)),

        Expr::Unary {
            op:
                UnaryOp::Float
                | UnaryOp::UnsignedFloat
                | UnaryOp::Fix
                | UnaryOp::FloatExtend
                | UnaryOp::FloatTruncate,
            ..
        } => Base(target.cost_data().fp_add),

        _ => Unhandled,
    }
}

/// Shared tail for all constant shapes.
fn constant_cost(target: &TargetConfig, x: &Expr, outer: OuterCode) -> CostVerdict {
    if force_to_mem_operand(target, x) {
        return CostVerdict::Total(costs_n_insns(1));
    }

    let mut cost = const_insns(target, x);
    if cost > 0 {
        let float_const = matches!(x, Expr::FloatConst { .. });
        if cost == 1
            && outer == OuterCode::Set
            && !(float_const && target.options().hard_float)
        {
            // Single-instruction constants are as cheap as register sets;
            // never CSE them. Floating zeros keep their cost so an FPR
            // copy stays preferable to repeated moves from x0.
            cost = 0;
        } else if outer == OuterCode::Set || matches!(x, Expr::Const(_)) {
            // For longer sequences it is better to share the prefix and
            // duplicate the final operation than to CSE the constant.
            cost = 1;
        }
        CostVerdict::Total(costs_n_insns(cost))
    } else {
        CostVerdict::Total(CONSTANT_POOL_COST)
    }
}

fn plus_minus_cost(target: &TargetConfig, x: &Expr, speed: bool) -> CostVerdict {
    let Expr::Binary { mode, lhs, .. } = x else {
        panic!("internal error: addition cost of {x}");
    };

    if mode.is_float() {
        // An addition folded into a fused multiply-add is free.
        if matches!(
            &**lhs,
            Expr::Binary {
                op: BinaryOp::Mult,
                ..
            }
        ) {
            return CostVerdict::Base(0);
        }
        return CostVerdict::Base(target.cost_data().fp_add);
    }

    // Double-word additions take three word ops and a SLTU.
    CostVerdict::Total(binary_cost(
        target,
        x,
        costs_n_insns(1),
        costs_n_insns(4),
        speed,
    ))
}

/// The cost contract consumed by the optimizer: relative cost plus a flag
/// saying whether this oracle handled the expression or a generic model
/// should.
#[must_use]
pub fn cost(target: &TargetConfig, x: &Expr, outer: OuterCode, speed: bool) -> (u32, bool) {
    match rtx_costs(target, x, outer, speed) {
        CostVerdict::Total(c) => (c, true),
        CostVerdict::Base(c) => (c + children_cost(target, x, speed), true),
        CostVerdict::Unhandled => (expr_cost(target, x, outer, speed), false),
    }
}

/// Address cost: the instruction count of the address calculation.
#[must_use]
pub fn address_cost(target: &TargetConfig, addr: &Expr, _speed: bool) -> u32 {
    address_insns(target, addr, Mode::SI, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::STACK_POINTER;
    use crate::ir::{CompareOp, Reg, SymbolRef};
    use crate::target::TargetOptions;

    fn rv64() -> TargetConfig {
        TargetConfig::new(TargetOptions::default())
    }

    #[test]
    fn compare_context_constants_are_free() {
        let t = rv64();
        assert_eq!(
            rtx_costs(&t, &Expr::Const(1 << 40), OuterCode::Compare, false),
            CostVerdict::Total(0)
        );
    }

    #[test]
    fn immediate_operand_edges() {
        assert!(immediate_operand_p(OuterCode::Bin(BinaryOp::Ashift), 1 << 40));
        assert!(immediate_operand_p(OuterCode::Bin(BinaryOp::Plus), 2047));
        assert!(!immediate_operand_p(OuterCode::Bin(BinaryOp::Plus), 2048));
        assert!(immediate_operand_p(OuterCode::Cmp(CompareOp::Le), 2046));
        assert!(!immediate_operand_p(OuterCode::Cmp(CompareOp::Leu), -1));
        assert!(immediate_operand_p(OuterCode::Cmp(CompareOp::Geu), 1));
        assert!(!immediate_operand_p(OuterCode::Cmp(CompareOp::Geu), 2));
        assert!(immediate_operand_p(OuterCode::Set, 0));
        assert!(!immediate_operand_p(OuterCode::Set, 1));
    }

    #[test]
    fn clear_upper32_mask_is_free() {
        let t = rv64();
        assert_eq!(
            rtx_costs(
                &t,
                &Expr::Const(0xffff_ffff),
                OuterCode::Bin(BinaryOp::And),
                false
            ),
            CostVerdict::Total(0)
        );
    }

    #[test]
    fn clear_upper32_and_prices_as_zero_extension() {
        let t = rv64();
        let and = Expr::Binary {
            op: BinaryOp::And,
            mode: Mode::DI,
            lhs: Box::new(Expr::Reg(Reg(10))),
            rhs: Box::new(Expr::Const(0xffff_ffff)),
        };
        assert_eq!(
            rtx_costs(&t, &and, OuterCode::Set, true),
            CostVerdict::Total(costs_n_insns(1))
        );
    }

    #[test]
    fn single_insn_constant_sets_are_free() {
        let t = rv64();
        assert_eq!(
            rtx_costs(&t, &Expr::Const(5), OuterCode::Set, false),
            CostVerdict::Total(0)
        );
        // Multi-instruction constants cost one instruction in a SET so the
        // tail of the sequence is duplicated rather than CSEd.
        assert_eq!(
            rtx_costs(&t, &Expr::Const(0x1234_5678_9abc), OuterCode::Set, false),
            CostVerdict::Total(costs_n_insns(1))
        );
    }

    #[test]
    fn unsynthesizable_constants_price_as_pool_loads() {
        let t = rv64();
        let fp = Expr::FloatConst {
            bits: 0x4000_0000_0000_0000,
            mode: Mode::DF,
        };
        assert_eq!(
            rtx_costs(&t, &fp, OuterCode::Set, false),
            CostVerdict::Total(CONSTANT_POOL_COST)
        );
    }

    #[test]
    fn memory_costs_address_plus_access() {
        let t = rv64();
        let mem = Expr::mem(
            Mode::DI,
            Expr::plus(Mode::DI, Expr::Reg(STACK_POINTER), Expr::Const(16)),
        );
        assert_eq!(
            rtx_costs(&t, &mem, OuterCode::Set, true),
            CostVerdict::Total(costs_n_insns(2))
        );

        // Illegal addresses defer to the generic model.
        let bad = Expr::mem(
            Mode::DI,
            Expr::plus(Mode::DI, Expr::Reg(STACK_POINTER), Expr::Const(1 << 20)),
        );
        assert_eq!(
            rtx_costs(&t, &bad, OuterCode::Set, true),
            CostVerdict::Unhandled
        );
    }

    #[test]
    fn fused_multiply_add_prices_as_multiply() {
        let t = TargetConfig::new(TargetOptions {
            finite_math_only: true,
            no_signed_zeros: true,
            ..TargetOptions::default()
        });
        let mul = Expr::Binary {
            op: BinaryOp::Mult,
            mode: Mode::DF,
            lhs: Box::new(Expr::Reg(Reg(42))),
            rhs: Box::new(Expr::Reg(Reg(43))),
        };
        let sub = Expr::Binary {
            op: BinaryOp::Minus,
            mode: Mode::DF,
            lhs: Box::new(Expr::Reg(Reg(44))),
            rhs: Box::new(mul),
        };
        assert_eq!(
            rtx_costs(&t, &sub, OuterCode::Set, true),
            CostVerdict::Total(t.cost_data().fp_mult_df)
        );
    }

    #[test]
    fn plus_absorbed_into_multiply_is_free() {
        let t = rv64();
        let madd = Expr::Binary {
            op: BinaryOp::Plus,
            mode: Mode::DF,
            lhs: Box::new(Expr::Binary {
                op: BinaryOp::Mult,
                mode: Mode::DF,
                lhs: Box::new(Expr::Reg(Reg(42))),
                rhs: Box::new(Expr::Reg(Reg(43))),
            }),
            rhs: Box::new(Expr::Reg(Reg(44))),
        };
        assert_eq!(rtx_costs(&t, &madd, OuterCode::Set, true), CostVerdict::Base(0));
    }

    #[test]
    fn division_costs_follow_the_tune_table() {
        let t = rv64();
        let div = Expr::Binary {
            op: BinaryOp::Div,
            mode: Mode::DI,
            lhs: Box::new(Expr::Reg(Reg(10))),
            rhs: Box::new(Expr::Reg(Reg(11))),
        };
        assert_eq!(
            rtx_costs(&t, &div, OuterCode::Set, true),
            CostVerdict::Base(t.cost_data().int_div_di)
        );
        // Optimizing for size, division is just another instruction.
        assert_eq!(rtx_costs(&t, &div, OuterCode::Set, false), CostVerdict::Base(1));
    }

    #[test]
    fn extension_costs() {
        let t = rv64();
        let sext = Expr::Extend {
            signed: true,
            to: Mode::DI,
            from: Mode::SI,
            arg: Box::new(Expr::Reg(Reg(10))),
        };
        assert_eq!(rtx_costs(&t, &sext, OuterCode::Set, true), CostVerdict::Base(0));

        let zext = Expr::Extend {
            signed: false,
            to: Mode::DI,
            from: Mode::SI,
            arg: Box::new(Expr::Reg(Reg(10))),
        };
        assert_eq!(
            rtx_costs(&t, &zext, OuterCode::Set, true),
            CostVerdict::Base(costs_n_insns(2))
        );

        let zext_byte = Expr::Extend {
            signed: false,
            to: Mode::SI,
            from: Mode::QI,
            arg: Box::new(Expr::Reg(Reg(10))),
        };
        assert_eq!(
            rtx_costs(&t, &zext_byte, OuterCode::Set, true),
            CostVerdict::Base(costs_n_insns(1))
        );
    }

    #[test]
    fn symbolic_constants_cost_their_insn_count() {
        let t = rv64();
        let sym = Expr::Symbol(SymbolRef::global("x"));
        // Two instructions, charged as one in a SET context.
        assert_eq!(
            rtx_costs(&t, &sym, OuterCode::Set, false),
            CostVerdict::Total(costs_n_insns(1))
        );
        assert_eq!(
            rtx_costs(&t, &sym, OuterCode::Bin(BinaryOp::Plus), false),
            CostVerdict::Total(costs_n_insns(2))
        );
    }
}
