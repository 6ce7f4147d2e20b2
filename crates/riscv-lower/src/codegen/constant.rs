//! Integer constant synthesis: the shortest instruction sequence that
//! materializes an arbitrary word-sized constant in a register.

use crate::abi::{const_high_part, const_low_part, lui_operand, small_operand};
use crate::insn::{FunctionContext, Insn};
use crate::ir::{BinaryOp, Expr, Mode, Reg};

/// The largest number of operations needed to load an integer constant.
/// The worst case alternates add and shift steps across the word, so the
/// word width bounds the recursion; anything longer is a logic error.
pub const MAX_INTEGER_OPS: usize = 32;

/// One stage in a constant-building sequence. These sequences have the form
///
/// ```text
///     A = VALUE[0]
///     A = A OP[1] VALUE[1]
///     ...
/// ```
///
/// where `A` is an accumulator. The first step is always a plain load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    /// Load the value directly (small immediate or LUI pattern).
    Load(i64),
    /// Shift the accumulator left.
    Shl(u32),
    /// Add to the accumulator.
    Add(i64),
}

/// Compute the operations needed to load `value`, fewest first. Every word
/// value has at least one plan, so this never fails.
///
/// # Panics
/// Panics if the plan exceeds [`MAX_INTEGER_OPS`], which indicates a logic
/// error rather than a reachable input.
#[must_use]
pub fn build_integer(value: i64) -> Vec<BuildStep> {
    let codes = build_integer_1(value);
    assert!(
        codes.len() <= MAX_INTEGER_OPS,
        "internal error: {}-step plan for {value:#x}",
        codes.len()
    );
    codes
}

fn build_integer_1(value: i64) -> Vec<BuildStep> {
    let high_part = const_high_part(value);
    let low_part = const_low_part(value);

    if small_operand(value) || lui_operand(value) {
        // The value can be loaded with a single instruction.
        return vec![BuildStep::Load(value)];
    }

    if lui_operand(high_part) {
        // The value can be loaded with a LUI/ADDI combination.
        return vec![BuildStep::Load(high_part), BuildStep::Add(low_part)];
    }

    let mut best: Option<Vec<BuildStep>> = None;

    if value & 1 == 0 {
        // Try eliminating all trailing zeros by ending with a shift.
        let lshift = value.trailing_zeros();
        let mut codes = build_integer_1(value >> lshift);
        codes.push(BuildStep::Shl(lshift));
        best = Some(codes);
    }

    if low_part != 0 {
        let mut add_codes = build_integer_1(high_part);
        add_codes.push(BuildStep::Add(low_part));

        // Strictly shorter only: on a tie the shift plan computed above
        // wins, which keeps the emitted sequences stable.
        if best.as_ref().is_none_or(|b| add_codes.len() < b.len()) {
            best = Some(add_codes);
        }
    }

    best.unwrap_or_else(|| panic!("internal error: no build plan for {value:#x}"))
}

/// Replay a build plan, returning the value it reconstructs. The cost
/// oracle relies on plans round-tripping exactly.
#[must_use]
pub fn apply_build_plan(codes: &[BuildStep]) -> i64 {
    let mut acc = 0i64;
    for step in codes {
        acc = match *step {
            BuildStep::Load(v) => v,
            BuildStep::Shl(n) => acc << n,
            BuildStep::Add(v) => acc.wrapping_add(v),
        };
    }
    acc
}

/// Load `value` into `dest` by emitting the build plan as instructions.
/// `temp` is the scratch register to chain through when new pseudos may
/// not be created.
pub fn move_integer(
    ctx: &mut FunctionContext<'_>,
    temp: Option<Reg>,
    dest: Reg,
    mode: Mode,
    value: i64,
) {
    let codes = build_integer(value);

    if mode == Mode::HI && codes.len() == 2 {
        // A half-word constant loaded with a LUI/ADDI pair. The add must
        // produce a half-word result directly rather than the word-sized
        // value the generic sequence would: the intermediate LUI value
        // only exists in word mode.
        let BuildStep::Load(first) = codes[0] else {
            panic!("internal error: plan does not start with a load");
        };
        let BuildStep::Add(low) = codes[1] else {
            panic!("internal error: narrow two-step plan without an add");
        };
        assert!(
            first.wrapping_add(low) == value,
            "internal error: narrow plan for {value:#x} recombines to {:#x}",
            first.wrapping_add(low)
        );
        let x = ctx.force_temporary(temp, Expr::Const(first));
        ctx.emit(Insn::set(
            Expr::Reg(dest),
            Expr::Binary {
                op: BinaryOp::Plus,
                mode: Mode::HI,
                lhs: Box::new(Expr::Reg(x)),
                rhs: Box::new(Expr::Const(low)),
            },
        ));
        return;
    }

    // Apply each operation to the accumulator expression, forcing the
    // intermediate into a register before every step.
    let BuildStep::Load(first) = codes[0] else {
        panic!("internal error: plan does not start with a load");
    };
    let mut x = Expr::Const(first);
    for step in &codes[1..] {
        let reg = ctx.force_temporary(temp, x);
        let (op, operand) = match *step {
            BuildStep::Shl(n) => (BinaryOp::Ashift, i64::from(n)),
            BuildStep::Add(v) => (BinaryOp::Plus, v),
            BuildStep::Load(_) => panic!("internal error: load after the first step"),
        };
        x = Expr::Binary {
            op,
            mode,
            lhs: Box::new(Expr::Reg(reg)),
            rhs: Box::new(Expr::Const(operand)),
        };
    }
    ctx.emit(Insn::set(Expr::Reg(dest), x));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_are_single_loads() {
        assert_eq!(build_integer(5), vec![BuildStep::Load(5)]);
        assert_eq!(build_integer(-2048), vec![BuildStep::Load(-2048)]);
        assert_eq!(build_integer(0), vec![BuildStep::Load(0)]);
    }

    #[test]
    fn lui_addi_pairs() {
        assert_eq!(
            build_integer(0x12345678),
            vec![BuildStep::Load(0x12345000), BuildStep::Add(0x678)]
        );
        // A zero low part collapses to the LUI alone.
        assert_eq!(build_integer(0x12345000), vec![BuildStep::Load(0x12345000)]);
    }

    #[test]
    fn top_bit_uses_shift_strategy() {
        // Trailing zeros are stripped with an arithmetic shift, so the
        // single top bit synthesizes from -1, not 1.
        assert_eq!(
            build_integer(i64::MIN),
            vec![BuildStep::Load(-1), BuildStep::Shl(63)]
        );
    }

    #[test]
    fn plans_round_trip() {
        for value in [
            0i64,
            -1,
            5,
            0x12345678,
            0x12345000,
            i64::MIN,
            i64::MAX,
            0x7fff_ffff_f800,
            -0x1234_5678_9abc_def0,
        ] {
            let codes = build_integer(value);
            assert_eq!(apply_build_plan(&codes), value, "value {value:#x}");
            assert!(codes.len() <= MAX_INTEGER_OPS);
        }
    }
}
