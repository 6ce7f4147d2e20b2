//! Property-based tests.
//!
//! Uses `proptest` to generate random inputs and verify invariants:
//! - Constant-build plans reproduce their value exactly and stay bounded
//! - High/low splitting always leaves a small low part
//! - Address classification is total: success or failure, never a panic
//! - Argument words are conserved across the register/stack partition

use proptest::prelude::*;

use riscv_lower::abi::{const_high_part, const_low_part, small_operand};
use riscv_lower::codegen::address::classify_address;
use riscv_lower::codegen::callconv::{CumulativeArgs, get_arg_info};
use riscv_lower::codegen::constant::{BuildStep, MAX_INTEGER_OPS, apply_build_plan, build_integer};
use riscv_lower::ir::{Expr, Mode, Reg, SymbolRef, Ty};
use riscv_lower::{TargetConfig, TargetOptions};

fn rv64() -> TargetConfig {
    TargetConfig::new(TargetOptions::default())
}

proptest! {
    #[test]
    fn build_plans_round_trip(value in any::<i64>()) {
        let plan = build_integer(value);
        prop_assert_eq!(apply_build_plan(&plan), value);
        prop_assert!(plan.len() <= MAX_INTEGER_OPS);
        prop_assert!(matches!(plan[0], BuildStep::Load(_)));
    }

    #[test]
    fn high_low_split_is_exact(value in any::<i64>()) {
        let high = const_high_part(value);
        let low = const_low_part(value);
        prop_assert_eq!(high.wrapping_add(low), value);
        prop_assert!(small_operand(low));
        prop_assert_eq!(high & 0xfff, 0);
    }

    #[test]
    fn classification_is_total(
        regno in 0u32..80,
        offset in -5000i64..5000,
        mode_idx in 0usize..4,
        strict in any::<bool>(),
    ) {
        let t = rv64();
        let mode = [Mode::QI, Mode::SI, Mode::DI, Mode::TI][mode_idx];
        let addr = Expr::plus(Mode::DI, Expr::Reg(Reg(regno)), Expr::Const(offset));
        // Either a descriptor or a rejection; no panic, no partial state.
        let _ = classify_address(&t, &addr, mode, strict);
        let _ = classify_address(&t, &Expr::Reg(Reg(regno)), mode, strict);
        let _ = classify_address(&t, &Expr::Const(offset), mode, strict);
    }

    #[test]
    fn symbol_offset_classification_is_total(
        offset in any::<i64>(),
        block in prop::option::of(1u64..1_000_000),
    ) {
        let t = rv64();
        let mut sym = SymbolRef::global("g");
        sym.block_size = block;
        let addr = Expr::Symbol(sym).plus_constant(Mode::DI, offset);
        let _ = riscv_lower::symbolic_constant_p(&t, &addr);
    }

    #[test]
    fn argument_words_are_conserved(
        gprs in 0u32..=8,
        stack in 0u32..64,
        bytes in 1u64..128,
        named in any::<bool>(),
    ) {
        let t = rv64();
        let cum = CumulativeArgs { num_gprs: gprs, stack_words: stack };
        let ty = Ty::Record { size: bytes, fields: vec![] };
        let info = get_arg_info(&t, &cum, Mode::BLK, Some(&ty), named);
        let words = u32::try_from(bytes.div_ceil(8)).unwrap();
        prop_assert_eq!(info.reg_words + info.stack_words, words);
        // Cursors never run backwards.
        prop_assert!(info.reg_offset >= gprs.min(8));
        prop_assert!(info.stack_offset >= stack);
    }

    #[test]
    fn scalar_argument_words_are_conserved(
        gprs in 0u32..=8,
        mode_idx in 0usize..5,
        named in any::<bool>(),
    ) {
        let t = rv64();
        let mode = [Mode::SI, Mode::DI, Mode::TI, Mode::SF, Mode::DF][mode_idx];
        let cum = CumulativeArgs { num_gprs: gprs, stack_words: 0 };
        let info = get_arg_info(&t, &cum, mode, None, named);
        let words = u32::try_from(mode.size().div_ceil(8)).unwrap();
        prop_assert_eq!(info.reg_words + info.stack_words, words);
    }
}
