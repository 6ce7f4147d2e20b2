//! Calling-convention scenarios: register/stack partitioning, alignment
//! skips, aggregate special cases, and return placement.

use riscv_lower::codegen::callconv::{
    ArgLocation, CumulativeArgs, arg_partial_bytes, function_arg, function_arg_advance,
    function_value, get_arg_info, return_in_memory,
};
use riscv_lower::ir::ty::Field;
use riscv_lower::ir::{Mode, Reg, Ty};
use riscv_lower::{TargetConfig, TargetOptions};

fn rv64() -> TargetConfig {
    TargetConfig::new(TargetOptions::default())
}

fn soft_float() -> TargetConfig {
    TargetConfig::new(TargetOptions {
        hard_float: false,
        ..TargetOptions::default()
    })
}

#[test]
fn eight_words_fill_the_register_bank() {
    let t = rv64();
    let mut cum = CumulativeArgs::new();
    for i in 0..8u32 {
        let loc = function_arg(&t, &cum, Mode::DI, None, true);
        assert_eq!(
            loc,
            Some(ArgLocation::Reg {
                reg: Reg(riscv_lower::abi::GP_ARG_FIRST.0 + i),
                mode: Mode::DI
            })
        );
        function_arg_advance(&t, &mut cum, Mode::DI, None, true);
    }
    // The ninth argument has no register left.
    assert_eq!(function_arg(&t, &cum, Mode::DI, None, true), None);
    assert_eq!(cum.num_gprs, 8);
}

#[test]
fn alignment_skip_forces_full_spill() {
    let t = rv64();
    let mut cum = CumulativeArgs::new();
    for _ in 0..7 {
        function_arg_advance(&t, &mut cum, Mode::DI, None, true);
    }

    // With seven registers consumed, a doubleword-aligned two-word
    // argument skips the last register and spills entirely.
    let info = get_arg_info(&t, &cum, Mode::TI, None, true);
    assert_eq!(info.reg_words, 0);
    assert_eq!(info.stack_words, 2);
    assert_eq!(function_arg(&t, &cum, Mode::TI, None, true), None);
    assert_eq!(arg_partial_bytes(&t, &cum, Mode::TI, None, true), 0);

    // Without the alignment requirement the same state splits one/one.
    let split = get_arg_info(&t, &cum, Mode::DI, Some(&Ty::Int { bytes: 16 }), true);
    assert_eq!(split.reg_words, 1);
    assert_eq!(split.stack_words, 1);
    assert_eq!(
        arg_partial_bytes(&t, &cum, Mode::DI, Some(&Ty::Int { bytes: 16 }), true),
        8
    );
}

#[test]
fn stack_offsets_accumulate_with_alignment() {
    let t = rv64();
    let mut cum = CumulativeArgs::new();
    for _ in 0..8 {
        function_arg_advance(&t, &mut cum, Mode::DI, None, true);
    }

    // One stack word, then a doubleword-aligned argument: the odd stack
    // slot is skipped.
    function_arg_advance(&t, &mut cum, Mode::DI, None, true);
    assert_eq!(cum.stack_words, 1);
    let info = get_arg_info(&t, &cum, Mode::TI, None, true);
    assert_eq!(info.stack_offset, 2);
    function_arg_advance(&t, &mut cum, Mode::TI, None, true);
    assert_eq!(cum.stack_words, 4);
}

#[test]
fn soft_float_passes_floats_in_gprs() {
    let t = soft_float();
    let cum = CumulativeArgs::new();
    let loc = function_arg(&t, &cum, Mode::DF, Some(&Ty::Float(Mode::DF)), true);
    assert_eq!(
        loc,
        Some(ArgLocation::Reg {
            reg: riscv_lower::abi::GP_ARG_FIRST,
            mode: Mode::DF
        })
    );
}

#[test]
fn mixed_record_splits_between_banks() {
    let t = rv64();
    let cum = CumulativeArgs::new();
    let rec = Ty::Record {
        size: 24,
        fields: vec![
            Field {
                offset: 0,
                ty: Ty::Int { bytes: 8 },
            },
            Field {
                offset: 8,
                ty: Ty::Float(Mode::DF),
            },
            Field {
                offset: 16,
                ty: Ty::Int { bytes: 8 },
            },
        ],
    };
    let Some(ArgLocation::Pieces { pieces, .. }) =
        function_arg(&t, &cum, Mode::BLK, Some(&rec), true)
    else {
        panic!("expected pieces");
    };
    assert_eq!(pieces.len(), 3);
    // Only the aligned all-double chunk rides in the float bank.
    assert!(pieces[0].reg.is_gpr());
    assert!(pieces[1].reg.is_fpr());
    assert_eq!(pieces[1].offset, 8);
    assert!(pieces[2].reg.is_gpr());
}

#[test]
fn unnamed_record_with_double_stays_general() {
    let t = rv64();
    let cum = CumulativeArgs::new();
    let rec = Ty::Record {
        size: 8,
        fields: vec![Field {
            offset: 0,
            ty: Ty::Float(Mode::DF),
        }],
    };
    let loc = function_arg(&t, &cum, Mode::BLK, Some(&rec), false);
    assert_eq!(
        loc,
        Some(ArgLocation::Reg {
            reg: riscv_lower::abi::GP_ARG_FIRST,
            mode: Mode::BLK
        })
    );
}

#[test]
fn scalar_and_complex_returns() {
    let t = rv64();
    assert_eq!(
        function_value(&t, None, Mode::DF),
        ArgLocation::Reg {
            reg: riscv_lower::abi::FP_RETURN,
            mode: Mode::DF
        }
    );

    let ArgLocation::Pieces { pieces, .. } = function_value(&t, None, Mode::CDF) else {
        panic!("expected a pair");
    };
    assert_eq!(pieces[0].offset, 0);
    assert_eq!(pieces[1].offset, 8);
    assert_eq!(pieces[1].reg, Reg(riscv_lower::abi::FP_RETURN.0 + 1));
}

#[test]
fn soft_float_returns_through_gprs() {
    let t = soft_float();
    assert_eq!(
        function_value(&t, None, Mode::DF),
        ArgLocation::Reg {
            reg: riscv_lower::abi::GP_RETURN,
            mode: Mode::DF
        }
    );
}

#[test]
fn two_word_boundary_for_memory_returns() {
    let t = rv64();
    assert!(!return_in_memory(&t, &Ty::Int { bytes: 16 }));
    assert!(return_in_memory(
        &t,
        &Ty::Record {
            size: 24,
            fields: vec![]
        }
    ));
    assert!(!return_in_memory(&t, &Ty::Complex(Mode::CDF)));
}
