//! The calling convention: partitioning arguments between registers and
//! stack, and placing return values.

use crate::abi::{FP_ARG_FIRST, FP_RETURN, GP_ARG_FIRST, GP_RETURN, MAX_ARGS_IN_REGISTERS};
use crate::insn::{FunctionContext, Insn};
use crate::ir::ty::Field;
use crate::ir::{Expr, Mode, ModeClass, Reg, Ty};
use crate::target::TargetConfig;

/// The running state while laying out one signature's arguments. Both
/// cursors only ever advance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CumulativeArgs {
    /// Number of general argument-register words consumed so far.
    pub num_gprs: u32,
    /// Number of stack words consumed so far.
    pub stack_words: u32,
}

impl CumulativeArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// The classification of a single argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgInfo {
    /// True if the argument is passed in a floating-point register, or
    /// would have been had registers remained.
    pub fpr_p: bool,
    /// Words passed in registers, rounded up.
    pub reg_words: u32,
    /// Index of the first register used, or `MAX_ARGS_IN_REGISTERS` when
    /// the argument is passed entirely on the stack.
    pub reg_offset: u32,
    /// Words that go to the stack, rounded up.
    pub stack_words: u32,
    /// Offset in words of the first stack word within the overflow area;
    /// only meaningful when `stack_words` is nonzero.
    pub stack_offset: u32,
}

/// One piece of an argument or return value that lives in a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub reg: Reg,
    pub mode: Mode,
    /// Byte offset of this piece within the value.
    pub offset: u64,
}

/// Where a value lives. `None` from [`function_arg`] means the whole
/// argument is on the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgLocation {
    Reg { reg: Reg, mode: Mode },
    Pieces { mode: Mode, pieces: Vec<Piece> },
}

/// Minimum alignment of every argument, and the cap the stack imposes.
fn function_arg_boundary(target: &TargetConfig, mode: Mode, ty: Option<&Ty>) -> u64 {
    let alignment = ty.map_or_else(|| mode.alignment_bits(), |t| t.align_bits(target));
    alignment.clamp(target.units_per_word() * 8, 128)
}

/// Classify one argument given the cumulative state of those before it.
#[must_use]
pub fn get_arg_info(
    target: &TargetConfig,
    cum: &CumulativeArgs,
    mode: Mode,
    ty: Option<&Ty>,
    named: bool,
) -> ArgInfo {
    let word = target.units_per_word();
    let num_bytes = ty.map_or_else(|| mode.size(), |t| t.size(target));
    let mut num_words = u32::try_from(num_bytes.div_ceil(word)).unwrap_or(u32::MAX);

    // Scalar, complex and vector floating types go to the float bank, but
    // only as named arguments.
    let mut fpr_p = named
        && ty.is_none_or(Ty::is_float)
        && matches!(mode.class(), ModeClass::Float | ModeClass::ComplexFloat)
        && mode.unit_size() <= target.units_per_fpvalue();

    // A complex float needs two registers of its component size; if both
    // are not available it degrades to a two-word aggregate.
    if fpr_p
        && mode.class() == ModeClass::ComplexFloat
        && mode.unit_size() < target.units_per_fpvalue()
    {
        if cum.num_gprs >= MAX_ARGS_IN_REGISTERS - 1 {
            fpr_p = false;
        } else {
            num_words = 2;
        }
    }

    let doubleword_aligned = function_arg_boundary(target, mode, ty) > word * 8;

    let mut reg_offset = cum.num_gprs;
    if doubleword_aligned {
        reg_offset += reg_offset & 1;
    }

    let mut stack_offset = cum.stack_words;
    if doubleword_aligned {
        stack_offset += stack_offset & 1;
    }

    let max_regs = MAX_ARGS_IN_REGISTERS - reg_offset.min(MAX_ARGS_IN_REGISTERS);
    let reg_words = num_words.min(max_regs);

    ArgInfo {
        fpr_p,
        reg_words,
        reg_offset: reg_offset.min(MAX_ARGS_IN_REGISTERS),
        stack_words: num_words - reg_words,
        stack_offset,
    }
}

/// The register bank an argument's first register comes from.
fn arg_regno(target: &TargetConfig, info: &ArgInfo) -> Reg {
    if info.fpr_p && target.options().hard_float {
        Reg(FP_ARG_FIRST.0 + info.reg_offset)
    } else {
        Reg(GP_ARG_FIRST.0 + info.reg_offset)
    }
}

/// Where the next argument goes. `None` means entirely on the stack.
#[must_use]
pub fn function_arg(
    target: &TargetConfig,
    cum: &CumulativeArgs,
    mode: Mode,
    ty: Option<&Ty>,
    named: bool,
) -> Option<ArgLocation> {
    let info = get_arg_info(target, cum, mode, ty, named);

    if info.reg_offset == MAX_ARGS_IN_REGISTERS {
        return None;
    }

    let word_bits = target.units_per_word() * 8;

    // If a 64-bit-aligned chunk of a record is entirely one double, that
    // chunk travels in a floating register even though the rest of the
    // aggregate uses the general bank. Detected field by field, in
    // declaration order.
    if target.options().hard_float
        && named
        && let Some(Ty::Record { fields, .. }) = ty
    {
        let has_whole_word_float = fields.iter().any(|f| {
            f.ty.is_scalar_float_of(word_bits) && (f.offset * 8) % word_bits == 0
        });

        if has_whole_word_float {
            let float_mode = if word_bits == 64 { Mode::DF } else { Mode::SF };
            let int_mode = target.word_mode();
            let mut pieces = Vec::with_capacity(info.reg_words as usize);
            for i in 0..u64::from(info.reg_words) {
                let bitpos = i * word_bits;
                let field_here = fields.iter().find(|f| {
                    f.offset * 8 == bitpos && f.ty.is_scalar_float_of(word_bits)
                });
                let piece_mode = if field_here.is_some() {
                    float_mode
                } else {
                    int_mode
                };
                let bank_first = if field_here.is_some() {
                    FP_ARG_FIRST
                } else {
                    GP_ARG_FIRST
                };
                pieces.push(Piece {
                    reg: Reg(bank_first.0 + info.reg_offset + u32::try_from(i).unwrap_or(0)),
                    mode: piece_mode,
                    offset: bitpos / 8,
                });
            }
            return Some(ArgLocation::Pieces { mode, pieces });
        }
    }

    // Complex floats go as real/imaginary FPR pairs; if only the real
    // part fit, the imaginary part follows on the stack.
    if info.fpr_p && mode.class() == ModeClass::ComplexFloat {
        let inner = mode.inner();
        let regno = FP_ARG_FIRST.0 + info.reg_offset;
        if u64::from(info.reg_words) * target.units_per_word() == inner.size() {
            // Real part in a register, imaginary part on the stack.
            assert!(
                info.stack_words == info.reg_words,
                "internal error: lopsided complex split"
            );
            return Some(ArgLocation::Reg {
                reg: Reg(regno),
                mode: inner,
            });
        }
        assert!(
            info.stack_words == 0,
            "internal error: complex argument spilled unevenly"
        );
        return Some(ArgLocation::Pieces {
            mode,
            pieces: vec![
                Piece {
                    reg: Reg(regno),
                    mode: inner,
                    offset: 0,
                },
                Piece {
                    reg: Reg(regno + info.reg_words / 2),
                    mode: inner,
                    offset: inner.size(),
                },
            ],
        });
    }

    Some(ArgLocation::Reg {
        reg: arg_regno(target, &info),
        mode,
    })
}

/// Advance the cumulative state past one argument.
pub fn function_arg_advance(
    target: &TargetConfig,
    cum: &mut CumulativeArgs,
    mode: Mode,
    ty: Option<&Ty>,
    named: bool,
) {
    let info = get_arg_info(target, cum, mode, ty, named);

    // This also sets num_gprs to the register limit when alignment forced
    // the final register to be skipped and the whole argument to spill.
    cum.num_gprs = info.reg_offset + info.reg_words;

    if info.stack_words > 0 {
        cum.stack_words = info.stack_offset + info.stack_words;
    }
}

/// Bytes of the argument passed in registers when the rest spills, or zero
/// when no split occurs.
#[must_use]
pub fn arg_partial_bytes(
    target: &TargetConfig,
    cum: &CumulativeArgs,
    mode: Mode,
    ty: Option<&Ty>,
    named: bool,
) -> u64 {
    let info = get_arg_info(target, cum, mode, ty, named);
    if info.stack_words > 0 {
        u64::from(info.reg_words) * target.units_per_word()
    } else {
        0
    }
}

/// True if the first byte of the stack slot carries useful data, false if
/// the last byte does.
#[must_use]
pub fn pad_arg_upward(target: &TargetConfig, mode: Mode, ty: Option<&Ty>) -> bool {
    // Little-endian stacks always pass the first byte first.
    if !target.options().big_endian {
        return true;
    }

    // Integral values are padded downward: their last byte lands in the
    // slot's last byte.
    let integral = ty.map_or_else(
        || mode.class() == ModeClass::Int,
        Ty::is_integral,
    );
    !integral
}

/// Likewise for values in registers: true if the least significant byte is
/// the useful one.
#[must_use]
pub fn pad_reg_upward(target: &TargetConfig, mode: Mode, ty: Option<&Ty>) -> bool {
    // Floating values need no shifting.
    let is_float = ty.map_or_else(|| mode.class() == ModeClass::Float, Ty::is_float);
    if is_float {
        return !target.options().big_endian;
    }
    pad_arg_upward(target, mode, ty)
}

/// If `ty` is a record of one or two scalar-float fields, return those
/// fields; such records return in floating registers.
fn fpr_return_fields<'a>(ty: &'a Ty) -> Option<Vec<&'a Field>> {
    let Ty::Record { fields, .. } = ty else {
        return None;
    };
    let mut out = Vec::new();
    for field in fields {
        if !matches!(field.ty, Ty::Float(_)) {
            return None;
        }
        if out.len() == 2 {
            return None;
        }
        out.push(field);
    }
    Some(out)
}

/// True if the value should be returned left-justified in the register:
/// big-endian aggregates not returned in floating registers.
fn return_in_msb(target: &TargetConfig, ty: &Ty) -> bool {
    target.options().big_endian
        && ty.is_aggregate()
        && fpr_return_fields(ty).is_none_or(|f| f.is_empty())
}

/// True if values of `mode` come back in a floating register.
fn return_mode_in_fpr_p(target: &TargetConfig, mode: Mode) -> bool {
    matches!(
        mode.class(),
        ModeClass::Float | ModeClass::ComplexFloat
    ) && mode.unit_size() <= target.units_per_fpvalue()
}

/// Promote narrow integer values to a full word, the way every value
/// crosses a call boundary.
fn promote_mode(target: &TargetConfig, mode: Mode) -> Mode {
    if mode.class() == ModeClass::Int && mode.size() < target.units_per_word() {
        target.word_mode()
    } else {
        mode
    }
}

/// Where a function's return value lives. `ty` is `None` for libcalls,
/// which supply only a mode.
#[must_use]
pub fn function_value(target: &TargetConfig, ty: Option<&Ty>, mode: Mode) -> ArgLocation {
    let mut mode = mode;

    if let Some(ty) = ty {
        mode = promote_mode(target, ty.mode(target));

        // Records of one or two floats come back in fa0/fa1.
        if let Some(fields) = fpr_return_fields(ty) {
            match fields.len() {
                1 => {
                    let value_mode = fields[0].ty.mode(target);
                    return ArgLocation::Pieces {
                        mode,
                        pieces: vec![Piece {
                            reg: FP_RETURN,
                            mode: value_mode,
                            offset: 0,
                        }],
                    };
                }
                2 => {
                    return ArgLocation::Pieces {
                        mode,
                        pieces: vec![
                            Piece {
                                reg: FP_RETURN,
                                mode: fields[0].ty.mode(target),
                                offset: fields[0].offset,
                            },
                            Piece {
                                reg: Reg(FP_RETURN.0 + 1),
                                mode: fields[1].ty.mode(target),
                                offset: fields[1].offset,
                            },
                        ],
                    };
                }
                _ => {}
            }
        }

        // Left-justified returns round the mode up to whole words.
        if return_in_msb(target, ty) {
            let size = ty.size(target);
            let word = target.units_per_word();
            if size % word != 0 {
                let padded = size + word - size % word;
                mode = Mode::int_with_size(padded).unwrap_or(mode);
            }
        }

        if !ty.is_float() {
            return ArgLocation::Reg {
                reg: GP_RETURN,
                mode,
            };
        }
    }

    if return_mode_in_fpr_p(target, mode) {
        if mode.class() == ModeClass::ComplexFloat {
            let inner = mode.inner();
            return ArgLocation::Pieces {
                mode,
                pieces: vec![
                    Piece {
                        reg: FP_RETURN,
                        mode: inner,
                        offset: 0,
                    },
                    Piece {
                        reg: Reg(FP_RETURN.0 + 1),
                        mode: inner,
                        offset: mode.size() / 2,
                    },
                ],
            };
        }
        return ArgLocation::Reg {
            reg: FP_RETURN,
            mode,
        };
    }

    ArgLocation::Reg {
        reg: GP_RETURN,
        mode,
    }
}

/// Scalars and aggregates too large for the a0/a1 pair return in memory
/// through a hidden pointer.
#[must_use]
pub fn return_in_memory(target: &TargetConfig, ty: &Ty) -> bool {
    ty.size(target) > 2 * target.units_per_word()
}

/// Set up the varargs register-save area: every argument register past the
/// last named argument is stored below the incoming-arguments pointer, so
/// `va_arg` can walk registers and stack with one pointer.
///
/// `cum` must already account for every named argument. Returns the number
/// of registers saved.
pub fn setup_incoming_varargs(
    ctx: &mut FunctionContext<'_>,
    cum: &CumulativeArgs,
    last_named: (Mode, Option<&Ty>),
    no_rtl: bool,
) -> u32 {
    let target = ctx.target;
    let word = target.units_per_word();

    // Advance a local copy past the last named argument to find out how
    // many registers remain.
    let mut local = *cum;
    function_arg_advance(target, &mut local, last_named.0, last_named.1, true);

    let gp_saved = MAX_ARGS_IN_REGISTERS - local.num_gprs.min(MAX_ARGS_IN_REGISTERS);

    if !no_rtl && gp_saved > 0 {
        let base = Expr::Reg(crate::abi::ARG_POINTER);
        let area = -(i64::from(gp_saved) * word as i64);
        for i in 0..gp_saved {
            let slot = Expr::mem(
                target.word_mode(),
                base.clone()
                    .plus_constant(target.pointer_mode(), area + i64::from(i) * word as i64),
            );
            let reg = Reg(GP_ARG_FIRST.0 + local.num_gprs + i);
            ctx.emit(Insn::set(slot, Expr::Reg(reg)));
        }
    }

    ctx.varargs_size = i64::from(gp_saved) * word as i64;
    gp_saved
}
