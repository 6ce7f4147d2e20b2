//! Stack-frame layout and prologue/epilogue expansion.
//!
//! Frames look like:
//!
//! ```text
//!     +-------------------------------+
//!     |  incoming stack arguments     |
//!     +-------------------------------+ <-- incoming stack pointer
//!     |  callee-allocated save area   |
//!     |  for arguments that are       |
//!     |  split between registers and  |
//!     |  the stack                    |
//!     +-------------------------------+ <-- arg pointer
//!     |  callee-allocated save area   |
//!     |  for register varargs         |
//!     +-------------------------------+ <-- sp + fp_sp_offset + 8
//!     |  FPR save area                |
//!     +-------------------------------+ <-- sp + gp_sp_offset + word
//!     |  GPR save area                |
//!     +-------------------------------+
//!     |  local variables              |
//!     +-------------------------------+
//!     |  outgoing stack arguments     |
//!     +-------------------------------+ <-- stack pointer
//! ```
//!
//! Dynamic allocations insert between the locals and the outgoing
//! arguments; they move the stack pointer but not the frame pointer.

use super::address::legitimate_address_p;
use super::constant::move_integer;
use super::legitimize::add_offset;
use super::symbol::SymbolType;
use crate::abi::{
    ALLOCA_MIN_ARGS_SIZE, EH_RETURN_DATA_REGS, EH_RETURN_STACKADJ, EPILOGUE_TEMP, FP_REG_FIRST,
    GLOBAL_POINTER, GLOBAL_POINTER_NONLEAF, HARD_FRAME_POINTER, MAX_FIRST_STACK_STEP,
    PIC_FUNCTION_ADDR, PROLOGUE_TEMP, RETURN_ADDR, STACK_POINTER, UNITS_PER_FPREG, call_saved,
    small_operand, stack_align,
};
use crate::insn::{FunctionContext, Insn};
use crate::ir::{BinaryOp, Expr, Mode, Reg, SymbolRef};

/// A function's frame geometry, computed by [`compute_frame_info`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInfo {
    /// Total frame size in bytes.
    pub total_size: i64,
    /// Bytes allocated to local variables.
    pub var_size: i64,
    /// Bytes allocated to outgoing arguments.
    pub args_size: i64,
    /// Bit `r` set if GPR `r` is saved.
    pub mask: u32,
    /// Bit `r` set if FPR `r` is saved.
    pub fmask: u32,
    pub num_gp: u32,
    pub num_fp: u32,
    /// Offset of the topmost GPR save slot from the frame top; zero when
    /// no GPRs are saved.
    pub gp_save_offset: i64,
    /// Likewise for FPRs.
    pub fp_save_offset: i64,
    /// Offset of the topmost GPR save slot from the stack pointer.
    pub gp_sp_offset: i64,
    /// Likewise for FPRs.
    pub fp_sp_offset: i64,
    /// Offset of the incoming argument pointer from the stack pointer.
    pub arg_pointer_offset: i64,
}

/// How the prologue initializes the global pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadgpStyle {
    None,
    /// Static GOT address via `__gnu_local_gp`.
    Absolute,
    /// GP-relative offset applied to the incoming function address.
    NewAbi,
}

/// True if the function needs a hard frame pointer.
#[must_use]
pub fn frame_pointer_needed(ctx: &FunctionContext<'_>) -> bool {
    ctx.facts.calls_alloca
}

/// True if the instruction stream so far contains anything that uses the
/// global pointer: explicit references, or GOT-relative relocations that
/// will be expanded against it.
#[must_use]
pub fn has_flexible_gp_ref(ctx: &FunctionContext<'_>) -> bool {
    let mut found = false;
    for insn in ctx.stream.insns() {
        insn.walk_exprs(&mut |e| match e {
            Expr::Reg(r) if *r == GLOBAL_POINTER => found = true,
            Expr::Wrapped { ty, .. }
                if matches!(
                    ty,
                    SymbolType::GotDisp
                        | SymbolType::GotoffDisp
                        | SymbolType::GotoffCall
                        | SymbolType::GotoffLoadgp
                        | SymbolType::Gottprel
                        | SymbolType::TlsGd
                        | SymbolType::TlsLdm
                ) =>
            {
                found = true;
            }
            _ => {}
        });
    }
    found
}

/// The register to use as the function's global pointer, or `None` if the
/// function does not need one. The decision stays provisional: uses that
/// appear later (long-branch tables) can still upgrade a ghost save.
fn global_pointer(ctx: &FunctionContext<'_>) -> Option<Reg> {
    // The global pointer register is always usable when there is no GOT.
    if !ctx.target.use_got() {
        return Some(GLOBAL_POINTER);
    }

    // With no references so far, the only uses that can appear later are
    // long-branch sequences; defer the decision.
    if !has_flexible_gp_ref(ctx) {
        return None;
    }

    // Non-leaf functions keep the GOT base in a saved register so it
    // survives the calls they make.
    if !ctx.facts.is_leaf {
        return Some(GLOBAL_POINTER_NONLEAF);
    }

    Some(GLOBAL_POINTER)
}

/// True if the current function must save register `reg`.
fn save_reg_p(ctx: &FunctionContext<'_>, reg: Reg) -> bool {
    let might_clobber = ctx.facts.saves_all_registers
        || ctx.facts.ever_live(reg)
        || ctx.global_pointer == Some(reg)
        || (reg == HARD_FRAME_POINTER && frame_pointer_needed(ctx));

    (call_saved(reg) && might_clobber)
        || (reg == RETURN_ADDR && ctx.facts.calls_eh_return)
}

/// Populate the function's frame record. Recomputing with an unchanged
/// body yields an identical record.
pub fn compute_frame_info(ctx: &mut FunctionContext<'_>) {
    let word = ctx.target.units_per_word() as i64;
    let mut frame = FrameInfo::default();

    ctx.global_pointer = global_pointer(ctx);

    // Leaf functions drop the outgoing-argument area, except that a
    // dynamically-allocating function with an empty argument area confuses
    // older linkers into seeing a second frame pointer.
    if ctx.facts.is_leaf {
        frame.args_size = if ctx.facts.calls_alloca {
            ALLOCA_MIN_ARGS_SIZE
        } else {
            0
        };
    } else {
        frame.args_size = ctx.facts.outgoing_args_size;
    }
    let mut offset = frame.args_size;

    // Local variables stack above the argument area.
    frame.var_size = stack_align(ctx.facts.local_vars_size);
    offset += frame.var_size;

    // Find out which GPRs we need to save.
    for regno in 0..32u32 {
        if save_reg_p(ctx, Reg(regno)) {
            frame.num_gp += 1;
            frame.mask |= 1 << regno;
        }
    }

    // eh_return also needs the EH data registers restored on unwind.
    if ctx.facts.calls_eh_return {
        for reg in EH_RETURN_DATA_REGS {
            frame.num_gp += 1;
            frame.mask |= 1 << reg.0;
        }
    }

    if frame.num_gp > 0 {
        offset += stack_align(i64::from(frame.num_gp) * word);
        frame.gp_sp_offset = offset - word;
    }

    // The FPR scan must walk the same space as the save/restore loop.
    if ctx.target.options().hard_float {
        for regno in FP_REG_FIRST..64 {
            if save_reg_p(ctx, Reg(regno)) {
                frame.num_fp += 1;
                frame.fmask |= 1 << (regno - FP_REG_FIRST);
            }
        }
    }

    if frame.num_fp > 0 {
        offset += stack_align(i64::from(frame.num_fp) * UNITS_PER_FPREG as i64);
        frame.fp_sp_offset = offset - UNITS_PER_FPREG as i64;
    }

    // The register-varargs save area.
    offset += stack_align(ctx.varargs_size);
    frame.arg_pointer_offset = offset;

    // Pretend arguments land on top.
    offset += ctx.facts.pretend_args_size;
    frame.total_size = offset;

    // Save-area offsets as seen from the top of the frame, for the
    // assembler-level frame description.
    if frame.gp_sp_offset > 0 {
        frame.gp_save_offset = frame.gp_sp_offset - offset;
    }
    if frame.fp_sp_offset > 0 {
        frame.fp_save_offset = frame.fp_sp_offset - offset;
    }

    tracing::debug!(
        total = frame.total_size,
        vars = frame.var_size,
        args = frame.args_size,
        gp = frame.num_gp,
        fp = frame.num_fp,
        "frame computed"
    );

    ctx.frame = frame;
    ctx.frame_computed = true;
}

/// The GP initialization sequence the prologue will use.
#[must_use]
pub fn current_loadgp_style(ctx: &FunctionContext<'_>) -> LoadgpStyle {
    if !ctx.target.use_got() || ctx.global_pointer.is_none() {
        return LoadgpStyle::None;
    }

    if ctx.target.options().abicalls && !ctx.target.options().pic {
        return LoadgpStyle::Absolute;
    }

    LoadgpStyle::NewAbi
}

/// Registers can be eliminated only toward the stack or hard frame
/// pointer.
#[must_use]
pub fn can_eliminate(to: Reg) -> bool {
    to == HARD_FRAME_POINTER || to == STACK_POINTER
}

/// Offset applied when eliminating `from` to the end-of-prologue stack
/// pointer.
///
/// # Panics
/// Panics for registers that are not eliminable.
pub fn initial_elimination_offset(ctx: &mut FunctionContext<'_>, from: Reg) -> i64 {
    compute_frame_info(ctx);

    if from == crate::abi::FRAME_POINTER {
        ctx.frame.args_size + ctx.frame.var_size
    } else if from == crate::abi::ARG_POINTER {
        ctx.frame.arg_pointer_offset
    } else {
        panic!("internal error: register {from} is not eliminable");
    }
}

/// The return address of the current frame, or zero for any frame further
/// up (walking back is not supported).
#[must_use]
pub fn return_addr(count: u32) -> Expr {
    if count != 0 {
        Expr::Const(0)
    } else {
        Expr::Reg(RETURN_ADDR)
    }
}

/// Byte offset from the stack pointer of the save slot of GPR `reg`.
/// Saves run from high to low register number, downward from
/// `gp_sp_offset`.
fn gpr_slot_offset(frame: &FrameInfo, word: i64, reg: Reg) -> i64 {
    let higher_saved = (reg.0 + 1..32)
        .filter(|r| frame.mask & (1 << r) != 0)
        .count();
    frame.gp_sp_offset - word * higher_saved as i64
}

/// Store `address` into the return-address save slot. `scratch` is free
/// for address arithmetic.
///
/// # Panics
/// Panics when the return address was never allocated a save slot.
pub fn set_return_address(ctx: &mut FunctionContext<'_>, address: Reg, scratch: Reg) {
    assert!(
        ctx.frame.mask & (1 << RETURN_ADDR.0) != 0,
        "internal error: no return-address save slot"
    );
    let offset = gpr_slot_offset(&ctx.frame, ctx.target.units_per_word() as i64, RETURN_ADDR);
    let slot = add_offset(ctx, Some(scratch), Expr::Reg(STACK_POINTER), offset);
    let mode = ctx.target.word_mode();
    ctx.emit_move(Expr::mem(mode, slot), Expr::Reg(address));
}

/// Emit one save or restore between `reg` and its slot at `offset` from
/// the current stack pointer.
fn save_restore_reg(
    ctx: &mut FunctionContext<'_>,
    mode: Mode,
    reg: Reg,
    offset: i64,
    restore: bool,
) {
    let addr = Expr::Reg(STACK_POINTER).plus_constant(ctx.target.pointer_mode(), offset);
    let mem = Expr::mem(mode, addr);

    let (dest, src, temp) = if restore {
        (Expr::Reg(reg), mem, EPILOGUE_TEMP)
    } else {
        (mem, Expr::Reg(reg), PROLOGUE_TEMP)
    };

    // A save or restore of an uncommitted global pointer stays a ghost:
    // zero length, deletable, but still upgradeable if late passes start
    // using the GP after all.
    if Some(reg) == ctx.global_pointer && !ctx.must_initialize_gp {
        ctx.emit(Insn::GhostGpMove { dest, src });
        return;
    }

    let direct = match (&dest, &src) {
        (Expr::Mem { mode, addr }, _) | (_, Expr::Mem { mode, addr }) => {
            legitimate_address_p(ctx.target, addr, *mode, true)
        }
        _ => true,
    };

    let frame_related = !restore;
    if direct {
        ctx.emit(Insn::Set {
            dest,
            src,
            frame_related,
            equal: None,
        });
    } else {
        // The slot is out of range; stage through the scratch register.
        ctx.emit_move(Expr::Reg(temp), src);
        ctx.emit(Insn::Set {
            dest,
            src: Expr::Reg(temp),
            frame_related,
            equal: None,
        });
    }
}

/// Visit every saved register, high to low; saves and restores both walk
/// the same order so their slot assignments agree. Saving high-to-low
/// keeps the return address nearest the frame top, where debuggers look
/// for it. `sp_offset` is the distance from the current stack pointer to
/// the frame bottom.
fn for_each_saved_gpr_and_fpr(ctx: &mut FunctionContext<'_>, sp_offset: i64, restore: bool) {
    let frame = ctx.frame;
    let word = ctx.target.units_per_word() as i64;
    let word_mode = ctx.target.word_mode();

    let mut offset = frame.gp_sp_offset - sp_offset;
    for regno in (0..32u32).rev() {
        if frame.mask & (1 << regno) != 0 {
            save_restore_reg(ctx, word_mode, Reg(regno), offset, restore);
            offset -= word;
        }
    }

    // This loop must walk the same space as the scan in
    // compute_frame_info.
    let mut offset = frame.fp_sp_offset - sp_offset;
    for regno in (FP_REG_FIRST..64u32).rev() {
        if frame.fmask & (1 << (regno - FP_REG_FIRST)) != 0 {
            save_restore_reg(ctx, Mode::DF, Reg(regno), offset, restore);
            offset -= UNITS_PER_FPREG as i64;
        }
    }
}

/// Emit the global-pointer initialization for the current load style.
fn emit_loadgp(ctx: &mut FunctionContext<'_>) {
    let pmode = ctx.target.pointer_mode();
    let pic = ctx.pic_reg();

    match current_loadgp_style(ctx) {
        LoadgpStyle::None => {}

        LoadgpStyle::Absolute => {
            let gp_value = Expr::Symbol(SymbolRef::local("__gnu_local_gp"));
            let wrapped = Expr::wrapped(SymbolType::Absolute, gp_value);
            ctx.emit_move(Expr::Reg(pic), Expr::high(wrapped.clone()));
            ctx.emit_move(
                Expr::Reg(pic),
                Expr::lo_sum(Expr::Reg(pic), wrapped),
            );
        }

        LoadgpStyle::NewAbi => {
            // gp = incoming function address + its negated GP-relative
            // offset, computed as a HIGH/add/LO_SUM triple.
            let fn_addr = Expr::Symbol(ctx.fn_symbol.clone());
            let offset = Expr::wrapped(SymbolType::GotoffLoadgp, fn_addr);
            ctx.emit_move(Expr::Reg(pic), Expr::high(offset.clone()));
            ctx.emit_move(
                Expr::Reg(pic),
                Expr::plus(pmode, Expr::Reg(pic), Expr::Reg(PIC_FUNCTION_ADDR)),
            );
            ctx.emit_move(Expr::Reg(pic), Expr::lo_sum(Expr::Reg(pic), offset));
        }
    }
}

/// Expand the prologue.
///
/// The frame is allocated in at most two steps: the first is bounded by
/// the largest single-instruction adjustment so every save slot stays
/// addressable with a small immediate.
pub fn expand_prologue(ctx: &mut FunctionContext<'_>) {
    // Prologues are expanded after reload; constants chain through the
    // dedicated scratch register, never through fresh pseudos.
    ctx.can_create_pseudo = false;

    if ctx.global_pointer.is_some() && has_flexible_gp_ref(ctx) {
        // Something already uses the GP; commit now. Otherwise the ghost
        // moves keep the decision open.
        ctx.must_initialize_gp = true;
    }

    let frame = ctx.frame;
    let pmode = ctx.target.pointer_mode();
    let mut size = frame.total_size;

    if frame.mask != 0 || frame.fmask != 0 {
        let step1 = size.min(MAX_FIRST_STACK_STEP);
        ctx.emit(Insn::Set {
            dest: Expr::Reg(STACK_POINTER),
            src: Expr::Reg(STACK_POINTER).plus_constant(pmode, -step1),
            frame_related: true,
            equal: None,
        });
        size -= step1;
        for_each_saved_gpr_and_fpr(ctx, size, false);
    }

    // Allocate whatever remains.
    if size > 0 {
        if small_operand(-size) {
            ctx.emit(Insn::Set {
                dest: Expr::Reg(STACK_POINTER),
                src: Expr::Reg(STACK_POINTER).plus_constant(pmode, -size),
                frame_related: true,
                equal: None,
            });
        } else {
            move_integer(
                ctx,
                Some(PROLOGUE_TEMP),
                PROLOGUE_TEMP,
                ctx.target.word_mode(),
                size,
            );
            // The note describes the combined effect of the pair.
            ctx.emit(Insn::Set {
                dest: Expr::Reg(STACK_POINTER),
                src: Expr::Binary {
                    op: BinaryOp::Minus,
                    mode: pmode,
                    lhs: Box::new(Expr::Reg(STACK_POINTER)),
                    rhs: Box::new(Expr::Reg(PROLOGUE_TEMP)),
                },
                frame_related: true,
                equal: Some(Expr::Reg(STACK_POINTER).plus_constant(pmode, -size)),
            });
        }
    }

    if frame_pointer_needed(ctx) {
        ctx.emit(Insn::Set {
            dest: Expr::Reg(HARD_FRAME_POINTER),
            src: Expr::Reg(STACK_POINTER),
            frame_related: true,
            equal: None,
        });
    }

    emit_loadgp(ctx);
}

/// True if the function needs no epilogue beyond a bare return.
#[must_use]
pub fn can_use_return_insn(ctx: &FunctionContext<'_>) -> bool {
    ctx.frame_computed && ctx.frame.total_size == 0
}

/// Expand the epilogue; `sibcall` suppresses the final return.
pub fn expand_epilogue(ctx: &mut FunctionContext<'_>, sibcall: bool) {
    ctx.can_create_pseudo = false;

    if !sibcall && can_use_return_insn(ctx) {
        ctx.emit(Insn::Return { via: None });
        return;
    }

    let frame = ctx.frame;
    let pmode = ctx.target.pointer_mode();

    // Deallocate in two steps, mirroring the prologue: restore as much
    // stack as possible after reloading registers, while keeping the
    // reload offsets small.
    let mut step1 = frame.total_size;
    let mut step2 = 0;
    if frame.mask != 0 || frame.fmask != 0 {
        step2 = step1.min(MAX_FIRST_STACK_STEP);
        step1 -= step2;
    }

    let base = if frame_pointer_needed(ctx) {
        HARD_FRAME_POINTER
    } else {
        STACK_POINTER
    };
    let mut target_reg = base;

    if step1 > 0 {
        let adjust = if small_operand(step1) {
            Expr::Const(step1)
        } else {
            move_integer(
                ctx,
                Some(EPILOGUE_TEMP),
                EPILOGUE_TEMP,
                ctx.target.word_mode(),
                step1,
            );
            Expr::Reg(EPILOGUE_TEMP)
        };
        target_reg = STACK_POINTER;
        ctx.emit_move(
            Expr::Reg(STACK_POINTER),
            Expr::plus(pmode, Expr::Reg(base), adjust),
        );
    }

    if target_reg != STACK_POINTER {
        ctx.emit_move(Expr::Reg(STACK_POINTER), Expr::Reg(target_reg));
    }

    for_each_saved_gpr_and_fpr(ctx, frame.total_size - step2, true);

    if step2 > 0 {
        ctx.emit_move(
            Expr::Reg(STACK_POINTER),
            Expr::Reg(STACK_POINTER).plus_constant(pmode, step2),
        );
    }

    // The eh_return stack adjustment arrives in a register.
    if ctx.facts.calls_eh_return {
        ctx.emit_move(
            Expr::Reg(STACK_POINTER),
            Expr::plus(pmode, Expr::Reg(STACK_POINTER), Expr::Reg(EH_RETURN_STACKADJ)),
        );
    }

    if !sibcall {
        ctx.emit(Insn::Return {
            via: Some(RETURN_ADDR),
        });
    }
}
