//! The per-function instruction stream and the function-compilation
//! context that owns it.
//!
//! Instructions here are still expression-shaped; the pattern matcher and
//! the assembly printer consume them later. The stream supports exactly
//! what the lowering core needs: append, delete, and byte-length queries.

use crate::codegen::frame::FrameInfo;
use crate::ir::{Expr, Mode, Reg, SymbolRef};
use crate::target::TargetConfig;

/// One instruction-to-be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insn {
    /// `dest = src`. `equal` carries a REG_EQUAL-style note: an equivalent
    /// constant expression the optimizers may use instead of the
    /// instruction sequence that computed it.
    Set {
        dest: Expr,
        src: Expr,
        frame_related: bool,
        equal: Option<Expr>,
    },
    /// A call. `equiv` marks the call as a pure library call whose result
    /// is equivalent to the given expression, keyed for CSE.
    Call {
        dest: Option<Reg>,
        target: Expr,
        uses: Vec<Reg>,
        const_call: bool,
        equiv: Option<Expr>,
    },
    /// A zero-length placeholder for a global-pointer save/restore that we
    /// have not committed to yet. Later passes either delete it or expand
    /// it into a real move.
    GhostGpMove { dest: Expr, src: Expr },
    /// Function return, through `via` when restoring a return address.
    Return { via: Option<Reg> },
}

impl Insn {
    /// A plain move.
    #[must_use]
    pub fn set(dest: Expr, src: Expr) -> Insn {
        Insn::Set {
            dest,
            src,
            frame_related: false,
            equal: None,
        }
    }

    /// Encoded length in bytes. Ghost instructions must stay zero-length:
    /// branch shortening runs before they are resolved.
    #[must_use]
    pub fn length(&self) -> u64 {
        match self {
            Insn::GhostGpMove { .. } => 0,
            Insn::Set { .. } | Insn::Return { .. } => 4,
            Insn::Call { .. } => 8,
        }
    }

    /// Visit every expression operand of the instruction.
    pub fn walk_exprs<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        match self {
            Insn::Set { dest, src, .. } | Insn::GhostGpMove { dest, src } => {
                dest.walk(f);
                src.walk(f);
            }
            Insn::Call { target, .. } => target.walk(f),
            Insn::Return { .. } => {}
        }
    }
}

/// The growing instruction stream of one function.
#[derive(Debug, Default)]
pub struct InsnStream {
    insns: Vec<Insn>,
}

impl InsnStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, insn: Insn) {
        self.insns.push(insn);
    }

    #[must_use]
    pub fn insns(&self) -> &[Insn] {
        &self.insns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.insns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }

    /// Total encoded length in bytes.
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        self.insns.iter().map(Insn::length).sum()
    }

    pub fn last_mut(&mut self) -> Option<&mut Insn> {
        self.insns.last_mut()
    }

    /// Delete every instruction for which `keep` returns false.
    pub fn retain(&mut self, keep: impl FnMut(&Insn) -> bool) {
        self.insns.retain(keep);
    }
}

/// Facts about the function body supplied by the surrounding framework:
/// the register-usage query interface and the frame-relevant flags.
#[derive(Debug, Clone, Default)]
pub struct FunctionFacts {
    /// Bit `r` is set if the body may reference hard register `r`.
    pub live_mask: u64,
    pub is_leaf: bool,
    pub calls_alloca: bool,
    pub calls_eh_return: bool,
    pub saves_all_registers: bool,
    /// Bytes of local variables, before stack alignment.
    pub local_vars_size: i64,
    /// Bytes of outgoing arguments for the calls the body makes.
    pub outgoing_args_size: i64,
    /// Bytes of pretend arguments allocated by the caller's caller.
    pub pretend_args_size: i64,
}

impl FunctionFacts {
    /// Does the function ever reference hard register `reg`?
    #[must_use]
    pub const fn ever_live(&self, reg: Reg) -> bool {
        reg.0 < 64 && self.live_mask & (1 << reg.0) != 0
    }

    pub fn mark_live(&mut self, reg: Reg) {
        assert!(reg.0 < 64, "internal error: liveness of pseudo {}", reg.0);
        self.live_mask |= 1 << reg.0;
    }
}

/// An entry interned into the function's literal pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry {
    pub mode: Mode,
    pub value: Expr,
    pub symbol: SymbolRef,
}

/// The literal pool: constants that could not be synthesized inline.
#[derive(Debug, Default)]
pub struct ConstantPool {
    entries: Vec<PoolEntry>,
}

impl ConstantPool {
    /// Intern `value` and return a memory reference to its pool slot.
    pub fn force_const_mem(&mut self, mode: Mode, value: Expr) -> Expr {
        let symbol = if let Some(entry) = self
            .entries
            .iter()
            .find(|e| e.mode == mode && e.value == value)
        {
            entry.symbol.clone()
        } else {
            let mut symbol = SymbolRef::local(&format!(".LC{}", self.entries.len()));
            symbol.align = mode.size().max(1);
            symbol.block_size = Some(mode.size().max(1));
            self.entries.push(PoolEntry {
                mode,
                value,
                symbol: symbol.clone(),
            });
            symbol
        };
        Expr::mem(mode, Expr::Symbol(symbol))
    }

    #[must_use]
    pub fn entries(&self) -> &[PoolEntry] {
        &self.entries
    }
}

/// Everything the lowering core tracks while compiling one function.
/// Owned exclusively by the compilation of that function; nothing here is
/// shared or global.
#[derive(Debug)]
pub struct FunctionContext<'a> {
    pub target: &'a TargetConfig,
    /// The symbol naming the function being compiled.
    pub fn_symbol: SymbolRef,
    pub facts: FunctionFacts,
    pub stream: InsnStream,
    pub frame: FrameInfo,
    pub frame_computed: bool,
    /// The register serving as global pointer, once decided.
    pub global_pointer: Option<Reg>,
    /// True once we have committed to initializing the global pointer in
    /// the prologue. Until then, GP save slots hold ghost moves.
    pub must_initialize_gp: bool,
    /// Bytes of the callee-allocated register-varargs save area.
    pub varargs_size: i64,
    pub pool: ConstantPool,
    /// False while reloading, when fresh pseudos may no longer be created.
    pub can_create_pseudo: bool,
    next_pseudo: u32,
}

impl<'a> FunctionContext<'a> {
    #[must_use]
    pub fn new(target: &'a TargetConfig, fn_symbol: SymbolRef, facts: FunctionFacts) -> Self {
        Self {
            target,
            fn_symbol,
            facts,
            stream: InsnStream::new(),
            frame: FrameInfo::default(),
            frame_computed: false,
            global_pointer: None,
            must_initialize_gp: false,
            varargs_size: 0,
            pool: ConstantPool::default(),
            can_create_pseudo: true,
            next_pseudo: crate::abi::FIRST_PSEUDO,
        }
    }

    /// The register currently serving as the PIC/GOT base: the decided
    /// global pointer, or the default before the decision is made.
    #[must_use]
    pub fn pic_reg(&self) -> Reg {
        self.global_pointer.unwrap_or(crate::abi::GLOBAL_POINTER)
    }

    /// Allocate a fresh pseudo register.
    pub fn new_pseudo(&mut self) -> Reg {
        assert!(
            self.can_create_pseudo,
            "internal error: pseudo requested during reload"
        );
        let reg = Reg(self.next_pseudo);
        self.next_pseudo += 1;
        reg
    }

    pub fn emit(&mut self, insn: Insn) {
        self.stream.push(insn);
    }

    /// Emit `dest = src` with no annotations.
    pub fn emit_move(&mut self, dest: Expr, src: Expr) {
        self.emit(Insn::set(dest, src));
    }

    /// Attach a REG_EQUAL-style note to the last emitted instruction.
    pub fn set_last_equal(&mut self, note: Expr) {
        if let Some(Insn::Set { equal, .. }) = self.stream.last_mut() {
            *equal = Some(note);
        }
    }

    /// Copy `value` into a register and return it. Registers pass through
    /// unchanged.
    pub fn force_reg(&mut self, value: Expr) -> Reg {
        if let Expr::Reg(reg) = value {
            return reg;
        }
        let reg = self.new_pseudo();
        self.emit_move(Expr::Reg(reg), value);
        reg
    }

    /// Copy `value` to a register. Uses a new pseudo when those are still
    /// allowed, the caller-provided `temp` otherwise.
    pub fn force_temporary(&mut self, temp: Option<Reg>, value: Expr) -> Reg {
        if self.can_create_pseudo {
            self.force_reg(value)
        } else {
            let temp = temp.unwrap_or_else(|| {
                panic!("internal error: no scratch register for reload-time copy")
            });
            self.emit_move(Expr::Reg(temp), value);
            temp
        }
    }
}
