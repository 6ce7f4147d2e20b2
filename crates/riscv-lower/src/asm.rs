//! Structured data for the assembly printer: operand directives,
//! relocation strings, branch conditions and frame directives.
//!
//! Formatting problems here are pattern/backend inconsistencies, not user
//! errors; they are recorded as diagnostics and printing continues with
//! best-effort output.

use std::fmt::Write as _;

use crate::codegen::frame::frame_pointer_needed;
use crate::codegen::legitimize::strip_unspec_address;
use crate::codegen::symbol::classify_symbolic_expression;
use crate::error::Error;
use crate::insn::FunctionContext;
use crate::ir::{CompareOp, Expr};
use crate::target::TargetConfig;

/// Accumulated operand-formatting diagnostics. Compilation continues past
/// them so as many as possible surface in one run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<Error>,
}

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lossage(&mut self, error: Error) {
        tracing::warn!(%error, "operand lossage");
        self.errors.push(error);
    }

    #[must_use]
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Which half of a split relocation to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocHalf {
    High,
    Low,
}

/// Render a symbolic constant for the assembler: `sym`, `sym+4`, `.L3-8`.
fn output_addr_const(out: &mut String, x: &Expr) {
    match x {
        Expr::Symbol(sym) => out.push_str(&sym.name),
        Expr::Label(n) => {
            let _ = write!(out, ".L{n}");
        }
        Expr::Const(v) => {
            let _ = write!(out, "{v}");
        }
        Expr::Binary { lhs, rhs, .. } => {
            output_addr_const(out, lhs);
            if let Expr::Const(v) = **rhs {
                if v >= 0 {
                    let _ = write!(out, "+{v}");
                } else {
                    let _ = write!(out, "{v}");
                }
            } else {
                output_addr_const(out, rhs);
            }
        }
        other => {
            let _ = write!(out, "{other}");
        }
    }
}

/// Print symbolic operand `op` as part of a HIGH or LO_SUM: the
/// relocation string for its symbol type, the bare address, and one
/// closing parenthesis per opening one in the relocation.
///
/// # Panics
/// Panics if the symbol type has no relocation for the requested half;
/// instruction patterns must never produce such operands.
#[must_use]
pub fn print_operand_reloc(target: &TargetConfig, op: &Expr, half: RelocHalf) -> String {
    let ty = classify_symbolic_expression(target, op);
    let reloc = match half {
        RelocHalf::High => target.hi_reloc(ty),
        RelocHalf::Low => target.lo_reloc(ty),
    };
    let Some(reloc) = reloc else {
        panic!("internal error: no {half:?} relocation for {ty:?}");
    };

    let mut out = String::from(reloc);
    output_addr_const(&mut out, &strip_unspec_address(target, op));
    for _ in reloc.chars().filter(|c| *c == '(') {
        out.push(')');
    }
    out
}

/// The branch-instruction condition name for `op`, or a diagnostic for
/// conditions with no integer branch form.
pub fn int_branch_condition(
    diagnostics: &mut Diagnostics,
    op: CompareOp,
    letter: char,
) -> &'static str {
    match op {
        CompareOp::Eq
        | CompareOp::Ne
        | CompareOp::Gt
        | CompareOp::Ge
        | CompareOp::Lt
        | CompareOp::Le
        | CompareOp::Gtu
        | CompareOp::Geu
        | CompareOp::Ltu
        | CompareOp::Leu => op.name(),
        CompareOp::Unordered | CompareOp::Ltgt => {
            diagnostics.lossage(Error::InvalidOperandPrefix(letter));
            ""
        }
    }
}

/// Format operand `op` under directive `letter`:
///
/// - `X`: constant in hexadecimal
/// - `x`: low 16 bits of a constant, in hexadecimal
/// - `d`: constant in decimal
/// - `m`: one less than a constant, in decimal
/// - `h`: high-part relocation of the operand (stripping an outer HIGH)
/// - `R`: low-part relocation of the operand
/// - `C`: integer branch condition
/// - `N`: inverse integer branch condition
/// - `z`: the zero register for a zero constant, the operand otherwise
/// - anything else: the operand printed plainly
pub fn print_operand(
    target: &TargetConfig,
    diagnostics: &mut Diagnostics,
    op: &Expr,
    letter: char,
) -> String {
    match letter {
        'X' => match op {
            Expr::Const(v) => format!("{v:#x}"),
            _ => {
                diagnostics.lossage(Error::InvalidOperandUse(letter));
                String::new()
            }
        },
        'x' => match op {
            Expr::Const(v) => format!("{:#x}", v & 0xffff),
            _ => {
                diagnostics.lossage(Error::InvalidOperandUse(letter));
                String::new()
            }
        },
        'd' => match op {
            Expr::Const(v) => format!("{v}"),
            _ => {
                diagnostics.lossage(Error::InvalidOperandUse(letter));
                String::new()
            }
        },
        'm' => match op {
            Expr::Const(v) => format!("{}", v.wrapping_sub(1)),
            _ => {
                diagnostics.lossage(Error::InvalidOperandUse(letter));
                String::new()
            }
        },
        'h' => {
            let inner = match op {
                Expr::High(inner) => &**inner,
                other => other,
            };
            print_operand_reloc(target, inner, RelocHalf::High)
        }
        'R' => print_operand_reloc(target, op, RelocHalf::Low),
        'C' | 'N' => match op {
            Expr::Compare { op: cmp, .. } => {
                let cmp = if letter == 'N' {
                    match cmp {
                        CompareOp::Unordered | CompareOp::Ltgt => {
                            diagnostics.lossage(Error::InvalidOperandPrefix(letter));
                            return String::new();
                        }
                        other => other.inverse(),
                    }
                } else {
                    *cmp
                };
                int_branch_condition(diagnostics, cmp, letter).to_owned()
            }
            _ => {
                diagnostics.lossage(Error::InvalidOperandPrefix(letter));
                String::new()
            }
        },
        'z' => match op {
            Expr::Const(0) => crate::abi::REG_NAMES[0].to_owned(),
            Expr::FloatConst { bits: 0, .. } => crate::abi::REG_NAMES[0].to_owned(),
            other => print_plain(other),
        },
        _ => print_plain(op),
    }
}

fn print_plain(op: &Expr) -> String {
    match op {
        Expr::Reg(reg) if reg.0 < 64 => reg.name().to_owned(),
        Expr::Const(v) => format!("{v}"),
        Expr::Symbol(sym) => sym.name.clone(),
        Expr::Label(n) => format!(".L{n}"),
        other => format!("{other}"),
    }
}

/// The frame-description directives emitted at the top of a function:
/// `.frame`, `.mask` and `.fmask`, with save-area offsets given from the
/// frame top.
#[must_use]
pub fn frame_directives(ctx: &FunctionContext<'_>) -> String {
    let frame = &ctx.frame;
    let frame_reg = if frame_pointer_needed(ctx) {
        crate::abi::HARD_FRAME_POINTER
    } else {
        crate::abi::STACK_POINTER
    };

    let mut out = String::new();
    let _ = writeln!(
        out,
        "\t.frame\t{},{},{}\t\t# vars= {}, regs= {}/{}, args= {}",
        frame_reg.name(),
        frame.total_size,
        crate::abi::RETURN_ADDR.name(),
        frame.var_size,
        frame.num_gp,
        frame.num_fp,
        frame.args_size,
    );
    let _ = writeln!(out, "\t.mask\t{:#010x},{}", frame.mask, frame.gp_save_offset);
    let _ = writeln!(
        out,
        "\t.fmask\t{:#010x},{}",
        frame.fmask, frame.fp_save_offset
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::frame::compute_frame_info;
    use crate::codegen::symbol::SymbolType;
    use crate::insn::FunctionFacts;
    use crate::ir::{Mode, Reg, SymbolRef};
    use crate::target::TargetOptions;

    fn rv64() -> TargetConfig {
        TargetConfig::new(TargetOptions::default())
    }

    #[test]
    fn reloc_printing_balances_parens() {
        let t = rv64();
        let sym = Expr::Symbol(SymbolRef::global("x"));
        assert_eq!(
            print_operand_reloc(&t, &sym, RelocHalf::High),
            "%hi(x)"
        );
        assert_eq!(print_operand_reloc(&t, &sym, RelocHalf::Low), "%lo(x)");

        let loadgp = Expr::wrapped(SymbolType::GotoffLoadgp, Expr::Symbol(SymbolRef::global("f")));
        assert_eq!(
            print_operand_reloc(&t, &loadgp, RelocHalf::High),
            "%hi(%neg(%gp_rel(f)))"
        );
    }

    #[test]
    fn reloc_printing_keeps_offsets() {
        let t = rv64();
        let mut sym = SymbolRef::global("arr");
        sym.block_size = Some(256);
        let addr = Expr::Symbol(sym).plus_constant(Mode::DI, 16);
        assert_eq!(print_operand_reloc(&t, &addr, RelocHalf::Low), "%lo(arr+16)");
    }

    #[test]
    fn const_directives() {
        let t = rv64();
        let mut diag = Diagnostics::new();
        assert_eq!(print_operand(&t, &mut diag, &Expr::Const(255), 'X'), "0xff");
        assert_eq!(
            print_operand(&t, &mut diag, &Expr::Const(0x12345), 'x'),
            "0x2345"
        );
        assert_eq!(print_operand(&t, &mut diag, &Expr::Const(17), 'd'), "17");
        assert_eq!(print_operand(&t, &mut diag, &Expr::Const(8), 'm'), "7");
        assert!(diag.is_empty());
    }

    #[test]
    fn lossage_is_recorded_not_fatal() {
        let t = rv64();
        let mut diag = Diagnostics::new();
        let out = print_operand(&t, &mut diag, &Expr::Reg(Reg(10)), 'X');
        assert_eq!(out, "");
        assert_eq!(diag.errors(), &[Error::InvalidOperandUse('X')]);

        // Processing continues afterwards.
        assert_eq!(print_operand(&t, &mut diag, &Expr::Const(1), 'd'), "1");
        assert_eq!(diag.errors().len(), 1);
    }

    #[test]
    fn branch_conditions_and_inverses() {
        let t = rv64();
        let mut diag = Diagnostics::new();
        let cmp = Expr::Compare {
            op: CompareOp::Ltu,
            mode: Mode::DI,
            lhs: Box::new(Expr::Reg(Reg(10))),
            rhs: Box::new(Expr::Reg(Reg(11))),
        };
        assert_eq!(print_operand(&t, &mut diag, &cmp, 'C'), "ltu");
        assert_eq!(print_operand(&t, &mut diag, &cmp, 'N'), "geu");
        assert!(diag.is_empty());

        let unord = Expr::Compare {
            op: CompareOp::Unordered,
            mode: Mode::DF,
            lhs: Box::new(Expr::Reg(Reg(42))),
            rhs: Box::new(Expr::Reg(Reg(43))),
        };
        let _ = print_operand(&t, &mut diag, &unord, 'N');
        assert!(!diag.is_empty());
    }

    #[test]
    fn zero_directive_uses_x0() {
        let t = rv64();
        let mut diag = Diagnostics::new();
        assert_eq!(print_operand(&t, &mut diag, &Expr::Const(0), 'z'), "zero");
        assert_eq!(print_operand(&t, &mut diag, &Expr::Reg(Reg(11)), 'z'), "a1");
    }

    #[test]
    fn frame_directive_shape() {
        let t = rv64();
        let mut facts = FunctionFacts {
            is_leaf: false,
            outgoing_args_size: 0,
            local_vars_size: 16,
            ..FunctionFacts::default()
        };
        facts.mark_live(crate::abi::RETURN_ADDR);
        let mut ctx = FunctionContext::new(&t, SymbolRef::global("f"), facts);
        compute_frame_info(&mut ctx);
        let text = frame_directives(&ctx);
        assert!(text.contains(".frame\tsp,32,ra"));
        assert!(text.contains(".mask\t0x00000002,-8"));
        assert!(text.contains(".fmask\t0x00000000,0"));
    }
}
