#![allow(
    clippy::cast_possible_truncation, // intentional: bit-pattern arithmetic on immediates
    clippy::cast_possible_wrap, // intentional: unsigned/signed views of the same word
    clippy::cast_sign_loss, // intentional: offsets are signed, sizes are not
    clippy::module_name_repetitions
)]

pub mod abi;
pub mod asm;
pub mod codegen;
pub mod error;
pub mod insn;
pub mod ir;
pub mod target;

pub use codegen::address::{AddressInfo, address_insns, classify_address, legitimate_address_p};
pub use codegen::callconv::{ArgLocation, CumulativeArgs, function_arg, function_value};
pub use codegen::constant::{BuildStep, build_integer};
pub use codegen::cost::{OuterCode, cost, expr_cost};
pub use codegen::frame::{FrameInfo, compute_frame_info, expand_epilogue, expand_prologue};
pub use codegen::legitimize::legitimize_move;
pub use codegen::reorg::reorg;
pub use codegen::symbol::{SymbolType, classify_symbol, symbolic_constant_p};
pub use error::{Error, Result};
pub use insn::{FunctionContext, FunctionFacts, Insn, InsnStream};
pub use ir::{Expr, Mode, Reg, SymbolRef, TlsModel, Ty};
pub use target::{TargetConfig, TargetOptions};
