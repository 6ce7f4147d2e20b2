pub mod display;
pub mod expr;
pub mod ty;

pub use expr::{BinaryOp, CompareOp, Expr, Mode, ModeClass, Reg, SymbolRef, TlsModel, UnaryOp};
pub use ty::{Field, Ty};
