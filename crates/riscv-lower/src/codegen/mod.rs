pub mod address;
pub mod callconv;
pub mod constant;
pub mod cost;
pub mod frame;
pub mod legitimize;
pub mod reorg;
pub mod symbol;
