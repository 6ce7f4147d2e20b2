//! Target configuration: word size, code model flags, relocation tables and
//! operation cost tables.
//!
//! A `TargetConfig` is built once per compilation and is read-only
//! afterwards; everything downstream borrows it.

use crate::codegen::symbol::{NUM_SYMBOL_TYPES, SymbolType};
use crate::ir::Mode;

/// Pointer/word width of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WordSize {
    Rv32,
    #[default]
    Rv64,
}

/// Processors we carry tuned cost tables for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Processor {
    Rocket32,
    #[default]
    Rocket64,
}

/// User-selectable target options. The defaults describe a 64-bit
/// hard-float static executable.
#[derive(Debug, Clone)]
pub struct TargetOptions {
    pub word: WordSize,
    /// Code may live in multiple link modules and uses GOT-based access.
    pub abicalls: bool,
    /// Position-independent code generation.
    pub pic: bool,
    /// Use 32-bit GOT offsets (split high/low GOT relocations).
    pub xgot: bool,
    pub hard_float: bool,
    pub big_endian: bool,
    pub tune: Processor,
    /// Select the uniform size-oriented cost table.
    pub optimize_size: bool,
    /// No NaNs need be honored (-ffinite-math-only).
    pub finite_math_only: bool,
    /// The sign of zero need not be honored.
    pub no_signed_zeros: bool,
    /// Unsafe floating-point rewrites (reciprocal forms) are allowed.
    pub unsafe_math: bool,
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            word: WordSize::Rv64,
            abicalls: false,
            pic: false,
            xgot: false,
            hard_float: true,
            big_endian: false,
            tune: Processor::Rocket64,
            optimize_size: false,
            finite_math_only: false,
            no_signed_zeros: false,
            unsafe_math: false,
        }
    }
}

/// Relocation handling for each symbol type: whether the type is split into
/// a HIGH/LO_SUM pair, and the relocation strings fronting each half.
/// `lo` may be present without `hi` for single-instruction relocations.
#[derive(Debug, Clone)]
pub struct RelocTables {
    split: [bool; NUM_SYMBOL_TYPES],
    hi: [Option<&'static str>; NUM_SYMBOL_TYPES],
    lo: [Option<&'static str>; NUM_SYMBOL_TYPES],
}

impl RelocTables {
    fn new(options: &TargetOptions) -> Self {
        let mut t = Self {
            split: [false; NUM_SYMBOL_TYPES],
            hi: [None; NUM_SYMBOL_TYPES],
            lo: [None; NUM_SYMBOL_TYPES],
        };
        let mut set = |ty: SymbolType, split: bool, hi, lo| {
            t.split[ty.index()] = split;
            t.hi[ty.index()] = hi;
            t.lo[ty.index()] = lo;
        };

        set(SymbolType::Absolute, true, Some("%hi("), Some("%lo("));
        set(SymbolType::High32, false, None, Some("%hi("));

        if options.xgot {
            // The HIGH and LO_SUM halves are matched by dedicated patterns.
            set(SymbolType::GotDisp, true, None, None);
            set(
                SymbolType::GotoffDisp,
                true,
                Some("%got_hi("),
                Some("%got_lo("),
            );
            set(
                SymbolType::GotoffCall,
                true,
                Some("%call_hi("),
                Some("%call_lo("),
            );
            set(
                SymbolType::Gottprel,
                true,
                Some("%gottp_hi("),
                Some("%gottp_lo("),
            );
            set(
                SymbolType::TlsGd,
                true,
                Some("%tlsgd_hi("),
                Some("%tlsgd_lo("),
            );
            set(
                SymbolType::TlsLdm,
                true,
                Some("%tlsldm_hi("),
                Some("%tlsldm_lo("),
            );
        } else {
            set(SymbolType::GotoffDisp, false, None, Some("%got_disp("));
            set(SymbolType::GotoffCall, false, None, Some("%call16("));
            set(SymbolType::Gottprel, false, None, Some("%gottprel("));
            set(SymbolType::TlsGd, false, None, Some("%tlsgd("));
            set(SymbolType::TlsLdm, false, None, Some("%tlsldm("));
        }

        set(
            SymbolType::GotoffLoadgp,
            true,
            Some("%hi(%neg(%gp_rel("),
            Some("%lo(%neg(%gp_rel("),
        );
        set(
            SymbolType::Dtprel,
            true,
            Some("%dtprel_hi("),
            Some("%dtprel_lo("),
        );
        set(
            SymbolType::Tprel,
            true,
            Some("%tprel_hi("),
            Some("%tprel_lo("),
        );
        t
    }
}

/// Relative costs of operations, in the units of `costs_n_insns`.
#[derive(Debug, Clone, Copy)]
pub struct RtxCostData {
    pub fp_add: u32,
    pub fp_mult_sf: u32,
    pub fp_mult_df: u32,
    pub fp_div_sf: u32,
    pub fp_div_df: u32,
    pub int_mult_si: u32,
    pub int_mult_di: u32,
    pub int_div_si: u32,
    pub int_div_di: u32,
    pub branch_cost: u32,
    pub memory_latency: u32,
}

/// The cost of `n` simple instructions.
#[must_use]
pub const fn costs_n_insns(n: u32) -> u32 {
    n * 4
}

/// Costs to use when optimizing for size: everything is one instruction.
pub const COSTS_OPTIMIZE_SIZE: RtxCostData = RtxCostData {
    fp_add: costs_n_insns(1),
    fp_mult_sf: costs_n_insns(1),
    fp_mult_df: costs_n_insns(1),
    fp_div_sf: costs_n_insns(1),
    fp_div_df: costs_n_insns(1),
    int_mult_si: costs_n_insns(1),
    int_mult_di: costs_n_insns(1),
    int_div_si: costs_n_insns(1),
    int_div_di: costs_n_insns(1),
    branch_cost: 2,
    memory_latency: 4,
};

/// Measured latencies for the Rocket pipeline.
pub const COSTS_ROCKET: RtxCostData = RtxCostData {
    fp_add: costs_n_insns(8),
    fp_mult_sf: costs_n_insns(8),
    fp_mult_df: costs_n_insns(8),
    fp_div_sf: costs_n_insns(20),
    fp_div_df: costs_n_insns(30),
    int_mult_si: costs_n_insns(8),
    int_mult_di: costs_n_insns(8),
    int_div_si: costs_n_insns(32),
    int_div_di: costs_n_insns(64),
    branch_cost: 2,
    memory_latency: 7,
};

/// The fully-resolved target description.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    options: TargetOptions,
    relocs: RelocTables,
    cost: RtxCostData,
}

impl TargetConfig {
    #[must_use]
    pub fn new(options: TargetOptions) -> Self {
        let relocs = RelocTables::new(&options);
        let cost = if options.optimize_size {
            COSTS_OPTIMIZE_SIZE
        } else {
            match options.tune {
                Processor::Rocket32 | Processor::Rocket64 => COSTS_ROCKET,
            }
        };
        tracing::debug!(
            word = ?options.word,
            abicalls = options.abicalls,
            pic = options.pic,
            xgot = options.xgot,
            "target configured"
        );
        Self {
            options,
            relocs,
            cost,
        }
    }

    #[must_use]
    pub fn options(&self) -> &TargetOptions {
        &self.options
    }

    #[must_use]
    pub fn cost_data(&self) -> &RtxCostData {
        &self.cost
    }

    #[must_use]
    pub const fn is_64bit(&self) -> bool {
        matches!(self.options.word, WordSize::Rv64)
    }

    /// Bytes per machine word.
    #[must_use]
    pub const fn units_per_word(&self) -> u64 {
        match self.options.word {
            WordSize::Rv32 => 4,
            WordSize::Rv64 => 8,
        }
    }

    /// The integer mode of one machine word.
    #[must_use]
    pub const fn word_mode(&self) -> Mode {
        match self.options.word {
            WordSize::Rv32 => Mode::SI,
            WordSize::Rv64 => Mode::DI,
        }
    }

    /// The mode of a pointer; identical to the word mode here.
    #[must_use]
    pub const fn pointer_mode(&self) -> Mode {
        self.word_mode()
    }

    /// Largest floating value the FPU can carry, in bytes (zero when soft
    /// float).
    #[must_use]
    pub const fn units_per_fpvalue(&self) -> u64 {
        if self.options.hard_float { 8 } else { 0 }
    }

    /// True when globals are accessed through the GOT.
    #[must_use]
    pub const fn use_got(&self) -> bool {
        self.options.abicalls
    }

    /// True if symbols of `ty` are split into a HIGH/LO_SUM pair.
    #[must_use]
    pub fn split_p(&self, ty: SymbolType) -> bool {
        self.relocs.split[ty.index()]
    }

    /// Relocation string for the high half, if any.
    #[must_use]
    pub fn hi_reloc(&self, ty: SymbolType) -> Option<&'static str> {
        self.relocs.hi[ty.index()]
    }

    /// Relocation string for the low half, if any.
    #[must_use]
    pub fn lo_reloc(&self, ty: SymbolType) -> Option<&'static str> {
        self.relocs.lo[ty.index()]
    }

    /// NaNs must be preserved unless finite-math-only is in effect.
    #[must_use]
    pub const fn honor_nans(&self) -> bool {
        !self.options.finite_math_only
    }

    #[must_use]
    pub const fn honor_signed_zeros(&self) -> bool {
        !self.options.no_signed_zeros
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_relocs_split_absolute() {
        let t = TargetConfig::new(TargetOptions::default());
        assert!(t.split_p(SymbolType::Absolute));
        assert_eq!(t.hi_reloc(SymbolType::Absolute), Some("%hi("));
        assert_eq!(t.lo_reloc(SymbolType::Absolute), Some("%lo("));
        assert!(!t.split_p(SymbolType::GotoffDisp));
        assert_eq!(t.lo_reloc(SymbolType::GotoffDisp), Some("%got_disp("));
        assert_eq!(t.lo_reloc(SymbolType::High32), Some("%hi("));
        assert_eq!(t.hi_reloc(SymbolType::High32), None);
    }

    #[test]
    fn xgot_relocs_split_got_types() {
        let t = TargetConfig::new(TargetOptions {
            abicalls: true,
            pic: true,
            xgot: true,
            ..TargetOptions::default()
        });
        assert!(t.split_p(SymbolType::GotDisp));
        assert!(t.split_p(SymbolType::GotoffCall));
        assert_eq!(t.hi_reloc(SymbolType::GotoffCall), Some("%call_hi("));
        assert_eq!(t.lo_reloc(SymbolType::Gottprel), Some("%gottp_lo("));
    }

    #[test]
    fn tls_relocs_always_split() {
        let t = TargetConfig::new(TargetOptions::default());
        assert!(t.split_p(SymbolType::Tprel));
        assert!(t.split_p(SymbolType::Dtprel));
        assert_eq!(t.hi_reloc(SymbolType::Tprel), Some("%tprel_hi("));
    }

    #[test]
    fn size_table_is_uniform() {
        let t = TargetConfig::new(TargetOptions {
            optimize_size: true,
            ..TargetOptions::default()
        });
        assert_eq!(t.cost_data().fp_div_df, costs_n_insns(1));
        let fast = TargetConfig::new(TargetOptions::default());
        assert_eq!(fast.cost_data().fp_div_df, costs_n_insns(30));
        assert_eq!(fast.cost_data().int_div_di, costs_n_insns(64));
    }
}
