//! Calling conventions.
//!
//! Function types carry their calling convention as part of their interning
//! key. The DWARF mapping covers the vendor values LLVM emits in
//! `DW_AT_calling_convention`; anything unknown maps to [`CallingConv::C`].

use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[repr(u8)]
pub enum CallingConv {
    #[default]
    C,
    X86StdCall,
    X86FastCall,
    X86ThisCall,
    X86VectorCall,
    X86Pascal,
    Win64,
    X86_64SysV,
    X86RegCall,
    Aapcs,
    AapcsVfp,
    IntelOclBicc,
    SpirFunction,
    OpenClKernel,
    Swift,
    PreserveMost,
    PreserveAll,
}

// DW_CC values. 0xb0..0xb6 are the Borland range, 0xc0.. the LLVM range.
const DW_CC_NORMAL: u64 = 0x01;
const DW_CC_BORLAND_STDCALL: u64 = 0xb1;
const DW_CC_BORLAND_PASCAL: u64 = 0xb2;
const DW_CC_BORLAND_MSFASTCALL: u64 = 0xb3;
const DW_CC_BORLAND_THISCALL: u64 = 0xb5;
const DW_CC_LLVM_VECTORCALL: u64 = 0xc0;
const DW_CC_LLVM_WIN64: u64 = 0xc1;
const DW_CC_LLVM_X86_64_SYSV: u64 = 0xc2;
const DW_CC_LLVM_AAPCS: u64 = 0xc3;
const DW_CC_LLVM_AAPCS_VFP: u64 = 0xc4;
const DW_CC_LLVM_INTEL_OCL_BICC: u64 = 0xc5;
const DW_CC_LLVM_SPIR_FUNCTION: u64 = 0xc6;
const DW_CC_LLVM_OPENCL_KERNEL: u64 = 0xc7;
const DW_CC_LLVM_SWIFT: u64 = 0xc8;
const DW_CC_LLVM_PRESERVE_MOST: u64 = 0xc9;
const DW_CC_LLVM_PRESERVE_ALL: u64 = 0xca;
const DW_CC_LLVM_X86_REGCALL: u64 = 0xcb;

impl CallingConv {
    /// Map a raw `DW_AT_calling_convention` value.
    pub fn from_dwarf(value: u64) -> CallingConv {
        match value {
            DW_CC_BORLAND_STDCALL => CallingConv::X86StdCall,
            DW_CC_BORLAND_MSFASTCALL => CallingConv::X86FastCall,
            DW_CC_BORLAND_THISCALL => CallingConv::X86ThisCall,
            DW_CC_LLVM_VECTORCALL => CallingConv::X86VectorCall,
            DW_CC_BORLAND_PASCAL => CallingConv::X86Pascal,
            DW_CC_LLVM_WIN64 => CallingConv::Win64,
            DW_CC_LLVM_X86_64_SYSV => CallingConv::X86_64SysV,
            DW_CC_LLVM_X86_REGCALL => CallingConv::X86RegCall,
            DW_CC_LLVM_AAPCS => CallingConv::Aapcs,
            DW_CC_LLVM_AAPCS_VFP => CallingConv::AapcsVfp,
            DW_CC_LLVM_INTEL_OCL_BICC => CallingConv::IntelOclBicc,
            DW_CC_LLVM_SPIR_FUNCTION => CallingConv::SpirFunction,
            DW_CC_LLVM_OPENCL_KERNEL => CallingConv::OpenClKernel,
            DW_CC_LLVM_SWIFT => CallingConv::Swift,
            DW_CC_LLVM_PRESERVE_MOST => CallingConv::PreserveMost,
            DW_CC_LLVM_PRESERVE_ALL => CallingConv::PreserveAll,
            _ => CallingConv::C,
        }
    }

    /// Raw DWARF value for this convention.
    pub fn to_dwarf(self) -> u64 {
        match self {
            CallingConv::C => DW_CC_NORMAL,
            CallingConv::X86StdCall => DW_CC_BORLAND_STDCALL,
            CallingConv::X86FastCall => DW_CC_BORLAND_MSFASTCALL,
            CallingConv::X86ThisCall => DW_CC_BORLAND_THISCALL,
            CallingConv::X86VectorCall => DW_CC_LLVM_VECTORCALL,
            CallingConv::X86Pascal => DW_CC_BORLAND_PASCAL,
            CallingConv::Win64 => DW_CC_LLVM_WIN64,
            CallingConv::X86_64SysV => DW_CC_LLVM_X86_64_SYSV,
            CallingConv::X86RegCall => DW_CC_LLVM_X86_REGCALL,
            CallingConv::Aapcs => DW_CC_LLVM_AAPCS,
            CallingConv::AapcsVfp => DW_CC_LLVM_AAPCS_VFP,
            CallingConv::IntelOclBicc => DW_CC_LLVM_INTEL_OCL_BICC,
            CallingConv::SpirFunction => DW_CC_LLVM_SPIR_FUNCTION,
            CallingConv::OpenClKernel => DW_CC_LLVM_OPENCL_KERNEL,
            CallingConv::Swift => DW_CC_LLVM_SWIFT,
            CallingConv::PreserveMost => DW_CC_LLVM_PRESERVE_MOST,
            CallingConv::PreserveAll => DW_CC_LLVM_PRESERVE_ALL,
        }
    }

    /// Attribute injected into a function declarator, including its leading
    /// space. Empty for conventions the C front end has no spelling for.
    pub fn clang_attribute(self) -> &'static str {
        match self {
            // The default needs no attribute, and `cdecl` warns on x86_64.
            CallingConv::C | CallingConv::SpirFunction | CallingConv::OpenClKernel => "",
            CallingConv::X86StdCall => " __attribute__((stdcall))",
            CallingConv::X86FastCall => " __attribute__((fastcall))",
            CallingConv::X86ThisCall => " __attribute__((thiscall))",
            CallingConv::X86VectorCall => " __attribute__((vectorcall))",
            CallingConv::X86Pascal => " __attribute__((pascal))",
            CallingConv::Win64 => " __attribute__((ms_abi))",
            CallingConv::X86_64SysV => " __attribute__((sysv_abi))",
            CallingConv::X86RegCall => " __attribute__((regcall))",
            CallingConv::Aapcs => " __attribute__((pcs(\"aapcs\")))",
            CallingConv::AapcsVfp => " __attribute__((pcs(\"aapcs-vfp\")))",
            CallingConv::IntelOclBicc => " __attribute__((intel_ocl_bicc))",
            CallingConv::Swift => " __attribute__((swiftcall))",
            CallingConv::PreserveMost => " __attribute__((preserve_most))",
            CallingConv::PreserveAll => " __attribute__((preserve_all))",
        }
    }
}

impl fmt::Display for CallingConv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallingConv::C => "c",
            CallingConv::X86StdCall => "stdcall",
            CallingConv::X86FastCall => "fastcall",
            CallingConv::X86ThisCall => "thiscall",
            CallingConv::X86VectorCall => "vectorcall",
            CallingConv::X86Pascal => "pascal",
            CallingConv::Win64 => "ms_abi",
            CallingConv::X86_64SysV => "sysv_abi",
            CallingConv::X86RegCall => "regcall",
            CallingConv::Aapcs => "aapcs",
            CallingConv::AapcsVfp => "aapcs-vfp",
            CallingConv::IntelOclBicc => "intel_ocl_bicc",
            CallingConv::SpirFunction => "spir_function",
            CallingConv::OpenClKernel => "opencl_kernel",
            CallingConv::Swift => "swiftcall",
            CallingConv::PreserveMost => "preserve_most",
            CallingConv::PreserveAll => "preserve_all",
        };
        f.write_str(name)
    }
}
