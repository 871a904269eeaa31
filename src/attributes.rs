//! ECMA-335 attribute flag constants for the metadata rows this crate
//! rewrites.
//!
//! Only the bits the widening algorithm reads or writes are defined here;
//! the complete flag sets live in the format library. Values follow
//! ECMA-335 §II.23.1.

/// Visibility bits of a `TypeDef` row's flags, §II.23.1.15.
#[allow(non_snake_case)]
pub mod TypeAttributes {
    /// Mask for the visibility bits
    pub const VISIBILITY_MASK: u32 = 0x0000_0007;
    /// Top-level type, not externally visible
    pub const NOT_PUBLIC: u32 = 0x0000_0000;
    /// Top-level type, externally visible
    pub const PUBLIC: u32 = 0x0000_0001;
    /// Nested type, externally visible
    pub const NESTED_PUBLIC: u32 = 0x0000_0002;
    /// Nested type, visible only to the declaring type
    pub const NESTED_PRIVATE: u32 = 0x0000_0003;
    /// Nested type, visible only within the assembly
    pub const NESTED_ASSEMBLY: u32 = 0x0000_0005;
}

/// Access bits of a `Field` row's flags, §II.23.1.5.
#[allow(non_snake_case)]
pub mod FieldAttributes {
    /// Mask for the access bits
    pub const FIELD_ACCESS_MASK: u32 = 0x0007;
    /// Accessible only by the declaring type
    pub const PRIVATE: u32 = 0x0001;
    /// Accessible by anyone in the assembly
    pub const ASSEMBLY: u32 = 0x0003;
    /// Accessible by anyone who has visibility to the declaring scope
    pub const PUBLIC: u32 = 0x0006;
    /// Field is static
    pub const STATIC: u32 = 0x0010;
}

/// Access bits of a `MethodDef` row's flags, §II.23.1.10.
#[allow(non_snake_case)]
pub mod MethodAttributes {
    /// Mask for the access bits
    pub const METHOD_ACCESS_MASK: u32 = 0x0007;
    /// Accessible only by the declaring type
    pub const PRIVATE: u32 = 0x0001;
    /// Accessible by anyone in the assembly
    pub const ASSEM: u32 = 0x0003;
    /// Accessible by anyone who has visibility to the declaring scope
    pub const PUBLIC: u32 = 0x0006;
    /// Defined on type, else per instance
    pub const STATIC: u32 = 0x0010;
    /// Method is special
    pub const SPECIAL_NAME: u32 = 0x0800;
    /// CLI provides special behavior depending on the method name
    pub const RTSPECIAL_NAME: u32 = 0x1000;
}

/// Semantics bits of a `MethodSemantics` row, §II.23.1.12.
#[allow(non_snake_case)]
pub mod MethodSemanticsAttributes {
    /// Setter for a property
    pub const SETTER: u32 = 0x0001;
    /// Getter for a property
    pub const GETTER: u32 = 0x0002;
}
