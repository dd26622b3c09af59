// This module implements the type system for the optir IR. Types are immutable
// value objects stored in an append-only arena owned by TypeContext and
// addressed through copyable TypeId handles. Primitive types (void, the
// integer widths, f32/f64) are created exactly once when the context is built
// and handed out through accessor methods; pointer, array, struct and function
// types are created on demand. Struct layout (per-field offsets, total size,
// alignment) is computed at creation time by the standard scan-and-round-up
// algorithm and never changes afterwards, so passes can read sizes and offsets
// without synchronization or revalidation. Structurally identical types may be
// distinct arena entries; nothing in the pipeline relies on type interning.

//! Typed IR: the type system.
//!
//! [`TypeContext`] owns every type in a module. Handles are [`TypeId`]s, so
//! types are cheap to copy into instructions and values. Once created a
//! type's size, alignment and field offsets are fixed.

use crate::ir::error::{IrError, IrResult};

/// Handle to a type stored in a [`TypeContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    /// Void always occupies slot 0 of a context; see [`TypeContext::new`].
    pub const VOID: TypeId = TypeId(0);
}

/// The shape of a type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Void,
    /// Fixed-width integer. `width` is in bits (1, 8, 16, 32 or 64).
    Int { width: u32, signed: bool },
    /// IEEE float, 32 or 64 bits wide.
    Float { width: u32 },
    Pointer { pointee: TypeId },
    Array { elem: TypeId, count: u64 },
    Struct {
        name: Option<String>,
        fields: Vec<TypeId>,
        /// Byte offset of each field, parallel to `fields`.
        offsets: Vec<u64>,
        packed: bool,
    },
    Function {
        ret: TypeId,
        params: Vec<TypeId>,
        variadic: bool,
    },
}

/// A type record: kind plus the layout computed at creation.
#[derive(Debug, Clone)]
pub struct TypeData {
    pub kind: TypeKind,
    pub size: u64,
    pub align: u64,
}

/// Round `n` up to the next multiple of `align` (power of two).
#[inline]
pub fn align_up(n: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (n + align - 1) & !(align - 1)
}

/// Owns all types of one module. Primitives are cached; composites are
/// created on demand.
#[derive(Debug)]
pub struct TypeContext {
    types: Vec<TypeData>,
    void: TypeId,
    i1: TypeId,
    ints: [TypeId; 4],
    uints: [TypeId; 4],
    f32: TypeId,
    f64: TypeId,
}

impl TypeContext {
    pub fn new() -> Self {
        let mut types = Vec::new();
        let mut push = |kind: TypeKind, size: u64, align: u64| {
            let id = TypeId(types.len() as u32);
            types.push(TypeData { kind, size, align });
            id
        };

        let void = push(TypeKind::Void, 0, 1);
        let i1 = push(TypeKind::Int { width: 1, signed: false }, 1, 1);
        let mut ints = [void; 4];
        let mut uints = [void; 4];
        for (i, width) in [8u32, 16, 32, 64].iter().enumerate() {
            let bytes = (*width / 8) as u64;
            ints[i] = push(TypeKind::Int { width: *width, signed: true }, bytes, bytes);
            uints[i] = push(TypeKind::Int { width: *width, signed: false }, bytes, bytes);
        }
        let f32 = push(TypeKind::Float { width: 32 }, 4, 4);
        let f64 = push(TypeKind::Float { width: 64 }, 8, 8);

        Self { types, void, i1, ints, uints, f32, f64 }
    }

    pub fn void(&self) -> TypeId {
        self.void
    }

    /// The 1-bit integer used for comparison results.
    pub fn bool(&self) -> TypeId {
        self.i1
    }

    pub fn i8(&self) -> TypeId {
        self.ints[0]
    }

    pub fn i16(&self) -> TypeId {
        self.ints[1]
    }

    pub fn i32(&self) -> TypeId {
        self.ints[2]
    }

    pub fn i64(&self) -> TypeId {
        self.ints[3]
    }

    pub fn u8(&self) -> TypeId {
        self.uints[0]
    }

    pub fn u16(&self) -> TypeId {
        self.uints[1]
    }

    pub fn u32(&self) -> TypeId {
        self.uints[2]
    }

    pub fn u64(&self) -> TypeId {
        self.uints[3]
    }

    pub fn f32(&self) -> TypeId {
        self.f32
    }

    pub fn f64(&self) -> TypeId {
        self.f64
    }

    fn push(&mut self, kind: TypeKind, size: u64, align: u64) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeData { kind, size, align });
        id
    }

    pub fn pointer_to(&mut self, pointee: TypeId) -> TypeId {
        self.push(TypeKind::Pointer { pointee }, 8, 8)
    }

    pub fn array_of(&mut self, elem: TypeId, count: u64) -> TypeId {
        let data = self.data(elem);
        let (size, align) = (data.size * count, data.align);
        self.push(TypeKind::Array { elem, count }, size, align)
    }

    /// Create a struct type, computing per-field offsets and the padded total
    /// size. Packed structs take alignment 1 and no padding.
    pub fn struct_type(
        &mut self,
        name: Option<&str>,
        fields: &[TypeId],
        packed: bool,
    ) -> TypeId {
        let mut offsets = Vec::with_capacity(fields.len());
        let mut run = 0u64;
        let mut max_align = 1u64;
        for &field in fields {
            let data = self.data(field);
            let align = if packed { 1 } else { data.align };
            run = align_up(run, align);
            offsets.push(run);
            run += data.size;
            max_align = max_align.max(align);
        }
        let size = align_up(run, max_align);
        self.push(
            TypeKind::Struct {
                name: name.map(str::to_owned),
                fields: fields.to_vec(),
                offsets,
                packed,
            },
            size,
            max_align,
        )
    }

    pub fn function_type(&mut self, ret: TypeId, params: &[TypeId], variadic: bool) -> TypeId {
        self.push(
            TypeKind::Function { ret, params: params.to_vec(), variadic },
            0,
            1,
        )
    }

    pub fn data(&self, ty: TypeId) -> &TypeData {
        &self.types[ty.0 as usize]
    }

    pub fn kind(&self, ty: TypeId) -> &TypeKind {
        &self.data(ty).kind
    }

    pub fn size_of(&self, ty: TypeId) -> u64 {
        self.data(ty).size
    }

    pub fn align_of(&self, ty: TypeId) -> u64 {
        self.data(ty).align
    }

    pub fn is_void(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Void)
    }

    pub fn is_float(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Float { .. })
    }

    /// Bit width of an integer type, or `None` for anything else.
    pub fn int_width(&self, ty: TypeId) -> Option<u32> {
        match self.kind(ty) {
            TypeKind::Int { width, .. } => Some(*width),
            _ => None,
        }
    }

    pub fn is_signed(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Int { signed: true, .. })
    }

    /// Byte offset of field `index` in struct `ty`.
    pub fn struct_field_offset(&self, ty: TypeId, index: usize) -> IrResult<u64> {
        match self.kind(ty) {
            TypeKind::Struct { name, offsets, .. } => {
                offsets.get(index).copied().ok_or_else(|| IrError::FieldOutOfRange {
                    index,
                    name: name.clone().unwrap_or_else(|| "<anon>".to_owned()),
                    count: offsets.len(),
                })
            }
            _ => Err(IrError::NotAStruct),
        }
    }
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}
