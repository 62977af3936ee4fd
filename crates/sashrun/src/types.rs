//! # Type Descriptors
//!
//! Self-describing type trees transmitted on the wire. A descriptor is
//! parsed from the byte stream: primitives are a single tag byte, composite
//! types recurse. Function signatures arrive inside a *type slot* — either
//! a full definition that installs itself into the cache, or a cached
//! reference by 32-bit ID.

use std::collections::HashMap;
use std::rc::Rc;

use sashpack::Decoder;
use sashpack::Encoder;

use crate::error::Error;
use crate::error::Result;

/// Marker for a full type definition that should be cached by its ID.
pub const TYPE_FULL: u8 = 0xFE;

/// Marker for a cached-type reference.
pub const TYPE_CACHED: u8 = 0xFF;

/// Descriptors deeper than this fail to parse.
const MAX_TYPE_DEPTH: usize = 32;

/// Wire tags for the type definition protocol.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Null = 0,
    Bool = 1,
    U8 = 2,
    U16 = 3,
    U32 = 4,
    U64 = 5,
    U128 = 6,
    I8 = 7,
    I16 = 8,
    I32 = 9,
    I64 = 10,
    I128 = 11,
    F32 = 12,
    F64 = 13,
    Usize = 14,
    Isize = 15,
    String = 16,
    HeapRef = 17,
    Callback = 18,
    Option = 19,
    Result = 20,
    Array = 21,
    BorrowedRef = 22,
    U8Clamped = 23,
    StringEnum = 24,
}

impl TypeTag {
    pub const fn from_u8(b: u8) -> Option<Self> {
        match b {
            0 => Some(TypeTag::Null),
            1 => Some(TypeTag::Bool),
            2 => Some(TypeTag::U8),
            3 => Some(TypeTag::U16),
            4 => Some(TypeTag::U32),
            5 => Some(TypeTag::U64),
            6 => Some(TypeTag::U128),
            7 => Some(TypeTag::I8),
            8 => Some(TypeTag::I16),
            9 => Some(TypeTag::I32),
            10 => Some(TypeTag::I64),
            11 => Some(TypeTag::I128),
            12 => Some(TypeTag::F32),
            13 => Some(TypeTag::F64),
            14 => Some(TypeTag::Usize),
            15 => Some(TypeTag::Isize),
            16 => Some(TypeTag::String),
            17 => Some(TypeTag::HeapRef),
            18 => Some(TypeTag::Callback),
            19 => Some(TypeTag::Option),
            20 => Some(TypeTag::Result),
            21 => Some(TypeTag::Array),
            22 => Some(TypeTag::BorrowedRef),
            23 => Some(TypeTag::U8Clamped),
            24 => Some(TypeTag::StringEnum),
            _ => None,
        }
    }
}

/// A parsed type descriptor tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDesc {
    Null,
    Bool,
    U8,
    U16,
    U32,
    U64,
    U128,
    I8,
    I16,
    I32,
    I64,
    I128,
    F32,
    F64,
    /// Transmitted as 64-bit.
    Usize,
    /// Transmitted as 64-bit.
    Isize,
    String,
    /// A heap reference; carries only identity, never a payload.
    HeapRef,
    /// A borrow-stack reference; lives for one operation.
    BorrowedRef,
    /// A callable on the peer, with its own signature.
    Callback { params: Vec<TypeDesc>, ret: Box<TypeDesc> },
    Option(Box<TypeDesc>),
    Result { ok: Box<TypeDesc>, err: Box<TypeDesc> },
    Array(Box<TypeDesc>),
    /// Clamped byte run.
    U8Clamped,
    /// Transmitted as a `u32` index into the variant table; the table
    /// itself travels inside the descriptor.
    StringEnum(Vec<String>),
}

impl TypeDesc {
    /// Parse one descriptor from the byte stream.
    pub fn parse(dec: &mut Decoder) -> Result<Self> {
        Self::parse_at(dec, 0)
    }

    fn parse_at(dec: &mut Decoder, depth: usize) -> Result<Self> {
        if depth > MAX_TYPE_DEPTH {
            return Err(Error::DescriptorTooDeep);
        }
        let byte = dec.take_u8()?;
        let tag = TypeTag::from_u8(byte).ok_or(Error::UnknownTypeTag(byte))?;
        let desc = match tag {
            TypeTag::Null => TypeDesc::Null,
            TypeTag::Bool => TypeDesc::Bool,
            TypeTag::U8 => TypeDesc::U8,
            TypeTag::U16 => TypeDesc::U16,
            TypeTag::U32 => TypeDesc::U32,
            TypeTag::U64 => TypeDesc::U64,
            TypeTag::U128 => TypeDesc::U128,
            TypeTag::I8 => TypeDesc::I8,
            TypeTag::I16 => TypeDesc::I16,
            TypeTag::I32 => TypeDesc::I32,
            TypeTag::I64 => TypeDesc::I64,
            TypeTag::I128 => TypeDesc::I128,
            TypeTag::F32 => TypeDesc::F32,
            TypeTag::F64 => TypeDesc::F64,
            TypeTag::Usize => TypeDesc::Usize,
            TypeTag::Isize => TypeDesc::Isize,
            TypeTag::String => TypeDesc::String,
            TypeTag::HeapRef => TypeDesc::HeapRef,
            TypeTag::BorrowedRef => TypeDesc::BorrowedRef,
            TypeTag::U8Clamped => TypeDesc::U8Clamped,
            TypeTag::Callback => {
                let count = dec.take_u8()? as usize;
                let mut params = Vec::with_capacity(count);
                for _ in 0..count {
                    params.push(Self::parse_at(dec, depth + 1)?);
                }
                let ret = Box::new(Self::parse_at(dec, depth + 1)?);
                TypeDesc::Callback { params, ret }
            }
            TypeTag::Option => TypeDesc::Option(Box::new(Self::parse_at(dec, depth + 1)?)),
            TypeTag::Result => {
                let ok = Box::new(Self::parse_at(dec, depth + 1)?);
                let err = Box::new(Self::parse_at(dec, depth + 1)?);
                TypeDesc::Result { ok, err }
            }
            TypeTag::Array => TypeDesc::Array(Box::new(Self::parse_at(dec, depth + 1)?)),
            TypeTag::StringEnum => {
                let count = dec.take_u8()? as usize;
                let mut variants = Vec::with_capacity(count);
                for _ in 0..count {
                    // Variant strings live inline in the byte stream:
                    // a raw little-endian u32 length, then UTF-8 bytes.
                    let raw = dec.take_bytes(4)?;
                    let len = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
                    let raw = dec.take_bytes(len)?;
                    let s = std::str::from_utf8(raw)
                        .map_err(|e| sashpack::Error::InvalidUtf8 { position: e.valid_up_to() })?;
                    variants.push(s.to_string());
                }
                TypeDesc::StringEnum(variants)
            }
        };
        Ok(desc)
    }

    /// Emit the wire form of this descriptor into the byte stream. The
    /// inverse of [`parse`](TypeDesc::parse).
    pub fn write_def(&self, enc: &mut Encoder) {
        match self {
            TypeDesc::Null => enc.push_u8(TypeTag::Null as u8),
            TypeDesc::Bool => enc.push_u8(TypeTag::Bool as u8),
            TypeDesc::U8 => enc.push_u8(TypeTag::U8 as u8),
            TypeDesc::U16 => enc.push_u8(TypeTag::U16 as u8),
            TypeDesc::U32 => enc.push_u8(TypeTag::U32 as u8),
            TypeDesc::U64 => enc.push_u8(TypeTag::U64 as u8),
            TypeDesc::U128 => enc.push_u8(TypeTag::U128 as u8),
            TypeDesc::I8 => enc.push_u8(TypeTag::I8 as u8),
            TypeDesc::I16 => enc.push_u8(TypeTag::I16 as u8),
            TypeDesc::I32 => enc.push_u8(TypeTag::I32 as u8),
            TypeDesc::I64 => enc.push_u8(TypeTag::I64 as u8),
            TypeDesc::I128 => enc.push_u8(TypeTag::I128 as u8),
            TypeDesc::F32 => enc.push_u8(TypeTag::F32 as u8),
            TypeDesc::F64 => enc.push_u8(TypeTag::F64 as u8),
            TypeDesc::Usize => enc.push_u8(TypeTag::Usize as u8),
            TypeDesc::Isize => enc.push_u8(TypeTag::Isize as u8),
            TypeDesc::String => enc.push_u8(TypeTag::String as u8),
            TypeDesc::HeapRef => enc.push_u8(TypeTag::HeapRef as u8),
            TypeDesc::BorrowedRef => enc.push_u8(TypeTag::BorrowedRef as u8),
            TypeDesc::U8Clamped => enc.push_u8(TypeTag::U8Clamped as u8),
            TypeDesc::Callback { params, ret } => {
                enc.push_u8(TypeTag::Callback as u8);
                enc.push_u8(params.len() as u8);
                for param in params {
                    param.write_def(enc);
                }
                ret.write_def(enc);
            }
            TypeDesc::Option(inner) => {
                enc.push_u8(TypeTag::Option as u8);
                inner.write_def(enc);
            }
            TypeDesc::Result { ok, err } => {
                enc.push_u8(TypeTag::Result as u8);
                ok.write_def(enc);
                err.write_def(enc);
            }
            TypeDesc::Array(elem) => {
                enc.push_u8(TypeTag::Array as u8);
                elem.write_def(enc);
            }
            TypeDesc::StringEnum(variants) => {
                enc.push_u8(TypeTag::StringEnum as u8);
                enc.push_u8(variants.len() as u8);
                for variant in variants {
                    enc.push_bytes(&(variant.len() as u32).to_le_bytes());
                    enc.push_bytes(variant.as_bytes());
                }
            }
        }
    }

    pub fn is_heap_ref(&self) -> bool {
        matches!(self, TypeDesc::HeapRef)
    }
}

/// A function signature as laid out inside a full type slot:
/// `paramCount:u8`, parameter descriptors, return descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncType {
    pub params: Vec<TypeDesc>,
    pub ret: TypeDesc,
}

impl FuncType {
    pub fn new(params: Vec<TypeDesc>, ret: TypeDesc) -> Self {
        Self { params, ret }
    }

    pub fn parse(dec: &mut Decoder) -> Result<Self> {
        let count = dec.take_u8()? as usize;
        let mut params = Vec::with_capacity(count);
        for _ in 0..count {
            params.push(TypeDesc::parse(dec)?);
        }
        let ret = TypeDesc::parse(dec)?;
        Ok(Self { params, ret })
    }

    pub fn write_def(&self, enc: &mut Encoder) {
        enc.push_u8(self.params.len() as u8);
        for param in &self.params {
            param.write_def(enc);
        }
        self.ret.write_def(enc);
    }
}

/// Cache of parsed signatures, keyed by the 32-bit type ID the peer
/// assigned when it first sent the full definition.
#[derive(Default)]
pub struct TypeCache {
    entries: HashMap<u32, Rc<FuncType>>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self, id: u32, sig: Rc<FuncType>) {
        self.entries.insert(id, sig);
    }

    pub fn lookup(&self, id: u32) -> Option<Rc<FuncType>> {
        self.entries.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
