//! # Type-Directed Marshalling
//!
//! The translation layer between [`Value`] trees and the wire streams,
//! driven by [`TypeDesc`]. Scalars travel by bit pattern, strings by value,
//! references by identity only — and for insertions not even that: the
//! peer re-derives fresh heap IDs from its own synchronised water-mark, so
//! `HeapRef`/`BorrowedRef` encoding writes nothing.
//!
//! ## Invariants
//! - All recursion is bounded by `MAX_RECURSION_DEPTH`.
//! - Encoding verifies the value shape against the descriptor; decoding
//!   produces exactly the descriptor's value shape.

use log::trace;

use sashpack::Decoder;
use sashpack::Encoder;

use crate::error::Error;
use crate::error::Result;
use crate::proxy::PeerFunction;
use crate::runtime::Runtime;
use crate::types::TypeDesc;
use crate::value::Value;

/// The maximum nesting depth for marshalled values.
const MAX_RECURSION_DEPTH: usize = 64;

/// Encode `value` as `desc` into the wire streams.
pub fn encode_value(rt: &Runtime, desc: &TypeDesc, value: &Value, enc: &mut Encoder) -> Result<()> {
    encode_impl(rt, desc, value, enc, 0)
}

/// Decode one value of shape `desc` from the wire streams.
pub fn decode_value(rt: &Runtime, desc: &TypeDesc, dec: &mut Decoder) -> Result<Value> {
    decode_impl(rt, desc, dec, 0)
}

fn mismatch(expected: &'static str, value: &Value) -> Error {
    Error::TypeMismatch { expected, found: value.kind() }
}

fn encode_impl(
    rt: &Runtime,
    desc: &TypeDesc,
    value: &Value,
    enc: &mut Encoder,
    depth: usize,
) -> Result<()> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(Error::RecursionLimitExceeded);
    }

    match desc {
        TypeDesc::Null => match value {
            Value::Null | Value::Undefined => Ok(()),
            v => Err(mismatch("null", v)),
        },
        TypeDesc::Bool => match value {
            Value::Bool(b) => {
                enc.push_u8(*b as u8);
                Ok(())
            }
            v => Err(mismatch("bool", v)),
        },
        TypeDesc::U8 => match value {
            Value::U8(v) => {
                enc.push_u8(*v);
                Ok(())
            }
            v => Err(mismatch("u8", v)),
        },
        TypeDesc::U16 => match value {
            Value::U16(v) => {
                enc.push_u16(*v);
                Ok(())
            }
            v => Err(mismatch("u16", v)),
        },
        TypeDesc::U32 => match value {
            Value::U32(v) => {
                enc.push_u32(*v);
                Ok(())
            }
            v => Err(mismatch("u32", v)),
        },
        TypeDesc::U64 => match value {
            Value::U64(v) => {
                enc.push_u64(*v);
                Ok(())
            }
            v => Err(mismatch("u64", v)),
        },
        TypeDesc::U128 => match value {
            Value::U128(v) => {
                enc.push_u128(*v);
                Ok(())
            }
            v => Err(mismatch("u128", v)),
        },
        TypeDesc::I8 => match value {
            Value::I8(v) => {
                enc.push_u8(*v as u8);
                Ok(())
            }
            v => Err(mismatch("i8", v)),
        },
        TypeDesc::I16 => match value {
            Value::I16(v) => {
                enc.push_u16(*v as u16);
                Ok(())
            }
            v => Err(mismatch("i16", v)),
        },
        TypeDesc::I32 => match value {
            Value::I32(v) => {
                enc.push_u32(*v as u32);
                Ok(())
            }
            v => Err(mismatch("i32", v)),
        },
        TypeDesc::I64 => match value {
            Value::I64(v) => {
                enc.push_u64(*v as u64);
                Ok(())
            }
            v => Err(mismatch("i64", v)),
        },
        TypeDesc::I128 => match value {
            Value::I128(v) => {
                enc.push_u128(*v as u128);
                Ok(())
            }
            v => Err(mismatch("i128", v)),
        },
        TypeDesc::F32 => match value {
            Value::F32(v) => {
                enc.push_u32(v.to_bits());
                Ok(())
            }
            v => Err(mismatch("f32", v)),
        },
        TypeDesc::F64 => match value {
            Value::F64(v) => {
                enc.push_u64(v.to_bits());
                Ok(())
            }
            v => Err(mismatch("f64", v)),
        },
        TypeDesc::Usize => match value {
            Value::U64(v) => {
                enc.push_u64(*v);
                Ok(())
            }
            v => Err(mismatch("usize", v)),
        },
        TypeDesc::Isize => match value {
            Value::I64(v) => {
                enc.push_u64(*v as u64);
                Ok(())
            }
            v => Err(mismatch("isize", v)),
        },
        TypeDesc::String => match value {
            Value::String(s) => {
                enc.push_str(s);
                Ok(())
            }
            v => Err(mismatch("string", v)),
        },
        TypeDesc::HeapRef => {
            // Identity is derivable: both sides advance the water-mark in
            // lock-step, so the ID never travels.
            let id = rt.inner.heap.borrow_mut().insert(value.clone());
            trace!("heap insert at {id}");
            Ok(())
        }
        TypeDesc::BorrowedRef => {
            let id = rt.inner.heap.borrow_mut().add_borrowed_ref(value.clone())?;
            trace!("borrow push at {id}");
            Ok(())
        }
        TypeDesc::Callback { .. } => match value {
            Value::Callback(func) => {
                enc.push_u64(func.fn_id());
                Ok(())
            }
            v => Err(mismatch("callback", v)),
        },
        TypeDesc::Option(inner) => match value {
            Value::Null | Value::Undefined => {
                enc.push_u8(0);
                Ok(())
            }
            v => {
                enc.push_u8(1);
                encode_impl(rt, inner, v, enc, depth + 1)
            }
        },
        TypeDesc::Result { ok, err } => match value {
            Value::Result(Ok(v)) => {
                enc.push_u8(1);
                encode_impl(rt, ok, v, enc, depth + 1)
            }
            Value::Result(Err(e)) => {
                enc.push_u8(0);
                encode_impl(rt, err, e, enc, depth + 1)
            }
            v => Err(Error::InvalidResultValue { found: v.kind() }),
        },
        TypeDesc::Array(elem) => match value {
            Value::List(items) => {
                enc.push_u32(items.len() as u32);
                for item in items {
                    encode_impl(rt, elem, item, enc, depth + 1)?;
                }
                Ok(())
            }
            v => Err(mismatch("list", v)),
        },
        TypeDesc::U8Clamped => match value {
            Value::Bytes(run) => {
                enc.push_u32(run.len() as u32);
                enc.push_bytes(run);
                Ok(())
            }
            v => Err(mismatch("bytes", v)),
        },
        TypeDesc::StringEnum(variants) => match value {
            Value::String(s) => {
                // Unknown strings land in the reserved invalid slot one
                // past the table.
                let index = variants
                    .iter()
                    .position(|v| v == s)
                    .unwrap_or(variants.len());
                enc.push_u32(index as u32);
                Ok(())
            }
            v => Err(mismatch("string", v)),
        },
    }
}

fn decode_impl(rt: &Runtime, desc: &TypeDesc, dec: &mut Decoder, depth: usize) -> Result<Value> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(Error::RecursionLimitExceeded);
    }

    match desc {
        TypeDesc::Null => Ok(Value::Null),
        TypeDesc::Bool => Ok(Value::Bool(dec.take_u8()? != 0)),
        TypeDesc::U8 => Ok(Value::U8(dec.take_u8()?)),
        TypeDesc::U16 => Ok(Value::U16(dec.take_u16()?)),
        TypeDesc::U32 => Ok(Value::U32(dec.take_u32()?)),
        TypeDesc::U64 => Ok(Value::U64(dec.take_u64()?)),
        TypeDesc::U128 => Ok(Value::U128(dec.take_u128()?)),
        TypeDesc::I8 => Ok(Value::I8(dec.take_u8()? as i8)),
        TypeDesc::I16 => Ok(Value::I16(dec.take_u16()? as i16)),
        TypeDesc::I32 => Ok(Value::I32(dec.take_u32()? as i32)),
        TypeDesc::I64 => Ok(Value::I64(dec.take_u64()? as i64)),
        TypeDesc::I128 => Ok(Value::I128(dec.take_u128()? as i128)),
        TypeDesc::F32 => Ok(Value::F32(f32::from_bits(dec.take_u32()?))),
        TypeDesc::F64 => Ok(Value::F64(f64::from_bits(dec.take_u64()?))),
        TypeDesc::Usize => Ok(Value::U64(dec.take_u64()?)),
        TypeDesc::Isize => Ok(Value::I64(dec.take_u64()? as i64)),
        TypeDesc::String => Ok(Value::String(dec.take_str()?.to_string())),
        TypeDesc::HeapRef | TypeDesc::BorrowedRef => {
            let id = dec.take_u64()?;
            rt.inner.heap.borrow().get(id)
        }
        TypeDesc::Callback { params, ret } => {
            let fn_id = dec.take_u64()?;
            Ok(Value::Callback(PeerFunction::new(
                rt,
                fn_id,
                params.clone(),
                (**ret).clone(),
            )))
        }
        TypeDesc::Option(inner) => {
            if dec.take_u8()? == 0 {
                Ok(Value::Null)
            } else {
                decode_impl(rt, inner, dec, depth + 1)
            }
        }
        TypeDesc::Result { ok, err } => {
            if dec.take_u8()? != 0 {
                Ok(Value::Result(Ok(Box::new(decode_impl(rt, ok, dec, depth + 1)?))))
            } else {
                Ok(Value::Result(Err(Box::new(decode_impl(rt, err, dec, depth + 1)?))))
            }
        }
        TypeDesc::Array(elem) => {
            let len = dec.take_u32()? as usize;
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(decode_impl(rt, elem, dec, depth + 1)?);
            }
            Ok(Value::List(items))
        }
        TypeDesc::U8Clamped => {
            let len = dec.take_u32()? as usize;
            Ok(Value::Bytes(dec.take_bytes(len)?.to_vec()))
        }
        TypeDesc::StringEnum(variants) => {
            let index = dec.take_u32()? as usize;
            match variants.get(index) {
                Some(s) => Ok(Value::String(s.clone())),
                None => Ok(Value::Undefined),
            }
        }
    }
}
