//! Typed bitmap indexes: per-type mappings from values to event-ID
//! bitstreams.
//!
//! Every index answers `lookup(op, value)` with a bitstream in which bit
//! `k` tells whether the event at ID `k` satisfies `stored_value op value`.
//! Position 0 is reserved for the invalid event ID and pre-filled with
//! false. A presence mask keeps padded positions out of every lookup,
//! including the negated operators.

use crate::bitstream::Bitstream;
use crate::bitvector::MSB_ONE;
use crate::ewah::EwahBitstream;
use crate::{ops, wire, IndexError, Result};
use event_common::HashMap;
use event_core::{EventId, Port, Proto, RelOp, Value, ValueKind};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// A bitmap index over one value kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueIndex {
    checkpoint_size: u64,
    imp: IndexImpl,
}

#[derive(Debug, Clone, PartialEq)]
enum IndexImpl {
    Bool(BoolIndex),
    Arith(ArithmeticIndex),
    Str(StringIndex),
    Addr(AddressIndex),
    Port(PortIndex),
}

impl ValueIndex {
    /// Construct an index suited for the given value kind. Position 0 is
    /// reserved immediately.
    pub fn for_kind(kind: ValueKind) -> Result<Self> {
        let imp = match kind {
            ValueKind::Bool => IndexImpl::Bool(BoolIndex::default()),
            ValueKind::Int
            | ValueKind::UInt
            | ValueKind::Double
            | ValueKind::TimeSpan
            | ValueKind::TimeStamp => IndexImpl::Arith(ArithmeticIndex::new(kind)),
            ValueKind::String => IndexImpl::Str(StringIndex::default()),
            ValueKind::Address => IndexImpl::Addr(AddressIndex::default()),
            ValueKind::Port => IndexImpl::Port(PortIndex::default()),
            other => return Err(IndexError::UnsupportedKind(other)),
        };
        let mut index = Self {
            checkpoint_size: 0,
            imp,
        };
        index.append(1, false);
        Ok(index)
    }

    /// The value kind this index holds.
    pub fn kind(&self) -> ValueKind {
        match &self.imp {
            IndexImpl::Bool(_) => ValueKind::Bool,
            IndexImpl::Arith(index) => index.kind,
            IndexImpl::Str(_) => ValueKind::String,
            IndexImpl::Addr(_) => ValueKind::Address,
            IndexImpl::Port(_) => ValueKind::Port,
        }
    }

    /// The index bit length: one position per event ID seen, plus the
    /// reserved position 0.
    pub fn size(&self) -> u64 {
        match &self.imp {
            IndexImpl::Bool(index) => index.truthy.size(),
            IndexImpl::Arith(index) => index.present.size(),
            IndexImpl::Str(index) => index.present.size(),
            IndexImpl::Addr(index) => index.present.size(),
            IndexImpl::Port(index) => index.present.size(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Raw padding: append `n` copies of `bit` to every constituent
    /// stream. Only false padding is meaningful for value streams.
    pub fn append(&mut self, n: u64, bit: bool) {
        match &mut self.imp {
            IndexImpl::Bool(index) => {
                index.truthy.append(n, bit);
                index.falsy.append(n, bit);
            }
            IndexImpl::Arith(index) => {
                for slice in &mut index.slices {
                    slice.append(n, bit);
                }
                index.present.append(n, bit);
            }
            IndexImpl::Str(index) => {
                if bit {
                    for stream in index.streams.values_mut() {
                        stream.append(n, bit);
                    }
                }
                index.present.append(n, bit);
            }
            IndexImpl::Addr(index) => {
                for slice in &mut index.slices {
                    slice.append(n, bit);
                }
                index.present.append(n, bit);
            }
            IndexImpl::Port(index) => {
                if bit {
                    for stream in index.streams.values_mut() {
                        stream.append(n, bit);
                    }
                }
                index.present.append(n, bit);
            }
        }
    }

    /// Associate `value` with the given event ID, padding any gap since
    /// the previously appended ID with false.
    pub fn push_back(&mut self, value: &Value, id: EventId) -> Result<()> {
        let expected = self.kind();
        if value.kind() != expected {
            return Err(IndexError::ValueKindMismatch {
                expected,
                actual: value.kind(),
            });
        }
        let id = id.get();
        let size = self.size();
        if id < size {
            return Err(IndexError::IdRegression { id, size });
        }
        if id > size {
            self.append(id - size, false);
        }
        match (&mut self.imp, value) {
            (IndexImpl::Bool(index), Value::Bool(b)) => index.push(*b),
            (IndexImpl::Arith(index), value) => {
                let key = index.key_for(value)?;
                index.push(key);
            }
            (IndexImpl::Str(index), Value::Str(s)) => index.push(s),
            (IndexImpl::Addr(index), Value::Addr(a)) => index.push(a.bits()),
            (IndexImpl::Port(index), Value::Port(p)) => index.push(*p),
            _ => unreachable!("kind checked above"),
        }
        Ok(())
    }

    /// Look up the event-ID bitstream of all positions whose stored value
    /// satisfies `op value`.
    pub fn lookup(&self, op: RelOp, value: &Value) -> Result<EwahBitstream> {
        match &self.imp {
            IndexImpl::Bool(index) => index.lookup(op, value),
            IndexImpl::Arith(index) => index.lookup(op, value),
            IndexImpl::Str(index) => index.lookup(op, value),
            IndexImpl::Addr(index) => index.lookup(op, value),
            IndexImpl::Port(index) => index.lookup(op, value),
        }
    }

    /// The number of bits appended since the last checkpoint.
    pub fn appended(&self) -> u64 {
        self.size() - self.checkpoint_size
    }

    /// Mark the current size as flushed.
    pub fn checkpoint(&mut self) {
        self.checkpoint_size = self.size();
    }

    /// Write the index image: kind discriminant, type-specific dictionary,
    /// then the underlying bitstreams.
    pub fn write_to(&self, w: &mut impl Write) -> std::io::Result<()> {
        wire::put_u8(w, self.kind().discriminant())?;
        match &self.imp {
            IndexImpl::Bool(index) => {
                index.truthy.write_to(w)?;
                index.falsy.write_to(w)?;
            }
            IndexImpl::Arith(index) => {
                wire::put_u64(w, index.slices.len() as u64)?;
                for slice in &index.slices {
                    slice.write_to(w)?;
                }
                index.present.write_to(w)?;
            }
            IndexImpl::Str(index) => {
                let mut keys: Vec<&String> = index.streams.keys().collect();
                keys.sort();
                wire::put_u64(w, keys.len() as u64)?;
                for key in keys {
                    wire::put_bytes(w, key.as_bytes())?;
                    index.streams[key].write_to(w)?;
                }
                index.present.write_to(w)?;
            }
            IndexImpl::Addr(index) => {
                wire::put_u64(w, index.slices.len() as u64)?;
                for slice in &index.slices {
                    slice.write_to(w)?;
                }
                index.present.write_to(w)?;
            }
            IndexImpl::Port(index) => {
                wire::put_u64(w, index.streams.len() as u64)?;
                for (port, stream) in &index.streams {
                    wire::put_u16(w, port.number())?;
                    wire::put_u8(w, port.proto().discriminant())?;
                    stream.write_to(w)?;
                }
                index.present.write_to(w)?;
            }
        }
        Ok(())
    }

    /// Read back an index image written by [`ValueIndex::write_to`].
    pub fn read_from(r: &mut impl Read) -> Result<Self> {
        let discriminant = wire::get_u8(r)?;
        let kind =
            ValueKind::from_discriminant(discriminant).ok_or(IndexError::CorruptImage)?;
        let imp = match kind {
            ValueKind::Bool => IndexImpl::Bool(BoolIndex {
                truthy: EwahBitstream::read_from(r)?,
                falsy: EwahBitstream::read_from(r)?,
            }),
            ValueKind::Int
            | ValueKind::UInt
            | ValueKind::Double
            | ValueKind::TimeSpan
            | ValueKind::TimeStamp => {
                let num_slices = wire::get_u64(r)?;
                if num_slices != 64 {
                    return Err(IndexError::CorruptImage);
                }
                let mut slices = Vec::with_capacity(64);
                for _ in 0..64 {
                    slices.push(EwahBitstream::read_from(r)?);
                }
                IndexImpl::Arith(ArithmeticIndex {
                    kind,
                    slices,
                    present: EwahBitstream::read_from(r)?,
                })
            }
            ValueKind::String => {
                let entries = wire::get_u64(r)?;
                let mut streams = HashMap::default();
                for _ in 0..entries {
                    let key = String::from_utf8(wire::get_bytes(r)?)
                        .map_err(|_| IndexError::CorruptImage)?;
                    streams.insert(key, EwahBitstream::read_from(r)?);
                }
                IndexImpl::Str(StringIndex {
                    streams,
                    present: EwahBitstream::read_from(r)?,
                })
            }
            ValueKind::Address => {
                let num_slices = wire::get_u64(r)?;
                if num_slices != 128 {
                    return Err(IndexError::CorruptImage);
                }
                let mut slices = Vec::with_capacity(128);
                for _ in 0..128 {
                    slices.push(EwahBitstream::read_from(r)?);
                }
                IndexImpl::Addr(AddressIndex {
                    slices,
                    present: EwahBitstream::read_from(r)?,
                })
            }
            ValueKind::Port => {
                let entries = wire::get_u64(r)?;
                let mut streams = BTreeMap::new();
                for _ in 0..entries {
                    let number = wire::get_u16(r)?;
                    let proto = Proto::from_discriminant(wire::get_u8(r)?)
                        .ok_or(IndexError::CorruptImage)?;
                    streams.insert(Port::new(number, proto), EwahBitstream::read_from(r)?);
                }
                IndexImpl::Port(PortIndex {
                    streams,
                    present: EwahBitstream::read_from(r)?,
                })
            }
            other => return Err(IndexError::UnsupportedKind(other)),
        };
        let mut index = Self {
            checkpoint_size: 0,
            imp,
        };
        index.checkpoint_size = index.size();
        Ok(index)
    }
}

fn unsupported(kind: ValueKind, op: RelOp) -> IndexError {
    IndexError::UnsupportedOperator { kind, op }
}

fn mismatch(expected: ValueKind, actual: ValueKind) -> IndexError {
    IndexError::ValueKindMismatch { expected, actual }
}

/// A dictionary stream, grown lazily, padded to the index size on demand.
fn padded(stream: &EwahBitstream, size: u64) -> EwahBitstream {
    let mut stream = stream.clone();
    stream.append(size - stream.size(), false);
    stream
}

/// One bitstream per truth value.
#[derive(Debug, Default, Clone, PartialEq)]
struct BoolIndex {
    truthy: EwahBitstream,
    falsy: EwahBitstream,
}

impl BoolIndex {
    fn push(&mut self, bit: bool) {
        self.truthy.push_back(bit);
        self.falsy.push_back(!bit);
    }

    fn lookup(&self, op: RelOp, value: &Value) -> Result<EwahBitstream> {
        let Value::Bool(bit) = value else {
            return Err(mismatch(ValueKind::Bool, value.kind()));
        };
        let stream = match op {
            RelOp::Equal => {
                if *bit {
                    &self.truthy
                } else {
                    &self.falsy
                }
            }
            RelOp::NotEqual => {
                if *bit {
                    &self.falsy
                } else {
                    &self.truthy
                }
            }
            other => return Err(unsupported(ValueKind::Bool, other)),
        };
        Ok(stream.clone())
    }
}

/// A bit-sliced index over an order-preserving 64-bit key: slice `k` holds,
/// for every row, bit `63 - k` of the row's key. Range lookups resolve in
/// one pass from the most significant slice down.
#[derive(Debug, Clone, PartialEq)]
struct ArithmeticIndex {
    kind: ValueKind,
    slices: Vec<EwahBitstream>,
    present: EwahBitstream,
}

impl ArithmeticIndex {
    fn new(kind: ValueKind) -> Self {
        Self {
            kind,
            slices: vec![EwahBitstream::default(); 64],
            present: EwahBitstream::default(),
        }
    }

    /// Map a value to a key whose unsigned order matches the value order.
    fn key_for(&self, value: &Value) -> Result<u64> {
        let key = match (self.kind, value) {
            (ValueKind::Int, Value::Int(v)) => order_key_i64(*v),
            (ValueKind::UInt, Value::UInt(v)) => *v,
            (ValueKind::Double, Value::Double(v)) => order_key_f64(*v),
            (ValueKind::TimeSpan, Value::Span(v)) => order_key_i64(v.get()),
            (ValueKind::TimeStamp, Value::Stamp(v)) => order_key_i64(v.get()),
            _ => return Err(mismatch(self.kind, value.kind())),
        };
        Ok(key)
    }

    fn push(&mut self, key: u64) {
        for (k, slice) in self.slices.iter_mut().enumerate() {
            slice.push_back(key >> (63 - k) & 1 == 1);
        }
        self.present.push_back(true);
    }

    fn lookup(&self, op: RelOp, value: &Value) -> Result<EwahBitstream> {
        if !matches!(
            op,
            RelOp::Equal
                | RelOp::NotEqual
                | RelOp::Less
                | RelOp::LessEqual
                | RelOp::Greater
                | RelOp::GreaterEqual
        ) {
            return Err(unsupported(self.kind, op));
        }
        let key = self.key_for(value)?;

        let mut equal = self.present.clone();
        let mut less = EwahBitstream::default();
        let mut greater = EwahBitstream::default();
        for (k, slice) in self.slices.iter().enumerate() {
            if key >> (63 - k) & 1 == 1 {
                less = ops::or(&less, &ops::nand(&equal, slice));
                equal = ops::and(&equal, slice);
            } else {
                greater = ops::or(&greater, &ops::and(&equal, slice));
                equal = ops::nand(&equal, slice);
            }
            if equal.count() == 0 {
                break;
            }
        }

        let result = match op {
            RelOp::Equal => equal,
            RelOp::NotEqual => ops::nand(&self.present, &equal),
            RelOp::Less => less,
            RelOp::LessEqual => ops::or(&less, &equal),
            RelOp::Greater => greater,
            RelOp::GreaterEqual => ops::or(&greater, &equal),
            _ => unreachable!("filtered above"),
        };
        Ok(padded(&result, self.present.size()))
    }
}

fn order_key_i64(v: i64) -> u64 {
    (v as u64) ^ MSB_ONE
}

fn order_key_f64(v: f64) -> u64 {
    let bits = v.to_bits();
    if bits & MSB_ONE != 0 {
        !bits
    } else {
        bits | MSB_ONE
    }
}

/// One bitstream per distinct string.
#[derive(Debug, Default, Clone, PartialEq)]
struct StringIndex {
    streams: HashMap<String, EwahBitstream>,
    present: EwahBitstream,
}

impl StringIndex {
    fn push(&mut self, s: &str) {
        let size = self.present.size();
        let stream = self.streams.entry(s.to_string()).or_default();
        stream.append(size - stream.size(), false);
        stream.push_back(true);
        self.present.push_back(true);
    }

    /// OR together the streams of every dictionary entry satisfying the
    /// predicate.
    fn merge(&self, predicate: impl Fn(&str) -> bool) -> EwahBitstream {
        let mut result = EwahBitstream::default();
        for (key, stream) in &self.streams {
            if predicate(key) {
                result = ops::or(&result, stream);
            }
        }
        padded(&result, self.present.size())
    }

    fn lookup(&self, op: RelOp, value: &Value) -> Result<EwahBitstream> {
        let size = self.present.size();
        let positive = match (op, value) {
            (RelOp::Equal | RelOp::NotEqual, Value::Str(s)) => match self.streams.get(s) {
                Some(stream) => padded(stream, size),
                None => EwahBitstream::filled(size, false),
            },
            (RelOp::In | RelOp::NotIn, Value::Str(s)) => self.merge(|key| s.contains(key)),
            (RelOp::In | RelOp::NotIn, Value::Pattern(p)) => self.merge(|key| p.search(key)),
            (RelOp::Ni | RelOp::NotNi, Value::Str(s)) => {
                self.merge(|key| key.contains(s.as_str()))
            }
            (RelOp::Match | RelOp::NotMatch, Value::Pattern(p)) => {
                self.merge(|key| p.matches(key))
            }
            (
                RelOp::Equal | RelOp::NotEqual | RelOp::In | RelOp::NotIn | RelOp::Ni
                | RelOp::NotNi | RelOp::Match | RelOp::NotMatch,
                other,
            ) => return Err(mismatch(ValueKind::String, other.kind())),
            (other, _) => return Err(unsupported(ValueKind::String, other)),
        };
        if op.is_negated() {
            Ok(ops::nand(&self.present, &positive))
        } else {
            Ok(positive)
        }
    }
}

/// One bitstream per bit of the 128-bit address image.
#[derive(Debug, Clone, PartialEq)]
struct AddressIndex {
    slices: Vec<EwahBitstream>,
    present: EwahBitstream,
}

impl Default for AddressIndex {
    fn default() -> Self {
        Self {
            slices: vec![EwahBitstream::default(); 128],
            present: EwahBitstream::default(),
        }
    }
}

impl AddressIndex {
    fn push(&mut self, bits: u128) {
        for (k, slice) in self.slices.iter_mut().enumerate() {
            slice.push_back(bits >> (127 - k) & 1 == 1);
        }
        self.present.push_back(true);
    }

    /// Rows whose top `prefix_len` address bits equal those of `bits`.
    fn match_prefix(&self, bits: u128, prefix_len: u8) -> EwahBitstream {
        let mut result = self.present.clone();
        for k in 0..prefix_len.min(128) as usize {
            if bits >> (127 - k) & 1 == 1 {
                result = ops::and(&result, &self.slices[k]);
            } else {
                result = ops::nand(&result, &self.slices[k]);
            }
            if result.count() == 0 {
                break;
            }
        }
        padded(&result, self.present.size())
    }

    fn lookup(&self, op: RelOp, value: &Value) -> Result<EwahBitstream> {
        match (op, value) {
            (RelOp::Equal, Value::Addr(a)) => Ok(self.match_prefix(a.bits(), 128)),
            (RelOp::NotEqual, Value::Addr(a)) => {
                Ok(ops::nand(&self.present, &self.match_prefix(a.bits(), 128)))
            }
            (RelOp::In, Value::Subnet(s)) => {
                Ok(self.match_prefix(s.network().bits(), s.bit_length()))
            }
            (RelOp::NotIn, Value::Subnet(s)) => Ok(ops::nand(
                &self.present,
                &self.match_prefix(s.network().bits(), s.bit_length()),
            )),
            (RelOp::Equal | RelOp::NotEqual | RelOp::In | RelOp::NotIn, other) => {
                Err(mismatch(ValueKind::Address, other.kind()))
            }
            (other, _) => Err(unsupported(ValueKind::Address, other)),
        }
    }
}

/// One bitstream per (number, proto) tuple, ordered for range lookups.
#[derive(Debug, Default, Clone, PartialEq)]
struct PortIndex {
    streams: BTreeMap<Port, EwahBitstream>,
    present: EwahBitstream,
}

impl PortIndex {
    fn push(&mut self, port: Port) {
        let size = self.present.size();
        let stream = self.streams.entry(port).or_default();
        stream.append(size - stream.size(), false);
        stream.push_back(true);
        self.present.push_back(true);
    }

    fn merge<'a>(&self, streams: impl Iterator<Item = &'a EwahBitstream>) -> EwahBitstream {
        let mut result = EwahBitstream::default();
        for stream in streams {
            result = ops::or(&result, stream);
        }
        padded(&result, self.present.size())
    }

    fn lookup(&self, op: RelOp, value: &Value) -> Result<EwahBitstream> {
        let Value::Port(port) = value else {
            return Err(mismatch(ValueKind::Port, value.kind()));
        };
        let size = self.present.size();
        let result = match op {
            RelOp::Equal | RelOp::NotEqual => {
                let equal = match self.streams.get(port) {
                    Some(stream) => padded(stream, size),
                    None => EwahBitstream::filled(size, false),
                };
                if op == RelOp::NotEqual {
                    ops::nand(&self.present, &equal)
                } else {
                    equal
                }
            }
            RelOp::Less => self.merge(self.streams.range(..*port).map(|(_, s)| s)),
            RelOp::LessEqual => self.merge(self.streams.range(..=*port).map(|(_, s)| s)),
            RelOp::Greater => self.merge(
                self.streams
                    .range((std::ops::Bound::Excluded(*port), std::ops::Bound::Unbounded))
                    .map(|(_, s)| s),
            ),
            RelOp::GreaterEqual => self.merge(self.streams.range(*port..).map(|(_, s)| s)),
            other => return Err(unsupported(ValueKind::Port, other)),
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_core::{Address, Pattern, Subnet, TimeStamp};

    fn ones(stream: &EwahBitstream) -> Vec<u64> {
        stream.ones().collect()
    }

    #[test]
    fn test_reserved_position() {
        let index = ValueIndex::for_kind(ValueKind::Bool).unwrap();
        assert_eq!(index.size(), 1);
        let hits = index.lookup(RelOp::Equal, &Value::Bool(true)).unwrap();
        assert!(!hits.get(0));
    }

    #[test]
    fn test_unsupported_kind() {
        assert!(ValueIndex::for_kind(ValueKind::Record).is_err());
        assert!(ValueIndex::for_kind(ValueKind::Invalid).is_err());
    }

    #[test]
    fn test_bool_index() {
        let mut index = ValueIndex::for_kind(ValueKind::Bool).unwrap();
        index.push_back(&Value::Bool(true), EventId::new(1)).unwrap();
        index.push_back(&Value::Bool(false), EventId::new(2)).unwrap();
        index.push_back(&Value::Bool(true), EventId::new(4)).unwrap();
        assert_eq!(index.size(), 5);

        let truthy = index.lookup(RelOp::Equal, &Value::Bool(true)).unwrap();
        assert_eq!(ones(&truthy), vec![1, 4]);
        let falsy = index.lookup(RelOp::Equal, &Value::Bool(false)).unwrap();
        assert_eq!(ones(&falsy), vec![2]);
        let not_true = index.lookup(RelOp::NotEqual, &Value::Bool(true)).unwrap();
        assert_eq!(ones(&not_true), vec![2]);

        assert!(matches!(
            index.lookup(RelOp::Less, &Value::Bool(true)),
            Err(IndexError::UnsupportedOperator { .. })
        ));
        assert!(matches!(
            index.lookup(RelOp::Equal, &Value::UInt(1)),
            Err(IndexError::ValueKindMismatch { .. })
        ));
    }

    #[test]
    fn test_id_ordering() {
        let mut index = ValueIndex::for_kind(ValueKind::Bool).unwrap();
        index.push_back(&Value::Bool(true), EventId::new(3)).unwrap();
        let result = index.push_back(&Value::Bool(true), EventId::new(2));
        assert!(matches!(result, Err(IndexError::IdRegression { .. })));
    }

    #[test]
    fn test_arithmetic_index_uint() {
        let mut index = ValueIndex::for_kind(ValueKind::UInt).unwrap();
        for (id, v) in [(1u64, 10u64), (2, 25), (3, 10), (4, 7), (6, 100)] {
            index.push_back(&Value::UInt(v), EventId::new(id)).unwrap();
        }
        assert_eq!(index.size(), 7);

        let eq = index.lookup(RelOp::Equal, &Value::UInt(10)).unwrap();
        assert_eq!(ones(&eq), vec![1, 3]);
        let ne = index.lookup(RelOp::NotEqual, &Value::UInt(10)).unwrap();
        assert_eq!(ones(&ne), vec![2, 4, 6]);
        let lt = index.lookup(RelOp::Less, &Value::UInt(25)).unwrap();
        assert_eq!(ones(&lt), vec![1, 3, 4]);
        let le = index.lookup(RelOp::LessEqual, &Value::UInt(25)).unwrap();
        assert_eq!(ones(&le), vec![1, 2, 3, 4]);
        let gt = index.lookup(RelOp::Greater, &Value::UInt(25)).unwrap();
        assert_eq!(ones(&gt), vec![6]);
        let ge = index.lookup(RelOp::GreaterEqual, &Value::UInt(25)).unwrap();
        assert_eq!(ones(&ge), vec![2, 6]);

        // Padded gaps (ids 0 and 5) never match, not even negated ops.
        assert!(!ne.get(0));
        assert!(!ne.get(5));
    }

    #[test]
    fn test_arithmetic_index_int_signs() {
        let mut index = ValueIndex::for_kind(ValueKind::Int).unwrap();
        for (id, v) in [(1u64, -5i64), (2, 0), (3, 5), (4, -4711)] {
            index.push_back(&Value::Int(v), EventId::new(id)).unwrap();
        }

        let lt = index.lookup(RelOp::Less, &Value::Int(0)).unwrap();
        assert_eq!(ones(&lt), vec![1, 4]);
        let ge = index.lookup(RelOp::GreaterEqual, &Value::Int(-5)).unwrap();
        assert_eq!(ones(&ge), vec![1, 2, 3]);
        let eq = index.lookup(RelOp::Equal, &Value::Int(-4711)).unwrap();
        assert_eq!(ones(&eq), vec![4]);
    }

    #[test]
    fn test_arithmetic_index_double() {
        let mut index = ValueIndex::for_kind(ValueKind::Double).unwrap();
        for (id, v) in [(1u64, -1.5f64), (2, 0.0), (3, 0.25), (4, 1e9)] {
            index.push_back(&Value::Double(v), EventId::new(id)).unwrap();
        }

        let lt = index.lookup(RelOp::Less, &Value::Double(0.25)).unwrap();
        assert_eq!(ones(&lt), vec![1, 2]);
        let ge = index
            .lookup(RelOp::GreaterEqual, &Value::Double(0.0))
            .unwrap();
        assert_eq!(ones(&ge), vec![2, 3, 4]);
    }

    #[test]
    fn test_arithmetic_index_time() {
        let mut index = ValueIndex::for_kind(ValueKind::TimeStamp).unwrap();
        for (id, ns) in [(1u64, 1_000i64), (2, 2_000), (3, 3_000)] {
            index
                .push_back(&Value::Stamp(TimeStamp::new(ns)), EventId::new(id))
                .unwrap();
        }
        let le = index
            .lookup(RelOp::LessEqual, &Value::Stamp(TimeStamp::new(2_000)))
            .unwrap();
        assert_eq!(ones(&le), vec![1, 2]);

        // Mismatched discriminant is a failure, not a miss.
        assert!(index.lookup(RelOp::Equal, &Value::UInt(2_000)).is_err());
    }

    #[test]
    fn test_string_index() {
        let mut index = ValueIndex::for_kind(ValueKind::String).unwrap();
        for (id, s) in [(1u64, "foo"), (2, "bar"), (3, "foo"), (4, "baz"), (5, "qux")] {
            index.push_back(&Value::from(s), EventId::new(id)).unwrap();
        }

        let eq = index.lookup(RelOp::Equal, &Value::from("foo")).unwrap();
        assert_eq!(ones(&eq), vec![1, 3]);
        assert_eq!(eq.size(), 6);
        let ne = index.lookup(RelOp::NotEqual, &Value::from("foo")).unwrap();
        assert_eq!(ones(&ne), vec![2, 4, 5]);
        let miss = index.lookup(RelOp::Equal, &Value::from("nope")).unwrap();
        assert_eq!(miss.count(), 0);
        assert_eq!(miss.size(), 6);

        // "bar" in "barbaric" but "baz" is not.
        let within = index
            .lookup(RelOp::In, &Value::from("barbaric"))
            .unwrap();
        assert_eq!(ones(&within), vec![2]);

        // Rows containing "ba" as a substring.
        let containing = index.lookup(RelOp::Ni, &Value::from("ba")).unwrap();
        assert_eq!(ones(&containing), vec![2, 4]);
        let not_containing = index.lookup(RelOp::NotNi, &Value::from("ba")).unwrap();
        assert_eq!(ones(&not_containing), vec![1, 3, 5]);

        let pattern = Value::from(Pattern::new("b.*").unwrap());
        let matching = index.lookup(RelOp::Match, &pattern).unwrap();
        assert_eq!(ones(&matching), vec![2, 4]);
        let not_matching = index.lookup(RelOp::NotMatch, &pattern).unwrap();
        assert_eq!(ones(&not_matching), vec![1, 3, 5]);

        assert!(index.lookup(RelOp::Less, &Value::from("foo")).is_err());
        assert!(index.lookup(RelOp::Match, &Value::from("foo")).is_err());
    }

    #[test]
    fn test_address_index() {
        let mut index = ValueIndex::for_kind(ValueKind::Address).unwrap();
        let addrs = ["10.1.1.2", "10.1.1.3", "192.168.0.1", "dead::beef"];
        for (i, a) in addrs.iter().enumerate() {
            let addr: Address = a.parse().unwrap();
            index
                .push_back(&Value::Addr(addr), EventId::new(i as u64 + 1))
                .unwrap();
        }

        let addr: Address = "10.1.1.2".parse().unwrap();
        let eq = index.lookup(RelOp::Equal, &Value::Addr(addr)).unwrap();
        assert_eq!(ones(&eq), vec![1]);
        let ne = index.lookup(RelOp::NotEqual, &Value::Addr(addr)).unwrap();
        assert_eq!(ones(&ne), vec![2, 3, 4]);

        let net: Subnet = "10.0.0.0/8".parse().unwrap();
        let within = index.lookup(RelOp::In, &Value::Subnet(net)).unwrap();
        assert_eq!(ones(&within), vec![1, 2]);
        let outside = index.lookup(RelOp::NotIn, &Value::Subnet(net)).unwrap();
        assert_eq!(ones(&outside), vec![3, 4]);

        let v6net: Subnet = "dead::/16".parse().unwrap();
        let v6 = index.lookup(RelOp::In, &Value::Subnet(v6net)).unwrap();
        assert_eq!(ones(&v6), vec![4]);

        assert!(index.lookup(RelOp::In, &Value::Addr(addr)).is_err());
        assert!(index.lookup(RelOp::Less, &Value::Addr(addr)).is_err());
    }

    #[test]
    fn test_port_index_equality() {
        let mut index = ValueIndex::for_kind(ValueKind::Port).unwrap();
        let http = Port::new(80, Proto::Tcp);
        let https = Port::new(443, Proto::Tcp);
        index.push_back(&Value::Port(http), EventId::new(1)).unwrap();
        index.push_back(&Value::Port(https), EventId::new(2)).unwrap();
        index.push_back(&Value::Port(http), EventId::new(3)).unwrap();

        let eq = index.lookup(RelOp::Equal, &Value::Port(http)).unwrap();
        assert_eq!(ones(&eq), vec![1, 3]);
        assert_eq!(eq.size(), 4);
    }

    #[test]
    fn test_port_index_ranges() {
        let mut index = ValueIndex::for_kind(ValueKind::Port).unwrap();
        for (id, number) in [(1u64, 22u16), (2, 80), (3, 443), (4, 8080)] {
            index
                .push_back(&Value::Port(Port::new(number, Proto::Tcp)), EventId::new(id))
                .unwrap();
        }

        let threshold = Value::Port(Port::new(1024, Proto::Tcp));
        let lt = index.lookup(RelOp::Less, &threshold).unwrap();
        assert_eq!(ones(&lt), vec![1, 2, 3]);
        let ge = index.lookup(RelOp::GreaterEqual, &threshold).unwrap();
        assert_eq!(ones(&ge), vec![4]);
        let le = index
            .lookup(RelOp::LessEqual, &Value::Port(Port::new(80, Proto::Tcp)))
            .unwrap();
        assert_eq!(ones(&le), vec![1, 2]);
    }

    #[test]
    fn test_checkpointing() {
        let mut index = ValueIndex::for_kind(ValueKind::UInt).unwrap();
        assert_eq!(index.appended(), 1);
        index.checkpoint();
        assert_eq!(index.appended(), 0);
        index.push_back(&Value::UInt(1), EventId::new(1)).unwrap();
        index.push_back(&Value::UInt(2), EventId::new(5)).unwrap();
        assert_eq!(index.appended(), 5);
        index.checkpoint();
        assert_eq!(index.appended(), 0);
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut indexes = Vec::new();

        let mut index = ValueIndex::for_kind(ValueKind::Bool).unwrap();
        index.push_back(&Value::Bool(true), EventId::new(1)).unwrap();
        index.push_back(&Value::Bool(false), EventId::new(3)).unwrap();
        indexes.push(index);

        let mut index = ValueIndex::for_kind(ValueKind::UInt).unwrap();
        index.push_back(&Value::UInt(42), EventId::new(1)).unwrap();
        index.push_back(&Value::UInt(7), EventId::new(2)).unwrap();
        indexes.push(index);

        let mut index = ValueIndex::for_kind(ValueKind::String).unwrap();
        index.push_back(&Value::from("foo"), EventId::new(1)).unwrap();
        index.push_back(&Value::from("bar"), EventId::new(2)).unwrap();
        indexes.push(index);

        let mut index = ValueIndex::for_kind(ValueKind::Address).unwrap();
        index
            .push_back(
                &Value::Addr("10.1.1.2".parse().unwrap()),
                EventId::new(1),
            )
            .unwrap();
        indexes.push(index);

        let mut index = ValueIndex::for_kind(ValueKind::Port).unwrap();
        index
            .push_back(&Value::Port(Port::new(80, Proto::Tcp)), EventId::new(1))
            .unwrap();
        indexes.push(index);

        for index in indexes {
            let mut image = Vec::new();
            index.write_to(&mut image).unwrap();
            let restored = ValueIndex::read_from(&mut image.as_slice()).unwrap();
            assert_eq!(restored.kind(), index.kind());
            assert_eq!(restored.size(), index.size());
            assert_eq!(restored.appended(), 0);
            assert_eq!(restored.imp, index.imp);
        }
    }

    #[test]
    fn test_lookup_equivalence_with_scan() {
        // Property: evaluating the predicate against each stored value and
        // OR-ing the matches equals the index lookup.
        let values: Vec<(u64, u64)> =
            vec![(1, 3), (2, 99), (3, 12), (4, 3), (5, 1000), (7, 12), (9, 0)];
        let mut index = ValueIndex::for_kind(ValueKind::UInt).unwrap();
        for (id, v) in &values {
            index.push_back(&Value::UInt(*v), EventId::new(*id)).unwrap();
        }

        for op in [
            RelOp::Equal,
            RelOp::NotEqual,
            RelOp::Less,
            RelOp::LessEqual,
            RelOp::Greater,
            RelOp::GreaterEqual,
        ] {
            for probe in [0u64, 1, 3, 12, 99, 500, 1000, 2000] {
                let rhs = Value::UInt(probe);
                let looked_up = index.lookup(op, &rhs).unwrap();
                let mut scanned = EwahBitstream::filled(index.size(), false);
                let mut expected = Vec::new();
                for (id, v) in &values {
                    if op.holds(&Value::UInt(*v), &rhs) {
                        expected.push(*id);
                    }
                }
                for id in &expected {
                    let mut single = EwahBitstream::filled(*id, false);
                    single.push_back(true);
                    scanned = ops::or(&scanned, &single);
                }
                assert_eq!(
                    ones(&looked_up),
                    expected,
                    "op {op} probe {probe}"
                );
                assert_eq!(scanned.count(), looked_up.count());
            }
        }
    }
}
