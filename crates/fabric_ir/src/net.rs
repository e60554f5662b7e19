//! Bus, slice, constant and concatenation value types.
//!
//! These are plain values: a [`Bus`] names a port of a module or a pin of an
//! instance inside a module, a [`Slice`] is a non-owning bit range of a bus,
//! and a [`Net`] is any of those plus constants and concatenations. Anything
//! that needs bus widths (range checks, collapsing a full-range slice back to
//! its bus, merging adjacent runs) goes through
//! [`Fabric`](crate::Fabric)'s net operations.

use crate::ids::{InstanceId, ModuleId, PortId};
use serde::{Deserialize, Serialize};

/// Which bus inside a module scope.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum BusKind {
    /// A port of the scope module.
    Port(PortId),
    /// A pin of an instance in the scope module, mirroring a port of its model.
    Pin(InstanceId, PortId),
}

/// A bus, addressed by the module whose connection graph it belongs to.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Bus {
    /// The module scope.
    pub scope: ModuleId,
    /// The bus inside the scope.
    pub kind: BusKind,
}

impl Bus {
    /// A port of `scope`.
    pub fn port(scope: ModuleId, port: PortId) -> Self {
        Self {
            scope,
            kind: BusKind::Port(port),
        }
    }

    /// The pin of `instance` (inside `scope`) that mirrors `port` of its model.
    pub fn pin(scope: ModuleId, instance: InstanceId, port: PortId) -> Self {
        Self {
            scope,
            kind: BusKind::Pin(instance, port),
        }
    }

    /// Returns the model port this bus mirrors (or is).
    pub fn port_id(&self) -> PortId {
        match self.kind {
            BusKind::Port(p) | BusKind::Pin(_, p) => p,
        }
    }
}

/// A half-open bit range `[start, end)` of a bus.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Slice {
    /// The sliced bus.
    pub bus: Bus,
    /// First bit.
    pub start: u32,
    /// One past the last bit.
    pub end: u32,
}

impl Slice {
    /// Number of bits in the slice.
    pub fn width(&self) -> u32 {
        self.end - self.start
    }
}

/// The value of one constant bit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ConstBit {
    /// Explicitly not connected. Never produces a graph edge.
    Unconnected,
    /// Logic zero.
    Zero,
    /// Logic one.
    One,
}

/// A constant net: either unconnected, or a little-endian bit vector of any
/// width.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Const {
    width: u32,
    bits: Option<Vec<bool>>,
}

impl Const {
    /// An unconnected constant of `width` bits.
    pub fn unconnected(width: u32) -> Self {
        Self { width, bits: None }
    }

    /// A valued constant; bit `i` is `(value >> i) & 1`, bits past 63 are zero.
    pub fn value(value: u64, width: u32) -> Self {
        Self::from_bits((0..width).map(|i| i < 64 && (value >> i) & 1 == 1))
    }

    /// A valued constant from its bits, least significant first.
    pub fn from_bits(bits: impl IntoIterator<Item = bool>) -> Self {
        let bits: Vec<bool> = bits.into_iter().collect();
        Self {
            width: bits.len() as u32,
            bits: Some(bits),
        }
    }

    /// Number of bits.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns `true` if this constant is unconnected.
    pub fn is_unconnected(&self) -> bool {
        self.bits.is_none()
    }

    /// Returns bit `index`.
    pub fn bit(&self, index: u32) -> ConstBit {
        match &self.bits {
            None => ConstBit::Unconnected,
            Some(bits) if bits.get(index as usize).copied().unwrap_or(false) => ConstBit::One,
            Some(_) => ConstBit::Zero,
        }
    }

    /// Appends `next` above this constant when both are of the same kind.
    pub fn merge(self, next: Const) -> Option<Const> {
        match (self.bits, next.bits) {
            (None, None) => Some(Const::unconnected(self.width + next.width)),
            (Some(a), Some(b)) => Some(Const::from_bits(a.into_iter().chain(b))),
            _ => None,
        }
    }
}

impl From<ConstBit> for Const {
    fn from(bit: ConstBit) -> Self {
        match bit {
            ConstBit::Unconnected => Const::unconnected(1),
            ConstBit::Zero => Const::value(0, 1),
            ConstBit::One => Const::value(1, 1),
        }
    }
}

/// One bit of a bus.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct BitRef {
    /// The bus.
    pub bus: Bus,
    /// Bit index.
    pub index: u32,
}

/// One bit of any net.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Bit {
    /// A bus bit.
    Net(BitRef),
    /// A constant bit.
    Const(ConstBit),
}

/// Any bus-like value usable as a connection source or sink.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Net {
    /// A whole bus.
    Bus(Bus),
    /// A bit range of a bus.
    Slice(Slice),
    /// A constant.
    Const(Const),
    /// An ordered, least-significant-first aggregate.
    Concat(Vec<Net>),
}

impl Net {
    /// Returns `true` for an all-unconnected constant.
    pub fn is_unconnected(&self) -> bool {
        matches!(self, Net::Const(c) if c.is_unconnected())
    }
}

impl From<Bus> for Net {
    fn from(bus: Bus) -> Self {
        Net::Bus(bus)
    }
}

impl From<Slice> for Net {
    fn from(slice: Slice) -> Self {
        Net::Slice(slice)
    }
}

impl From<Const> for Net {
    fn from(c: Const) -> Self {
        Net::Const(c)
    }
}

impl From<BitRef> for Net {
    fn from(bit: BitRef) -> Self {
        Net::Slice(Slice {
            bus: bit.bus,
            start: bit.index,
            end: bit.index + 1,
        })
    }
}

impl From<Bit> for Net {
    fn from(bit: Bit) -> Self {
        match bit {
            Bit::Net(b) => b.into(),
            Bit::Const(c) => Net::Const(c.into()),
        }
    }
}

impl From<Vec<Net>> for Net {
    fn from(items: Vec<Net>) -> Self {
        Net::Concat(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn const_bits() {
        let c = Const::value(0b101, 3);
        assert_eq!(c.bit(0), ConstBit::One);
        assert_eq!(c.bit(1), ConstBit::Zero);
        assert_eq!(c.bit(2), ConstBit::One);
        assert_eq!(Const::unconnected(4).bit(3), ConstBit::Unconnected);
        assert_eq!(Const::value(u64::MAX, 80).bit(70), ConstBit::Zero);
    }

    #[test]
    fn const_merge_same_kind() {
        let merged = Const::value(0b1, 1).merge(Const::value(0b10, 2)).unwrap();
        assert_eq!(merged, Const::value(0b101, 3));
        let open = Const::unconnected(2).merge(Const::unconnected(3)).unwrap();
        assert_eq!(open, Const::unconnected(5));
    }

    #[test]
    fn const_merge_rejects_mixed_kinds_at_any_width() {
        assert!(Const::unconnected(1).merge(Const::value(0, 1)).is_none());
        let wide = Const::value(0, 40).merge(Const::value(1, 30)).unwrap();
        assert_eq!(wide.width(), 70);
        assert_eq!(wide.bit(40), ConstBit::One);
        assert_eq!(wide.bit(39), ConstBit::Zero);
    }

    #[test]
    fn bitref_into_single_bit_slice() {
        let bus = Bus::port(ModuleId::from_raw(0), PortId::from_raw(1));
        let net: Net = BitRef { bus, index: 3 }.into();
        assert_eq!(
            net,
            Net::Slice(Slice {
                bus,
                start: 3,
                end: 4
            })
        );
    }
}
