//! Net operations: width, slicing, concatenation, connection and queries.
//!
//! Slices are re-based onto the original bus and collapse back to the bus
//! when they cover it entirely. Concatenations are flattened and adjacent
//! compatible runs are merged eagerly, so `concat` of a bus split into bits
//! yields the bus again.

use crate::connection::{BitKey, Driver, SourceMode};
use crate::error::{IrError, IrResult};
use crate::ids::ModuleId;
use crate::net::{Bit, BitRef, Bus, BusKind, Const, ConstBit, Net, Slice};
use crate::port::{Port, PortDirection};
use crate::Fabric;
use std::ops::Range;

impl Fabric {
    /// Returns the model port a bus mirrors.
    pub fn bus_port(&self, bus: Bus) -> &Port {
        let scope = self.module(bus.scope);
        match bus.kind {
            BusKind::Port(p) => scope.port(p),
            BusKind::Pin(i, p) => self.module(scope.instance(i).model).port(p),
        }
    }

    /// Width of a bus.
    pub fn bus_width(&self, bus: Bus) -> u32 {
        self.bus_port(bus).width
    }

    /// Returns `true` if `bus` can drive other nets in its scope: an input
    /// port of the scope module, or an output pin of an instance.
    pub fn is_source(&self, bus: Bus) -> bool {
        let dir = self.bus_port(bus).direction;
        match bus.kind {
            BusKind::Port(_) => dir == PortDirection::Input,
            BusKind::Pin(..) => dir == PortDirection::Output,
        }
    }

    /// Returns `true` if `bus` can be driven inside its scope.
    pub fn is_sink(&self, bus: Bus) -> bool {
        !self.is_source(bus)
    }

    /// Human-readable `module.port` or `module.instance.port` path.
    pub fn describe_bus(&self, bus: Bus) -> String {
        let scope = self.module(bus.scope);
        match bus.kind {
            BusKind::Port(p) => format!("{}.{}", scope.name(), scope.port(p).name),
            BusKind::Pin(i, p) => {
                let inst = scope.instance(i);
                format!(
                    "{}.{}.{}",
                    scope.name(),
                    inst.name,
                    self.module(inst.model).port(p).name
                )
            }
        }
    }

    /// Human-readable description of any net.
    pub fn describe(&self, net: &Net) -> String {
        match net {
            Net::Bus(bus) => self.describe_bus(*bus),
            Net::Slice(s) if s.width() == 1 => format!("{}[{}]", self.describe_bus(s.bus), s.start),
            Net::Slice(s) => format!("{}[{}:{}]", self.describe_bus(s.bus), s.end - 1, s.start),
            Net::Const(c) if c.is_unconnected() => format!("{}'bx", c.width()),
            Net::Const(c) => {
                let bits: String = (0..c.width())
                    .rev()
                    .map(|i| match c.bit(i) {
                        ConstBit::One => '1',
                        _ => '0',
                    })
                    .collect();
                format!("{}'b{}", c.width(), bits)
            }
            Net::Concat(items) => {
                let parts: Vec<String> = items.iter().rev().map(|n| self.describe(n)).collect();
                format!("{{{}}}", parts.join(", "))
            }
        }
    }

    fn describe_bit(&self, bit: BitRef) -> String {
        format!("{}[{}]", self.describe_bus(bit.bus), bit.index)
    }

    /// Width of a net.
    pub fn width(&self, net: &Net) -> u32 {
        match net {
            Net::Bus(bus) => self.bus_width(*bus),
            Net::Slice(s) => s.width(),
            Net::Const(c) => c.width(),
            Net::Concat(items) => items.iter().map(|n| self.width(n)).sum(),
        }
    }

    /// Slices `range` out of `net`, re-basing onto the underlying bus.
    pub fn slice(&self, net: &Net, range: Range<u32>) -> IrResult<Net> {
        let width = self.width(net);
        if range.start > range.end || range.end > width {
            return Err(IrError::SliceOutOfRange {
                net: self.describe(net),
                start: range.start,
                end: range.end,
                width,
            });
        }
        if range.start == 0 && range.end == width {
            return Ok(net.clone());
        }
        match net {
            Net::Bus(bus) => Ok(Net::Slice(Slice {
                bus: *bus,
                start: range.start,
                end: range.end,
            })),
            Net::Slice(s) => Ok(self.collapse(Slice {
                bus: s.bus,
                start: s.start + range.start,
                end: s.start + range.end,
            })),
            Net::Const(c) if c.is_unconnected() => Ok(Net::Const(Const::unconnected(range.len() as u32))),
            Net::Const(c) => Ok(Net::Const(Const::from_bits(range.map(|i| c.bit(i) == ConstBit::One)))),
            Net::Concat(items) => {
                let mut parts = Vec::new();
                let mut base = 0;
                for item in items {
                    let w = self.width(item);
                    let lo = range.start.max(base);
                    let hi = range.end.min(base + w);
                    if lo < hi {
                        parts.push(self.slice(item, lo - base..hi - base)?);
                    }
                    base += w;
                }
                Ok(self.concat(parts))
            }
        }
    }

    /// Returns bit `index` of `net`.
    pub fn bit(&self, net: &Net, index: u32) -> IrResult<Net> {
        self.slice(net, index..index + 1)
    }

    fn collapse(&self, slice: Slice) -> Net {
        if slice.start == 0 && slice.end == self.bus_width(slice.bus) {
            Net::Bus(slice.bus)
        } else {
            Net::Slice(slice)
        }
    }

    /// Concatenates nets, least significant first.
    ///
    /// Nested concatenations are flattened, zero-width items dropped, and
    /// contiguous runs of one bus or of compatible constants merged. A single
    /// surviving item is returned as-is; an empty result is a zero-width
    /// unconnected constant.
    pub fn concat(&self, items: impl IntoIterator<Item = Net>) -> Net {
        let mut flat = Vec::new();
        for item in items {
            self.flatten(item, &mut flat);
        }
        let mut merged: Vec<Net> = Vec::with_capacity(flat.len());
        for item in flat {
            let joined = match (merged.last(), &item) {
                (Some(prev), next) => self.join(prev, next),
                (None, _) => None,
            };
            match joined {
                Some(net) => {
                    if let Some(last) = merged.last_mut() {
                        *last = net;
                    }
                }
                None => merged.push(item),
            }
        }
        match merged.len() {
            0 => Net::Const(Const::unconnected(0)),
            1 => merged.pop().unwrap_or(Net::Const(Const::unconnected(0))),
            _ => Net::Concat(merged),
        }
    }

    fn flatten(&self, net: Net, out: &mut Vec<Net>) {
        match net {
            Net::Concat(items) => {
                for item in items {
                    self.flatten(item, out);
                }
            }
            other if self.width(&other) == 0 => {}
            Net::Slice(s) => out.push(self.collapse(s)),
            other => out.push(other),
        }
    }

    fn as_range(&self, net: &Net) -> Option<Slice> {
        match net {
            Net::Bus(bus) => Some(Slice {
                bus: *bus,
                start: 0,
                end: self.bus_width(*bus),
            }),
            Net::Slice(s) => Some(*s),
            _ => None,
        }
    }

    fn join(&self, prev: &Net, next: &Net) -> Option<Net> {
        if let (Net::Const(a), Net::Const(b)) = (prev, next) {
            return a.clone().merge(b.clone()).map(Net::Const);
        }
        let (a, b) = (self.as_range(prev)?, self.as_range(next)?);
        (a.bus == b.bus && a.end == b.start).then(|| {
            self.collapse(Slice {
                bus: a.bus,
                start: a.start,
                end: b.end,
            })
        })
    }

    /// Splits a net into single bits, least significant first.
    pub fn bits(&self, net: &Net) -> Vec<Bit> {
        let mut out = Vec::new();
        self.push_bits(net, &mut out);
        out
    }

    fn push_bits(&self, net: &Net, out: &mut Vec<Bit>) {
        match net {
            Net::Bus(bus) => out.extend((0..self.bus_width(*bus)).map(|index| {
                Bit::Net(BitRef { bus: *bus, index })
            })),
            Net::Slice(s) => out.extend((s.start..s.end).map(|index| {
                Bit::Net(BitRef { bus: s.bus, index })
            })),
            Net::Const(c) => out.extend((0..c.width()).map(|i| Bit::Const(c.bit(i)))),
            Net::Concat(items) => {
                for item in items {
                    self.push_bits(item, out);
                }
            }
        }
    }

    /// Connects `sources` to `sinks` bit by bit.
    ///
    /// Both sides are concatenated first and must have equal width. Unconnected
    /// constant source bits are skipped. In a single-source module connecting
    /// a second driver to a sink bit is an error.
    pub fn connect(&mut self, sources: impl Into<Net>, sinks: impl Into<Net>) -> IrResult<()> {
        let source = self.concat([sources.into()]);
        let sink = self.concat([sinks.into()]);
        let (source_width, sink_width) = (self.width(&source), self.width(&sink));
        if source_width != sink_width {
            return Err(IrError::WidthMismatch {
                source_net: self.describe(&source),
                source_width,
                sink: self.describe(&sink),
                sink_width,
            });
        }

        if let (Net::Bus(s), Net::Bus(k)) = (&source, &sink) {
            if s.scope == k.scope && self.is_source(*s) && self.is_sink(*k) {
                let conns = &self.modules[k.scope].connections;
                if conns.mode() == SourceMode::Single && conns.is_undriven(k.kind) {
                    self.modules[k.scope]
                        .connections
                        .set_whole(k.kind, s.kind, sink_width);
                    return Ok(());
                }
            }
        }

        let mut edges = Vec::with_capacity(sink_width as usize);
        for (src, dst) in self.bits(&source).into_iter().zip(self.bits(&sink)) {
            let Bit::Net(dst) = dst else {
                return Err(IrError::NotASink {
                    net: self.describe(&Net::from(dst)),
                });
            };
            if !self.is_sink(dst.bus) {
                return Err(IrError::NotASink {
                    net: self.describe_bit(dst),
                });
            }
            let driver = match src {
                Bit::Const(ConstBit::Unconnected) => continue,
                Bit::Const(ConstBit::Zero) => Driver::Zero,
                Bit::Const(ConstBit::One) => Driver::One,
                Bit::Net(src) => {
                    if !self.is_source(src.bus) {
                        return Err(IrError::NotASource {
                            net: self.describe_bit(src),
                        });
                    }
                    if src.bus.scope != dst.bus.scope {
                        return Err(IrError::CrossScope {
                            source_net: self.describe_bit(src),
                            sink: self.describe_bit(dst),
                        });
                    }
                    Driver::Bit(BitKey {
                        bus: src.bus.kind,
                        index: src.index,
                    })
                }
            };
            let key = BitKey {
                bus: dst.bus.kind,
                index: dst.index,
            };
            let module = &self.modules[dst.bus.scope];
            if module.connections.mode() == SourceMode::Single
                && (!module.connections.drivers_of(key).is_empty() || edges.iter().any(|(d, _, _)| *d == dst))
            {
                return Err(IrError::AlreadyDriven {
                    sink: self.describe_bit(dst),
                    module: module.name().to_string(),
                });
            }
            edges.push((dst, key, driver));
        }

        // nothing is recorded unless every bit passed
        for (dst, key, driver) in edges {
            let width = self.bus_width(dst.bus);
            self.modules[dst.bus.scope]
                .connections
                .add(key, width, driver);
        }
        Ok(())
    }

    fn driver_net(&self, scope: ModuleId, driver: Driver) -> Net {
        match driver {
            Driver::Bit(key) => self.collapse(Slice {
                bus: Bus {
                    scope,
                    kind: key.bus,
                },
                start: key.index,
                end: key.index + 1,
            }),
            Driver::Zero => Net::Const(ConstBit::Zero.into()),
            Driver::One => Net::Const(ConstBit::One.into()),
        }
    }

    /// Returns the unique source of every bit of `sink` in a single-source
    /// module. Undriven bits read as unconnected constants.
    pub fn get_source(&self, sink: impl Into<Net>) -> IrResult<Net> {
        let sink = self.concat([sink.into()]);
        if let Net::Bus(bus) = sink {
            let conns = &self.module(bus.scope).connections;
            if let Some(source) = conns.whole_driver(bus.kind) {
                return Ok(Net::Bus(Bus {
                    scope: bus.scope,
                    kind: source,
                }));
            }
        }
        let mut parts = Vec::new();
        for bit in self.bits(&sink) {
            let Bit::Net(bit) = bit else {
                return Err(IrError::NotASink {
                    net: self.describe(&Net::from(bit)),
                });
            };
            let module = self.module(bit.bus.scope);
            if module.is_multi_source() {
                return Err(IrError::MultiSource {
                    module: module.name().to_string(),
                });
            }
            let drivers = module.connections.drivers_of(BitKey {
                bus: bit.bus.kind,
                index: bit.index,
            });
            parts.push(match drivers.first() {
                Some(driver) => self.driver_net(bit.bus.scope, *driver),
                None => Net::Const(Const::unconnected(1)),
            });
        }
        Ok(self.concat(parts))
    }

    /// Returns the recorded drivers of every bit of `sink`, in connection order.
    pub fn get_multisource(&self, sink: impl Into<Net>) -> IrResult<Vec<Vec<Net>>> {
        let sink = self.concat([sink.into()]);
        self.bits(&sink)
            .into_iter()
            .map(|bit| match bit {
                Bit::Net(bit) => Ok(self
                    .module(bit.bus.scope)
                    .connections
                    .drivers_of(BitKey {
                        bus: bit.bus.kind,
                        index: bit.index,
                    })
                    .into_iter()
                    .map(|d| self.driver_net(bit.bus.scope, d))
                    .collect()),
                Bit::Const(_) => Err(IrError::NotASink {
                    net: self.describe(&Net::from(bit)),
                }),
            })
            .collect()
    }

    /// Returns the sinks driven by one source bit, in connection order.
    pub fn get_sinks(&self, source: BitRef) -> Vec<BitRef> {
        self.module(source.bus.scope)
            .connections
            .fanouts(BitKey {
                bus: source.bus.kind,
                index: source.index,
            })
            .iter()
            .map(|key| BitRef {
                bus: Bus {
                    scope: source.bus.scope,
                    kind: key.bus,
                },
                index: key.index,
            })
            .collect()
    }

    /// Returns `true` if any bit of `sink` has a driver.
    pub fn is_driven(&self, sink: Bus) -> bool {
        !self.module(sink.scope).connections.is_undriven(sink.kind)
    }

    /// Returns `true` if every bit of `sink` is either undriven or driven by
    /// the matching bit of `source`.
    pub fn is_undriven_or_driven_by(&self, sink: Bus, source: Bus) -> bool {
        let conns = &self.module(sink.scope).connections;
        if conns.is_undriven(sink.kind) {
            return true;
        }
        if sink.scope != source.scope {
            return false;
        }
        if conns.whole_driver(sink.kind) == Some(source.kind) {
            return true;
        }
        (0..self.bus_width(sink)).all(|index| {
            let drivers = conns.drivers_of(BitKey {
                bus: sink.kind,
                index,
            });
            drivers.is_empty()
                || drivers
                    == [Driver::Bit(BitKey {
                        bus: source.kind,
                        index,
                    })]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{NetClass, Port};
    use crate::{InstanceKey, ModuleKind};
    use crate::module::Module;
    use fabric_common::Position;

    struct Env {
        fabric: Fabric,
        top: ModuleId,
        a: Bus,
        b: Bus,
        o: Bus,
        pin_in: Bus,
        pin_out: Bus,
    }

    fn env(kind: ModuleKind) -> Env {
        let mut fabric = Fabric::new();
        let leaf = fabric.create_primitive("leaf").unwrap();
        let li = fabric
            .add_port(leaf, Port::new("i", 4, PortDirection::Input, NetClass::Primitive))
            .unwrap();
        let lo = fabric
            .add_port(leaf, Port::new("o", 4, PortDirection::Output, NetClass::Primitive))
            .unwrap();
        let top = fabric.add_module(Module::new("top", kind)).unwrap();
        let a = fabric
            .add_port(top, Port::new("a", 4, PortDirection::Input, NetClass::Primitive))
            .unwrap();
        let b = fabric
            .add_port(top, Port::new("b", 2, PortDirection::Input, NetClass::Primitive))
            .unwrap();
        let o = fabric
            .add_port(top, Port::new("o", 4, PortDirection::Output, NetClass::Primitive))
            .unwrap();
        let inst = fabric
            .instantiate(top, leaf, InstanceKey::Name("u0".into()), "u0", Position::ORIGIN)
            .unwrap();
        Env {
            top,
            a: Bus::port(top, a),
            b: Bus::port(top, b),
            o: Bus::port(top, o),
            pin_in: Bus::pin(top, inst, li),
            pin_out: Bus::pin(top, inst, lo),
            fabric,
        }
    }

    fn single() -> Env {
        env(ModuleKind::Switch { inputs: 0 })
    }

    #[test]
    fn slice_of_slice_rebases() {
        let e = single();
        let a = Net::Bus(e.a);
        let s1 = e.fabric.slice(&a, 1..4).unwrap();
        let s2 = e.fabric.slice(&s1, 1..2).unwrap();
        assert_eq!(s2, e.fabric.slice(&a, 2..3).unwrap());
        assert_eq!(e.fabric.slice(&a, 0..4).unwrap(), a);
        assert!(e.fabric.slice(&a, 2..5).is_err());
    }

    #[test]
    fn concat_merges_adjacent_bits_back_into_bus() {
        let e = single();
        let a = Net::Bus(e.a);
        let bits: Vec<Net> = (0..4).map(|i| e.fabric.bit(&a, i).unwrap()).collect();
        assert_eq!(e.fabric.concat(bits), a);
    }

    #[test]
    fn concat_flattens_and_merges_consts() {
        let e = single();
        let nested = Net::Concat(vec![
            Net::Const(Const::value(1, 1)),
            Net::Concat(vec![Net::Const(Const::value(1, 1)), Net::Bus(e.b)]),
        ]);
        let flat = e.fabric.concat([nested]);
        assert_eq!(
            flat,
            Net::Concat(vec![Net::Const(Const::value(0b11, 2)), Net::Bus(e.b)])
        );
        assert_eq!(e.fabric.width(&flat), 4);
        assert_eq!(e.fabric.concat(Vec::new()), Net::Const(Const::unconnected(0)));
    }

    #[test]
    fn slice_across_concat() {
        let e = single();
        let cat = Net::Concat(vec![Net::Bus(e.b), Net::Bus(e.a)]);
        let s = e.fabric.slice(&cat, 1..4).unwrap();
        let expected = e.fabric.concat([
            e.fabric.bit(&Net::Bus(e.b), 1).unwrap(),
            e.fabric.slice(&Net::Bus(e.a), 0..2).unwrap(),
        ]);
        assert_eq!(s, expected);
    }

    #[test]
    fn whole_bus_connection_roundtrips() {
        let mut e = single();
        e.fabric.connect(e.a, e.o).unwrap();
        assert_eq!(e.fabric.get_source(e.o).unwrap(), Net::Bus(e.a));
        let bit = e.fabric.bit(&Net::Bus(e.o), 2).unwrap();
        assert_eq!(
            e.fabric.get_source(bit).unwrap(),
            e.fabric.bit(&Net::Bus(e.a), 2).unwrap()
        );
    }

    #[test]
    fn concat_roundtrip_through_get_source() {
        let mut e = single();
        let sources = Net::Concat(vec![
            Net::Bus(e.b),
            Net::Const(Const::value(0b1, 1)),
            e.fabric.bit(&Net::Bus(e.a), 3).unwrap(),
        ]);
        e.fabric.connect(sources.clone(), e.o).unwrap();
        let got = e.fabric.get_source(e.o).unwrap();
        assert_eq!(e.fabric.bits(&got), e.fabric.bits(&sources));
    }

    #[test]
    fn unconnected_source_bits_are_skipped() {
        let mut e = single();
        let src = Net::Concat(vec![Net::Const(Const::unconnected(2)), Net::Bus(e.b)]);
        e.fabric.connect(src, e.o).unwrap();
        let got = e.fabric.get_source(e.fabric.bit(&Net::Bus(e.o), 0).unwrap()).unwrap();
        assert!(got.is_unconnected());
        assert!(e.fabric.is_driven(e.o));
    }

    #[test]
    fn single_source_rejects_second_driver() {
        let mut e = single();
        e.fabric.connect(e.a, e.o).unwrap();
        let err = e.fabric.connect(e.pin_out, e.o).unwrap_err();
        assert!(matches!(err, IrError::AlreadyDriven { .. }));
    }

    #[test]
    fn rejected_connection_records_nothing() {
        let mut e = single();
        let o2 = e.fabric.bit(&e.o.into(), 2).unwrap();
        e.fabric.connect(Net::Const(Const::value(1, 1)), o2).unwrap();
        let err = e.fabric.connect(e.a, e.o).unwrap_err();
        assert!(matches!(err, IrError::AlreadyDriven { .. }));
        let drivers = e.fabric.get_multisource(e.o).unwrap();
        let counts: Vec<usize> = drivers.iter().map(Vec::len).collect();
        assert_eq!(counts, vec![0, 0, 1, 0]);
    }

    #[test]
    fn width_mismatch_is_an_error() {
        let mut e = single();
        let err = e.fabric.connect(e.b, e.o).unwrap_err();
        assert!(matches!(err, IrError::WidthMismatch { .. }));
        assert!(!e.fabric.is_driven(e.o));
    }

    #[test]
    fn direction_rules() {
        let mut e = single();
        assert!(matches!(
            e.fabric.connect(e.o, e.pin_in).unwrap_err(),
            IrError::NotASource { .. }
        ));
        assert!(matches!(
            e.fabric.connect(e.a, e.pin_out).unwrap_err(),
            IrError::NotASink { .. }
        ));
        e.fabric.connect(e.pin_out, e.pin_in).unwrap();
        assert_eq!(e.fabric.get_source(e.pin_in).unwrap(), Net::Bus(e.pin_out));
    }

    #[test]
    fn cross_scope_is_an_error() {
        let mut e = single();
        let other = e.fabric.create_primitive("other").unwrap();
        let p = e
            .fabric
            .add_port(other, Port::new("x", 4, PortDirection::Input, NetClass::Primitive))
            .unwrap();
        let err = e.fabric.connect(Bus::port(other, p), e.o).unwrap_err();
        assert!(matches!(err, IrError::CrossScope { .. }));
    }

    #[test]
    fn multi_source_records_every_driver() {
        let mut e = env(ModuleKind::Primitive);
        e.fabric.connect(e.a, e.o).unwrap();
        e.fabric.connect(e.pin_out, e.o).unwrap();
        let drivers = e.fabric.get_multisource(e.o).unwrap();
        assert_eq!(drivers.len(), 4);
        assert!(drivers.iter().all(|d| d.len() == 2));
        assert!(matches!(
            e.fabric.get_source(e.o).unwrap_err(),
            IrError::MultiSource { .. }
        ));
        let sinks = e.fabric.get_sinks(BitRef { bus: e.a, index: 1 });
        assert_eq!(sinks, vec![BitRef { bus: e.o, index: 1 }]);
        let _ = e.top;
    }

    #[test]
    fn driven_by_query() {
        let mut e = single();
        assert!(e.fabric.is_undriven_or_driven_by(e.o, e.a));
        e.fabric.connect(e.a, e.o).unwrap();
        assert!(e.fabric.is_undriven_or_driven_by(e.o, e.a));
        assert!(!e.fabric.is_undriven_or_driven_by(e.o, e.pin_out));
    }
}
