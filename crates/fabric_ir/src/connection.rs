//! Per-module bit-level connection storage.
//!
//! A bus starts out with no entry. Connecting a whole bus to a whole bus of a
//! single-source module records a single [`BusDrivers::Whole`] entry; the
//! first per-bit mutation of that bus splits it into a per-bit driver vector.
//! Readers go through [`Connections::drivers_of`], which hides the difference.

use crate::net::BusKind;
use std::collections::HashMap;

/// Whether a module's sinks may have more than one driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceMode {
    /// Every sink bit has at most one driver.
    Single,
    /// Sinks collect any number of drivers, legalized later.
    Multi,
}

/// One bit of a bus inside the owning module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BitKey {
    /// The bus.
    pub bus: BusKind,
    /// Bit index.
    pub index: u32,
}

/// A recorded driver of one sink bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    /// A bus bit in the same module.
    Bit(BitKey),
    /// Constant zero.
    Zero,
    /// Constant one.
    One,
}

#[derive(Debug, Clone)]
enum BusDrivers {
    Whole(BusKind),
    Bits(Vec<Vec<Driver>>),
}

/// The connection graph of one module.
#[derive(Debug, Clone)]
pub struct Connections {
    mode: SourceMode,
    drivers: HashMap<BusKind, BusDrivers>,
    fanouts: HashMap<BitKey, Vec<BitKey>>,
    order: Vec<BusKind>,
}

impl Connections {
    /// Creates an empty graph.
    pub fn new(mode: SourceMode) -> Self {
        Self {
            mode,
            drivers: HashMap::new(),
            fanouts: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Returns the source mode.
    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    /// Returns the drivers of one sink bit in connection order.
    pub fn drivers_of(&self, bit: BitKey) -> Vec<Driver> {
        match self.drivers.get(&bit.bus) {
            None => Vec::new(),
            Some(BusDrivers::Whole(source)) => vec![Driver::Bit(BitKey {
                bus: *source,
                index: bit.index,
            })],
            Some(BusDrivers::Bits(bits)) => bits
                .get(bit.index as usize)
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Returns the source bus if `bus` is driven as a whole.
    pub fn whole_driver(&self, bus: BusKind) -> Option<BusKind> {
        match self.drivers.get(&bus) {
            Some(BusDrivers::Whole(source)) => Some(*source),
            _ => None,
        }
    }

    /// Returns `true` if no bit of `bus` has a driver.
    pub fn is_undriven(&self, bus: BusKind) -> bool {
        match self.drivers.get(&bus) {
            None => true,
            Some(BusDrivers::Whole(_)) => false,
            Some(BusDrivers::Bits(bits)) => bits.iter().all(Vec::is_empty),
        }
    }

    /// Records `source` as the whole-bus driver of an undriven `sink`.
    pub fn set_whole(&mut self, sink: BusKind, source: BusKind, width: u32) {
        if !self.drivers.contains_key(&sink) {
            self.order.push(sink);
        }
        self.drivers.insert(sink, BusDrivers::Whole(source));
        for index in 0..width {
            self.fanouts
                .entry(BitKey { bus: source, index })
                .or_default()
                .push(BitKey { bus: sink, index });
        }
    }

    /// Appends `driver` to the drivers of `sink`, a bit of a bus `width` bits
    /// wide. Recording the same driver twice has no effect.
    pub fn add(&mut self, sink: BitKey, width: u32, driver: Driver) {
        if self.drivers_of(sink).contains(&driver) {
            return;
        }
        let entry = match self.drivers.get_mut(&sink.bus) {
            Some(entry) => entry,
            None => {
                self.order.push(sink.bus);
                self.drivers
                    .entry(sink.bus)
                    .or_insert_with(|| BusDrivers::Bits(vec![Vec::new(); width as usize]))
            }
        };
        if let BusDrivers::Whole(source) = *entry {
            *entry = BusDrivers::Bits(
                (0..width)
                    .map(|index| vec![Driver::Bit(BitKey { bus: source, index })])
                    .collect(),
            );
        }
        if let BusDrivers::Bits(bits) = entry {
            if let Some(slot) = bits.get_mut(sink.index as usize) {
                slot.push(driver);
            }
        }
        if let Driver::Bit(source) = driver {
            self.fanouts.entry(source).or_default().push(sink);
        }
    }

    /// Returns the sinks driven by one source bit, in connection order.
    pub fn fanouts(&self, bit: BitKey) -> &[BitKey] {
        self.fanouts.get(&bit).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates over every bus that has ever been driven, in first-connection order.
    pub fn driven_buses(&self) -> impl Iterator<Item = BusKind> + '_ {
        self.order.iter().copied()
    }
}
