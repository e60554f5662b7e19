//! Connection legalization: turns multi-driver sinks into explicit muxes.

use crate::connection::{BitKey, Connections, Driver, SourceMode};
use crate::error::{IrError, IrResult};
use crate::ids::ModuleId;
use crate::module::{InstanceKey, Module, ModuleKind};
use crate::naming;
use crate::net::BusKind;
use crate::port::{NetClass, Port, PortDirection};
use crate::Fabric;
use fabric_common::Position;
use std::collections::BTreeMap;

/// Data input port of every switch.
pub const SWITCH_INPUT: &str = "i";
/// Output port of every switch.
pub const SWITCH_OUTPUT: &str = "o";
/// Configuration port of configurable muxes.
pub const SWITCH_CONFIG: &str = "cfg_d";

/// Supplies switch modules to [`Fabric::switchify`].
pub trait SwitchLibrary {
    /// Returns a switch with at least `inputs` data inputs. The switch may be
    /// wider than requested.
    fn get_or_create_switch(&mut self, fabric: &mut Fabric, inputs: u32) -> IrResult<ModuleId>;
}

/// Switch library handing out one shared configurable mux per input count.
#[derive(Debug, Default, Clone)]
pub struct MuxLibrary {
    cache: BTreeMap<u32, ModuleId>,
}

impl MuxLibrary {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct muxes created so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` if no mux has been created yet.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl SwitchLibrary for MuxLibrary {
    fn get_or_create_switch(&mut self, fabric: &mut Fabric, inputs: u32) -> IrResult<ModuleId> {
        if let Some(&id) = self.cache.get(&inputs) {
            return Ok(id);
        }
        let id = fabric.create_configurable_mux(inputs)?;
        self.cache.insert(inputs, id);
        Ok(id)
    }
}

/// Number of configuration bits selecting one of `inputs` mux inputs.
fn select_bits(inputs: u32) -> u32 {
    u32::BITS - (inputs - 1).leading_zeros()
}

struct SinkBus {
    kind: BusKind,
    width: u32,
    owner: Option<String>,
    name: String,
}

impl Fabric {
    /// Creates a configurable mux `cfg_mux{inputs}` with ports `i`, `o` and
    /// `cfg_d`.
    pub fn create_configurable_mux(&mut self, inputs: u32) -> IrResult<ModuleId> {
        let name = format!("cfg_mux{inputs}");
        if inputs < 2 {
            return Err(IrError::InvalidDeclaration {
                name,
                reason: "configurable muxes need at least 2 inputs",
            });
        }
        let id = self.add_module(Module::new(name, ModuleKind::Switch { inputs }))?;
        self.add_port(id, Port::new(SWITCH_INPUT, inputs, PortDirection::Input, NetClass::Switch))?;
        self.add_port(id, Port::new(SWITCH_OUTPUT, 1, PortDirection::Output, NetClass::Switch))?;
        self.add_port(
            id,
            Port::new(SWITCH_CONFIG, select_bits(inputs), PortDirection::Input, NetClass::Config),
        )?;
        Ok(id)
    }

    fn sink_buses(&self, module: ModuleId) -> Vec<SinkBus> {
        let m = self.module(module);
        let ports = m
            .ports()
            .filter(|(_, p)| p.direction == PortDirection::Output)
            .map(|(id, p)| SinkBus {
                kind: BusKind::Port(id),
                width: p.width,
                owner: None,
                name: p.name.clone(),
            });
        let pins = m.instances().flat_map(|(iid, inst)| {
            self.module(inst.model)
                .ports()
                .filter(|(_, p)| p.direction == PortDirection::Input)
                .map(move |(pid, p)| SinkBus {
                    kind: BusKind::Pin(iid, pid),
                    width: p.width,
                    owner: Some(inst.name.clone()),
                    name: p.name.clone(),
                })
        });
        ports.chain(pins).collect()
    }

    /// Replaces the multi-source connections of `module` with a single-source
    /// graph, inserting a switch in front of every sink bit with more than one
    /// recorded driver. Returns the number of switches instantiated.
    ///
    /// Sinks with a single driver are rewired directly. Switch inputs are
    /// wired in recorded driver order.
    pub fn switchify(&mut self, module: ModuleId, lib: &mut dyn SwitchLibrary) -> IrResult<usize> {
        let sinks = self.sink_buses(module);
        let recorded = std::mem::replace(
            &mut self.modules[module].connections,
            Connections::new(SourceMode::Single),
        );

        let mut switches = 0;
        for sink in sinks {
            for index in 0..sink.width {
                let key = BitKey {
                    bus: sink.kind,
                    index,
                };
                let drivers = recorded.drivers_of(key);
                match drivers.as_slice() {
                    [] => {}
                    [driver] => self.modules[module].connections.add(key, sink.width, *driver),
                    _ => {
                        let name = naming::switch_instance(sink.owner.as_deref(), &sink.name, index);
                        self.insert_switch(module, lib, name, key, sink.width, &drivers)?;
                        switches += 1;
                    }
                }
            }
        }
        log::debug!(
            "legalized '{}': {} switch(es) inserted",
            self.module(module).name(),
            switches
        );
        Ok(switches)
    }

    fn insert_switch(
        &mut self,
        module: ModuleId,
        lib: &mut dyn SwitchLibrary,
        name: String,
        sink: BitKey,
        sink_width: u32,
        drivers: &[Driver],
    ) -> IrResult<()> {
        let required = drivers.len() as u32;
        let switch = lib.get_or_create_switch(self, required)?;
        let model = self.module(switch);
        let ModuleKind::Switch { inputs } = *model.kind() else {
            return Err(IrError::WrongModuleKind {
                module: model.name().to_string(),
                expected: "a switch",
            });
        };
        if inputs < required {
            return Err(IrError::SwitchTooNarrow {
                switch: model.name().to_string(),
                available: inputs,
                required,
            });
        }
        let input = self.port_named(switch, SWITCH_INPUT)?;
        let output = self.port_named(switch, SWITCH_OUTPUT)?;
        let inst = self.instantiate(module, switch, InstanceKey::Name(name.clone()), name, Position::ORIGIN)?;
        log::trace!(
            "inserted {} in '{}' for {} drivers",
            self.module(module).instance(inst).name,
            self.module(module).name(),
            required
        );

        let conns = &mut self.modules[module].connections;
        for (index, driver) in drivers.iter().enumerate() {
            let pin = BitKey {
                bus: BusKind::Pin(inst, input),
                index: index as u32,
            };
            conns.add(pin, inputs, *driver);
        }
        let out = BitKey {
            bus: BusKind::Pin(inst, output),
            index: 0,
        };
        conns.add(sink, sink_width, Driver::Bit(out));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Bus, Net};

    fn cbox_like() -> (Fabric, ModuleId) {
        let mut f = Fabric::new();
        let m = f
            .add_module(Module::new("box", ModuleKind::SwitchBox))
            .unwrap();
        f.add_port(m, Port::new("a", 1, PortDirection::Input, NetClass::Node)).unwrap();
        f.add_port(m, Port::new("b", 1, PortDirection::Input, NetClass::Node)).unwrap();
        f.add_port(m, Port::new("c", 1, PortDirection::Input, NetClass::Node)).unwrap();
        f.add_port(m, Port::new("o", 2, PortDirection::Output, NetClass::Node)).unwrap();
        (f, m)
    }

    fn bus(f: &Fabric, m: ModuleId, name: &str) -> Bus {
        Bus::port(m, f.port_named(m, name).unwrap())
    }

    #[test]
    fn select_bits_rounds_up() {
        assert_eq!(select_bits(2), 1);
        assert_eq!(select_bits(3), 2);
        assert_eq!(select_bits(4), 2);
        assert_eq!(select_bits(5), 3);
    }

    #[test]
    fn mux_library_caches_by_width() {
        let mut f = Fabric::new();
        let mut lib = MuxLibrary::new();
        let a = lib.get_or_create_switch(&mut f, 3).unwrap();
        let b = lib.get_or_create_switch(&mut f, 3).unwrap();
        assert_eq!(a, b);
        assert_eq!(lib.len(), 1);
        assert_eq!(f.module(a).name(), "cfg_mux3");
        let cfg = f.port_named(a, SWITCH_CONFIG).unwrap();
        assert_eq!(f.module(a).port(cfg).width, 2);
        assert!(f.create_configurable_mux(1).is_err());
    }

    #[test]
    fn multi_driver_sink_gets_a_mux() {
        let (mut f, m) = cbox_like();
        let (a, b, c, o) = (bus(&f, m, "a"), bus(&f, m, "b"), bus(&f, m, "c"), bus(&f, m, "o"));
        let o0 = f.bit(&o.into(), 0).unwrap();
        let o1 = f.bit(&o.into(), 1).unwrap();
        for src in [a, b, c] {
            f.connect(src, o0.clone()).unwrap();
        }
        f.connect(a, o1.clone()).unwrap();

        let mut lib = MuxLibrary::new();
        assert_eq!(f.switchify(m, &mut lib).unwrap(), 1);
        assert!(!f.module(m).is_multi_source());

        let sw = f.module(m).instance_by_name("sw_o_0").unwrap();
        let model = f.module(m).instance(sw).model;
        let out = f.port_named(model, SWITCH_OUTPUT).unwrap();
        let input = f.port_named(model, SWITCH_INPUT).unwrap();
        assert_eq!(f.get_source(o0).unwrap(), Net::from(Bus::pin(m, sw, out)));
        assert_eq!(f.get_source(o1).unwrap(), Net::from(a));
        assert_eq!(
            f.get_source(Bus::pin(m, sw, input)).unwrap(),
            f.concat([a.into(), b.into(), c.into()])
        );
    }

    #[test]
    fn narrow_switch_is_rejected() {
        struct Narrow;
        impl SwitchLibrary for Narrow {
            fn get_or_create_switch(&mut self, fabric: &mut Fabric, _: u32) -> IrResult<ModuleId> {
                match fabric.module_by_name("cfg_mux2") {
                    Some(id) => Ok(id),
                    None => fabric.create_configurable_mux(2),
                }
            }
        }
        let (mut f, m) = cbox_like();
        let (a, b, c, o) = (bus(&f, m, "a"), bus(&f, m, "b"), bus(&f, m, "c"), bus(&f, m, "o"));
        let o0 = f.bit(&o.into(), 0).unwrap();
        for src in [a, b, c] {
            f.connect(src, o0.clone()).unwrap();
        }
        assert!(matches!(
            f.switchify(m, &mut Narrow).unwrap_err(),
            IrError::SwitchTooNarrow {
                available: 2,
                required: 3,
                ..
            }
        ));
    }
}
