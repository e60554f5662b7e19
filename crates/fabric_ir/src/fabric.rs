//! The [`Fabric`] context: owner of every module, segment prototype and global.
//!
//! All construction goes through `&mut Fabric`. Modules refer to each other by
//! [`ModuleId`], so a resolver may freely mutate a child model while walking
//! its parent, and the same model shared by many instances is updated once.

use crate::arena::Arena;
use crate::error::{IrError, IrResult};
use crate::ids::{GlobalId, InstanceId, ModuleId, PortId, SegmentProtoId};
use crate::module::{BlockShape, Instance, InstanceKey, IoKind, Module, ModuleKind, TileData};
use crate::naming;
use crate::port::{NetClass, Port, PortDirection};
use crate::prototype::{Global, GlobalBinding, SegmentPrototype};
use fabric_common::{Dimension, Orientation, Position};
use std::collections::HashMap;

/// Name of the external input port of IO blocks.
pub const IO_INPUT: &str = "exti";
/// Name of the external output port of IO blocks.
pub const IO_OUTPUT: &str = "exto";

/// The whole architecture under construction.
#[derive(Debug, Clone, Default)]
pub struct Fabric {
    pub(crate) modules: Arena<ModuleId, Module>,
    module_names: HashMap<String, ModuleId>,
    segments: Arena<SegmentProtoId, SegmentPrototype>,
    globals: Arena<GlobalId, Global>,
}

impl Fabric {
    /// Creates an empty fabric.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a module.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this fabric.
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id]
    }

    /// Iterates over all modules in creation order.
    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules.iter()
    }

    /// Looks up a module by name.
    pub fn module_by_name(&self, name: &str) -> Option<ModuleId> {
        self.module_names.get(name).copied()
    }

    pub(crate) fn add_module(&mut self, module: Module) -> IrResult<ModuleId> {
        if self.module_names.contains_key(module.name()) {
            return Err(IrError::InvalidDeclaration {
                name: module.name().to_string(),
                reason: "duplicate module name",
            });
        }
        let name = module.name().to_string();
        let id = self.modules.alloc(module);
        self.module_names.insert(name, id);
        Ok(id)
    }

    // -- prototypes -------------------------------------------------------

    /// Declares a routing segment prototype.
    pub fn create_segment(
        &mut self,
        name: impl Into<String>,
        width: u32,
        length: u32,
    ) -> IrResult<SegmentProtoId> {
        let name = name.into();
        if width == 0 || length == 0 {
            return Err(IrError::InvalidDeclaration {
                name,
                reason: "segment width and length must be positive",
            });
        }
        if self.segments.values().any(|s| s.name == name) {
            return Err(IrError::InvalidDeclaration {
                name,
                reason: "duplicate segment name",
            });
        }
        Ok(self.segments.alloc(SegmentPrototype {
            name,
            width,
            length,
        }))
    }

    /// Returns a segment prototype.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this fabric.
    pub fn segment(&self, id: SegmentProtoId) -> &SegmentPrototype {
        &self.segments[id]
    }

    /// All segment prototypes, in declaration order.
    pub fn segment_ids(&self) -> Vec<SegmentProtoId> {
        self.segments.ids().collect()
    }

    /// Declares a global wire.
    pub fn create_global(
        &mut self,
        name: impl Into<String>,
        width: u32,
        is_clock: bool,
    ) -> IrResult<GlobalId> {
        let name = name.into();
        if width == 0 || (is_clock && width != 1) {
            return Err(IrError::InvalidDeclaration {
                name,
                reason: "globals must be non-empty and clocks 1 bit wide",
            });
        }
        Ok(self.globals.alloc(Global {
            name,
            width,
            is_clock,
            binding: None,
        }))
    }

    /// Binds a global wire to the external input of IO sub-block `subblock`
    /// at `position` of the top-level array.
    pub fn bind_global(&mut self, id: GlobalId, position: Position, subblock: u32) {
        self.globals[id].binding = Some(GlobalBinding { position, subblock });
    }

    /// Returns a global wire.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this fabric.
    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id]
    }

    /// Iterates over globals in declaration order.
    pub fn globals(&self) -> impl Iterator<Item = (GlobalId, &Global)> {
        self.globals.iter()
    }

    // -- ports and instances ----------------------------------------------

    /// Adds a port to a module.
    pub fn add_port(&mut self, module: ModuleId, port: Port) -> IrResult<PortId> {
        let m = &mut self.modules[module];
        if m.port_names.contains_key(&port.name) || m.port_keys.contains_key(&port.key) {
            return Err(IrError::DuplicatePort {
                module: m.name.clone(),
                port: port.name,
            });
        }
        let name = port.name.clone();
        let key = port.key.clone();
        let id = m.ports.alloc(port);
        m.port_names.insert(name, id);
        m.port_keys.insert(key, id);
        Ok(id)
    }

    /// Instantiates `model` inside `parent`.
    pub fn instantiate(
        &mut self,
        parent: ModuleId,
        model: ModuleId,
        key: InstanceKey,
        name: impl Into<String>,
        position: Position,
    ) -> IrResult<InstanceId> {
        let name = name.into();
        let m = &mut self.modules[parent];
        if m.instance_names.contains_key(&name) || m.instance_keys.contains_key(&key) {
            return Err(IrError::DuplicateInstance {
                module: m.name.clone(),
                instance: name,
            });
        }
        let id = m.instances.alloc(Instance {
            name: name.clone(),
            key: key.clone(),
            model,
            position,
        });
        m.instance_names.insert(name, id);
        m.instance_keys.insert(key, id);
        Ok(id)
    }

    /// Returns the port of `module` named `name`.
    pub fn port_named(&self, module: ModuleId, name: &str) -> IrResult<PortId> {
        let m = self.module(module);
        m.port_by_name(name).ok_or_else(|| IrError::Unknown {
            what: "port",
            name: name.to_string(),
            module: m.name().to_string(),
        })
    }

    // -- leaf modules -----------------------------------------------------

    /// Creates an empty primitive.
    pub fn create_primitive(&mut self, name: impl Into<String>) -> IrResult<ModuleId> {
        self.add_module(Module::new(name, ModuleKind::Primitive))
    }

    /// Creates an IO block with `capacity` sub-blocks per tile.
    pub fn create_io_block(
        &mut self,
        name: impl Into<String>,
        io: IoKind,
        capacity: u32,
    ) -> IrResult<ModuleId> {
        let name = name.into();
        if capacity == 0 {
            return Err(IrError::InvalidDeclaration {
                name,
                reason: "IO block capacity must be positive",
            });
        }
        let shape = BlockShape {
            width: 1,
            height: 1,
            capacity,
        };
        let id = self.add_module(Module::new(name, ModuleKind::IoBlock { shape, io }))?;
        if io.has_input() {
            self.add_port(id, Port::new(IO_INPUT, 1, PortDirection::Input, NetClass::Io))?;
        }
        if io.has_output() {
            self.add_port(id, Port::new(IO_OUTPUT, 1, PortDirection::Output, NetClass::Io))?;
        }
        Ok(id)
    }

    /// Creates a logic block of `width x height` tiles.
    pub fn create_logic_block(
        &mut self,
        name: impl Into<String>,
        width: u32,
        height: u32,
    ) -> IrResult<ModuleId> {
        let name = name.into();
        if width == 0 || height == 0 {
            return Err(IrError::InvalidDeclaration {
                name,
                reason: "block dimensions must be positive",
            });
        }
        let shape = BlockShape {
            width,
            height,
            capacity: 1,
        };
        self.add_module(Module::new(name, ModuleKind::LogicBlock { shape }))
    }

    /// Checks that `position` lies on the `orientation` edge of `block`.
    pub fn validate_block_edge(
        &self,
        block: ModuleId,
        orientation: Orientation,
        position: Position,
    ) -> IrResult<()> {
        let m = self.module(block);
        let shape = m.block_shape().ok_or_else(|| IrError::WrongModuleKind {
            module: m.name().to_string(),
            expected: "a block",
        })?;
        let (w, h) = (shape.width as i32, shape.height as i32);
        let invalid = |reason| IrError::InvalidOrientation {
            name: m.name().to_string(),
            orientation,
            position,
            reason,
        };
        if position.x < 0 || position.x >= w || position.y < 0 || position.y >= h {
            return Err(invalid("position is outside the block"));
        }
        let off_edge = match orientation {
            Orientation::Auto if m.is_io_block() => false,
            Orientation::Auto => return Err(invalid("auto orientation is only allowed on IO blocks")),
            Orientation::North => position.y != h - 1,
            Orientation::East => position.x != w - 1,
            Orientation::South => position.y != 0,
            Orientation::West => position.x != 0,
        };
        if off_edge {
            return Err(invalid("position is not on that edge of the block"));
        }
        Ok(())
    }

    /// Adds a routable port to a block edge.
    pub fn add_block_port(
        &mut self,
        block: ModuleId,
        name: impl Into<String>,
        width: u32,
        direction: PortDirection,
        position: Position,
        orientation: Orientation,
    ) -> IrResult<PortId> {
        self.validate_block_edge(block, orientation, position)?;
        let port = Port::new(name, width, direction, NetClass::BlockPort).placed(position, orientation);
        self.add_port(block, port)
    }

    /// Adds an input port to a block that is fed by a global wire.
    pub fn add_global_port(
        &mut self,
        block: ModuleId,
        name: impl Into<String>,
        global: GlobalId,
    ) -> IrResult<PortId> {
        let width = self.global(global).width;
        let mut port = Port::new(name, width, PortDirection::Input, NetClass::Global);
        port.global = Some(global);
        self.add_port(block, port)
    }

    // -- tiles and boxes --------------------------------------------------

    /// Creates a tile holding `capacity` instances of `block`.
    ///
    /// IO tiles need a concrete orientation naming the array edge they sit on.
    pub fn create_tile(
        &mut self,
        name: impl Into<String>,
        block: ModuleId,
        orientation: Orientation,
    ) -> IrResult<ModuleId> {
        let name = name.into();
        let model = self.module(block);
        let shape = model.block_shape().ok_or_else(|| IrError::WrongModuleKind {
            module: model.name().to_string(),
            expected: "a block",
        })?;
        if model.is_io_block() && orientation.is_auto() {
            return Err(IrError::InvalidOrientation {
                name,
                orientation,
                position: Position::ORIGIN,
                reason: "IO tiles need a concrete orientation",
            });
        }
        let tile = self.add_module(Module::new(
            name,
            ModuleKind::Tile(TileData {
                block,
                shape,
                orientation,
            }),
        ))?;
        for i in 0..shape.capacity {
            self.instantiate(
                tile,
                block,
                InstanceKey::SubBlock(i),
                naming::sub_block_instance(i, shape.capacity),
                Position::ORIGIN,
            )?;
        }
        Ok(tile)
    }

    /// Creates an empty switch box.
    pub fn create_switch_box(&mut self, name: impl Into<String>) -> IrResult<ModuleId> {
        self.add_module(Module::new(name, ModuleKind::SwitchBox))
    }

    /// Creates an empty connection box tapping a channel of `dimension`.
    pub fn create_connection_box(
        &mut self,
        name: impl Into<String>,
        dimension: Dimension,
    ) -> IrResult<ModuleId> {
        self.add_module(Module::new(name, ModuleKind::ConnectionBox { dimension }))
    }

    /// Returns the channel dimension of a connection box.
    pub fn cbox_dimension(&self, cbox: ModuleId) -> IrResult<Dimension> {
        let m = self.module(cbox);
        match m.kind() {
            ModuleKind::ConnectionBox { dimension } => Ok(*dimension),
            _ => Err(IrError::WrongModuleKind {
                module: m.name().to_string(),
                expected: "a connection box",
            }),
        }
    }

    /// Checks that a connection box of `dimension` may serve the `orientation` edge.
    pub fn validate_cbox_orientation(&self, cbox: ModuleId, orientation: Orientation) -> IrResult<()> {
        let dimension = self.cbox_dimension(cbox)?;
        match orientation.dimension() {
            Some(d) if d.perpendicular() == dimension => Ok(()),
            _ => Err(IrError::BoxDimensionMismatch {
                cbox: self.module(cbox).name().to_string(),
                dimension,
                orientation,
            }),
        }
    }

    /// Places a connection box on the `orientation` edge of tile cell `position`.
    pub fn instantiate_cbox(
        &mut self,
        tile: ModuleId,
        cbox: ModuleId,
        orientation: Orientation,
        position: Position,
    ) -> IrResult<InstanceId> {
        self.validate_cbox_orientation(cbox, orientation)?;
        let t = self.module(tile);
        let data = t.tile().ok_or_else(|| IrError::WrongModuleKind {
            module: t.name().to_string(),
            expected: "a tile",
        })?;
        self.validate_block_edge(data.block, orientation, position)
            .map_err(|_| IrError::InvalidOrientation {
                name: t.name().to_string(),
                orientation,
                position,
                reason: "connection boxes must sit on the matching tile edge",
            })?;
        self.instantiate(
            tile,
            cbox,
            InstanceKey::ConnectionBox(position, orientation),
            naming::cbox_instance(position, orientation),
            position,
        )
    }
}
