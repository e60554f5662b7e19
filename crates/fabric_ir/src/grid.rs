//! Array grids, coverage predicates and grid placement.
//!
//! An array owns two sparse grids. The element grid holds tiles and nested
//! arrays over `[0, width) x [0, height)`. The switch-box grid holds switch
//! boxes over `[-1, width) x [-1, height)`; row and column `-1` are the
//! boundary channels south and west of the interior, which the array only
//! resolves itself when its [`ChannelCoverage`] says so.
//!
//! Multi-cell elements occupy one root cell plus offset cells that point
//! back at the root, so "who occupies this cell" is a single lookup.

use crate::error::{IrError, IrResult};
use crate::fabric::Fabric;
use crate::ids::{InstanceId, ModuleId};
use crate::module::{Instance, InstanceKey, Module, ModuleKind};
use crate::naming;
use fabric_common::{Dimension, Position};
use serde::{Deserialize, Serialize};

/// Which boundary channels an array owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChannelCoverage {
    /// The X channel above the top row.
    pub north: bool,
    /// The Y channel right of the rightmost column.
    pub east: bool,
    /// The X channel below the bottom row.
    pub south: bool,
    /// The Y channel left of the leftmost column.
    pub west: bool,
}

impl ChannelCoverage {
    /// Covers every boundary channel.
    pub const ALL: ChannelCoverage = ChannelCoverage {
        north: true,
        east: true,
        south: true,
        west: true,
    };
}

/// Size and channel coverage of a grid element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    /// Width in tiles.
    pub width: u32,
    /// Height in tiles.
    pub height: u32,
    /// Boundary channels owned by the element.
    pub coverage: ChannelCoverage,
}

impl Footprint {
    fn w(&self) -> i32 {
        self.width as i32
    }

    fn h(&self) -> i32 {
        self.height as i32
    }

    /// Returns `true` if the tile cell at `pos` is inside the footprint.
    pub fn covers_tile(&self, pos: Position) -> bool {
        0 <= pos.x && pos.x < self.w() && 0 <= pos.y && pos.y < self.h()
    }

    /// Returns `true` if the channel of dimension `dimension` anchored at `pos`
    /// is resolved inside the footprint.
    pub fn covers_channel(&self, pos: Position, dimension: Dimension) -> bool {
        let (along, across, len_along, len_across, low, high) = match dimension {
            Dimension::X => (
                pos.x,
                pos.y,
                self.w(),
                self.h(),
                self.coverage.south,
                self.coverage.north,
            ),
            Dimension::Y => (
                pos.y,
                pos.x,
                self.h(),
                self.w(),
                self.coverage.west,
                self.coverage.east,
            ),
        };
        if along < 0 || along >= len_along {
            return false;
        }
        if across == -1 {
            low
        } else if across == len_across - 1 {
            high
        } else {
            0 <= across && across < len_across - 1
        }
    }

    /// Returns `true` if the switch box at `pos` is resolved inside the footprint.
    pub fn covers_sbox(&self, pos: Position) -> bool {
        self.covers_channel(pos, Dimension::X) && self.covers_channel(pos, Dimension::Y)
    }
}

/// One occupied grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridCell {
    /// The anchor cell of an element.
    Root(InstanceId),
    /// A non-anchor cell; the anchor is at `cell - offset` in the element grid.
    Offset(Position),
}

/// What occupies a switch-box cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SboxOccupant {
    /// A switch box instance.
    SwitchBox(InstanceId),
    /// A tile or nested array covering the cell.
    Element(InstanceId),
}

/// The grids of an array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayData {
    footprint: Footprint,
    elements: Vec<Option<GridCell>>,
    sboxes: Vec<Option<GridCell>>,
}

impl ArrayData {
    pub(crate) fn new(footprint: Footprint) -> Self {
        let (w, h) = (footprint.width as usize, footprint.height as usize);
        Self {
            footprint,
            elements: vec![None; w * h],
            sboxes: vec![None; (w + 1) * (h + 1)],
        }
    }

    /// Size and coverage.
    pub fn footprint(&self) -> Footprint {
        self.footprint
    }

    /// Width in tiles.
    pub fn width(&self) -> u32 {
        self.footprint.width
    }

    /// Height in tiles.
    pub fn height(&self) -> u32 {
        self.footprint.height
    }

    fn element_index(&self, pos: Position) -> Option<usize> {
        self.footprint
            .covers_tile(pos)
            .then(|| pos.x as usize * self.footprint.height as usize + pos.y as usize)
    }

    fn sbox_index(&self, pos: Position) -> Option<usize> {
        let (w, h) = (self.footprint.w(), self.footprint.h());
        (-1 <= pos.x && pos.x < w && -1 <= pos.y && pos.y < h)
            .then(|| (pos.x + 1) as usize * (h + 1) as usize + (pos.y + 1) as usize)
    }

    /// Returns the raw element cell at `pos`.
    pub fn element_cell(&self, pos: Position) -> Option<GridCell> {
        self.element_index(pos).and_then(|i| self.elements[i])
    }

    /// Returns the raw switch-box cell at `pos`.
    pub fn sbox_cell(&self, pos: Position) -> Option<GridCell> {
        self.sbox_index(pos).and_then(|i| self.sboxes[i])
    }

    /// Returns the tile or nested array occupying the tile cell at `pos`.
    pub fn element_at(&self, pos: Position) -> Option<InstanceId> {
        match self.element_cell(pos)? {
            GridCell::Root(id) => Some(id),
            GridCell::Offset(offset) => match self.element_cell(pos - offset)? {
                GridCell::Root(id) => Some(id),
                GridCell::Offset(_) => None,
            },
        }
    }

    /// Returns the switch box or element occupying the switch-box cell at `pos`.
    pub fn sbox_at(&self, pos: Position) -> Option<SboxOccupant> {
        match self.sbox_cell(pos)? {
            GridCell::Root(id) => Some(SboxOccupant::SwitchBox(id)),
            GridCell::Offset(offset) => self.element_at(pos - offset).map(SboxOccupant::Element),
        }
    }

    /// Iterates over element anchor instances in grid order.
    pub fn element_roots(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.elements.iter().filter_map(|cell| match cell {
            Some(GridCell::Root(id)) => Some(*id),
            _ => None,
        })
    }
}

impl Fabric {
    /// Creates an empty array.
    pub fn create_array(
        &mut self,
        name: impl Into<String>,
        width: u32,
        height: u32,
        coverage: ChannelCoverage,
    ) -> IrResult<ModuleId> {
        let name = name.into();
        if width == 0 || height == 0 {
            return Err(IrError::InvalidDeclaration {
                name,
                reason: "array dimensions must be positive",
            });
        }
        let footprint = Footprint {
            width,
            height,
            coverage,
        };
        self.add_module(Module::new(name, ModuleKind::Array(ArrayData::new(footprint))))
    }

    /// Returns the footprint of a module placeable in an array grid.
    pub fn element_footprint(&self, model: ModuleId) -> IrResult<Footprint> {
        let module = self.module(model);
        match module.kind() {
            ModuleKind::Tile(tile) => Ok(Footprint {
                width: tile.shape.width,
                height: tile.shape.height,
                coverage: ChannelCoverage::default(),
            }),
            ModuleKind::Array(array) => Ok(array.footprint()),
            _ => Err(IrError::WrongModuleKind {
                module: module.name().to_string(),
                expected: "a tile or an array",
            }),
        }
    }

    fn array_data(&self, array: ModuleId) -> IrResult<&ArrayData> {
        let module = self.module(array);
        module.array().ok_or_else(|| IrError::WrongModuleKind {
            module: module.name().to_string(),
            expected: "an array",
        })
    }

    /// Places a tile or nested array with its anchor at `position`.
    ///
    /// Every tile cell and every switch-box cell the element resolves itself
    /// must be free and inside the array.
    pub fn instantiate_element(
        &mut self,
        array: ModuleId,
        model: ModuleId,
        position: Position,
    ) -> IrResult<InstanceId> {
        let footprint = self.element_footprint(model)?;
        let grid = self.array_data(array)?;
        let element = self.module(model).name().to_string();
        let fail = |fabric: &Fabric, pos: Position, conflict: bool| {
            let array = fabric.module(array).name().to_string();
            let element = element.clone();
            if conflict {
                IrError::PlacementConflict {
                    array,
                    element,
                    position: pos,
                }
            } else {
                IrError::DoesNotFit {
                    array,
                    element,
                    position,
                }
            }
        };

        let mut tiles = Vec::new();
        let mut sboxes = Vec::new();
        for x in -1..footprint.width as i32 {
            for y in -1..footprint.height as i32 {
                let local = Position::new(x, y);
                let pos = position + local;
                if footprint.covers_tile(local) {
                    let Some(index) = grid.element_index(pos) else {
                        return Err(fail(self, pos, false));
                    };
                    if grid.elements[index].is_some() {
                        return Err(fail(self, pos, true));
                    }
                    tiles.push((index, local));
                }
                if footprint.covers_sbox(local) {
                    let Some(index) = grid.sbox_index(pos) else {
                        return Err(fail(self, pos, false));
                    };
                    if grid.sboxes[index].is_some() {
                        return Err(fail(self, pos, true));
                    }
                    sboxes.push((index, local));
                }
            }
        }

        let is_tile = self.module(model).tile().is_some();
        let name = naming::element_instance(is_tile, position);
        let instance = self.instantiate(
            array,
            model,
            InstanceKey::Element(position),
            name,
            position,
        )?;
        let grid = self.array_data_mut(array)?;
        for (index, local) in tiles {
            grid.elements[index] = Some(if local == Position::ORIGIN {
                GridCell::Root(instance)
            } else {
                GridCell::Offset(local)
            });
        }
        for (index, local) in sboxes {
            grid.sboxes[index] = Some(GridCell::Offset(local));
        }
        log::trace!(
            "placed '{}' at {} in '{}'",
            self.module(model).name(),
            position,
            self.module(array).name()
        );
        Ok(instance)
    }

    /// Places a switch box at `position`.
    pub fn instantiate_sbox(
        &mut self,
        array: ModuleId,
        model: ModuleId,
        position: Position,
    ) -> IrResult<InstanceId> {
        let sbox = self.module(model);
        if !matches!(sbox.kind(), ModuleKind::SwitchBox) {
            return Err(IrError::WrongModuleKind {
                module: sbox.name().to_string(),
                expected: "a switch box",
            });
        }
        let grid = self.array_data(array)?;
        let index = match grid.sbox_index(position) {
            Some(index) if grid.footprint.covers_sbox(position) => index,
            _ => {
                return Err(IrError::DoesNotFit {
                    array: self.module(array).name().to_string(),
                    element: sbox.name().to_string(),
                    position,
                })
            }
        };
        if grid.sboxes[index].is_some() {
            return Err(IrError::PlacementConflict {
                array: self.module(array).name().to_string(),
                element: sbox.name().to_string(),
                position,
            });
        }
        let instance = self.instantiate(
            array,
            model,
            InstanceKey::SwitchBox(position),
            naming::sbox_instance(position),
            position,
        )?;
        self.array_data_mut(array)?.sboxes[index] = Some(GridCell::Root(instance));
        Ok(instance)
    }

    fn array_data_mut(&mut self, array: ModuleId) -> IrResult<&mut ArrayData> {
        let module = &mut self.modules[array];
        let name = module.name.clone();
        module.array_mut().ok_or(IrError::WrongModuleKind {
            module: name,
            expected: "an array",
        })
    }

    /// Returns the instance occupying tile cell `pos` of `array`.
    pub fn element_at(&self, array: ModuleId, pos: Position) -> Option<&Instance> {
        let module = self.module(array);
        let id = module.array()?.element_at(pos)?;
        Some(module.instance(id))
    }
}
