//! Caching libraries handing out populated routing boxes.
//!
//! The grid passes never build boxes themselves. They ask a library for a box
//! matching the local situation and instantiate whatever comes back, so one
//! box module is shared by every grid cell with the same surroundings.

use crate::cbox::{generate_fc, populate_connection_box, BlockFcValue};
use crate::error::RoutingResult;
use crate::sbox::{generate_wilton, populate_switch_box, SwitchBoxEnvironment, WiltonPattern};
use fabric_common::{Orientation, Position};
use fabric_diagnostics::DiagnosticSink;
use fabric_ir::{naming, Fabric, IrError, ModuleId, SegmentProtoId};
use std::collections::HashMap;

/// Supplies switch boxes to [`crate::sboxify`].
pub trait SwitchBoxLibrary {
    /// Returns a populated, connected switch box for `env`.
    fn get_or_create_sbox(
        &mut self,
        fabric: &mut Fabric,
        env: SwitchBoxEnvironment,
        drive_truncated: bool,
        sink: &DiagnosticSink,
    ) -> RoutingResult<ModuleId>;
}

/// Supplies connection boxes to [`crate::cboxify`].
pub trait ConnectionBoxLibrary {
    /// Returns a populated, connected connection box serving the
    /// `orientation` edge of tile `position` of `block`. `channel` is the
    /// tapped channel relative to the box.
    fn get_or_create_cbox(
        &mut self,
        fabric: &mut Fabric,
        block: ModuleId,
        orientation: Orientation,
        position: Position,
        channel: Position,
        sink: &DiagnosticSink,
    ) -> RoutingResult<ModuleId>;
}

/// Switch boxes connected in a Wilton pattern, one per environment.
#[derive(Debug, Clone)]
pub struct WiltonSwitchBoxLibrary {
    segments: Vec<SegmentProtoId>,
    pattern: Option<WiltonPattern>,
    cycle_free: bool,
    cache: HashMap<(SwitchBoxEnvironment, bool), ModuleId>,
}

impl WiltonSwitchBoxLibrary {
    /// A library over `segments`. `pattern` falls back to the default for
    /// `cycle_free`.
    pub fn new(segments: Vec<SegmentProtoId>, pattern: Option<WiltonPattern>, cycle_free: bool) -> Self {
        Self {
            segments,
            pattern,
            cycle_free,
            cache: HashMap::new(),
        }
    }

    /// Number of distinct switch boxes built so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` if no switch box has been built yet.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl SwitchBoxLibrary for WiltonSwitchBoxLibrary {
    fn get_or_create_sbox(
        &mut self,
        fabric: &mut Fabric,
        env: SwitchBoxEnvironment,
        drive_truncated: bool,
        sink: &DiagnosticSink,
    ) -> RoutingResult<ModuleId> {
        if let Some(&id) = self.cache.get(&(env, drive_truncated)) {
            return Ok(id);
        }
        let mut name = format!("sbox_{}", env.tag());
        if !drive_truncated {
            name.push_str("_nt");
        }
        let sbox = fabric.create_switch_box(name)?;
        populate_switch_box(fabric, sbox, &self.segments, env, drive_truncated)?;
        generate_wilton(fabric, sbox, &self.segments, self.pattern.as_ref(), self.cycle_free, sink)?;
        log::debug!("built switch box '{}'", fabric.module(sbox).name());
        self.cache.insert((env, drive_truncated), sbox);
        Ok(sbox)
    }
}

type CboxKey = (ModuleId, Orientation, Position, Position);

/// Connection boxes connected by FC values, one per block edge cell.
#[derive(Debug, Clone)]
pub struct FcConnectionBoxLibrary {
    segments: Vec<SegmentProtoId>,
    default_fc: BlockFcValue,
    fc: HashMap<ModuleId, BlockFcValue>,
    cache: HashMap<CboxKey, ModuleId>,
}

impl FcConnectionBoxLibrary {
    /// A library over `segments`, using `default_fc` for blocks without
    /// their own FC.
    pub fn new(segments: Vec<SegmentProtoId>, default_fc: BlockFcValue) -> Self {
        Self {
            segments,
            default_fc,
            fc: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    /// Sets the FC of `block`.
    pub fn set_block_fc(&mut self, block: ModuleId, fc: BlockFcValue) {
        self.fc.insert(block, fc);
    }

    /// Number of distinct connection boxes built so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` if no connection box has been built yet.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl ConnectionBoxLibrary for FcConnectionBoxLibrary {
    fn get_or_create_cbox(
        &mut self,
        fabric: &mut Fabric,
        block: ModuleId,
        orientation: Orientation,
        position: Position,
        channel: Position,
        sink: &DiagnosticSink,
    ) -> RoutingResult<ModuleId> {
        let key = (block, orientation, position, channel);
        if let Some(&id) = self.cache.get(&key) {
            return Ok(id);
        }
        let Some(dimension) = orientation.dimension() else {
            return Err(IrError::InvalidOrientation {
                name: fabric.module(block).name().to_string(),
                orientation,
                position,
                reason: "connection boxes serve one concrete edge",
            }
            .into());
        };
        let name = format!(
            "cbox_{}_{}{}_{}",
            fabric.module(block).name(),
            naming::grid_tag(position),
            orientation.initial(),
            naming::grid_tag(channel)
        );
        let cbox = fabric.create_connection_box(name, dimension.perpendicular())?;
        populate_connection_box(fabric, cbox, &self.segments, block, orientation, position, channel)?;
        let fc = self.fc.get(&block).unwrap_or(&self.default_fc);
        generate_fc(fabric, cbox, &self.segments, block, orientation, fc, position, channel, true, sink)?;
        log::debug!("built connection box '{}'", fabric.module(cbox).name());
        self.cache.insert(key, cbox);
        Ok(cbox)
    }
}
