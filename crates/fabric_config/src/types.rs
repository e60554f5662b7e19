//! Architecture description types deserialized from TOML.

use fabric_common::{Orientation, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn one() -> u32 {
    1
}

/// The top-level architecture description.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchitectureConfig {
    /// Name and size of the top-level array.
    pub architecture: ArchitectureMeta,
    /// Routing segment prototypes.
    #[serde(default)]
    pub segments: Vec<SegmentConfig>,
    /// Global wires such as clocks and resets.
    #[serde(default)]
    pub globals: Vec<GlobalConfig>,
    /// IO and logic blocks.
    #[serde(default)]
    pub blocks: Vec<BlockConfig>,
    /// Tiles wrapping blocks.
    #[serde(default)]
    pub tiles: Vec<TileConfig>,
    /// Tile placements in the top-level array.
    #[serde(default)]
    pub placements: Vec<PlacementConfig>,
    /// Switch-box generation options.
    #[serde(default)]
    pub switch_box: SwitchBoxConfig,
}

/// Name, size and boundary coverage of the top-level array.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchitectureMeta {
    /// Name of the top-level array module.
    pub name: String,
    /// Width in tiles.
    pub width: u32,
    /// Height in tiles.
    pub height: u32,
    /// Boundary channels owned by the array.
    #[serde(default)]
    pub coverage: CoverageConfig,
}

/// Which boundary channels an array owns. Every side defaults to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CoverageConfig {
    /// The channel above the top row.
    #[serde(default)]
    pub north: bool,
    /// The channel right of the rightmost column.
    #[serde(default)]
    pub east: bool,
    /// The channel below the bottom row.
    #[serde(default)]
    pub south: bool,
    /// The channel left of the leftmost column.
    #[serde(default)]
    pub west: bool,
}

/// A routing segment prototype.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SegmentConfig {
    /// Segment name, used in generated port names.
    pub name: String,
    /// Number of parallel tracks per direction.
    pub width: u32,
    /// Number of tiles spanned.
    pub length: u32,
}

/// A global wire.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Global name, reused as the name of hierarchical global inputs.
    pub name: String,
    /// Width in bits.
    #[serde(default = "one")]
    pub width: u32,
    /// Clock globals must be 1 bit wide.
    #[serde(default)]
    pub is_clock: bool,
    /// Position of the IO tile whose external input drives the global.
    #[serde(default)]
    pub position: Option<[i32; 2]>,
    /// Sub-block of that IO tile.
    #[serde(default)]
    pub subblock: u32,
}

impl GlobalConfig {
    /// The bound position, if any.
    pub fn bound_position(&self) -> Option<Position> {
        self.position.map(|[x, y]| Position::new(x, y))
    }
}

/// The kind of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// An IO block.
    Io,
    /// A logic block.
    Logic,
}

/// The external direction of an IO block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IoDirection {
    /// External input pad.
    Input,
    /// External output pad.
    Output,
    /// Bidirectional pad.
    Inout,
}

/// Direction of a block port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirectionConfig {
    /// Into the block.
    Input,
    /// Out of the block.
    Output,
}

/// An IO or logic block.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlockConfig {
    /// Block name.
    pub name: String,
    /// Block kind.
    pub kind: BlockKind,
    /// External pad direction, required for IO blocks.
    #[serde(default)]
    pub io: Option<IoDirection>,
    /// Number of sub-blocks per tile (IO blocks only).
    #[serde(default = "one")]
    pub capacity: u32,
    /// Width in tiles (logic blocks only).
    #[serde(default = "one")]
    pub width: u32,
    /// Height in tiles (logic blocks only).
    #[serde(default = "one")]
    pub height: u32,
    /// Block ports.
    #[serde(default)]
    pub ports: Vec<BlockPortConfig>,
    /// Connection-box FC values.
    #[serde(default)]
    pub fc: FcConfig,
    /// User-level connections between block ports.
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

/// A block port.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlockPortConfig {
    /// Port name.
    pub name: String,
    /// Port direction.
    pub direction: PortDirectionConfig,
    /// Width in bits.
    #[serde(default = "one")]
    pub width: u32,
    /// Block edge the port faces; `auto` (the default) is only valid on IO blocks.
    #[serde(default)]
    pub orientation: Option<Orientation>,
    /// Tile of the block the port sits on.
    #[serde(default)]
    pub position: [i32; 2],
    /// Global wire feeding this input port instead of routing.
    #[serde(default)]
    pub global: Option<String>,
}

impl BlockPortConfig {
    /// The port position as a grid position.
    pub fn grid_position(&self) -> Position {
        Position::new(self.position[0], self.position[1])
    }

    /// The port orientation, `Auto` when absent.
    pub fn orientation(&self) -> Orientation {
        self.orientation.unwrap_or(Orientation::Auto)
    }
}

/// An FC value: a literal track count or a fraction of the channel.
///
/// TOML integers deserialize as counts and floats as fractions.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FcSetting {
    /// A literal number of tracks.
    Count(u32),
    /// A fraction of the channel width, in `[0, 1]`.
    Fraction(f64),
}

/// The FC of one port: a single value, or a default with per-segment overrides.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PortFcConfig {
    /// One value for every segment.
    Uniform(FcSetting),
    /// A default with per-segment overrides keyed by segment name.
    PerSegment {
        /// Value for segments without an override.
        default: FcSetting,
        /// Overrides keyed by segment name.
        #[serde(default)]
        segments: BTreeMap<String, FcSetting>,
    },
}

impl PortFcConfig {
    /// The value applying to segments without an override.
    pub fn default_value(&self) -> FcSetting {
        match self {
            PortFcConfig::Uniform(v) => *v,
            PortFcConfig::PerSegment { default, .. } => *default,
        }
    }

    /// Per-segment overrides, empty for uniform values.
    pub fn segment_overrides(&self) -> impl Iterator<Item = (&str, FcSetting)> {
        let map = match self {
            PortFcConfig::Uniform(_) => None,
            PortFcConfig::PerSegment { segments, .. } => Some(segments),
        };
        map.into_iter()
            .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), *v)))
    }

    fn values(&self) -> Vec<FcSetting> {
        let mut out = vec![self.default_value()];
        out.extend(self.segment_overrides().map(|(_, v)| v));
        out
    }
}

fn full_fc() -> PortFcConfig {
    PortFcConfig::Uniform(FcSetting::Fraction(1.0))
}

/// Connection-box FC values of a block.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FcConfig {
    /// FC of input ports. Defaults to full connectivity.
    #[serde(default = "full_fc")]
    pub default_in: PortFcConfig,
    /// FC of output ports. Defaults to `default_in`.
    #[serde(default)]
    pub default_out: Option<PortFcConfig>,
    /// Per-port overrides keyed by port name.
    #[serde(default)]
    pub overrides: BTreeMap<String, PortFcConfig>,
}

impl Default for FcConfig {
    fn default() -> Self {
        Self {
            default_in: full_fc(),
            default_out: None,
            overrides: BTreeMap::new(),
        }
    }
}

impl FcConfig {
    /// Every FC value mentioned, for range validation.
    pub fn all_values(&self) -> Vec<FcSetting> {
        let mut out = self.default_in.values();
        if let Some(v) = &self.default_out {
            out.extend(v.values());
        }
        for v in self.overrides.values() {
            out.extend(v.values());
        }
        out
    }
}

/// A user-level connection between two ports of the same block.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Driving port name.
    pub from: String,
    /// Driven port name.
    pub to: String,
}

/// A tile wrapping one block type.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TileConfig {
    /// Tile name.
    pub name: String,
    /// Name of the wrapped block.
    pub block: String,
    /// Array edge an IO tile sits on. Required for IO blocks.
    #[serde(default)]
    pub orientation: Option<Orientation>,
}

/// Placement of a tile in the top-level array.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlacementConfig {
    /// Name of the placed tile.
    pub tile: String,
    /// Anchor position.
    pub position: [i32; 2],
}

impl PlacementConfig {
    /// The anchor as a grid position.
    pub fn grid_position(&self) -> Position {
        Position::new(self.position[0], self.position[1])
    }
}

/// Wilton pattern variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WiltonPatternConfig {
    /// The original Wilton offsets.
    Classic,
    /// Offsets that keep the switch box cycle-free.
    Cfoptimal,
}

/// Switch-box generation options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SwitchBoxConfig {
    /// Turn pattern; defaults to `cfoptimal` when `cycle_free` is set and
    /// `classic` otherwise.
    #[serde(default)]
    pub pattern: Option<WiltonPatternConfig>,
    /// Drop the connections that would close a cycle through the box.
    #[serde(default)]
    pub cycle_free: bool,
    /// Also drive truncated sections where the opposite channel is absent.
    #[serde(default = "yes")]
    pub drive_truncated: bool,
}

fn yes() -> bool {
    true
}

impl Default for SwitchBoxConfig {
    fn default() -> Self {
        Self {
            pattern: None,
            cycle_free: false,
            drive_truncated: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fc_setting_integer_is_count_float_is_fraction() {
        let count: FcSetting = toml::from_str::<BTreeMap<String, FcSetting>>("v = 2")
            .unwrap()
            .remove("v")
            .unwrap();
        assert_eq!(count, FcSetting::Count(2));
        let frac: FcSetting = toml::from_str::<BTreeMap<String, FcSetting>>("v = 0.5")
            .unwrap()
            .remove("v")
            .unwrap();
        assert_eq!(frac, FcSetting::Fraction(0.5));
    }

    #[test]
    fn port_fc_per_segment() {
        let fc: FcConfig = toml::from_str(
            r#"
default_in = { default = 0.25, segments = { l4 = 1 } }
default_out = 1.0
"#,
        )
        .unwrap();
        assert_eq!(fc.default_in.default_value(), FcSetting::Fraction(0.25));
        let overrides: Vec<_> = fc.default_in.segment_overrides().collect();
        assert_eq!(overrides, vec![("l4", FcSetting::Count(1))]);
        assert_eq!(fc.all_values().len(), 3);
    }

    #[test]
    fn fc_defaults_to_full() {
        let fc = FcConfig::default();
        assert_eq!(fc.default_in, PortFcConfig::Uniform(FcSetting::Fraction(1.0)));
        assert!(fc.default_out.is_none());
    }

    #[test]
    fn port_orientation_defaults_to_auto() {
        let port: BlockPortConfig = toml::from_str(
            r#"
name = "outpad"
direction = "input"
"#,
        )
        .unwrap();
        assert_eq!(port.orientation(), Orientation::Auto);
        assert_eq!(port.width, 1);
        assert_eq!(port.grid_position(), Position::ORIGIN);
    }

    #[test]
    fn switch_box_defaults() {
        let sb: SwitchBoxConfig = toml::from_str("").unwrap();
        assert!(sb.pattern.is_none());
        assert!(!sb.cycle_free);
        assert!(sb.drive_truncated);
    }
}
