//! Architecture file loading and validation.

use crate::error::ConfigError;
use crate::types::{ArchitectureConfig, BlockConfig, BlockKind, FcSetting};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Loads and validates an architecture description from a TOML file.
pub fn load_architecture(path: &Path) -> Result<ArchitectureConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_architecture_from_str(&content)
}

/// Parses and validates an architecture description from a string.
pub fn load_architecture_from_str(content: &str) -> Result<ArchitectureConfig, ConfigError> {
    let config: ArchitectureConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_architecture(&config)?;
    Ok(config)
}

fn require_name(name: &str, field: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::MissingField(field.to_string()));
    }
    Ok(())
}

fn unique<'a>(
    kind: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate {kind} name '{name}'"
            )));
        }
    }
    Ok(())
}

fn positive(value: u32, what: &str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::ValidationError(format!("{what} must be positive")));
    }
    Ok(())
}

fn validate_fc(block: &BlockConfig, segments: &HashSet<&str>) -> Result<(), ConfigError> {
    for value in block.fc.all_values() {
        if let FcSetting::Fraction(f) = value {
            if !(0.0..=1.0).contains(&f) {
                return Err(ConfigError::ValidationError(format!(
                    "FC fraction {f} of block '{}' is outside [0, 1]",
                    block.name
                )));
            }
        }
    }
    let ports = std::iter::once(&block.fc.default_in)
        .chain(block.fc.default_out.as_ref())
        .chain(block.fc.overrides.values());
    for fc in ports {
        for (segment, _) in fc.segment_overrides() {
            if !segments.contains(segment) {
                return Err(ConfigError::UnknownReference {
                    kind: "segment",
                    name: segment.to_string(),
                });
            }
        }
    }
    for port in block.fc.overrides.keys() {
        if !block.ports.iter().any(|p| &p.name == port) {
            return Err(ConfigError::UnknownReference {
                kind: "port",
                name: format!("{}.{}", block.name, port),
            });
        }
    }
    Ok(())
}

fn validate_block(
    block: &BlockConfig,
    globals: &HashSet<&str>,
    segments: &HashSet<&str>,
) -> Result<(), ConfigError> {
    require_name(&block.name, "blocks.name")?;
    match block.kind {
        BlockKind::Io => {
            if block.io.is_none() {
                return Err(ConfigError::MissingField(format!("blocks.{}.io", block.name)));
            }
            positive(block.capacity, &format!("capacity of block '{}'", block.name))?;
        }
        BlockKind::Logic => {
            positive(block.width, &format!("width of block '{}'", block.name))?;
            positive(block.height, &format!("height of block '{}'", block.name))?;
        }
    }
    unique(
        "port",
        block.ports.iter().map(|p| p.name.as_str()),
    )?;
    for port in &block.ports {
        require_name(&port.name, &format!("blocks.{}.ports.name", block.name))?;
        positive(port.width, &format!("width of port '{}.{}'", block.name, port.name))?;
        if let Some(global) = &port.global {
            if !globals.contains(global.as_str()) {
                return Err(ConfigError::UnknownReference {
                    kind: "global",
                    name: global.clone(),
                });
            }
        }
    }
    for conn in &block.connections {
        for end in [&conn.from, &conn.to] {
            let known = block.ports.iter().any(|p| &p.name == end)
                || (block.kind == BlockKind::Io && (end == "exti" || end == "exto"));
            if !known {
                return Err(ConfigError::UnknownReference {
                    kind: "port",
                    name: format!("{}.{}", block.name, end),
                });
            }
        }
    }
    validate_fc(block, segments)
}

/// Validates names, cross-references and numeric ranges of an architecture.
pub fn validate_architecture(config: &ArchitectureConfig) -> Result<(), ConfigError> {
    let arch = &config.architecture;
    require_name(&arch.name, "architecture.name")?;
    positive(arch.width, "architecture width")?;
    positive(arch.height, "architecture height")?;

    for sgmt in &config.segments {
        require_name(&sgmt.name, "segments.name")?;
        positive(sgmt.width, &format!("width of segment '{}'", sgmt.name))?;
        positive(sgmt.length, &format!("length of segment '{}'", sgmt.name))?;
    }
    unique("segment", config.segments.iter().map(|s| s.name.as_str()))?;
    let segments: HashSet<&str> = config.segments.iter().map(|s| s.name.as_str()).collect();

    let in_grid = |[x, y]: [i32; 2]| {
        x >= 0 && y >= 0 && (x as u32) < arch.width && (y as u32) < arch.height
    };

    for global in &config.globals {
        require_name(&global.name, "globals.name")?;
        positive(global.width, &format!("width of global '{}'", global.name))?;
        if global.is_clock && global.width != 1 {
            return Err(ConfigError::ValidationError(format!(
                "clock '{}' must be 1 bit wide",
                global.name
            )));
        }
        if let Some(pos) = global.position {
            if !in_grid(pos) {
                return Err(ConfigError::ValidationError(format!(
                    "global '{}' is bound outside the grid at {:?}",
                    global.name, pos
                )));
            }
        }
    }
    unique("global", config.globals.iter().map(|g| g.name.as_str()))?;
    let globals: HashSet<&str> = config.globals.iter().map(|g| g.name.as_str()).collect();

    for block in &config.blocks {
        validate_block(block, &globals, &segments)?;
    }
    unique("block", config.blocks.iter().map(|b| b.name.as_str()))?;
    let blocks: HashMap<&str, &BlockConfig> =
        config.blocks.iter().map(|b| (b.name.as_str(), b)).collect();

    for tile in &config.tiles {
        require_name(&tile.name, "tiles.name")?;
        let block = blocks
            .get(tile.block.as_str())
            .ok_or_else(|| ConfigError::UnknownReference {
                kind: "block",
                name: tile.block.clone(),
            })?;
        if block.kind == BlockKind::Io && tile.orientation.map_or(true, |o| o.is_auto()) {
            return Err(ConfigError::MissingField(format!(
                "tiles.{}.orientation",
                tile.name
            )));
        }
    }
    unique("tile", config.tiles.iter().map(|t| t.name.as_str()))?;

    for placement in &config.placements {
        let tile = config
            .tiles
            .iter()
            .find(|t| t.name == placement.tile)
            .ok_or_else(|| ConfigError::UnknownReference {
                kind: "tile",
                name: placement.tile.clone(),
            })?;
        let (w, h) = match blocks.get(tile.block.as_str()) {
            Some(b) if b.kind == BlockKind::Logic => (b.width as i32, b.height as i32),
            _ => (1, 1),
        };
        let [x, y] = placement.position;
        if !in_grid(placement.position) || !in_grid([x + w - 1, y + h - 1]) {
            return Err(ConfigError::ValidationError(format!(
                "tile '{}' placed at {:?} does not fit in the {}x{} grid",
                placement.tile, placement.position, arch.width, arch.height
            )));
        }
    }
    Ok(())
}
