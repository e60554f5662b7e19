//! End-to-end construction of a single IO tile fabric, pass by pass and
//! through `compile_architecture`.

use fabric_common::{Orientation, Position};
use fabric_conformance::{compile, IO_ARCH};
use fabric_diagnostics::{DiagnosticCode, DiagnosticSink};
use fabric_ir::{
    BitRef, Bus, ChannelCoverage, Fabric, InstanceKey, IoKind, ModuleId, MuxLibrary, NetClass, PortDirection,
    PortKey, IO_INPUT, IO_OUTPUT,
};
use fabric_routing::{
    cboxify, netify_array, netify_tile, sboxify, BlockFcValue, FcConnectionBoxLibrary, WiltonSwitchBoxLibrary,
};

struct Built {
    fabric: Fabric,
    iob: ModuleId,
    tile: ModuleId,
    top: ModuleId,
    sink: DiagnosticSink,
}

fn build_by_hand() -> Built {
    let mut fabric = Fabric::new();
    let sink = DiagnosticSink::new();
    let sgmt = fabric.create_segment("l1", 4, 1).unwrap();

    let iob = fabric.create_io_block("iob", IoKind::Inout, 1).unwrap();
    let outpad = fabric
        .add_block_port(iob, "outpad", 1, PortDirection::Input, Position::ORIGIN, Orientation::Auto)
        .unwrap();
    let inpad = fabric
        .add_block_port(iob, "inpad", 1, PortDirection::Output, Position::ORIGIN, Orientation::Auto)
        .unwrap();
    let exti = fabric.port_named(iob, IO_INPUT).unwrap();
    let exto = fabric.port_named(iob, IO_OUTPUT).unwrap();
    fabric.connect(Bus::port(iob, exti), Bus::port(iob, inpad)).unwrap();
    fabric.connect(Bus::port(iob, outpad), Bus::port(iob, exto)).unwrap();

    let tile = fabric.create_tile("iotile", iob, Orientation::West).unwrap();
    let mut cboxes = FcConnectionBoxLibrary::new(vec![sgmt], BlockFcValue::default());
    cboxify(&mut fabric, &mut cboxes, tile, Orientation::East, &sink).unwrap();
    netify_tile(&mut fabric, tile, &sink).unwrap();

    let top = fabric.create_array("top", 1, 1, ChannelCoverage::ALL).unwrap();
    fabric.instantiate_element(top, tile, Position::ORIGIN).unwrap();
    let mut sboxes = WiltonSwitchBoxLibrary::new(vec![sgmt], None, false);
    sboxify(&mut fabric, &mut sboxes, top, true, true, &sink).unwrap();
    netify_array(&mut fabric, top, true, &sink).unwrap();

    let multi: Vec<ModuleId> = fabric
        .modules()
        .filter(|(_, m)| m.is_multi_source())
        .map(|(id, _)| id)
        .collect();
    let mut switches = MuxLibrary::new();
    for module in multi {
        fabric.switchify(module, &mut switches).unwrap();
    }
    Built {
        fabric,
        iob,
        tile,
        top,
        sink,
    }
}

#[test]
fn every_io_block_port_is_connected() {
    let b = build_by_hand();
    let f = &b.fabric;
    let sub = f.module(b.tile).instance_by_key(&InstanceKey::SubBlock(0)).unwrap();
    for (pid, port) in f.module(b.iob).ports() {
        let pin = Bus::pin(b.tile, sub, pid);
        match port.direction {
            PortDirection::Input => {
                let source = f.get_source(pin).unwrap();
                assert!(!source.is_unconnected(), "{} has no source", port.name);
            }
            PortDirection::Output => {
                let sinks = f.get_sinks(BitRef { bus: pin, index: 0 });
                assert!(!sinks.is_empty(), "{} drives nothing", port.name);
            }
        }
    }
}

#[test]
fn no_bridge_is_left_on_the_top_array() {
    let b = build_by_hand();
    let top = b.fabric.module(b.top);
    assert!(top.ports().all(|(_, p)| p.node().is_none()));
    let io: Vec<&str> = top
        .ports()
        .filter(|(_, p)| p.class == NetClass::Io)
        .map(|(_, p)| p.name.as_str())
        .collect();
    assert_eq!(io.len(), 2);
    assert!(io.contains(&"ext_iob_x0y0_exti"));
    assert!(io.contains(&"ext_iob_x0y0_exto"));
}

#[test]
fn construction_legalizes_every_module() {
    let b = build_by_hand();
    assert!(b.fabric.modules().all(|(_, m)| !m.is_multi_source()));
    assert_eq!(b.sink.error_count(), 0);
    // tracks leaving the fabric to the north and east are reported
    assert!(b.sink.count(DiagnosticCode::DANGLING_BOUNDARY) > 0);
}

#[test]
fn compiled_fabric_matches_the_hand_built_one() {
    let b = build_by_hand();
    let c = compile(IO_ARCH);
    let names = |f: &Fabric| {
        let mut v: Vec<String> = f.modules().map(|(_, m)| m.name().to_string()).collect();
        v.sort();
        v
    };
    assert_eq!(names(&b.fabric), names(&c.fabric));

    let top = c.fabric.module(c.top);
    assert!(top.port_by_key(&PortKey::Name("ext_iob_x0y0_exti".to_string())).is_none());
    assert!(top.port_by_name("ext_iob_x0y0_exti").is_some());
    assert_eq!(top.instance_count(), b.fabric.module(b.top).instance_count());
    assert_eq!(c.count(DiagnosticCode::DANGLING_BOUNDARY), b.sink.count(DiagnosticCode::DANGLING_BOUNDARY));
}
