use super::*;
use crate::time::Hertz;

fn same54() -> Topology {
    Topology::same54().unwrap()
}

/// Every register of `topology` present and zero.
fn blank(topology: &Topology) -> MemoryMap {
    topology.addresses().into_iter().map(|a| (a, 0)).collect()
}

/// Records the order of reads and fails on chosen addresses.
struct Recorder {
    map: MemoryMap,
    reads: Vec<u32>,
    broken: Vec<u32>,
}

impl RegisterSource for Recorder {
    fn read_word(&mut self, address: u32) -> Result<u32, ReadError> {
        self.reads.push(address);
        if self.broken.contains(&address) {
            return Err(ReadError::Unreachable {
                detail: "bus fault".into(),
            });
        }
        self.map.read_word(address)
    }
}

#[test]
fn scenario_generator_from_open_loop_dfll() {
    let topology = same54();
    let mut map = blank(&topology);
    map.insert(0x4000_0814, 0x80); // APBAMASK.GCLK
    map.insert(0x4000_101c, 0x2); // DFLL enabled, open loop
    map.insert(0x4000_1c20, 0x0000_0106); // GCLK0: GENEN, SRC=DFLL

    let graph = ClockGraph::capture(&topology, &mut map);
    let gclk0 = graph.node(NodeId::generator(0)).unwrap();

    assert_eq!(gclk0.frequency, ResolvedFrequency::Hertz(Hertz(48_000_000.0)));
    assert_eq!(gclk0.source.as_deref(), Some("DFLL"));
    assert_eq!(gclk0.state.as_ref().unwrap().divider, Some(1));
}

#[test]
fn scenario_dpll_from_xosc1() {
    let topology = same54();
    let mut map = blank(&topology);
    map.insert(0x4000_1018, 0x2);
    map.insert(0x4000_1030, 0x2);
    map.insert(0x4000_1034, 124);
    map.insert(0x4000_1038, 0x60);
    map.insert(0x4000_1040, 0x3);

    let graph = ClockGraph::capture(&topology, &mut map);
    let dpll0 = graph.node(NodeId::dpll(0)).unwrap();

    assert_eq!(dpll0.frequency, ResolvedFrequency::Hertz(Hertz(750_000_000.0)));
    assert_eq!(dpll0.source.as_deref(), Some("XOSC1"));
    let state = dpll0.state.as_ref().unwrap();
    assert_eq!(state.status("locked"), Some(true));
    assert_eq!(state.status("clock_ready"), Some(true));
}

#[test]
fn scenario_disabled_channel_has_no_consumers() {
    let topology = same54();
    let mut map = blank(&topology);
    map.insert(0x4000_0814, 0x80);
    map.insert(0x4000_1c24, 0x0000_0106); // GCLK1 on
    map.insert(0x4000_1ca8, 0x01); // PCHCTRL10 (USB): GEN=1, CHEN clear

    let graph = ClockGraph::capture(&topology, &mut map);

    assert!(graph.consumers_of(1).unwrap().is_empty());
    assert_eq!(graph.consumers().len(), 12);
    assert!(graph.unmapped().is_none());
}

#[test]
fn scenario_generator_cycle() {
    let topology = Topology::from_yaml(
        r#"
name: LOOP
generators:
  count: 2
  register: 0x0
  stride: 4
  layout:
    enable: [{ mask: 0x100 }]
    selector:
      field: { mask: 0xf }
      mux: { 0: GCLK0, 1: GCLK1 }
peripheral_channels:
  register: 0x80
  stride: 4
"#,
    )
    .unwrap();
    let mut map = MemoryMap::new().with(0x0, 0x101).with(0x4, 0x100);

    let graph = ClockGraph::capture(&topology, &mut map);

    assert_eq!(graph.node(NodeId::generator(0)).unwrap().frequency, ResolvedFrequency::Circular);
    assert_eq!(graph.node(NodeId::generator(1)).unwrap().frequency, ResolvedFrequency::Circular);
    assert_eq!(graph.node(NodeId::generator(0)).unwrap().source.as_deref(), Some("GCLK1"));
}

#[test]
fn enabled_channels_list_consumers() {
    let topology = same54();
    let mut map = blank(&topology);
    map.insert(0x4000_1ca8, 0x41); // USB on GCLK1
    map.insert(0x4000_1cec, 0x4e); // CAN0 on GCLK14

    let graph = ClockGraph::capture(&topology, &mut map);

    assert!(graph.consumers_of(1).unwrap().contains("USB_GCLK_ID"));
    assert!(graph.unmapped().unwrap().contains("CAN0_GCLK_ID"));
    assert_eq!(
        graph.node(NodeId::channel(10)).unwrap().source.as_deref(),
        Some("GCLK1")
    );
    assert_eq!(
        graph.node(NodeId::channel(27)).unwrap().source.as_deref(),
        Some("UNKNOWN_SOURCE(14)")
    );
}

#[test]
fn read_failure_stays_local() {
    let topology = same54();
    let mut map = blank(&topology);
    map.insert(0x4000_101c, 0x2);
    map.insert(0x4000_1414, 0x2); // XOSC32K

    let mut source = Recorder {
        map,
        reads: Vec::new(),
        broken: vec![0x4000_101c],
    };
    let graph = ClockGraph::capture(&topology, &mut source);

    let dfll = graph.node(topology.find("DFLL").unwrap()).unwrap();
    assert_eq!(
        dfll.frequency,
        ResolvedFrequency::Unresolved("read failed: target unreachable: bus fault".into())
    );
    assert!(dfll.state.is_err());
    assert_eq!(dfll.source, None);

    let xosc32k = graph.node(topology.find("XOSC32K").unwrap()).unwrap();
    assert_eq!(xosc32k.frequency, ResolvedFrequency::Hertz(Hertz::hz(32_768)));
}

#[test]
fn snapshot_reads_each_address_once_in_order() {
    let topology = same54();
    let mut source = Recorder {
        map: blank(&topology),
        reads: Vec::new(),
        broken: Vec::new(),
    };
    let snapshot = Snapshot::capture(&topology, &mut source);

    let expected: Vec<u32> = topology.addresses().into_iter().collect();
    assert_eq!(source.reads, expected);
    assert_eq!(snapshot.iter().count(), expected.len());
    assert_eq!(snapshot.to_memory_map().len(), expected.len());
}

#[test]
fn unmapped_addresses_do_not_stop_the_graph() {
    let topology = same54();
    let graph = ClockGraph::capture(&topology, &mut MemoryMap::new());

    assert_eq!(graph.nodes().count(), topology.nodes().len());
    assert!(graph
        .nodes()
        .all(|(_, n)| matches!(n.frequency, ResolvedFrequency::Unresolved(_))));
    assert!(graph.bridges().iter().all(|b| b.mask.is_err() && b.peripherals.is_empty()));
}

#[test]
fn failed_reads_are_left_out_of_the_memory_map() {
    let topology = same54();
    let mut source = Recorder {
        map: blank(&topology),
        reads: Vec::new(),
        broken: vec![0x4000_0804],
    };
    let snapshot = Snapshot::capture(&topology, &mut source);
    let map = snapshot.to_memory_map();

    assert_eq!(map.get(0x4000_0804), None);
    assert_eq!(map.get(0x4000_0814), Some(0));
    assert!(snapshot.word(0x4000_0804).unwrap().is_err());
}

#[test]
fn bridges_report_set_bits() {
    let topology = same54();
    let mut map = blank(&topology);
    map.insert(0x4000_0814, 0x0000_0081);

    let graph = ClockGraph::capture(&topology, &mut map);
    let apba = graph.bridges().iter().find(|b| b.name == "APBA").unwrap();

    assert_eq!(apba.mask, Ok(0x81));
    assert_eq!(
        apba.peripherals,
        vec!["MCLK_APBAMASK_PAC".to_string(), "MCLK_APBAMASK_GCLK".into()]
    );
}

#[test]
fn nodes_are_grouped_by_kind() {
    let topology = same54();
    let graph = ClockGraph::capture(&topology, &mut blank(&topology));

    let names: Vec<&str> = graph
        .of_kind(ClockNodeKind::BusDivider)
        .map(|(_, n)| n.name.as_str())
        .collect();
    assert_eq!(names, ["CPU", "HS"]);
    assert_eq!(graph.of_kind(ClockNodeKind::GenericClockGenerator).count(), 12);
    assert_eq!(graph.chip(), "SAME54");
}

#[test]
fn unreadable_channel_stays_in_the_graph() {
    let topology = same54();
    let mut map: MemoryMap = blank(&topology)
        .iter()
        .filter(|&(address, _)| address != 0x4000_1ca8)
        .collect();
    map.insert(0x4000_0814, 0x80);

    let graph = ClockGraph::capture(&topology, &mut map);
    let usb = graph.node(NodeId::channel(10)).unwrap();

    assert_eq!(usb.name, "PCHCTRL10");
    assert_eq!(
        usb.frequency,
        ResolvedFrequency::Unresolved("read failed: address 0x40001ca8 is not mapped".into())
    );
    assert_eq!(graph.peripheral_names(10), &["USB_GCLK_ID".to_string()]);
    assert!(graph.peripheral_names(6).is_empty());
}

#[test]
fn open_loop_dfll_reports_no_source() {
    let topology = same54();
    let mut map = blank(&topology);
    map.insert(0x4000_101c, 0x2);
    map.insert(0x4000_1c80, 0x43);

    let graph = ClockGraph::capture(&topology, &mut map);
    let dfll = graph.node(topology.find("DFLL").unwrap()).unwrap();
    assert_eq!(dfll.source, None);

    map.insert(0x4000_1020, 0x1);
    let graph = ClockGraph::capture(&topology, &mut map);
    let dfll = graph.node(topology.find("DFLL").unwrap()).unwrap();
    assert_eq!(dfll.source.as_deref(), Some("PCHCTRL0"));
}
