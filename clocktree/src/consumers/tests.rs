use quickcheck::quickcheck;

use super::*;
use crate::decode::decode;
use crate::topology::NodeId;

fn same54() -> Topology {
    Topology::same54().unwrap()
}

fn channel(topology: &Topology, peripheral_id: u32, raw: u32) -> NodeState {
    decode(topology.node(NodeId::channel(peripheral_id)).unwrap(), raw)
}

fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn disabled_channel_contributes_nothing() {
    let topology = same54();
    // GEN=2, CHEN clear
    let state = channel(&topology, 10, 0x02);
    let consumers = map_consumers([(10, &state)], &topology);

    assert_eq!(consumers.len(), 12);
    assert!(consumers.values().all(BTreeSet::is_empty));
}

#[test]
fn enabled_channels_are_grouped_by_generator() {
    let topology = same54();
    let usb = channel(&topology, 10, 0x41);
    let tc = channel(&topology, 9, 0x41);
    let eic = channel(&topology, 4, 0x40);
    let consumers = map_consumers([(10, &usb), (9, &tc), (4, &eic)], &topology);

    assert_eq!(
        consumers[&ConsumerBucket::Generator(1)],
        names(&["TC0_GCLK_ID", "TC1_GCLK_ID", "USB_GCLK_ID"])
    );
    assert_eq!(consumers[&ConsumerBucket::Generator(0)], names(&["EIC_GCLK_ID"]));
    assert!(!consumers.contains_key(&ConsumerBucket::Unmapped));
}

#[test]
fn out_of_range_generator_is_unmapped() {
    let topology = same54();
    // GEN=13 on a 12-generator part
    let state = channel(&topology, 27, 0x4d);
    let consumers = map_consumers([(27, &state)], &topology);

    assert_eq!(consumers[&ConsumerBucket::Unmapped], names(&["CAN0_GCLK_ID"]));
}

#[test]
fn unknown_peripheral_id_adds_no_names() {
    let topology = same54();
    let state = channel(&topology, 7, 0x41);
    let consumers = map_consumers([(6, &state)], &topology);

    assert!(consumers[&ConsumerBucket::Generator(1)].is_empty());
}

quickcheck! {
    // Every name behind an enabled channel lands in exactly the bucket its
    // selector picks.
    fn consumers_are_complete(raws: Vec<u32>) -> bool {
        let topology = same54();
        let ids: Vec<u32> = topology.peripherals().keys().copied().collect();
        let states: Vec<(u32, NodeState)> = ids
            .iter()
            .zip(raws)
            .map(|(&id, raw)| (id, channel(&topology, id, raw)))
            .collect();
        let consumers = map_consumers(states.iter().map(|(id, s)| (*id, s)), &topology);

        states.iter().all(|(id, state)| {
            let bucket = match state.selector {
                Some(n) if n < 12 => ConsumerBucket::Generator(n),
                _ => ConsumerBucket::Unmapped,
            };
            topology.peripheral_names(*id).iter().all(|name| {
                let listed = consumers.get(&bucket).map_or(false, |set| set.contains(name));
                listed || !state.enabled
            })
        })
    }
}
