use crate::{
    Error, Result,
    cluster::{SlotMap, parse_nodes},
    tests::log_try_init,
};

const TOPOLOGY: &str = "\
07c37dfeb235213a872192d90877d0cd55635b91 127.0.0.1:30004@40004 slave e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 0 1426238317239 4 connected
67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 127.0.0.1:30002@40002 master - 0 1426238316232 2 connected 5461-10922
292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f 127.0.0.1:30003@40003 master - 0 1426238318243 3 connected 10923-16383
e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 127.0.0.1:30001@40001 myself,master - 0 0 1 connected 0-5460
vars currentEpoch 6 lastVoteEpoch 0
";

#[test]
fn parse_topology() -> Result<()> {
    log_try_init();

    let nodes = parse_nodes(TOPOLOGY, true)?;

    // replicas and the vars trailer are skipped
    assert_eq!(3, nodes.len());
    assert_eq!("127.0.0.1", nodes[0].host);
    assert_eq!(30002, nodes[0].port);
    assert_eq!(vec![(5461, 10922)], nodes[0].slot_ranges);
    assert_eq!(
        "e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca",
        nodes[2].id
    );
    assert_eq!(vec![(0, 5460)], nodes[2].slot_ranges);

    Ok(())
}

#[test]
fn single_slot_and_multi_range() -> Result<()> {
    let topology =
        "id1 10.0.0.1:7000 master - 0 0 1 connected 0 2-16382 16383\n";
    let nodes = parse_nodes(topology, true)?;

    assert_eq!(1, nodes.len());
    assert_eq!(vec![(0, 0), (2, 16382), (16383, 16383)], nodes[0].slot_ranges);

    Ok(())
}

#[test]
fn migrating_slot_rejected_in_strict_mode() {
    let topology =
        "id1 10.0.0.1:7000 master - 0 0 1 connected 0-16382 [16383->-id2]\n";

    assert!(matches!(
        parse_nodes(topology, true),
        Err(Error::Config(_))
    ));

    // lenient mode ignores the unstable range
    let nodes = parse_nodes(topology, false).unwrap();
    assert_eq!(vec![(0, 16382)], nodes[0].slot_ranges);
}

#[test]
fn slot_map_requires_full_coverage() {
    let gap = "\
id1 10.0.0.1:7000 master - 0 0 1 connected 0-5460
id2 10.0.0.2:7000 master - 0 0 2 connected 10923-16383
";
    assert!(matches!(
        SlotMap::from_topology(gap),
        Err(Error::Config(_))
    ));

    let overlap = "\
id1 10.0.0.1:7000 master - 0 0 1 connected 0-5461
id2 10.0.0.2:7000 master - 0 0 2 connected 5461-16383
";
    assert!(matches!(
        SlotMap::from_topology(overlap),
        Err(Error::Config(_))
    ));

    let truncated = "\
id1 10.0.0.1:7000 master - 0 0 1 connected 0-16000
";
    assert!(matches!(
        SlotMap::from_topology(truncated),
        Err(Error::Config(_))
    ));
}

#[test]
fn slot_map_lookup() -> Result<()> {
    let slot_map = SlotMap::from_topology(TOPOLOGY)?;

    assert_eq!(30001, slot_map.nodes()[slot_map.owner_of_slot(0)].port);
    assert_eq!(30001, slot_map.nodes()[slot_map.owner_of_slot(5460)].port);
    assert_eq!(30002, slot_map.nodes()[slot_map.owner_of_slot(5461)].port);
    assert_eq!(30003, slot_map.nodes()[slot_map.owner_of_slot(16383)].port);

    // "{user1000}" tags hash to slot 5474, owned by the second master
    assert_eq!(
        30002,
        slot_map.nodes()[slot_map.owner_of(b"{user1000}.following")].port
    );

    Ok(())
}

#[test]
fn malformed_lines() {
    assert!(matches!(
        parse_nodes("id1 10.0.0.1:7000 master - 0 0\n", true),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        parse_nodes("id1 noport master - 0 0 1 connected 0-16383\n", true),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        parse_nodes(
            "id1 10.0.0.1:7000 master - 0 0 1 connected 5461-10\n",
            true
        ),
        Err(Error::Config(_))
    ));
}
