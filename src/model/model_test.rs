use super::*;

// Kind-then-id ordering is what resync enumeration and late-attach
// replay rely on; pin it down.
#[test]
fn test_entity_id_ordering() {
    let mut ids = vec![
        EntityId::unit("wordpress/0"),
        EntityId::machine("1"),
        EntityId::application("wordpress"),
        EntityId::machine("0"),
        EntityId::annotation("machine-0"),
    ];
    ids.sort();
    assert_eq!(
        ids,
        vec![
            EntityId::annotation("machine-0"),
            EntityId::application("wordpress"),
            EntityId::machine("0"),
            EntityId::machine("1"),
            EntityId::unit("wordpress/0"),
        ]
    );
}

#[test]
fn test_expand_port_ranges() {
    let ranges = vec![
        PortRange {
            from_port: 5555,
            to_port: 5558,
            protocol: Protocol::Tcp,
        },
        PortRange {
            from_port: 12345,
            to_port: 12345,
            protocol: Protocol::Tcp,
        },
        PortRange {
            from_port: 54321,
            to_port: 54321,
            protocol: Protocol::Udp,
        },
    ];
    let ports = expand_port_ranges(&ranges);
    assert_eq!(
        ports,
        vec![
            Port {
                protocol: Protocol::Tcp,
                number: 5555
            },
            Port {
                protocol: Protocol::Tcp,
                number: 5556
            },
            Port {
                protocol: Protocol::Tcp,
                number: 5557
            },
            Port {
                protocol: Protocol::Tcp,
                number: 5558
            },
            Port {
                protocol: Protocol::Tcp,
                number: 12345
            },
            Port {
                protocol: Protocol::Udp,
                number: 54321
            },
        ]
    );
}

#[test]
fn test_sort_port_ranges() {
    let mut ranges = vec![
        PortRange {
            from_port: 54321,
            to_port: 54321,
            protocol: Protocol::Udp,
        },
        PortRange {
            from_port: 12345,
            to_port: 12345,
            protocol: Protocol::Tcp,
        },
        PortRange {
            from_port: 5555,
            to_port: 5558,
            protocol: Protocol::Tcp,
        },
    ];
    sort_port_ranges(&mut ranges);
    assert_eq!(ranges[0].from_port, 5555);
    assert_eq!(ranges[1].from_port, 12345);
    assert_eq!(ranges[2].protocol, Protocol::Udp);
}

#[test]
fn test_address_selection_prefers_exact_scope() {
    let addresses = vec![
        Address {
            value: "public.example.com".into(),
            scope: AddressScope::Public,
        },
        Address {
            value: "10.0.0.1".into(),
            scope: AddressScope::CloudLocal,
        },
    ];
    assert_eq!(
        select_public_address(&addresses).as_deref(),
        Some("public.example.com")
    );
    assert_eq!(select_internal_address(&addresses).as_deref(), Some("10.0.0.1"));
}

#[test]
fn test_address_selection_falls_back_to_unknown_scope() {
    let addresses = vec![Address {
        value: "example.com".into(),
        scope: AddressScope::Unknown,
    }];
    assert_eq!(select_public_address(&addresses).as_deref(), Some("example.com"));
    assert_eq!(select_internal_address(&addresses).as_deref(), Some("example.com"));
    assert_eq!(select_public_address(&[]), None);
}

#[test]
fn test_entity_view_identity_dispatch() {
    let view = EntityView::Unit(UnitView {
        name: "wordpress/0".into(),
        application: "wordpress".into(),
        ..Default::default()
    });
    assert_eq!(view.kind(), EntityKind::Unit);
    assert_eq!(view.entity_id(), EntityId::unit("wordpress/0"));
}
