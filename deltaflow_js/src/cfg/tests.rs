use super::*;
use crate::ast::build::AstBuilder;
use crate::ast::BinaryOp;

fn while_loop() -> (Cfg, [NodeIndex; 4]) {
    // entry -> header -(i < 3)-> body -loop-> header -(!(i < 3))-> exit
    let mut b = AstBuilder::new();
    let i = b.name("i");
    let three = b.num(3.0);
    let test = b.binary(BinaryOp::Lt, i, three);
    let not_test = b.unary(crate::ast::UnaryOp::Not, test.clone());
    let body_stmt = b.empty();
    let script = b.script(vec![]);

    let mut builder = CfgBuilder::new(script);
    let entry = builder.entry();
    let header = builder.empty();
    let body = builder.stmt(body_stmt);
    let exit = builder.exit();
    builder.edge(entry, header);
    builder.cond_edge(header, body, test);
    builder.loop_edge(body, header);
    builder.cond_edge(header, exit, not_test);
    (builder.build().unwrap(), [entry, header, body, exit])
}

#[test]
fn incoming_count_ignores_loop_edges() {
    let (cfg, [entry, header, body, exit]) = while_loop();
    assert_eq!(cfg.incoming_count(entry), 0);
    assert_eq!(cfg.incoming_count(header), 1);
    assert_eq!(cfg.incoming_count(body), 1);
    assert_eq!(cfg.incoming_count(exit), 1);
    assert!(cfg.has_outgoing_loop_edge(body));
    assert!(!cfg.has_outgoing_loop_edge(header));
}

#[test]
fn siblings_share_a_source() {
    let (cfg, [_, header, _, _]) = while_loop();
    let out = cfg.outgoing(header);
    assert_eq!(out.len(), 2);
    assert_eq!(cfg.siblings(out[0]), vec![out[1]]);
    assert_eq!(cfg.siblings(out[1]), vec![out[0]]);
}

#[test]
fn build_requires_exit() {
    let mut b = AstBuilder::new();
    let script = b.script(vec![]);
    let mut builder = CfgBuilder::new(script);
    builder.entry();
    assert!(matches!(builder.build(), Err(JsModelError::NoExit(_))));
}

#[test]
fn description_round_trips_through_json() {
    let mut b = AstBuilder::new();
    let one = b.num(1.0);
    let ret = b.ret(Some(one));
    let script = b.script(vec![ret.clone()]);
    let desc = CfgDescription {
        function: script,
        nodes: vec![
            NodeDescription { stmt: None },
            NodeDescription { stmt: Some(ret) },
            NodeDescription { stmt: None },
        ],
        edges: vec![
            EdgeDescription {
                from: 0,
                to: 1,
                condition: None,
                loop_edge: false,
            },
            EdgeDescription {
                from: 1,
                to: 2,
                condition: None,
                loop_edge: false,
            },
        ],
        entry: 0,
        exits: vec![2],
        returns: vec![1],
        breaks: vec![],
        continues: vec![],
        throws: vec![],
    };
    let json = desc.to_json().unwrap();
    let parsed = CfgDescription::from_json(&json).unwrap();
    assert_eq!(parsed, desc);

    let cfg = Cfg::try_from(parsed).unwrap();
    assert_eq!(cfg.node_count(), 3);
    assert_eq!(cfg.edge_count(), 2);
    assert_eq!(cfg.entry(), NodeIndex::new(0));
    assert_eq!(cfg.exits(), &[NodeIndex::new(2)]);
    assert_eq!(cfg.returns(), &[NodeIndex::new(1)]);
    assert!(cfg.node(NodeIndex::new(1)).unwrap().stmt.is_some());
}

#[test]
fn description_rejects_dangling_edges() {
    let mut b = AstBuilder::new();
    let script = b.script(vec![]);
    let desc = CfgDescription {
        function: script,
        nodes: vec![NodeDescription { stmt: None }, NodeDescription { stmt: None }],
        edges: vec![EdgeDescription {
            from: 0,
            to: 7,
            condition: None,
            loop_edge: false,
        }],
        entry: 0,
        exits: vec![1],
        returns: vec![],
        breaks: vec![],
        continues: vec![],
        throws: vec![],
    };
    assert!(matches!(
        Cfg::try_from(desc),
        Err(JsModelError::NodeOutOfRange { index: 7, count: 2 })
    ));
}

#[test]
fn cfg_map_rejects_duplicates() {
    let (cfg, _) = while_loop();
    let mut map = CfgMap::new();
    map.insert(cfg.clone()).unwrap();
    assert!(matches!(map.insert(cfg), Err(JsModelError::DuplicateCfg(_))));
    assert_eq!(map.len(), 1);
}
