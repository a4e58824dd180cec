mod common;

use chrono::{DateTime, Datelike, Utc};

use common::{example_kdb, PASSWORD};
use keepass::{Database, Group};


fn open() -> Database {
    Database::open_reader(example_kdb(), Some(PASSWORD)).unwrap()
}


#[test]
fn groups() {
    let kdb = open();
    let seen_groups: Vec<&str> = kdb.groups().map(Group::name).collect();
    assert_eq!(seen_groups, ["Test1", "Test2"]);
}

#[test]
fn group_order_is_stable() {
    for _ in 0..3 {
        let kdb = open();
        let ids: Vec<u32> = kdb.groups().map(Group::id).collect();
        assert_eq!(ids, [1, 2]);
    }
}

#[test]
fn time_methods() {
    let kdb = open();
    for group in kdb.all_groups() {
        let times: Vec<DateTime<Utc>> = [group.created(), group.modified(), group.accessed(), group.expires()]
            .iter()
            .map(|t| t.datetime())
            .collect();
        assert_eq!(times.len(), 4);
        assert_eq!(times[0].year(), 2010);
        assert!(group.expires().is_never());
        assert_eq!(times[3].year(), 2999);
    }
}

#[test]
fn subgroups_hang_off_their_parent() {
    let kdb = open();

    let children: Vec<&str> = kdb.subgroups(2).map(Group::name).collect();
    assert_eq!(children, ["Inner"]);

    let inner = kdb.group(3).unwrap();
    assert_eq!(inner.level(), 1);
    assert_eq!(kdb.parent(inner.id()).map(Group::id), Some(2));
    assert_eq!(kdb.subgroups(1).count(), 0);
}

#[test]
fn groups_from_another_database_are_not_found() {
    let kdb = open();
    let other = common::Fixture {
        groups: vec![common::GroupSpec { id: 7, title: "Solo".to_string(), level: 0 }],
        entries: vec![],
    };
    let other = Database::open_reader(&other.build(PASSWORD)[..], Some(PASSWORD)).unwrap();

    let inner = kdb.group(3).unwrap();
    assert_eq!(other.parent(inner.id()), None);
    assert_eq!(other.subgroups(kdb.group(2).unwrap().id()).count(), 0);
}

#[test]
fn group_attributes() {
    let kdb = open();
    let test1 = kdb.group(1).unwrap();
    assert_eq!(test1.icon_id(), 48);
    assert_eq!(test1.flags(), 0);
    assert!(kdb.group(42).is_none());
}
