//! Capability Bag Integration Tests
//!
//! Building namespace objects from bags and growing them incrementally.

use spacey_embed::{BridgeError, ExecutionContext, HostValue, host_map};

fn context() -> ExecutionContext {
    ExecutionContext::new().unwrap()
}

#[test]
fn test_register_object_with_members() {
    let mut context = context();

    let mut database = context.new_bag();
    database
        .register_property("host", "localhost")
        .register_property("port", 3306);

    let mut app = context.new_bag();
    app.register_property("name", "MyApp")
        .register_property("version", "1.0.0")
        .register_function("hash", "md5")
        .unwrap()
        .register_object("database", &database);

    context.register_object("App", &app).unwrap();

    assert_eq!(context.eval("App.name").unwrap(), HostValue::from("MyApp"));
    assert_eq!(context.eval("App.database.port").unwrap(), HostValue::Int(3306));
    assert_eq!(
        context.eval("App.hash('password')").unwrap(),
        HostValue::from("5f4dcc3b5aa765d61d8327deb882cf99")
    );
    assert_eq!(
        context.eval("App.database").unwrap(),
        host_map! { "host" => "localhost", "port" => 3306 }
    );
}

#[test]
fn test_deeply_nested_bags() {
    let mut context = context();

    let mut level4 = context.new_bag();
    level4.register_property("value", "deep");
    let mut level3 = context.new_bag();
    level3.register_object("level4", &level4);
    let mut level2 = context.new_bag();
    level2.register_object("level3", &level3);
    let mut level1 = context.new_bag();
    level1.register_object("level2", &level2);

    context.register_object("Root", &level1).unwrap();
    assert_eq!(
        context.eval("Root.level2.level3.level4.value").unwrap(),
        HostValue::from("deep")
    );
}

#[test]
fn test_methods_in_bags_see_their_arguments() {
    let mut context = context();

    let mut strings = context.new_bag();
    strings
        .register_function("upper", "upper")
        .unwrap()
        .register_function("repeat", "str_repeat")
        .unwrap()
        .register_function("join", "implode")
        .unwrap();
    context.register_object("Str", &strings).unwrap();

    assert_eq!(
        context.eval("Str.join('-', [Str.upper('a'), Str.repeat('b', 2)])").unwrap(),
        HostValue::from("A-bb")
    );
}

#[test]
fn test_failed_bag_registration_leaves_bag_usable() {
    let mut context = context();

    let mut utils = context.new_bag();
    utils.register_property("ok", true);
    let err = utils.register_function("broken", "nonexistent_function").unwrap_err();
    assert!(matches!(err, BridgeError::HostCallableNotFound(_)));

    context.register_object("Utils", &utils).unwrap();
    assert_eq!(context.eval("Object.keys(Utils)").unwrap(), HostValue::from(vec!["ok"]));
}

#[test]
fn test_register_object_replaces_previous_binding() {
    let mut context = context();

    let mut first = context.new_bag();
    first.register_property("a", 1);
    context.register_object("Thing", &first).unwrap();

    let mut second = context.new_bag();
    second.register_property("b", 2);
    context.register_object("Thing", &second).unwrap();

    assert_eq!(context.eval("Thing").unwrap(), host_map! { "b" => 2 });
}

#[test]
fn test_bag_materializes_independently_per_context() {
    let mut shared = ExecutionContext::new().unwrap().new_bag();
    shared.register_property("counter", 0);

    let mut one = context();
    let mut two = context();
    one.register_object("State", &shared).unwrap();
    two.register_object("State", &shared).unwrap();

    one.eval("State.counter += 5;").unwrap();
    assert_eq!(one.eval("State.counter").unwrap(), HostValue::Int(5));
    assert_eq!(two.eval("State.counter").unwrap(), HostValue::Int(0));
}

#[test]
fn test_add_object_property_accumulates() {
    let mut context = context();

    context.add_object_property("Config", "debug", &HostValue::Bool(true)).unwrap();
    context.add_object_property("Config", "level", &HostValue::Int(3)).unwrap();
    context.add_object_property("Config", "debug", &HostValue::Bool(false)).unwrap();

    assert_eq!(
        context.eval("Config").unwrap(),
        host_map! { "debug" => false, "level" => 3 }
    );
}

#[test]
fn test_add_object_method_accumulates() {
    let mut context = context();

    context.add_object_method("Utils", "upper", "upper").unwrap();
    context.add_object_method("Utils", "lower", "lower").unwrap();
    context.add_object_property("Utils", "name", &HostValue::from("utils")).unwrap();

    assert_eq!(
        context.eval("[Utils.upper('x'), Utils.lower('Y'), Utils.name]").unwrap(),
        HostValue::from(vec!["X", "y", "utils"])
    );

    let err = context.add_object_method("Utils", "bad", "nonexistent_function").unwrap_err();
    assert!(matches!(err, BridgeError::HostCallableNotFound(_)));
    assert_eq!(context.eval("typeof Utils.bad").unwrap(), HostValue::from("undefined"));
}

#[test]
fn test_add_object_replaces_non_object_binding() {
    let mut context = context();
    context.set_global("Slot", &HostValue::Int(5)).unwrap();
    context.add_object_property("Slot", "x", &HostValue::Int(1)).unwrap();

    assert_eq!(context.eval("Slot").unwrap(), host_map! { "x" => 1 });
}

#[test]
fn test_extend_object_keeps_existing_members() {
    let mut context = context();
    context.eval("var Tools = { existing: 'yes' };").unwrap();

    let mut extra = context.new_bag();
    extra
        .register_property("added", 1)
        .register_function("count", "count")
        .unwrap();
    context.extend_object("Tools", &extra).unwrap();

    assert_eq!(context.eval("Tools.existing").unwrap(), HostValue::from("yes"));
    assert_eq!(context.eval("Tools.added").unwrap(), HostValue::Int(1));
    assert_eq!(context.eval("Tools.count([1, 2, 3])").unwrap(), HostValue::Int(3));
}
