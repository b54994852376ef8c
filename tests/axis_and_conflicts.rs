//! S2/S3 (spec.md §8): axis-tagged bindings and path-aware conflict
//! detection.

use std::sync::Arc;

use stagewire::{Activation, AxisPoint, Binding, Functoid, Injector, Key, Module, PlanError, ProduceOptions};

fn env_axis() -> stagewire::Axis {
    stagewire::Axis::new("Env", ["Prod", "Dev", "Test"])
}

#[test]
fn the_binding_matching_the_activation_is_selected() {
    let env = env_axis();
    let db = Key::named::<i64>("db");
    let module = Module::new()
        .add_binding(Binding::instance(db.clone(), Arc::new(1i64)).tagged(AxisPoint::new(env.clone(), "Prod").unwrap()))
        .add_binding(Binding::instance(db.clone(), Arc::new(2i64)).tagged(AxisPoint::new(env.clone(), "Dev").unwrap()))
        .add_binding(
            Binding::instance(db.clone(), Arc::new(3i64)).tagged(AxisPoint::new(env.clone(), "Test").unwrap()),
        );

    for (choice, expected) in [("Prod", 1), ("Dev", 2), ("Test", 3)] {
        let activation = Activation::of([AxisPoint::new(env.clone(), choice).unwrap()]).unwrap();
        let options = ProduceOptions::new().with_activation(activation);
        let locator = Injector::produce(&module, vec![db.clone()], &options).unwrap();
        assert_eq!(*locator.get::<i64>(&db).unwrap(), expected);
    }
}

#[test]
fn an_untagged_binding_is_a_fallback_only_when_no_tagged_candidate_matches() {
    let env = env_axis();
    let db = Key::named::<i64>("db");
    let module = Module::new()
        .add_binding(Binding::instance(db.clone(), Arc::new(1i64)).tagged(AxisPoint::new(env.clone(), "Prod").unwrap()))
        .add_binding(Binding::instance(db.clone(), Arc::new(0i64)));

    let activation = Activation::of([AxisPoint::new(env.clone(), "Dev").unwrap()]).unwrap();
    let options = ProduceOptions::new().with_activation(activation);
    let locator = Injector::produce(&module, vec![db.clone()], &options).unwrap();
    assert_eq!(*locator.get::<i64>(&db).unwrap(), 0);

    let activation = Activation::of([AxisPoint::new(env, "Prod").unwrap()]).unwrap();
    let options = ProduceOptions::new().with_activation(activation);
    let locator = Injector::produce(&module, vec![db.clone()], &options).unwrap();
    assert_eq!(*locator.get::<i64>(&db).unwrap(), 1);
}

#[test]
fn a_dependent_tagged_for_one_choice_cannot_reach_a_dependency_tagged_for_another() {
    let env = env_axis();
    let db = Key::named::<i64>("db");
    let svc = Key::named::<i64>("svc");

    let module = Module::new()
        .add_binding(Binding::instance(db.clone(), Arc::new(1i64)).tagged(AxisPoint::new(env.clone(), "Prod").unwrap()))
        .add_binding(
            Binding::class(svc.clone(), Functoid::from_fn(vec![db], |args| Ok(args[0].clone())))
                .tagged(AxisPoint::new(env.clone(), "Test").unwrap()),
        );

    let activation = Activation::of([AxisPoint::new(env, "Test").unwrap()]).unwrap();
    let options = ProduceOptions::new().with_activation(activation);
    let err = Injector::produce(&module, vec![svc], &options).unwrap_err();
    let err_string = err.to_string();
    assert!(err_string.contains("Env must be Test"), "unexpected message: {err_string}");
}

#[test]
fn two_equally_tagged_bindings_for_the_same_key_are_a_conflict() {
    let env = env_axis();
    let db = Key::named::<i64>("db");
    let module = Module::new()
        .add_binding(Binding::instance(db.clone(), Arc::new(1i64)).tagged(AxisPoint::new(env.clone(), "Prod").unwrap()))
        .add_binding(Binding::instance(db.clone(), Arc::new(2i64)).tagged(AxisPoint::new(env.clone(), "Prod").unwrap()));

    let activation = Activation::of([AxisPoint::new(env, "Prod").unwrap()]).unwrap();
    let options = ProduceOptions::new().with_activation(activation);
    let err = Injector::produce(&module, vec![db], &options).unwrap_err();
    assert!(matches!(err, stagewire::ProduceError::Plan(PlanError::ConflictingBindings { .. })));
}
