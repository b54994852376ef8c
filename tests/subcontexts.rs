//! S7 (spec.md §8): subcontexts override bindings without disturbing the
//! parent Locator, and set bindings accumulate across levels.

use std::sync::Arc;

use stagewire::{Binding, ElementKind, Injector, Key, Module, ProduceOptions};

#[test]
fn a_subcontext_override_does_not_leak_back_into_the_parent() {
    let request_id = Key::of::<i64>();
    let root_module = Module::new().add_binding(Binding::instance(request_id.clone(), Arc::new(1i64)));
    let root_locator =
        Injector::produce(&root_module, vec![request_id.clone()], &ProduceOptions::new()).unwrap();

    let child_module = Module::new().add_binding(Binding::instance(request_id.clone(), Arc::new(2i64)));
    let request_locator = Injector::create_subcontext(
        &root_locator,
        &child_module,
        vec![request_id.clone()],
        &ProduceOptions::new(),
    )
    .unwrap();

    assert_eq!(*request_locator.get::<i64>(&request_id).unwrap(), 2);
    assert_eq!(*root_locator.get::<i64>(&request_id).unwrap(), 1);
}

#[test]
fn a_subcontext_can_resolve_a_key_it_does_not_rebind_from_its_parent_locator() {
    let shared = Key::of::<i64>();
    let root_module = Module::new().add_binding(Binding::instance(shared.clone(), Arc::new(9i64)));
    let root_locator = Injector::produce(&root_module, vec![shared.clone()], &ProduceOptions::new()).unwrap();

    // Nothing new to plan or produce locally, but the value must still be
    // reachable through the resulting Locator's parent chain.
    let request_locator =
        Injector::create_subcontext(&root_locator, &Module::new(), vec![], &ProduceOptions::new()).unwrap();
    assert_eq!(*request_locator.get::<i64>(&shared).unwrap(), 9);
}

#[test]
fn set_elements_declared_at_two_levels_all_survive_into_the_child() {
    let handler = Key::of::<i64>();
    let root_module = Module::new().add_binding(Binding::set_element(
        handler.set_of(),
        handler.clone(),
        ElementKind::Instance(Arc::new(1i64)),
        false,
    ));
    let root_locator =
        Injector::produce(&root_module, vec![handler.set_of()], &ProduceOptions::new()).unwrap();

    let child_module = Module::new().add_binding(Binding::set_element(
        handler.set_of(),
        handler.clone(),
        ElementKind::Instance(Arc::new(2i64)),
        false,
    ));
    let request_locator = Injector::create_subcontext(
        &root_locator,
        &child_module,
        vec![handler.set_of()],
        &ProduceOptions::new(),
    )
    .unwrap();

    // The child module only ever declares its own element; the two
    // elements surface in `request_locator` because `Locator::get_set`
    // unions a Subcontext's own set with every ancestor's (`spec.md` §4.4),
    // not because the modules were merged.
    assert_eq!(request_locator.get_set(&handler.set_of()).unwrap().len(), 2);
    assert_eq!(root_locator.get_set(&handler.set_of()).unwrap().len(), 1);
}
