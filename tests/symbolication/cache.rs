use std::sync::Arc;
use std::thread;

use crate::common::{dwarf_image, engine_with, PeBuilder, PID};
use crashsym::{EngineConfig, ProcessId, StaticModuleMap, SymbolError};

const BASE: u64 = 0x6000_0000;

#[test]
fn module_events_drive_the_cache() {
    let builder = PeBuilder::pe32().text(0x100).function("_foo", 0x1000);
    let file = builder.write();
    let map = Arc::new(StaticModuleMap::new());
    map.add_module(PID, BASE, builder.size_of_image(), Some(file.path().to_path_buf()));
    let engine = engine_with(map.clone(), EngineConfig::default());

    engine.module_loaded(PID, BASE).unwrap();
    assert_eq!(engine.cache().module_count(PID), Some(1));
    let module = engine.lookup_module(PID, BASE + 0x10).unwrap();
    assert_eq!(module.path(), Some(file.path()));
    assert!(!module.is_loaded());

    engine.resolve(PID, BASE + 0x1000).unwrap();
    assert!(module.is_loaded());

    assert!(engine.module_unloaded(PID, BASE));
    assert_eq!(engine.cache().module_count(PID), Some(0));

    // Queried again after the unload: a fresh record and mapping
    engine.resolve(PID, BASE + 0x1000).unwrap();
    let stats = engine.stats();
    assert_eq!(stats.modules_created, 2);
    assert_eq!(stats.images_opened, 2);
}

#[test]
fn modules_are_created_lazily_on_lookup() {
    let builder = PeBuilder::pe32().text(0x100).function("_foo", 0x1000);
    let file = builder.write();
    let map = Arc::new(StaticModuleMap::new());
    map.add_module(PID, BASE, builder.size_of_image(), Some(file.path().to_path_buf()));
    let engine = engine_with(map, EngineConfig::default());

    assert_eq!(engine.stats().modules_created, 0);
    assert_eq!(engine.resolve(PID, BASE + 0x1004).unwrap().name, "foo");
    assert_eq!(engine.stats().modules_created, 1);
}

#[test]
fn processes_are_isolated() {
    let first = PeBuilder::pe32().text(0x100).function("_first", 0x1000);
    let second = PeBuilder::pe32().text(0x100).function("_second", 0x1000);
    let (first_file, second_file) = (first.write(), second.write());
    let other = ProcessId(0x99);

    let map = Arc::new(StaticModuleMap::new());
    map.add_module(PID, BASE, first.size_of_image(), Some(first_file.path().to_path_buf()));
    map.add_module(other, BASE, second.size_of_image(), Some(second_file.path().to_path_buf()));
    let engine = engine_with(map, EngineConfig::default());
    engine.attach(other);

    assert_eq!(engine.resolve(PID, BASE + 0x1000).unwrap().name, "first");
    assert_eq!(engine.resolve(other, BASE + 0x1000).unwrap().name, "second");

    assert!(engine.detach(other));
    assert!(matches!(
        engine.resolve(other, BASE + 0x1000),
        Err(SymbolError::UnknownProcess(_))
    ));
    assert_eq!(engine.resolve(PID, BASE + 0x1000).unwrap().name, "first");
}

#[test]
fn concurrent_queries_build_each_module_once() {
    let builder = dwarf_image(PeBuilder::pe32().function("_foo", 0x1000));
    let file = builder.write();
    let map = Arc::new(StaticModuleMap::new());
    map.add_module(PID, BASE, builder.size_of_image(), Some(file.path().to_path_buf()));
    let engine = engine_with(map, EngineConfig::default());

    thread::scope(|scope| {
        for offset in 0..8u64 {
            let engine = &engine;
            scope.spawn(move || {
                let info = engine.resolve(PID, BASE + 0x1000 + offset).unwrap();
                assert_eq!((info.name.as_str(), info.displacement), ("foo", offset));
            });
        }
    });

    let stats = engine.stats();
    assert_eq!(stats.modules_created, 1);
    assert_eq!(stats.images_opened, 1);
    assert_eq!(stats.indexes_built, 1);
}
