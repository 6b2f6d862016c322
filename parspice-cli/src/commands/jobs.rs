//! `parspice jobs`

use crate::jobs::builtin_registry;

pub fn handle_jobs() {
    let registry = builtin_registry();
    println!("{:<16} VARIANT", "JOB");
    for (name, variant) in registry.jobs() {
        println!("{:<16} {}", name, variant);
    }
}
