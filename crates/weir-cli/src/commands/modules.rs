//! `weir modules`: the module registry the fixture world plans against.

use weir_core::Module;
use weir_runtime::fixtures;

pub fn run() {
    for module in fixtures::modules() {
        print!("{}", describe_module(&module));
    }
}

fn describe_module(module: &Module) -> String {
    let mut out = format!("{}\n", module.name);
    for capability in &module.capabilities {
        out.push_str(&format!("  {} ({:?})\n", capability.capability, capability.scope));
        for inout in &capability.supported_interfaces {
            let source = inout.source.as_ref().map(ToString::to_string);
            let sink = inout.sink.as_ref().map(ToString::to_string);
            out.push_str(&format!(
                "    {} -> {}\n",
                source.as_deref().unwrap_or("-"),
                sink.as_deref().unwrap_or("-")
            ));
        }
        if let Some(api) = &capability.api {
            out.push_str(&format!("    api {} at {}\n", api.interface, api.endpoint.url()));
        }
        if !capability.actions.is_empty() {
            let actions = capability.actions.iter().cloned().collect::<Vec<_>>();
            out.push_str(&format!("    actions {}\n", actions.join(", ")));
        }
    }
    out
}
