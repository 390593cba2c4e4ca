// # Local IP Sources
//
// This crate provides IP sources that need nothing beyond the local host:
//
// - `command`: run a shell command that prints the address
// - `interface`: read the address bound to a named network interface
//
// ## Platform Support
//
// The command source needs a POSIX `sh`. Interface inspection uses
// getifaddrs(3) and is only available on Unix; elsewhere the factory
// rejects `interface` sources at startup.

mod command;
mod interface;

pub use command::{CommandFactory, CommandIpSource};
pub use interface::{InterfaceFactory, InterfaceIpSource, select_address};

use wlm_core::PluginRegistry;

/// Register the local IP sources with a registry
pub fn register(registry: &PluginRegistry) {
    registry.register_ip_source("command", Box::new(CommandFactory));
    registry.register_ip_source("interface", Box::new(InterfaceFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register() {
        let registry = PluginRegistry::new();
        register(&registry);
        assert!(registry.has_ip_source("command"));
        assert!(registry.has_ip_source("interface"));
        assert!(!registry.has_ip_source("http"));
    }
}
