use crate::constants::BACKUP_KEY;
use crate::constants::DEFAULT_REGISTRY_PORT;
use crate::ServiceUrl;

/// Appends the default coordination port when `address` has none, or when
/// its port is `0`.
pub fn append_default_port(address: &str) -> String {
    if address.is_empty() {
        return address.to_string();
    }
    if address.ends_with(']') {
        return format!("{}:{}", address, DEFAULT_REGISTRY_PORT);
    }
    match address.rsplit_once(':') {
        None => format!("{}:{}", address, DEFAULT_REGISTRY_PORT),
        Some((host, "0")) => format!("{}:{}", host, DEFAULT_REGISTRY_PORT),
        Some(_) => address.to_string(),
    }
}

/// Primary address of a registry url followed by its `backup` addresses,
/// each with the default port filled in.
pub fn connect_addresses(registry_url: &ServiceUrl) -> Vec<String> {
    let mut addresses = vec![append_default_port(&registry_url.address())];
    if let Some(backup) = registry_url.parameter(BACKUP_KEY) {
        addresses.extend(
            backup
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(append_default_port),
        );
    }
    addresses
}
